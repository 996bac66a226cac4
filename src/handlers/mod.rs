// HTTP surface - routes, shared extractors and the router

pub mod posts;
pub mod users;

use axum::{
    extract::{DefaultBodyLimit, FromRequest, Request, State},
    response::Json,
    routing::{delete, get, patch, post},
    Router,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::models::TaoId;

/// JSON body whose rejections use the `{"error": ...}` shape
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        Ok(ApiJson(value))
    }
}

pub(crate) fn parse_id(raw: &str) -> AppResult<TaoId> {
    raw.parse()
        .map_err(|_| AppError::Validation(format!("Invalid id: {}", raw)))
}

async fn health_handler(State(state): State<AppState>) -> AppResult<Json<Value>> {
    state.db.health_check().await?;
    Ok(Json(json!({ "status": "ok" })))
}

pub fn create_router(state: AppState) -> Router {
    let max_upload_bytes = state.config.media.max_upload_bytes;
    let media_dir = ServeDir::new(&state.config.media.root);

    let api = Router::new()
        // Posts
        .route("/posts", get(posts::all_posts_handler).post(posts::create_post_handler))
        .route("/posts/{id}", delete(posts::delete_post_handler))
        .route("/posts/{id}/comments", post(posts::comment_handler))
        .route("/posts/{id}/like", post(posts::like_unlike_handler))
        .route("/feed", get(posts::following_feed_handler))
        // Users
        .route("/users", post(users::register_handler))
        .route("/users/suggested", get(users::suggested_users_handler))
        .route("/users/search", get(users::search_users_handler))
        .route("/users/me", patch(users::update_profile_handler))
        .route("/users/{user}", get(users::get_profile_handler))
        .route("/users/{user}/posts", get(posts::user_posts_handler))
        .route("/users/{user}/liked", get(posts::liked_posts_handler))
        .route("/users/{user}/follow", post(users::follow_unfollow_handler));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api)
        .nest_service("/media", media_dir)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
