use axum::{
    extract::{FromRequest, Multipart, Path, Request, State},
    http::header::CONTENT_TYPE,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_id, ApiJson};
use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::infrastructure::media::MediaUpload;
use crate::infrastructure::middleware::Actor;
use crate::models::{CommentView, PostView, TaoId};
use crate::services::NewPost;

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub text: String,
}

/// Post creation body: `multipart/form-data` with `text` and `media` parts, or JSON `{ "text" }`
pub struct NewPostForm(pub NewPost);

impl<S> FromRequest<S> for NewPostForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("multipart/form-data"))
            .unwrap_or(false);

        if !is_multipart {
            let ApiJson(body) = ApiJson::<CreatePostRequest>::from_request(req, state).await?;
            return Ok(NewPostForm(NewPost {
                text: body.text,
                media: None,
            }));
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;

        let mut new_post = NewPost::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("Malformed upload: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "text" => {
                    new_post.text = Some(
                        field
                            .text()
                            .await
                            .map_err(|e| AppError::Validation(format!("Malformed text field: {}", e)))?,
                    );
                }
                "media" => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::Validation(format!("Malformed media field: {}", e)))?;
                    if !bytes.is_empty() {
                        new_post.media = Some(MediaUpload {
                            bytes: bytes.to_vec(),
                            content_type,
                        });
                    }
                }
                _ => {}
            }
        }

        Ok(NewPostForm(new_post))
    }
}

pub async fn create_post_handler(
    State(state): State<AppState>,
    actor: Actor,
    NewPostForm(new_post): NewPostForm,
) -> AppResult<Json<PostView>> {
    let post = state.posts.create(actor.id(), new_post).await?;
    Ok(Json(post))
}

pub async fn delete_post_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let post_id = state.posts.delete(actor.id(), parse_id(&id)?).await?;
    Ok(Json(json!({ "message": "Post deleted successfully", "id": post_id })))
}

pub async fn comment_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<CommentRequest>,
) -> AppResult<Json<Value>> {
    let comment: CommentView = state
        .posts
        .comment(actor.id(), parse_id(&id)?, &body.text)
        .await?;
    Ok(Json(json!({ "comment": comment })))
}

pub async fn like_unlike_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<TaoId>>> {
    let likes = state.posts.like_unlike(actor.id(), parse_id(&id)?).await?;
    Ok(Json(likes))
}

pub async fn all_posts_handler(State(state): State<AppState>) -> AppResult<Json<Vec<PostView>>> {
    Ok(Json(state.posts.all_posts().await?))
}

pub async fn following_feed_handler(
    State(state): State<AppState>,
    actor: Actor,
) -> AppResult<Json<Vec<PostView>>> {
    Ok(Json(state.posts.following_feed(actor.id()).await?))
}

pub async fn user_posts_handler(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<Vec<PostView>>> {
    Ok(Json(state.posts.user_posts(&username).await?))
}

pub async fn liked_posts_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<PostView>>> {
    Ok(Json(state.posts.liked_posts(parse_id(&id)?).await?))
}
