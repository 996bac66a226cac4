use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_id, ApiJson};
use crate::app_state::AppState;
use crate::error::AppResult;
use crate::infrastructure::middleware::Actor;
use crate::models::{ProfileView, UserSearchView};
use crate::services::{ProfileUpdate, Registration};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

pub async fn register_handler(
    State(state): State<AppState>,
    ApiJson(registration): ApiJson<Registration>,
) -> AppResult<Json<ProfileView>> {
    Ok(Json(state.users.register(registration).await?))
}

pub async fn get_profile_handler(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<ProfileView>> {
    Ok(Json(state.users.get_profile(&username).await?))
}

pub async fn follow_unfollow_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let outcome = state.users.follow_unfollow(actor.id(), parse_id(&id)?).await?;
    Ok(Json(json!({ "message": outcome.message() })))
}

pub async fn suggested_users_handler(
    State(state): State<AppState>,
    actor: Actor,
) -> AppResult<Json<Vec<ProfileView>>> {
    Ok(Json(state.users.suggested_users(actor.id()).await?))
}

pub async fn update_profile_handler(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> AppResult<Json<ProfileView>> {
    Ok(Json(state.users.update_profile(actor.id(), update).await?))
}

pub async fn search_users_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> AppResult<Json<Vec<UserSearchView>>> {
    Ok(Json(state.users.search_users(&params.q).await?))
}
