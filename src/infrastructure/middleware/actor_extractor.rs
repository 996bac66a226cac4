// Actor extractor - resolves the authenticated identity for a request
//
// Handlers receive the actor as an explicit value:
//
//     async fn handler(State(state): State<AppState>, actor: Actor) -> AppResult<Json<Value>>
//
// Routes without an `Actor` argument are public.

use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};

use crate::app_state::AppState;
use crate::error::AppError;
use crate::models::TaoId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor(pub TaoId);

impl Actor {
    pub fn id(&self) -> TaoId {
        self.0
    }
}

impl FromRequestParts<AppState> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(|| AppError::Unauthorized("Unauthorized: No token provided".to_string()))?;
        let value = header
            .to_str()
            .map_err(|_| AppError::Unauthorized("Unauthorized: Malformed header".to_string()))?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Unauthorized: Expected bearer token".to_string()))?;

        let actor_id = state.tokens.verify(token.trim())?;
        Ok(Actor(actor_id))
    }
}
