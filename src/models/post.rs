use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{to_datetime, AuthorView, EntityType, TaoEntity, TaoId, TaoTime};

/// Stored post payload. Likes live in `liked_by` associations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostData {
    pub author: TaoId,
    #[serde(default)]
    pub text: Option<String>,
    // Older posts were written with `img`
    #[serde(default, alias = "img")]
    pub media_url: Option<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl TaoEntity for PostData {
    const ENTITY_TYPE: EntityType = EntityType::Post;
}

/// Append-only comment embedded in a post
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub author: TaoId,
    pub text: String,
    pub created_at: TaoTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub author: Option<AuthorView>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl CommentView {
    pub fn new(comment: &Comment, author: Option<AuthorView>) -> Self {
        Self {
            author,
            text: comment.text.clone(),
            created_at: to_datetime(comment.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: TaoId,
    pub author: Option<AuthorView>,
    pub text: Option<String>,
    pub media_url: Option<String>,
    pub likes: Vec<TaoId>,
    pub comments: Vec<CommentView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
