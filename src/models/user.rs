use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{to_datetime, Ent, EntityType, TaoEntity, TaoId};

/// Stored user payload. Graph memberships live in associations, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub profile_image_url: String,
    #[serde(default)]
    pub cover_image_url: String,
}

impl TaoEntity for UserData {
    const ENTITY_TYPE: EntityType = EntityType::User;
}

/// Restricted projection used wherever a user is embedded in a post or comment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorView {
    pub id: TaoId,
    pub username: String,
    pub full_name: String,
    pub profile_image_url: String,
}

impl From<&Ent<UserData>> for AuthorView {
    fn from(user: &Ent<UserData>) -> Self {
        Self {
            id: user.id,
            username: user.data.username.clone(),
            full_name: user.data.full_name.clone(),
            profile_image_url: user.data.profile_image_url.clone(),
        }
    }
}

/// Full profile. `password` is always `null` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: TaoId,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub password: Option<String>,
    pub bio: String,
    pub link: String,
    pub profile_image_url: String,
    pub cover_image_url: String,
    pub following: Vec<TaoId>,
    pub followers: Vec<TaoId>,
    pub liked_posts: Vec<TaoId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileView {
    pub fn new(
        user: &Ent<UserData>,
        following: Vec<TaoId>,
        followers: Vec<TaoId>,
        liked_posts: Vec<TaoId>,
    ) -> Self {
        Self {
            id: user.id,
            username: user.data.username.clone(),
            full_name: user.data.full_name.clone(),
            email: user.data.email.clone(),
            password: None,
            bio: user.data.bio.clone(),
            link: user.data.link.clone(),
            profile_image_url: user.data.profile_image_url.clone(),
            cover_image_url: user.data.cover_image_url.clone(),
            following,
            followers,
            liked_posts,
            created_at: to_datetime(user.created),
            updated_at: to_datetime(user.updated),
        }
    }
}

/// Projection returned by user search
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSearchView {
    pub id: TaoId,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub profile_image_url: String,
}

impl From<&Ent<UserData>> for UserSearchView {
    fn from(user: &Ent<UserData>) -> Self {
        Self {
            id: user.id,
            username: user.data.username.clone(),
            full_name: user.data.full_name.clone(),
            email: user.data.email.clone(),
            profile_image_url: user.data.profile_image_url.clone(),
        }
    }
}
