// Social graph model - every entity is an object, every relationship an association

pub mod notification;
pub mod post;
pub mod user;

pub use notification::{NotificationData, NotificationKind};
pub use post::{Comment, CommentView, PostData, PostView};
pub use user::{AuthorView, ProfileView, UserData, UserSearchView};

use chrono::{DateTime, TimeZone, Utc};
use serde::{de::DeserializeOwned, Serialize};

/// Object and association identifier (snowflake, see `TaoIdGenerator`)
pub type TaoId = i64;

/// Unix time in milliseconds
pub type TaoTime = i64;

pub fn current_time_millis() -> TaoTime {
    Utc::now().timestamp_millis()
}

pub fn to_datetime(millis: TaoTime) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    User,
    Post,
    Notification,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::User => "user",
            EntityType::Post => "post",
            EntityType::Notification => "notification",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssociationType {
    /// user -> user
    Follow,
    /// user -> user, inverse of `Follow`
    FollowedBy,
    /// user -> post, the user's liked posts
    Like,
    /// post -> user, the post's likes
    LikedBy,
    /// user -> post
    Authored,
    /// user -> notification addressed to them
    Notified,
}

impl AssociationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssociationType::Follow => "follow",
            AssociationType::FollowedBy => "followed_by",
            AssociationType::Like => "like",
            AssociationType::LikedBy => "liked_by",
            AssociationType::Authored => "authored",
            AssociationType::Notified => "notified",
        }
    }

    /// Inverse edge written and removed together with this one
    pub fn inverse(&self) -> Option<AssociationType> {
        match self {
            AssociationType::Follow => Some(AssociationType::FollowedBy),
            AssociationType::FollowedBy => Some(AssociationType::Follow),
            AssociationType::Like => Some(AssociationType::LikedBy),
            AssociationType::LikedBy => Some(AssociationType::Like),
            AssociationType::Authored | AssociationType::Notified => None,
        }
    }
}

/// Raw stored object row
#[derive(Debug, Clone)]
pub struct TaoObject {
    pub id: TaoId,
    pub otype: String,
    pub data: String,
    pub time_created: TaoTime,
    pub time_updated: TaoTime,
}

/// Raw stored association row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaoAssociation {
    pub id1: TaoId,
    pub atype: String,
    pub id2: TaoId,
    pub time_created: TaoTime,
}

/// Payload type stored in the objects table
pub trait TaoEntity: Serialize + DeserializeOwned + Send + Sync {
    const ENTITY_TYPE: EntityType;
}

/// A decoded object: payload plus the bookkeeping columns
#[derive(Debug, Clone)]
pub struct Ent<T> {
    pub id: TaoId,
    pub created: TaoTime,
    pub updated: TaoTime,
    pub data: T,
}

impl<T: TaoEntity> Ent<T> {
    pub fn decode(obj: TaoObject) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: obj.id,
            created: obj.time_created,
            updated: obj.time_updated,
            data: serde_json::from_str(&obj.data)?,
        })
    }
}
