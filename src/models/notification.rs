use serde::{Deserialize, Serialize};

use super::{EntityType, TaoEntity, TaoId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Like,
    Follow,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationData {
    pub from: TaoId,
    pub to: TaoId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    // Reserved for notification listing, never flipped here
    #[serde(default)]
    pub read: bool,
}

impl TaoEntity for NotificationData {
    const ENTITY_TYPE: EntityType = EntityType::Notification;
}
