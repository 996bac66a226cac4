// Notification sink - append-only like/follow events, written as a side effect of toggles

use sqlx::SqliteConnection;
use std::sync::Arc;
use tracing::debug;

use crate::error::AppResult;
use crate::infrastructure::id_generator::TaoIdGenerator;
use crate::infrastructure::sqlite_database::{SqliteDatabase, TaoStore};
use crate::models::{
    current_time_millis, AssociationType, Ent, NotificationData, NotificationKind, TaoId,
};

#[derive(Clone)]
pub struct NotificationSink {
    db: Arc<SqliteDatabase>,
    ids: Arc<TaoIdGenerator>,
}

impl NotificationSink {
    pub fn new(db: Arc<SqliteDatabase>, ids: Arc<TaoIdGenerator>) -> Self {
        Self { db, ids }
    }

    /// Record a notification on the caller's connection, usually inside the toggle's transaction
    pub async fn emit(
        &self,
        conn: &mut SqliteConnection,
        from: TaoId,
        to: TaoId,
        kind: NotificationKind,
    ) -> AppResult<TaoId> {
        let now = current_time_millis();
        let data = NotificationData {
            from,
            to,
            kind,
            read: false,
        };

        let notification = conn.create(self.ids.next_id(), &data, now).await?;
        conn.assoc_add(to, AssociationType::Notified, notification.id, now)
            .await?;

        debug!(from, to, ?kind, id = notification.id, "notification recorded");
        Ok(notification.id)
    }

    /// Notifications addressed to `to`, oldest first
    pub async fn notifications_for(&self, to: TaoId) -> AppResult<Vec<Ent<NotificationData>>> {
        let mut conn = self.db.acquire().await?;
        let ids = conn.assoc_targets(to, AssociationType::Notified).await?;
        let mut notifications = conn.load_many::<NotificationData>(&ids).await?;
        notifications.sort_by_key(|n| (n.created, n.id));
        Ok(notifications)
    }
}
