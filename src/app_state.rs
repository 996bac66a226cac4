use std::sync::Arc;

use crate::{
    config::Config,
    infrastructure::{
        id_generator::TaoIdGenerator,
        media::{DiskMediaGateway, MediaGateway},
        security::TokenKeys,
        sqlite_database::SqliteDatabase,
    },
    services::{NotificationSink, PostService, UserService},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<SqliteDatabase>,
    pub tokens: Arc<TokenKeys>,
    pub posts: PostService,
    pub users: UserService,
    pub notifications: NotificationSink,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let database =
            SqliteDatabase::connect(&config.database.url, config.database.max_connections).await?;
        let media = DiskMediaGateway::new(&config.media.root, &config.media.public_url);

        Ok(Self::with_parts(config, Arc::new(database), Arc::new(media)))
    }

    /// Wire services over an existing database and media gateway
    pub fn with_parts(
        config: Config,
        db: Arc<SqliteDatabase>,
        media: Arc<dyn MediaGateway>,
    ) -> Self {
        let ids = Arc::new(TaoIdGenerator::new(config.database.shard_id));
        let notifications = NotificationSink::new(db.clone(), ids.clone());
        let posts = PostService::new(db.clone(), ids.clone(), media.clone(), notifications.clone());
        let users = UserService::new(db.clone(), ids, media, notifications.clone());

        Self {
            tokens: Arc::new(TokenKeys::new(&config.auth.jwt_secret)),
            config: Arc::new(config),
            db,
            posts,
            users,
            notifications,
        }
    }
}
