#![allow(dead_code)]

use once_cell::sync::Lazy;
use std::sync::Arc;

use tao_social::app_state::AppState;
use tao_social::config::Config;
use tao_social::infrastructure::id_generator::TaoIdGenerator;
use tao_social::infrastructure::media::DiskMediaGateway;
use tao_social::infrastructure::sqlite_database::{SqliteDatabase, TaoStore};
use tao_social::models::{current_time_millis, TaoId, UserData};
use tempfile::TempDir;

pub const JWT_SECRET: &str = "integration-test-secret";

// Separate shard from the app's generator so seeded ids never collide
static SEED_IDS: Lazy<TaoIdGenerator> = Lazy::new(|| TaoIdGenerator::new(1000));

/// App state over an in-memory database with media stored in a temp dir.
/// Keep the `TempDir` alive for the duration of the test.
pub async fn test_state() -> (AppState, TempDir) {
    let media_dir = tempfile::tempdir().expect("temp dir");
    let root = media_dir.path().to_string_lossy().to_string();
    let config = Config::in_memory(JWT_SECRET, &root);

    let db = SqliteDatabase::new_in_memory().await.expect("in-memory database");
    let media = DiskMediaGateway::new(media_dir.path(), &config.media.public_url);

    let state = AppState::with_parts(config, Arc::new(db), Arc::new(media));
    (state, media_dir)
}

/// App state over a WAL database file with a multi-connection pool, for concurrency tests.
/// Database and media share the returned `TempDir`.
pub async fn file_backed_state(max_connections: u32) -> (AppState, TempDir) {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = dir.path().join("media").to_string_lossy().to_string();
    let url = format!("sqlite://{}", dir.path().join("social.db").display());

    let mut config = Config::in_memory(JWT_SECRET, &root);
    config.database.url = url.clone();
    config.database.max_connections = max_connections;

    let db = SqliteDatabase::connect(&url, max_connections)
        .await
        .expect("file database");
    let media = DiskMediaGateway::new(&root, &config.media.public_url);

    let state = AppState::with_parts(config, Arc::new(db), Arc::new(media));
    (state, dir)
}

/// Insert a user row directly, skipping password hashing
pub async fn seed_user(state: &AppState, username: &str) -> TaoId {
    let data = UserData {
        username: username.to_string(),
        full_name: format!("{} Example", username),
        email: format!("{}@example.com", username),
        password_hash: String::new(),
        bio: String::new(),
        link: String::new(),
        profile_image_url: String::new(),
        cover_image_url: String::new(),
    };

    let mut conn = state.db.acquire().await.expect("connection");
    let user = conn
        .create(SEED_IDS.next_id(), &data, current_time_millis())
        .await
        .expect("seed user");
    user.id
}

/// 1x1 transparent PNG
pub const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];
