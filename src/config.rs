use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Shard component embedded in every generated id
    pub shard_id: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    pub root: String,
    pub public_url: String,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let port: u16 = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .unwrap_or(3000);

        let shard_id: u16 = env::var("SHARD_ID")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .context("SHARD_ID must be an integer")?;
        if shard_id >= 1024 {
            anyhow::bail!("SHARD_ID must be less than 1024, got {}", shard_id);
        }

        Ok(Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://tao_social.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
                shard_id,
            },
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port,
            },
            auth: AuthConfig {
                jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            },
            media: MediaConfig {
                root: env::var("MEDIA_ROOT").unwrap_or_else(|_| "media".to_string()),
                public_url: env::var("MEDIA_PUBLIC_URL")
                    .unwrap_or_else(|_| format!("http://localhost:{}/media", port)),
                max_upload_bytes: env::var("MEDIA_MAX_UPLOAD_BYTES")
                    .unwrap_or_else(|_| "52428800".to_string())
                    .parse()
                    .unwrap_or(50 * 1024 * 1024),
            },
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Configuration for tests and local tooling: in-memory database, media under `media_root`.
    pub fn in_memory(jwt_secret: &str, media_root: &str) -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
                shard_id: 0,
            },
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            auth: AuthConfig {
                jwt_secret: jwt_secret.to_string(),
            },
            media: MediaConfig {
                root: media_root.to_string(),
                public_url: "http://localhost/media".to_string(),
                max_upload_bytes: 10 * 1024 * 1024,
            },
        }
    }
}
