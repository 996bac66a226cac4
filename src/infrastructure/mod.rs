// Core infrastructure modules
pub mod id_generator;      // Snowflake id generation
pub mod media;             // Media gateway seam and disk implementation
pub mod middleware;        // Request extractors
pub mod security;          // Password hashing and token verification
pub mod sqlite_database;   // Object/association store

pub use id_generator::TaoIdGenerator;
pub use media::{DiskMediaGateway, MediaGateway, MediaKind, MediaRef, MediaUpload};
pub use sqlite_database::{SqliteDatabase, TaoStore};
