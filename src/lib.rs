// TAO Social - social networking backend on a TAO-style object/association store

// Configuration and shared state
pub mod app_state;
pub mod config;

// Common utilities
pub mod error;

// Entities, associations and their wire projections
pub mod models;

// Store, media gateway, security, extractors
pub mod infrastructure;

// Post lifecycle, social graph, notifications
pub mod services;

// HTTP routes
pub mod handlers;

// Re-exports for convenience
pub use app_state::AppState;
pub use error::{AppError, AppResult};
pub use handlers::create_router;
