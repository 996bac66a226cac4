pub mod notification_service;
pub mod post_service;
pub mod user_service;

pub use notification_service::NotificationSink;
pub use post_service::{NewPost, PostService};
pub use user_service::{FollowOutcome, ProfileUpdate, Registration, UserService};
