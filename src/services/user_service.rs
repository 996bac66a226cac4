// Social graph and user directory - profiles, registration, follow toggle, suggestions, search

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use serde::Deserialize;
use sqlx::SqliteConnection;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::error::{AppError, AppResult};
use crate::infrastructure::id_generator::TaoIdGenerator;
use crate::infrastructure::media::{MediaGateway, MediaRef, MediaUpload};
use crate::infrastructure::security::{self, MIN_PASSWORD_LENGTH};
use crate::infrastructure::sqlite_database::{SqliteDatabase, TaoStore};
use crate::models::{
    current_time_millis, AssociationType, Ent, EntityType, NotificationKind, ProfileView, TaoId,
    UserData, UserSearchView,
};
use crate::services::notification_service::NotificationSink;

/// How many random candidates are drawn before filtering
pub const SUGGESTION_SAMPLE_SIZE: usize = 10;
/// How many suggestions are returned
pub const SUGGESTION_LIMIT: usize = 4;

/// Usernames that collide with fixed `/api/users/...` routes
pub const RESERVED_USERNAMES: [&str; 3] = ["me", "search", "suggested"];

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Partial profile update; empty or missing values leave the field unchanged
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
    pub bio: Option<String>,
    pub link: Option<String>,
    /// base64 `data:` URI
    pub profile_image: Option<String>,
    /// base64 `data:` URI
    pub cover_image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Followed,
    Unfollowed,
}

impl FollowOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            FollowOutcome::Followed => "following successfully",
            FollowOutcome::Unfollowed => "unfollowing",
        }
    }
}

/// Uniform random sample of up to `size` ids, in random order
pub fn sample_candidates<R: Rng + ?Sized>(
    candidates: &[TaoId],
    size: usize,
    rng: &mut R,
) -> Vec<TaoId> {
    let mut pool = candidates.to_vec();
    let amount = size.min(pool.len());
    let (sampled, _) = pool.partial_shuffle(rng, amount);
    sampled.to_vec()
}

/// Drop every id the actor already follows, keeping order
pub fn filter_followed(sampled: Vec<TaoId>, following: &HashSet<TaoId>) -> Vec<TaoId> {
    sampled
        .into_iter()
        .filter(|id| !following.contains(id))
        .collect()
}

fn ensure_not_reserved(username: &str) -> AppResult<()> {
    if RESERVED_USERNAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(username))
    {
        return Err(AppError::Validation("Username is not available".to_string()));
    }
    Ok(())
}

fn provided(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[derive(Clone)]
pub struct UserService {
    db: Arc<SqliteDatabase>,
    ids: Arc<TaoIdGenerator>,
    media: Arc<dyn MediaGateway>,
    notifications: NotificationSink,
}

impl UserService {
    pub fn new(
        db: Arc<SqliteDatabase>,
        ids: Arc<TaoIdGenerator>,
        media: Arc<dyn MediaGateway>,
        notifications: NotificationSink,
    ) -> Self {
        Self {
            db,
            ids,
            media,
            notifications,
        }
    }

    #[instrument(skip(self, registration), fields(username = %registration.username))]
    pub async fn register(&self, registration: Registration) -> AppResult<ProfileView> {
        let username = registration.username.trim().to_string();
        let full_name = registration.full_name.trim().to_string();
        let email = registration.email.trim().to_string();
        let password = registration.password;

        if username.is_empty() || full_name.is_empty() || email.is_empty() || password.is_empty() {
            return Err(AppError::Validation("All fields are required".to_string()));
        }
        ensure_not_reserved(&username)?;
        if !EMAIL_PATTERN.is_match(&email) {
            return Err(AppError::Validation("Invalid email format".to_string()));
        }
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(AppError::Validation(
                "Password must be at least 8 characters long".to_string(),
            ));
        }

        {
            let mut conn = self.db.acquire().await?;
            ensure_available(&mut conn, "username", &username, "Username is already taken").await?;
            ensure_available(&mut conn, "email", &email, "Email is already taken").await?;
        }

        let password_hash = security::blocking(move || security::hash_password(&password)).await?;

        let data = UserData {
            username,
            full_name,
            email,
            password_hash,
            bio: String::new(),
            link: String::new(),
            profile_image_url: String::new(),
            cover_image_url: String::new(),
        };

        let mut conn = self.db.acquire().await?;
        let user = conn
            .create(self.ids.next_id(), &data, current_time_millis())
            .await?;
        info!(user_id = user.id, "user registered");

        Ok(ProfileView::new(&user, Vec::new(), Vec::new(), Vec::new()))
    }

    pub async fn get_profile(&self, username: &str) -> AppResult<ProfileView> {
        let mut conn = self.db.acquire().await?;
        let user = find_by_username(&mut conn, username)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        profile_view(&mut conn, &user).await
    }

    /// Toggle the follow edge from `actor` to `target`.
    ///
    /// Both directions and the notification are written in one transaction.
    #[instrument(skip(self))]
    pub async fn follow_unfollow(&self, actor: TaoId, target: TaoId) -> AppResult<FollowOutcome> {
        if actor == target {
            return Err(AppError::Validation("You can't follow yourself".to_string()));
        }

        let mut tx = self.db.begin_transaction().await?;
        let actor_exists = tx.load::<UserData>(actor).await?.is_some();
        let target_exists = tx.load::<UserData>(target).await?.is_some();
        if !actor_exists || !target_exists {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        let outcome = if tx.assoc_exists(actor, AssociationType::Follow, target).await? {
            tx.assoc_delete(actor, AssociationType::Follow, target).await?;
            FollowOutcome::Unfollowed
        } else {
            tx.assoc_add(actor, AssociationType::Follow, target, current_time_millis())
                .await?;
            self.notifications
                .emit(&mut tx, actor, target, NotificationKind::Follow)
                .await?;
            FollowOutcome::Followed
        };
        tx.commit().await?;

        info!(actor, target, ?outcome, "follow toggled");
        Ok(outcome)
    }

    /// Up to four random users the actor does not follow yet
    pub async fn suggested_users(&self, actor: TaoId) -> AppResult<Vec<ProfileView>> {
        let mut conn = self.db.acquire().await?;
        if conn.load::<UserData>(actor).await?.is_none() {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        let following: HashSet<TaoId> = conn
            .assoc_targets(actor, AssociationType::Follow)
            .await?
            .into_iter()
            .collect();
        let candidates: Vec<TaoId> = conn
            .object_ids_by_type(EntityType::User)
            .await?
            .into_iter()
            .filter(|id| *id != actor)
            .collect();

        let sampled = sample_candidates(&candidates, SUGGESTION_SAMPLE_SIZE, &mut rand::rng());
        let mut picked = filter_followed(sampled, &following);
        picked.truncate(SUGGESTION_LIMIT);

        let mut users: HashMap<TaoId, Ent<UserData>> = conn
            .load_many::<UserData>(&picked)
            .await?
            .into_iter()
            .map(|user| (user.id, user))
            .collect();

        let mut suggestions = Vec::with_capacity(picked.len());
        for id in picked {
            if let Some(user) = users.remove(&id) {
                suggestions.push(profile_view(&mut conn, &user).await?);
            }
        }
        Ok(suggestions)
    }

    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, actor: TaoId, update: ProfileUpdate) -> AppResult<ProfileView> {
        let mut user = {
            let mut conn = self.db.acquire().await?;
            conn.load::<UserData>(actor)
                .await?
                .ok_or_else(|| AppError::NotFound("User not found".to_string()))?
        };

        match (provided(update.current_password), provided(update.new_password)) {
            (None, None) => {}
            (Some(current), Some(new_password)) => {
                let stored = user.data.password_hash.clone();
                let matches =
                    security::blocking(move || security::verify_password(&current, &stored)).await?;
                if !matches {
                    return Err(AppError::Unauthorized("Incorrect current password".to_string()));
                }
                if new_password.len() < MIN_PASSWORD_LENGTH {
                    return Err(AppError::Validation(
                        "Password must be at least 8 characters long".to_string(),
                    ));
                }
                user.data.password_hash =
                    security::blocking(move || security::hash_password(&new_password)).await?;
            }
            _ => {
                return Err(AppError::Validation(
                    "Please provide both current and new password".to_string(),
                ))
            }
        }

        let username = provided(update.username.map(|v| v.trim().to_string()));
        let email = provided(update.email.map(|v| v.trim().to_string()));
        {
            let mut conn = self.db.acquire().await?;
            if let Some(username) = username.as_deref().filter(|u| *u != user.data.username) {
                ensure_not_reserved(username)?;
                ensure_available(&mut conn, "username", username, "Username is already taken").await?;
            }
            if let Some(email) = email.as_deref().filter(|e| *e != user.data.email) {
                if !EMAIL_PATTERN.is_match(email) {
                    return Err(AppError::Validation("Invalid email format".to_string()));
                }
                ensure_available(&mut conn, "email", email, "Email is already taken").await?;
            }
        }

        // Decode both images before touching the gateway so a bad payload changes nothing
        let profile_image = provided(update.profile_image)
            .map(|uri| MediaUpload::from_data_uri(&uri))
            .transpose()?;
        let cover_image = provided(update.cover_image)
            .map(|uri| MediaUpload::from_data_uri(&uri))
            .transpose()?;

        if let Some(upload) = profile_image {
            user.data.profile_image_url = self
                .replace_image(&user.data.profile_image_url, upload)
                .await?;
        }
        if let Some(upload) = cover_image {
            user.data.cover_image_url = self.replace_image(&user.data.cover_image_url, upload).await?;
        }

        if let Some(username) = username {
            user.data.username = username;
        }
        if let Some(email) = email {
            user.data.email = email;
        }
        if let Some(full_name) = provided(update.full_name) {
            user.data.full_name = full_name;
        }
        if let Some(bio) = provided(update.bio) {
            user.data.bio = bio;
        }
        if let Some(link) = provided(update.link) {
            user.data.link = link;
        }

        let mut conn = self.db.acquire().await?;
        conn.save(&mut user, current_time_millis()).await?;
        info!(user_id = actor, "profile updated");

        profile_view(&mut conn, &user).await
    }

    /// Case-insensitive substring search over username and full name
    pub async fn search_users(&self, query: &str) -> AppResult<Vec<UserSearchView>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Validation("Search query is required".to_string()));
        }

        let mut conn = self.db.acquire().await?;
        conn.search_objects(EntityType::User, &["username", "fullName"], query)
            .await?
            .into_iter()
            .map(|obj| {
                Ent::<UserData>::decode(obj)
                    .map(|user| UserSearchView::from(&user))
                    .map_err(AppError::from)
            })
            .collect()
    }

    /// Best-effort removal of the previous image, then upload of the new one
    async fn replace_image(&self, previous_url: &str, upload: MediaUpload) -> AppResult<String> {
        if let Some(previous) = MediaRef::from_url(previous_url) {
            if let Err(e) = self.media.destroy(&previous).await {
                warn!(public_id = %previous.public_id, "failed to destroy previous image: {}", e);
            }
        }
        self.media.upload(upload).await
    }
}

async fn find_by_username(
    conn: &mut SqliteConnection,
    username: &str,
) -> AppResult<Option<Ent<UserData>>> {
    conn.find_object_by_field(EntityType::User, "username", username)
        .await?
        .map(Ent::<UserData>::decode)
        .transpose()
        .map_err(AppError::from)
}

async fn ensure_available(
    conn: &mut SqliteConnection,
    field: &str,
    value: &str,
    message: &str,
) -> AppResult<()> {
    if conn
        .find_object_by_field(EntityType::User, field, value)
        .await?
        .is_some()
    {
        return Err(AppError::Validation(message.to_string()));
    }
    Ok(())
}

async fn profile_view(conn: &mut SqliteConnection, user: &Ent<UserData>) -> AppResult<ProfileView> {
    let following = conn.assoc_targets(user.id, AssociationType::Follow).await?;
    let followers = conn.assoc_targets(user.id, AssociationType::FollowedBy).await?;
    let liked_posts = conn.assoc_targets(user.id, AssociationType::Like).await?;
    Ok(ProfileView::new(user, following, followers, liked_posts))
}
