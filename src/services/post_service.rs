// Post lifecycle - create/delete, like toggle, comments and the read-only feeds

use sqlx::SqliteConnection;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::error::{AppError, AppResult};
use crate::infrastructure::id_generator::TaoIdGenerator;
use crate::infrastructure::media::{MediaGateway, MediaRef, MediaUpload};
use crate::infrastructure::sqlite_database::{SqliteDatabase, TaoStore};
use crate::models::{
    current_time_millis, to_datetime, AssociationType, AuthorView, Comment, CommentView, Ent,
    EntityType, NotificationKind, PostData, PostView, TaoId, UserData,
};
use crate::services::notification_service::NotificationSink;

/// Input for post creation; at least one of the two must be present
#[derive(Debug, Default)]
pub struct NewPost {
    pub text: Option<String>,
    pub media: Option<MediaUpload>,
}

#[derive(Clone)]
pub struct PostService {
    db: Arc<SqliteDatabase>,
    ids: Arc<TaoIdGenerator>,
    media: Arc<dyn MediaGateway>,
    notifications: NotificationSink,
}

impl PostService {
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

    #[instrument(skip(self, new_post), fields(has_media = new_post.media.is_some()))]
    pub async fn create(&self, actor: TaoId, new_post: NewPost) -> AppResult<PostView> {
        let text = new_post.text.filter(|text| !text.trim().is_empty());
        let upload = new_post.media.filter(|media| !media.bytes.is_empty());
        if text.is_none() && upload.is_none() {
            return Err(AppError::Validation(
                "Post must have text, image, or video".to_string(),
            ));
        }

        {
            let mut conn = self.db.acquire().await?;
            if conn.load::<UserData>(actor).await?.is_none() {
                return Err(AppError::NotFound("User not found".to_string()));
            }
        }

        let media_url = match upload {
            Some(upload) => Some(self.media.upload(upload).await?),
            None => None,
        };

        let now = current_time_millis();
        let data = PostData {
            author: actor,
            text,
            media_url,
            comments: Vec::new(),
        };

        let mut tx = self.db.begin_transaction().await?;
        let post = tx.create(self.ids.next_id(), &data, now).await?;
        tx.assoc_add(actor, AssociationType::Authored, post.id, now)
            .await?;
        tx.commit().await?;

        info!(post_id = post.id, author = actor, "post created");

        let mut conn = self.db.acquire().await?;
        let mut views = self.render(&mut conn, vec![post]).await?;
        views
            .pop()
            .ok_or_else(|| AppError::Internal("Rendered post went missing".to_string()))
    }

    /// Only the author may delete. Media removal is best-effort and happens first.
    #[instrument(skip(self))]
    pub async fn delete(&self, actor: TaoId, post_id: TaoId) -> AppResult<TaoId> {
        let post = {
            let mut conn = self.db.acquire().await?;
            conn.load::<PostData>(post_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?
        };

        if post.data.author != actor {
            return Err(AppError::Unauthorized(
                "Unauthorized to delete this post".to_string(),
            ));
        }

        if let Some(media) = post.data.media_url.as_deref().and_then(MediaRef::from_url) {
            match self.media.destroy(&media).await {
                Ok(true) => info!(public_id = %media.public_id, "post media destroyed"),
                Ok(false) => warn!(public_id = %media.public_id, "post media was already gone"),
                Err(e) => warn!(public_id = %media.public_id, "failed to destroy post media: {}", e),
            }
        }

        let mut tx = self.db.begin_transaction().await?;
        tx.delete_object(post_id).await?;
        tx.commit().await?;

        info!(post_id, "post deleted");
        Ok(post_id)
    }

    /// Toggle the actor's like. Returns the post's like set afterwards.
    ///
    /// Both edges and the notification are written in one transaction.
    #[instrument(skip(self))]
    pub async fn like_unlike(&self, actor: TaoId, post_id: TaoId) -> AppResult<Vec<TaoId>> {
        let mut tx = self.db.begin_transaction().await?;

        if tx.load::<UserData>(actor).await?.is_none() {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        let post = tx
            .load::<PostData>(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

        if tx
            .assoc_exists(post_id, AssociationType::LikedBy, actor)
            .await?
        {
            tx.assoc_delete(actor, AssociationType::Like, post_id)
                .await?;
            info!(post_id, actor, "post unliked");
        } else {
            tx.assoc_add(actor, AssociationType::Like, post_id, current_time_millis())
                .await?;
            self.notifications
                .emit(&mut tx, actor, post.data.author, NotificationKind::Like)
                .await?;
            info!(post_id, actor, "post liked");
        }

        let likes = tx.assoc_targets(post_id, AssociationType::LikedBy).await?;
        tx.commit().await?;
        Ok(likes)
    }

    #[instrument(skip(self, text))]
    pub async fn comment(&self, actor: TaoId, post_id: TaoId, text: &str) -> AppResult<CommentView> {
        if text.trim().is_empty() {
            return Err(AppError::Validation("Text is required".to_string()));
        }

        let comment = Comment {
            author: actor,
            text: text.to_string(),
            created_at: current_time_millis(),
        };

        let mut tx = self.db.begin_transaction().await?;
        let author = tx
            .load::<UserData>(actor)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        let mut post = tx
            .load::<PostData>(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;
        post.data.comments.push(comment.clone());
        tx.save(&mut post, comment.created_at).await?;
        tx.commit().await?;

        Ok(CommentView::new(&comment, Some(AuthorView::from(&author))))
    }

    /// Every post, newest first
    pub async fn all_posts(&self) -> AppResult<Vec<PostView>> {
        let mut conn = self.db.acquire().await?;
        let posts = conn.load_all::<PostData>().await?;
        self.render(&mut conn, posts).await
    }

    /// Posts by everyone the actor follows, newest first
    pub async fn following_feed(&self, actor: TaoId) -> AppResult<Vec<PostView>> {
        let mut conn = self.db.acquire().await?;
        if conn.load::<UserData>(actor).await?.is_none() {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        let following = conn.assoc_targets(actor, AssociationType::Follow).await?;
        let post_ids: Vec<TaoId> = conn
            .assoc_range_many(&following, AssociationType::Authored)
            .await?
            .into_iter()
            .map(|assoc| assoc.id2)
            .collect();

        let mut posts = conn.load_many::<PostData>(&post_ids).await?;
        sort_newest_first(&mut posts);
        self.render(&mut conn, posts).await
    }

    /// Posts authored by `username`, newest first
    pub async fn user_posts(&self, username: &str) -> AppResult<Vec<PostView>> {
        let mut conn = self.db.acquire().await?;
        let user = conn
            .find_object_by_field(EntityType::User, "username", username)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let post_ids = conn.assoc_targets(user.id, AssociationType::Authored).await?;
        let mut posts = conn.load_many::<PostData>(&post_ids).await?;
        sort_newest_first(&mut posts);
        self.render(&mut conn, posts).await
    }

    /// Posts liked by `user_id`, in the order they were liked
    pub async fn liked_posts(&self, user_id: TaoId) -> AppResult<Vec<PostView>> {
        let mut conn = self.db.acquire().await?;
        if conn.load::<UserData>(user_id).await?.is_none() {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        let liked = conn.assoc_targets(user_id, AssociationType::Like).await?;
        let mut by_id: HashMap<TaoId, Ent<PostData>> = conn
            .load_many::<PostData>(&liked)
            .await?
            .into_iter()
            .map(|post| (post.id, post))
            .collect();
        let posts = liked.iter().filter_map(|id| by_id.remove(id)).collect();
        self.render(&mut conn, posts).await
    }

    /// Expand authors, comment authors and likes for a batch of posts, keeping their order
    async fn render(
        &self,
        conn: &mut SqliteConnection,
        posts: Vec<Ent<PostData>>,
    ) -> AppResult<Vec<PostView>> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let post_ids: Vec<TaoId> = posts.iter().map(|post| post.id).collect();
        let mut likes: HashMap<TaoId, Vec<TaoId>> = HashMap::new();
        for assoc in conn
            .assoc_range_many(&post_ids, AssociationType::LikedBy)
            .await?
        {
            likes.entry(assoc.id1).or_default().push(assoc.id2);
        }

        let user_ids: Vec<TaoId> = posts
            .iter()
            .flat_map(|post| {
                std::iter::once(post.data.author)
                    .chain(post.data.comments.iter().map(|comment| comment.author))
            })
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let authors: HashMap<TaoId, AuthorView> = conn
            .load_many::<UserData>(&user_ids)
            .await?
            .iter()
            .map(|user| (user.id, AuthorView::from(user)))
            .collect();

        Ok(posts
            .into_iter()
            .map(|post| PostView {
                id: post.id,
                author: authors.get(&post.data.author).cloned(),
                likes: likes.remove(&post.id).unwrap_or_default(),
                comments: post
                    .data
                    .comments
                    .iter()
                    .map(|comment| CommentView::new(comment, authors.get(&comment.author).cloned()))
                    .collect(),
                text: post.data.text,
                media_url: post.data.media_url,
                created_at: to_datetime(post.created),
                updated_at: to_datetime(post.updated),
            })
            .collect())
    }
}

fn sort_newest_first(posts: &mut [Ent<PostData>]) {
    posts.sort_by(|a, b| (b.created, b.id).cmp(&(a.created, a.id)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: TaoId, created: i64) -> Ent<PostData> {
        Ent {
            id,
            created,
            updated: created,
            data: PostData {
                author: 1,
                text: Some(format!("post {}", id)),
                media_url: None,
                comments: Vec::new(),
            },
        }
    }

    #[test]
    fn newest_first_breaks_ties_by_id() {
        let mut posts = vec![post(1, 10), post(3, 30), post(2, 30)];
        sort_newest_first(&mut posts);
        let order: Vec<TaoId> = posts.iter().map(|p| p.id).collect();
        assert_eq!(order, vec![3, 2, 1]);
    }
}
