mod common;

use std::collections::HashSet;

use common::{file_backed_state, seed_user, test_state, PNG_BYTES};
use tao_social::error::AppError;
use tao_social::infrastructure::media::MediaUpload;
use tao_social::models::NotificationKind;
use tao_social::services::{FollowOutcome, NewPost, ProfileUpdate, Registration};

fn text_post(text: &str) -> NewPost {
    NewPost {
        text: Some(text.to_string()),
        media: None,
    }
}

#[tokio::test]
async fn test_post_comment_like_scenario() {
    let (state, _media) = test_state().await;
    let alice = seed_user(&state, "alice").await;
    let bob = seed_user(&state, "bob").await;

    let post = state.posts.create(alice, text_post("hello")).await.unwrap();
    assert_eq!(post.text.as_deref(), Some("hello"));
    assert_eq!(post.author.as_ref().unwrap().username, "alice");
    assert!(post.likes.is_empty());
    assert!(post.comments.is_empty());

    let comment = state.posts.comment(bob, post.id, "nice").await.unwrap();
    assert_eq!(comment.text, "nice");
    assert_eq!(comment.author.unwrap().id, bob);

    let likes = state.posts.like_unlike(bob, post.id).await.unwrap();
    assert_eq!(likes, vec![bob]);

    let feed = state.posts.all_posts().await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].likes, vec![bob]);
    assert_eq!(feed[0].comments.len(), 1);
    assert_eq!(feed[0].comments[0].author.as_ref().unwrap().username, "bob");

    let notifications = state.notifications.notifications_for(alice).await.unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].data.kind, NotificationKind::Like);
    assert_eq!(notifications[0].data.from, bob);
}

#[tokio::test]
async fn test_like_toggle_twice_restores_state() {
    let (state, _media) = test_state().await;
    let alice = seed_user(&state, "alice").await;
    let bob = seed_user(&state, "bob").await;
    let post = state.posts.create(alice, text_post("toggle me")).await.unwrap();

    assert_eq!(state.posts.like_unlike(bob, post.id).await.unwrap(), vec![bob]);
    assert!(state.posts.like_unlike(bob, post.id).await.unwrap().is_empty());

    let profile = state.users.get_profile("bob").await.unwrap();
    assert!(profile.liked_posts.is_empty());
    assert!(state.posts.liked_posts(bob).await.unwrap().is_empty());

    // Only the like emits; the unlike does not retract it
    let notifications = state.notifications.notifications_for(alice).await.unwrap();
    assert_eq!(notifications.len(), 1);
}

#[tokio::test]
async fn test_liked_posts_follow_like_order() {
    let (state, _media) = test_state().await;
    let alice = seed_user(&state, "alice").await;
    let bob = seed_user(&state, "bob").await;

    let first = state.posts.create(alice, text_post("first")).await.unwrap();
    let second = state.posts.create(alice, text_post("second")).await.unwrap();

    state.posts.like_unlike(bob, second.id).await.unwrap();
    state.posts.like_unlike(bob, first.id).await.unwrap();

    let liked: Vec<_> = state
        .posts
        .liked_posts(bob)
        .await
        .unwrap()
        .into_iter()
        .map(|post| post.id)
        .collect();
    assert_eq!(liked, vec![second.id, first.id]);

    let profile = state.users.get_profile("bob").await.unwrap();
    assert_eq!(profile.liked_posts, vec![second.id, first.id]);
}

#[tokio::test]
async fn test_follow_unfollow_keeps_both_sides_in_sync() {
    let (state, _media) = test_state().await;
    let alice = seed_user(&state, "alice").await;
    let bob = seed_user(&state, "bob").await;

    let outcome = state.users.follow_unfollow(alice, bob).await.unwrap();
    assert_eq!(outcome, FollowOutcome::Followed);

    let alice_profile = state.users.get_profile("alice").await.unwrap();
    let bob_profile = state.users.get_profile("bob").await.unwrap();
    assert_eq!(alice_profile.following, vec![bob]);
    assert_eq!(bob_profile.followers, vec![alice]);

    let notifications = state.notifications.notifications_for(bob).await.unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].data.kind, NotificationKind::Follow);

    let outcome = state.users.follow_unfollow(alice, bob).await.unwrap();
    assert_eq!(outcome, FollowOutcome::Unfollowed);
    assert!(state.users.get_profile("alice").await.unwrap().following.is_empty());
    assert!(state.users.get_profile("bob").await.unwrap().followers.is_empty());
    assert_eq!(state.notifications.notifications_for(bob).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_follow_rejects_self_and_missing_users() {
    let (state, _media) = test_state().await;
    let alice = seed_user(&state, "alice").await;

    let err = state.users.follow_unfollow(alice, alice).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(ref m) if m == "You can't follow yourself"));

    let err = state.users.follow_unfollow(alice, 424242).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(ref m) if m == "User not found"));
    assert!(state.notifications.notifications_for(424242).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_following_feed_only_shows_followed_authors() {
    let (state, _media) = test_state().await;
    let alice = seed_user(&state, "alice").await;
    let bob = seed_user(&state, "bob").await;
    let carol = seed_user(&state, "carol").await;

    let from_bob = state.posts.create(bob, text_post("from bob")).await.unwrap();
    state.posts.create(carol, text_post("from carol")).await.unwrap();
    let later_from_bob = state.posts.create(bob, text_post("bob again")).await.unwrap();

    assert!(state.posts.following_feed(alice).await.unwrap().is_empty());

    state.users.follow_unfollow(alice, bob).await.unwrap();
    let feed: Vec<_> = state
        .posts
        .following_feed(alice)
        .await
        .unwrap()
        .into_iter()
        .map(|post| post.id)
        .collect();
    assert_eq!(feed, vec![later_from_bob.id, from_bob.id]);

    let all = state.posts.all_posts().await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].id, later_from_bob.id);
}

#[tokio::test]
async fn test_user_posts_by_username() {
    let (state, _media) = test_state().await;
    let alice = seed_user(&state, "alice").await;
    let bob = seed_user(&state, "bob").await;

    state.posts.create(alice, text_post("mine")).await.unwrap();
    state.posts.create(bob, text_post("not mine")).await.unwrap();

    let posts = state.posts.user_posts("alice").await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].text.as_deref(), Some("mine"));

    let err = state.posts.user_posts("nobody").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_create_requires_text_or_media() {
    let (state, _media) = test_state().await;
    let alice = seed_user(&state, "alice").await;

    let err = state.posts.create(alice, NewPost::default()).await.unwrap_err();
    assert!(
        matches!(err, AppError::Validation(ref m) if m == "Post must have text, image, or video")
    );

    let err = state.posts.create(alice, text_post("   ")).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = state.posts.create(99, text_post("ghost")).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(state.posts.all_posts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_media_post_delete_removes_file() {
    let (state, media) = test_state().await;
    let alice = seed_user(&state, "alice").await;

    let post = state
        .posts
        .create(
            alice,
            NewPost {
                text: None,
                media: Some(MediaUpload {
                    bytes: PNG_BYTES.to_vec(),
                    content_type: "image/png".to_string(),
                }),
            },
        )
        .await
        .unwrap();

    let url = post.media_url.clone().unwrap();
    assert!(url.starts_with("http://localhost/media/image/"));
    let file_name = url.rsplit('/').next().unwrap();
    let stored = media.path().join("image").join(file_name);
    assert!(stored.exists());

    let deleted = state.posts.delete(alice, post.id).await.unwrap();
    assert_eq!(deleted, post.id);
    assert!(!stored.exists());
    assert!(state.posts.all_posts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_by_non_author_is_unauthorized() {
    let (state, _media) = test_state().await;
    let alice = seed_user(&state, "alice").await;
    let bob = seed_user(&state, "bob").await;
    let post = state.posts.create(alice, text_post("keep out")).await.unwrap();
    state.posts.like_unlike(bob, post.id).await.unwrap();

    let err = state.posts.delete(bob, post.id).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(ref m) if m == "Unauthorized to delete this post"));
    assert_eq!(state.posts.all_posts().await.unwrap().len(), 1);

    state.posts.delete(alice, post.id).await.unwrap();
    // Deleting the post clears its like edges from the liker's side too
    assert!(state.users.get_profile("bob").await.unwrap().liked_posts.is_empty());

    let err = state.posts.delete(alice, post.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(ref m) if m == "Post not found"));
}

#[tokio::test]
async fn test_comment_validation_and_missing_post() {
    let (state, _media) = test_state().await;
    let alice = seed_user(&state, "alice").await;
    let post = state.posts.create(alice, text_post("hi")).await.unwrap();

    let err = state.posts.comment(alice, post.id, "").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(ref m) if m == "Text is required"));

    let err = state.posts.comment(alice, 7, "hello?").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = state.posts.like_unlike(alice, 7).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_suggestions_exclude_self_and_followed() {
    let (state, _media) = test_state().await;
    let alice = seed_user(&state, "alice").await;
    let mut others = Vec::new();
    for name in ["bob", "carol", "dave", "erin", "frank", "grace"] {
        others.push(seed_user(&state, name).await);
    }
    state.users.follow_unfollow(alice, others[0]).await.unwrap();
    state.users.follow_unfollow(alice, others[1]).await.unwrap();

    for _ in 0..5 {
        let suggestions = state.users.suggested_users(alice).await.unwrap();
        assert!(suggestions.len() <= 4);
        assert!(!suggestions.is_empty());
        for user in &suggestions {
            assert_ne!(user.id, alice);
            assert_ne!(user.id, others[0]);
            assert_ne!(user.id, others[1]);
            assert!(user.password.is_none());
        }
    }
}

#[tokio::test]
async fn test_search_is_case_insensitive_substring() {
    let (state, _media) = test_state().await;
    seed_user(&state, "alice").await;
    seed_user(&state, "malice").await;
    seed_user(&state, "bob").await;

    let mut found: Vec<_> = state
        .users
        .search_users("ALI")
        .await
        .unwrap()
        .into_iter()
        .map(|user| user.username)
        .collect();
    found.sort();
    assert_eq!(found, vec!["alice", "malice"]);

    // Full name matches as well
    let by_name = state.users.search_users("bob ex").await.unwrap();
    assert_eq!(by_name.len(), 1);

    // LIKE wildcards are literal
    assert!(state.users.search_users("%").await.unwrap().is_empty());

    let err = state.users.search_users("  ").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(ref m) if m == "Search query is required"));
}

#[tokio::test]
async fn test_register_and_change_password() {
    let (state, _media) = test_state().await;

    let profile = state
        .users
        .register(Registration {
            username: "alice".into(),
            full_name: "Alice Example".into(),
            email: "alice@example.com".into(),
            password: "correct horse".into(),
        })
        .await
        .unwrap();
    assert_eq!(profile.username, "alice");
    assert!(profile.password.is_none());

    let err = state
        .users
        .register(Registration {
            username: "alice".into(),
            full_name: "Other".into(),
            email: "other@example.com".into(),
            password: "long enough".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(ref m) if m == "Username is already taken"));

    let only_one = ProfileUpdate {
        current_password: Some("correct horse".into()),
        ..Default::default()
    };
    let err = state.users.update_profile(profile.id, only_one).await.unwrap_err();
    assert!(
        matches!(err, AppError::Validation(ref m) if m == "Please provide both current and new password")
    );

    let wrong = ProfileUpdate {
        current_password: Some("wrong horse".into()),
        new_password: Some("battery staple".into()),
        ..Default::default()
    };
    let err = state.users.update_profile(profile.id, wrong).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(ref m) if m == "Incorrect current password"));

    let short = ProfileUpdate {
        current_password: Some("correct horse".into()),
        new_password: Some("short".into()),
        ..Default::default()
    };
    let err = state.users.update_profile(profile.id, short).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let changed = ProfileUpdate {
        current_password: Some("correct horse".into()),
        new_password: Some("battery staple".into()),
        bio: Some("hello there".into()),
        ..Default::default()
    };
    let updated = state.users.update_profile(profile.id, changed).await.unwrap();
    assert_eq!(updated.bio, "hello there");
    assert_eq!(updated.username, "alice");
}

#[tokio::test]
async fn test_register_validation() {
    let (state, _media) = test_state().await;

    let missing = Registration {
        username: "alice".into(),
        full_name: String::new(),
        email: "alice@example.com".into(),
        password: "long enough".into(),
    };
    let err = state.users.register(missing).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(ref m) if m == "All fields are required"));

    let bad_email = Registration {
        username: "alice".into(),
        full_name: "Alice".into(),
        email: "not-an-email".into(),
        password: "long enough".into(),
    };
    let err = state.users.register(bad_email).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(ref m) if m == "Invalid email format"));

    let short = Registration {
        username: "alice".into(),
        full_name: "Alice".into(),
        email: "alice@example.com".into(),
        password: "short".into(),
    };
    let err = state.users.register(short).await.unwrap_err();
    assert!(
        matches!(err, AppError::Validation(ref m) if m == "Password must be at least 8 characters long")
    );
}

#[tokio::test]
async fn test_profile_update_fields_and_images() {
    let (state, media) = test_state().await;
    let alice = seed_user(&state, "alice").await;
    seed_user(&state, "bob").await;

    let taken = ProfileUpdate {
        username: Some("bob".into()),
        ..Default::default()
    };
    let err = state.users.update_profile(alice, taken).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(ref m) if m == "Username is already taken"));

    use base64::Engine;
    let data_uri = format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(PNG_BYTES)
    );

    let update = ProfileUpdate {
        username: Some("alice2".into()),
        full_name: Some("Alice Renamed".into()),
        link: Some("https://example.com".into()),
        profile_image: Some(data_uri.clone()),
        ..Default::default()
    };
    let updated = state.users.update_profile(alice, update).await.unwrap();
    assert_eq!(updated.username, "alice2");
    assert_eq!(updated.full_name, "Alice Renamed");
    assert_eq!(updated.link, "https://example.com");
    assert!(updated.profile_image_url.contains("/image/"));
    assert!(updated.cover_image_url.is_empty());

    let first_image = updated.profile_image_url.rsplit('/').next().unwrap().to_string();
    assert!(media.path().join("image").join(&first_image).exists());

    // Replacing the image removes the previous file
    let replace = ProfileUpdate {
        profile_image: Some(data_uri),
        ..Default::default()
    };
    let replaced = state.users.update_profile(alice, replace).await.unwrap();
    assert_ne!(replaced.profile_image_url, updated.profile_image_url);
    assert!(!media.path().join("image").join(&first_image).exists());

    assert!(state.users.get_profile("alice").await.is_err());
    assert_eq!(state.users.get_profile("alice2").await.unwrap().id, alice);
}

#[tokio::test]
async fn test_writes_require_an_existing_actor() {
    let (state, _media) = test_state().await;
    let alice = seed_user(&state, "alice").await;
    let post = state.posts.create(alice, text_post("hello")).await.unwrap();
    let ghost = 987_654_321;

    let err = state.posts.like_unlike(ghost, post.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(ref m) if m == "User not found"));

    let err = state.posts.comment(ghost, post.id, "boo").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(ref m) if m == "User not found"));

    let posts = state.posts.all_posts().await.unwrap();
    assert!(posts[0].likes.is_empty());
    assert!(posts[0].comments.is_empty());
    assert!(state.notifications.notifications_for(alice).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_comments_are_all_stored() {
    let (state, _dir) = file_backed_state(5).await;
    let alice = seed_user(&state, "alice").await;
    let post_id = state.posts.create(alice, text_post("busy thread")).await.unwrap().id;

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..20 {
        let posts = state.posts.clone();
        tasks.spawn(async move { posts.comment(alice, post_id, &format!("comment {}", i)).await });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.unwrap().unwrap();
    }

    let stored = state.posts.user_posts("alice").await.unwrap();
    let texts: HashSet<String> = stored[0].comments.iter().map(|c| c.text.clone()).collect();
    assert_eq!(stored[0].comments.len(), 20);
    assert_eq!(texts.len(), 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_likes_from_different_users_all_land() {
    let (state, _dir) = file_backed_state(5).await;
    let alice = seed_user(&state, "alice").await;
    let post_id = state.posts.create(alice, text_post("like me")).await.unwrap().id;

    let mut likers = Vec::new();
    for i in 0..8 {
        likers.push(seed_user(&state, &format!("fan{}", i)).await);
    }

    let mut tasks = tokio::task::JoinSet::new();
    for liker in likers.clone() {
        let posts = state.posts.clone();
        tasks.spawn(async move { posts.like_unlike(liker, post_id).await });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.unwrap().unwrap();
    }

    let stored = state.posts.user_posts("alice").await.unwrap();
    let likes: HashSet<_> = stored[0].likes.iter().copied().collect();
    assert_eq!(likes, likers.into_iter().collect::<HashSet<_>>());
    assert_eq!(state.notifications.notifications_for(alice).await.unwrap().len(), 8);
}

#[tokio::test]
async fn test_route_names_cannot_become_usernames() {
    let (state, _media) = test_state().await;
    let alice = seed_user(&state, "alice").await;

    let err = state
        .users
        .register(Registration {
            username: "me".into(),
            full_name: "Me".into(),
            email: "me@example.com".into(),
            password: "long enough".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(ref m) if m == "Username is not available"));

    let rename = ProfileUpdate {
        username: Some("search".into()),
        ..Default::default()
    };
    let err = state.users.update_profile(alice, rename).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(ref m) if m == "Username is not available"));
    assert_eq!(state.users.get_profile("alice").await.unwrap().id, alice);
}
