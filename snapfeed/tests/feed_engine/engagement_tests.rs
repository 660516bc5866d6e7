use super::support::*;

#[tokio::test]
async fn concurrent_likes_are_all_counted() {
    let Harness { client, .. } = harness();
    let (owner_session, _) = signup(&client, "owner").await;
    let post = post_as(&client, &owner_session, "popular").await;
    let (_, a) = signup(&client, "liker_a").await;
    let (_, b) = signup(&client, "liker_b").await;
    let (_, c) = signup(&client, "liker_c").await;

    let engagement = client.engagement();
    let (ra, rb, rc) = tokio::join!(
        engagement.like(&post.post_id, &a.uid),
        engagement.like(&post.post_id, &b.uid),
        engagement.like(&post.post_id, &c.uid),
    );
    for result in [ra, rb, rc] {
        result.expect("like");
    }
    assert_eq!(client.posts().get_post(&post.post_id).await.expect("post").like_count, 3);

    let count = engagement.unlike(&post.post_id, &b.uid).await.expect("unlike");
    assert_eq!(count, 2);
    assert_eq!(client.posts().get_post(&post.post_id).await.expect("post").like_count, 2);
    assert_eq!(engagement.likers(&post.post_id).await.expect("likers").len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn likes_from_many_tasks_never_lose_increments() {
    let Harness { client, .. } = harness();
    let (owner_session, _) = signup(&client, "owner").await;
    let post = post_as(&client, &owner_session, "viral").await;

    let mut handles = Vec::new();
    for index in 0..20 {
        let engagement = client.engagement();
        let post_id = post.post_id.clone();
        handles.push(tokio::spawn(async move {
            engagement.like(&post_id, &format!("fan{index}")).await
        }));
    }
    for handle in handles {
        handle.await.expect("join").expect("like");
    }

    assert_eq!(client.posts().get_post(&post.post_id).await.expect("post").like_count, 20);
}

#[tokio::test]
async fn like_is_idempotent_and_notifies_once() {
    let Harness { client, .. } = harness();
    let (owner_session, owner) = signup(&client, "owner").await;
    let (fan_session, fan) = signup(&client, "fan").await;
    let post = post_as(&client, &owner_session, "hello").await;

    assert_eq!(client.like(&fan_session, &post.post_id).await.expect("like"), 1);
    assert_eq!(client.like(&fan_session, &post.post_id).await.expect("like again"), 1);
    client.flush().await;

    assert!(client.engagement().has_liked(&post.post_id, &fan.uid).await.expect("has_liked"));
    let notifications = client.notifications().list_notifications(&owner.uid).await.expect("notifications");
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::Like);
    assert_eq!(notifications[0].post_id.as_deref(), Some(post.post_id.as_str()));
    assert_eq!(notifications[0].post_image_ref.as_deref(), Some(post.image_ref.as_str()));
}

#[tokio::test]
async fn self_like_counts_but_does_not_notify() {
    let Harness { client, .. } = harness();
    let (session, user) = signup(&client, "narcissus").await;
    let post = post_as(&client, &session, "me").await;

    assert_eq!(client.like(&session, &post.post_id).await.expect("like"), 1);
    client.flush().await;

    assert!(client.notifications().list_notifications(&user.uid).await.expect("notifications").is_empty());
}

#[tokio::test]
async fn unlike_without_like_is_a_no_op() {
    let Harness { client, .. } = harness();
    let (session, _) = signup(&client, "owner").await;
    let (_, other) = signup(&client, "other").await;
    let post = post_as(&client, &session, "quiet").await;

    assert_eq!(client.engagement().unlike(&post.post_id, &other.uid).await.expect("unlike"), 0);
    assert_eq!(client.posts().get_post(&post.post_id).await.expect("post").like_count, 0);
}

#[tokio::test]
async fn drifted_counter_never_goes_negative() {
    let Harness { client, store } = harness();
    let (session, _) = signup(&client, "owner").await;
    let (_, fan) = signup(&client, "fan").await;
    let post = post_as(&client, &session, "drift").await;
    client.engagement().like(&post.post_id, &fan.uid).await.expect("like");

    let keys = keys(&client);
    store
        .apply(MutationPlan::new().set_field(keys.post(&post.post_id), "like_count", "0"))
        .await
        .expect("inject drift");

    assert_eq!(client.engagement().unlike(&post.post_id, &fan.uid).await.expect("unlike"), 0);
    assert_eq!(client.posts().get_post(&post.post_id).await.expect("post").like_count, 0);
}

#[tokio::test]
async fn reconcile_repairs_counter_drift() {
    let Harness { client, store } = harness();
    let (session, _) = signup(&client, "owner").await;
    let (_, fan) = signup(&client, "fan").await;
    let post = post_as(&client, &session, "drift").await;
    client.engagement().like(&post.post_id, &fan.uid).await.expect("like");

    let keys = keys(&client);
    store
        .apply(MutationPlan::new().set_field(keys.post(&post.post_id), "like_count", "7"))
        .await
        .expect("inject drift");

    assert_eq!(client.engagement().reconcile_like_count(&post.post_id).await.expect("reconcile"), 1);
    assert_eq!(client.posts().get_post(&post.post_id).await.expect("post").like_count, 1);
}

#[tokio::test]
async fn liking_missing_post_is_not_found() {
    let Harness { client, .. } = harness();
    let (_, fan) = signup(&client, "fan").await;

    match client.engagement().like("missing", &fan.uid).await {
        Err(FeedError::NotFound { entity, .. }) => assert_eq!(entity, "post"),
        other => panic!("expected not found, got {other:?}"),
    }
    assert!(matches!(
        client.engagement().unlike("missing", &fan.uid).await,
        Err(FeedError::NotFound { entity: "post", .. })
    ));
}

#[tokio::test]
async fn comments_copy_author_details_and_list_newest_first() {
    let Harness { client, .. } = harness();
    let (owner_session, owner) = signup(&client, "owner").await;
    let (fan_session, fan) = signup(&client, "fan").await;
    let post = post_as(&client, &owner_session, "talk to me").await;

    let first = client.comment(&fan_session, &post.post_id, "first!").await.expect("comment");
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = client.comment(&owner_session, &post.post_id, "thanks").await.expect("comment");
    client.flush().await;

    assert_eq!(first.username, "fan");
    assert_eq!(first.uid, fan.uid);
    assert_eq!(first.profile_image_ref, fan.profile_image_ref);

    let comments = client.engagement().list_comments(&post.post_id).await.expect("comments");
    let ids: Vec<&str> = comments.iter().map(|comment| comment.comment_id.as_str()).collect();
    assert_eq!(ids, vec![second.comment_id.as_str(), first.comment_id.as_str()]);

    // Only the fan's comment notifies; the owner's own reply does not.
    let notifications = client.notifications().list_notifications(&owner.uid).await.expect("notifications");
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::Comment);
}

#[tokio::test]
async fn blank_or_oversized_comments_are_rejected() {
    let Harness { client, .. } = harness();
    let (session, _) = signup(&client, "owner").await;
    let post = post_as(&client, &session, "hi").await;

    assert!(matches!(
        client.comment(&session, &post.post_id, "   ").await,
        Err(FeedError::Validation(_))
    ));
    let long = "x".repeat(snapfeed::validators::MAX_COMMENT_CHARS + 1);
    assert!(matches!(
        client.comment(&session, &post.post_id, &long).await,
        Err(FeedError::Validation(_))
    ));
    assert!(client.engagement().list_comments(&post.post_id).await.expect("comments").is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mixed_likes_and_unlikes_track_distinct_likers() {
    let Harness { client, .. } = harness();
    let (owner_session, _) = signup(&client, "owner").await;
    let post = post_as(&client, &owner_session, "busy").await;

    let mut handles = Vec::new();
    for index in 0..30usize {
        let engagement = client.engagement();
        let post_id = post.post_id.clone();
        let uid = format!("fan{}", index % 6);
        handles.push(tokio::spawn(async move {
            if index % 3 == 2 {
                engagement.unlike(&post_id, &uid).await
            } else {
                engagement.like(&post_id, &uid).await
            }
        }));
    }
    for handle in handles {
        let count = handle.await.expect("join").expect("like or unlike");
        assert!(count >= 0);
    }

    let likers = client.engagement().likers(&post.post_id).await.expect("likers");
    let like_count = client.posts().get_post(&post.post_id).await.expect("post").like_count;
    assert_eq!(like_count, likers.len() as i64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reconcile_racing_likes_never_drops_an_increment() {
    let Harness { client, .. } = harness();
    let (owner_session, _) = signup(&client, "owner").await;
    let post = post_as(&client, &owner_session, "repair me").await;

    let mut handles = Vec::new();
    for index in 0..40usize {
        let engagement = client.engagement();
        let post_id = post.post_id.clone();
        handles.push(tokio::spawn(async move {
            if index % 4 == 0 {
                engagement.reconcile_like_count(&post_id).await
            } else {
                engagement.like(&post_id, &format!("fan{index}")).await
            }
        }));
    }
    for handle in handles {
        handle.await.expect("join").expect("like or reconcile");
    }

    let like_count = client.posts().get_post(&post.post_id).await.expect("post").like_count;
    assert_eq!(like_count, 30);
    assert_eq!(client.engagement().reconcile_like_count(&post.post_id).await.expect("reconcile"), 30);
}

#[tokio::test]
async fn reconciling_missing_post_is_not_found() {
    let Harness { client, .. } = harness();
    assert!(matches!(
        client.engagement().reconcile_like_count("missing").await,
        Err(FeedError::NotFound { entity: "post", .. })
    ));
}
