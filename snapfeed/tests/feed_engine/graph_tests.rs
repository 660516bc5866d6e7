use super::support::*;

#[tokio::test]
async fn self_follow_is_rejected_without_side_effects() {
    let Harness { client, .. } = harness();
    let (_, alice) = signup(&client, "alice").await;

    let result = client.graph().follow(&alice.uid, &alice.uid).await;
    assert!(matches!(result, Err(FeedError::InvalidOperation { .. })));
    client.flush().await;

    assert!(client.graph().following(&alice.uid).await.expect("following").is_empty());
    assert!(client.graph().followers(&alice.uid).await.expect("followers").is_empty());
    assert!(client.notifications().list_notifications(&alice.uid).await.expect("notifications").is_empty());
    assert_eq!(client.queue_stats().completed, 0);
}

#[tokio::test]
async fn following_unknown_user_is_not_found() {
    let Harness { client, .. } = harness();
    let (_, alice) = signup(&client, "alice").await;

    match client.graph().follow(&alice.uid, "nobody").await {
        Err(FeedError::NotFound { entity, id }) => {
            assert_eq!(entity, "user");
            assert_eq!(id, "nobody");
        }
        other => panic!("expected not found, got {other:?}"),
    }
    assert!(!client.graph().is_following(&alice.uid, "nobody").await.expect("is_following"));
}

#[tokio::test]
async fn follow_is_idempotent_and_notifies_once() {
    let Harness { client, .. } = harness();
    let (bob_session, bob) = signup(&client, "bob").await;
    let (_, alice) = signup(&client, "alice").await;

    assert!(client.follow(&bob_session, &alice.uid).await.expect("first follow"));
    assert!(!client.follow(&bob_session, &alice.uid).await.expect("second follow"));
    client.flush().await;

    assert!(client.graph().is_following(&bob.uid, &alice.uid).await.expect("is_following"));
    assert!(!client.graph().is_following(&alice.uid, &bob.uid).await.expect("reverse"));
    assert_eq!(client.graph().followers(&alice.uid).await.expect("followers").len(), 1);

    let notifications = client.notifications().list_notifications(&alice.uid).await.expect("notifications");
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::Follow);
    assert_eq!(notifications[0].actor_uid, bob.uid);
    assert!(notifications[0].post_id.is_none());
}

#[tokio::test]
async fn follow_then_unfollow_restores_feed() {
    let Harness { client, .. } = harness();
    let (alice_session, alice) = signup(&client, "alice").await;
    let (bob_session, bob) = signup(&client, "bob").await;
    let own = post_as(&client, &bob_session, "mine").await;
    post_as(&client, &alice_session, "one").await;
    post_as(&client, &alice_session, "two").await;
    client.flush().await;
    let before = client.fanout().feed_entries(&bob.uid).await.expect("entries");

    client.follow(&bob_session, &alice.uid).await.expect("follow");
    client.flush().await;
    assert_eq!(feed_ids(&client, &bob.uid).await.len(), 3);

    assert!(client.unfollow(&bob_session, &alice.uid).await.expect("unfollow"));
    assert!(!client.unfollow(&bob_session, &alice.uid).await.expect("unfollow again"));
    client.flush().await;

    assert_eq!(client.fanout().feed_entries(&bob.uid).await.expect("entries"), before);
    assert_eq!(feed_ids(&client, &bob.uid).await, vec![own.post_id]);
}

#[tokio::test]
async fn refollow_brings_posts_back() {
    let Harness { client, .. } = harness();
    let (alice_session, alice) = signup(&client, "alice").await;
    let (bob_session, bob) = signup(&client, "bob").await;
    let post = post_as(&client, &alice_session, "hello").await;

    client.follow(&bob_session, &alice.uid).await.expect("follow");
    client.unfollow(&bob_session, &alice.uid).await.expect("unfollow");
    client.follow(&bob_session, &alice.uid).await.expect("follow again");
    client.flush().await;

    assert_eq!(feed_ids(&client, &bob.uid).await, vec![post.post_id]);
}

#[tokio::test]
async fn stats_count_edges_and_posts() {
    let Harness { client, .. } = harness();
    let (alice_session, alice) = signup(&client, "alice").await;
    let (bob_session, _) = signup(&client, "bob").await;
    let (carol_session, carol) = signup(&client, "carol").await;

    client.follow(&bob_session, &alice.uid).await.expect("follow");
    client.follow(&carol_session, &alice.uid).await.expect("follow");
    client.follow(&alice_session, &carol.uid).await.expect("follow");
    post_as(&client, &alice_session, "one").await;
    client.flush().await;

    let stats = client.users().stats(&alice.uid).await.expect("stats");
    assert_eq!(stats.followers, 2);
    assert_eq!(stats.following, 1);
    assert_eq!(stats.posts, 1);
}

#[tokio::test]
async fn session_operations_require_sign_in() {
    let Harness { client, .. } = harness();
    let (_, alice) = signup(&client, "alice").await;

    let anonymous = Session::anonymous();
    assert!(matches!(
        client.follow(&anonymous, &alice.uid).await,
        Err(FeedError::Unauthenticated)
    ));
    assert!(matches!(client.my_feed(&anonymous).await, Err(FeedError::Unauthenticated)));
}
