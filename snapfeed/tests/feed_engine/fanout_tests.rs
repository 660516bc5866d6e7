use std::collections::BTreeSet;

use snapfeed::record::{DocumentBuilder, encode_timestamp};

use super::support::*;

#[tokio::test]
async fn unfollow_hides_old_and_new_posts() {
    let Harness { client, .. } = harness();
    let (alice_session, alice) = signup(&client, "alice").await;
    let (_, bob) = signup(&client, "bob").await;

    let p1 = post_as(&client, &alice_session, "hi").await;
    client.graph().follow(&bob.uid, &alice.uid).await.expect("follow");
    client.flush().await;
    assert!(feed_ids(&client, &bob.uid).await.contains(&p1.post_id));

    client.graph().unfollow(&bob.uid, &alice.uid).await.expect("unfollow");
    client.flush().await;
    assert!(!feed_ids(&client, &bob.uid).await.contains(&p1.post_id));

    let p2 = post_as(&client, &alice_session, "after").await;
    client.flush().await;
    let feed = feed_ids(&client, &bob.uid).await;
    assert!(!feed.contains(&p2.post_id));
    assert!(feed.is_empty());
}

#[tokio::test]
async fn new_post_reaches_owner_and_followers_only() {
    let Harness { client, .. } = harness();
    let (alice_session, alice) = signup(&client, "alice").await;
    let (_, bob) = signup(&client, "bob").await;
    let (_, carol) = signup(&client, "carol").await;

    client.graph().follow(&bob.uid, &alice.uid).await.expect("follow");
    client.flush().await;
    let post = post_as(&client, &alice_session, "morning").await;
    client.flush().await;

    assert_eq!(feed_ids(&client, &alice.uid).await, vec![post.post_id.clone()]);
    assert_eq!(feed_ids(&client, &bob.uid).await, vec![post.post_id.clone()]);
    assert!(feed_ids(&client, &carol.uid).await.is_empty());
}

#[tokio::test]
async fn feed_converges_to_own_plus_followed_posts() {
    let Harness { client, .. } = harness();
    let mut sessions = Vec::new();
    for name in ["ann", "ben", "cat", "dan"] {
        sessions.push(signup(&client, name).await);
    }
    let uid = |index: usize| sessions[index].1.uid.clone();
    let graph = client.graph();

    graph.follow(&uid(0), &uid(1)).await.expect("follow");
    graph.follow(&uid(0), &uid(2)).await.expect("follow");
    graph.follow(&uid(1), &uid(2)).await.expect("follow");
    graph.follow(&uid(3), &uid(0)).await.expect("follow");

    let mut posts = Vec::new();
    for (index, caption) in [(0, "a"), (1, "b"), (2, "c"), (2, "d"), (3, "e"), (1, "f")] {
        posts.push(post_as(&client, &sessions[index].0, caption).await);
    }
    graph.unfollow(&uid(0), &uid(2)).await.expect("unfollow");
    graph.follow(&uid(3), &uid(2)).await.expect("follow");
    client.flush().await;

    for (_, user) in &sessions {
        let following = graph.following(&user.uid).await.expect("following");
        let expected: BTreeSet<String> = posts
            .iter()
            .filter(|post| post.owner_uid == user.uid || following.contains(&post.owner_uid))
            .map(|post| post.post_id.clone())
            .collect();
        let entries: BTreeSet<String> = client
            .fanout()
            .feed_entries(&user.uid)
            .await
            .expect("entries")
            .into_iter()
            .map(|entry| entry.post_id)
            .collect();
        assert_eq!(entries, expected, "feed of @{}", user.username);
        let resolved: BTreeSet<String> = feed_ids(&client, &user.uid).await.into_iter().collect();
        assert_eq!(resolved, expected);
    }
}

#[tokio::test]
async fn feed_is_newest_first() {
    let Harness { client, .. } = harness();
    let (session, user) = signup(&client, "alice").await;

    let mut expected = Vec::new();
    for caption in ["one", "two", "three"] {
        expected.push(post_as(&client, &session, caption).await.post_id);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    client.flush().await;

    expected.reverse();
    assert_eq!(feed_ids(&client, &user.uid).await, expected);
}

#[tokio::test]
async fn replayed_fanout_is_idempotent() {
    let Harness { client, .. } = harness();
    let (alice_session, alice) = signup(&client, "alice").await;
    let (_, bob) = signup(&client, "bob").await;
    client.graph().follow(&bob.uid, &alice.uid).await.expect("follow");
    let post = post_as(&client, &alice_session, "twice").await;
    client.flush().await;

    client.fanout().schedule_post(&post);
    client.fanout().schedule_follow(&bob.uid, &alice.uid);
    client.flush().await;

    let entries = client.fanout().feed_entries(&bob.uid).await.expect("entries");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].owner_of_feed_uid, bob.uid);
    assert_eq!(entries[0].post_id, post.post_id);
}

#[tokio::test]
async fn stale_entry_is_hidden_then_pruned() {
    let Harness { client, store } = harness();
    let (alice_session, _) = signup(&client, "alice").await;
    let (_, bob) = signup(&client, "bob").await;
    let post = post_as(&client, &alice_session, "not for bob").await;
    client.flush().await;

    // A fanout that landed after an unfollow.
    let keys = keys(&client);
    store
        .apply(MutationPlan::new().index_add(keys.feed(&bob.uid), post.post_id.clone(), 1))
        .await
        .expect("inject entry");

    assert!(feed_ids(&client, &bob.uid).await.is_empty());
    client.flush().await;
    assert!(client.fanout().feed_entries(&bob.uid).await.expect("entries").is_empty());
}

#[tokio::test]
async fn dangling_entry_is_skipped() {
    let Harness { client, store } = harness();
    let (session, user) = signup(&client, "alice").await;
    let post = post_as(&client, &session, "kept").await;
    client.flush().await;

    let keys = keys(&client);
    store
        .apply(MutationPlan::new().index_add(keys.feed(&user.uid), "gone", i64::MAX))
        .await
        .expect("inject entry");

    assert_eq!(feed_ids(&client, &user.uid).await, vec![post.post_id]);
    client.flush().await;
    assert_eq!(client.fanout().feed_entries(&user.uid).await.expect("entries").len(), 1);
}

#[tokio::test]
async fn rebuild_restores_lost_feed() {
    let Harness { client, store } = harness();
    let (alice_session, alice) = signup(&client, "alice").await;
    let (bob_session, bob) = signup(&client, "bob").await;
    client.graph().follow(&bob.uid, &alice.uid).await.expect("follow");
    post_as(&client, &alice_session, "a1").await;
    post_as(&client, &alice_session, "a2").await;
    post_as(&client, &bob_session, "b1").await;
    client.flush().await;

    let before: BTreeSet<String> = feed_ids(&client, &bob.uid).await.into_iter().collect();
    assert_eq!(before.len(), 3);

    let keys = keys(&client);
    store
        .apply(MutationPlan::new().delete(keys.feed(&bob.uid)))
        .await
        .expect("drop feed");
    assert!(feed_ids(&client, &bob.uid).await.is_empty());

    let written = client.fanout().rebuild_feed(&bob.uid).await.expect("rebuild");
    assert_eq!(written, 3);
    let after: BTreeSet<String> = feed_ids(&client, &bob.uid).await.into_iter().collect();
    assert_eq!(after, before);
}

#[tokio::test]
async fn rebuild_drops_stale_entries() {
    let Harness { client, store } = harness();
    let (alice_session, _) = signup(&client, "alice").await;
    let (_, bob) = signup(&client, "bob").await;
    let post = post_as(&client, &alice_session, "stray").await;
    client.flush().await;

    let keys = keys(&client);
    store
        .apply(MutationPlan::new().index_add(keys.feed(&bob.uid), post.post_id, 1))
        .await
        .expect("inject entry");

    assert_eq!(client.fanout().rebuild_feed(&bob.uid).await.expect("rebuild"), 0);
    assert!(client.fanout().feed_entries(&bob.uid).await.expect("entries").is_empty());
}

#[tokio::test]
async fn explore_lists_every_post_independently_of_feeds() {
    let Harness { client, .. } = harness();
    let (alice_session, _) = signup(&client, "alice").await;
    let (bob_session, bob) = signup(&client, "bob").await;
    post_as(&client, &alice_session, "a").await;
    post_as(&client, &bob_session, "b").await;
    client.flush().await;

    assert_eq!(client.posts().list_all_posts().await.expect("explore").len(), 2);
    assert_eq!(feed_ids(&client, &bob.uid).await.len(), 1);
    assert_eq!(client.posts().list_posts_by_owner(&bob.uid).await.expect("own").len(), 1);
}

#[tokio::test]
async fn malformed_post_in_feed_surfaces_field() {
    let Harness { client, store } = harness();
    let (_, user) = signup(&client, "alice").await;

    let keys = keys(&client);
    let document = DocumentBuilder::new()
        .string("post_id", "broken")
        .string("owner_uid", &user.uid)
        .string("image_ref", "post_images/x")
        .string("caption", "")
        .string("created_at", encode_timestamp(&chrono::Utc::now()))
        .string("like_count", "many")
        .build();
    store
        .apply(
            MutationPlan::new()
                .put_document(keys.post("broken"), document)
                .index_add(keys.feed(&user.uid), "broken", 1),
        )
        .await
        .expect("write malformed post");

    match client.fanout().get_feed(&user.uid).await {
        Err(FeedError::MalformedRecord { collection, field, .. }) => {
            assert_eq!(collection, "posts");
            assert_eq!(field, "like_count");
        }
        other => panic!("expected malformed record, got {other:?}"),
    }
}
