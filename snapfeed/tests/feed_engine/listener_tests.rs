use super::support::*;

#[tokio::test]
async fn comment_listener_delivers_in_order_until_cancelled() {
    let Harness { client, .. } = harness();
    let (session, _) = signup(&client, "owner").await;
    let post = post_as(&client, &session, "discuss").await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let handle = client
        .engagement()
        .watch_comments(&post.post_id, move |comment| {
            sink.lock().expect("sink").push(comment.body);
        })
        .await
        .expect("watch");
    assert!(handle.is_active());

    for body in ["one", "two", "three"] {
        client.comment(&session, &post.post_id, body).await.expect("comment");
    }
    assert!(eventually(|| seen.lock().expect("seen").len() == 3).await);
    assert_eq!(*seen.lock().expect("seen"), vec!["one", "two", "three"]);

    handle.cancel();
    client.comment(&session, &post.post_id, "four").await.expect("comment");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(seen.lock().expect("seen").len(), 3);
}

#[tokio::test]
async fn dropping_the_handle_stops_delivery() {
    let Harness { client, .. } = harness();
    let (session, _) = signup(&client, "owner").await;
    let post = post_as(&client, &session, "quiet").await;

    let count = Arc::new(Mutex::new(0usize));
    let sink = Arc::clone(&count);
    let handle = client
        .engagement()
        .watch_comments(&post.post_id, move |_| *sink.lock().expect("sink") += 1)
        .await
        .expect("watch");
    drop(handle);

    client.comment(&session, &post.post_id, "anyone?").await.expect("comment");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*count.lock().expect("count"), 0);
}

#[tokio::test]
async fn listener_only_sees_comments_on_its_post() {
    let Harness { client, .. } = harness();
    let (session, _) = signup(&client, "owner").await;
    let watched = post_as(&client, &session, "watched").await;
    let other = post_as(&client, &session, "other").await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _handle = client
        .engagement()
        .watch_comments(&watched.post_id, move |comment| {
            sink.lock().expect("sink").push(comment.post_id);
        })
        .await
        .expect("watch");

    client.comment(&session, &other.post_id, "elsewhere").await.expect("comment");
    client.comment(&session, &watched.post_id, "here").await.expect("comment");
    assert!(eventually(|| !seen.lock().expect("seen").is_empty()).await);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(*seen.lock().expect("seen"), vec![watched.post_id.clone()]);
}

#[tokio::test]
async fn feed_listener_receives_fanned_out_posts() {
    let Harness { client, .. } = harness();
    let (alice_session, alice) = signup(&client, "alice").await;
    let (_, bob) = signup(&client, "bob").await;
    let before = post_as(&client, &alice_session, "before watching").await;
    client.graph().follow(&bob.uid, &alice.uid).await.expect("follow");
    client.flush().await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let handle = client
        .fanout()
        .watch_feed(&bob.uid, move |post| sink.lock().expect("sink").push(post.post_id))
        .await
        .expect("watch");

    let fresh = post_as(&client, &alice_session, "fresh").await;
    client.flush().await;
    assert!(eventually(|| !seen.lock().expect("seen").is_empty()).await);

    let seen = seen.lock().expect("seen").clone();
    assert_eq!(seen, vec![fresh.post_id]);
    assert!(!seen.contains(&before.post_id));
    handle.cancel();
}
