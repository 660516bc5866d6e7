//! Self-contained walkthrough against the in-memory backends.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result, ensure};
use snapfeed::{Credentials, FeedClient, FeedConfig, Session, User};

use crate::examples::ExampleGroup;
use crate::output::OutputManager;

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Walkthrough",
    commands: &[
        "snapfeed tour                           # Follow, post, like, comment, unfollow",
        "RUST_LOG=snapfeed=debug snapfeed tour   # Also show fanout steps",
    ],
}];

const PIXEL: &[u8] = &[0x89, b'P', b'N', b'G'];

async fn register(client: &FeedClient, username: &str, fullname: &str) -> Result<(Session, User)> {
    client
        .register(Credentials {
            email: format!("{username}@snapfeed.local"),
            password: format!("{username}-secret"),
            username: username.to_string(),
            fullname: fullname.to_string(),
            profile_image: Some(PIXEL.to_vec()),
        })
        .await
        .with_context(|| format!("registering @{username}"))
}

pub async fn handle_tour(config: &FeedConfig, output: &OutputManager) -> Result<()> {
    let client = FeedClient::in_memory(config.clone())?;

    output.heading("Accounts");
    let (alice_session, alice) = register(&client, "alice", "Alice Liddell").await?;
    let (bob_session, bob) = register(&client, "bob", "Bob Marley").await?;
    let (carol_session, carol) = register(&client, "carol", "Carol Danvers").await?;
    let (dave_session, _dave) = register(&client, "dave", "Dave Grohl").await?;
    for user in [&alice, &bob, &carol] {
        output.bullet(&format!("@{} ({})", user.username, user.uid));
    }

    output.heading("Follow and fan out");
    let first = client.publish_post(&alice_session, PIXEL.to_vec(), "hi").await?;
    output.bullet(&format!("@alice posted {}", first.post_id));

    let delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&delivered);
    let watcher = client
        .fanout()
        .watch_feed(&bob.uid, move |post| {
            sink.lock().unwrap_or_else(PoisonError::into_inner).push(post.post_id);
        })
        .await?;

    client.follow(&bob_session, &alice.uid).await?;
    client.flush().await;
    let feed = client.my_feed(&bob_session).await?;
    ensure!(feed.iter().any(|post| post.post_id == first.post_id), "follow did not copy posts");
    output.success("@bob follows @alice and sees her post");

    let second = client.publish_post(&alice_session, PIXEL.to_vec(), "sunset").await?;
    client.flush().await;
    output.display(&client.my_feed(&bob_session).await?)?;

    output.heading("Engagement");
    for session in [&bob_session, &carol_session, &dave_session] {
        client.like(session, &second.post_id).await?;
    }
    let count = client.unlike(&dave_session, &second.post_id).await?;
    ensure!(count == 2, "expected 2 likes, found {count}");
    client.like(&alice_session, &second.post_id).await?;
    output.success(&format!("{} likes on {}", count + 1, second.post_id));

    let comment_count = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&comment_count);
    let comment_watcher = client
        .engagement()
        .watch_comments(&second.post_id, move |_| {
            *counter.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        })
        .await?;
    client.comment(&carol_session, &second.post_id, "gorgeous colours").await?;
    client.comment(&bob_session, &second.post_id, "where was this?").await?;
    client.flush().await;
    output.display(&client.engagement().list_comments(&second.post_id).await?)?;
    comment_watcher.cancel();

    output.heading("Notifications for @alice");
    output.display(&client.notifications().list_notifications(&alice.uid).await?)?;

    output.heading("Unfollow");
    client.unfollow(&bob_session, &alice.uid).await?;
    client.flush().await;
    let third = client.publish_post(&alice_session, PIXEL.to_vec(), "after").await?;
    client.flush().await;
    let feed = client.my_feed(&bob_session).await?;
    ensure!(
        feed.iter().all(|post| post.owner_uid != alice.uid),
        "unfollow left posts of @alice in the feed"
    );
    ensure!(feed.iter().all(|post| post.post_id != third.post_id), "post fanned out after unfollow");
    output.success("@bob's feed no longer shows @alice");
    watcher.cancel();

    output.heading("Summary");
    let stats = client.users().stats(&alice.uid).await?;
    output.key_value("alice", &format!("{} followers, {} posts", stats.followers, stats.posts));
    let live = delivered.lock().unwrap_or_else(PoisonError::into_inner).len();
    output.key_value("live feed events for bob", &live.to_string());
    let comments_seen = *comment_count.lock().unwrap_or_else(PoisonError::into_inner);
    output.key_value("live comment events", &comments_seen.to_string());
    let queue = client.queue_stats();
    output.key_value(
        "side effects",
        &format!("{} completed, {} retried, {} abandoned", queue.completed, queue.retries, queue.abandoned),
    );

    client.sign_out().await?;
    Ok(())
}
