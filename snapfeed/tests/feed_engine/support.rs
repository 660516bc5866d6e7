pub(crate) use std::sync::{Arc, Mutex};
pub(crate) use std::time::Duration;

pub(crate) use snapfeed::{
    Credentials, DocumentStore, FeedClient, FeedConfig, FeedError, MemoryAuth, MemoryMediaStore, MemoryStore,
    MutationPlan, NotificationKind, Post, Session, User, errors::PipelineStep,
};

pub(crate) const IMAGE: &[u8] = b"\x89PNG fake image";

pub(crate) struct Harness {
    pub(crate) client: FeedClient,
    pub(crate) store: Arc<MemoryStore>,
}

/// Retries are fast so failure tests finish quickly.
pub(crate) fn test_config() -> FeedConfig {
    let mut config = FeedConfig::default();
    config.retry.initial_backoff_ms = 1;
    config.retry.max_backoff_ms = 5;
    config.store.key_prefix = "test".to_string();
    config
}

pub(crate) fn harness() -> Harness {
    harness_with(test_config())
}

pub(crate) fn harness_with(config: FeedConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let media = MemoryMediaStore::from_base(&config.media.base_url).expect("media base url");
    let client = FeedClient::new(
        Arc::clone(&store) as Arc<dyn DocumentStore>,
        Arc::new(MemoryAuth::new()),
        Arc::new(media),
        config,
    );
    Harness { client, store }
}

pub(crate) fn credentials(username: &str) -> Credentials {
    Credentials {
        email: format!("{username}@example.com"),
        password: "correct horse".to_string(),
        username: username.to_string(),
        fullname: format!("{username} tester"),
        profile_image: Some(IMAGE.to_vec()),
    }
}

pub(crate) async fn signup(client: &FeedClient, username: &str) -> (Session, User) {
    client.register(credentials(username)).await.expect("register user")
}

pub(crate) async fn post_as(client: &FeedClient, session: &Session, caption: &str) -> Post {
    client
        .publish_post(session, IMAGE.to_vec(), caption)
        .await
        .expect("publish post")
}

pub(crate) async fn feed_ids(client: &FeedClient, uid: &str) -> Vec<String> {
    client
        .fanout()
        .get_feed(uid)
        .await
        .expect("feed")
        .into_iter()
        .map(|post| post.post_id)
        .collect()
}

/// Polls `condition` until it holds or a second passes.
pub(crate) async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

pub(crate) fn keys(client: &FeedClient) -> snapfeed::keys::KeyContext {
    let store = &client.config().store;
    snapfeed::keys::KeyContext::new(store.key_prefix.clone(), store.service.clone())
}
