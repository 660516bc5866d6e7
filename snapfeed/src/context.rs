use std::sync::Arc;

use crate::{
    config::FeedConfig,
    errors::FeedError,
    keys::KeyContext,
    record::{Record, decode_present},
    store::DocumentStore,
    tasks::TaskQueue,
};

/// Shared state behind every service: the store, key layout, side-effect queue and config.
pub struct FeedContext {
    pub store: Arc<dyn DocumentStore>,
    pub keys: KeyContext,
    pub queue: TaskQueue,
    pub config: FeedConfig,
}

impl FeedContext {
    pub fn new(store: Arc<dyn DocumentStore>, config: FeedConfig) -> Arc<Self> {
        Arc::new(Self {
            store,
            keys: KeyContext::new(config.store.key_prefix.clone(), config.store.service.clone()),
            queue: TaskQueue::new(config.retry.clone()),
            config,
        })
    }

    pub(crate) async fn load_optional<T: Record>(&self, key: &str) -> Result<Option<T>, FeedError> {
        match self.store.get_document(key).await? {
            Some(document) => T::from_document(&document).map(Some),
            None => Ok(None),
        }
    }

    /// Loads a record or fails with `NotFound { entity, id }`.
    pub(crate) async fn load<T: Record>(&self, key: &str, entity: &'static str, id: &str) -> Result<T, FeedError> {
        self.load_optional(key)
            .await?
            .ok_or_else(|| FeedError::not_found(entity, id))
    }

    /// Loads every present record among `keys`, in key order.
    pub(crate) async fn load_many<T: Record>(&self, keys: &[String]) -> Result<Vec<T>, FeedError> {
        let documents = self.store.get_documents(keys).await?;
        decode_present(documents)
    }
}
