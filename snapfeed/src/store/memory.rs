use std::{
    collections::{BTreeSet, HashMap},
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use super::{
    CountedMembership, CounterOutcome, CounterRepair, CounterSync, DocumentStore, MembershipChange, MutationPlan,
    StoreOp, Subscription,
};
use crate::{errors::FeedError, record::Document};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Default)]
struct Inner {
    documents: HashMap<String, Document>,
    sets: HashMap<String, BTreeSet<String>>,
    indexes: HashMap<String, HashMap<String, i64>>,
    channels: HashMap<String, broadcast::Sender<String>>,
}

impl Inner {
    fn apply_op(&mut self, op: StoreOp) -> bool {
        match op {
            StoreOp::PutDocument { key, document } => {
                self.documents.insert(key, document);
                true
            }
            StoreOp::SetField { key, field, value } => {
                self.documents.entry(key).or_default().insert(field, value);
                true
            }
            StoreOp::SetAdd { key, member } => self.sets.entry(key).or_default().insert(member),
            StoreOp::SetRemove { key, member } => {
                let removed = self.sets.get_mut(&key).is_some_and(|set| set.remove(&member));
                if self.sets.get(&key).is_some_and(BTreeSet::is_empty) {
                    self.sets.remove(&key);
                }
                removed
            }
            StoreOp::IndexAdd { key, member, score } => {
                self.indexes.entry(key).or_default().insert(member, score).is_none()
            }
            StoreOp::IndexRemove { key, member } => {
                let removed = self.indexes.get_mut(&key).is_some_and(|index| index.remove(&member).is_some());
                if self.indexes.get(&key).is_some_and(HashMap::is_empty) {
                    self.indexes.remove(&key);
                }
                removed
            }
            StoreOp::Delete { key } => {
                let document = self.documents.remove(&key).is_some();
                let set = self.sets.remove(&key).is_some();
                let index = self.indexes.remove(&key).is_some();
                document || set || index
            }
        }
    }

    fn index_sorted(&self, key: &str) -> Vec<(String, i64)> {
        let mut entries: Vec<(String, i64)> = self
            .indexes
            .get(key)
            .map(|index| index.iter().map(|(member, score)| (member.clone(), *score)).collect())
            .unwrap_or_default();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));
        entries
    }
}

/// In-process [`DocumentStore`].
///
/// Every operation takes one mutex, so plans and counted memberships are
/// atomic. `inject_failures` makes the next operations fail with
/// `StoreUnavailable`, for exercising retry paths.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    pending_failures: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` store calls fail with `StoreUnavailable`. Zero clears.
    pub fn inject_failures(&self, count: usize) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_fault(&self) -> Result<(), FeedError> {
        let consumed = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| remaining.checked_sub(1));
        match consumed {
            Ok(_) => Err(FeedError::unavailable("injected memory store failure")),
            Err(_) => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_document(&self, key: &str) -> Result<Option<Document>, FeedError> {
        self.check_fault()?;
        Ok(self.inner().documents.get(key).cloned())
    }

    async fn get_documents(&self, keys: &[String]) -> Result<Vec<Option<Document>>, FeedError> {
        self.check_fault()?;
        let inner = self.inner();
        Ok(keys.iter().map(|key| inner.documents.get(key).cloned()).collect())
    }

    async fn set_members(&self, key: &str) -> Result<BTreeSet<String>, FeedError> {
        self.check_fault()?;
        Ok(self.inner().sets.get(key).cloned().unwrap_or_default())
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, FeedError> {
        self.check_fault()?;
        Ok(self.inner().sets.get(key).is_some_and(|set| set.contains(member)))
    }

    async fn set_len(&self, key: &str) -> Result<u64, FeedError> {
        self.check_fault()?;
        Ok(self.inner().sets.get(key).map_or(0, |set| set.len() as u64))
    }

    async fn index_members_desc(&self, key: &str) -> Result<Vec<String>, FeedError> {
        self.check_fault()?;
        Ok(self.inner().index_sorted(key).into_iter().map(|(member, _)| member).collect())
    }

    async fn index_entries_desc(&self, key: &str) -> Result<Vec<(String, i64)>, FeedError> {
        self.check_fault()?;
        Ok(self.inner().index_sorted(key))
    }

    async fn index_len(&self, key: &str) -> Result<u64, FeedError> {
        self.check_fault()?;
        Ok(self.inner().indexes.get(key).map_or(0, |index| index.len() as u64))
    }

    async fn apply(&self, plan: MutationPlan) -> Result<Vec<bool>, FeedError> {
        self.check_fault()?;
        let mut inner = self.inner();
        Ok(plan.ops.into_iter().map(|op| inner.apply_op(op)).collect())
    }

    async fn counted_membership(&self, op: CountedMembership) -> Result<CounterOutcome, FeedError> {
        self.check_fault()?;
        let mut inner = self.inner();
        let Inner { documents, sets, .. } = &mut *inner;

        let Some(document) = documents.get_mut(&op.document_key) else {
            return Err(FeedError::not_found("document", op.document_key));
        };
        let current: i64 = document.get(&op.field).and_then(|raw| raw.parse().ok()).unwrap_or(0);

        let (changed, count, clamped) = match op.change {
            MembershipChange::Add => {
                let added = sets.entry(op.set_key).or_default().insert(op.member);
                if added { (true, current + 1, false) } else { (false, current, false) }
            }
            MembershipChange::Remove => {
                let removed = sets.get_mut(&op.set_key).is_some_and(|set| set.remove(&op.member));
                match (removed, current > 0) {
                    (true, true) => (true, current - 1, false),
                    (true, false) => (true, 0, true),
                    (false, _) => (false, current, false),
                }
            }
        };
        document.insert(op.field, count.to_string());

        Ok(CounterOutcome { changed, count, clamped })
    }

    async fn reconcile_counter(&self, op: CounterSync) -> Result<CounterRepair, FeedError> {
        self.check_fault()?;
        let mut inner = self.inner();
        let Inner { documents, sets, .. } = &mut *inner;

        let Some(document) = documents.get_mut(&op.document_key) else {
            return Err(FeedError::not_found("document", op.document_key));
        };
        let previous: i64 = document.get(&op.field).and_then(|raw| raw.parse().ok()).unwrap_or(0);
        let count = sets.get(&op.set_key).map_or(0, |set| set.len() as i64);
        document.insert(op.field, count.to_string());

        Ok(CounterRepair { previous, count })
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), FeedError> {
        self.check_fault()?;
        if let Some(sender) = self.inner().channels.get(channel) {
            // No receivers is fine: nobody is listening.
            let _ = sender.send(payload.to_string());
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, FeedError> {
        self.check_fault()?;
        let mut receiver = {
            let mut inner = self.inner();
            inner
                .channels
                .entry(channel.to_string())
                .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
                .subscribe()
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let forwarder = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(message) => {
                        if tx.send(message).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("memory subscription lagged, {skipped} messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(Subscription::new(rx, forwarder))
    }
}
