//! Storage abstraction.
//!
//! Services never talk to Redis directly: they build [`MutationPlan`]s and
//! issue reads through [`DocumentStore`], which has a Redis backend and an
//! in-process backend with the same semantics.

mod memory;
mod redis_store;
mod scripts;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use std::collections::BTreeSet;

use async_trait::async_trait;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{errors::FeedError, record::Document};

/// One write inside a [`MutationPlan`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    /// Write every field of a document.
    PutDocument { key: String, document: Document },
    /// Overwrite a single field of an existing document.
    SetField { key: String, field: String, value: String },
    SetAdd { key: String, member: String },
    SetRemove { key: String, member: String },
    /// Insert into a score-ordered index; re-inserting updates the score.
    IndexAdd { key: String, member: String, score: i64 },
    IndexRemove { key: String, member: String },
    /// Remove a whole key (document, set or index).
    Delete { key: String },
}

/// Writes applied atomically, in order.
#[derive(Debug, Default, Clone)]
pub struct MutationPlan {
    pub ops: Vec<StoreOp>,
}

impl MutationPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_document(mut self, key: impl Into<String>, document: Document) -> Self {
        self.ops.push(StoreOp::PutDocument {
            key: key.into(),
            document,
        });
        self
    }

    pub fn set_field(mut self, key: impl Into<String>, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.ops.push(StoreOp::SetField {
            key: key.into(),
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn set_add(mut self, key: impl Into<String>, member: impl Into<String>) -> Self {
        self.ops.push(StoreOp::SetAdd {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    pub fn set_remove(mut self, key: impl Into<String>, member: impl Into<String>) -> Self {
        self.ops.push(StoreOp::SetRemove {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    pub fn index_add(mut self, key: impl Into<String>, member: impl Into<String>, score: i64) -> Self {
        self.ops.push(StoreOp::IndexAdd {
            key: key.into(),
            member: member.into(),
            score,
        });
        self
    }

    pub fn index_remove(mut self, key: impl Into<String>, member: impl Into<String>) -> Self {
        self.ops.push(StoreOp::IndexRemove {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    pub fn delete(mut self, key: impl Into<String>) -> Self {
        self.ops.push(StoreOp::Delete { key: key.into() });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    Add,
    Remove,
}

/// A membership edit whose set and counter must move together.
///
/// The counter lives in field `field` of document `document_key` and tracks
/// the cardinality of `set_key`.
#[derive(Debug, Clone)]
pub struct CountedMembership {
    pub set_key: String,
    pub member: String,
    pub document_key: String,
    pub field: String,
    pub change: MembershipChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterOutcome {
    /// Whether the set actually changed.
    pub changed: bool,
    /// Counter value after the operation.
    pub count: i64,
    /// A decrement was requested while the counter was already zero.
    pub clamped: bool,
}

/// A counter to be reset to the cardinality of the set it tracks.
#[derive(Debug, Clone)]
pub struct CounterSync {
    pub set_key: String,
    pub document_key: String,
    pub field: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterRepair {
    /// Stored value before the reset (unparsable counts as 0).
    pub previous: i64,
    /// Set cardinality, now also the stored value.
    pub count: i64,
}

impl CounterRepair {
    pub fn drifted(&self) -> bool {
        self.previous != self.count
    }
}

/// Messages from a pub/sub channel, in publish order.
///
/// Dropping the subscription stops the forwarding task.
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<String>,
    forwarder: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn new(receiver: mpsc::UnboundedReceiver<String>, forwarder: JoinHandle<()>) -> Self {
        Self { receiver, forwarder }
    }

    /// Next message, or `None` once the channel is gone.
    pub async fn next(&mut self) -> Option<String> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

/// Backing store contract.
///
/// Documents are flat string maps, sets hold string members, indexes are
/// sets ordered by an integer score. `apply` runs a whole plan atomically.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document(&self, key: &str) -> Result<Option<Document>, FeedError>;

    async fn get_documents(&self, keys: &[String]) -> Result<Vec<Option<Document>>, FeedError>;

    async fn set_members(&self, key: &str) -> Result<BTreeSet<String>, FeedError>;

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, FeedError>;

    async fn set_len(&self, key: &str) -> Result<u64, FeedError>;

    /// Members ordered by score, highest first (ties by member, descending).
    async fn index_members_desc(&self, key: &str) -> Result<Vec<String>, FeedError>;

    /// Members with their scores, highest score first.
    async fn index_entries_desc(&self, key: &str) -> Result<Vec<(String, i64)>, FeedError>;

    async fn index_len(&self, key: &str) -> Result<u64, FeedError>;

    /// Applies every op atomically; returns one "changed" flag per op.
    async fn apply(&self, plan: MutationPlan) -> Result<Vec<bool>, FeedError>;

    /// Edits a membership set and its cardinality counter as one atomic step.
    ///
    /// Fails with `NotFound` if the counter document does not exist.
    async fn counted_membership(&self, op: CountedMembership) -> Result<CounterOutcome, FeedError>;

    /// Counts the set and stores the count in one atomic step, so no
    /// concurrent membership change lands between the read and the write.
    ///
    /// Fails with `NotFound` if the counter document does not exist.
    async fn reconcile_counter(&self, op: CounterSync) -> Result<CounterRepair, FeedError>;

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), FeedError>;

    /// Subscription is live when this returns: later publishes are delivered.
    async fn subscribe(&self, channel: &str) -> Result<Subscription, FeedError>;
}
