use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use futures::StreamExt;
use redis::{AsyncCommands, Client, aio::ConnectionManager, cmd, pipe};
use tokio::sync::mpsc;

use super::{
    CountedMembership, CounterOutcome, CounterRepair, CounterSync, DocumentStore, MembershipChange, MutationPlan,
    StoreOp, Subscription,
    scripts::{COUNTED_MEMBERSHIP_SCRIPT, RECONCILE_COUNTER_SCRIPT},
};
use crate::{errors::FeedError, record::Document};

/// [`DocumentStore`] over Redis.
///
/// Documents are hashes, sets are sets, indexes are sorted sets scored in
/// milliseconds. Plans run as `MULTI`/`EXEC` pipelines; counted membership
/// and counter reconciliation run as Lua scripts.
#[derive(Clone)]
pub struct RedisStore {
    client: Client,
    conn: ConnectionManager,
}

impl RedisStore {
    pub fn new(client: Client, conn: ConnectionManager) -> Self {
        Self { client, conn }
    }

    /// Opens a managed connection to `url`.
    pub async fn connect(url: &str) -> Result<Self, FeedError> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client.clone()).await?;
        Ok(Self::new(client, conn))
    }

    /// Clone of the managed connection for callers needing raw commands.
    pub fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

fn into_document(fields: HashMap<String, String>) -> Option<Document> {
    if fields.is_empty() { None } else { Some(fields.into_iter().collect()) }
}

#[async_trait]
impl DocumentStore for RedisStore {
    async fn get_document(&self, key: &str) -> Result<Option<Document>, FeedError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(into_document(fields))
    }

    async fn get_documents(&self, keys: &[String]) -> Result<Vec<Option<Document>>, FeedError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let mut pipeline = pipe();
        for key in keys {
            pipeline.hgetall(key);
        }
        let results: Vec<HashMap<String, String>> = pipeline.query_async(&mut conn).await?;
        Ok(results.into_iter().map(into_document).collect())
    }

    async fn set_members(&self, key: &str) -> Result<BTreeSet<String>, FeedError> {
        let mut conn = self.conn.clone();
        Ok(conn.smembers(key).await?)
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, FeedError> {
        let mut conn = self.conn.clone();
        Ok(conn.sismember(key, member).await?)
    }

    async fn set_len(&self, key: &str) -> Result<u64, FeedError> {
        let mut conn = self.conn.clone();
        Ok(conn.scard(key).await?)
    }

    async fn index_members_desc(&self, key: &str) -> Result<Vec<String>, FeedError> {
        let mut conn = self.conn.clone();
        Ok(conn.zrevrange(key, 0, -1).await?)
    }

    async fn index_entries_desc(&self, key: &str) -> Result<Vec<(String, i64)>, FeedError> {
        let mut conn = self.conn.clone();
        let entries: Vec<(String, f64)> = conn.zrevrange_withscores(key, 0, -1).await?;
        Ok(entries.into_iter().map(|(member, score)| (member, score as i64)).collect())
    }

    async fn index_len(&self, key: &str) -> Result<u64, FeedError> {
        let mut conn = self.conn.clone();
        Ok(conn.zcard(key).await?)
    }

    async fn apply(&self, plan: MutationPlan) -> Result<Vec<bool>, FeedError> {
        if plan.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipeline = pipe();
        pipeline.atomic();
        // Writes that report "changed" regardless of the reply.
        let mut always_changed = Vec::with_capacity(plan.len());
        for op in plan.ops {
            match op {
                StoreOp::PutDocument { key, document } => {
                    let mut hset = cmd("HSET");
                    hset.arg(key);
                    for (field, value) in document {
                        hset.arg(field).arg(value);
                    }
                    pipeline.add_command(hset);
                    always_changed.push(true);
                }
                StoreOp::SetField { key, field, value } => {
                    pipeline.hset(key, field, value);
                    always_changed.push(true);
                }
                StoreOp::SetAdd { key, member } => {
                    pipeline.sadd(key, member);
                    always_changed.push(false);
                }
                StoreOp::SetRemove { key, member } => {
                    pipeline.srem(key, member);
                    always_changed.push(false);
                }
                StoreOp::IndexAdd { key, member, score } => {
                    pipeline.zadd(key, member, score);
                    always_changed.push(false);
                }
                StoreOp::IndexRemove { key, member } => {
                    pipeline.zrem(key, member);
                    always_changed.push(false);
                }
                StoreOp::Delete { key } => {
                    pipeline.del(key);
                    always_changed.push(false);
                }
            }
        }

        let mut conn = self.conn.clone();
        let replies: Vec<i64> = pipeline.query_async(&mut conn).await?;
        Ok(replies
            .into_iter()
            .zip(always_changed)
            .map(|(reply, always)| always || reply > 0)
            .collect())
    }

    async fn counted_membership(&self, op: CountedMembership) -> Result<CounterOutcome, FeedError> {
        let change = match op.change {
            MembershipChange::Add => "add",
            MembershipChange::Remove => "remove",
        };
        let mut conn = self.conn.clone();
        let mut invocation = COUNTED_MEMBERSHIP_SCRIPT.prepare_invoke();
        invocation
            .key(&op.set_key)
            .key(&op.document_key)
            .arg(&op.member)
            .arg(&op.field)
            .arg(change);
        let reply: Vec<i64> = invocation.invoke_async(&mut conn).await?;

        match reply.as_slice() {
            [-1, ..] => Err(FeedError::not_found("document", op.document_key)),
            [changed, count, clamped] => Ok(CounterOutcome {
                changed: *changed == 1,
                count: *count,
                clamped: *clamped == 1,
            }),
            other => Err(FeedError::unavailable(format!(
                "unexpected counted membership reply: {other:?}"
            ))),
        }
    }

    async fn reconcile_counter(&self, op: CounterSync) -> Result<CounterRepair, FeedError> {
        let mut conn = self.conn.clone();
        let mut invocation = RECONCILE_COUNTER_SCRIPT.prepare_invoke();
        invocation.key(&op.set_key).key(&op.document_key).arg(&op.field);
        let reply: Vec<i64> = invocation.invoke_async(&mut conn).await?;

        match reply.as_slice() {
            [0, ..] => Err(FeedError::not_found("document", op.document_key)),
            [_, previous, count] => Ok(CounterRepair {
                previous: *previous,
                count: *count,
            }),
            other => Err(FeedError::unavailable(format!(
                "unexpected reconcile counter reply: {other:?}"
            ))),
        }
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), FeedError> {
        let mut conn = self.conn.clone();
        let _receivers: i64 = conn.publish(channel, payload).await?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, FeedError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let channel_name = channel.to_string();
        let forwarder = tokio::spawn(async move {
            let mut messages = pubsub.into_on_message();
            while let Some(message) = messages.next().await {
                match message.get_payload::<String>() {
                    Ok(payload) => {
                        if tx.send(payload).is_err() {
                            break;
                        }
                    }
                    Err(err) => log::warn!("dropping undecodable message on {channel_name}: {err}"),
                }
            }
        });

        Ok(Subscription::new(rx, forwarder))
    }
}
