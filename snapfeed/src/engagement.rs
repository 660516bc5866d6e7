//! Likes and comments.
//!
//! A post's like set and its `like_count` field move together through
//! [`DocumentStore::counted_membership`](crate::store::DocumentStore::counted_membership),
//! so concurrent likes never lose an increment.

use std::{collections::BTreeSet, sync::Arc};

use chrono::Utc;

use crate::{
    context::FeedContext,
    errors::{FeedError, ValidationError},
    id::generate_record_id,
    listener::{ListenerHandle, spawn_listener},
    models::{Comment, NotificationKind, Post, User},
    notifications::NotificationSink,
    record::{Record, score_for},
    store::{CountedMembership, CounterOutcome, CounterSync, MembershipChange, MutationPlan},
    validators::{MAX_COMMENT_CHARS, check_text},
};

#[derive(Clone)]
pub struct Engagement {
    ctx: Arc<FeedContext>,
    notifications: NotificationSink,
}

impl Engagement {
    pub fn new(ctx: Arc<FeedContext>) -> Self {
        Self {
            notifications: NotificationSink::new(Arc::clone(&ctx)),
            ctx,
        }
    }

    /// Likes `post_id` as `uid` and returns the resulting like count.
    ///
    /// Liking twice is a no-op. Only a new like notifies the owner.
    pub async fn like(&self, post_id: &str, uid: &str) -> Result<i64, FeedError> {
        let post = self.load_post(post_id).await?;
        let outcome = self.change_like(post_id, uid, MembershipChange::Add).await?;

        if outcome.changed {
            log::debug!("{uid} liked {post_id}; count is now {}", outcome.count);
            self.notifications
                .notify(&post.owner_uid, uid, NotificationKind::Like, Some(&post));
        }
        Ok(outcome.count)
    }

    /// Withdraws a like. Unliking a post that was not liked is a no-op.
    pub async fn unlike(&self, post_id: &str, uid: &str) -> Result<i64, FeedError> {
        let outcome = self.change_like(post_id, uid, MembershipChange::Remove).await?;
        if outcome.clamped {
            log::warn!("like count drift on post {post_id}: counter was already 0 when {uid} unliked");
        }
        Ok(outcome.count)
    }

    pub async fn has_liked(&self, post_id: &str, uid: &str) -> Result<bool, FeedError> {
        self.ctx.store.set_contains(&self.ctx.keys.likers(post_id), uid).await
    }

    /// Uids that currently like `post_id`.
    pub async fn likers(&self, post_id: &str) -> Result<BTreeSet<String>, FeedError> {
        self.ctx.store.set_members(&self.ctx.keys.likers(post_id)).await
    }

    /// Resets `like_count` to the size of the like set. Returns the repaired count.
    ///
    /// Count and write are one store operation, so likes racing the repair
    /// are never overwritten.
    pub async fn reconcile_like_count(&self, post_id: &str) -> Result<i64, FeedError> {
        let sync = CounterSync {
            set_key: self.ctx.keys.likers(post_id),
            document_key: self.ctx.keys.post(post_id),
            field: Post::LIKE_COUNT_FIELD.to_string(),
        };
        let repair = self.ctx.store.reconcile_counter(sync).await.map_err(|err| match err {
            FeedError::NotFound { .. } => FeedError::not_found("post", post_id),
            other => other,
        })?;
        if repair.drifted() {
            log::info!("reconciled like count on {post_id}: {} -> {}", repair.previous, repair.count);
        }
        Ok(repair.count)
    }

    /// Adds a comment by `author_uid` and announces it to live listeners.
    pub async fn add_comment(&self, post_id: &str, author_uid: &str, body: &str) -> Result<Comment, FeedError> {
        let mut issues = Vec::new();
        check_text("body", body, MAX_COMMENT_CHARS, true, &mut issues);
        ValidationError::new(issues).into_result()?;

        let post = self.load_post(post_id).await?;
        let author: User = self
            .ctx
            .load(&self.ctx.keys.user(author_uid), "user", author_uid)
            .await?;

        let comment = Comment {
            comment_id: generate_record_id(),
            post_id: post_id.to_string(),
            uid: author.uid,
            username: author.username,
            profile_image_ref: author.profile_image_ref,
            body: body.to_string(),
            created_at: Utc::now(),
        };
        let keys = &self.ctx.keys;
        let plan = MutationPlan::new()
            .put_document(keys.comment(&comment.comment_id), comment.to_document())
            .index_add(
                keys.post_comments(post_id),
                comment.comment_id.clone(),
                score_for(&comment.created_at),
            );
        self.ctx.store.apply(plan).await?;

        match serde_json::to_string(&comment) {
            Ok(payload) => {
                if let Err(err) = self.ctx.store.publish(&keys.comment_channel(post_id), &payload).await {
                    log::warn!("comment {} saved but not announced: {err}", comment.comment_id);
                }
            }
            Err(err) => log::warn!("comment {} could not be encoded for listeners: {err}", comment.comment_id),
        }

        self.notifications
            .notify(&post.owner_uid, author_uid, NotificationKind::Comment, Some(&post));
        Ok(comment)
    }

    /// Comments on `post_id`, newest first.
    pub async fn list_comments(&self, post_id: &str) -> Result<Vec<Comment>, FeedError> {
        let ids = self
            .ctx
            .store
            .index_members_desc(&self.ctx.keys.post_comments(post_id))
            .await?;
        let keys: Vec<String> = ids.iter().map(|id| self.ctx.keys.comment(id)).collect();
        let mut comments: Vec<Comment> = self.ctx.load_many(&keys).await?;
        comments.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.comment_id.cmp(&a.comment_id))
        });
        Ok(comments)
    }

    /// Calls `callback` for each comment added to `post_id` after this returns.
    pub async fn watch_comments<F>(&self, post_id: &str, callback: F) -> Result<ListenerHandle, FeedError>
    where
        F: FnMut(Comment) + Send + 'static,
    {
        let subscription = self.ctx.store.subscribe(&self.ctx.keys.comment_channel(post_id)).await?;
        Ok(spawn_listener(format!("comment watcher {post_id}"), subscription, callback))
    }

    async fn load_post(&self, post_id: &str) -> Result<Post, FeedError> {
        self.ctx.load(&self.ctx.keys.post(post_id), "post", post_id).await
    }

    async fn change_like(&self, post_id: &str, uid: &str, change: MembershipChange) -> Result<CounterOutcome, FeedError> {
        let op = CountedMembership {
            set_key: self.ctx.keys.likers(post_id),
            member: uid.to_string(),
            document_key: self.ctx.keys.post(post_id),
            field: Post::LIKE_COUNT_FIELD.to_string(),
            change,
        };
        self.ctx.store.counted_membership(op).await.map_err(|err| match err {
            FeedError::NotFound { .. } => FeedError::not_found("post", post_id),
            other => other,
        })
    }
}
