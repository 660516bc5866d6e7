//! Per-user notification log.

use std::sync::Arc;

use chrono::Utc;

use crate::{
    context::FeedContext,
    errors::FeedError,
    id::generate_record_id,
    models::{Notification, NotificationKind, Post},
    record::{Record, score_for},
    store::MutationPlan,
};

#[derive(Clone)]
pub struct NotificationSink {
    ctx: Arc<FeedContext>,
}

impl NotificationSink {
    pub fn new(ctx: Arc<FeedContext>) -> Self {
        Self { ctx }
    }

    /// Queues a notification for `target`. Self-actions are dropped.
    ///
    /// Returns whether a write was queued. The caller never observes the
    /// write's outcome; failures are retried and then logged.
    pub fn notify(&self, target: &str, actor: &str, kind: NotificationKind, post: Option<&Post>) -> bool {
        if target == actor {
            log::debug!("suppressing self {kind} notification for {target}");
            return false;
        }

        let notification = Notification {
            notification_id: generate_record_id(),
            target_uid: target.to_string(),
            actor_uid: actor.to_string(),
            kind,
            post_id: post.map(|post| post.post_id.clone()),
            post_image_ref: post.map(|post| post.image_ref.clone()),
            created_at: Utc::now(),
        };

        let ctx = Arc::clone(&self.ctx);
        self.ctx.queue.submit("notification.append", move || {
            let ctx = Arc::clone(&ctx);
            let notification = notification.clone();
            async move { append(&ctx, &notification).await }
        });
        true
    }

    /// Notifications for `uid`, newest first.
    pub async fn list_notifications(&self, uid: &str) -> Result<Vec<Notification>, FeedError> {
        let ids = self
            .ctx
            .store
            .index_members_desc(&self.ctx.keys.user_notifications(uid))
            .await?;
        let keys: Vec<String> = ids.iter().map(|id| self.ctx.keys.notification(id)).collect();
        let mut notifications: Vec<Notification> = self.ctx.load_many(&keys).await?;
        notifications.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.notification_id.cmp(&a.notification_id))
        });
        Ok(notifications)
    }
}

/// Writing the same notification twice leaves one entry: the id is fixed before the first attempt.
async fn append(ctx: &FeedContext, notification: &Notification) -> Result<(), FeedError> {
    let plan = MutationPlan::new()
        .put_document(ctx.keys.notification(&notification.notification_id), notification.to_document())
        .index_add(
            ctx.keys.user_notifications(&notification.target_uid),
            notification.notification_id.clone(),
            score_for(&notification.created_at),
        );
    ctx.store.apply(plan).await?;
    log::debug!(
        "notified {} of {} by {}",
        notification.target_uid, notification.kind, notification.actor_uid
    );
    Ok(())
}
