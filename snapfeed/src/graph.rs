//! Directed follow edges.
//!
//! Each edge is stored twice, under `follows:<follower>` and
//! `follows_reverse:<followee>`, and both directions are written in one plan.

use std::{collections::BTreeSet, sync::Arc};

use crate::{
    context::FeedContext,
    errors::FeedError,
    fanout::FeedFanout,
    models::NotificationKind,
    notifications::NotificationSink,
    store::MutationPlan,
    users::UserDirectory,
};

#[derive(Clone)]
pub struct SocialGraph {
    ctx: Arc<FeedContext>,
    users: UserDirectory,
    fanout: FeedFanout,
    notifications: NotificationSink,
}

impl SocialGraph {
    pub fn new(ctx: Arc<FeedContext>) -> Self {
        Self {
            users: UserDirectory::new(Arc::clone(&ctx)),
            fanout: FeedFanout::new(Arc::clone(&ctx)),
            notifications: NotificationSink::new(Arc::clone(&ctx)),
            ctx,
        }
    }

    /// Adds the edge `follower -> followee`.
    ///
    /// Returns `false` if the edge already existed, in which case nothing
    /// else happens. A new edge queues the feed copy and a follow notification.
    pub async fn follow(&self, follower: &str, followee: &str) -> Result<bool, FeedError> {
        if follower == followee {
            return Err(FeedError::invalid("users cannot follow themselves"));
        }
        self.users.ensure_exists(follower).await?;
        self.users.ensure_exists(followee).await?;

        let keys = &self.ctx.keys;
        let plan = MutationPlan::new()
            .set_add(keys.following(follower), followee)
            .set_add(keys.followers(followee), follower);
        let changed = self.ctx.store.apply(plan).await?;
        if !changed.iter().any(|flag| *flag) {
            log::debug!("{follower} already follows {followee}");
            return Ok(false);
        }

        self.fanout.schedule_follow(follower, followee);
        self.notifications.notify(followee, follower, NotificationKind::Follow, None);
        log::info!("{follower} followed {followee}");
        Ok(true)
    }

    /// Removes the edge. Returns `false` if there was nothing to remove.
    pub async fn unfollow(&self, follower: &str, followee: &str) -> Result<bool, FeedError> {
        if follower == followee {
            return Ok(false);
        }
        let keys = &self.ctx.keys;
        let plan = MutationPlan::new()
            .set_remove(keys.following(follower), followee)
            .set_remove(keys.followers(followee), follower);
        let changed = self.ctx.store.apply(plan).await?;
        if !changed.iter().any(|flag| *flag) {
            return Ok(false);
        }

        self.fanout.schedule_unfollow(follower, followee);
        log::info!("{follower} unfollowed {followee}");
        Ok(true)
    }

    pub async fn is_following(&self, follower: &str, followee: &str) -> Result<bool, FeedError> {
        self.ctx.store.set_contains(&self.ctx.keys.following(follower), followee).await
    }

    /// Uids following `uid`.
    pub async fn followers(&self, uid: &str) -> Result<BTreeSet<String>, FeedError> {
        self.ctx.store.set_members(&self.ctx.keys.followers(uid)).await
    }

    /// Uids `uid` follows.
    pub async fn following(&self, uid: &str) -> Result<BTreeSet<String>, FeedError> {
        self.ctx.store.set_members(&self.ctx.keys.following(uid)).await
    }
}
