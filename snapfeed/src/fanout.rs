//! Push-model feed fanout.
//!
//! Every user has a feed index (`feed:<uid>`): post ids scored by creation
//! time. The index is a cache of "my posts plus posts of everyone I follow",
//! kept current by three queued transitions:
//!
//! - post created: insert the post into the owner's and every follower's feed
//! - follow: copy all of the followee's posts into the follower's feed
//! - unfollow: remove all of the followee's posts from the follower's feed
//!
//! Each transition runs after its triggering write has committed and may be
//! retried, so all of them are idempotent. Reads resolve the index directly.

use std::{collections::BTreeSet, sync::Arc};

use futures::{StreamExt, stream};

use crate::{
    context::FeedContext,
    errors::FeedError,
    listener::{ListenerHandle, spawn_listener},
    models::{FeedEntry, Post, sort_posts_newest_first},
    record::{Record, score_for},
    store::MutationPlan,
};

#[derive(Clone)]
pub struct FeedFanout {
    ctx: Arc<FeedContext>,
}

impl FeedFanout {
    pub fn new(ctx: Arc<FeedContext>) -> Self {
        Self { ctx }
    }

    /// Queues the push of a freshly committed post.
    pub fn schedule_post(&self, post: &Post) {
        let ctx = Arc::clone(&self.ctx);
        let post = post.clone();
        self.ctx.queue.submit("fanout.post", move || {
            let ctx = Arc::clone(&ctx);
            let post = post.clone();
            async move { push_post(&ctx, &post).await }
        });
    }

    /// Queues copying `followee`'s posts into `follower`'s feed.
    pub fn schedule_follow(&self, follower: &str, followee: &str) {
        let ctx = Arc::clone(&self.ctx);
        let (follower, followee) = (follower.to_string(), followee.to_string());
        self.ctx.queue.submit("fanout.follow", move || {
            let ctx = Arc::clone(&ctx);
            let (follower, followee) = (follower.clone(), followee.clone());
            async move { copy_posts(&ctx, &follower, &followee).await }
        });
    }

    /// Queues removing `followee`'s posts from `follower`'s feed.
    pub fn schedule_unfollow(&self, follower: &str, followee: &str) {
        let ctx = Arc::clone(&self.ctx);
        let (follower, followee) = (follower.to_string(), followee.to_string());
        self.ctx.queue.submit("fanout.unfollow", move || {
            let ctx = Arc::clone(&ctx);
            let (follower, followee) = (follower.clone(), followee.clone());
            async move { remove_posts(&ctx, &follower, &followee).await }
        });
    }

    /// The personalized feed of `uid`, newest first.
    ///
    /// Entries pointing at missing posts are skipped. Entries whose owner is
    /// no longer followed (a fanout that raced an unfollow) are hidden and
    /// queued for pruning.
    pub async fn get_feed(&self, uid: &str) -> Result<Vec<Post>, FeedError> {
        let keys = &self.ctx.keys;
        let post_ids = self.ctx.store.index_members_desc(&keys.feed(uid)).await?;
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let post_keys: Vec<String> = post_ids.iter().map(|id| keys.post(id)).collect();
        let documents = self.ctx.store.get_documents(&post_keys).await?;
        let following = self.ctx.store.set_members(&keys.following(uid)).await?;

        let mut posts = Vec::with_capacity(post_ids.len());
        let mut stale = Vec::new();
        for (post_id, document) in post_ids.into_iter().zip(documents) {
            let Some(document) = document else {
                log::debug!("feed {uid}: skipping dangling entry {post_id}");
                stale.push(post_id);
                continue;
            };
            let post = Post::from_document(&document)?;
            if post.owner_uid == uid || following.contains(&post.owner_uid) {
                posts.push(post);
            } else {
                stale.push(post_id);
            }
        }

        if !stale.is_empty() {
            self.schedule_prune(uid, stale);
        }

        sort_posts_newest_first(&mut posts);
        Ok(posts)
    }

    /// Raw membership pairs of `uid`'s feed index, newest first.
    pub async fn feed_entries(&self, uid: &str) -> Result<Vec<FeedEntry>, FeedError> {
        let post_ids = self.ctx.store.index_members_desc(&self.ctx.keys.feed(uid)).await?;
        Ok(post_ids
            .into_iter()
            .map(|post_id| FeedEntry {
                owner_of_feed_uid: uid.to_string(),
                post_id,
            })
            .collect())
    }

    /// Replays own posts plus posts of everyone followed into a fresh index.
    ///
    /// Returns the number of entries written.
    pub async fn rebuild_feed(&self, uid: &str) -> Result<usize, FeedError> {
        let keys = &self.ctx.keys;
        let mut sources = self.ctx.store.set_members(&keys.following(uid)).await?;
        sources.insert(uid.to_string());

        let feed_key = keys.feed(uid);
        let mut plan = MutationPlan::new().delete(feed_key.clone());
        let mut written = 0;
        for source in &sources {
            for (post_id, score) in self.ctx.store.index_entries_desc(&keys.owner_posts(source)).await? {
                plan = plan.index_add(feed_key.clone(), post_id, score);
                written += 1;
            }
        }
        self.ctx.store.apply(plan).await?;

        log::info!("rebuilt feed for {uid}: {written} entries from {} sources", sources.len());
        Ok(written)
    }

    /// Delivers posts pushed into `uid`'s feed after this call returns.
    pub async fn watch_feed<F>(&self, uid: &str, callback: F) -> Result<ListenerHandle, FeedError>
    where
        F: FnMut(Post) + Send + 'static,
    {
        let subscription = self.ctx.store.subscribe(&self.ctx.keys.feed_channel(uid)).await?;
        Ok(spawn_listener(format!("feed watcher {uid}"), subscription, callback))
    }

    fn schedule_prune(&self, uid: &str, post_ids: Vec<String>) {
        let ctx = Arc::clone(&self.ctx);
        let uid = uid.to_string();
        self.ctx.queue.submit("fanout.prune", move || {
            let ctx = Arc::clone(&ctx);
            let uid = uid.clone();
            let post_ids = post_ids.clone();
            async move { prune_entries(&ctx, &uid, &post_ids).await }
        });
    }
}

async fn push_post(ctx: &FeedContext, post: &Post) -> Result<(), FeedError> {
    let mut recipients: BTreeSet<String> = ctx.store.set_members(&ctx.keys.followers(&post.owner_uid)).await?;
    recipients.insert(post.owner_uid.clone());

    let recipient_count = recipients.len();
    let score = score_for(&post.created_at);
    let payload = serde_json::to_string(post).ok();

    let writes = recipients.into_iter().map(|uid| {
        let plan = MutationPlan::new().index_add(ctx.keys.feed(&uid), post.post_id.clone(), score);
        let payload = payload.clone();
        async move {
            let inserted = ctx.store.apply(plan).await?.first().copied().unwrap_or(false);
            if let (true, Some(payload)) = (inserted, payload) {
                if let Err(err) = ctx.store.publish(&ctx.keys.feed_channel(&uid), &payload).await {
                    log::warn!("feed event for {uid} not published: {err}");
                }
            }
            Ok::<(), FeedError>(())
        }
    });
    let results: Vec<Result<(), FeedError>> = stream::iter(writes)
        .buffer_unordered(ctx.config.fanout.concurrency.max(1))
        .collect()
        .await;

    if let Some(err) = results.into_iter().find_map(Result::err) {
        return Err(err);
    }
    log::debug!("pushed post {} into {recipient_count} feeds", post.post_id);
    Ok(())
}

async fn copy_posts(ctx: &FeedContext, follower: &str, followee: &str) -> Result<(), FeedError> {
    // A later unfollow may already have run; copying now would leave stale entries.
    if !ctx.store.set_contains(&ctx.keys.following(follower), followee).await? {
        log::debug!("skipping copy of {followee} into {follower}: no longer following");
        return Ok(());
    }

    let entries = ctx.store.index_entries_desc(&ctx.keys.owner_posts(followee)).await?;
    if entries.is_empty() {
        return Ok(());
    }
    let feed_key = ctx.keys.feed(follower);
    let count = entries.len();
    let plan = entries
        .into_iter()
        .fold(MutationPlan::new(), |plan, (post_id, score)| plan.index_add(feed_key.clone(), post_id, score));
    ctx.store.apply(plan).await?;

    log::debug!("copied {count} posts of {followee} into feed of {follower}");
    Ok(())
}

async fn remove_posts(ctx: &FeedContext, follower: &str, followee: &str) -> Result<(), FeedError> {
    // Re-followed in the meantime: the posts belong in the feed again.
    if ctx.store.set_contains(&ctx.keys.following(follower), followee).await? {
        log::debug!("skipping removal of {followee} from {follower}: following again");
        return Ok(());
    }

    let post_ids = ctx.store.index_members_desc(&ctx.keys.owner_posts(followee)).await?;
    if post_ids.is_empty() {
        return Ok(());
    }
    let feed_key = ctx.keys.feed(follower);
    let count = post_ids.len();
    let plan = post_ids
        .into_iter()
        .fold(MutationPlan::new(), |plan, post_id| plan.index_remove(feed_key.clone(), post_id));
    ctx.store.apply(plan).await?;

    log::debug!("removed {count} posts of {followee} from feed of {follower}");
    Ok(())
}

async fn prune_entries(ctx: &FeedContext, uid: &str, post_ids: &[String]) -> Result<(), FeedError> {
    let following = ctx.store.set_members(&ctx.keys.following(uid)).await?;
    let post_keys: Vec<String> = post_ids.iter().map(|id| ctx.keys.post(id)).collect();
    let documents = ctx.store.get_documents(&post_keys).await?;

    let feed_key = ctx.keys.feed(uid);
    let mut plan = MutationPlan::new();
    for (post_id, document) in post_ids.iter().zip(documents) {
        let owner = document.as_ref().and_then(|document| document.get("owner_uid"));
        let still_visible = owner.is_some_and(|owner| owner == uid || following.contains(owner));
        if !still_visible {
            plan = plan.index_remove(feed_key.clone(), post_id.clone());
        }
    }
    if plan.is_empty() {
        return Ok(());
    }

    let pruned = plan.len();
    ctx.store.apply(plan).await?;
    log::debug!("pruned {pruned} stale entries from feed of {uid}");
    Ok(())
}
