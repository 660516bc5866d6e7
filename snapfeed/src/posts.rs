use std::sync::Arc;

use chrono::Utc;

use crate::{
    context::FeedContext,
    errors::{FeedError, ValidationError},
    fanout::FeedFanout,
    id::generate_record_id,
    models::{Post, sort_posts_newest_first},
    record::{Record, score_for},
    store::MutationPlan,
    users::UserDirectory,
    validators::{MAX_CAPTION_CHARS, check_text},
};

/// Post records plus the per-owner and global indexes over them.
#[derive(Clone)]
pub struct PostStore {
    ctx: Arc<FeedContext>,
    users: UserDirectory,
    fanout: FeedFanout,
}

impl PostStore {
    pub fn new(ctx: Arc<FeedContext>) -> Self {
        Self {
            users: UserDirectory::new(Arc::clone(&ctx)),
            fanout: FeedFanout::new(Arc::clone(&ctx)),
            ctx,
        }
    }

    /// Captions may be empty but are bounded in length.
    pub fn validate_caption(caption: &str) -> Result<(), FeedError> {
        let mut issues = Vec::new();
        check_text("caption", caption, MAX_CAPTION_CHARS, false, &mut issues);
        ValidationError::new(issues).into_result()
    }

    /// Writes a new post and queues its fanout.
    ///
    /// The post is durable once this returns; fanout trouble only shows up
    /// later in the logs.
    pub async fn create_post(&self, owner_uid: &str, image_ref: &str, caption: &str) -> Result<Post, FeedError> {
        Self::validate_caption(caption)?;
        self.users.ensure_exists(owner_uid).await?;

        let post = Post {
            post_id: generate_record_id(),
            owner_uid: owner_uid.to_string(),
            image_ref: image_ref.to_string(),
            caption: caption.to_string(),
            created_at: Utc::now(),
            like_count: 0,
        };
        let keys = &self.ctx.keys;
        let score = score_for(&post.created_at);
        let plan = MutationPlan::new()
            .put_document(keys.post(&post.post_id), post.to_document())
            .index_add(keys.owner_posts(owner_uid), post.post_id.clone(), score)
            .index_add(keys.all_posts(), post.post_id.clone(), score);
        self.ctx.store.apply(plan).await?;

        log::info!("created post {} for {owner_uid}", post.post_id);
        self.fanout.schedule_post(&post);
        Ok(post)
    }

    pub async fn get_post(&self, post_id: &str) -> Result<Post, FeedError> {
        self.ctx.load(&self.ctx.keys.post(post_id), "post", post_id).await
    }

    /// Posts of `uid`, newest first.
    pub async fn list_posts_by_owner(&self, uid: &str) -> Result<Vec<Post>, FeedError> {
        self.list_index(&self.ctx.keys.owner_posts(uid)).await
    }

    /// Every post, newest first. Used for explore; independent of any feed.
    pub async fn list_all_posts(&self) -> Result<Vec<Post>, FeedError> {
        self.list_index(&self.ctx.keys.all_posts()).await
    }

    async fn list_index(&self, index_key: &str) -> Result<Vec<Post>, FeedError> {
        let post_ids = self.ctx.store.index_members_desc(index_key).await?;
        let keys: Vec<String> = post_ids.iter().map(|id| self.ctx.keys.post(id)).collect();
        let mut posts: Vec<Post> = self.ctx.load_many(&keys).await?;
        sort_posts_newest_first(&mut posts);
        Ok(posts)
    }
}
