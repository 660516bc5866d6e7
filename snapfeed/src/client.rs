//! Entry point wiring a store, an auth provider and a media store into the
//! feed services, plus the multi-step write pipelines.

use std::sync::Arc;

use crate::{
    auth::{AuthProvider, MemoryAuth, Principal, Session},
    config::FeedConfig,
    context::FeedContext,
    engagement::Engagement,
    errors::{FeedError, PipelineStep},
    fanout::FeedFanout,
    graph::SocialGraph,
    media::{MediaKind, MediaRef, MediaStore, MemoryMediaStore},
    models::{Comment, NewUser, Post, User},
    notifications::NotificationSink,
    posts::PostStore,
    store::{DocumentStore, MemoryStore, RedisStore},
    tasks::QueueStats,
    users::UserDirectory,
};

/// Everything needed to open an account.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub username: String,
    pub fullname: String,
    /// Optional avatar; uploaded before the account is created.
    pub profile_image: Option<Vec<u8>>,
}

#[derive(Clone)]
pub struct FeedClient {
    ctx: Arc<FeedContext>,
    auth: Arc<dyn AuthProvider>,
    media: Arc<dyn MediaStore>,
}

impl FeedClient {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        auth: Arc<dyn AuthProvider>,
        media: Arc<dyn MediaStore>,
        config: FeedConfig,
    ) -> Self {
        Self {
            ctx: FeedContext::new(store, config),
            auth,
            media,
        }
    }

    /// Fully in-process client: memory store, memory auth, memory media.
    pub fn in_memory(config: FeedConfig) -> Result<Self, FeedError> {
        let media = MemoryMediaStore::from_base(&config.media.base_url)?;
        Ok(Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryAuth::new()),
            Arc::new(media),
            config,
        ))
    }

    /// Client backed by the Redis server named in `config.store.redis_url`.
    pub async fn connect(config: FeedConfig) -> Result<Self, FeedError> {
        let store = RedisStore::connect(&config.store.redis_url).await?;
        let media = MemoryMediaStore::from_base(&config.media.base_url)?;
        log::info!("connected to {}", config.store.redis_url);
        Ok(Self::new(
            Arc::new(store),
            Arc::new(MemoryAuth::new()),
            Arc::new(media),
            config,
        ))
    }

    pub fn config(&self) -> &FeedConfig {
        &self.ctx.config
    }

    pub fn users(&self) -> UserDirectory {
        UserDirectory::new(Arc::clone(&self.ctx))
    }

    pub fn graph(&self) -> SocialGraph {
        SocialGraph::new(Arc::clone(&self.ctx))
    }

    pub fn posts(&self) -> PostStore {
        PostStore::new(Arc::clone(&self.ctx))
    }

    pub fn engagement(&self) -> Engagement {
        Engagement::new(Arc::clone(&self.ctx))
    }

    pub fn fanout(&self) -> FeedFanout {
        FeedFanout::new(Arc::clone(&self.ctx))
    }

    pub fn notifications(&self) -> NotificationSink {
        NotificationSink::new(Arc::clone(&self.ctx))
    }

    /// Session for whoever the auth provider currently considers signed in.
    pub async fn session(&self) -> Session {
        match self.auth.current_principal().await {
            Some(principal) => Session::authenticated(principal),
            None => Session::anonymous(),
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, FeedError> {
        let principal = self.auth.sign_in(email, password).await?;
        Ok(Session::authenticated(principal))
    }

    pub async fn sign_out(&self) -> Result<Session, FeedError> {
        self.auth.sign_out().await?;
        Ok(Session::anonymous())
    }

    /// Upload avatar, create the account, create the profile.
    ///
    /// Input is validated and the username checked before any step runs. A
    /// failing step stops the pipeline and is reported as
    /// [`FeedError::Pipeline`] naming that step.
    ///
    /// An account left without a profile by an earlier failed attempt is
    /// picked up again when the same credentials are presented, so a retry
    /// after a profile failure can succeed.
    pub async fn register(&self, credentials: Credentials) -> Result<(Session, User), FeedError> {
        let Credentials {
            email,
            password,
            username,
            fullname,
            profile_image,
        } = credentials;
        let mut new_user = NewUser {
            username,
            fullname,
            email: email.clone(),
            profile_image_ref: String::new(),
        };
        UserDirectory::validate_new_user(&new_user)?;

        let users = self.users();
        let available = users
            .is_username_available(&new_user.username)
            .await
            .map_err(|err| err.at_step(PipelineStep::CreateProfile))?;
        if !available {
            return Err(FeedError::invalid(format!("username '{}' is taken", new_user.username))
                .at_step(PipelineStep::CreateProfile));
        }

        if let Some(bytes) = profile_image {
            let media = self
                .media
                .put(MediaKind::ProfileImage, bytes)
                .await
                .map_err(|err| err.at_step(PipelineStep::UploadImage))?;
            new_user.profile_image_ref = media.into_string();
        }

        let principal = match self.auth.sign_up(&email, &password).await {
            Ok(principal) => principal,
            Err(err) => match self.resume_account(&users, &email, &password).await {
                Some(principal) => principal,
                None => return Err(err.at_step(PipelineStep::SignUp)),
            },
        };

        match users.create_profile(&principal, new_user).await {
            Ok(user) => Ok((Session::authenticated(principal), user)),
            Err(err) => {
                // The account stays; a retry with the same credentials resumes it.
                if let Err(sign_out_err) = self.auth.sign_out().await {
                    log::warn!("sign out after failed profile creation: {sign_out_err}");
                }
                Err(err.at_step(PipelineStep::CreateProfile))
            }
        }
    }

    /// Signs in to an existing account that has no profile yet.
    async fn resume_account(&self, users: &UserDirectory, email: &str, password: &str) -> Option<Principal> {
        let principal = self.auth.sign_in(email, password).await.ok()?;
        match users.has_profile(&principal.uid).await {
            Ok(false) => {
                log::info!("resuming registration for account {}", principal.uid);
                Some(principal)
            }
            Ok(true) | Err(_) => {
                if let Err(err) = self.auth.sign_out().await {
                    log::warn!("sign out after declined resume: {err}");
                }
                None
            }
        }
    }

    /// Upload the image, then create the post. Fanout is queued, not awaited.
    pub async fn publish_post(&self, session: &Session, image: Vec<u8>, caption: &str) -> Result<Post, FeedError> {
        let principal = session.require()?;
        PostStore::validate_caption(caption)?;

        let media = self
            .media
            .put(MediaKind::PostImage, image)
            .await
            .map_err(|err| err.at_step(PipelineStep::UploadImage))?;

        self.posts()
            .create_post(&principal.uid, media.as_str(), caption)
            .await
            .map_err(|err| err.at_step(PipelineStep::CreatePost))
    }

    /// Upload a new avatar and point the profile at it.
    pub async fn update_profile_image(&self, session: &Session, image: Vec<u8>) -> Result<User, FeedError> {
        let principal = session.require()?;
        let media = self
            .media
            .put(MediaKind::ProfileImage, image)
            .await
            .map_err(|err| err.at_step(PipelineStep::UploadImage))?;
        self.users().set_profile_image(&principal.uid, media.as_str()).await
    }

    pub async fn media_url(&self, media: &str) -> Result<url::Url, FeedError> {
        self.media.url_for(&MediaRef::new(media)).await
    }

    pub async fn follow(&self, session: &Session, followee: &str) -> Result<bool, FeedError> {
        let principal = session.require()?;
        self.graph().follow(&principal.uid, followee).await
    }

    pub async fn unfollow(&self, session: &Session, followee: &str) -> Result<bool, FeedError> {
        let principal = session.require()?;
        self.graph().unfollow(&principal.uid, followee).await
    }

    pub async fn like(&self, session: &Session, post_id: &str) -> Result<i64, FeedError> {
        let principal = session.require()?;
        self.engagement().like(post_id, &principal.uid).await
    }

    pub async fn unlike(&self, session: &Session, post_id: &str) -> Result<i64, FeedError> {
        let principal = session.require()?;
        self.engagement().unlike(post_id, &principal.uid).await
    }

    pub async fn comment(&self, session: &Session, post_id: &str, body: &str) -> Result<Comment, FeedError> {
        let principal = session.require()?;
        self.engagement().add_comment(post_id, &principal.uid, body).await
    }

    /// Personalized feed of the signed-in user.
    pub async fn my_feed(&self, session: &Session) -> Result<Vec<Post>, FeedError> {
        let Principal { uid, .. } = session.require()?;
        self.fanout().get_feed(uid).await
    }

    /// Waits for every queued fanout, prune and notification task.
    pub async fn flush(&self) {
        self.ctx.queue.flush().await;
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.ctx.queue.stats()
    }
}
