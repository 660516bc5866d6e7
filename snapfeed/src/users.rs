//! User directory: profiles, lookup, search and profile stats.

use std::sync::Arc;

use chrono::Utc;

use crate::{
    auth::Principal,
    context::FeedContext,
    errors::{FeedError, ValidationError, ValidationIssue},
    models::{NewUser, User, UserStats},
    record::{Record, score_for},
    store::MutationPlan,
    validators::{MAX_FULLNAME_CHARS, check_text, is_valid_email, is_valid_username},
};

#[derive(Clone)]
pub struct UserDirectory {
    ctx: Arc<FeedContext>,
}

impl UserDirectory {
    pub fn new(ctx: Arc<FeedContext>) -> Self {
        Self { ctx }
    }

    /// Checks profile fields without touching the store.
    pub fn validate_new_user(new_user: &NewUser) -> Result<(), FeedError> {
        let mut issues = Vec::new();
        if !is_valid_email(&new_user.email) {
            issues.push(ValidationIssue::new(
                "email",
                "validation.email",
                "value must be a valid email address",
            ));
        }
        if !is_valid_username(&new_user.username) {
            issues.push(ValidationIssue::new(
                "username",
                "validation.username",
                "3-30 characters of letters, digits, '.' or '_'",
            ));
        }
        check_text("fullname", &new_user.fullname, MAX_FULLNAME_CHARS, true, &mut issues);
        ValidationError::new(issues).into_result()
    }

    /// Creates the profile record for an authenticated principal.
    ///
    /// The principal's profile slot and the lower-cased username are claimed
    /// together in one plan. Whichever half this call newly claimed is
    /// released again when the other half was already taken or the record
    /// write fails.
    pub async fn create_profile(&self, principal: &Principal, new_user: NewUser) -> Result<User, FeedError> {
        Self::validate_new_user(&new_user)?;
        let keys = &self.ctx.keys;

        let claim = new_user.username.to_lowercase();
        let flags = self
            .ctx
            .store
            .apply(
                MutationPlan::new()
                    .set_add(keys.profile_owners(), principal.uid.clone())
                    .set_add(keys.usernames(), claim.clone()),
            )
            .await?;
        let (owner_claimed, name_claimed) = match flags.as_slice() {
            [owner, name] => (*owner, *name),
            _ => (false, false),
        };
        if !owner_claimed || !name_claimed {
            self.release_claims(&principal.uid, owner_claimed, &claim, name_claimed).await;
            return Err(if owner_claimed {
                FeedError::invalid(format!("username '{}' is taken", new_user.username))
            } else {
                FeedError::invalid(format!("profile for '{}' already exists", principal.uid))
            });
        }

        let user = User {
            uid: principal.uid.clone(),
            username: new_user.username,
            fullname: new_user.fullname,
            email: new_user.email,
            profile_image_ref: new_user.profile_image_ref,
            created_at: Utc::now(),
        };
        let plan = MutationPlan::new()
            .put_document(keys.user(&user.uid), user.to_document())
            .index_add(keys.all_users(), user.uid.clone(), score_for(&user.created_at));

        if let Err(err) = self.ctx.store.apply(plan).await {
            self.release_claims(&user.uid, true, &claim, true).await;
            return Err(err);
        }

        log::info!("registered user {} (@{})", user.uid, user.username);
        Ok(user)
    }

    /// Whether `username` is still unclaimed (case-insensitive).
    pub async fn is_username_available(&self, username: &str) -> Result<bool, FeedError> {
        let claimed = self
            .ctx
            .store
            .set_contains(&self.ctx.keys.usernames(), &username.to_lowercase())
            .await?;
        Ok(!claimed)
    }

    /// Whether `uid` owns (or is in the middle of creating) a profile.
    pub async fn has_profile(&self, uid: &str) -> Result<bool, FeedError> {
        self.ctx.store.set_contains(&self.ctx.keys.profile_owners(), uid).await
    }

    async fn release_claims(&self, uid: &str, owner: bool, claim: &str, name: bool) {
        let keys = &self.ctx.keys;
        let mut plan = MutationPlan::new();
        if owner {
            plan = plan.set_remove(keys.profile_owners(), uid);
        }
        if name {
            plan = plan.set_remove(keys.usernames(), claim);
        }
        if plan.is_empty() {
            return;
        }
        if let Err(err) = self.ctx.store.apply(plan).await {
            log::warn!("failed to release profile claims for {uid}: {err}");
        }
    }

    pub async fn get_user(&self, uid: &str) -> Result<User, FeedError> {
        self.ctx.load(&self.ctx.keys.user(uid), "user", uid).await
    }

    /// Fails with `NotFound` unless `uid` has a profile.
    pub(crate) async fn ensure_exists(&self, uid: &str) -> Result<(), FeedError> {
        match self.ctx.store.get_document(&self.ctx.keys.user(uid)).await? {
            Some(_) => Ok(()),
            None => Err(FeedError::not_found("user", uid)),
        }
    }

    /// All users, ordered by username.
    pub async fn list_users(&self) -> Result<Vec<User>, FeedError> {
        let uids = self.ctx.store.index_members_desc(&self.ctx.keys.all_users()).await?;
        let keys: Vec<String> = uids.iter().map(|uid| self.ctx.keys.user(uid)).collect();
        let mut users: Vec<User> = self.ctx.load_many(&keys).await?;
        users.sort_by(|a, b| a.username.to_lowercase().cmp(&b.username.to_lowercase()));
        Ok(users)
    }

    /// Case-insensitive substring match on username or full name. A blank query matches everyone.
    pub async fn search_users(&self, query: &str) -> Result<Vec<User>, FeedError> {
        let needle = query.trim().to_lowercase();
        let users = self.list_users().await?;
        if needle.is_empty() {
            return Ok(users);
        }
        Ok(users
            .into_iter()
            .filter(|user| {
                user.username.to_lowercase().contains(&needle) || user.fullname.to_lowercase().contains(&needle)
            })
            .collect())
    }

    /// Replaces the profile image; the only mutable identity field.
    pub async fn set_profile_image(&self, uid: &str, image_ref: &str) -> Result<User, FeedError> {
        self.ensure_exists(uid).await?;
        self.ctx
            .store
            .apply(MutationPlan::new().set_field(self.ctx.keys.user(uid), "profile_image_ref", image_ref))
            .await?;
        self.get_user(uid).await
    }

    pub async fn stats(&self, uid: &str) -> Result<UserStats, FeedError> {
        self.ensure_exists(uid).await?;
        let keys = &self.ctx.keys;
        Ok(UserStats {
            followers: self.ctx.store.set_len(&keys.followers(uid)).await?,
            following: self.ctx.store.set_len(&keys.following(uid)).await?,
            posts: self.ctx.store.index_len(&keys.owner_posts(uid)).await?,
        })
    }
}
