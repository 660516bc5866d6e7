/// Key-construction helpers for every document, set, index and channel snapfeed touches.
///
/// Layout:
/// - `prefix:service:collection:id` for records
/// - `prefix:service:rel:alias:left` / `rel:alias_reverse:right` for membership sets
/// - `prefix:service:idx:name:owner` for score-ordered indexes
/// - `prefix:service:feed:uid` for the materialized feed index
/// - `prefix:service:chan:name:id` for pub/sub channels
#[derive(Debug, Clone)]
pub struct KeyContext {
    pub prefix: String,
    pub service: String,
}

impl KeyContext {
    pub fn new(prefix: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            service: service.into(),
        }
    }

    pub fn entity(&self, collection: &str, entity_id: &str) -> String {
        format!("{}:{}:{}:{}", self.prefix, self.service, collection, entity_id)
    }

    pub fn relation(&self, alias: &str, left_id: &str) -> String {
        format!("{}:{}:rel:{}:{}", self.prefix, self.service, alias, left_id)
    }

    pub fn relation_reverse(&self, alias: &str, right_id: &str) -> String {
        format!("{}:{}:rel:{}_reverse:{}", self.prefix, self.service, alias, right_id)
    }

    pub fn index(&self, name: &str, owner: &str) -> String {
        format!("{}:{}:idx:{}:{}", self.prefix, self.service, name, owner)
    }

    pub fn channel(&self, name: &str, id: &str) -> String {
        format!("{}:{}:chan:{}:{}", self.prefix, self.service, name, id)
    }

    pub fn user(&self, uid: &str) -> String {
        self.entity("users", uid)
    }

    pub fn post(&self, post_id: &str) -> String {
        self.entity("posts", post_id)
    }

    pub fn comment(&self, comment_id: &str) -> String {
        self.entity("comments", comment_id)
    }

    pub fn notification(&self, notification_id: &str) -> String {
        self.entity("notifications", notification_id)
    }

    /// Every registered user, scored by registration time.
    pub fn all_users(&self) -> String {
        self.index("users", "all")
    }

    /// Lower-cased usernames already claimed.
    pub fn usernames(&self) -> String {
        format!("{}:{}:usernames", self.prefix, self.service)
    }

    /// Uids that already own a profile record.
    pub fn profile_owners(&self) -> String {
        format!("{}:{}:profile_owners", self.prefix, self.service)
    }

    /// Users `uid` follows.
    pub fn following(&self, uid: &str) -> String {
        self.relation("follows", uid)
    }

    /// Users following `uid`.
    pub fn followers(&self, uid: &str) -> String {
        self.relation_reverse("follows", uid)
    }

    pub fn likers(&self, post_id: &str) -> String {
        self.relation("liked_by", post_id)
    }

    pub fn owner_posts(&self, uid: &str) -> String {
        self.index("posts_by_owner", uid)
    }

    pub fn all_posts(&self) -> String {
        self.index("posts", "all")
    }

    pub fn post_comments(&self, post_id: &str) -> String {
        self.index("comments", post_id)
    }

    pub fn user_notifications(&self, uid: &str) -> String {
        self.index("notifications", uid)
    }

    pub fn feed(&self, uid: &str) -> String {
        format!("{}:{}:feed:{}", self.prefix, self.service, uid)
    }

    pub fn comment_channel(&self, post_id: &str) -> String {
        self.channel("comments", post_id)
    }

    pub fn feed_channel(&self, uid: &str) -> String {
        self.channel("feed", uid)
    }
}
