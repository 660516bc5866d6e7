//! Domain records.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "utoipa")]
use utoipa::ToSchema;

use crate::{
    errors::FeedError,
    record::{Document, DocumentBuilder, FieldReader, Record},
};

/// A registered user.
///
/// Identity fields are fixed at registration; only `profile_image_ref` changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct User {
    pub uid: String,
    pub username: String,
    pub fullname: String,
    pub email: String,
    pub profile_image_ref: String,
    pub created_at: DateTime<Utc>,
}

impl Record for User {
    const COLLECTION: &'static str = "users";

    fn to_document(&self) -> Document {
        DocumentBuilder::new()
            .string("uid", &self.uid)
            .string("username", &self.username)
            .string("fullname", &self.fullname)
            .string("email", &self.email)
            .string("profile_image_ref", &self.profile_image_ref)
            .timestamp("created_at", &self.created_at)
            .build()
    }

    fn from_document(document: &Document) -> Result<Self, FeedError> {
        let reader = FieldReader::new(Self::COLLECTION, document);
        Ok(Self {
            uid: reader.non_empty("uid")?,
            username: reader.non_empty("username")?,
            fullname: reader.string("fullname")?,
            email: reader.non_empty("email")?,
            profile_image_ref: reader.string("profile_image_ref")?,
            created_at: reader.timestamp("created_at")?,
        })
    }
}

/// Profile fields supplied at registration.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub fullname: String,
    pub email: String,
    pub profile_image_ref: String,
}

/// A post. Immutable after creation except for `like_count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct Post {
    pub post_id: String,
    pub owner_uid: String,
    pub image_ref: String,
    pub caption: String,
    pub created_at: DateTime<Utc>,
    /// Cached cardinality of the post's like set.
    pub like_count: i64,
}

impl Post {
    pub(crate) const LIKE_COUNT_FIELD: &'static str = "like_count";
}

impl Record for Post {
    const COLLECTION: &'static str = "posts";

    fn to_document(&self) -> Document {
        DocumentBuilder::new()
            .string("post_id", &self.post_id)
            .string("owner_uid", &self.owner_uid)
            .string("image_ref", &self.image_ref)
            .string("caption", &self.caption)
            .timestamp("created_at", &self.created_at)
            .i64(Self::LIKE_COUNT_FIELD, self.like_count)
            .build()
    }

    fn from_document(document: &Document) -> Result<Self, FeedError> {
        let reader = FieldReader::new(Self::COLLECTION, document);
        let like_count = reader.i64(Self::LIKE_COUNT_FIELD)?;
        if like_count < 0 {
            return Err(FeedError::malformed(Self::COLLECTION, Self::LIKE_COUNT_FIELD, "is negative"));
        }
        Ok(Self {
            post_id: reader.non_empty("post_id")?,
            owner_uid: reader.non_empty("owner_uid")?,
            image_ref: reader.string("image_ref")?,
            caption: reader.string("caption")?,
            created_at: reader.timestamp("created_at")?,
            like_count,
        })
    }
}

/// A comment on a post. Author details are copied in at write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct Comment {
    pub comment_id: String,
    pub post_id: String,
    pub uid: String,
    pub username: String,
    pub profile_image_ref: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Record for Comment {
    const COLLECTION: &'static str = "comments";

    fn to_document(&self) -> Document {
        DocumentBuilder::new()
            .string("comment_id", &self.comment_id)
            .string("post_id", &self.post_id)
            .string("uid", &self.uid)
            .string("username", &self.username)
            .string("profile_image_ref", &self.profile_image_ref)
            .string("body", &self.body)
            .timestamp("created_at", &self.created_at)
            .build()
    }

    fn from_document(document: &Document) -> Result<Self, FeedError> {
        let reader = FieldReader::new(Self::COLLECTION, document);
        Ok(Self {
            comment_id: reader.non_empty("comment_id")?,
            post_id: reader.non_empty("post_id")?,
            uid: reader.non_empty("uid")?,
            username: reader.string("username")?,
            profile_image_ref: reader.string("profile_image_ref")?,
            body: reader.string("body")?,
            created_at: reader.timestamp("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Like,
    Comment,
    Follow,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Comment => "comment",
            Self::Follow => "follow",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "like" => Ok(Self::Like),
            "comment" => Ok(Self::Comment),
            "follow" => Ok(Self::Follow),
            other => Err(format!("unknown notification kind '{other}'")),
        }
    }
}

/// An entry in a user's notification log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct Notification {
    pub notification_id: String,
    pub target_uid: String,
    pub actor_uid: String,
    pub kind: NotificationKind,
    pub post_id: Option<String>,
    pub post_image_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Record for Notification {
    const COLLECTION: &'static str = "notifications";

    fn to_document(&self) -> Document {
        DocumentBuilder::new()
            .string("notification_id", &self.notification_id)
            .string("target_uid", &self.target_uid)
            .string("actor_uid", &self.actor_uid)
            .string("kind", self.kind.as_str())
            .optional_string("post_id", self.post_id.as_deref())
            .optional_string("post_image_ref", self.post_image_ref.as_deref())
            .timestamp("created_at", &self.created_at)
            .build()
    }

    fn from_document(document: &Document) -> Result<Self, FeedError> {
        let reader = FieldReader::new(Self::COLLECTION, document);
        let kind = reader
            .string("kind")?
            .parse::<NotificationKind>()
            .map_err(|reason| FeedError::malformed(Self::COLLECTION, "kind", reason))?;
        Ok(Self {
            notification_id: reader.non_empty("notification_id")?,
            target_uid: reader.non_empty("target_uid")?,
            actor_uid: reader.non_empty("actor_uid")?,
            kind,
            post_id: reader.optional_string("post_id"),
            post_image_ref: reader.optional_string("post_image_ref"),
            created_at: reader.timestamp("created_at")?,
        })
    }
}

/// Membership of a post in a user's materialized feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedEntry {
    pub owner_of_feed_uid: String,
    pub post_id: String,
}

/// Profile header counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct UserStats {
    pub followers: u64,
    pub following: u64,
    pub posts: u64,
}

/// Newest first; ties broken by id so the order is total.
pub(crate) fn sort_posts_newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.post_id.cmp(&a.post_id)));
}
