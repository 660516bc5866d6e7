//! Object storage for profile and post images.

use std::{
    collections::HashMap,
    fmt,
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::errors::FeedError;

/// Opaque reference to a stored blob, e.g. `post_images/<uuid>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaRef(String);

impl MediaRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    ProfileImage,
    PostImage,
}

impl MediaKind {
    fn folder(&self) -> &'static str {
        match self {
            Self::ProfileImage => "profile_images",
            Self::PostImage => "post_images",
        }
    }
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn put(&self, kind: MediaKind, bytes: Vec<u8>) -> Result<MediaRef, FeedError>;

    async fn url_for(&self, media: &MediaRef) -> Result<Url, FeedError>;
}

/// In-process [`MediaStore`] keyed by fresh UUIDs.
pub struct MemoryMediaStore {
    base_url: Url,
    blobs: Mutex<HashMap<MediaRef, Vec<u8>>>,
}

impl MemoryMediaStore {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            blobs: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_base(base_url: &str) -> Result<Self, FeedError> {
        let parsed = Url::parse(base_url)
            .map_err(|err| FeedError::invalid(format!("invalid media base url '{base_url}': {err}")))?;
        Ok(Self::new(parsed))
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn put(&self, kind: MediaKind, bytes: Vec<u8>) -> Result<MediaRef, FeedError> {
        if bytes.is_empty() {
            return Err(FeedError::invalid("image data is empty"));
        }
        let media = MediaRef::new(format!("{}/{}", kind.folder(), Uuid::new_v4()));
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(media.clone(), bytes);
        Ok(media)
    }

    async fn url_for(&self, media: &MediaRef) -> Result<Url, FeedError> {
        let known = self
            .blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(media);
        if !known {
            return Err(FeedError::not_found("media", media.as_str()));
        }
        self.base_url
            .join(media.as_str())
            .map_err(|err| FeedError::invalid(format!("cannot build url for {media}: {err}")))
    }
}
