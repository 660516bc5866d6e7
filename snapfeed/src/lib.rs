//! snapfeed core library.
//!
//! A social-graph and feed engine: follow edges, posts, likes and comments,
//! push-model feed fanout and per-user notifications, on top of a pluggable
//! document store (Redis or in-process).

pub mod auth;
pub mod client;
pub mod config;
mod context;
pub mod engagement;
pub mod errors;
pub mod fanout;
pub mod graph;
pub mod id;
pub mod keys;
pub mod listener;
pub mod media;
pub mod models;
pub mod notifications;
pub mod posts;
pub mod record;
pub mod store;
pub mod tasks;
pub mod users;
pub mod validators;

pub use auth::{AuthProvider, MemoryAuth, Principal, Session};
pub use client::{Credentials, FeedClient};
pub use config::{ConfigError, FeedConfig, RetryPolicy};
pub use context::FeedContext;
pub use engagement::Engagement;
pub use errors::*;
pub use fanout::FeedFanout;
pub use graph::SocialGraph;
pub use listener::ListenerHandle;
pub use media::{MediaKind, MediaRef, MediaStore, MemoryMediaStore};
pub use models::{Comment, FeedEntry, NewUser, Notification, NotificationKind, Post, User, UserStats};
pub use notifications::NotificationSink;
pub use posts::PostStore;
pub use store::{DocumentStore, MemoryStore, MutationPlan, RedisStore};
pub use tasks::{QueueStats, TaskQueue};
pub use users::UserDirectory;

pub use redis;
