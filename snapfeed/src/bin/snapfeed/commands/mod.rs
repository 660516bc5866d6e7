pub mod read;
pub mod repair;
pub mod tour;

use anyhow::{Context, Result};
use snapfeed::{FeedClient, FeedConfig};

use crate::output::OutputManager;

/// Opens a Redis-backed client for the read and repair commands.
pub async fn connect(config: &FeedConfig, output: &OutputManager) -> Result<FeedClient> {
    output.info(&format!("Connecting to {}", config.store.redis_url));
    FeedClient::connect(config.clone())
        .await
        .with_context(|| format!("failed to connect to {}", config.store.redis_url))
}
