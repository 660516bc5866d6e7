use anyhow::Result;
use snapfeed::FeedConfig;

use crate::examples::ExampleGroup;
use crate::output::OutputManager;

use super::connect;

pub const FEED_EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Inspect Feeds",
    commands: &[
        "snapfeed feed 3xk9w2m4p7q8r5t6v1z0        # Resolved feed, newest first",
        "snapfeed --output json feed <uid>         # Same, as JSON",
        "snapfeed explore                          # Every post, newest first",
    ],
}];

pub const NOTIFICATION_EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Inspect Notifications",
    commands: &["snapfeed notifications <uid>         # Likes, comments and follows for a user"],
}];

/// Read-only views over a live store.
pub enum ReadCommand {
    Feed { uid: String },
    Posts { uid: String },
    Explore,
    Users { query: Option<String> },
    Comments { post_id: String },
    Notifications { uid: String },
    Stats { uid: String },
}

pub async fn handle_read(command: ReadCommand, config: &FeedConfig, output: &OutputManager) -> Result<()> {
    let client = connect(config, output).await?;

    match command {
        ReadCommand::Feed { uid } => {
            let user = client.users().get_user(&uid).await?;
            output.heading(&format!("Feed of @{}", user.username));
            let posts = client.fanout().get_feed(&uid).await?;
            output.display(&posts)?;
        }
        ReadCommand::Posts { uid } => {
            let posts = client.posts().list_posts_by_owner(&uid).await?;
            output.heading(&format!("Posts by {uid}"));
            output.display(&posts)?;
        }
        ReadCommand::Explore => {
            let posts = client.posts().list_all_posts().await?;
            output.heading("Explore");
            output.display(&posts)?;
        }
        ReadCommand::Users { query } => {
            let users = match query.as_deref() {
                Some(query) => client.users().search_users(query).await?,
                None => client.users().list_users().await?,
            };
            output.heading("Users");
            output.display(&users)?;
        }
        ReadCommand::Comments { post_id } => {
            let post = client.posts().get_post(&post_id).await?;
            output.heading(&format!("Comments on {}", post.post_id));
            output.key_value("likes", &post.like_count.to_string());
            let comments = client.engagement().list_comments(&post_id).await?;
            output.display(&comments)?;
        }
        ReadCommand::Notifications { uid } => {
            let notifications = client.notifications().list_notifications(&uid).await?;
            output.heading(&format!("Notifications for {uid}"));
            output.display(&notifications)?;
        }
        ReadCommand::Stats { uid } => {
            let user = client.users().get_user(&uid).await?;
            let stats = client.users().stats(&uid).await?;
            output.heading(&format!("@{} ({})", user.username, user.fullname));
            output.display(&stats)?;
        }
    }

    // Reads may have queued feed pruning.
    client.flush().await;
    Ok(())
}
