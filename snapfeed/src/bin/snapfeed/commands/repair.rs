use anyhow::{Result, bail};
use snapfeed::FeedConfig;

use crate::examples::ExampleGroup;
use crate::output::OutputManager;

use super::connect;

pub const REBUILD_EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Rebuild Feed Indexes",
    commands: &[
        "snapfeed rebuild-feed <uid> <uid>       # Rebuild selected feeds",
        "snapfeed rebuild-feed --all             # Rebuild every user's feed",
    ],
}];

pub const LIKE_EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Repair Like Counters",
    commands: &[
        "snapfeed repair-likes <post_id>         # Reset one counter from its like set",
        "snapfeed repair-likes --all             # Check every post",
    ],
}];

pub async fn handle_rebuild_feed(uids: Vec<String>, all: bool, config: &FeedConfig, output: &OutputManager) -> Result<()> {
    if uids.is_empty() && !all {
        bail!("pass one or more uids, or --all");
    }
    let client = connect(config, output).await?;
    let uids = if all {
        client.users().list_users().await?.into_iter().map(|user| user.uid).collect()
    } else {
        uids
    };

    output.heading("Rebuilding feeds");
    let fanout = client.fanout();
    let mut total = 0;
    for uid in &uids {
        let written = fanout.rebuild_feed(uid).await?;
        output.bullet(&format!("{uid}: {written} entries"));
        total += written;
    }
    output.success(&format!("Rebuilt {} feeds ({total} entries)", uids.len()));
    Ok(())
}

pub async fn handle_repair_likes(post_ids: Vec<String>, all: bool, config: &FeedConfig, output: &OutputManager) -> Result<()> {
    if post_ids.is_empty() && !all {
        bail!("pass one or more post ids, or --all");
    }
    let client = connect(config, output).await?;
    let posts = client.posts();
    let post_ids = if all {
        posts.list_all_posts().await?.into_iter().map(|post| post.post_id).collect()
    } else {
        post_ids
    };

    output.heading("Reconciling like counters");
    let engagement = client.engagement();
    let mut repaired = 0;
    for post_id in &post_ids {
        let before = posts.get_post(post_id).await?.like_count;
        let after = engagement.reconcile_like_count(post_id).await?;
        if before != after {
            repaired += 1;
            output.warning(&format!("{post_id}: {before} -> {after}"));
        }
    }

    if repaired == 0 {
        output.success(&format!("All {} counters consistent", post_ids.len()));
    } else {
        output.success(&format!("Repaired {repaired} of {} counters", post_ids.len()));
    }
    Ok(())
}
