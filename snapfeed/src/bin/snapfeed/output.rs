use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{Attribute, Cell, Color as TableColor, Table};
use serde::Serialize;
use snapfeed::{Comment, Notification, Post, User, UserStats};

use crate::theme::{ICONS, THEME};

/// Output format options for CLI commands
#[derive(Clone, Debug, ValueEnum, Default, PartialEq)]
pub enum OutputFormat {
    /// Formatted table output (default)
    #[default]
    Table,
    /// JSON output for scripting
    Json,
    /// Compact single-line output
    Compact,
}

/// Global CLI options that affect output and behavior
#[derive(Clone, Debug, Default)]
pub struct GlobalOptions {
    pub output_format: OutputFormat,
    pub quiet: bool,
    pub no_color: bool,
}

/// Data that can be displayed as a table
pub trait TableDisplay {
    fn to_table(&self, options: &GlobalOptions) -> Table;
    fn to_compact(&self) -> String;
}

/// Output manager handles formatting and display
pub struct OutputManager {
    pub options: GlobalOptions,
}

impl OutputManager {
    pub fn new(options: GlobalOptions) -> Self {
        Self { options }
    }

    /// Display data according to the configured output format
    pub fn display<T>(&self, data: &T) -> Result<()>
    where
        T: Serialize + TableDisplay,
    {
        if self.options.quiet {
            return Ok(());
        }

        match self.options.output_format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                println!("{json}");
            }
            OutputFormat::Table => {
                let table = data.to_table(&self.options);
                println!("{table}");
            }
            OutputFormat::Compact => {
                println!("{}", data.to_compact());
            }
        }
        Ok(())
    }

    fn line(&self, icon: &str, message: &str, color: colored::Color) -> Option<String> {
        if self.options.quiet || matches!(self.options.output_format, OutputFormat::Json) {
            return None;
        }
        Some(if self.options.no_color {
            format!("{icon} {message}")
        } else {
            format!("{} {}", icon.color(color), message.color(color))
        })
    }

    pub fn success(&self, message: &str) {
        if let Some(line) = self.line(ICONS.success, message, THEME.success) {
            println!("{line}");
        }
    }

    /// Errors are printed even in quiet mode.
    pub fn error(&self, message: &str) {
        let output = if self.options.no_color {
            format!("{} {message}", ICONS.error)
        } else {
            format!("{} {}", ICONS.error.color(THEME.error), message.color(THEME.error))
        };
        eprintln!("{output}");
    }

    pub fn warning(&self, message: &str) {
        if let Some(line) = self.line(ICONS.warning, message, THEME.warning) {
            println!("{line}");
        }
    }

    pub fn info(&self, message: &str) {
        if let Some(line) = self.line(ICONS.info, message, THEME.info) {
            println!("{line}");
        }
    }

    pub fn heading(&self, text: &str) {
        if self.options.quiet || matches!(self.options.output_format, OutputFormat::Json) {
            return;
        }
        let output = if self.options.no_color {
            format!("\n{text}\n{}", "=".repeat(text.chars().count()))
        } else {
            format!("\n{}", text.color(THEME.primary).bold())
        };
        println!("{output}");
    }

    pub fn key_value(&self, key: &str, value: &str) {
        if self.options.quiet || matches!(self.options.output_format, OutputFormat::Json) {
            return;
        }
        let output = if self.options.no_color {
            format!("{key}: {value}")
        } else {
            format!("{}: {}", key.color(THEME.key).bold(), value.color(THEME.value))
        };
        println!("{output}");
    }

    pub fn bullet(&self, text: &str) {
        if let Some(line) = self.line(ICONS.bullet, text, THEME.muted) {
            println!("  {line}");
        }
    }
}

fn themed_table(options: &GlobalOptions, headers: &[&str]) -> Table {
    let mut table = Table::new();
    if options.no_color {
        table.load_preset(comfy_table::presets::ASCII_FULL);
    } else {
        table.load_preset(comfy_table::presets::UTF8_FULL_CONDENSED);
    }

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|header| {
            let cell = Cell::new(header).add_attribute(Attribute::Bold);
            if options.no_color { cell } else { cell.fg(TableColor::Cyan) }
        })
        .collect();
    table.set_header(header_cells);
    table
}

fn empty_row(table: &mut Table, what: &str) {
    table.add_row(vec![Cell::new(format!("No {what} found"))]);
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    short.push('…');
    short
}

impl TableDisplay for Vec<Post> {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options, &["Post", "Owner", "Created", ICONS.heart, "Caption"]);
        if self.is_empty() {
            empty_row(&mut table, "posts");
        }
        for post in self {
            table.add_row(vec![
                Cell::new(&post.post_id),
                Cell::new(&post.owner_uid),
                Cell::new(post.created_at.format("%Y-%m-%d %H:%M:%S").to_string()),
                Cell::new(post.like_count.to_string()),
                Cell::new(truncate(&post.caption, 48)),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        let ids: Vec<&str> = self.iter().map(|post| post.post_id.as_str()).collect();
        format!("{} posts: {}", self.len(), ids.join(","))
    }
}

impl TableDisplay for Vec<Comment> {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options, &["Comment", "Author", "Created", "Body"]);
        if self.is_empty() {
            empty_row(&mut table, "comments");
        }
        for comment in self {
            table.add_row(vec![
                Cell::new(&comment.comment_id),
                Cell::new(format!("@{}", comment.username)),
                Cell::new(comment.created_at.format("%Y-%m-%d %H:%M:%S").to_string()),
                Cell::new(truncate(&comment.body, 60)),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        format!("{} comments", self.len())
    }
}

impl TableDisplay for Vec<Notification> {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options, &["Kind", "From", "Post", "Created"]);
        if self.is_empty() {
            empty_row(&mut table, "notifications");
        }
        for notification in self {
            table.add_row(vec![
                Cell::new(notification.kind.as_str()),
                Cell::new(&notification.actor_uid),
                Cell::new(notification.post_id.as_deref().unwrap_or("-")),
                Cell::new(notification.created_at.format("%Y-%m-%d %H:%M:%S").to_string()),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        format!("{} notifications", self.len())
    }
}

impl TableDisplay for Vec<User> {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options, &["Uid", "Username", "Name"]);
        if self.is_empty() {
            empty_row(&mut table, "users");
        }
        for user in self {
            table.add_row(vec![
                Cell::new(&user.uid),
                Cell::new(format!("@{}", user.username)),
                Cell::new(&user.fullname),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        let names: Vec<&str> = self.iter().map(|user| user.username.as_str()).collect();
        names.join(",")
    }
}

impl TableDisplay for UserStats {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options, &["Followers", "Following", "Posts"]);
        table.add_row(vec![
            Cell::new(self.followers.to_string()),
            Cell::new(self.following.to_string()),
            Cell::new(self.posts.to_string()),
        ]);
        table
    }

    fn to_compact(&self) -> String {
        format!(
            "followers={} following={} posts={}",
            self.followers, self.following, self.posts
        )
    }
}
