mod commands;
mod examples;
mod output;
mod theme;

use std::fmt::Write;
use std::io::{self, Write as IoWrite};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{
    ColorChoice, Command, CommandFactory, FromArgMatches, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Color as ClapColor, RgbColor, Style},
    },
    error::ErrorKind,
};
use colored::{Color as ThemeColor, Colorize, control::ShouldColorize};
use snapfeed::FeedConfig;

use commands::{
    read::{ReadCommand, handle_read},
    repair::{handle_rebuild_feed, handle_repair_likes},
    tour::handle_tour,
};
use examples::{ExampleGroup, command_examples};
use output::{GlobalOptions, OutputFormat, OutputManager};
use theme::{ICONS, THEME};

const ENVIRONMENT_VARIABLES: &[(&str, &str)] = &[
    ("SNAPFEED_CONFIG", "Path to a TOML config file (same as --config)"),
    ("REDIS_URL", "Redis connection URL (overrides the config file)"),
    ("SNAPFEED_PREFIX", "Key prefix for every stored key"),
    ("RUST_LOG", "Log filter, e.g. snapfeed=debug"),
];

#[derive(Parser)]
#[command(name = "snapfeed")]
#[command(version)]
#[command(
    about = "Operator tool for the snapfeed social feed engine",
    long_about = r#"Operator tool for the snapfeed social feed engine.

Inspect feeds, posts, comments and notifications stored in Redis, and
repair derived state (feed indexes, like counters) after incidents.
`snapfeed tour` runs a self-contained walkthrough in memory.
"#
)]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true, env = "SNAPFEED_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "table", global = true)]
    output: OutputFormat,

    /// Suppress output (only errors will be shown)
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk through follow, post, like, comment and unfollow in memory
    Tour,

    /// Show a user's personalized feed
    Feed {
        /// User id
        uid: String,
    },

    /// Show the posts of one user
    Posts {
        /// User id
        uid: String,
    },

    /// Show every post, newest first
    Explore,

    /// List users, optionally filtered by a search term
    Users {
        /// Case-insensitive match on username or full name
        query: Option<String>,
    },

    /// Show the comments on a post
    Comments {
        /// Post id
        post_id: String,
    },

    /// Show a user's notifications
    Notifications {
        /// User id
        uid: String,
    },

    /// Show follower, following and post counts
    Stats {
        /// User id
        uid: String,
    },

    /// Rebuild feed indexes from the follow graph
    RebuildFeed {
        /// User ids to rebuild
        uids: Vec<String>,

        /// Rebuild every user's feed
        #[arg(long, conflicts_with = "uids")]
        all: bool,
    },

    /// Reset like counters from their like sets
    RepairLikes {
        /// Post ids to check
        post_ids: Vec<String>,

        /// Check every post
        #[arg(long, conflicts_with = "post_ids")]
        all: bool,
    },
}

impl Cli {
    fn parse_with_styles() -> Self {
        let command = build_cli_command();
        let matches = match command.styles(help_styles()).try_get_matches() {
            Ok(matches) => matches,
            Err(err) => exit_with_clap_error(err),
        };
        match Cli::from_arg_matches(&matches) {
            Ok(cli) => cli,
            Err(err) => exit_with_clap_error(err),
        }
    }
}

fn exit_with_clap_error(err: clap::error::Error) -> ! {
    let to_stdout = matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion);
    if let Err(print_err) = err.print()
        && print_err.kind() != io::ErrorKind::BrokenPipe
    {
        eprintln!("Failed to display help: {print_err}");
    }
    if to_stdout {
        let _ = print_blank_line_stdout();
        std::process::exit(0);
    }
    let _ = print_blank_line_stderr();
    std::process::exit(err.exit_code());
}

fn build_cli_command() -> Command {
    let use_color = detect_color_support();
    let appendix = render_top_level_appendix(use_color);
    let mut command = Cli::command().after_long_help(appendix);
    command = command.color(if use_color { ColorChoice::Auto } else { ColorChoice::Never });
    attach_command_examples(&mut command, use_color);
    command
}

fn attach_command_examples(command: &mut Command, use_color: bool) {
    for example in command_examples() {
        if let Some(subcommand) = command.find_subcommand_mut(example.name) {
            let help_text = render_examples(example.groups, use_color);
            *subcommand = subcommand.clone().after_long_help(help_text);
        }
    }
}

fn render_examples(groups: &[ExampleGroup], use_color: bool) -> String {
    let mut buffer = String::new();

    let heading = stylize("Examples:", THEME.highlight, true, use_color);
    let _ = writeln!(buffer, "{heading}");

    for (index, group) in groups.iter().enumerate() {
        let title = stylize(group.title, THEME.primary, true, use_color);
        let _ = writeln!(buffer, "  {title}");

        for command in group.commands {
            let arrow = stylize(ICONS.arrow, THEME.secondary, false, use_color);
            let command_text = stylize(command, THEME.secondary, false, use_color);
            let _ = writeln!(buffer, "    {arrow} {command_text}");
        }

        if index + 1 < groups.len() {
            buffer.push('\n');
        }
    }

    buffer
}

fn render_top_level_appendix(use_color: bool) -> String {
    let mut buffer = String::new();

    let env_heading = stylize("Environment Variables:", THEME.highlight, true, use_color);
    let _ = writeln!(buffer, "{env_heading}");
    for (key, description) in ENVIRONMENT_VARIABLES {
        let key_text = stylize(key, THEME.key, true, use_color);
        let value_text = stylize(description, THEME.value, false, use_color);
        let _ = writeln!(buffer, "  {key_text}  {value_text}");
    }

    buffer.push('\n');

    let tip_heading = stylize("Tip:", THEME.highlight, true, use_color);
    let tip_text = stylize(
        "Use 'snapfeed <command> --help' to view examples for each command.",
        THEME.secondary,
        false,
        use_color,
    );
    let _ = writeln!(buffer, "{tip_heading} {tip_text}");

    buffer
}

fn print_blank_line_stdout() -> io::Result<()> {
    let mut stdout = io::stdout();
    IoWrite::write_all(&mut stdout, b"\n")?;
    IoWrite::flush(&mut stdout)
}

fn print_blank_line_stderr() -> io::Result<()> {
    let mut stderr = io::stderr();
    IoWrite::write_all(&mut stderr, b"\n")?;
    IoWrite::flush(&mut stderr)
}

fn stylize(text: &str, color: ThemeColor, bold: bool, use_color: bool) -> String {
    if !use_color {
        return text.to_string();
    }
    let styled = text.color(color);
    if bold { styled.bold().to_string() } else { styled.to_string() }
}

fn detect_color_support() -> bool {
    ShouldColorize::from_env().should_colorize()
}

fn help_styles() -> Styles {
    Styles::styled()
        .usage(style_from_color(THEME.primary).bold())
        .header(style_from_color(THEME.highlight).bold())
        .literal(style_from_color(THEME.secondary))
        .placeholder(style_from_color(THEME.muted))
        .valid(style_from_color(THEME.success))
        .invalid(style_from_color(THEME.warning))
        .error(style_from_color(THEME.error).bold())
}

fn style_from_color(color: ThemeColor) -> Style {
    Style::new().fg_color(Some(color_to_clap_color(color)))
}

fn color_to_clap_color(color: ThemeColor) -> ClapColor {
    match color {
        ThemeColor::Black => ClapColor::Ansi(AnsiColor::Black),
        ThemeColor::Red => ClapColor::Ansi(AnsiColor::Red),
        ThemeColor::Green => ClapColor::Ansi(AnsiColor::Green),
        ThemeColor::Yellow => ClapColor::Ansi(AnsiColor::Yellow),
        ThemeColor::Blue => ClapColor::Ansi(AnsiColor::Blue),
        ThemeColor::Magenta => ClapColor::Ansi(AnsiColor::Magenta),
        ThemeColor::Cyan => ClapColor::Ansi(AnsiColor::Cyan),
        ThemeColor::White => ClapColor::Ansi(AnsiColor::White),
        ThemeColor::BrightBlack => ClapColor::Ansi(AnsiColor::BrightBlack),
        ThemeColor::BrightRed => ClapColor::Ansi(AnsiColor::BrightRed),
        ThemeColor::BrightGreen => ClapColor::Ansi(AnsiColor::BrightGreen),
        ThemeColor::BrightYellow => ClapColor::Ansi(AnsiColor::BrightYellow),
        ThemeColor::BrightBlue => ClapColor::Ansi(AnsiColor::BrightBlue),
        ThemeColor::BrightMagenta => ClapColor::Ansi(AnsiColor::BrightMagenta),
        ThemeColor::BrightCyan => ClapColor::Ansi(AnsiColor::BrightCyan),
        ThemeColor::BrightWhite => ClapColor::Ansi(AnsiColor::BrightWhite),
        ThemeColor::TrueColor { r, g, b } => ClapColor::Rgb(RgbColor(r, g, b)),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<FeedConfig> {
    let config = match path {
        Some(path) => FeedConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => FeedConfig::default(),
    };
    let config = config.with_env_overrides();
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse_with_styles();
    let output = OutputManager::new(GlobalOptions {
        output_format: cli.output.clone(),
        quiet: cli.quiet,
        no_color: cli.no_color,
    });

    if let Err(err) = execute(cli, &output).await {
        output.error(&format!("{err:#}"));
        std::process::exit(1);
    }
}

async fn execute(cli: Cli, output: &OutputManager) -> Result<()> {
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Tour => handle_tour(&config, output).await?,
        Commands::Feed { uid } => handle_read(ReadCommand::Feed { uid }, &config, output).await?,
        Commands::Posts { uid } => handle_read(ReadCommand::Posts { uid }, &config, output).await?,
        Commands::Explore => handle_read(ReadCommand::Explore, &config, output).await?,
        Commands::Users { query } => handle_read(ReadCommand::Users { query }, &config, output).await?,
        Commands::Comments { post_id } => handle_read(ReadCommand::Comments { post_id }, &config, output).await?,
        Commands::Notifications { uid } => {
            handle_read(ReadCommand::Notifications { uid }, &config, output).await?;
        }
        Commands::Stats { uid } => handle_read(ReadCommand::Stats { uid }, &config, output).await?,
        Commands::RebuildFeed { uids, all } => handle_rebuild_feed(uids, all, &config, output).await?,
        Commands::RepairLikes { post_ids, all } => handle_repair_likes(post_ids, all, &config, output).await?,
    }

    Ok(())
}
