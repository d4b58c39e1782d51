//! Command dispatch.
//!
//! The command set is closed, so routing is a `match` over [`CommandName`]
//! rather than a lookup table. Arity is checked before any handler runs;
//! commands that act on behalf of a user resolve the session through
//! [`session::require_user`] first and never run without one.

mod agg;
mod browse;
mod feeds;
pub mod session;
mod users;

use std::io::Write;
use std::ops::RangeInclusive;
use std::str::FromStr;
use thiserror::Error;

use crate::app::App;
use crate::config::ConfigError;
use crate::feed::FetchError;
use crate::storage::DatabaseError;
use crate::util::{DurationError, UrlValidationError};

pub use agg::shutdown_signal;
pub use browse::{parse_limit, DEFAULT_BROWSE_LIMIT};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),

    /// Wrong number of arguments; carries the command's synopsis
    #[error("usage: gator {0}")]
    Usage(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("no current user set (run login first)")]
    NoCurrentUser,

    #[error("user {0} does not exist")]
    UserNotFound(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    InvalidUrl(#[from] UrlValidationError),

    #[error("invalid interval: {0}")]
    InvalidInterval(#[from] DurationError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Command Table
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandName {
    Register,
    Login,
    Reset,
    Users,
    Agg,
    AddFeed,
    Feeds,
    Follow,
    Following,
    Unfollow,
    Browse,
    Help,
}

impl CommandName {
    pub const ALL: [CommandName; 12] = [
        CommandName::Register,
        CommandName::Login,
        CommandName::Reset,
        CommandName::Users,
        CommandName::Agg,
        CommandName::AddFeed,
        CommandName::Feeds,
        CommandName::Follow,
        CommandName::Following,
        CommandName::Unfollow,
        CommandName::Browse,
        CommandName::Help,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CommandName::Register => "register",
            CommandName::Login => "login",
            CommandName::Reset => "reset",
            CommandName::Users => "users",
            CommandName::Agg => "agg",
            CommandName::AddFeed => "addfeed",
            CommandName::Feeds => "feeds",
            CommandName::Follow => "follow",
            CommandName::Following => "following",
            CommandName::Unfollow => "unfollow",
            CommandName::Browse => "browse",
            CommandName::Help => "help",
        }
    }

    /// Accepted positional argument counts.
    pub fn arity(self) -> RangeInclusive<usize> {
        match self {
            CommandName::Register | CommandName::Login => 1..=1,
            CommandName::Reset | CommandName::Users | CommandName::Feeds => 0..=0,
            CommandName::Following | CommandName::Help => 0..=0,
            CommandName::Agg => 1..=1,
            CommandName::AddFeed => 2..=2,
            CommandName::Follow | CommandName::Unfollow => 1..=1,
            CommandName::Browse => 0..=1,
        }
    }

    /// Command name plus argument placeholders, e.g. `addfeed <name> <url>`.
    pub fn synopsis(self) -> &'static str {
        match self {
            CommandName::Register => "register <name>",
            CommandName::Login => "login <name>",
            CommandName::Reset => "reset",
            CommandName::Users => "users",
            CommandName::Agg => "agg <interval>",
            CommandName::AddFeed => "addfeed <name> <url>",
            CommandName::Feeds => "feeds",
            CommandName::Follow => "follow <url>",
            CommandName::Following => "following",
            CommandName::Unfollow => "unfollow <url>",
            CommandName::Browse => "browse [limit]",
            CommandName::Help => "help",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            CommandName::Register => "create a user and log in as them",
            CommandName::Login => "switch the current user",
            CommandName::Reset => "delete all users, feeds, follows and posts",
            CommandName::Users => "list users, marking the current one",
            CommandName::Agg => "fetch feeds forever, one per interval (e.g. 30s, 1m)",
            CommandName::AddFeed => "add a feed and follow it",
            CommandName::Feeds => "list all feeds",
            CommandName::Follow => "follow an existing feed",
            CommandName::Following => "list feeds you follow",
            CommandName::Unfollow => "stop following a feed",
            CommandName::Browse => "show the newest posts from feeds you follow",
            CommandName::Help => "show this list",
        }
    }

    /// Whether the command runs on behalf of the logged-in user.
    pub fn requires_login(self) -> bool {
        matches!(
            self,
            CommandName::AddFeed
                | CommandName::Follow
                | CommandName::Following
                | CommandName::Unfollow
                | CommandName::Browse
        )
    }
}

impl FromStr for CommandName {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| CommandError::Unknown(s.to_string()))
    }
}

/// A command as typed: name plus positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    pub fn new(name: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

// ============================================================================
// Router
// ============================================================================

/// Run one command against `app`, writing user-facing output to `out`.
///
/// `agg` runs until a shutdown signal arrives; every other command returns
/// as soon as its work is done.
pub async fn run(app: &mut App, command: &Command, out: &mut dyn Write) -> Result<(), CommandError> {
    let name: CommandName = command.name.parse()?;
    if !name.arity().contains(&command.args.len()) {
        return Err(CommandError::Usage(name.synopsis().to_string()));
    }
    tracing::debug!(command = name.as_str(), args = command.args.len(), "Dispatching");

    let args = &command.args;
    match name {
        CommandName::Register => users::register(app, &args[0], out).await,
        CommandName::Login => users::login(app, &args[0], out).await,
        CommandName::Reset => users::reset(app, out).await,
        CommandName::Users => users::list(app, out).await,
        CommandName::Agg => agg::agg(app, &args[0], shutdown_signal(), out).await,
        CommandName::Feeds => feeds::list(app, out).await,
        CommandName::Help => print_usage(out),
        CommandName::AddFeed => {
            let user = session::require_user(app).await?;
            feeds::add(app, &user, &args[0], &args[1], out).await
        }
        CommandName::Follow => {
            let user = session::require_user(app).await?;
            feeds::follow(app, &user, &args[0], out).await
        }
        CommandName::Following => {
            let user = session::require_user(app).await?;
            feeds::following(app, &user, out).await
        }
        CommandName::Unfollow => {
            let user = session::require_user(app).await?;
            feeds::unfollow(app, &user, &args[0], out).await
        }
        CommandName::Browse => {
            let user = session::require_user(app).await?;
            browse::browse(app, &user, args.first().map(String::as_str), out).await
        }
    }
}

/// Print the command table.
pub fn print_usage(out: &mut dyn Write) -> Result<(), CommandError> {
    writeln!(out, "Usage: gator <command> [args...]")?;
    writeln!(out)?;
    writeln!(out, "Commands:")?;
    for name in CommandName::ALL {
        let marker = if name.requires_login() { "*" } else { " " };
        writeln!(out, "  {:<22}{} {}", name.synopsis(), marker, name.description())?;
    }
    writeln!(out)?;
    writeln!(out, "* requires a logged-in user")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::storage::Database;
    use tempfile::TempDir;

    async fn test_app() -> (TempDir, App) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path().join("config.toml"), ":memory:");
        config.save().unwrap();
        let db = Database::open(":memory:").await.unwrap();
        (dir, App::new(config, db).unwrap())
    }

    async fn run_cmd(app: &mut App, name: &str, args: &[&str]) -> Result<String, CommandError> {
        let mut out = Vec::new();
        run(app, &Command::new(name, args.iter().copied()), &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_command_names_round_trip() {
        for name in CommandName::ALL {
            assert_eq!(name.as_str().parse::<CommandName>().unwrap(), name);
            assert!(name.synopsis().starts_with(name.as_str()));
        }
    }

    #[test]
    fn test_names_are_case_sensitive() {
        assert!(matches!(
            "Register".parse::<CommandName>(),
            Err(CommandError::Unknown(name)) if name == "Register"
        ));
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let (_dir, mut app) = test_app().await;
        let err = run_cmd(&mut app, "frobnicate", &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "unknown command: frobnicate");
    }

    #[tokio::test]
    async fn test_wrong_arity_is_usage_error() {
        let (_dir, mut app) = test_app().await;

        let err = run_cmd(&mut app, "register", &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "usage: gator register <name>");

        let err = run_cmd(&mut app, "addfeed", &["only-name"]).await.unwrap_err();
        assert!(matches!(err, CommandError::Usage(_)));

        let err = run_cmd(&mut app, "browse", &["1", "2"]).await.unwrap_err();
        assert!(matches!(err, CommandError::Usage(_)));

        // Nothing was created along the way
        assert!(app.db.get_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gated_commands_need_login() {
        let (_dir, mut app) = test_app().await;

        for (name, args) in [
            ("addfeed", vec!["Blog", "https://example.com/rss"]),
            ("follow", vec!["https://example.com/rss"]),
            ("following", vec![]),
            ("unfollow", vec!["https://example.com/rss"]),
            ("browse", vec![]),
        ] {
            let err = run_cmd(&mut app, name, &args).await.unwrap_err();
            assert!(matches!(err, CommandError::NoCurrentUser), "{name}: {err:?}");
        }
        assert!(app.db.get_feeds().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_help_lists_every_command() {
        let (_dir, mut app) = test_app().await;
        let output = run_cmd(&mut app, "help", &[]).await.unwrap();
        for name in CommandName::ALL {
            assert!(output.contains(name.synopsis()), "missing {}", name.as_str());
        }
    }
}
