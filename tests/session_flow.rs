//! Integration tests for sessions across separate invocations.
//!
//! Each "invocation" loads the preferences file and opens the database from
//! scratch, the way the binary does, so the current user must survive only
//! through what was persisted.

use std::path::{Path, PathBuf};

use gator::app::App;
use gator::commands::{run, Command, CommandError};
use gator::config::Config;
use gator::storage::Database;
use tempfile::TempDir;

struct Workspace {
    _dir: TempDir,
    config_path: PathBuf,
}

fn workspace() -> Workspace {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    let db_path = dir.path().join("data").join("gator.db");
    std::fs::create_dir_all(db_path.parent().unwrap()).unwrap();
    std::fs::write(
        &config_path,
        format!("db_url = {:?}\n", db_path.to_string_lossy()),
    )
    .unwrap();
    Workspace {
        _dir: dir,
        config_path,
    }
}

/// One process run: load preferences, open the store, dispatch.
async fn invoke(config_path: &Path, name: &str, args: &[&str]) -> Result<String, CommandError> {
    let config = Config::load(config_path)?;
    let db = Database::open(&config.database_location()).await?;
    let mut app = App::new(config, db)?;

    let mut out = Vec::new();
    run(&mut app, &Command::new(name, args.iter().copied()), &mut out).await?;
    Ok(String::from_utf8(out).unwrap())
}

fn current_user(config_path: &Path) -> Option<String> {
    Config::load(config_path).unwrap().current_user_name
}

#[tokio::test]
async fn test_register_then_gated_command_in_next_invocation() {
    let ws = workspace();

    invoke(&ws.config_path, "register", &["alice"]).await.unwrap();
    assert_eq!(current_user(&ws.config_path).as_deref(), Some("alice"));

    let output = invoke(
        &ws.config_path,
        "addfeed",
        &["Blog", "https://blog.example.com/index.xml"],
    )
    .await
    .unwrap();
    assert!(output.contains("alice now follows Blog"));

    let following = invoke(&ws.config_path, "following", &[]).await.unwrap();
    assert_eq!(following, "* Blog\n");
}

#[tokio::test]
async fn test_gated_command_without_session() {
    let ws = workspace();

    let err = invoke(&ws.config_path, "browse", &[]).await.unwrap_err();
    assert!(matches!(err, CommandError::NoCurrentUser));
    assert_eq!(err.to_string(), "no current user set (run login first)");
}

#[tokio::test]
async fn test_login_switches_between_invocations() {
    let ws = workspace();
    invoke(&ws.config_path, "register", &["alice"]).await.unwrap();
    invoke(&ws.config_path, "register", &["bob"]).await.unwrap();
    assert_eq!(current_user(&ws.config_path).as_deref(), Some("bob"));

    invoke(&ws.config_path, "login", &["alice"]).await.unwrap();
    let users = invoke(&ws.config_path, "users", &[]).await.unwrap();
    assert_eq!(users, "alice (current)\nbob\n");

    assert!(invoke(&ws.config_path, "login", &["mallory"]).await.is_err());
    assert_eq!(current_user(&ws.config_path).as_deref(), Some("alice"));
}

#[tokio::test]
async fn test_reset_invalidates_session() {
    let ws = workspace();
    invoke(&ws.config_path, "register", &["alice"]).await.unwrap();
    invoke(
        &ws.config_path,
        "addfeed",
        &["Blog", "https://blog.example.com/index.xml"],
    )
    .await
    .unwrap();

    invoke(&ws.config_path, "reset", &[]).await.unwrap();

    let err = invoke(&ws.config_path, "following", &[]).await.unwrap_err();
    assert_eq!(err.to_string(), "user alice does not exist");
    assert_eq!(invoke(&ws.config_path, "feeds", &[]).await.unwrap(), "");
}

#[tokio::test]
async fn test_follow_shared_feed() {
    let ws = workspace();
    let url = "https://news.example.com/rss";

    invoke(&ws.config_path, "register", &["alice"]).await.unwrap();
    invoke(&ws.config_path, "addfeed", &["News", url]).await.unwrap();
    invoke(&ws.config_path, "register", &["bob"]).await.unwrap();

    let output = invoke(&ws.config_path, "follow", &[url]).await.unwrap();
    assert_eq!(output, "bob now follows News\n");

    let feeds = invoke(&ws.config_path, "feeds", &[]).await.unwrap();
    assert_eq!(feeds, format!("* News\n  {url}\n  added by: alice\n"));
}

#[tokio::test]
async fn test_missing_preferences_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let err = invoke(&dir.path().join("absent.toml"), "users", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, CommandError::Config(_)), "got {err:?}");
}
