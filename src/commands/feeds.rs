use std::io::Write;

use crate::app::App;
use crate::storage::{Feed, User};
use crate::util::{strip_control_chars, validate_url};

use super::CommandError;

/// Add a feed owned by `user` and follow it.
pub async fn add(
    app: &mut App,
    user: &User,
    name: &str,
    url: &str,
    out: &mut dyn Write,
) -> Result<(), CommandError> {
    validate_url(url)?;
    let url = url.trim();

    let feed = match app.db.create_feed(name, url, user.id).await {
        Ok(feed) => feed,
        Err(e) if e.is_conflict() => {
            return Err(CommandError::AlreadyExists(format!("feed url already exists: {url}")));
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!(feed = %feed.name, url = %feed.url, user = %user.name, "Added feed");

    writeln!(out, "feed added:")?;
    writeln!(out, "  id:       {}", feed.id)?;
    writeln!(out, "  name:     {}", feed.name)?;
    writeln!(out, "  url:      {}", feed.url)?;
    writeln!(out, "  added by: {}", user.name)?;

    match app.db.create_feed_follow(user.id, feed.id).await {
        Ok(follow) => writeln!(out, "{} now follows {}", follow.user_name, follow.feed_name)?,
        Err(e) if e.is_conflict() => {
            tracing::debug!(feed = %feed.name, "Creator already follows feed");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

pub async fn list(app: &mut App, out: &mut dyn Write) -> Result<(), CommandError> {
    for feed in app.db.get_feeds().await? {
        writeln!(out, "* {}", strip_control_chars(&feed.name))?;
        writeln!(out, "  {}", feed.url)?;
        writeln!(out, "  added by: {}", feed.owner_name)?;
    }
    Ok(())
}

pub async fn follow(
    app: &mut App,
    user: &User,
    url: &str,
    out: &mut dyn Write,
) -> Result<(), CommandError> {
    let feed = find_feed(app, url).await?;

    match app.db.create_feed_follow(user.id, feed.id).await {
        Ok(follow) => {
            writeln!(out, "{} now follows {}", follow.user_name, follow.feed_name)?;
            Ok(())
        }
        Err(e) if e.is_conflict() => Err(CommandError::AlreadyExists(format!(
            "{} already follows {}",
            user.name, feed.name
        ))),
        Err(e) => Err(e.into()),
    }
}

pub async fn following(app: &mut App, user: &User, out: &mut dyn Write) -> Result<(), CommandError> {
    for follow in app.db.get_feed_follows_for_user(user.id).await? {
        writeln!(out, "* {}", strip_control_chars(&follow.feed_name))?;
    }
    Ok(())
}

pub async fn unfollow(
    app: &mut App,
    user: &User,
    url: &str,
    out: &mut dyn Write,
) -> Result<(), CommandError> {
    let feed = find_feed(app, url).await?;

    if !app.db.delete_feed_follow(user.id, feed.id).await? {
        return Err(CommandError::NotFound(format!(
            "{} does not follow {}",
            user.name, feed.name
        )));
    }
    writeln!(out, "{} unfollowed {}", user.name, feed.name)?;
    Ok(())
}

async fn find_feed(app: &App, url: &str) -> Result<Feed, CommandError> {
    let url = url.trim();
    app.db
        .get_feed_by_url(url)
        .await?
        .ok_or_else(|| CommandError::NotFound(format!("feed not found: {url}")))
}
