use std::io::Write;

use crate::app::App;
use crate::storage::{Post, User};
use crate::util::strip_control_chars;

use super::CommandError;

pub const DEFAULT_BROWSE_LIMIT: i64 = 2;

const SEPARATOR: &str = "------------------------------------------------------------";

/// Parse the optional `browse` limit argument.
///
/// ```
/// use gator::commands::parse_limit;
///
/// assert_eq!(parse_limit(None).unwrap(), 2);
/// assert_eq!(parse_limit(Some("10")).unwrap(), 10);
/// assert!(parse_limit(Some("0")).is_err());
/// assert!(parse_limit(Some("ten")).is_err());
/// ```
pub fn parse_limit(arg: Option<&str>) -> Result<i64, CommandError> {
    let Some(raw) = arg else {
        return Ok(DEFAULT_BROWSE_LIMIT);
    };
    match raw.trim().parse::<i64>() {
        Ok(limit) if limit > 0 => Ok(limit),
        _ => Err(CommandError::InvalidArgument(
            "browse limit must be a positive integer".to_string(),
        )),
    }
}

pub async fn browse(
    app: &mut App,
    user: &User,
    limit: Option<&str>,
    out: &mut dyn Write,
) -> Result<(), CommandError> {
    let limit = parse_limit(limit)?;
    let posts = app.db.get_posts_for_user(user.id, limit).await?;

    if posts.is_empty() {
        writeln!(out, "No posts yet. Follow a feed and run `gator agg` to collect some.")?;
        return Ok(());
    }

    for post in &posts {
        write_post(out, post)?;
    }
    writeln!(out, "{SEPARATOR}")?;
    Ok(())
}

fn write_post(out: &mut dyn Write, post: &Post) -> std::io::Result<()> {
    writeln!(out, "{SEPARATOR}")?;
    writeln!(out, "{}", strip_control_chars(&post.title))?;
    writeln!(out, "{}", strip_control_chars(&post.url))?;
    if let Some(published) = post.published_at {
        writeln!(out, "Published: {}", published.format("%Y-%m-%d %H:%M UTC"))?;
    }
    if let Some(description) = &post.description {
        writeln!(out)?;
        writeln!(out, "{}", strip_control_chars(description.trim()))?;
    }
    Ok(())
}
