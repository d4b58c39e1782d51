use std::io::Write;

use crate::app::App;

use super::CommandError;

/// Create user `name` and make them current.
pub async fn register(app: &mut App, name: &str, out: &mut dyn Write) -> Result<(), CommandError> {
    let user = match app.db.create_user(name).await {
        Ok(user) => user,
        Err(e) if e.is_conflict() => {
            return Err(CommandError::AlreadyExists(format!("user {name} already exists")));
        }
        Err(e) => return Err(e.into()),
    };

    app.config.set_user(&user.name)?;
    tracing::info!(user = %user.name, id = %user.id, "Registered user");

    writeln!(out, "user {} created", user.name)?;
    writeln!(out, "  id:      {}", user.id)?;
    writeln!(out, "  created: {}", user.created_at.to_rfc3339())?;
    Ok(())
}

/// Make existing user `name` current.
pub async fn login(app: &mut App, name: &str, out: &mut dyn Write) -> Result<(), CommandError> {
    let user = app
        .db
        .get_user(name)
        .await?
        .ok_or_else(|| CommandError::UserNotFound(name.to_string()))?;

    app.config.set_user(&user.name)?;
    writeln!(out, "current user set to {}", user.name)?;
    Ok(())
}

pub async fn reset(app: &mut App, out: &mut dyn Write) -> Result<(), CommandError> {
    let removed = app.db.reset_users().await?;
    tracing::info!(users = removed, "Reset database");
    writeln!(out, "database reset successful")?;
    Ok(())
}

pub async fn list(app: &mut App, out: &mut dyn Write) -> Result<(), CommandError> {
    let current = app.current_user_name();
    for user in app.db.get_users().await? {
        if Some(user.name.as_str()) == current {
            writeln!(out, "{} (current)", user.name)?;
        } else {
            writeln!(out, "{}", user.name)?;
        }
    }
    Ok(())
}
