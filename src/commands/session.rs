use crate::app::App;
use crate::storage::User;

use super::CommandError;

/// Resolve the logged-in user, or refuse.
///
/// Every call re-reads the name from the preferences record and looks the
/// user up again; nothing is cached between commands.
///
/// # Errors
///
/// - `CommandError::NoCurrentUser` if no name is recorded
/// - `CommandError::UserNotFound` if the name no longer resolves (e.g. after `reset`)
/// - `CommandError::Database` for any other lookup failure
pub async fn require_user(app: &App) -> Result<User, CommandError> {
    let name = app.current_user_name().ok_or(CommandError::NoCurrentUser)?;

    match app.db.get_user(name).await? {
        Some(user) => Ok(user),
        None => Err(CommandError::UserNotFound(name.to_string())),
    }
}
