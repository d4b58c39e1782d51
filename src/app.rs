use crate::config::Config;
use crate::feed::{FeedFetcher, FetchError};
use crate::storage::Database;

/// Everything a command needs for one process run.
///
/// Built once in `main` and passed by reference to the command router; there
/// is no global state.
pub struct App {
    /// Preferences record, including the current session's user name
    pub config: Config,
    pub db: Database,
    pub fetcher: FeedFetcher,
}

impl App {
    pub fn new(config: Config, db: Database) -> Result<Self, FetchError> {
        Ok(Self::with_fetcher(config, db, FeedFetcher::new()?))
    }

    pub fn with_fetcher(config: Config, db: Database, fetcher: FeedFetcher) -> Self {
        Self {
            config,
            db,
            fetcher,
        }
    }

    /// Name recorded as logged in, if any.
    pub fn current_user_name(&self) -> Option<&str> {
        self.config
            .current_user_name
            .as_deref()
            .filter(|name| !name.is_empty())
    }
}
