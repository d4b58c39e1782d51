//! Preferences file parser for ~/.config/gator/config.toml.
//!
//! Unlike most settings files the preferences file is mandatory: it names the
//! database (`db_url`) and remembers who is logged in (`current_user_name`).
//! Unknown keys are logged, since they usually indicate a typo, and are
//! written back untouched when the record is saved.
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(
        "Config file not found at {}. Create it with a line like: db_url = \"~/.local/share/gator/gator.db\"",
        .0.display()
    )]
    Missing(PathBuf),

    #[error("Config file {} has no db_url set", .0.display())]
    MissingDbUrl(PathBuf),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ============================================================================
// Configuration
// ============================================================================

/// The persisted preferences record.
///
/// Always read and written as a whole; `path` remembers where it came from so
/// [`Config::set_user`] can write it back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite path or `sqlite:` URL. A leading `~/` is expanded.
    pub db_url: String,

    /// Name of the logged-in user, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_user_name: Option<String>,

    /// Keys this version does not know, preserved across saves.
    #[serde(flatten)]
    extra: toml::Table,

    #[serde(skip)]
    path: PathBuf,
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 2] = ["db_url", "current_user_name"];

    /// Load the preferences file at `path`.
    ///
    /// - Missing file → `Err(ConfigError::Missing)`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Empty `db_url` → `Err(ConfigError::MissingDbUrl)`
    /// - Unknown keys → kept, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check size before reading so a corrupted file cannot exhaust memory
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::Missing(path.to_path_buf()));
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::Missing(path.to_path_buf()));
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file");
                }
            }
        }

        let mut config: Config = toml::from_str(&content)?;
        if config.db_url.trim().is_empty() {
            return Err(ConfigError::MissingDbUrl(path.to_path_buf()));
        }
        if config.current_user_name.as_deref() == Some("") {
            config.current_user_name = None;
        }
        config.path = path.to_path_buf();

        tracing::debug!(
            path = %path.display(),
            user = config.current_user_name.as_deref().unwrap_or("-"),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Where this record is persisted.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Make `name` the current user and persist the record.
    ///
    /// The in-memory value only changes once the file has been replaced.
    pub fn set_user(&mut self, name: &str) -> Result<(), ConfigError> {
        let mut updated = self.clone();
        updated.current_user_name = Some(name.to_string());
        updated.save()?;
        *self = updated;
        Ok(())
    }

    /// Write the whole record back to [`Config::path`], atomically.
    pub fn save(&self) -> Result<(), ConfigError> {
        let content = toml::to_string(self)?;
        atomic_write(&self.path, content.as_bytes())?;
        tracing::debug!(path = %self.path.display(), "Saved configuration");
        Ok(())
    }

    /// `db_url` with a leading `~/` resolved against `$HOME`.
    pub fn database_location(&self) -> String {
        let url = self.db_url.trim();
        if let Some(rest) = url.strip_prefix("~/") {
            if let Some(home) = std::env::var_os("HOME") {
                return PathBuf::from(home).join(rest).to_string_lossy().into_owned();
            }
        }
        url.to_string()
    }

    /// Build a config for `path` without reading anything.
    pub fn new(path: impl Into<PathBuf>, db_url: impl Into<String>) -> Self {
        Self {
            db_url: db_url.into(),
            current_user_name: None,
            extra: toml::Table::new(),
            path: path.into(),
        }
    }
}

/// Replace `dst` with `content` using write-to-temp-then-rename, so readers
/// never observe a partially written file.
fn atomic_write(dst: &Path, content: &[u8]) -> std::io::Result<()> {
    use std::time::{SystemTime, UNIX_EPOCH};

    // Unpredictable temp name, opened with create_new so a planted symlink fails
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = dst.with_extension(format!("tmp.{:016x}", random_suffix));

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let result = options.open(&temp_path).and_then(|mut temp_file| {
        temp_file.write_all(content)?;
        temp_file.sync_all()
    });
    if let Err(e) = result {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }

    // On Windows, rename fails if destination exists
    #[cfg(windows)]
    if dst.exists() {
        if let Err(e) = std::fs::remove_file(dst) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e);
        }
    }

    std::fs::rename(&temp_path, dst).inspect_err(|_| {
        let _ = std::fs::remove_file(&temp_path);
    })
}

// ============================================================================
// Tests
// ============================================================================
