use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use gator::app::App;
use gator::commands::{self, Command};
use gator::config::Config;
use gator::storage::Database;

/// Get the default preferences file path (~/.config/gator/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("gator")
        .join("config.toml"))
}

/// Create the directory holding a file-backed database, if it is missing.
fn ensure_parent_dir(location: &str) -> Result<()> {
    if location == ":memory:" || location.starts_with("sqlite:") {
        return Ok(());
    }
    if let Some(parent) = Path::new(location).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory '{}'", parent.display())
            })?;
        }
    }
    Ok(())
}

#[derive(Parser, Debug)]
#[command(
    name = "gator",
    version,
    about = "Personal RSS aggregator: follow feeds, collect posts, browse them",
    after_help = "Run `gator help` for the list of commands."
)]
struct Args {
    /// Preferences file (default: ~/.config/gator/config.toml)
    #[arg(long, value_name = "FILE", env = "GATOR_CONFIG")]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Command to run (register, login, reset, users, agg, addfeed, feeds,
    /// follow, following, unfollow, browse, help)
    command: Option<String>,

    /// Arguments for the command
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "gator=warn",
        1 => "gator=info",
        _ => "gator=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(args).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    // Usage needs neither preferences nor a database
    let name = match args.command {
        Some(name) if name != "help" => name,
        _ => {
            commands::print_usage(&mut std::io::stdout())?;
            return Ok(());
        }
    };

    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = Config::load(&config_path)?;

    let location = config.database_location();
    ensure_parent_dir(&location)?;
    let db = Database::open(&location)
        .await
        .with_context(|| format!("Failed to open database '{location}'"))?;

    let mut app = App::new(config, db).context("Failed to build HTTP client")?;
    let command = Command::new(name, args.args);

    let mut stdout = std::io::stdout().lock();
    commands::run(&mut app, &command, &mut stdout).await?;
    Ok(())
}
