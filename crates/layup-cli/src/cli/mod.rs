//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use layup_core::config;

mod commands;

#[derive(Parser)]
#[command(name = "layup")]
#[command(version)]
#[command(about = "Layup auth-flow state and form tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log debug output to stderr (overrides LAYUP_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Location the auth store reads query parameters from.
#[derive(clap::Args, Debug, Clone, Default)]
struct LocationArgs {
    /// Current page URL or query string (e.g. "?verified=true&action=signup")
    #[arg(long, env = "LAYUP_URL", value_name = "URL")]
    url: Option<String>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Inspect and manage auth-flow state
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Password strength and validation
    Password {
        #[command(subcommand)]
        command: PasswordCommands,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum AuthCommands {
    /// Show the current auth-flow state and where it came from
    Show {
        #[command(flatten)]
        location: LocationArgs,
        /// Fail on unreadable or malformed storage instead of reporting no state
        #[arg(long)]
        strict: bool,
        /// Print the state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save a verified auth-flow state
    Save {
        /// Flow that produced the state (e.g. signup, reset_password)
        #[arg(long)]
        action: String,
        /// Account the flow pertains to
        #[arg(long)]
        account: Option<String>,
        /// Flow status
        #[arg(long, default_value = "verified")]
        status: String,
        /// Expire after this many seconds
        #[arg(long, value_name = "SECS", conflicts_with = "expires_at")]
        expires_in: Option<u64>,
        /// Expire at this epoch timestamp in milliseconds
        #[arg(long, value_name = "MS")]
        expires_at: Option<i64>,
        /// Only write session storage
        #[arg(long)]
        session_only: bool,
    },
    /// Exit successfully only if the state is valid for ACTION
    Check {
        /// Action to validate against
        #[arg(value_name = "ACTION")]
        action: String,
        #[command(flatten)]
        location: LocationArgs,
    },
    /// Remove auth-flow state from every storage location
    Clear,
    /// End the current session (drops session storage)
    EndSession,
}

#[derive(clap::Subcommand)]
enum PasswordCommands {
    /// Score and validate a password (read from stdin unless --password is given)
    Check {
        /// Password to check
        #[arg(long)]
        password: Option<String>,
        /// Confirmation to compare against
        #[arg(long)]
        confirm: Option<String>,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    dispatch(cli)
}

/// Logs to stderr. `LAYUP_LOG` takes an `EnvFilter` directive; `--verbose` wins over it.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("layup=debug,layup_core=debug,warn")
    } else {
        EnvFilter::try_from_env("LAYUP_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

fn dispatch(cli: Cli) -> Result<()> {
    let Cli { command, .. } = cli;

    match command {
        Commands::Auth { command } => {
            let config = config::Config::load().context("load config")?;
            match command {
                AuthCommands::Show {
                    location,
                    strict,
                    json,
                } => commands::auth::show(&config, location.url.as_deref(), strict, json),
                AuthCommands::Save {
                    action,
                    account,
                    status,
                    expires_in,
                    expires_at,
                    session_only,
                } => commands::auth::save(
                    &config,
                    &commands::auth::SaveOptions {
                        action,
                        account,
                        status,
                        expires_in,
                        expires_at,
                        session_only,
                    },
                ),
                AuthCommands::Check { action, location } => {
                    commands::auth::check(&config, &action, location.url.as_deref())
                }
                AuthCommands::Clear => commands::auth::clear(&config),
                AuthCommands::EndSession => commands::auth::end_session(&config),
            }
        }

        Commands::Password { command } => match command {
            PasswordCommands::Check { password, confirm } => {
                commands::password::check(password, confirm.as_deref())
            }
        },

        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        },
    }
}
