//! # Synapse CLI (`synapse`)
//!
//! ## Usage
//!
//! ```bash
//! synapse --config ./config/synapse.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `synapse init` | Create the SQLite database and run schema migrations |
//! | `synapse serve` | Start the HTTP API |
//! | `synapse token --user <id>` | Print a signed bearer token for `<id>` |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use synapse::{auth, config, migrate, server};

/// Synapse: literature review backend with similarity recommendations.
#[derive(Parser)]
#[command(name = "synapse", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/synapse.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Issue a bearer token signed with the configured secret.
    Token {
        /// User id placed in the `userId` claim.
        #[arg(long)]
        user: String,

        /// Lifetime of the token in hours.
        #[arg(long, default_value_t = 24)]
        ttl_hours: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Token { user, ttl_hours } => {
            if user.trim().is_empty() {
                anyhow::bail!("--user must not be empty");
            }
            if ttl_hours < 1 {
                anyhow::bail!("--ttl-hours must be >= 1");
            }
            let ttl = chrono::Duration::try_hours(ttl_hours)
                .ok_or_else(|| anyhow::anyhow!("--ttl-hours {} is out of range", ttl_hours))?;
            let token =
                auth::issue_token(&cfg.auth.jwt_secret, user.trim(), ttl, chrono::Utc::now())?;
            println!("{}", token);
        }
    }

    Ok(())
}
