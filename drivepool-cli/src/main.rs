//! drivepool CLI
//!
//! Command-line interface for drivepool credential pools.
//!
//! Pools are read from the configuration file and registered on every run;
//! nothing is persisted between runs.
//!
//! # Usage
//!
//! ```bash
//! # List configured pools
//! drivepool pools
//!
//! # Validate a pool's credentials against the token endpoint
//! drivepool connect personal
//!
//! # Print an access token
//! drivepool token personal --format json
//!
//! # List the root of a pool's drive, following every page
//! drivepool list-children personal --all
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use drivepool_core::{PoolId, PoolManager};
use drivepool_graph::{GraphClient, Items, ListChildren};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

mod config;

use config::CliConfig;

#[derive(Parser)]
#[command(name = "drivepool")]
#[command(about = "Multi-account OAuth refresh and drive access")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List pools defined in the configuration
    Pools,

    /// Register a pool and validate its credentials with one refresh
    Connect {
        /// Pool name from the configuration
        pool: String,
    },

    /// Print an access token for a pool
    Token {
        /// Pool name from the configuration
        pool: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List the children of a drive item
    ListChildren {
        /// Pool name from the configuration
        pool: String,

        /// Parent item ID (defaults to the drive root)
        #[arg(short, long)]
        item_id: Option<String>,

        /// Owner of a shared drive
        #[arg(short, long)]
        user: Option<String>,

        /// OData query options, e.g. "$top=10"
        #[arg(short, long)]
        query: Option<String>,

        /// Follow next links until the last page
        #[arg(short, long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = config::load_config(cli.config.as_deref())?;
    info!("Loaded configuration from {:?}", config.config_path);

    let manager = PoolManager::new(config.manager.clone())
        .context("Invalid manager configuration")?;

    let result = match cli.command {
        Commands::Pools => {
            list_pools(&config);
            Ok(())
        }
        Commands::Connect { pool } => connect(&manager, &config, &pool).await,
        Commands::Token { pool, format } => token(&manager, &config, &pool, &format).await,
        Commands::ListChildren {
            pool,
            item_id,
            user,
            query,
            all,
        } => {
            let params = ListChildren {
                item_id,
                shared: user.is_some(),
                user,
                query,
            };
            list_children(&manager, &config, &pool, params, all).await
        }
    };

    manager.shutdown();
    result
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn list_pools(config: &CliConfig) {
    if config.pools.is_empty() {
        println!("No pools configured in {:?}", config.config_path);
        return;
    }

    println!("Configured pools:");
    for (name, credentials) in &config.pools {
        println!("  {} (client {})", name, credentials.client_id);
    }
}

/// Register the configured credentials for `pool` with the manager.
async fn register(manager: &PoolManager, config: &CliConfig, pool: &str) -> Result<PoolId> {
    let credentials = config.pool(pool)?.clone();
    let pool = PoolId::new(pool);

    manager
        .add_connection(&pool, credentials)
        .await
        .with_context(|| format!("Failed to connect pool {}", pool))?;

    Ok(pool)
}

async fn connect(manager: &PoolManager, config: &CliConfig, pool: &str) -> Result<()> {
    let pool = register(manager, config, pool).await?;
    println!("Connected pool {}", pool);

    if let Some(credentials) = manager.check_credentials(&pool) {
        let configured = config.pool(pool.as_str())?;
        if credentials.refresh_token != configured.refresh_token {
            println!("  Refresh token was rotated by the server; update your configuration");
        }
    }
    Ok(())
}

async fn token(manager: &PoolManager, config: &CliConfig, pool: &str, format: &str) -> Result<()> {
    let pool = register(manager, config, pool).await?;
    let token = manager.resolve_token(&pool).await?;

    match format {
        "json" => {
            let output = serde_json::json!({
                "pool": pool.as_str(),
                "access_token": token.value.expose(),
                "expires_at": token.expires_at,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => {
            println!("{}", token.value.expose());
        }
    }
    Ok(())
}

async fn list_children(
    manager: &PoolManager,
    config: &CliConfig,
    pool: &str,
    params: ListChildren,
    all: bool,
) -> Result<()> {
    let pool = register(manager, config, pool).await?;
    let client = GraphClient::with_base_url(reqwest::Client::new(), &config.graph_base_url)
        .with_context(|| format!("Invalid Graph base URL {:?}", config.graph_base_url))?;
    let items = Items::new(manager, &client);

    let (children, next_link) = if all {
        (items.list_all_children(&pool, params).await?, None)
    } else {
        let page = items.list_children(&pool, params).await?;
        (page.value, page.next_link)
    };

    for item in &children {
        let kind = if item.is_folder() { "dir " } else { "file" };
        let size = item.size.map(|s| s.to_string()).unwrap_or_default();
        println!("{}  {:>12}  {}  {}", kind, size, item.id, item.name);
    }

    if let Some(link) = next_link {
        println!("More items available; rerun with --all or fetch {}", link);
    }
    Ok(())
}
