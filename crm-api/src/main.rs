//! crm-api - CRM HTTP service
//!
//! Resolves configuration, opens (or creates) the database in the root
//! folder and serves the JSON API.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use crm_api::{build_router, AppState};
use crm_common::config::{CliOverrides, ServiceConfig};
use crm_common::db::{init_database, users};
use crm_common::logging;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "crm-api", version, about = "CRM HTTP service")]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Folder holding crm.db
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Log filter directive (e.g. "debug" or "crm_common=trace")
    #[arg(long)]
    log_level: Option<String>,
}

impl From<Args> for CliOverrides {
    fn from(args: Args) -> Self {
        Self {
            config_file: args.config,
            root_folder: args.root_folder,
            bind_address: args.bind,
            port: args.port,
            log_level: args.log_level,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CliOverrides::from(Args::parse());
    let config = ServiceConfig::resolve(&cli).context("Failed to resolve configuration")?;

    logging::init(&config.log_level).context("Failed to initialize logging")?;

    // Log build identification right after tracing init
    info!(
        "Starting CRM API (crm-api) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_REVISION"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    config.ensure_root_folder()?;
    let db_path = config.database_path();
    info!("Database path: {}", db_path.display());

    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    match &config.admin_password {
        Some(password) => {
            if let Some(admin) = users::ensure_admin(&pool, password).await? {
                info!("Created administrator account '{}'", admin.username);
            }
        }
        None => warn!("No admin_password configured; no administrator will be created"),
    }

    let purged = users::purge_expired_sessions(&pool).await?;
    if purged > 0 {
        info!("Removed {} expired sessions", purged);
    }

    let state = AppState::new(pool, chrono::Duration::hours(config.session_ttl_hours));
    let app = build_router(state);

    let address = config.listen_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("crm-api listening on http://{}", address);
    info!("Health check: http://{}/health", address);

    axum::serve(listener, app).await?;

    Ok(())
}
