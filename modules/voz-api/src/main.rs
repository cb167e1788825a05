use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use voz_api::{build_router, AppState, JwtService};
use voz_common::{file_config, AppConfig};
use voz_engine::{CivicEngine, DedupPolicy};
use voz_store::PgReportStore;

#[derive(Parser)]
#[command(name = "voz-server", about = "Civic report aggregation server")]
struct Cli {
    /// Path to config TOML file
    #[arg(long, default_value = "./config/voz.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    info!("Starting voz-server");

    let cli = Cli::parse();
    let config_path = cli.config.canonicalize().with_context(|| {
        format!(
            "Config file not found: {}. Create one or specify --config <path>",
            cli.config.display()
        )
    })?;
    info!(config = %config_path.display(), "Loading config");
    let file_config = file_config::load_config(&config_path)?;

    // Secrets come from env vars
    let config = AppConfig::from_env()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(file_config.database.max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    info!(
        max_connections = file_config.database.max_connections,
        "Connected to database"
    );

    sqlx::migrate!("../../migrations").run(&pool).await?;
    info!("Migrations complete");

    let dedup = DedupPolicy::new(file_config.dedup.radius_meters)?;
    info!(radius_meters = dedup.radius_meters(), "Dedup policy configured");

    let engine = CivicEngine::new(Arc::new(PgReportStore::new(pool)), dedup);
    let state = Arc::new(AppState {
        engine,
        jwt: JwtService::new(&config.jwt_secret, config.jwt_issuer.clone()),
    });
    let app = build_router(state, &file_config.server.allowed_origins);

    let addr = format!("0.0.0.0:{}", file_config.server.port);
    info!("voz-server listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
