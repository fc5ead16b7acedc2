//! Glance Runner - a lightweight browser-based runner for read-only MySQL queries.

mod cli;

use anyhow::Context;
use cli::Cli;
use glance_runner::config::Config;
use glance_runner::db::{Connector, MockServer, MySqlConnector};
use glance_runner::error::GlanceError;
use glance_runner::logging;
use glance_runner::seed::Seeder;
use glance_runner::service::QueryService;
use glance_runner::web::{self, AppState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse_args();

    match cli.log_path() {
        Some(path) => logging::init_file_logging(&path),
        None => logging::init_stderr_logging(),
    }

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<GlanceError>() {
            Some(glance) => error!("{}: {}", glance.category(), glance.message()),
            None => error!("{:#}", e),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(&cli)?;

    let connector: Arc<dyn Connector> = if cli.mock_db {
        info!("Using in-memory demo database");
        Arc::new(MockServer::new())
    } else {
        info!("Connection: {}", config.connection.display_string());
        Arc::new(MySqlConnector::new(config.connection.clone()))
    };

    if config.seed.enabled {
        Seeder::new(Arc::clone(&connector)).bootstrap().await;
    }

    let service = QueryService::new(connector, &config.query);
    let address = config.server.address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;

    web::serve(listener, AppState::new(service)).await?;
    Ok(())
}

/// Resolves the final configuration with precedence:
/// 1. CLI arguments (highest)
/// 2. Config file
/// 3. Environment variables
fn resolve_config(cli: &Cli) -> anyhow::Result<Config> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;

    if let Some(connection) = cli.to_connection_config()? {
        config.connection.merge(&connection);
    }
    config.connection.apply_env_defaults();
    cli.apply_overrides(&mut config);
    config.validate()?;

    Ok(config)
}
