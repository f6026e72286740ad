//! # labswitch
//!
//! Chat-driven power switch for a shared lab. Wires settings, storage, the
//! job runner client, and the Telegram transport together, then serves
//! commands until ctrl-c or a fatal registry error.

#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use labswitch_engine::{Replies, SessionRegistry, Workflow, WorkflowConfig};
use labswitch_jobs::{AwxClient, AwxConfig};
use labswitch_server::{Dispatcher, HealthServer, ShutdownCoordinator, TelegramConfig, TelegramTransport};
use labswitch_settings::Settings;
use labswitch_store::{Database, SqliteRegistryStore};
use labswitch_telemetry::{init_telemetry, TelemetryConfig};

/// Lab power switch bot.
#[derive(Parser, Debug)]
#[command(name = "labswitch", about = "Power a shared lab on and off from a chat")]
struct Cli {
    /// Validate the environment configuration and exit.
    #[arg(long)]
    check_config: bool,
}

fn telemetry_config(settings: &Settings) -> TelemetryConfig {
    TelemetryConfig {
        log_level: settings.logging.level,
        format: settings.logging.format,
        ..TelemetryConfig::default()
    }
}

fn open_database(settings: &Settings) -> Result<Database> {
    let collection = &settings.store.collection;
    let db = match settings.store.database_path() {
        Some(path) => Database::open(&path, collection)
            .with_context(|| format!("failed to open database at {}", path.display()))?,
        None => {
            tracing::warn!("using an in-memory store, sessions will not survive a restart");
            Database::in_memory(collection).context("failed to open in-memory database")?
        }
    };
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            let _ = init_telemetry(TelemetryConfig::default());
            tracing::error!(error = %e, "invalid configuration");
            return Err(e).context("invalid configuration");
        }
    };

    let guard = init_telemetry(telemetry_config(&settings)).context("failed to initialize logging")?;
    tracing::info!(filter = guard.directive(), locale = %settings.locale, "configuration loaded");

    if cli.check_config {
        tracing::info!("configuration is valid");
        return Ok(());
    }

    let db = open_database(&settings)?;
    let registry = SessionRegistry::new(Arc::new(SqliteRegistryStore::new(db)));

    let jobs = AwxClient::new(AwxConfig {
        base_url: settings.awx.url.clone(),
        credentials: settings.awx.credentials.clone(),
        insecure_tls: settings.awx.insecure_tls,
        timeout: settings.awx.timeout,
    })
    .context("failed to build job runner client")?;

    let workflow = Workflow::new(
        registry,
        Arc::new(jobs),
        WorkflowConfig {
            start_job: settings.awx.start_job.clone(),
            stop_job: settings.awx.stop_job.clone(),
        },
        Replies::for_locale(settings.locale),
    );

    let transport = TelegramTransport::new(TelegramConfig {
        api_url: settings.telegram.api_url.clone(),
        token: settings.telegram.api_token.clone(),
        poll_timeout: settings.telegram.poll_timeout,
    })
    .context("failed to build telegram client")?;

    let dispatcher = Dispatcher::new(Arc::new(transport), Arc::new(workflow), settings.telegram.chat_id);

    let shutdown = ShutdownCoordinator::new();
    let health = HealthServer::start(settings.server.health_port, shutdown.token())
        .await
        .with_context(|| format!("failed to bind health port {}", settings.server.health_port))?;

    let ctrl_c = shutdown.token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutting down...");
            ctrl_c.cancel();
        }
    });

    let outcome = dispatcher.run(shutdown.token()).await;
    shutdown.graceful_shutdown(vec![health.into_handle()], None).await;

    outcome.context("registry consistency violation, refusing to continue")?;
    tracing::info!("shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["labswitch"]);
        assert!(!cli.check_config);
    }

    #[test]
    fn cli_check_config_flag() {
        let cli = Cli::parse_from(["labswitch", "--check-config"]);
        assert!(cli.check_config);
    }
}
