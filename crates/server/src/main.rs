mod api;
mod bootstrap;
mod health;

use std::time::Duration;

use anyhow::Result;
use scholar_core::config::{AppConfig, LoadOptions};
use tokio::sync::oneshot;

fn init_logging(config: &AppConfig) {
    use scholar_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging has to be up before bootstrap emits anything.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;
    let router = app.router();
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    let runner = app.channel_runner;
    tokio::spawn(async move {
        if let Err(error) = runner.start().await {
            tracing::error!(
                event_name = "system.channel.error",
                correlation_id = "bootstrap",
                error = %error,
                "channel runner terminated unexpectedly"
            );
        }
    });

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        llm_provider = app.config.llm.provider.as_str(),
        "scholar-server started"
    );
    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        active_sessions = app.sessions.len().await,
        "scholar-server stopping"
    );

    let _ = stop_tx.send(());
    match tokio::time::timeout(grace, server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(error))) => {
            tracing::error!(event_name = "system.server.error", error = %error, "http server failed");
        }
        Ok(Err(error)) => {
            tracing::error!(event_name = "system.server.error", error = %error, "http server task panicked");
        }
        Err(_) => {
            tracing::warn!(
                event_name = "system.server.drain_timeout",
                grace_secs = grace.as_secs(),
                "in-flight requests did not drain before the grace period"
            );
        }
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
