//! artifact-hooks - webhook notifier for a Maven repository manager.

use anyhow::Result;
use artifact_hooks::{app::App, cli::Cli, config::Config};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(err) => {
            tracing_subscriber::fmt().init();
            error!("Failed to load configuration: {:#}", err);
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("artifact-hooks starting up...");
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Admin Server: {}", config.server.listen_address);
    info!("Subscriptions File: {}", config.webhooks.subscriptions_path.display());
    info!("Watch Subscriptions: {}", config.webhooks.watch);
    info!("Delivery Concurrency: {}", config.dispatcher.concurrency);
    info!("Delivery Queue Capacity: {}", config.dispatcher.queue_capacity);
    info!("Request Timeout: {}s", config.dispatcher.request_timeout_secs);
    info!("Accept Invalid Certificates: {}", config.dispatcher.accept_invalid_certs);
    if config.proxy.enabled {
        info!("Proxy: {}:{}", config.proxy.host, config.proxy.port);
    } else {
        info!("Proxy: disabled");
    }
    info!("Metrics: {}", config.metrics.enabled);
    info!("-------------------------------------------------------");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = App::builder(config).build(shutdown_rx).await?;
    let app_handle = tokio::spawn(app.run());

    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received, shutting down...");
    shutdown_tx.send(true)?;

    app_handle.await??;
    info!("artifact-hooks shut down.");
    Ok(())
}
