#![allow(dead_code)]
//! Test helpers for running the full application instance.

use anyhow::Result;
use artifact_hooks::{
    app::AppBuilder, config::Config, notification::WebhookSender, subscriptions::SubscriptionStore,
};
use std::net::SocketAddr;
use std::path::Path;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::timeout,
};

/// A running instance of the application.
pub struct TestApp {
    pub shutdown_tx: watch::Sender<bool>,
    pub app_handle: Option<JoinHandle<Result<()>>>,
    pub store: SubscriptionStore,
    admin_addr: SocketAddr,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.admin_addr, path)
    }

    /// Shuts down the application and waits for it to terminate.
    /// Fails if the application does not shut down within the specified timeout.
    pub async fn shutdown(self, timeout_duration: Duration) -> Result<()> {
        self.shutdown_tx
            .send(true)
            .expect("Failed to send shutdown signal");

        if let Some(handle) = self.app_handle {
            match timeout(timeout_duration, handle).await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => Err(e.into()),
                Err(_) => Err(anyhow::anyhow!("App failed to shut down within the timeout")),
            }
        } else {
            Ok(())
        }
    }
}

/// A builder for creating `TestApp` instances with specific configurations.
pub struct TestAppBuilder {
    pub config: Config,
    sender: Option<Arc<dyn WebhookSender>>,
    reload_tx: Option<mpsc::Sender<()>>,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        let mut config = Config::default();
        config.server.listen_address = "127.0.0.1:0".parse().unwrap();
        config.dispatcher.shutdown_timeout_secs = 5;
        config.dispatcher.request_timeout_secs = 5;

        Self {
            config,
            sender: None,
            reload_tx: None,
        }
    }

    pub fn with_subscriptions(mut self, path: &Path) -> Self {
        self.config.webhooks.subscriptions_path = path.to_path_buf();
        self
    }

    pub fn with_sender(mut self, sender: Arc<dyn WebhookSender>) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Enables the file watcher and reports every reload on `tx`.
    pub fn with_watch(mut self, tx: mpsc::Sender<()>) -> Self {
        self.config.webhooks.watch = true;
        self.reload_tx = Some(tx);
        self
    }

    pub fn with_metrics(mut self) -> Self {
        self.config.metrics.enabled = true;
        self
    }

    /// Builds the application and starts running it.
    pub async fn start(self) -> Result<TestApp> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut builder = AppBuilder::new(self.config);
        if let Some(sender) = self.sender {
            builder = builder.sender_override(sender);
        }
        if let Some(tx) = self.reload_tx {
            builder = builder.reload_notifier(tx);
        }
        let app = builder.build(shutdown_rx).await?;

        let admin_addr = app.admin_addr();
        let store = app.store().clone();
        let app_handle = tokio::spawn(app.run());

        Ok(TestApp {
            shutdown_tx,
            app_handle: Some(app_handle),
            store,
            admin_addr,
        })
    }
}
