//! The main application logic, decoupled from the entry point.

use crate::{
    config::Config,
    inspector::EventInspector,
    internal_metrics::{Metrics, MetricsBuilder},
    notification::{Dispatcher, HttpClientFactory, HttpWebhookSender, WebhookSender},
    resolver::UrlResolver,
    server::{AdminServer, AdminState},
    subscriptions::{watcher, SubscriptionStore},
    task_manager::TaskManager,
};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

/// A handle to the running application.
pub struct App {
    task_manager: TaskManager,
    dispatcher: Dispatcher,
    store: SubscriptionStore,
    admin_addr: SocketAddr,
    shutdown_timeout: Duration,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// The address the admin server is bound to.
    pub fn admin_addr(&self) -> SocketAddr {
        self.admin_addr
    }

    pub fn store(&self) -> &SubscriptionStore {
        &self.store
    }

    /// Waits for the shutdown signal, then stops the managed tasks and drains
    /// the dispatcher.
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.task_manager.get_shutdown_rx();
        if !*shutdown_rx.borrow() {
            shutdown_rx.changed().await.ok();
        }
        info!("Shutdown signal received. Waiting for tasks to complete...");

        self.task_manager.shutdown(self.shutdown_timeout).await;
        if !self.dispatcher.shutdown(self.shutdown_timeout).await {
            warn!("Some webhook deliveries were abandoned during shutdown.");
        }

        info!("All tasks shut down.");
        Ok(())
    }
}

/// Builder for the main application.
///
/// Separates constructing the components from running them, and lets tests
/// replace the HTTP sender and the metrics handle.
pub struct AppBuilder {
    config: Config,
    sender_override: Option<Arc<dyn WebhookSender>>,
    metrics_override: Option<Metrics>,
    reload_notifier: Option<mpsc::Sender<()>>,
}

impl AppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            sender_override: None,
            metrics_override: None,
            reload_notifier: None,
        }
    }

    /// Overrides the webhook sender for testing.
    pub fn sender_override(mut self, sender: Arc<dyn WebhookSender>) -> Self {
        self.sender_override = Some(sender);
        self
    }

    /// Overrides the metrics system for testing.
    pub fn metrics_override(mut self, metrics: Metrics) -> Self {
        self.metrics_override = Some(metrics);
        self
    }

    /// Receives a message after every reload triggered by the file watcher.
    pub fn reload_notifier(mut self, tx: mpsc::Sender<()>) -> Self {
        self.reload_notifier = Some(tx);
        self
    }

    /// Builds and starts all application components, returning a runnable `App`.
    #[instrument(skip_all)]
    pub async fn build(self, shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let config = self.config;
        let task_manager = TaskManager::new(shutdown_rx);

        // 1. Metrics
        let (metrics, prom_handle) = match self.metrics_override {
            Some(m) => (m, None),
            None => MetricsBuilder::new(config.metrics.clone()).build(),
        };

        // 2. Subscriptions
        let store = SubscriptionStore::new(&config.webhooks.subscriptions_path);
        store.reload_quietly().await;
        if config.webhooks.watch {
            watcher::spawn(store.clone(), &task_manager, self.reload_notifier)
                .context("Failed to watch the subscriptions file")?;
        }

        // 3. Delivery pipeline
        let sender = match self.sender_override {
            Some(sender) => sender,
            None => {
                debug!(
                    proxy = config.proxy.enabled,
                    accept_invalid_certs = config.dispatcher.accept_invalid_certs,
                    "Initializing HTTP webhook sender"
                );
                let factory = HttpClientFactory::new(&config.dispatcher, &config.proxy);
                // Fail at startup rather than on the first delivery.
                factory.build().context("Invalid HTTP client settings")?;
                Arc::new(HttpWebhookSender::new(factory)) as Arc<dyn WebhookSender>
            }
        };
        let dispatcher = Dispatcher::start(
            UrlResolver::new(store.clone()),
            sender,
            &config.dispatcher,
            metrics.clone(),
        );
        let inspector = EventInspector::new(dispatcher.clone(), metrics);

        // 4. Admin server
        let listener = TcpListener::bind(config.server.listen_address)
            .await
            .with_context(|| format!("Failed to bind admin server to {}", config.server.listen_address))?;
        let admin_addr = listener.local_addr()?;
        let server = AdminServer::new(
            listener,
            AdminState {
                store: store.clone(),
                inspector,
                prom_handle,
            },
            task_manager.get_shutdown_rx(),
        );
        task_manager.spawn("AdminServer", server.run());
        info!(address = %admin_addr, "Admin server listening");

        Ok(App {
            task_manager,
            dispatcher,
            store,
            admin_addr,
            shutdown_timeout: config.dispatcher.shutdown_timeout(),
        })
    }
}
