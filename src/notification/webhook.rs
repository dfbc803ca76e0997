//! HTTP delivery of a notification payload to one subscriber URL.

use crate::config::{DispatcherConfig, ProxyConfig};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{redirect, Client, NoProxy, Proxy, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Why a single delivery failed.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("failed to POST request to {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("got a bad HTTP response '{status}' for {url}")]
    Status { url: String, status: StatusCode },

    #[error("failed to release the response from {url}: {source}")]
    Release {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl DeliveryError {
    /// Label used for the `deliveries_total` metric.
    pub fn outcome(&self) -> &'static str {
        match self {
            DeliveryError::Client(_) => "client_error",
            DeliveryError::Transport { .. } => "transport_error",
            DeliveryError::Status { .. } => "bad_status",
            DeliveryError::Release { .. } => "release_error",
        }
    }
}

/// A status in `[400, 599]` is a failed delivery. Anything else, including
/// informational and redirect statuses, counts as delivered.
pub fn is_failure_status(status: StatusCode) -> bool {
    (400..600).contains(&status.as_u16())
}

/// Delivers a serialized notification to a subscriber.
#[async_trait]
pub trait WebhookSender: Send + Sync {
    /// POSTs `payload` to `url` once.
    ///
    /// # Returns
    /// * `Ok(status)` when the subscriber answered with a non-failure status
    /// * `Err(DeliveryError)` otherwise
    async fn deliver(&self, url: &str, payload: Arc<str>) -> Result<StatusCode, DeliveryError>;
}

/// Builds the HTTP client used for a single delivery.
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    user_agent: String,
    timeout: Duration,
    accept_invalid_certs: bool,
    proxy: Option<ProxyConfig>,
}

impl HttpClientFactory {
    pub fn new(dispatcher: &DispatcherConfig, proxy: &ProxyConfig) -> Self {
        Self {
            user_agent: dispatcher.user_agent.clone(),
            timeout: dispatcher.request_timeout(),
            accept_invalid_certs: dispatcher.accept_invalid_certs,
            proxy: proxy.enabled.then(|| proxy.clone()),
        }
    }

    /// Overrides the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds a client that does not follow redirects and keeps no idle
    /// connections, so every delivery owns its connection.
    pub fn build(&self) -> Result<Client, reqwest::Error> {
        let mut builder = Client::builder()
            .user_agent(self.user_agent.as_str())
            .timeout(self.timeout)
            .redirect(redirect::Policy::none())
            .pool_max_idle_per_host(0);

        if self.accept_invalid_certs {
            builder = builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }

        builder = match &self.proxy {
            Some(settings) => builder.proxy(build_proxy(settings)?),
            // Only the configured proxy is used, never the environment's.
            None => builder.no_proxy(),
        };

        builder.build()
    }
}

fn build_proxy(settings: &ProxyConfig) -> Result<Proxy, reqwest::Error> {
    let mut proxy = Proxy::all(format!("http://{}:{}", settings.host, settings.port))?;
    if let Some(username) = &settings.username {
        proxy = proxy.basic_auth(username, settings.password.as_deref().unwrap_or_default());
    }
    if !settings.non_proxy_hosts.is_empty() {
        proxy = proxy.no_proxy(NoProxy::from_string(&settings.non_proxy_hosts.join(",")));
    }
    Ok(proxy)
}

/// Delivers notifications over HTTP with a fresh client per delivery.
#[derive(Debug, Clone)]
pub struct HttpWebhookSender {
    factory: HttpClientFactory,
}

impl HttpWebhookSender {
    pub fn new(factory: HttpClientFactory) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    #[instrument(skip(self, payload), fields(bytes = payload.len()))]
    async fn deliver(&self, url: &str, payload: Arc<str>) -> Result<StatusCode, DeliveryError> {
        // Dropped on every return path, closing its connection.
        let client = self.factory.build().map_err(DeliveryError::Client)?;

        let mut response = client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_string())
            .send()
            .await
            .map_err(|source| DeliveryError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        // The exchange completes only once the body is consumed.
        let drained = discard_body(&mut response).await;

        if is_failure_status(status) {
            if let Err(e) = drained {
                warn!(url, error = %e, "Failed to consume response body");
            }
            return Err(DeliveryError::Status {
                url: url.to_string(),
                status,
            });
        }

        drained.map_err(|source| DeliveryError::Release {
            url: url.to_string(),
            source,
        })?;
        debug!(url, %status, "Webhook response received");
        Ok(status)
    }
}

/// Reads the response body chunk by chunk without keeping it.
async fn discard_body(response: &mut Response) -> Result<(), reqwest::Error> {
    while response.chunk().await?.is_some() {}
    Ok(())
}
