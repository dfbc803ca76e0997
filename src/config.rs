//! Configuration management for artifact-hooks
//!
//! This module defines the main `Config` struct and its sub-structs. Settings
//! are layered with `figment`: built-in defaults, then the TOML file, then
//! `ARTIFACT_HOOKS_` environment variables, then command-line arguments.
//!
//! The webhook subscriptions themselves live in a separate properties file
//! (see [`crate::subscriptions`]) so they can be reloaded at runtime.

use crate::cli::Cli;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the TOML configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "artifact-hooks.toml";

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Admin and ingestion HTTP server.
    pub server: ServerConfig,
    /// Where the subscriptions come from.
    pub webhooks: WebhooksConfig,
    /// Delivery worker pool and HTTP client settings.
    pub dispatcher: DispatcherConfig,
    /// Outbound HTTP proxy.
    pub proxy: ProxyConfig,
    /// Prometheus metrics.
    pub metrics: MetricsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address the admin server listens on.
    pub listen_address: SocketAddr,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WebhooksConfig {
    /// Path to the `webhooks.properties` subscriptions file.
    pub subscriptions_path: PathBuf,
    /// Reload the subscriptions file automatically when it changes.
    pub watch: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DispatcherConfig {
    /// Number of deliveries in flight at once.
    pub concurrency: usize,
    /// Deliveries waiting for a worker before new ones are dropped.
    pub queue_capacity: usize,
    /// Upper bound for a single HTTP exchange, in seconds.
    pub request_timeout_secs: u64,
    /// Skip certificate and host name validation of subscriber endpoints.
    ///
    /// Enabled by default: subscriber endpoints are commonly internal
    /// services with self-signed certificates. Set to `false` to require
    /// valid certificates.
    pub accept_invalid_certs: bool,
    /// `User-Agent` header sent with every notification.
    pub user_agent: String,
    /// How long shutdown waits for queued deliveries, in seconds.
    pub shutdown_timeout_secs: u64,
}

impl DispatcherConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct ProxyConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Hosts reached directly, bypassing the proxy.
    #[serde(default)]
    pub non_proxy_hosts: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder and serve `/metrics`.
    pub enabled: bool,
}

impl Config {
    /// Loads the configuration, layering defaults, the TOML file, the
    /// environment and the command-line arguments.
    pub fn load(cli: &Cli) -> Result<Self> {
        let path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let config = Self::figment(&path).merge(cli).extract()?;
        Ok(config)
    }

    /// Loads the configuration from a TOML file and the environment only.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::figment(path.as_ref()).extract()?)
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            // e.g. ARTIFACT_HOOKS_DISPATCHER__CONCURRENCY=5
            .merge(Env::prefixed("ARTIFACT_HOOKS_").split("__"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            server: ServerConfig {
                listen_address: SocketAddr::from(([127, 0, 0, 1], 8081)),
            },
            webhooks: WebhooksConfig {
                subscriptions_path: PathBuf::from("webhooks.properties"),
                watch: false,
            },
            dispatcher: DispatcherConfig {
                concurrency: 3,
                queue_capacity: 1000,
                request_timeout_secs: 30,
                accept_invalid_certs: true,
                user_agent: format!("artifact-hooks/{}", env!("CARGO_PKG_VERSION")),
                shutdown_timeout_secs: 10,
            },
            proxy: ProxyConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}
