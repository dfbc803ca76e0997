//! Subscription store: the mapping of coordinate keys to webhook URLs.
//!
//! The mapping is held as an immutable [`SubscriptionSnapshot`] behind an
//! `ArcSwap`. Readers load the current snapshot without locking; a reload
//! builds a complete new snapshot and swaps it in, so a reader only ever sees
//! the fully-old or the fully-new configuration.

pub mod properties;
pub mod watcher;

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Key holding the fallback URL list.
pub const DEFAULT_KEY: &str = "webhooks.default";
/// Key holding the inheritance flag.
pub const INHERITED_KEY: &str = "webhooks.inherited";

#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("failed to read subscriptions file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed subscriptions file at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("no subscriptions file is configured")]
    NoSource,
}

/// An immutable view of the subscriptions configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSnapshot {
    entries: HashMap<String, Vec<String>>,
    inherited: bool,
}

impl SubscriptionSnapshot {
    /// Parses properties text into a snapshot.
    pub fn parse(source: &str) -> Result<Self, ConfigLoadError> {
        Ok(Self::from_properties(properties::parse(source)?))
    }

    /// Builds a snapshot from raw key/value pairs.
    ///
    /// Every value except the inheritance flag is read as a comma-separated
    /// URL list. Entries are trimmed and empty entries are dropped.
    pub fn from_properties(properties: HashMap<String, String>) -> Self {
        let mut inherited = false;
        let mut entries = HashMap::with_capacity(properties.len());

        for (key, value) in properties {
            if key == INHERITED_KEY {
                inherited = value.trim().eq_ignore_ascii_case("true");
                continue;
            }
            let urls: Vec<String> = value
                .split(',')
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(str::to_string)
                .collect();
            entries.insert(key, urls);
        }

        Self { entries, inherited }
    }

    /// Returns the URLs configured for `key`, or an empty slice.
    pub fn lookup(&self, key: &str) -> &[String] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether less specific levels are merged in addition to more specific ones.
    pub fn is_inherited(&self) -> bool {
        self.inherited
    }

    /// Number of URL keys in the snapshot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Shared, reloadable handle on the current [`SubscriptionSnapshot`].
#[derive(Clone)]
pub struct SubscriptionStore {
    current: Arc<ArcSwap<SubscriptionSnapshot>>,
    source: Option<PathBuf>,
    reload_lock: Arc<Mutex<()>>,
}

impl SubscriptionStore {
    /// Creates a store backed by the given subscriptions file.
    ///
    /// The store starts empty; call [`SubscriptionStore::reload`] to read the file.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(SubscriptionSnapshot::default())),
            source: Some(source.into()),
            reload_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Creates a store with a fixed initial snapshot and no backing file.
    pub fn from_snapshot(snapshot: SubscriptionSnapshot) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(snapshot)),
            source: None,
            reload_lock: Arc::new(Mutex::new(())),
        }
    }

    /// The subscriptions file this store reloads from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Replaces the whole snapshot with the content of `source`.
    ///
    /// On a parse error the current snapshot is left untouched.
    ///
    /// # Returns
    /// The number of URL keys in the new snapshot.
    pub fn load(&self, source: &str) -> Result<usize, ConfigLoadError> {
        let snapshot = SubscriptionSnapshot::parse(source)?;
        Ok(self.install(snapshot))
    }

    /// Re-reads the subscriptions file and atomically replaces the snapshot.
    ///
    /// Concurrent reloads are serialized; readers are never blocked.
    pub async fn reload(&self) -> Result<usize, ConfigLoadError> {
        let path = self.source.as_ref().ok_or(ConfigLoadError::NoSource)?;
        let _guard = self.reload_lock.lock().await;

        let result = match tokio::fs::read(path).await {
            Ok(bytes) => self.load(&properties::decode_latin1(&bytes)),
            Err(source) => Err(ConfigLoadError::Io {
                path: path.clone(),
                source,
            }),
        };

        let outcome = if result.is_ok() { "success" } else { "failure" };
        metrics::counter!("config_reloads_total", "outcome" => outcome).increment(1);
        result
    }

    /// Reloads the subscriptions file, logging instead of returning errors.
    pub async fn reload_quietly(&self) {
        let path = self
            .source
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        match self.reload().await {
            Ok(count) => info!(path = %path, keys = count, "Webhook subscriptions loaded"),
            Err(e) => error!(path = %path, error = %e, "Failed to load webhook subscriptions"),
        }
    }

    /// Returns the current snapshot.
    pub fn snapshot(&self) -> Arc<SubscriptionSnapshot> {
        self.current.load_full()
    }

    /// Returns the URLs configured for `key` in the current snapshot.
    pub fn lookup(&self, key: &str) -> Vec<String> {
        self.current.load().lookup(key).to_vec()
    }

    pub fn is_inherited(&self) -> bool {
        self.current.load().is_inherited()
    }

    fn install(&self, snapshot: SubscriptionSnapshot) -> usize {
        let count = snapshot.len();
        let previous = self.current.swap(Arc::new(snapshot));
        debug!(
            previous_keys = previous.len(),
            keys = count,
            "Installed new subscriptions snapshot"
        );
        metrics::gauge!("subscription_keys_loaded").set(count as f64);
        count
    }
}
