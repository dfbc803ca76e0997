//! Turns raw "item stored" events from the repository into artifact
//! notifications.

use crate::event::{ArtifactStoredEvent, Repository, UNKNOWN_USER};
use crate::gav::path_to_gav;
use crate::internal_metrics::Metrics;
use crate::notification::Dispatcher;
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, trace};

/// An item was stored in a repository. Sent by the repository manager.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StoredItemEvent {
    pub repository: Repository,
    /// Repository-relative path in the Maven 2 layout.
    pub path: String,
    #[serde(default)]
    pub user: Option<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// What happened to an inbound item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectOutcome {
    /// The item is an artifact; `deliveries` webhook calls were queued.
    Notified { deliveries: usize },
    /// A checksum or signature of an artifact.
    SideArtifact,
    /// Metadata, a directory, or a path outside the Maven 2 layout.
    NotAnArtifact,
}

impl InspectOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, InspectOutcome::Notified { .. })
    }
}

#[derive(Clone)]
pub struct EventInspector {
    dispatcher: Dispatcher,
    metrics: Metrics,
}

impl EventInspector {
    pub fn new(dispatcher: Dispatcher, metrics: Metrics) -> Self {
        Self {
            dispatcher,
            metrics,
        }
    }

    pub fn inspect(&self, item: StoredItemEvent) -> InspectOutcome {
        let Some(artifact) = path_to_gav(&item.path) else {
            trace!(repository = %item.repository.id, path = %item.path, "Ignoring non-artifact item");
            self.metrics.increment_events_filtered("not_artifact");
            return InspectOutcome::NotAnArtifact;
        };

        if artifact.is_side_artifact() {
            trace!(repository = %item.repository.id, path = %item.path, "Ignoring checksum or signature");
            self.metrics.increment_events_filtered("side_artifact");
            return InspectOutcome::SideArtifact;
        }

        let event = ArtifactStoredEvent::new(
            item.timestamp.unwrap_or_else(|| Utc::now().timestamp_millis()),
            item.user.unwrap_or_else(|| UNKNOWN_USER.to_string()),
            item.repository,
            artifact,
        );
        debug!(event = %event, "Artifact stored");

        InspectOutcome::Notified {
            deliveries: self.dispatcher.notify(&event),
        }
    }

    /// Runs a synthetic event through the normal notification path.
    pub fn notify(&self, event: &ArtifactStoredEvent) -> usize {
        self.dispatcher.notify(event)
    }
}
