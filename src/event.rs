//! The "artifact stored" event sent to webhook subscribers.

use crate::gav::Gav;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// User recorded when the acting user is not known.
pub const UNKNOWN_USER: &str = "unknown";
/// User recorded on synthetic events.
pub const FAKE_USER: &str = "fake";
/// Build number recorded on synthetic snapshot events.
pub const FAKE_SNAPSHOT_BUILD_NUMBER: u32 = 42;

#[derive(Error, Debug)]
#[error("failed to serialize event: {0}")]
pub struct SerializationError(#[from] serde_json::Error);

/// The repository an artifact was stored in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Repository {
    pub id: String,
    pub name: String,
}

impl Repository {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// An artifact was stored in a repository.
///
/// Built once per stored artifact and never modified afterwards. Field order
/// is the order of the JSON object sent to subscribers.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ArtifactStoredEvent {
    /// Milliseconds since the Unix epoch.
    timestamp: i64,
    user: String,
    repository: Repository,
    artifact: Gav,
}

impl ArtifactStoredEvent {
    pub fn new(timestamp: i64, user: impl Into<String>, repository: Repository, artifact: Gav) -> Self {
        Self {
            timestamp,
            user: user.into(),
            repository,
            artifact,
        }
    }

    /// Builds an event from explicit coordinates, as if the artifact had been uploaded.
    pub fn synthetic(request: &FakeEventRequest, now: DateTime<Utc>) -> Self {
        let snapshot = request.version.contains("-SNAPSHOT");
        let classifier = request.classifier.clone().filter(|c| !c.is_empty());
        let timestamp = now.timestamp_millis();

        let mut name = format!("{}-{}", request.artifact_id, request.version);
        if let Some(classifier) = &classifier {
            name.push('-');
            name.push_str(classifier);
        }
        name.push('.');
        name.push_str(&request.extension);

        let artifact = Gav {
            group_id: request.group_id.clone(),
            artifact_id: request.artifact_id.clone(),
            version: request.version.clone(),
            base_version: request.version.clone(),
            classifier,
            extension: request.extension.clone(),
            name,
            snapshot,
            snapshot_build_number: snapshot.then_some(FAKE_SNAPSHOT_BUILD_NUMBER),
            snapshot_time_stamp: snapshot.then_some(timestamp),
            hash: false,
            hash_type: None,
            signature: false,
            signature_type: None,
        };

        Self::new(
            timestamp,
            FAKE_USER,
            Repository::new(&request.repository, &request.repository),
            artifact,
        )
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    pub fn artifact(&self) -> &Gav {
        &self.artifact
    }

    /// Renders the canonical JSON sent to every subscriber.
    pub fn to_json(&self) -> Result<String, SerializationError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl std::fmt::Display for ArtifactStoredEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ArtifactStoredEvent [repository={} ({}), artifact={}, name={}, user={}, timestamp={}]",
            self.repository.id,
            self.repository.name,
            self.artifact,
            self.artifact.name,
            self.user,
            self.timestamp
        )
    }
}

/// Coordinates of a synthetic event, as passed on the query string.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FakeEventRequest {
    #[serde(rename = "r")]
    pub repository: String,
    #[serde(rename = "g")]
    pub group_id: String,
    #[serde(rename = "a")]
    pub artifact_id: String,
    #[serde(rename = "v")]
    pub version: String,
    #[serde(rename = "c", default)]
    pub classifier: Option<String>,
    #[serde(rename = "e")]
    pub extension: String,
}
