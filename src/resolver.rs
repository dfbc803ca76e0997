//! Resolution of artifact coordinates to the set of subscriber URLs.

use crate::subscriptions::{SubscriptionSnapshot, SubscriptionStore, DEFAULT_KEY};
use std::collections::HashSet;

/// Resolves `(repository, groupId, artifactId)` coordinates to webhook URLs.
#[derive(Clone)]
pub struct UrlResolver {
    store: SubscriptionStore,
}

impl UrlResolver {
    pub fn new(store: SubscriptionStore) -> Self {
        Self { store }
    }

    /// Returns the URLs to notify for the given coordinates.
    ///
    /// Levels are visited from the most specific (`repo.group.artifact`) to
    /// the default key. A level is merged when nothing has been found yet, or
    /// on every level when inheritance is enabled. The whole lookup runs
    /// against a single snapshot.
    pub fn resolve(&self, repository_id: &str, group_id: &str, artifact_id: &str) -> HashSet<String> {
        let snapshot = self.store.snapshot();
        resolve_in(&snapshot, repository_id, group_id, artifact_id)
    }
}

/// Applies the resolution rule to an explicit snapshot.
fn resolve_in(
    snapshot: &SubscriptionSnapshot,
    repository_id: &str,
    group_id: &str,
    artifact_id: &str,
) -> HashSet<String> {
    let inherited = snapshot.is_inherited();
    let levels = [
        format!("{}.{}.{}", repository_id, group_id, artifact_id),
        format!("{}.{}", repository_id, group_id),
        repository_id.to_string(),
        DEFAULT_KEY.to_string(),
    ];

    let mut urls = HashSet::new();
    for key in &levels {
        if urls.is_empty() || inherited {
            urls.extend(snapshot.lookup(key).iter().cloned());
        }
    }
    urls
}
