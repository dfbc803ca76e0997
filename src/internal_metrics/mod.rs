//! # Internal Metrics Module
//!
//! Counters and histograms describing notification traffic, exported in the
//! Prometheus format on the admin server's `/metrics` route.
//!
//! - **`MetricsBuilder`**: installs the Prometheus recorder when metrics are
//!   enabled and returns the handle used to render the exposition.
//! - **`Metrics`**: a cloneable handle with high-level recording methods.

use crate::config::MetricsConfig;
use metrics::{Counter, Histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use tracing::error;

/// The public API for the metrics system.
#[derive(Clone)]
pub struct Metrics {
    pub notifications_total: Counter,
    pub notifications_skipped_total: Counter,
    pub delivery_duration_seconds: Histogram,
    pub delivery_queue_delay_seconds: Histogram,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Creates a new `Metrics` instance and registers descriptions for all
    /// supported metrics with the global recorder.
    pub fn new() -> Self {
        metrics::describe_counter!("notifications_total", Unit::Count, "Events that resolved to at least one subscriber URL.");
        metrics::describe_counter!("notifications_skipped_total", Unit::Count, "Events with no subscriber URL, or dropped before delivery.");
        metrics::describe_counter!("events_filtered_total", Unit::Count, "Inbound items ignored, labeled by reason.");
        metrics::describe_counter!("deliveries_total", Unit::Count, "Webhook deliveries, labeled by outcome.");
        metrics::describe_histogram!("delivery_duration_seconds", Unit::Seconds, "Duration of a single webhook HTTP exchange.");
        metrics::describe_histogram!("delivery_queue_delay_seconds", Unit::Seconds, "Time a delivery waits for a free worker.");
        metrics::describe_counter!("config_reloads_total", Unit::Count, "Subscription reloads, labeled by outcome.");
        metrics::describe_gauge!("subscription_keys_loaded", Unit::Count, "Number of URL keys in the active subscriptions snapshot.");

        Self {
            notifications_total: metrics::counter!("notifications_total"),
            notifications_skipped_total: metrics::counter!("notifications_skipped_total"),
            delivery_duration_seconds: metrics::histogram!("delivery_duration_seconds"),
            delivery_queue_delay_seconds: metrics::histogram!("delivery_queue_delay_seconds"),
        }
    }

    /// Records the outcome of one delivery.
    pub fn record_delivery(&self, outcome: &'static str, duration: Duration) {
        metrics::counter!("deliveries_total", "outcome" => outcome).increment(1);
        self.delivery_duration_seconds.record(duration.as_secs_f64());
    }

    /// Counts a delivery that never reached a worker.
    pub fn record_dropped(&self) {
        metrics::counter!("deliveries_total", "outcome" => "dropped").increment(1);
    }

    /// Counts an inbound item that did not become a notification.
    pub fn increment_events_filtered(&self, reason: &'static str) {
        metrics::counter!("events_filtered_total", "reason" => reason).increment(1);
    }
}

/// Builder for the metrics system.
pub struct MetricsBuilder {
    config: MetricsConfig,
}

impl MetricsBuilder {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Installs the Prometheus recorder when metrics are enabled.
    ///
    /// Returns the `Metrics` handle and, when a recorder was installed, the
    /// `PrometheusHandle` that renders the `/metrics` response. A failure to
    /// install the recorder is logged and metrics stay unexported.
    pub fn build(self) -> (Metrics, Option<PrometheusHandle>) {
        if !self.config.enabled {
            return (Metrics::new(), None);
        }

        let builder = match PrometheusBuilder::new().set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
        ) {
            Ok(builder) => builder,
            Err(e) => {
                error!("Failed to configure Prometheus buckets: {}", e);
                return (Metrics::new(), None);
            }
        };
        let recorder = builder.build_recorder();
        let handle = recorder.handle();

        if let Err(e) = metrics::set_global_recorder(recorder) {
            error!("Failed to install Prometheus recorder: {}", e);
            return (Metrics::new(), None);
        }

        (Metrics::new(), Some(handle))
    }
}
