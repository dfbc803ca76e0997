//! Fan-out of artifact events to their subscribers.
//!
//! `Dispatcher::notify` resolves an event's subscribers, serializes the event
//! once and enqueues one delivery job per URL. A fixed pool of workers drains
//! the queue, so the caller never waits on the network and at most
//! `concurrency` deliveries are in flight.

use crate::config::DispatcherConfig;
use crate::event::ArtifactStoredEvent;
use crate::internal_metrics::Metrics;
use crate::notification::webhook::{DeliveryError, WebhookSender};
use crate::resolver::UrlResolver;
use async_channel::{Receiver, Sender, TrySendError};
use futures::future::join_all;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

struct DeliveryJob {
    url: String,
    payload: Arc<str>,
    queued_at: Instant,
}

/// Handle on the delivery worker pool.
#[derive(Clone)]
pub struct Dispatcher {
    resolver: UrlResolver,
    jobs_tx: Sender<DeliveryJob>,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
    metrics: Metrics,
}

impl Dispatcher {
    /// Spawns `concurrency` delivery workers and returns the dispatcher handle.
    pub fn start(
        resolver: UrlResolver,
        sender: Arc<dyn WebhookSender>,
        config: &DispatcherConfig,
        metrics: Metrics,
    ) -> Self {
        let concurrency = config.concurrency.max(1);
        let (jobs_tx, jobs_rx) = async_channel::bounded(config.queue_capacity.max(1));

        info!(concurrency, queue_capacity = config.queue_capacity, "Starting webhook dispatcher");
        let workers = (0..concurrency)
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    jobs_rx.clone(),
                    sender.clone(),
                    metrics.clone(),
                ))
            })
            .collect();

        Self {
            resolver,
            jobs_tx,
            workers: Arc::new(Mutex::new(workers)),
            metrics,
        }
    }

    /// Notifies every subscriber of `event`.
    ///
    /// Never blocks and never fails: an event without subscribers is a no-op,
    /// and serialization or queueing problems are logged.
    ///
    /// # Returns
    /// The number of deliveries queued.
    pub fn notify(&self, event: &ArtifactStoredEvent) -> usize {
        let artifact = event.artifact();
        let urls = self.resolver.resolve(
            &event.repository().id,
            &artifact.group_id,
            &artifact.artifact_id,
        );

        if urls.is_empty() {
            debug!(event = %event, "No webhook configured for event");
            self.metrics.notifications_skipped_total.increment(1);
            return 0;
        }

        let payload: Arc<str> = match event.to_json() {
            Ok(json) => Arc::from(json),
            Err(e) => {
                error!(event = %event, error = %e, "Failed to prepare JSON for event");
                self.metrics.notifications_skipped_total.increment(1);
                return 0;
            }
        };

        debug!(payload = %payload, urls = ?urls, "Sending webhook JSON notification");
        self.metrics.notifications_total.increment(1);

        let mut queued = 0;
        for url in urls {
            let job = DeliveryJob {
                url,
                payload: payload.clone(),
                queued_at: Instant::now(),
            };
            match self.jobs_tx.try_send(job) {
                Ok(()) => queued += 1,
                Err(TrySendError::Full(job)) => {
                    warn!(url = %job.url, "Delivery queue is full, dropping webhook notification");
                    self.metrics.record_dropped();
                }
                Err(TrySendError::Closed(job)) => {
                    warn!(url = %job.url, "Dispatcher is shut down, dropping webhook notification");
                    self.metrics.record_dropped();
                }
            }
        }
        queued
    }

    /// Deliveries waiting for a worker.
    pub fn pending(&self) -> usize {
        self.jobs_tx.len()
    }

    /// Stops accepting deliveries and waits up to `timeout` for queued and
    /// in-flight ones to finish.
    ///
    /// # Returns
    /// `true` if every worker finished within the timeout.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.jobs_tx.close();
        let workers: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        info!(pending = self.pending(), "Draining webhook dispatcher...");
        match tokio::time::timeout(timeout, join_all(workers)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        error!(error = %e, "Delivery worker panicked");
                    }
                }
                info!("Webhook dispatcher drained.");
                true
            }
            Err(_) => {
                warn!(
                    abandoned = self.pending(),
                    "Webhook dispatcher did not drain within {:?}", timeout
                );
                false
            }
        }
    }
}

async fn run_worker(
    id: usize,
    jobs_rx: Receiver<DeliveryJob>,
    sender: Arc<dyn WebhookSender>,
    metrics: Metrics,
) {
    trace!("Delivery worker {} started", id);
    while let Ok(job) = jobs_rx.recv().await {
        metrics
            .delivery_queue_delay_seconds
            .record(job.queued_at.elapsed().as_secs_f64());

        debug!(worker_id = id, url = %job.url, "Sending webhook HTTP POST request");
        let start = Instant::now();
        match sender.deliver(&job.url, job.payload).await {
            Ok(status) => {
                debug!(worker_id = id, url = %job.url, %status, "Webhook delivered");
                metrics.record_delivery("success", start.elapsed());
            }
            Err(e @ DeliveryError::Status { .. }) => {
                warn!(worker_id = id, url = %job.url, "{}", e);
                metrics.record_delivery(e.outcome(), start.elapsed());
            }
            Err(e) => {
                error!(worker_id = id, url = %job.url, error = %e, "Webhook delivery failed");
                metrics.record_delivery(e.outcome(), start.elapsed());
            }
        }
    }
    trace!("Delivery queue closed, worker {} shutting down.", id);
}
