//! # Admin Server
//!
//! An `axum` server exposing the operational endpoints of the service:
//!
//! - `POST /webhooks/events`: inbound "item stored" events from the repository.
//! - `GET|POST /webhooks/configuration/reload`: re-reads the subscriptions file.
//! - `GET|POST /webhooks/fakeEvent`: notifies subscribers of a synthetic event.
//! - `GET /metrics`: Prometheus exposition, when metrics are enabled.
//!
//! The server stops serving as soon as the shutdown signal fires.

use crate::event::{ArtifactStoredEvent, FakeEventRequest};
use crate::inspector::{EventInspector, StoredItemEvent};
use crate::subscriptions::SubscriptionStore;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::future::Future;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, trace};

pub const RELOAD_SUCCESS_MESSAGE: &str = "Webhook configuration has been successfully reloaded !";
pub const RELOAD_FAILURE_PREFIX: &str = "Failed to reload the webhook configuration : ";

/// Shared state of the admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub store: SubscriptionStore,
    pub inspector: EventInspector,
    pub prom_handle: Option<PrometheusHandle>,
}

/// Builds the admin router.
pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/webhooks/events", post(receive_event))
        .route("/webhooks/configuration/reload", get(reload).post(reload))
        .route("/webhooks/fakeEvent", get(fake_event).post(fake_event))
        .route("/metrics", get(render_metrics))
        .with_state(state)
}

async fn receive_event(
    State(state): State<AdminState>,
    Json(item): Json<StoredItemEvent>,
) -> impl IntoResponse {
    let outcome = state.inspector.inspect(item);
    trace!(?outcome, "Inbound event inspected");
    (
        StatusCode::ACCEPTED,
        Json(json!({ "accepted": outcome.is_accepted() })),
    )
}

async fn reload(State(state): State<AdminState>) -> Response {
    match state.store.reload().await {
        Ok(keys) => {
            info!(keys, "Webhook configuration reloaded on request");
            (StatusCode::OK, RELOAD_SUCCESS_MESSAGE).into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to reload the webhook configuration");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{}{}", RELOAD_FAILURE_PREFIX, e),
            )
                .into_response()
        }
    }
}

async fn fake_event(
    State(state): State<AdminState>,
    Query(request): Query<FakeEventRequest>,
) -> Response {
    let event = ArtifactStoredEvent::synthetic(&request, Utc::now());
    info!(event = %event, "Sending fake event");

    let body = match event.to_json() {
        Ok(body) => body,
        Err(e) => {
            error!(event = %event, error = %e, "Failed to prepare JSON for fake event");
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };
    state.inspector.notify(&event);

    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

async fn render_metrics(State(state): State<AdminState>) -> Response {
    match &state.prom_handle {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "Metrics are disabled").into_response(),
    }
}

/// The admin server, bound but not yet serving.
pub struct AdminServer {
    listener: TcpListener,
    router: Router,
    shutdown_rx: watch::Receiver<bool>,
}

impl AdminServer {
    pub fn new(listener: TcpListener, state: AdminState, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            listener,
            router: router(state),
            shutdown_rx,
        }
    }

    /// Returns a future that serves requests until a shutdown signal is received.
    pub fn run(mut self) -> impl Future<Output = ()> {
        async move {
            tokio::select! {
                biased;
                _ = self.shutdown_rx.changed() => {
                    trace!("Admin server received shutdown signal via select.");
                }
                result = axum::serve(self.listener, self.router.into_make_service()) => {
                    if let Err(e) = result {
                        error!("Admin server error: {}", e);
                    }
                }
            }
            trace!("Admin server task finished.");
        }
    }
}
