//! Delivery of artifact events to webhook subscribers.
//!
//! The `Dispatcher` decides who is notified and owns the worker pool. The
//! actual HTTP exchange sits behind the `WebhookSender` trait so the
//! pipeline can be exercised without a network.
pub mod dispatcher;
pub mod webhook;

pub use dispatcher::Dispatcher;
pub use webhook::{DeliveryError, HttpClientFactory, HttpWebhookSender, WebhookSender};
