//! artifact-hooks - webhook notifications for a Maven repository manager
//!
//! Every time an artifact is stored, the subscribers configured for its
//! repository, group and artifact receive an HTTP POST with a JSON
//! description of the event.

pub mod app;
pub mod cli;
pub mod config;
pub mod event;
pub mod gav;
pub mod inspector;
pub mod internal_metrics;
pub mod notification;
pub mod resolver;
pub mod server;
pub mod subscriptions;
pub mod task_manager;
