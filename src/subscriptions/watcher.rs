//! Reloads the subscriptions file when it changes on disk.

use super::SubscriptionStore;
use crate::task_manager::TaskManager;
use anyhow::{anyhow, Result};
use notify::{event::EventKind, Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Starts watching the store's backing file and reloads it on every change.
///
/// The watcher runs as a managed task until shutdown. An optional
/// `reload_notifier` receives a message after each reload attempt.
pub fn spawn(
    store: SubscriptionStore,
    task_manager: &TaskManager,
    reload_notifier: Option<mpsc::Sender<()>>,
) -> Result<()> {
    let source = store
        .source()
        .ok_or_else(|| anyhow!("cannot watch a subscription store without a backing file"))?;
    let watched = absolute_path(source)?;
    let directory = watched
        .parent()
        .ok_or_else(|| anyhow!("subscriptions file {:?} has no parent directory", watched))?
        .to_path_buf();

    let (tx, mut rx) = mpsc::channel(100);
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| match res {
            Ok(event) => {
                if tx.blocking_send(event).is_err() {
                    warn!("Subscriptions watcher channel closed");
                }
            }
            Err(e) => error!(error = %e, "Subscriptions watcher error"),
        },
        Config::default(),
    )?;
    watcher.watch(&directory, RecursiveMode::NonRecursive)?;
    info!(path = ?watched, "Watching subscriptions file for changes");

    let mut shutdown_rx = task_manager.get_shutdown_rx();
    task_manager.spawn("SubscriptionsWatcher", async move {
        // The watcher stops delivering events once dropped.
        let _watcher = watcher;
        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                event = rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            if !should_reload(&event, &watched) {
                continue;
            }

            info!("Subscriptions file change detected, reloading...");
            store.reload_quietly().await;
            if let Some(notifier) = &reload_notifier {
                if notifier.send(()).await.is_err() {
                    warn!("Reload notifier channel closed");
                }
            }
        }
        info!("Subscriptions watcher stopped.");
    });

    Ok(())
}

fn should_reload(event: &Event, watched: &Path) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
        && event.paths.iter().any(|path| path == watched)
}

/// Resolves `path` against the current directory, canonicalizing the parent
/// so it matches the paths reported by the platform watcher.
fn absolute_path(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let file_name = absolute
        .file_name()
        .ok_or_else(|| anyhow!("invalid subscriptions file path {:?}", path))?;
    let parent = absolute
        .parent()
        .ok_or_else(|| anyhow!("invalid subscriptions file path {:?}", path))?;
    Ok(std::fs::canonicalize(parent)?.join(file_name))
}
