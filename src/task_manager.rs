//! Tracks the long-running tasks of the service (admin server, subscriptions
//! watcher) and joins them on shutdown.
use futures::future::join_all;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

type NamedHandle = (&'static str, JoinHandle<()>);

/// Spawns named tasks that share one shutdown signal.
#[derive(Clone, Debug)]
pub struct TaskManager {
    handles: Arc<Mutex<Vec<NamedHandle>>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl TaskManager {
    pub fn new(shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            handles: Arc::new(Mutex::new(Vec::new())),
            shutdown_rx,
        }
    }

    /// Spawns `future` and keeps its handle. The future is expected to watch
    /// [`TaskManager::get_shutdown_rx`] and return once it fires.
    pub fn spawn<F>(&self, name: &'static str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        debug!(task_name = name, "Spawning task");
        let handle = tokio::spawn(future);
        self.lock().push((name, handle));
    }

    pub fn get_shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Waits up to `timeout` for every task to finish. Tasks still running
    /// after that are aborted.
    ///
    /// # Returns
    /// `true` if every task finished on its own without panicking.
    pub async fn shutdown(self, timeout: Duration) -> bool {
        let handles: Vec<NamedHandle> = self.lock().drain(..).collect();
        let names: Vec<&'static str> = handles.iter().map(|(name, _)| *name).collect();
        info!(tasks = ?names, "Waiting for {} tasks to complete...", handles.len());

        let (names, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();

        let results = match tokio::time::timeout(timeout, join_all(handles)).await {
            Ok(results) => results,
            Err(_) => {
                warn!("Tasks did not finish within {:?}, aborting them.", timeout);
                for abort in aborts {
                    abort.abort();
                }
                return false;
            }
        };

        let mut clean = true;
        for (task_name, result) in names.into_iter().zip(results) {
            match result {
                Ok(()) => debug!(task_name, "Task shut down gracefully."),
                Err(e) => {
                    error!(task_name, error = %e, "Task panicked during shutdown.");
                    clean = false;
                }
            }
        }
        if clean {
            info!("All tasks shut down gracefully.");
        }
        clean
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<NamedHandle>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
