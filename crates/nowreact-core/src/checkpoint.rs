//! Background checkpointing of the state store to disk.
//!
//! The [`Checkpointer`] is the only writer of the state file. It waits for
//! the store's revision to change, lets a short interval pass so a burst of
//! submissions becomes one save, copies the snapshot (the store lock is
//! held only for the copy), and writes it on a blocking thread under a
//! timeout.
//!
//! A failed save is logged and retried a bounded number of times, after
//! which an unsaved canvas is retried at a slower idle pace until a save
//! lands. The store keeps serving from memory throughout. On shutdown the
//! task waits out any save still in flight and does one last flush so no
//! accepted submission is lost on a clean stop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::PersistenceConfig;
use crate::persistence::{PersistError, save_to_disk};
use crate::store::StateStore;

/// Timing policy for a [`Checkpointer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointPolicy {
    /// Delay between a mutation and the save that follows it.
    pub interval: Duration,
    /// Upper bound on a single save.
    pub save_timeout: Duration,
    /// Consecutive retries after a failed save.
    pub max_retries: u32,
    /// Pause between retries.
    pub retry_backoff: Duration,
}

impl From<&PersistenceConfig> for CheckpointPolicy {
    fn from(config: &PersistenceConfig) -> Self {
        Self {
            interval: config.checkpoint_interval(),
            save_timeout: config.save_timeout(),
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff(),
        }
    }
}

/// Floor for [`CheckpointPolicy::idle_retry`].
const MIN_IDLE_RETRY: Duration = Duration::from_millis(100);

impl CheckpointPolicy {
    /// Whether the attempt after `failures` consecutive failed saves is
    /// still within the retry budget.
    pub const fn should_retry(&self, failures: u32) -> bool {
        failures <= self.max_retries
    }

    /// Pace at which unsaved changes are retried once the retry budget is
    /// spent.
    pub fn idle_retry(&self) -> Duration {
        self.retry_backoff
            .saturating_mul(self.max_retries.saturating_add(1))
            .max(MIN_IDLE_RETRY)
    }
}

impl Default for CheckpointPolicy {
    fn default() -> Self {
        Self::from(&PersistenceConfig::default())
    }
}

/// Writes the store's snapshot to a file whenever it has changed.
#[derive(Debug)]
pub struct Checkpointer {
    store: Arc<StateStore>,
    path: PathBuf,
    policy: CheckpointPolicy,
    changes: watch::Receiver<u64>,
    saved_revision: u64,
    // A save that outlived its timeout. No new save starts until it ends,
    // so an old snapshot can never be renamed over a newer one.
    stalled: Option<JoinHandle<Result<(), PersistError>>>,
}

impl Checkpointer {
    /// Create a checkpointer for `store` writing to `path`.
    ///
    /// The store's current revision counts as already saved: it was just
    /// loaded from that file, or is a blank canvas that need not be written
    /// until something is drawn on it.
    pub fn new(store: Arc<StateStore>, path: impl Into<PathBuf>, policy: CheckpointPolicy) -> Self {
        let changes = store.subscribe();
        let saved_revision = *changes.borrow();
        Self {
            store,
            path: path.into(),
            policy,
            changes,
            saved_revision,
            stalled: None,
        }
    }

    /// Revision most recently written to disk.
    pub const fn saved_revision(&self) -> u64 {
        self.saved_revision
    }

    /// Save the current snapshot if it changed since the last save.
    ///
    /// Returns `true` if a file was written.
    ///
    /// # Errors
    ///
    /// Returns the [`PersistError`] from the write, or
    /// [`PersistError::Timeout`] if it did not finish in time, or
    /// [`PersistError::Stalled`] if an earlier timed-out save is still
    /// running. The saved revision is unchanged on error, so the next flush
    /// tries again.
    pub async fn flush(&mut self) -> Result<bool, PersistError> {
        if let Some(stalled) = &self.stalled {
            if !stalled.is_finished() {
                return Err(PersistError::Stalled {
                    path: self.path.clone(),
                });
            }
            // Finished late; whatever it wrote is superseded below.
            self.stalled = None;
        }

        let (revision, snapshot) = self.store.checkpoint_view().await;
        if revision == self.saved_revision {
            return Ok(false);
        }

        let path = self.path.clone();
        let mut write = tokio::task::spawn_blocking(move || save_to_disk(&path, &snapshot));
        match tokio::time::timeout(self.policy.save_timeout, &mut write).await {
            Err(_elapsed) => {
                self.stalled = Some(write);
                Err(PersistError::Timeout {
                    path: self.path.clone(),
                    after: self.policy.save_timeout,
                })
            }
            Ok(Err(join)) => Err(PersistError::Task(join.to_string())),
            Ok(Ok(result)) => {
                result?;
                debug!(revision, path = %self.path.display(), "Checkpoint written");
                self.saved_revision = revision;
                Ok(true)
            }
        }
    }

    /// Run the checkpoint loop on a background task.
    pub fn spawn(self) -> CheckpointHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(shutdown_rx));
        CheckpointHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) -> Result<bool, PersistError> {
        let mut failures: u32 = 0;
        info!(path = %self.path.display(), "Checkpointer started");

        loop {
            if failures == 0 {
                // Sleep until a mutation arrives, or until the idle retry
                // if an earlier save never landed.
                let unsaved = self.store.revision() != self.saved_revision;
                tokio::select! {
                    _ = &mut shutdown => break,
                    changed = self.changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    () = tokio::time::sleep(self.policy.idle_retry()), if unsaved => {}
                }
                if !self.policy.interval.is_zero() {
                    tokio::select! {
                        _ = &mut shutdown => break,
                        () = tokio::time::sleep(self.policy.interval) => {}
                    }
                }
            } else {
                tokio::select! {
                    _ = &mut shutdown => break,
                    () = tokio::time::sleep(self.policy.retry_backoff) => {}
                }
            }
            self.changes.mark_unchanged();

            match self.flush().await {
                Ok(_) => failures = 0,
                Err(e) => {
                    failures = failures.saturating_add(1);
                    if self.policy.should_retry(failures) {
                        warn!(error = %e, attempt = failures, "Checkpoint failed, will retry");
                    } else {
                        error!(
                            error = %e,
                            attempts = failures,
                            unsaved_revision = self.store.revision(),
                            idle_retry = ?self.policy.idle_retry(),
                            "Checkpoint retries exhausted, canvas changes are unsaved"
                        );
                        failures = 0;
                    }
                }
            }
        }

        self.settle_stalled().await;
        let wrote = self.flush().await;
        match &wrote {
            Ok(true) => info!(revision = self.saved_revision, "Final checkpoint written"),
            Ok(false) => info!("No unsaved changes at shutdown"),
            Err(e) => error!(error = %e, "Final checkpoint failed"),
        }
        wrote
    }

    /// Give a timed-out save still in flight one more save timeout to
    /// finish, so the final flush is not refused as stalled.
    async fn settle_stalled(&mut self) {
        let Some(mut stalled) = self.stalled.take() else {
            return;
        };
        if tokio::time::timeout(self.policy.save_timeout, &mut stalled)
            .await
            .is_err()
        {
            warn!(path = %self.path.display(), "Stalled checkpoint still running at shutdown");
            self.stalled = Some(stalled);
        }
    }
}

/// Handle to a running checkpoint task.
#[derive(Debug)]
pub struct CheckpointHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<Result<bool, PersistError>>,
}

impl CheckpointHandle {
    /// Stop the loop, wait for the final flush, and return its result.
    ///
    /// # Errors
    ///
    /// Returns the error of the final flush, or [`PersistError::Task`] if
    /// the task panicked.
    pub async fn shutdown(self) -> Result<bool, PersistError> {
        // The receiver is gone only if the task already ended.
        let _ = self.shutdown.send(());
        self.task
            .await
            .map_err(|e| PersistError::Task(e.to_string()))?
    }
}
