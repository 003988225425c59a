use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;

use super::{CleanupReport, StorageRecovery};
use crate::storage::{KeyValueStore, StorageEvent};

/// Runs [`StorageRecovery::cleanup`] once enough corrupted entries have been
/// discarded by [`SafeStorage`](crate::storage::SafeStorage).
pub struct RecoverySupervisor<S> {
    recovery: StorageRecovery<S>,
    threshold: usize,
    discarded: usize,
}

/// Handle to a spawned supervisor task.
pub struct SupervisorHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<usize>,
}

impl SupervisorHandle {
    /// Stop the supervisor and return how many cleanups it ran.
    pub async fn shutdown(self) -> usize {
        let _ = self.shutdown.send(());
        self.task.await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Recovery supervisor task failed");
            0
        })
    }
}

impl<S: KeyValueStore> RecoverySupervisor<S> {
    /// `threshold` discarded entries trigger a cleanup; zero is treated as one.
    #[must_use]
    pub fn new(recovery: StorageRecovery<S>, threshold: usize) -> Self {
        Self {
            recovery,
            threshold: threshold.max(1),
            discarded: 0,
        }
    }

    /// Feed one event. Returns the cleanup report if this event triggered one.
    pub async fn observe(&mut self, event: &StorageEvent) -> Option<CleanupReport> {
        let StorageEvent::Discarded { key, kind } = event else {
            return None;
        };
        self.discarded += 1;
        tracing::warn!(
            key = %key,
            corruption = %kind,
            discarded = self.discarded,
            threshold = self.threshold,
            "Corrupted entry discarded"
        );
        if self.discarded < self.threshold {
            return None;
        }

        self.discarded = 0;
        let report = self.recovery.cleanup().await;
        tracing::info!(cleared = report.cleared_count, "Recovery cleanup triggered");
        Some(report)
    }

    /// Process events until `shutdown` fires or its sender is dropped.
    /// Returns the number of cleanups run.
    ///
    /// The supervisor's own storage handle keeps the event channel open, so
    /// `shutdown` is the only way to stop it.
    pub async fn run(
        mut self,
        mut events: broadcast::Receiver<StorageEvent>,
        mut shutdown: oneshot::Receiver<()>,
    ) -> usize {
        let mut cleanups = 0;
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                event = events.recv() => match event {
                    Ok(event) => {
                        if self.observe(&event).await.is_some() {
                            cleanups += 1;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Recovery supervisor lagged behind storage events");
                    }
                    // Unreachable while `self.recovery` holds a sender
                    Err(RecvError::Closed) => break,
                },
            }
        }
        cleanups
    }

    /// Spawn [`run`](Self::run) on the current tokio runtime.
    pub fn spawn(self, events: broadcast::Receiver<StorageEvent>) -> SupervisorHandle {
        let (shutdown, rx) = oneshot::channel();
        SupervisorHandle {
            shutdown,
            task: tokio::spawn(self.run(events, rx)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{CorruptionKind, MemoryStore, SafeStorage, keys};

    fn discarded(key: &str) -> StorageEvent {
        StorageEvent::Discarded {
            key: key.into(),
            kind: CorruptionKind::Truncated,
        }
    }

    #[tokio::test]
    async fn cleanup_after_threshold() {
        let storage = SafeStorage::new(MemoryStore::with_entries([
            (keys::ACCESS_TOKEN, r#""acc""#),
            ("theme", r#""dark""#),
        ]));
        let mut supervisor = RecoverySupervisor::new(StorageRecovery::new(storage.clone()), 2);

        assert_eq!(supervisor.observe(&discarded("a")).await, None);
        let repaired = StorageEvent::Repaired {
            key: "b".into(),
            kind: CorruptionKind::NullBytes,
        };
        assert_eq!(supervisor.observe(&repaired).await, None);

        let report = supervisor.observe(&discarded("c")).await.unwrap();
        assert_eq!(report.cleared_count, 1);
        assert_eq!(storage.raw_keys().await, vec!["theme"]);

        // Counter resets after a cleanup
        assert_eq!(supervisor.observe(&discarded("d")).await, None);
    }

    #[tokio::test]
    async fn spawned_supervisor_reacts_to_discarded_reads() {
        let storage = SafeStorage::new(MemoryStore::with_entries([
            (keys::USER, "[object Object]"),
            (keys::ACCESS_TOKEN, r#""acc""#),
        ]));
        let handle = RecoverySupervisor::new(StorageRecovery::new(storage.clone()), 1)
            .spawn(storage.subscribe());

        let user: Option<serde_json::Value> = storage.get_item(keys::USER, None).await;
        assert_eq!(user, None);

        // Let the supervisor drain the event before stopping it
        for _ in 0..100 {
            if storage.raw_keys().await.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert!(storage.raw_keys().await.is_empty());
        assert_eq!(handle.shutdown().await, 1);
    }
}
