//! Emergency remediation for an unparseable local store.
//!
//! [`StorageRecovery::cleanup`] is blunt: besides every entry that
//! fails to parse, it removes the credential and user keys, so the user has to
//! log in again and data re-syncs from the server.

mod supervisor;

use serde::Serialize;

use crate::storage::{KeyValueStore, SafeStorage, keys, parse_strict};

pub use supervisor::{RecoverySupervisor, SupervisorHandle};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorruptedEntry {
    pub key: String,
    pub reason: String,
}

/// Result of [`StorageRecovery::scan`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub valid_keys: Vec<String>,
    pub corrupted_keys: Vec<CorruptedEntry>,
}

impl ScanReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.corrupted_keys.is_empty()
    }
}

/// Result of [`StorageRecovery::cleanup`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub cleared_count: usize,
}

pub struct StorageRecovery<S> {
    storage: SafeStorage<S>,
    critical_keys: Vec<String>,
}

impl<S> Clone for StorageRecovery<S> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            critical_keys: self.critical_keys.clone(),
        }
    }
}

impl<S: KeyValueStore> StorageRecovery<S> {
    /// Recovery with the default critical keys (both tokens and the cached user).
    #[must_use]
    pub fn new(storage: SafeStorage<S>) -> Self {
        Self {
            storage,
            critical_keys: keys::CRITICAL.iter().map(|k| (*k).to_owned()).collect(),
        }
    }

    /// Replace the keys that cleanup always removes.
    #[must_use]
    pub fn with_critical_keys(mut self, critical_keys: Vec<String>) -> Self {
        self.critical_keys = critical_keys;
        self
    }

    #[must_use]
    pub fn critical_keys(&self) -> &[String] {
        &self.critical_keys
    }

    /// Classify every stored entry as valid JSON or corrupted. Nothing is modified.
    pub async fn scan(&self) -> ScanReport {
        let mut report = ScanReport::default();
        for key in self.storage.raw_keys().await {
            let raw = match self.storage.raw_get(&key).await {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(kind) => {
                    report.corrupted_keys.push(CorruptedEntry {
                        key,
                        reason: kind.to_string(),
                    });
                    continue;
                }
            };
            if raw.trim().is_empty() {
                report.valid_keys.push(key);
                continue;
            }
            match parse_strict(&raw) {
                Ok(_) => report.valid_keys.push(key),
                Err(kind) => report.corrupted_keys.push(CorruptedEntry {
                    key,
                    reason: kind.to_string(),
                }),
            }
        }
        tracing::debug!(
            valid = report.valid_keys.len(),
            corrupted = report.corrupted_keys.len(),
            "Storage scan complete"
        );
        report
    }

    /// Delete every corrupted entry and every present critical key.
    pub async fn cleanup(&self) -> CleanupReport {
        let report = self.scan().await;

        let mut doomed: Vec<String> = report
            .corrupted_keys
            .into_iter()
            .map(|entry| entry.key)
            .collect();
        doomed.extend(
            report
                .valid_keys
                .into_iter()
                .filter(|key| self.critical_keys.contains(key)),
        );

        for key in &doomed {
            self.storage.remove_item(key).await;
        }

        tracing::info!(cleared = doomed.len(), "Storage cleanup complete");
        CleanupReport {
            cleared_count: doomed.len(),
        }
    }
}
