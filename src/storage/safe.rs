use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;

use super::corruption::{CorruptionKind, ParseOutcome, parse_or_repair};
use super::error::StorageError;
use super::keys;
use super::traits::{InvalidUtf8, KeyValueStore};

const EVENT_CAPACITY: usize = 64;

/// Notable storage-layer incidents, broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StorageEvent {
    /// A corrupted value was repaired and written back.
    Repaired { key: String, kind: CorruptionKind },
    /// A corrupted value could not be repaired and was deleted.
    Discarded { key: String, kind: CorruptionKind },
    /// The backend failed to read a key.
    ReadFailed { key: String, error: String },
    /// The backend failed to write a key.
    WriteFailed { key: String, error: String },
}

/// JSON access to a [`KeyValueStore`] that never hands out corrupted data.
pub struct SafeStorage<S> {
    store: Arc<S>,
    events: broadcast::Sender<StorageEvent>,
}

// Manual Clone: avoid derive adding an `S: Clone` bound.
impl<S> Clone for SafeStorage<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            events: self.events.clone(),
        }
    }
}

impl<S: KeyValueStore> SafeStorage<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self::from_arc(Arc::new(store))
    }

    #[must_use]
    pub fn from_arc(store: Arc<S>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { store, events }
    }

    /// The underlying raw store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Subscribe to storage incidents.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }

    /// Read and decode the value under `key`, or `default`.
    ///
    /// `default` is returned when the key is absent or blank, when the backend
    /// fails, when the value is corrupted beyond repair or not UTF-8 (the key
    /// is then deleted), or when valid JSON does not match `T` (the key is
    /// kept). A repaired value is written back before being returned.
    pub async fn get_item<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let raw = match self.raw_get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return default,
            Err(kind) => {
                self.discard(key, kind).await;
                return default;
            }
        };
        if raw.trim().is_empty() {
            return default;
        }

        let value = match parse_or_repair(&raw) {
            ParseOutcome::Clean(value) => value,
            ParseOutcome::Repaired { value, text, kind } => {
                tracing::warn!(key = %key, corruption = %kind, "Repaired corrupted storage entry");
                if let Err(e) = self.store.set(key, text).await {
                    tracing::warn!(key = %key, error = %e, "Failed to write back repaired entry");
                }
                self.emit(StorageEvent::Repaired {
                    key: key.to_owned(),
                    kind,
                });
                value
            }
            ParseOutcome::Unrecoverable(kind) => {
                self.discard(key, kind).await;
                return default;
            }
        };

        serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::warn!(key = %key, error = %e, "Stored value has an unexpected shape");
            default
        })
    }

    /// Encode `value` as JSON and store it under `key`.
    ///
    /// The encoded text is parsed back before writing; `None` and `()` are
    /// stored as `null`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the value cannot be encoded, the encoding
    /// does not parse back, or the backend rejects the write.
    pub async fn set_item<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), StorageError> {
        let text = serde_json::to_string(value).map_err(|source| StorageError::Serialize {
            key: key.to_owned(),
            source,
        })?;
        serde_json::from_str::<JsonValue>(&text).map_err(|source| StorageError::Validation {
            key: key.to_owned(),
            source,
        })?;

        self.store.set(key, text).await.map_err(|e| {
            tracing::warn!(key = %key, error = %e, "Storage write failed");
            self.emit(StorageEvent::WriteFailed {
                key: key.to_owned(),
                error: e.to_string(),
            });
            StorageError::Backend {
                key: key.to_owned(),
                message: e.to_string(),
            }
        })
    }

    /// Delete `key`. Backend errors are logged and swallowed.
    pub async fn remove_item(&self, key: &str) {
        if let Err(e) = self.store.remove(key).await {
            tracing::warn!(key = %key, error = %e, "Storage remove failed");
        }
    }

    /// Every key in the backend; empty if listing fails.
    pub async fn raw_keys(&self) -> Vec<String> {
        self.store.keys().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Listing storage keys failed");
            Vec::new()
        })
    }

    /// Remove both tokens and the cached user.
    pub async fn clear_auth_data(&self) {
        for key in [keys::ACCESS_TOKEN, keys::REFRESH_TOKEN, keys::USER] {
            self.remove_item(key).await;
        }
    }

    /// Raw text under `key`. Read failures count as missing data; bytes that
    /// are not text are `Err(CorruptionKind::InvalidUtf8)`.
    pub(crate) async fn raw_get(&self, key: &str) -> Result<Option<String>, CorruptionKind> {
        match self.store.get(key).await {
            Ok(raw) => Ok(raw),
            Err(e) if e.downcast_ref::<InvalidUtf8>().is_some() => Err(CorruptionKind::InvalidUtf8),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Storage read failed");
                self.emit(StorageEvent::ReadFailed {
                    key: key.to_owned(),
                    error: e.to_string(),
                });
                Ok(None)
            }
        }
    }

    async fn discard(&self, key: &str, kind: CorruptionKind) {
        tracing::warn!(key = %key, corruption = %kind, "Discarding corrupted storage entry");
        self.remove_item(key).await;
        self.emit(StorageEvent::Discarded {
            key: key.to_owned(),
            kind,
        });
    }

    fn emit(&self, event: StorageEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
