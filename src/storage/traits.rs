use std::future::Future;

/// Error type returned by storage backends.
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// Backend error for stored bytes that are not valid UTF-8.
///
/// [`SafeStorage`](super::SafeStorage) treats it as corruption and discards
/// the entry, where any other backend error only counts as a failed read.
#[derive(Debug, thiserror::Error)]
#[error("stored value is not valid UTF-8: {0}")]
pub struct InvalidUtf8(#[from] pub std::string::FromUtf8Error);

/// Raw platform key/value store.
///
/// Values are opaque strings; JSON encoding and corruption handling live in
/// [`SafeStorage`](super::SafeStorage). Implementations only move bytes.
///
/// # Example
///
/// ```rust,ignore
/// impl KeyValueStore for KeychainStore {
///     async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
///         Ok(self.keychain.read(key)?)
///     }
///
///     async fn set(&self, key: &str, value: String) -> Result<(), BackendError> {
///         self.keychain.write(key, &value)?;
///         Ok(())
///     }
///
///     async fn remove(&self, key: &str) -> Result<(), BackendError> {
///         self.keychain.delete(key)?;
///         Ok(())
///     }
///
///     async fn keys(&self) -> Result<Vec<String>, BackendError> {
///         Ok(self.keychain.list()?)
///     }
/// }
/// ```
pub trait KeyValueStore: Send + Sync + 'static {
    /// Read the raw value stored under `key`. `Ok(None)` if absent.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, BackendError>> + Send;

    /// Write `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: String)
    -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Delete `key`. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// List every key currently stored.
    fn keys(&self) -> impl Future<Output = Result<Vec<String>, BackendError>> + Send;
}
