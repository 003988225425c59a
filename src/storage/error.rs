/// Failures surfaced by [`SafeStorage::set_item`](super::SafeStorage::set_item).
///
/// Reads and removes never fail; they degrade to missing data instead.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("failed to serialize value for '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialized value for '{key}' does not parse back: {source}")]
    Validation {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage backend failed for '{key}': {message}")]
    Backend { key: String, message: String },
}
