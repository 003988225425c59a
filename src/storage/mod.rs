//! Persistent key/value storage with corruption recovery.
//!
//! [`KeyValueStore`] is the raw platform store (strings in, strings out).
//! [`SafeStorage`] sits on top of it and is what the rest of the crate talks to:
//! values go in as JSON, and a value that no longer parses is either repaired
//! or dropped, never handed back to the caller.
//!
//! ```rust,ignore
//! use erp_session::storage::{MemoryStore, SafeStorage};
//!
//! let storage = SafeStorage::new(MemoryStore::new());
//! storage.set_item("filters", &vec!["pending", "approved"]).await?;
//! let filters: Vec<String> = storage.get_item("filters", Vec::new()).await;
//! ```

mod corruption;
mod error;
mod file;
pub mod keys;
mod memory;
mod safe;
mod traits;

pub use corruption::{CorruptionKind, MAX_REPAIR_ROUNDS};
pub use error::StorageError;
pub use file::FileStore;
pub use memory::MemoryStore;
pub use safe::{SafeStorage, StorageEvent};
pub use traits::{BackendError, InvalidUtf8, KeyValueStore};

pub(crate) use corruption::{ParseOutcome, parse_or_repair, parse_strict};
