#![doc = include_str!("../README.md")]

#[cfg(feature = "http")]
pub mod client;
pub mod config;
pub mod error;
pub mod recovery;
pub mod resources;
pub mod session;
pub mod storage;
pub mod types;

// Re-exports for convenient access
#[cfg(feature = "http")]
pub use client::{ApiClient, LoginCredentials, Registration};
pub use config::{ClientConfig, RefreshPolicy};
pub use error::Error;
pub use recovery::{CleanupReport, RecoverySupervisor, ScanReport, StorageRecovery};
pub use session::{ExpiryPolicy, SessionAction, SessionManager, SessionStatus, SessionStatusKind};
pub use storage::{FileStore, KeyValueStore, MemoryStore, SafeStorage, StorageEvent};
pub use types::{CredentialPair, SessionRecord, User, UserId};

const REDACTED_PREFIX_CHARS: usize = 10;

/// Log-safe form of a token: a short prefix, never more than half of it.
pub(crate) fn redact(token: &str) -> String {
    let len = token.chars().count();
    let shown = REDACTED_PREFIX_CHARS.min(len / 2);
    let prefix: String = token.chars().take(shown).collect();
    format!("{prefix}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_keeps_short_prefix() {
        assert_eq!(redact("eyJhbGciOiJIUzI1NiIsInR5cCI6"), "eyJhbGciOi...");
    }

    #[test]
    fn redact_never_reveals_short_tokens() {
        assert_eq!(redact("abcd"), "ab...");
        assert_eq!(redact(""), "...");
    }
}
