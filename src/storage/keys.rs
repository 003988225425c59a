//! Fixed storage keys.

use crate::types::UserId;

pub const ACCESS_TOKEN: &str = "accessToken";
pub const REFRESH_TOKEN: &str = "refreshToken";
pub const USER: &str = "user";

/// Prefix of per-user session records (`session_<userId>`).
pub const SESSION_PREFIX: &str = "session_";

/// Keys purged by recovery cleanup whether or not they parse.
pub const CRITICAL: &[&str] = &[ACCESS_TOKEN, REFRESH_TOKEN, USER];

/// Storage key of the session record for `user_id`.
#[must_use]
pub fn session(user_id: &UserId) -> String {
    format!("{SESSION_PREFIX}{user_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_key_is_prefixed_user_id() {
        assert_eq!(session(&UserId::from("42")), "session_42");
    }

    #[test]
    fn critical_keys_cover_credentials_and_user() {
        assert!(CRITICAL.contains(&ACCESS_TOKEN));
        assert!(CRITICAL.contains(&REFRESH_TOKEN));
        assert!(CRITICAL.contains(&USER));
    }
}
