//! Time-based session validity.
//!
//! Independent of token expiry: even with a working refresh token, a session
//! that was opened too long ago is sent back through some form of login.

use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

use crate::storage::{KeyValueStore, SafeStorage, StorageError, keys};
use crate::types::{SessionRecord, User, UserId};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Age thresholds, checked strictest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    pub daily_timeout: Duration,
    pub session_expiry: Duration,
    pub critical_expiry: Duration,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            daily_timeout: Duration::hours(24),
            session_expiry: Duration::days(3),
            critical_expiry: Duration::days(7),
        }
    }
}

impl ExpiryPolicy {
    /// Classify a session by the time elapsed since login.
    #[must_use]
    pub fn evaluate(&self, elapsed: Duration) -> SessionStatus {
        let days_since = elapsed.as_seconds_f64() / SECONDS_PER_DAY;
        let kind = if elapsed >= self.critical_expiry {
            SessionStatusKind::CriticalExpiry
        } else if elapsed >= self.session_expiry {
            SessionStatusKind::SessionExpired
        } else if elapsed >= self.daily_timeout {
            SessionStatusKind::DailyTimeout
        } else {
            SessionStatusKind::Valid
        };
        SessionStatus {
            valid: kind == SessionStatusKind::Valid,
            kind,
            days_since: Some(days_since),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatusKind {
    NoUser,
    NoSession,
    CriticalExpiry,
    SessionExpired,
    DailyTimeout,
    Valid,
}

/// What the app should do with a given status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionAction {
    Continue,
    /// Shortcut re-auth (PIN / biometric).
    QuickReauth,
    ReenterCredentials,
    ForceLogin,
}

/// Derived session state. Recomputed on every check, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub valid: bool,
    pub kind: SessionStatusKind,
    /// Fractional days since login; `None` when there is nothing to measure.
    pub days_since: Option<f64>,
}

impl SessionStatus {
    fn missing(kind: SessionStatusKind) -> Self {
        Self {
            valid: false,
            kind,
            days_since: None,
        }
    }

    #[must_use]
    pub fn action(&self) -> SessionAction {
        match self.kind {
            SessionStatusKind::Valid => SessionAction::Continue,
            SessionStatusKind::DailyTimeout => SessionAction::QuickReauth,
            SessionStatusKind::SessionExpired => SessionAction::ReenterCredentials,
            SessionStatusKind::CriticalExpiry
            | SessionStatusKind::NoSession
            | SessionStatusKind::NoUser => SessionAction::ForceLogin,
        }
    }
}

/// Reads and maintains per-user [`SessionRecord`]s.
pub struct SessionManager<S> {
    storage: SafeStorage<S>,
    policy: ExpiryPolicy,
}

impl<S> Clone for SessionManager<S> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            policy: self.policy,
        }
    }
}

impl<S: KeyValueStore> SessionManager<S> {
    #[must_use]
    pub fn new(storage: SafeStorage<S>, policy: ExpiryPolicy) -> Self {
        Self { storage, policy }
    }

    #[must_use]
    pub fn policy(&self) -> &ExpiryPolicy {
        &self.policy
    }

    /// Status of a session that started at `last_login`, as of now.
    #[must_use]
    pub fn check_expiry(&self, last_login: OffsetDateTime) -> SessionStatus {
        self.check_expiry_at(last_login, OffsetDateTime::now_utc())
    }

    #[must_use]
    pub fn check_expiry_at(&self, last_login: OffsetDateTime, now: OffsetDateTime) -> SessionStatus {
        self.policy.evaluate(now - last_login)
    }

    /// Like [`check_expiry`](Self::check_expiry) for an ISO-8601 timestamp.
    /// An unparseable timestamp counts as no session.
    #[must_use]
    pub fn check_expiry_iso(&self, last_login: &str) -> SessionStatus {
        match OffsetDateTime::parse(last_login, &Rfc3339) {
            Ok(at) => self.check_expiry(at),
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable login timestamp");
                SessionStatus::missing(SessionStatusKind::NoSession)
            }
        }
    }

    /// Gate for the dashboard: user, then session record, then expiry.
    pub async fn validate_dashboard_access(&self, user: Option<&User>) -> SessionStatus {
        self.validate_dashboard_access_at(user, OffsetDateTime::now_utc())
            .await
    }

    pub async fn validate_dashboard_access_at(
        &self,
        user: Option<&User>,
        now: OffsetDateTime,
    ) -> SessionStatus {
        let Some(user) = user else {
            return SessionStatus::missing(SessionStatusKind::NoUser);
        };
        let Some(record) = self.session_record(&user.id).await else {
            return SessionStatus::missing(SessionStatusKind::NoSession);
        };
        let status = self.check_expiry_at(record.login_time, now);
        tracing::debug!(
            user_id = %user.id,
            kind = ?status.kind,
            days_since = ?status.days_since,
            "Session checked"
        );
        status
    }

    /// Create (or replace) the session record for a fresh login.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the record cannot be written.
    pub async fn start_session(&self, user_id: &UserId) -> Result<SessionRecord, StorageError> {
        let record = SessionRecord::started_at(OffsetDateTime::now_utc());
        self.storage.set_item(&keys::session(user_id), &record).await?;
        Ok(record)
    }

    /// Bump `last_activity`. Does nothing if there is no record.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the updated record cannot be written.
    pub async fn record_activity(
        &self,
        user_id: &UserId,
    ) -> Result<Option<SessionRecord>, StorageError> {
        let Some(mut record) = self.session_record(user_id).await else {
            return Ok(None);
        };
        record.last_activity = OffsetDateTime::now_utc();
        self.storage.set_item(&keys::session(user_id), &record).await?;
        Ok(Some(record))
    }

    pub async fn session_record(&self, user_id: &UserId) -> Option<SessionRecord> {
        self.storage.get_item(&keys::session(user_id), None).await
    }

    pub async fn end_session(&self, user_id: &UserId) {
        self.storage.remove_item(&keys::session(user_id)).await;
    }
}
