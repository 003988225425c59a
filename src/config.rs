use std::str::FromStr;

use url::Url;

use crate::error::Error;
use crate::session::ExpiryPolicy;

/// How concurrent 401 responses share token refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// One refresh at a time; requests that lose the race reuse its result.
    #[default]
    SingleFlight,
    /// Every 401 refreshes on its own. Concurrent failures may each call the
    /// refresh endpoint, and the last write of the token pair wins.
    Independent,
}

impl FromStr for RefreshPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single-flight" | "single_flight" | "singleflight" => Ok(Self::SingleFlight),
            "independent" => Ok(Self::Independent),
            other => Err(Error::Config(format!("unknown refresh policy '{other}'"))),
        }
    }
}

/// ERP API client configuration.
///
/// The base URL is the only required value; everything else has a default and
/// a `with_*` override.
///
/// ```rust,ignore
/// let config = ClientConfig::new("https://erp.example.com/api".parse()?)
///     .with_refresh_policy(RefreshPolicy::SingleFlight)
///     .with_request_timeout(Duration::from_secs(20));
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    pub(crate) base_url: Url,
    pub(crate) refresh_policy: RefreshPolicy,
    pub(crate) request_timeout: Option<std::time::Duration>,
    pub(crate) expiry: ExpiryPolicy,
}

impl ClientConfig {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            refresh_policy: RefreshPolicy::default(),
            request_timeout: None,
            expiry: ExpiryPolicy::default(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `ERP_API_BASE_URL`: API root, e.g. `https://erp.example.com/api`
    ///
    /// # Optional env vars
    /// - `ERP_REFRESH_POLICY`: `single-flight` (default) or `independent`
    /// - `ERP_REQUEST_TIMEOUT_SECS`: per-request timeout; unset means none
    /// - `ERP_SESSION_DAILY_HOURS`: quick re-auth threshold (default 24)
    /// - `ERP_SESSION_EXPIRED_DAYS`: credential re-entry threshold (default 3)
    /// - `ERP_SESSION_CRITICAL_DAYS`: forced login threshold (default 7)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base URL is missing or any value is invalid.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// [`from_env`](Self::from_env) with a custom variable source.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let base_url = lookup("ERP_API_BASE_URL")
            .ok_or_else(|| Error::Config("ERP_API_BASE_URL is required".into()))?;
        let base_url: Url = base_url
            .parse()
            .map_err(|e| Error::Config(format!("ERP_API_BASE_URL: {e}")))?;

        let mut config = Self::new(base_url);

        if let Some(policy) = lookup("ERP_REFRESH_POLICY") {
            config = config.with_refresh_policy(policy.parse()?);
        }
        if let Some(secs) = lookup("ERP_REQUEST_TIMEOUT_SECS") {
            let secs = parse_positive("ERP_REQUEST_TIMEOUT_SECS", &secs)?;
            config =
                config.with_request_timeout(std::time::Duration::from_secs(u64::from(secs)));
        }

        let mut expiry = ExpiryPolicy::default();
        if let Some(hours) = lookup("ERP_SESSION_DAILY_HOURS") {
            let hours = parse_positive("ERP_SESSION_DAILY_HOURS", &hours)?;
            expiry.daily_timeout = time::Duration::hours(i64::from(hours));
        }
        if let Some(days) = lookup("ERP_SESSION_EXPIRED_DAYS") {
            let days = parse_positive("ERP_SESSION_EXPIRED_DAYS", &days)?;
            expiry.session_expiry = time::Duration::days(i64::from(days));
        }
        if let Some(days) = lookup("ERP_SESSION_CRITICAL_DAYS") {
            let days = parse_positive("ERP_SESSION_CRITICAL_DAYS", &days)?;
            expiry.critical_expiry = time::Duration::days(i64::from(days));
        }
        if !(expiry.daily_timeout <= expiry.session_expiry
            && expiry.session_expiry <= expiry.critical_expiry)
        {
            return Err(Error::Config(
                "session thresholds must satisfy daily <= expired <= critical".into(),
            ));
        }

        Ok(config.with_expiry_policy(expiry))
    }

    #[must_use]
    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.refresh_policy = policy;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_expiry_policy(mut self, expiry: ExpiryPolicy) -> Self {
        self.expiry = expiry;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn refresh_policy(&self) -> RefreshPolicy {
        self.refresh_policy
    }

    #[must_use]
    pub fn request_timeout(&self) -> Option<std::time::Duration> {
        self.request_timeout
    }

    #[must_use]
    pub fn expiry_policy(&self) -> &ExpiryPolicy {
        &self.expiry
    }

    /// Absolute URL of an API path such as `/auth/login`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the joined URL is invalid.
    pub fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        joined
            .parse()
            .map_err(|e| Error::Config(format!("invalid endpoint '{path}': {e}")))
    }

    /// Absolute URL built from path segments; each segment is percent-encoded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base URL cannot carry a path.
    pub fn resource_url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Config(format!("base URL '{}' cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

// A `u32` of days still fits `time::Duration`, so the conversions above cannot overflow.
fn parse_positive(name: &str, value: &str) -> Result<u32, Error> {
    match value.trim().parse::<u32>() {
        Ok(0) => Err(Error::Config(format!("{name}: must be greater than zero"))),
        Ok(n) => Ok(n),
        Err(e) => Err(Error::Config(format!("{name}: {e}"))),
    }
}
