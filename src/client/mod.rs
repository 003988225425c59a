//! Authenticated HTTP client for the ERP API.
//!
//! Every request carries the stored access token. A `401` triggers one token
//! refresh followed by one replay of the original request:
//!
//! ```text
//! send ──► 2xx/4xx/5xx ──► result
//!   │
//!   └─► 401 ──► refresh ──► ok ──► store pair ──► replay once ──► result (401 = Unauthorized)
//!                  │
//!                  └─► failed ──► clear tokens + user ──► Unauthorized
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use erp_session::{ApiClient, ClientConfig, LoginCredentials};
//! use erp_session::storage::{FileStore, SafeStorage};
//!
//! let storage = SafeStorage::new(FileStore::open(data_dir).await?);
//! let client = ApiClient::new(ClientConfig::from_env()?, storage)?;
//!
//! client.login(&LoginCredentials::new("ops@example.com", password)).await?;
//! let ious = client.list_ious().await?;
//! ```

mod auth;
mod resources;
mod wire;

use std::sync::Arc;

use reqwest::header::ACCEPT;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use url::Url;

use crate::config::{ClientConfig, RefreshPolicy};
use crate::error::Error;
use crate::redact;
use crate::session::SessionManager;
use crate::storage::{KeyValueStore, SafeStorage, keys};
use crate::types::CredentialPair;

pub use wire::{LoginCredentials, Registration};

use wire::{Envelope, ErrorBody, RefreshData, RefreshRequest};

const REFRESH_PATH: &str = "/auth/refresh";

/// ERP API client with refresh-on-401.
pub struct ApiClient<S> {
    config: Arc<ClientConfig>,
    http: reqwest::Client,
    storage: SafeStorage<S>,
    sessions: SessionManager<S>,
    refresh_gate: Arc<Mutex<()>>,
}

// Manual Clone: avoid derive adding an `S: Clone` bound.
impl<S> Clone for ApiClient<S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            http: self.http.clone(),
            storage: self.storage.clone(),
            sessions: self.sessions.clone(),
            refresh_gate: self.refresh_gate.clone(),
        }
    }
}

impl<S: KeyValueStore> ApiClient<S> {
    /// Create a client over `storage`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] if the HTTP client cannot be built.
    pub fn new(config: ClientConfig, storage: SafeStorage<S>) -> Result<Self, Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        let sessions = SessionManager::new(storage.clone(), config.expiry);
        Ok(Self {
            config: Arc::new(config),
            http,
            storage,
            sessions,
            refresh_gate: Arc::new(Mutex::new(())),
        })
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn storage(&self) -> &SafeStorage<S> {
        &self.storage
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionManager<S> {
        &self.sessions
    }

    /// `GET` an authenticated endpoint and decode its `data`.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.config.endpoint(path)?;
        self.execute(Method::GET, url, None).await
    }

    /// `POST` a JSON body to an authenticated endpoint and decode its `data`.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.config.endpoint(path)?;
        let body = serde_json::to_value(body).map_err(Error::Encode)?;
        self.execute(Method::POST, url, Some(body)).await
    }

    /// Send an authenticated request, refreshing and replaying once on `401`.
    ///
    /// # Errors
    ///
    /// - [`Error::Network`] if the server cannot be reached (not retried).
    /// - [`Error::Unauthorized`] if the refresh fails or the replay is also rejected.
    /// - [`Error::Api`] for any other non-2xx status.
    /// - [`Error::InvalidResponse`] if the body is not the expected shape.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<JsonValue>,
    ) -> Result<T, Error> {
        let token = self.access_token().await;
        let response = self
            .send_once(&method, &url, body.as_ref(), token.as_deref())
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return decode(response, url.path()).await;
        }

        tracing::debug!(method = %method, path = %url.path(), "Got 401, refreshing token");
        let fresh = self.refresh_after_unauthorized(token.as_deref()).await?;

        let response = self
            .send_once(&method, &url, body.as_ref(), Some(&fresh))
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(method = %method, path = %url.path(), "Still unauthorized after refresh");
            return Err(Error::Unauthorized);
        }
        decode(response, url.path()).await
    }

    /// Exchange the stored refresh token for a new pair and store it.
    ///
    /// On any failure both tokens and the cached user are removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] if there is no refresh token or the
    /// refresh request fails for any reason.
    pub async fn refresh_tokens(&self) -> Result<CredentialPair, Error> {
        match self.request_refresh().await {
            Ok(pair) => {
                self.persist_refreshed(&pair).await;
                tracing::debug!(token = %redact(&pair.access_token), "Access token refreshed");
                Ok(pair)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed, clearing credentials");
                self.storage.clear_auth_data().await;
                Err(Error::Unauthorized)
            }
        }
    }

    /// Whether an access token is stored.
    pub async fn is_authenticated(&self) -> bool {
        self.access_token().await.is_some()
    }

    async fn refresh_after_unauthorized(&self, stale: Option<&str>) -> Result<String, Error> {
        match self.config.refresh_policy {
            RefreshPolicy::Independent => Ok(self.refresh_tokens().await?.access_token),
            RefreshPolicy::SingleFlight => {
                let _guard = self.refresh_gate.lock().await;
                // A request that held the gate before us may already have refreshed
                if let Some(current) = self.access_token().await {
                    if stale != Some(current.as_str()) {
                        tracing::debug!("Reusing token refreshed by a concurrent request");
                        return Ok(current);
                    }
                }
                Ok(self.refresh_tokens().await?.access_token)
            }
        }
    }

    async fn request_refresh(&self) -> Result<CredentialPair, Error> {
        let refresh_token: Option<String> = self.storage.get_item(keys::REFRESH_TOKEN, None).await;
        let refresh_token = refresh_token
            .filter(|t| !t.is_empty())
            .ok_or(Error::Unauthorized)?;

        let url = self.config.endpoint(REFRESH_PATH)?;
        tracing::debug!(token = %redact(&refresh_token), "POST {}", url.path());

        // Sent directly, never through `execute`, so a 401 here cannot recurse.
        let response = self
            .http
            .post(url)
            .header(ACCEPT, "application/json")
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })
            .send()
            .await?;
        let response = ensure_success(response, "token refresh").await?;
        let body: Envelope<RefreshData> = parse_json(response, "token refresh").await?;
        body.data.tokens.into_credentials()
    }

    async fn persist_refreshed(&self, pair: &CredentialPair) {
        if let Err(e) = self.store_credentials(pair).await {
            tracing::warn!(error = %e, "Refreshed tokens could not be stored");
        }
    }

    pub(crate) async fn store_credentials(&self, pair: &CredentialPair) -> Result<(), Error> {
        self.storage
            .set_item(keys::ACCESS_TOKEN, &pair.access_token)
            .await?;
        self.storage
            .set_item(keys::REFRESH_TOKEN, &pair.refresh_token)
            .await?;
        Ok(())
    }

    pub(crate) async fn access_token(&self) -> Option<String> {
        let token: Option<String> = self.storage.get_item(keys::ACCESS_TOKEN, None).await;
        token.filter(|t| !t.is_empty())
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&JsonValue>,
        token: Option<&str>,
    ) -> Result<reqwest::Response, Error> {
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header(ACCEPT, "application/json");
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!(
            method = %method,
            path = %url.path(),
            token = %token.map(redact).unwrap_or_else(|| "none".into()),
            "Sending request"
        );
        let response = request.send().await.inspect_err(|e| {
            tracing::warn!(method = %method, path = %url.path(), error = %e, "Request failed");
        })?;
        tracing::debug!(
            method = %method,
            path = %url.path(),
            status = response.status().as_u16(),
            "Received response"
        );
        Ok(response)
    }
}

async fn decode<T: DeserializeOwned>(
    response: reqwest::Response,
    operation: &str,
) -> Result<T, Error> {
    let response = ensure_success(response, operation).await?;
    let body: Envelope<T> = parse_json(response, operation).await?;
    Ok(body.data)
}

/// Checks HTTP response status; returns the response on success or an error with details.
async fn ensure_success(
    response: reqwest::Response,
    operation: &str,
) -> Result<reqwest::Response, Error> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .unwrap_or_default()
        .message
        .filter(|m| !m.trim().is_empty());
    tracing::debug!(operation = %operation, status, message = ?message, "Request rejected");
    Err(Error::Api { status, message })
}

async fn parse_json<T: DeserializeOwned>(
    response: reqwest::Response,
    operation: &str,
) -> Result<T, Error> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::InvalidResponse(format!("{operation}: {e}")))
}
