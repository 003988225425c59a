use reqwest::header::ACCEPT;
use serde::Serialize;

use super::wire::{AuthData, Envelope, RefreshRequest};
use super::{ApiClient, LoginCredentials, Registration, ensure_success, parse_json};
use crate::error::Error;
use crate::storage::{KeyValueStore, keys};
use crate::types::User;

const LOGIN_PATH: &str = "/auth/login";
const REGISTER_PATH: &str = "/auth/register";
const LOGOUT_PATH: &str = "/auth/logout";

impl<S: KeyValueStore> ApiClient<S> {
    /// Log in with email and password.
    ///
    /// Stores the token pair and the user, and starts a session record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] for rejected credentials (including `401`, which
    /// never triggers a refresh here), [`Error::Network`] on transport failure,
    /// [`Error::InvalidResponse`] for a malformed body, or [`Error::Storage`]
    /// if the credentials cannot be stored.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<User, Error> {
        self.authenticate(LOGIN_PATH, credentials, "login").await
    }

    /// Create an account and log in as it.
    ///
    /// # Errors
    ///
    /// Same as [`login`](Self::login).
    pub async fn register(&self, registration: &Registration) -> Result<User, Error> {
        self.authenticate(REGISTER_PATH, registration, "register")
            .await
    }

    /// Log out: notify the server (best effort), then drop local credentials,
    /// cached user and session record.
    pub async fn logout(&self) {
        let user = self.current_user().await;

        let refresh_token: Option<String> = self.storage.get_item(keys::REFRESH_TOKEN, None).await;
        if let Some(refresh_token) = refresh_token {
            if let Err(e) = self.notify_logout(&refresh_token).await {
                tracing::warn!(error = %e, "Server logout failed, clearing local session anyway");
            }
        }

        if let Some(user) = &user {
            self.sessions.end_session(&user.id).await;
        }
        self.storage.clear_auth_data().await;
        tracing::info!(user_id = ?user.map(|u| u.id), "Logged out");
    }

    /// The cached user, if logged in.
    pub async fn current_user(&self) -> Option<User> {
        self.storage.get_item(keys::USER, None).await
    }

    async fn authenticate<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        operation: &'static str,
    ) -> Result<User, Error> {
        let url = self.config.endpoint(path)?;
        tracing::debug!(operation, "POST {}", url.path());

        let response = self
            .http
            .post(url)
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .await?;
        let response = ensure_success(response, operation).await?;
        let body: Envelope<AuthData> = parse_json(response, operation).await?;
        let AuthData { user, tokens } = body.data;
        let pair = tokens.into_credentials()?;

        self.store_credentials(&pair).await?;
        self.storage.set_item(keys::USER, &user).await?;
        self.sessions.start_session(&user.id).await?;

        tracing::info!(user_id = %user.id, operation, "Authenticated");
        Ok(user)
    }

    async fn notify_logout(&self, refresh_token: &str) -> Result<(), Error> {
        let url = self.config.endpoint(LOGOUT_PATH)?;
        let mut request = self
            .http
            .post(url)
            .header(ACCEPT, "application/json")
            .json(&RefreshRequest { refresh_token });
        if let Some(access_token) = self.access_token().await {
            request = request.bearer_auth(access_token);
        }
        ensure_success(request.send().await?, "logout").await?;
        Ok(())
    }
}
