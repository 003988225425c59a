//! Request and response bodies, one type per endpoint.
//!
//! Every successful response is wrapped as `{ "data": ... }`; errors carry an
//! optional `{ "message": ... }`. Bodies are validated here, at the boundary.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::types::{CredentialPair, User};

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub(crate) data: T,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub(crate) message: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokensBody {
    access_token: String,
    refresh_token: String,
}

impl TokensBody {
    pub(crate) fn into_credentials(self) -> Result<CredentialPair, Error> {
        let pair = CredentialPair::new(self.access_token, self.refresh_token);
        if pair.is_complete() {
            Ok(pair)
        } else {
            Err(Error::InvalidResponse("empty token in response".into()))
        }
    }
}

/// `POST /auth/login` and `POST /auth/register`.
#[derive(Deserialize)]
pub(crate) struct AuthData {
    pub(crate) user: User,
    pub(crate) tokens: TokensBody,
}

/// `POST /auth/refresh`.
#[derive(Deserialize)]
pub(crate) struct RefreshData {
    pub(crate) tokens: TokensBody,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshRequest<'a> {
    pub(crate) refresh_token: &'a str,
}

#[derive(Serialize)]
pub(crate) struct DecisionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) reason: Option<&'a str>,
}

/// Email + password login.
#[derive(Clone, Serialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

impl LoginCredentials {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// New account sign-up.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("phone", &self.phone)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_response_is_enveloped() {
        let json = r#"{"data":{"user":{"id":"u-1","email":"a@b.c"},
            "tokens":{"accessToken":"acc","refreshToken":"ref"}},"success":true}"#;
        let body: Envelope<AuthData> = serde_json::from_str(json).unwrap();
        let pair = body.data.tokens.into_credentials().unwrap();
        assert_eq!(pair.access_token, "acc");
        assert_eq!(body.data.user.email, "a@b.c");
    }

    #[test]
    fn flat_token_body_is_rejected() {
        let json = r#"{"accessToken":"acc","refreshToken":"ref"}"#;
        assert!(serde_json::from_str::<Envelope<RefreshData>>(json).is_err());
    }

    #[test]
    fn empty_tokens_are_invalid() {
        let json = r#"{"data":{"tokens":{"accessToken":"","refreshToken":"ref"}}}"#;
        let body: Envelope<RefreshData> = serde_json::from_str(json).unwrap();
        assert!(matches!(
            body.data.tokens.into_credentials(),
            Err(Error::InvalidResponse(_))
        ));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = LoginCredentials::new("ops@example.com", "hunter2");
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
