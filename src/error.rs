use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[cfg(feature = "http")]
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Credentials are gone or could not be refreshed; route to login.
    #[error("Unauthorized: session expired")]
    Unauthorized,
    /// Non-2xx response other than a 401 on an authenticated request.
    #[error("API error ({status}): {}", .message.as_deref().unwrap_or("no details"))]
    Api { status: u16, message: Option<String> },
    #[error("Failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the caller should send the user back to the login screen.
    #[must_use]
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Text suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            #[cfg(feature = "http")]
            Self::Network(_) => "Please check your connection and try again.".to_string(),
            Self::Unauthorized => "Your session has expired. Please log in again.".to_string(),
            Self::Api {
                message: Some(message),
                ..
            } => message.clone(),
            Self::Api { .. } | Self::InvalidResponse(_) | Self::Encode(_) => {
                "Something went wrong. Please try again.".to_string()
            }
            Self::Storage(_) => "Could not save data on this device.".to_string(),
            Self::Config(_) => "The app is misconfigured.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_requires_login() {
        assert!(Error::Unauthorized.requires_login());
        assert!(!Error::InvalidResponse("x".into()).requires_login());
    }

    #[test]
    fn api_error_prefers_server_message() {
        let err = Error::Api {
            status: 422,
            message: Some("Amount must be positive".into()),
        };
        assert_eq!(err.user_message(), "Amount must be positive");

        let err = Error::Api {
            status: 500,
            message: None,
        };
        assert_eq!(err.user_message(), "Something went wrong. Please try again.");
    }
}
