use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Every failure the client can report.
///
/// Polling swallows `Network`/`Server`/`Decode`, user actions surface them,
/// and `AuthExpired` always ends the session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// No response reached us (connect failure, timeout, DNS).
    #[error("network error: {0}")]
    Network(String),

    /// Refresh failed or no refresh token was stored.
    #[error("session expired: {0}")]
    AuthExpired(String),

    /// A client-side precondition failed; nothing was sent.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Non-2xx response.
    #[error("server responded with HTTP {status}: {body}")]
    Server { status: u16, body: String },

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("local storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, ClientError::AuthExpired(_))
    }

    /// Whether the caller may log this and fall back to its previous state.
    /// Anything else ends the poll or the action.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ClientError::Network(_) | ClientError::Server { .. } | ClientError::Decode(_)
        )
    }
}

impl From<rusqlite::Error> for ClientError {
    fn from(err: rusqlite::Error) -> Self {
        ClientError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}
