use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("missing configuration: {0}")]
    ConfigMissing(String),
    #[error("authorisation state mismatch")]
    AuthMismatch,
    #[error("authorisation code exchange failed: {0}")]
    AuthExchangeFailed(String),
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),
    #[error("re-authorisation required")]
    ReauthRequired,
    #[error("poll failed: {0}")]
    PollFailed(String),
    #[error("timed out waiting for the authorisation callback")]
    CallbackTimeout,
    #[error("authorisation callback cancelled")]
    CallbackCancelled,
    #[error("{0}")]
    BadRequest(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl TrackerError {
    /// Errors that can only be resolved by running the login flow again.
    pub fn needs_login(&self) -> bool {
        matches!(
            self,
            TrackerError::ReauthRequired | TrackerError::RefreshFailed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
