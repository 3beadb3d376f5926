use serde::Deserialize;
use thiserror::Error;
use yt_oauth::OAuthError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("upstream rejected the request (HTTP {status}): {message}")]
    UpstreamClient { status: u16, message: String },
    #[error("upstream server error (HTTP {status}): {message}")]
    UpstreamServer { status: u16, message: String },
    #[error("authorization failed: {0}")]
    AuthorizationFailed(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{0}")]
    Persistence(String),
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl Error {
    /// Classify a non-success API response. `resource` names what was requested.
    pub(crate) fn from_status(status: u16, body: &str, resource: &str) -> Self {
        let message = serde_json::from_str::<ApiErrorResponse>(body)
            .map(|r| r.error.message)
            .unwrap_or_else(|_| body.trim().to_string());

        match status {
            404 => Error::NotFound(format!("{}: {}", resource, message)),
            400..=499 => Error::UpstreamClient { status, message },
            _ => Error::UpstreamServer { status, message },
        }
    }
}

impl From<OAuthError> for Error {
    fn from(e: OAuthError) -> Self {
        match e {
            OAuthError::Transport(e) => Error::Transport(e),
            OAuthError::Persistence(message) => Error::Persistence(message),
            other => Error::AuthorizationFailed(other.to_string()),
        }
    }
}
