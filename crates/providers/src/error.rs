use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The endpoint rejected the credential (HTTP 401/403).
    #[error("authentication failed for {provider}: invalid API key (HTTP {status})")]
    Unauthorized { provider: String, status: u16 },

    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    /// Whether the endpoint rejected the credential rather than failing for
    /// some other reason.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::Unauthorized { .. } => true,
            Self::Http(e) => e
                .status()
                .is_some_and(|s| s.as_u16() == 401 || s.as_u16() == 403),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
