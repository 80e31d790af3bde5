use byok_provider_setup::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The assembled configuration has an invalid shape.
    #[error("invalid configuration: {message}")]
    Configuration { message: String },

    #[error("invalid endpoint: {0}")]
    EndpointValidation(ValidationError),

    /// Rejected locally or by the endpoint.
    #[error("invalid credential: {message}")]
    CredentialValidation { message: String },

    /// Endpoint unreachable, timed out or failing server-side.
    #[error("connection failed: {message}")]
    Connection { message: String },

    #[error(transparent)]
    Provider(byok_providers::Error),

    #[error(transparent)]
    Store(#[from] byok_provider_setup::Error),
}

impl Error {
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn credential(message: impl Into<String>) -> Self {
        Self::CredentialValidation {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }
}

impl From<ValidationError> for Error {
    fn from(error: ValidationError) -> Self {
        if error.is_endpoint() {
            Self::EndpointValidation(error)
        } else if error.is_credential() {
            Self::credential(error.to_string())
        } else {
            Self::configuration(error.to_string())
        }
    }
}

impl From<byok_providers::Error> for Error {
    fn from(error: byok_providers::Error) -> Self {
        use byok_providers::Error as P;

        if error.is_auth_failure() {
            return Self::credential(error.to_string());
        }
        match error {
            P::Http(ref e) if e.is_timeout() || e.is_connect() || e.is_request() => {
                Self::connection(error.to_string())
            },
            P::Status { status, .. } if status >= 500 => Self::connection(error.to_string()),
            other => Self::Provider(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
