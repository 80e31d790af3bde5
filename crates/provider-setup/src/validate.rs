//! Input validation shared by every prompt that collects an endpoint, a
//! credential, a model id or a token limit.
//!
//! Error `Display` strings are the inline messages shown on the prompt.

use {
    byok_config::ValidationConfig,
    byok_providers::CHAT_COMPLETIONS_SUFFIX,
    url::{Host, Url},
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please enter a valid URL")]
    InvalidUrl,
    #[error("URL must use http or https (got {0})")]
    UnsupportedProtocol(String),
    #[error("URL must include a hostname")]
    MissingHost,
    #[error("Remove the /chat/completions suffix and enter the base deployment URL")]
    CompletionsSuffix,
    #[error("URL must include a path, for example /v1")]
    MissingPath,
    #[error("API key cannot be empty")]
    EmptyCredential,
    #[error("API key must be at least {0} characters")]
    CredentialTooShort(usize),
    #[error("API key looks like a placeholder ({0}); paste your real key")]
    PlaceholderCredential(String),
    #[error("Model ID cannot be empty")]
    EmptyModelId,
    #[error("Model ID cannot contain whitespace")]
    ModelIdWhitespace,
    #[error("Model ID must be at most {0} characters")]
    ModelIdTooLong(usize),
    #[error("Please enter a positive number")]
    InvalidTokenCount,
    #[error("Please enter a whole number of tokens")]
    FractionalTokenCount,
    #[error("Token count must be at most {0}")]
    TokenCountTooLarge(u32),
}

impl ValidationError {
    pub fn is_endpoint(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrl
                | Self::UnsupportedProtocol(_)
                | Self::MissingHost
                | Self::CompletionsSuffix
                | Self::MissingPath
        )
    }

    pub fn is_credential(&self) -> bool {
        matches!(
            self,
            Self::EmptyCredential | Self::CredentialTooShort(_) | Self::PlaceholderCredential(_)
        )
    }
}

/// A parsed endpoint that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointUrl {
    pub url: Url,
    /// Loopback or private-network host. Accepted, but callers should log it.
    pub private_host: bool,
}

/// Validation rules bound to a [`ValidationConfig`].
#[derive(Debug, Clone, Default)]
pub struct Validator {
    rules: ValidationConfig,
}

impl Validator {
    pub fn new(rules: ValidationConfig) -> Self {
        Self { rules }
    }

    /// Validate an endpoint URL. `strict` adds the deployment-URL rules: no
    /// trailing completions path and a non-empty path segment.
    pub fn endpoint_url(&self, raw: &str, strict: bool) -> Result<EndpointUrl, ValidationError> {
        let url = Url::parse(raw.trim()).map_err(|_| ValidationError::InvalidUrl)?;

        match url.scheme() {
            "http" | "https" => {},
            other => return Err(ValidationError::UnsupportedProtocol(other.to_string())),
        }

        if url.host_str().is_none_or(str::is_empty) {
            return Err(ValidationError::MissingHost);
        }

        if strict {
            let path = url.path().trim_end_matches('/');
            if path.ends_with(CHAT_COMPLETIONS_SUFFIX) {
                return Err(ValidationError::CompletionsSuffix);
            }
            if path.is_empty() {
                return Err(ValidationError::MissingPath);
            }
        }

        let private_host = is_private_host(&url);
        Ok(EndpointUrl { url, private_host })
    }

    /// Validate a credential. With `allow_empty`, an empty value is accepted
    /// and means "delete the stored key".
    pub fn api_key(&self, raw: &str, allow_empty: bool) -> Result<(), ValidationError> {
        let key = raw.trim();
        if key.is_empty() {
            return if allow_empty {
                Ok(())
            } else {
                Err(ValidationError::EmptyCredential)
            };
        }
        if key.chars().count() < self.rules.min_api_key_length {
            return Err(ValidationError::CredentialTooShort(
                self.rules.min_api_key_length,
            ));
        }
        let lowered = key.to_ascii_lowercase();
        if let Some(placeholder) = self
            .rules
            .placeholder_keys
            .iter()
            .find(|p| lowered.contains(&p.to_ascii_lowercase()))
        {
            return Err(ValidationError::PlaceholderCredential(placeholder.clone()));
        }
        Ok(())
    }

    pub fn model_id(&self, raw: &str) -> Result<(), ValidationError> {
        let id = raw.trim();
        if id.is_empty() {
            return Err(ValidationError::EmptyModelId);
        }
        if id.chars().any(char::is_whitespace) {
            return Err(ValidationError::ModelIdWhitespace);
        }
        if id.chars().count() > self.rules.max_model_id_length {
            return Err(ValidationError::ModelIdTooLong(
                self.rules.max_model_id_length,
            ));
        }
        Ok(())
    }

    /// `Ok(None)` for blank input (keep the current value).
    pub fn token_count(&self, raw: &str) -> Result<Option<u32>, ValidationError> {
        let value = raw.trim();
        if value.is_empty() {
            return Ok(None);
        }
        if let Ok(n) = value.parse::<u32>() {
            return if n > 0 {
                Ok(Some(n))
            } else {
                Err(ValidationError::InvalidTokenCount)
            };
        }
        // Positive but not a u32: say why instead of "not positive".
        match value.parse::<f64>() {
            Ok(n) if n.is_finite() && n > f64::from(u32::MAX) => {
                Err(ValidationError::TokenCountTooLarge(u32::MAX))
            },
            Ok(n) if n.is_finite() && n > 0.0 => Err(ValidationError::FractionalTokenCount),
            _ => Err(ValidationError::InvalidTokenCount),
        }
    }
}

/// Address ranges are only checked for IP literals, so a DNS name such as
/// `10.example.com` is not private.
fn is_private_host(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback() || ip.is_private() || ip.is_link_local(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}
