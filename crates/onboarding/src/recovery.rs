//! Maps a failed step to a transition by asking the user what to do.
//!
//! Classification is by message content so that errors from any collaborator
//! get a sensible modal without the collaborator knowing about the flow.

use tracing::warn;

use crate::{
    error::Error,
    state::{ConfigurationStep, StepOutcome},
    surface::{ErrorModal, ModalAction, PromptSurface},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Credential,
    Connectivity,
    ModelNotFound,
    Generic,
}

const CREDENTIAL_PATTERNS: &[&str] = &[
    "401",
    "403",
    "unauthorized",
    "forbidden",
    "invalid api key",
    "invalid_api_key",
    "invalid credential",
    "authentication",
    "api key",
];

const MODEL_NOT_FOUND_PATTERNS: &[&str] = &[
    "model not found",
    "model_not_found",
    "no such model",
    "unknown model",
    "deployment not found",
    "does not exist",
    "404",
];

const CONNECTIVITY_PATTERNS: &[&str] = &[
    "connection",
    "connect",
    "timed out",
    "timeout",
    "unreachable",
    "dns",
    "network",
    "error sending request",
    "500",
    "502",
    "503",
    "504",
    "service unavailable",
    "bad gateway",
];

impl ErrorCategory {
    /// Credential checks run first: an auth failure often also mentions the
    /// endpoint or the model.
    pub fn classify(message: &str) -> Self {
        let msg = message.to_lowercase();
        let matches = |patterns: &[&str]| patterns.iter().any(|p| msg.contains(p));

        if matches(CREDENTIAL_PATTERNS) {
            Self::Credential
        } else if matches(MODEL_NOT_FOUND_PATTERNS) {
            Self::ModelNotFound
        } else if matches(CONNECTIVITY_PATTERNS) {
            Self::Connectivity
        } else {
            Self::Generic
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Credential => "Authentication failed",
            Self::Connectivity => "Could not reach the provider",
            Self::ModelNotFound => "Model not found",
            Self::Generic => "Something went wrong",
        }
    }

    pub fn primary_label(self) -> &'static str {
        match self {
            Self::Credential => "Re-enter credentials",
            Self::Connectivity => "Retry",
            Self::ModelNotFound => "Choose again",
            Self::Generic => "Try again",
        }
    }
}

/// Primary action re-enters `step`, "go back" yields a back signal and
/// dismissal aborts the flow.
pub async fn recover<S>(surface: &mut S, step: ConfigurationStep, error: &Error) -> StepOutcome
where
    S: PromptSurface + ?Sized,
{
    let message = error.to_string();
    let category = ErrorCategory::classify(&message);
    warn!(step = ?step, category = ?category, error = %message, "configuration step failed");

    let modal = ErrorModal {
        title: category.title().to_string(),
        message,
        primary_label: category.primary_label().to_string(),
        back_label: "Go back".to_string(),
    };
    match surface.show_error(modal).await {
        Some(ModalAction::Primary) => StepOutcome::Next(step),
        Some(ModalAction::GoBack) => StepOutcome::Back,
        None => StepOutcome::Abort,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_credential() {
        for msg in [
            "authentication failed for OpenAI: invalid API key (HTTP 401)",
            "invalid credential: API key must be at least 10 characters",
            "HTTP 403 Forbidden",
        ] {
            assert_eq!(ErrorCategory::classify(msg), ErrorCategory::Credential, "{msg}");
        }
    }

    #[test]
    fn classify_model_not_found() {
        for msg in [
            "Groq returned HTTP 404: {\"error\":\"model_not_found\"}",
            "The model `gpt-9` does not exist",
            "DeploymentNotFound: deployment not found",
        ] {
            assert_eq!(ErrorCategory::classify(msg), ErrorCategory::ModelNotFound, "{msg}");
        }
    }

    #[test]
    fn classify_connectivity() {
        for msg in [
            "connection failed: connection timed out after 10 seconds",
            "error sending request for url (https://api.example.com/v1/models)",
            "Groq returned HTTP 503: overloaded",
        ] {
            assert_eq!(ErrorCategory::classify(msg), ErrorCategory::Connectivity, "{msg}");
        }
    }

    #[test]
    fn classify_generic() {
        assert_eq!(
            ErrorCategory::classify("invalid configuration: model id missing"),
            ErrorCategory::Generic
        );
    }
}
