//! Provider registry contract for bring-your-own-key model providers.
//!
//! A provider exposes its name, how it authenticates, the models it can list
//! and a way to register a user-configured model. Discovery from an arbitrary
//! endpoint is an explicit optional capability ([`ModelDiscovery`]).

pub mod error;
pub mod openai_compat;

use std::fmt;

use {
    async_trait::async_trait,
    byok_config::{AuthTypeSetting, ProviderFamilySetting},
    secrecy::Secret,
    serde::{Deserialize, Serialize},
};

pub use {
    error::{Error, Result},
    openai_compat::OpenAiCompatProvider,
};

/// Completion path that deployment-URL providers expect at the end of the
/// derived endpoint.
pub const CHAT_COMPLETIONS_SUFFIX: &str = "/chat/completions";

/// Shared HTTP client for provider adapters.
///
/// Reusing one client shares the connection pool, DNS cache and TLS sessions.
pub fn shared_http_client() -> &'static reqwest::Client {
    static CLIENT: std::sync::LazyLock<reqwest::Client> =
        std::sync::LazyLock::new(reqwest::Client::new);
    &CLIENT
}

/// How a provider authenticates its models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthType {
    /// One API key for the whole provider.
    GlobalApiKey,
    /// Every model has its own endpoint URL and key.
    PerModelDeployment,
}

impl From<AuthTypeSetting> for AuthType {
    fn from(value: AuthTypeSetting) -> Self {
        match value {
            AuthTypeSetting::GlobalApiKey => Self::GlobalApiKey,
            AuthTypeSetting::PerModelDeployment => Self::PerModelDeployment,
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GlobalApiKey => f.write_str("global API key"),
            Self::PerModelDeployment => f.write_str("per-model deployment"),
        }
    }
}

/// Endpoint conventions shared by a group of providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderFamily {
    #[default]
    OpenAiCompatible,
    /// Deployment-URL style providers: the endpoint is entered directly after
    /// model selection and is validated strictly.
    Azure,
}

impl From<ProviderFamilySetting> for ProviderFamily {
    fn from(value: ProviderFamilySetting) -> Self {
        match value {
            ProviderFamilySetting::OpenaiCompatible => Self::OpenAiCompatible,
            ProviderFamilySetting::Azure => Self::Azure,
        }
    }
}

/// A model as listed by a provider or an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    pub name: String,
}

impl ModelEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Token limits and feature flags of a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCapabilities {
    pub name: String,
    pub max_input_tokens: u32,
    pub max_output_tokens: u32,
    pub tool_calling: bool,
    pub vision: bool,
}

impl ModelCapabilities {
    /// Defaults applied to deployment-URL providers when the user skips the
    /// advanced settings.
    pub fn azure_defaults(model_id: &str) -> Self {
        Self {
            name: model_id.to_string(),
            max_input_tokens: 100_000,
            max_output_tokens: 8192,
            tool_calling: true,
            vision: false,
        }
    }

    /// Both token limits must be positive.
    pub fn is_valid(&self) -> bool {
        self.max_input_tokens > 0 && self.max_output_tokens > 0
    }
}

/// A user-configured model handed to [`ByokProvider::register_model`].
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomModelConfig {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<ModelCapabilities>,
    /// Per-model key for deployment providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl fmt::Debug for CustomModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomModelConfig")
            .field("id", &self.id)
            .field("deployment_url", &self.deployment_url)
            .field("capabilities", &self.capabilities)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Returned by [`ByokProvider::register_model`]; call [`dispose`](Self::dispose)
/// to unregister.
pub struct RegistrationHandle {
    model_id: String,
    on_dispose: Option<Box<dyn FnOnce() + Send>>,
}

impl RegistrationHandle {
    pub fn new(model_id: impl Into<String>, on_dispose: impl FnOnce() + Send + 'static) -> Self {
        Self {
            model_id: model_id.into(),
            on_dispose: Some(Box::new(on_dispose)),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn dispose(mut self) {
        if let Some(f) = self.on_dispose.take() {
            f();
        }
    }
}

impl fmt::Debug for RegistrationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationHandle")
            .field("model_id", &self.model_id)
            .finish_non_exhaustive()
    }
}

/// Listing models from a freshly entered endpoint.
#[async_trait]
pub trait ModelDiscovery: Send + Sync {
    /// Never fails: network or parse errors produce an empty list.
    async fn fetch_models_from_endpoint(
        &self,
        endpoint: &str,
        api_key: Option<&Secret<String>>,
    ) -> Vec<ModelEntry>;
}

/// A bring-your-own-key provider adapter.
#[async_trait]
pub trait ByokProvider: Send + Sync {
    fn name(&self) -> &str;

    fn auth_type(&self) -> AuthType;

    fn family(&self) -> ProviderFamily {
        ProviderFamily::OpenAiCompatible
    }

    /// Whether capabilities must be collected from the user once a model id
    /// is known. `false` means the provider resolves them itself.
    fn needs_capabilities(&self) -> bool {
        true
    }

    /// Models the provider reports. An empty list is a valid answer.
    async fn get_all_models(&self, api_key: Option<&Secret<String>>) -> Result<Vec<ModelEntry>>;

    /// Endpoint discovery support, if any.
    fn discovery(&self) -> Option<&dyn ModelDiscovery> {
        None
    }

    /// Lightweight connectivity check against a deployment endpoint.
    async fn probe_endpoint(&self, _endpoint: &str, _api_key: &Secret<String>) -> Result<()> {
        Ok(())
    }

    /// Capabilities applied when the user skips the advanced settings.
    fn default_capabilities(&self, model_id: &str) -> Option<ModelCapabilities> {
        match self.family() {
            ProviderFamily::Azure => Some(ModelCapabilities::azure_defaults(model_id)),
            ProviderFamily::OpenAiCompatible => None,
        }
    }

    /// Final endpoint for a validated deployment URL. Only the path changes;
    /// a query such as `?api-version=` is kept.
    fn derive_endpoint(&self, url: &url::Url) -> String {
        let path = url.path().trim_end_matches('/');
        let path = match self.family() {
            ProviderFamily::Azure if !path.ends_with(CHAT_COMPLETIONS_SUFFIX) => {
                format!("{path}{CHAT_COMPLETIONS_SUFFIX}")
            },
            _ => path.to_string(),
        };
        let mut endpoint = url.clone();
        endpoint.set_path(&path);
        endpoint.set_fragment(None);
        if endpoint.query().is_some() {
            endpoint.into()
        } else {
            endpoint.as_str().trim_end_matches('/').to_string()
        }
    }

    fn register_model(&self, config: CustomModelConfig) -> Result<RegistrationHandle>;
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };

    use super::*;

    struct Fixed(ProviderFamily);

    #[async_trait]
    impl ByokProvider for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn auth_type(&self) -> AuthType {
            AuthType::PerModelDeployment
        }

        fn family(&self) -> ProviderFamily {
            self.0
        }

        async fn get_all_models(&self, _key: Option<&Secret<String>>) -> Result<Vec<ModelEntry>> {
            Ok(Vec::new())
        }

        fn register_model(&self, config: CustomModelConfig) -> Result<RegistrationHandle> {
            Ok(RegistrationHandle::new(config.id, || {}))
        }
    }

    #[test]
    fn azure_family_gets_fixed_defaults() {
        let caps = Fixed(ProviderFamily::Azure)
            .default_capabilities("gpt-4o")
            .unwrap();
        assert_eq!(caps, ModelCapabilities {
            name: "gpt-4o".into(),
            max_input_tokens: 100_000,
            max_output_tokens: 8192,
            tool_calling: true,
            vision: false,
        });
        assert!(
            Fixed(ProviderFamily::OpenAiCompatible)
                .default_capabilities("gpt-4o")
                .is_none()
        );
    }

    #[test]
    fn azure_endpoint_gets_completions_suffix() {
        let url = url::Url::parse("https://res.services.ai.azure.com/models/").unwrap();
        assert_eq!(
            Fixed(ProviderFamily::Azure).derive_endpoint(&url),
            "https://res.services.ai.azure.com/models/chat/completions"
        );
        assert_eq!(
            Fixed(ProviderFamily::OpenAiCompatible).derive_endpoint(&url),
            "https://res.services.ai.azure.com/models"
        );
    }

    #[test]
    fn azure_endpoint_keeps_api_version_query() {
        let url = url::Url::parse(
            "https://res.openai.azure.com/openai/deployments/gpt4o?api-version=2024-10-21",
        )
        .unwrap();
        assert_eq!(
            Fixed(ProviderFamily::Azure).derive_endpoint(&url),
            "https://res.openai.azure.com/openai/deployments/gpt4o/chat/completions?api-version=2024-10-21"
        );

        let url = url::Url::parse("https://api.example.com/v1/?api-version=1").unwrap();
        assert_eq!(
            Fixed(ProviderFamily::OpenAiCompatible).derive_endpoint(&url),
            "https://api.example.com/v1?api-version=1"
        );
    }

    #[test]
    fn registration_handle_runs_dispose_once() {
        let disposed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&disposed);
        let handle = RegistrationHandle::new("m", move || flag.store(true, Ordering::SeqCst));
        assert_eq!(handle.model_id(), "m");
        handle.dispose();
        assert!(disposed.load(Ordering::SeqCst));
    }

    #[test]
    fn custom_model_debug_redacts_key() {
        let cfg = CustomModelConfig {
            id: "m".into(),
            deployment_url: None,
            capabilities: None,
            api_key: Some("sk-very-secret-value".into()),
        };
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("sk-very-secret-value"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn capabilities_require_positive_limits() {
        let mut caps = ModelCapabilities::azure_defaults("m");
        assert!(caps.is_valid());
        caps.max_output_tokens = 0;
        assert!(!caps.is_valid());
    }
}
