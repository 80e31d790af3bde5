/// Config schema types for the BYOK setup flow, validation rules and the
/// provider catalog.
use serde::{Deserialize, Serialize};

/// Root configuration (`byok.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ByokConfig {
    pub flow: FlowConfig,
    pub validation: ValidationConfig,
    /// Providers offered at the provider selection step. Empty means the
    /// built-in catalog is used.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<ProviderSetting>,
}

impl ByokConfig {
    /// Providers from the config file, or the built-in catalog when none are
    /// configured.
    pub fn effective_providers(&self) -> Vec<ProviderSetting> {
        if self.providers.is_empty() {
            builtin_providers()
        } else {
            self.providers.clone()
        }
    }
}

/// Defaults used while walking the configuration steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    pub default_max_input_tokens: u32,
    pub default_max_output_tokens: u32,
    /// Upper bound for the endpoint connectivity probe.
    pub probe_timeout_secs: u64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            default_max_input_tokens: 100_000,
            default_max_output_tokens: 8192,
            probe_timeout_secs: 10,
        }
    }
}

/// Input validation rules applied to credentials and model identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub min_api_key_length: usize,
    pub max_model_id_length: usize,
    /// Case-insensitive substrings that mark a pasted key as a placeholder.
    pub placeholder_keys: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_api_key_length: 10,
            max_model_id_length: 100,
            placeholder_keys: ["your-api-key", "api-key-here", "replace-me", "example-key"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// How a provider authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthTypeSetting {
    /// One key for every model of the provider.
    GlobalApiKey,
    /// Each model has its own endpoint URL and key.
    PerModelDeployment,
}

/// Endpoint conventions of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderFamilySetting {
    #[default]
    OpenaiCompatible,
    /// Deployment-URL style provider (Azure AI Foundry / Azure OpenAI).
    Azure,
}

/// One `[[providers]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSetting {
    pub name: String,
    pub auth_type: AuthTypeSetting,
    #[serde(default)]
    pub family: ProviderFamilySetting,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Whether the user has to describe model capabilities after entering a
    /// model id. Providers that resolve capabilities themselves set `false`.
    #[serde(default = "default_true")]
    pub needs_capabilities: bool,
}

fn default_true() -> bool {
    true
}

fn builtin_providers() -> Vec<ProviderSetting> {
    let global = |name: &str, base_url: &str, needs_capabilities: bool| ProviderSetting {
        name: name.into(),
        auth_type: AuthTypeSetting::GlobalApiKey,
        family: ProviderFamilySetting::OpenaiCompatible,
        base_url: Some(base_url.into()),
        needs_capabilities,
    };
    vec![
        global("OpenAI", "https://api.openai.com/v1", true),
        global("OpenRouter", "https://openrouter.ai/api/v1", false),
        global("Groq", "https://api.groq.com/openai/v1", true),
        ProviderSetting {
            name: "Azure".into(),
            auth_type: AuthTypeSetting::PerModelDeployment,
            family: ProviderFamilySetting::Azure,
            base_url: None,
            needs_capabilities: true,
        },
        ProviderSetting {
            name: "CustomOAI".into(),
            auth_type: AuthTypeSetting::PerModelDeployment,
            family: ProviderFamilySetting::OpenaiCompatible,
            base_url: None,
            needs_capabilities: true,
        },
    ]
}
