//! Step tags and the state record threaded through one configuration run.

use std::{fmt, sync::Arc};

use {
    byok_config::FlowConfig,
    byok_providers::{AuthType, ByokProvider, ModelCapabilities, ProviderFamily},
    secrecy::Secret,
};

/// Steps of the configuration flow. `ProviderSelection` is the only initial
/// step and `Complete` the only terminal one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigurationStep {
    ProviderSelection,
    ModelSelection,
    ModelId,
    DeploymentUrl,
    ApiModelSelection,
    AdvancedConfig,
    FriendlyName,
    InputTokens,
    OutputTokens,
    ToolCalling,
    Vision,
    Complete,
}

impl ConfigurationStep {
    pub const ALL: [Self; 12] = [
        Self::ProviderSelection,
        Self::ModelSelection,
        Self::ModelId,
        Self::DeploymentUrl,
        Self::ApiModelSelection,
        Self::AdvancedConfig,
        Self::FriendlyName,
        Self::InputTokens,
        Self::OutputTokens,
        Self::ToolCalling,
        Self::Vision,
        Self::Complete,
    ];

    pub fn is_terminal(self) -> bool {
        self == Self::Complete
    }
}

/// What a step handler asks the engine to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Next(ConfigurationStep),
    Back,
    /// The user dismissed a prompt; the whole flow ends without a result.
    Abort,
}

/// Accumulated answers of one configuration run.
#[derive(Clone)]
pub struct FlowState {
    pub provider_name: String,
    pub provider: Option<Arc<dyn ByokProvider>>,
    pub model_id: Option<String>,
    pub deployment_url: Option<String>,
    pub friendly_name: Option<String>,
    pub model_api_key: Option<Secret<String>>,
    /// The key was entered during this run and should be persisted.
    pub is_new_api_key: bool,
    pub custom_model_to_delete: Option<String>,
    pub model_capabilities: Option<ModelCapabilities>,
    pub max_input_tokens: u32,
    pub max_output_tokens: u32,
    pub tool_calling: bool,
    pub vision: bool,
    pub selected_models: Vec<String>,
    pub previous_step: ConfigurationStep,
    pub navigating_back: bool,
    /// Deployment URL as typed, used to pre-fill the prompt on re-entry.
    pub(crate) entered_deployment_url: Option<String>,
    defaults: (u32, u32),
}

impl Default for FlowState {
    fn default() -> Self {
        Self::new(&FlowConfig::default())
    }
}

impl FlowState {
    pub fn new(flow: &FlowConfig) -> Self {
        Self {
            provider_name: String::new(),
            provider: None,
            model_id: None,
            deployment_url: None,
            friendly_name: None,
            model_api_key: None,
            is_new_api_key: false,
            custom_model_to_delete: None,
            model_capabilities: None,
            max_input_tokens: flow.default_max_input_tokens,
            max_output_tokens: flow.default_max_output_tokens,
            tool_calling: false,
            vision: false,
            selected_models: Vec::new(),
            previous_step: ConfigurationStep::ProviderSelection,
            navigating_back: false,
            entered_deployment_url: None,
            defaults: (
                flow.default_max_input_tokens,
                flow.default_max_output_tokens,
            ),
        }
    }

    pub fn auth_type(&self) -> Option<AuthType> {
        self.provider.as_ref().map(|p| p.auth_type())
    }

    pub fn is_per_model(&self) -> bool {
        self.auth_type() == Some(AuthType::PerModelDeployment)
    }

    /// Deployment-URL style provider (Azure family).
    pub fn is_deployment_family(&self) -> bool {
        self.provider
            .as_ref()
            .is_some_and(|p| p.family() == ProviderFamily::Azure)
    }

    /// Forget everything that describes a single custom model.
    pub fn clear_custom_model(&mut self) {
        self.model_id = None;
        self.deployment_url = None;
        self.entered_deployment_url = None;
        self.friendly_name = None;
        self.model_capabilities = None;
        (self.max_input_tokens, self.max_output_tokens) = self.defaults;
        self.tool_calling = false;
        self.vision = false;
    }

    /// Switch to another provider, dropping all answers given for the old one.
    pub fn select_provider(&mut self, provider: Arc<dyn ByokProvider>) {
        if self.provider_name != provider.name() {
            self.clear_custom_model();
            self.selected_models.clear();
            self.custom_model_to_delete = None;
            self.model_api_key = None;
            self.is_new_api_key = false;
        }
        self.provider_name = provider.name().to_string();
        self.provider = Some(provider);
    }

    /// Fold the scratch fields into the final capability record.
    pub fn assemble_capabilities(&mut self) -> Option<&ModelCapabilities> {
        let model_id = self.model_id.as_deref()?;
        let name = self
            .friendly_name
            .clone()
            .unwrap_or_else(|| model_id.to_string());
        self.model_capabilities = Some(ModelCapabilities {
            name,
            max_input_tokens: self.max_input_tokens,
            max_output_tokens: self.max_output_tokens,
            tool_calling: self.tool_calling,
            vision: self.vision,
        });
        self.model_capabilities.as_ref()
    }
}

impl fmt::Debug for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowState")
            .field("provider_name", &self.provider_name)
            .field("model_id", &self.model_id)
            .field("deployment_url", &self.deployment_url)
            .field("friendly_name", &self.friendly_name)
            .field(
                "model_api_key",
                &self.model_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("is_new_api_key", &self.is_new_api_key)
            .field("custom_model_to_delete", &self.custom_model_to_delete)
            .field("model_capabilities", &self.model_capabilities)
            .field("max_input_tokens", &self.max_input_tokens)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("tool_calling", &self.tool_calling)
            .field("vision", &self.vision)
            .field("selected_models", &self.selected_models)
            .field("previous_step", &self.previous_step)
            .field("navigating_back", &self.navigating_back)
            .finish_non_exhaustive()
    }
}

/// The step a back signal returns to, recomputed before every handler runs.
///
/// A single remembered predecessor is enough because every step has at most
/// one meaningful predecessor for a given state. Only `AdvancedConfig` depends
/// on the state, on which of model id and deployment URL are already known.
pub fn previous_step_for(step: ConfigurationStep, state: &FlowState) -> ConfigurationStep {
    use ConfigurationStep::*;

    match step {
        ProviderSelection | ModelSelection => ProviderSelection,
        ModelId | DeploymentUrl => ModelSelection,
        ApiModelSelection => DeploymentUrl,
        AdvancedConfig => match (state.model_id.is_some(), state.deployment_url.is_some()) {
            (true, true) => ApiModelSelection,
            (false, true) => DeploymentUrl,
            _ => ModelId,
        },
        FriendlyName => AdvancedConfig,
        InputTokens => FriendlyName,
        OutputTokens => InputTokens,
        ToolCalling => OutputTokens,
        Vision => ToolCalling,
        Complete => Complete,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, ConfigurationStep::*};

    #[test]
    fn fixed_predecessors() {
        let state = FlowState::default();
        let expected = [
            (ProviderSelection, ProviderSelection),
            (ModelSelection, ProviderSelection),
            (ModelId, ModelSelection),
            (DeploymentUrl, ModelSelection),
            (ApiModelSelection, DeploymentUrl),
            (FriendlyName, AdvancedConfig),
            (InputTokens, FriendlyName),
            (OutputTokens, InputTokens),
            (ToolCalling, OutputTokens),
            (Vision, ToolCalling),
        ];
        for (step, previous) in expected {
            assert_eq!(previous_step_for(step, &state), previous, "{step:?}");
        }
    }

    #[test]
    fn advanced_config_predecessor_depends_on_state() {
        let mut state = FlowState::default();
        assert_eq!(previous_step_for(AdvancedConfig, &state), ModelId);

        state.model_id = Some("gpt-4o".into());
        assert_eq!(previous_step_for(AdvancedConfig, &state), ModelId);

        state.deployment_url = Some("https://x.example.com/v1".into());
        assert_eq!(previous_step_for(AdvancedConfig, &state), ApiModelSelection);

        state.model_id = None;
        assert_eq!(previous_step_for(AdvancedConfig, &state), DeploymentUrl);
    }

    #[test]
    fn defaults_come_from_flow_config() {
        let state = FlowState::new(&FlowConfig {
            default_max_input_tokens: 32_000,
            default_max_output_tokens: 4096,
            ..FlowConfig::default()
        });
        assert_eq!(state.max_input_tokens, 32_000);
        assert_eq!(state.max_output_tokens, 4096);
        assert!(!state.tool_calling);
        assert!(!state.vision);
    }

    #[test]
    fn clear_custom_model_restores_defaults() {
        let mut state = FlowState::default();
        state.model_id = Some("m".into());
        state.max_input_tokens = 5;
        state.vision = true;
        state.clear_custom_model();
        assert!(state.model_id.is_none());
        assert_eq!(state.max_input_tokens, 100_000);
        assert!(!state.vision);
    }

    #[test]
    fn debug_redacts_api_key() {
        let state = FlowState {
            model_api_key: Some(Secret::new("sk-super-secret-123".into())),
            ..FlowState::default()
        };
        let rendered = format!("{state:?}");
        assert!(!rendered.contains("sk-super-secret-123"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn only_complete_is_terminal() {
        let terminal: Vec<_> = ConfigurationStep::ALL
            .into_iter()
            .filter(|s| s.is_terminal())
            .collect();
        assert_eq!(terminal, vec![Complete]);
    }
}
