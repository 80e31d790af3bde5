//! Step handlers. Each one reads and updates the [`FlowState`], talks to the
//! surface and collaborators, and tells the engine where to go next.

use std::sync::Arc;

use {
    byok_providers::{AuthType, ByokProvider},
    secrecy::Secret,
    tracing::{debug, info, warn},
};

use crate::{
    engine::ConfigurationFlow,
    error::{Error, Result},
    state::{
        ConfigurationStep::{self, *},
        FlowState, StepOutcome,
    },
    surface::{
        InputOptions, ItemButton, PickItem, PickOptions, PickResponse, PromptResponse,
        PromptSurface,
    },
};

/// Synthetic model-selection item that starts manual model entry.
pub const ADD_CUSTOM_ITEM: &str = "__add_custom_model__";
/// Synthetic discovered-model item for typing the id by hand.
pub const MANUAL_ITEM: &str = "__enter_manually__";

const YES: &str = "yes";
const NO: &str = "no";

pub const API_KEY_TITLE: &str = "API key";

/// Title of the prompt or picker a step shows.
pub fn title_for(step: ConfigurationStep) -> &'static str {
    match step {
        ProviderSelection => "Select a provider",
        ModelSelection => "Select models",
        ModelId => "Model ID",
        DeploymentUrl => "Deployment URL",
        ApiModelSelection => "Select a deployed model",
        AdvancedConfig => "Advanced settings",
        FriendlyName => "Display name",
        InputTokens => "Max input tokens",
        OutputTokens => "Max output tokens",
        ToolCalling => "Tool calling",
        Vision => "Vision",
        Complete => "Done",
    }
}

/// Unwrap a prompt answer, turning back and dismissal into step outcomes.
macro_rules! answer {
    ($response:expr) => {
        match $response {
            PromptResponse::Value(value) => value,
            PromptResponse::Back => return Ok(StepOutcome::Back),
            PromptResponse::Dismissed => return Ok(StepOutcome::Abort),
        }
    };
}

fn active_provider(state: &FlowState) -> Result<Arc<dyn ByokProvider>> {
    state
        .provider
        .clone()
        .ok_or_else(|| Error::configuration("no provider selected"))
}

fn require_model_id(state: &FlowState) -> Result<String> {
    state
        .model_id
        .clone()
        .ok_or_else(|| Error::configuration("model id missing"))
}

/// Where manual model entry starts for the active provider.
fn custom_entry_step(state: &FlowState) -> ConfigurationStep {
    if state.is_deployment_family() && state.is_per_model() {
        DeploymentUrl
    } else {
        ModelId
    }
}

impl<S: PromptSurface> ConfigurationFlow<S> {
    pub(crate) async fn handle(
        &mut self,
        step: ConfigurationStep,
        state: &mut FlowState,
    ) -> Result<StepOutcome> {
        match step {
            ProviderSelection => self.provider_selection(state).await,
            ModelSelection => self.model_selection(state).await,
            ModelId => self.model_id(state).await,
            DeploymentUrl => self.deployment_url(state).await,
            ApiModelSelection => self.api_model_selection(state).await,
            AdvancedConfig => self.advanced_config(state).await,
            FriendlyName => self.friendly_name(state).await,
            InputTokens => {
                let current = state.max_input_tokens;
                if let Some(n) = answer!(self.token_limit(InputTokens, current).await) {
                    state.max_input_tokens = n;
                }
                Ok(StepOutcome::Next(OutputTokens))
            },
            OutputTokens => {
                let current = state.max_output_tokens;
                if let Some(n) = answer!(self.token_limit(OutputTokens, current).await) {
                    state.max_output_tokens = n;
                }
                Ok(StepOutcome::Next(ToolCalling))
            },
            ToolCalling => {
                let default = state.tool_calling || state.is_deployment_family();
                state.tool_calling = answer!(
                    self.yes_no(ToolCalling, "Does this model support tool calling?", default)
                        .await
                );
                Ok(StepOutcome::Next(Vision))
            },
            Vision => {
                let default = state.vision;
                state.vision = answer!(
                    self.yes_no(Vision, "Does this model accept image input?", default)
                        .await
                );
                if state.assemble_capabilities().is_none() {
                    return Err(Error::configuration("model id missing"));
                }
                debug!(capabilities = ?state.model_capabilities, "capabilities assembled");
                Ok(StepOutcome::Next(Complete))
            },
            Complete => Ok(StepOutcome::Next(Complete)),
        }
    }

    fn find_provider(&self, name: &str) -> Result<Arc<dyn ByokProvider>> {
        self.providers
            .iter()
            .find(|p| p.name() == name)
            .cloned()
            .ok_or_else(|| Error::configuration(format!("unknown provider {name}")))
    }

    async fn prompt_api_key(&mut self, provider: &str, reconfigure: bool) -> PromptResponse<String> {
        let validator = self.validator.clone();
        let prompt = if reconfigure {
            format!("Enter a new API key for {provider}, or leave empty to delete the stored key")
        } else {
            format!("Enter the API key for {provider}")
        };
        let options = InputOptions::new(API_KEY_TITLE, prompt)
            .placeholder("sk-...")
            .password()
            .validate(move |input| {
                validator
                    .api_key(input, reconfigure)
                    .err()
                    .map(|e| e.to_string())
            });
        self.surface.input(options).await
    }

    /// Surfaces are not trusted to have run the inline check.
    fn checked_key(&self, raw: &str) -> Result<Secret<String>> {
        self.validator.api_key(raw, false)?;
        Ok(Secret::new(raw.trim().to_string()))
    }

    async fn yes_no(
        &mut self,
        step: ConfigurationStep,
        question: &str,
        default: bool,
    ) -> PromptResponse<bool> {
        let items = vec![
            PickItem::new(YES, "Yes").picked(default),
            PickItem::new(NO, "No").picked(!default),
        ];
        let options = PickOptions::new(title_for(step), items)
            .placeholder(question)
            .with_back();
        match self.surface.pick(options).await {
            PickResponse::Accepted(ids) => match ids.first().map(String::as_str) {
                Some(YES) => PromptResponse::Value(true),
                Some(NO) => PromptResponse::Value(false),
                _ => PromptResponse::Value(default),
            },
            PickResponse::ItemButton { .. } => PromptResponse::Value(default),
            PickResponse::Back => PromptResponse::Back,
            PickResponse::Dismissed => PromptResponse::Dismissed,
        }
    }

    /// `Value(None)` keeps the current limit.
    async fn token_limit(
        &mut self,
        step: ConfigurationStep,
        current: u32,
    ) -> PromptResponse<Option<u32>> {
        let validator = self.validator.clone();
        let prompt = match step {
            InputTokens => "Maximum input (context) tokens, empty keeps the default",
            _ => "Maximum output tokens, empty keeps the default",
        };
        let options = InputOptions::new(title_for(step), prompt)
            .placeholder(current.to_string())
            .validate(move |input| validator.token_count(input).err().map(|e| e.to_string()));
        match self.surface.input(options).await {
            PromptResponse::Value(raw) => {
                PromptResponse::Value(self.validator.token_count(&raw).ok().flatten())
            },
            PromptResponse::Back => PromptResponse::Back,
            PromptResponse::Dismissed => PromptResponse::Dismissed,
        }
    }

    async fn provider_selection(&mut self, state: &mut FlowState) -> Result<StepOutcome> {
        let mut items = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            let mut item =
                PickItem::new(provider.name(), provider.name()).picked(provider.name() == state.provider_name);
            item = match provider.auth_type() {
                AuthType::GlobalApiKey => {
                    let stored = self.credentials.get_api_key(provider.name()).await?.is_some();
                    item.description(if stored {
                        "API key stored"
                    } else {
                        "No API key yet"
                    })
                    .button(ItemButton::ReconfigureKey)
                },
                AuthType::PerModelDeployment => item.description("Key and endpoint per model"),
            };
            items.push(item);
        }

        let options = PickOptions::new(title_for(ProviderSelection), items)
            .placeholder("Choose the provider to configure");
        let chosen = match self.surface.pick(options).await {
            PickResponse::Accepted(ids) => ids,
            PickResponse::ItemButton {
                id,
                button: ItemButton::ReconfigureKey,
            } => return self.reconfigure_key(&id, state).await,
            PickResponse::ItemButton { .. } => return Ok(StepOutcome::Next(ProviderSelection)),
            PickResponse::Back => return Ok(StepOutcome::Back),
            PickResponse::Dismissed => return Ok(StepOutcome::Abort),
        };
        let Some(name) = chosen.first() else {
            return Ok(StepOutcome::Next(ProviderSelection));
        };

        let provider = self.find_provider(name)?;
        state.select_provider(Arc::clone(&provider));
        info!(provider = %provider.name(), auth_type = %provider.auth_type(), "provider selected");

        if provider.auth_type() == AuthType::PerModelDeployment {
            return Ok(StepOutcome::Next(ModelSelection));
        }
        // A key typed earlier in this run wins over the stored one.
        if state.is_new_api_key && state.model_api_key.is_some() {
            return Ok(StepOutcome::Next(ModelSelection));
        }
        if let Some(key) = self.credentials.get_api_key(provider.name()).await? {
            state.model_api_key = Some(key);
            state.is_new_api_key = false;
            return Ok(StepOutcome::Next(ModelSelection));
        }

        let key = answer!(self.prompt_api_key(provider.name(), false).await);
        state.model_api_key = Some(self.checked_key(&key)?);
        state.is_new_api_key = true;
        Ok(StepOutcome::Next(ModelSelection))
    }

    /// Replace or delete a stored key in place. The flow stays on provider
    /// selection.
    async fn reconfigure_key(&mut self, name: &str, state: &mut FlowState) -> Result<StepOutcome> {
        let provider = self.find_provider(name)?;
        let key = answer!(self.prompt_api_key(provider.name(), true).await);
        self.validator.api_key(&key, true)?;
        let key = key.trim();

        if key.is_empty() {
            self.credentials
                .delete_api_key(provider.name(), provider.auth_type())
                .await?;
        } else {
            self.credentials
                .store_api_key(
                    provider.name(),
                    &Secret::new(key.to_string()),
                    provider.auth_type(),
                )
                .await?;
        }
        info!(provider = %provider.name(), deleted = key.is_empty(), "API key reconfigured");

        if state.provider_name == provider.name() {
            state.model_api_key = None;
            state.is_new_api_key = false;
        }
        Ok(StepOutcome::Next(ProviderSelection))
    }

    async fn model_selection(&mut self, state: &mut FlowState) -> Result<StepOutcome> {
        let provider = active_provider(state)?;

        if provider.auth_type() == AuthType::GlobalApiKey && state.model_api_key.is_none() {
            let key = answer!(self.prompt_api_key(provider.name(), false).await);
            state.model_api_key = Some(self.checked_key(&key)?);
            state.is_new_api_key = true;
        }

        let key = state.model_api_key.clone();
        let listed = match provider.get_all_models(key.as_ref()).await {
            Ok(models) => models,
            Err(error) => {
                if error.is_auth_failure() {
                    state.model_api_key = None;
                    state.is_new_api_key = false;
                }
                return Err(error.into());
            },
        };
        let registered = self.models.registered_models(provider.name()).await?;

        let mut items: Vec<PickItem> = Vec::with_capacity(listed.len() + registered.len() + 1);
        for model in &listed {
            let existing = registered.iter().find(|r| r.id == model.id);
            let mut item = PickItem::new(&model.id, &model.name)
                .picked(existing.is_some() || state.selected_models.contains(&model.id));
            if model.name != model.id {
                item = item.description(&model.id);
            }
            if existing.is_some_and(|r| r.custom) {
                item = item.button(ItemButton::DeleteModel);
            }
            items.push(item);
        }
        for model in registered
            .iter()
            .filter(|r| !listed.iter().any(|m| m.id == r.id))
        {
            let mut item = PickItem::new(&model.id, &model.id).picked(true);
            item = if model.custom {
                item.description("custom model").button(ItemButton::DeleteModel)
            } else {
                item.description("registered")
            };
            items.push(item);
        }

        if items.is_empty() {
            let next = if state.navigating_back {
                ProviderSelection
            } else {
                custom_entry_step(state)
            };
            debug!(provider = %provider.name(), next = ?next, "provider has no models");
            return Ok(StepOutcome::Next(next));
        }

        items.push(
            PickItem::new(ADD_CUSTOM_ITEM, "Add custom model...")
                .description("Enter a model that is not listed"),
        );
        let options = PickOptions::new(title_for(ModelSelection), items)
            .placeholder(format!("Models to enable for {}", provider.name()))
            .many()
            .with_back();

        match self.surface.pick(options).await {
            PickResponse::Accepted(ids) => {
                let add_custom = ids.iter().any(|id| id == ADD_CUSTOM_ITEM);
                state.selected_models = ids.into_iter().filter(|id| id != ADD_CUSTOM_ITEM).collect();
                state.custom_model_to_delete = None;
                if add_custom {
                    Ok(StepOutcome::Next(custom_entry_step(state)))
                } else {
                    state.clear_custom_model();
                    Ok(StepOutcome::Next(Complete))
                }
            },
            PickResponse::ItemButton {
                id,
                button: ItemButton::DeleteModel,
            } => {
                info!(provider = %provider.name(), model = %id, "custom model marked for deletion");
                state.clear_custom_model();
                state.selected_models.clear();
                state.custom_model_to_delete = Some(id);
                Ok(StepOutcome::Next(Complete))
            },
            PickResponse::ItemButton { .. } => Ok(StepOutcome::Next(ModelSelection)),
            PickResponse::Back => Ok(StepOutcome::Back),
            PickResponse::Dismissed => Ok(StepOutcome::Abort),
        }
    }

    async fn model_id(&mut self, state: &mut FlowState) -> Result<StepOutcome> {
        let provider = active_provider(state)?;
        let validator = self.validator.clone();
        let options = InputOptions::new(
            title_for(ModelId),
            format!("Enter the model ID exactly as {} expects it", provider.name()),
        )
        .placeholder("e.g. gpt-4o")
        .value(state.model_id.clone())
        .validate(move |input| validator.model_id(input).err().map(|e| e.to_string()));

        let raw = answer!(self.surface.input(options).await);
        self.validator.model_id(&raw)?;
        state.model_id = Some(raw.trim().to_string());

        let next = if state.is_per_model() && state.deployment_url.is_none() {
            DeploymentUrl
        } else if !provider.needs_capabilities() {
            Complete
        } else {
            AdvancedConfig
        };
        Ok(StepOutcome::Next(next))
    }

    async fn deployment_url(&mut self, state: &mut FlowState) -> Result<StepOutcome> {
        let provider = active_provider(state)?;
        let strict = state.is_deployment_family();
        let validator = self.validator.clone();
        let placeholder = if strict {
            "https://<resource>.services.ai.azure.com/models"
        } else {
            "https://api.example.com/v1"
        };
        let options = InputOptions::new(
            title_for(DeploymentUrl),
            format!("Enter the endpoint URL for {}", provider.name()),
        )
        .placeholder(placeholder)
        .value(state.entered_deployment_url.clone())
        .validate(move |input| {
            validator
                .endpoint_url(input, strict)
                .err()
                .map(|e| e.to_string())
        });

        let raw = answer!(self.surface.input(options).await);
        let endpoint = self.validator.endpoint_url(&raw, strict)?;
        if endpoint.private_host {
            warn!(
                provider = %provider.name(),
                host = endpoint.url.host_str().unwrap_or_default(),
                "accepted private network endpoint"
            );
        }
        let derived = provider.derive_endpoint(&endpoint.url);
        state.entered_deployment_url = Some(raw.trim().to_string());
        state.deployment_url = Some(derived.clone());

        if state.model_api_key.is_none() {
            let key = answer!(self.prompt_api_key(provider.name(), false).await);
            state.model_api_key = Some(self.checked_key(&key)?);
            state.is_new_api_key = true;
        }

        if let Some(key) = state.model_api_key.clone() {
            match provider.probe_endpoint(&derived, &key).await {
                Ok(()) => debug!(endpoint = %derived, "endpoint probe succeeded"),
                Err(error) if error.is_auth_failure() => {
                    state.model_api_key = None;
                    state.is_new_api_key = false;
                    return Err(error.into());
                },
                // Some endpoints do not serve the probed route.
                Err(error) => warn!(
                    provider = %provider.name(),
                    endpoint = %derived,
                    error = %error,
                    "endpoint probe failed, continuing"
                ),
            }
        }

        let next = if provider.discovery().is_some() {
            ApiModelSelection
        } else if state.model_id.is_none() {
            ModelId
        } else if !provider.needs_capabilities() {
            Complete
        } else {
            AdvancedConfig
        };
        Ok(StepOutcome::Next(next))
    }

    async fn api_model_selection(&mut self, state: &mut FlowState) -> Result<StepOutcome> {
        let provider = active_provider(state)?;
        // Reached through back from AdvancedConfig: the model id was typed by
        // hand, so that prompt is the one to return to.
        let Some(discovery) = provider.discovery() else {
            return Ok(StepOutcome::Next(ModelId));
        };
        let Some(endpoint) = state.deployment_url.clone() else {
            return Ok(StepOutcome::Next(DeploymentUrl));
        };

        let models = discovery
            .fetch_models_from_endpoint(&endpoint, state.model_api_key.as_ref())
            .await;
        if models.is_empty() {
            info!(provider = %provider.name(), endpoint = %endpoint, "no models discovered");
            self.surface
                .notify(&format!(
                    "No models found at {endpoint}. Enter the model ID manually."
                ))
                .await;
            return Ok(StepOutcome::Next(ModelId));
        }

        let mut items: Vec<PickItem> = models
            .iter()
            .map(|m| {
                PickItem::new(&m.id, &m.name).picked(state.model_id.as_deref() == Some(m.id.as_str()))
            })
            .collect();
        items.push(
            PickItem::new(MANUAL_ITEM, "Enter model ID manually")
                .description("The model is not in this list"),
        );
        let options = PickOptions::new(title_for(ApiModelSelection), items)
            .placeholder(format!("Models served by {endpoint}"))
            .with_back();

        match self.surface.pick(options).await {
            PickResponse::Accepted(ids) => match ids.into_iter().next() {
                None => Ok(StepOutcome::Next(ApiModelSelection)),
                Some(id) if id == MANUAL_ITEM => Ok(StepOutcome::Next(ModelId)),
                Some(id) => {
                    state.model_id = Some(id);
                    Ok(StepOutcome::Next(AdvancedConfig))
                },
            },
            PickResponse::ItemButton { .. } => Ok(StepOutcome::Next(ApiModelSelection)),
            PickResponse::Back => Ok(StepOutcome::Back),
            PickResponse::Dismissed => Ok(StepOutcome::Abort),
        }
    }

    async fn advanced_config(&mut self, state: &mut FlowState) -> Result<StepOutcome> {
        let provider = active_provider(state)?;
        let model_id = require_model_id(state)?;
        let question = format!("Configure token limits and features for {model_id}?");
        if answer!(self.yes_no(AdvancedConfig, &question, false).await) {
            return Ok(StepOutcome::Next(FriendlyName));
        }
        state.model_capabilities = provider.default_capabilities(&model_id);
        debug!(model = %model_id, capabilities = ?state.model_capabilities, "using default capabilities");
        Ok(StepOutcome::Next(Complete))
    }

    async fn friendly_name(&mut self, state: &mut FlowState) -> Result<StepOutcome> {
        let model_id = require_model_id(state)?;
        let options = InputOptions::new(
            title_for(FriendlyName),
            "Name shown for this model, empty uses the model ID",
        )
        .placeholder(model_id.clone())
        .value(state.friendly_name.clone());

        let name = answer!(self.surface.input(options).await);
        let name = name.trim();
        state.friendly_name = Some(if name.is_empty() {
            model_id
        } else {
            name.to_string()
        });
        Ok(StepOutcome::Next(InputTokens))
    }
}
