use std::fmt;

use {
    byok_providers::{AuthType, CustomModelConfig, ModelCapabilities},
    secrecy::{ExposeSecret, Secret},
};

use crate::{
    error::{Error, Result},
    state::FlowState,
};

/// A model the user configured by hand during the flow.
#[derive(Clone)]
pub struct CustomModel {
    pub id: String,
    pub api_key: Option<Secret<String>>,
    pub model_capabilities: Option<ModelCapabilities>,
    pub deployment_url: Option<String>,
}

impl CustomModel {
    /// Registration payload. The per-model key is only carried for
    /// deployment providers; global keys live in the credential store.
    pub fn to_config(&self, auth_type: AuthType) -> CustomModelConfig {
        CustomModelConfig {
            id: self.id.clone(),
            deployment_url: self.deployment_url.clone(),
            capabilities: self.model_capabilities.clone(),
            api_key: match auth_type {
                AuthType::PerModelDeployment => {
                    self.api_key.as_ref().map(|k| k.expose_secret().clone())
                },
                AuthType::GlobalApiKey => None,
            },
        }
    }
}

impl fmt::Debug for CustomModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomModel")
            .field("id", &self.id)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model_capabilities", &self.model_capabilities)
            .field("deployment_url", &self.deployment_url)
            .finish()
    }
}

/// Handed to the caller when the flow reaches `Complete`.
#[derive(Clone, Default)]
pub struct FlowResult {
    pub selected_models: Vec<String>,
    pub provider_name: String,
    pub api_key: Option<Secret<String>>,
    pub new_api_key_provided: bool,
    pub custom_model_to_delete: Option<String>,
    pub custom_model: Option<CustomModel>,
}

impl FlowResult {
    pub fn from_state(state: FlowState) -> Self {
        let custom_model = match (&state.custom_model_to_delete, state.model_id) {
            (None, Some(id)) => Some(CustomModel {
                id,
                api_key: state.model_api_key.clone(),
                model_capabilities: state.model_capabilities,
                deployment_url: state.deployment_url,
            }),
            _ => None,
        };
        Self {
            selected_models: state.selected_models,
            provider_name: state.provider_name,
            api_key: state.model_api_key,
            new_api_key_provided: state.is_new_api_key,
            custom_model_to_delete: state.custom_model_to_delete,
            custom_model,
        }
    }

    /// Check the assembled configuration before anything is registered.
    pub fn validate(&self, auth_type: AuthType) -> Result<()> {
        if self.custom_model_to_delete.is_some() {
            return Ok(());
        }
        let Some(model) = &self.custom_model else {
            return Ok(());
        };

        if let Some(caps) = &model.model_capabilities
            && !caps.is_valid()
        {
            return Err(Error::configuration(format!(
                "model {} needs positive token limits",
                model.id
            )));
        }

        let has_key = model
            .api_key
            .as_ref()
            .or(self.api_key.as_ref())
            .is_some_and(|k| !k.expose_secret().trim().is_empty());
        if !has_key {
            return Err(Error::configuration(format!(
                "model {} has no API key",
                model.id
            )));
        }

        if auth_type == AuthType::PerModelDeployment && model.deployment_url.is_none() {
            return Err(Error::configuration(format!(
                "model {} needs a deployment URL",
                model.id
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for FlowResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowResult")
            .field("selected_models", &self.selected_models)
            .field("provider_name", &self.provider_name)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("new_api_key_provided", &self.new_api_key_provided)
            .field("custom_model_to_delete", &self.custom_model_to_delete)
            .field("custom_model", &self.custom_model)
            .finish()
    }
}
