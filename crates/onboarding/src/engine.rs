//! The transition loop driving a configuration run.

use std::sync::Arc;

use {
    byok_config::FlowConfig,
    byok_provider_setup::{CredentialStore, ModelStore, Validator},
    byok_providers::ByokProvider,
    tracing::{debug, info},
};

use crate::{
    recovery::recover,
    result::FlowResult,
    state::{ConfigurationStep, FlowState, StepOutcome, previous_step_for},
    surface::PromptSurface,
};

/// One configurable flow bound to its collaborators.
pub struct ConfigurationFlow<S> {
    pub(crate) surface: S,
    pub(crate) providers: Vec<Arc<dyn ByokProvider>>,
    pub(crate) credentials: Arc<dyn CredentialStore>,
    pub(crate) models: Arc<dyn ModelStore>,
    pub(crate) validator: Validator,
    pub(crate) flow: FlowConfig,
}

impl<S: PromptSurface> ConfigurationFlow<S> {
    pub fn new(
        surface: S,
        providers: Vec<Arc<dyn ByokProvider>>,
        credentials: Arc<dyn CredentialStore>,
        models: Arc<dyn ModelStore>,
    ) -> Self {
        Self {
            surface,
            providers,
            credentials,
            models,
            validator: Validator::default(),
            flow: FlowConfig::default(),
        }
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_flow_config(mut self, flow: FlowConfig) -> Self {
        self.flow = flow;
        self
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    /// Run the flow from `ProviderSelection` until `Complete`.
    ///
    /// Returns `None` when the user dismissed a prompt on the way.
    pub async fn run(&mut self) -> Option<FlowResult> {
        let state = self.run_to_completion(FlowState::new(&self.flow)).await?;
        Some(FlowResult::from_state(state))
    }

    pub(crate) async fn run_to_completion(&mut self, mut state: FlowState) -> Option<FlowState> {
        let mut current = ConfigurationStep::ProviderSelection;

        while !current.is_terminal() {
            state.previous_step = previous_step_for(current, &state);
            // Handlers may rewrite `previous_step`; back always uses this one.
            let previous_before_handler = state.previous_step;
            debug!(
                step = ?current,
                previous = ?previous_before_handler,
                navigating_back = state.navigating_back,
                "entering configuration step"
            );

            let outcome = match self.handle(current, &mut state).await {
                Ok(outcome) => outcome,
                Err(error) => recover(&mut self.surface, current, &error).await,
            };

            match outcome {
                StepOutcome::Next(next) => {
                    debug!(from = ?current, to = ?next, "advancing");
                    state.navigating_back = false;
                    current = next;
                },
                StepOutcome::Back => {
                    let target = if current == ConfigurationStep::DeploymentUrl
                        && state.is_deployment_family()
                    {
                        ConfigurationStep::ModelSelection
                    } else {
                        previous_before_handler
                    };
                    debug!(from = ?current, to = ?target, "navigating back");
                    state.navigating_back = true;
                    current = target;
                },
                StepOutcome::Abort => {
                    info!(step = ?current, provider = %state.provider_name, "configuration dismissed");
                    return None;
                },
            }
        }

        info!(
            provider = %state.provider_name,
            models = state.selected_models.len(),
            custom_model = ?state.model_id,
            delete = ?state.custom_model_to_delete,
            "configuration complete"
        );
        Some(state)
    }
}
