//! Scripted surface and in-memory collaborators for driving the flow in tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};

use {
    async_trait::async_trait,
    byok_provider_setup::{CredentialStore, ModelStore, RegisteredModel},
    byok_providers::{
        AuthType, ByokProvider, CustomModelConfig, ModelDiscovery, ModelEntry, ProviderFamily,
        RegistrationHandle,
    },
    secrecy::{ExposeSecret, Secret},
};

use crate::surface::{
    ErrorModal, InputOptions, ItemButton, ModalAction, PickOptions, PickResponse,
    PromptResponse, PromptSurface,
};

/// One scripted user reaction.
#[derive(Debug, Clone)]
pub enum Scripted {
    Text(String),
    /// Answer an input without running its validator.
    Unchecked(String),
    Pick(Vec<String>),
    /// Accept whatever the picker pre-selected.
    PickDefault,
    Button(String, ItemButton),
    Back,
    Dismiss,
    Modal(Option<ModalAction>),
}

impl Scripted {
    pub fn text(value: &str) -> Self {
        Self::Text(value.to_string())
    }

    pub fn pick<const N: usize>(ids: [&str; N]) -> Self {
        Self::Pick(ids.iter().map(|s| s.to_string()).collect())
    }

    pub fn pick_default() -> Self {
        Self::PickDefault
    }

    pub fn button(id: &str, button: ItemButton) -> Self {
        Self::Button(id.to_string(), button)
    }
}

/// Replays a script and records everything the flow showed. Running out of
/// script dismisses.
#[derive(Default)]
pub struct ScriptedSurface {
    script: VecDeque<Scripted>,
    /// Titles of every prompt and picker, in order.
    pub titles: Vec<String>,
    pub inputs: Vec<InputOptions>,
    pub picks: Vec<PickOptions>,
    pub modals: Vec<ErrorModal>,
    pub notifications: Vec<String>,
    pub validation_errors: Vec<String>,
}

impl ScriptedSurface {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: script.into(),
            ..Self::default()
        }
    }

    pub fn last_step_title(&self) -> &str {
        self.titles.last().map(String::as_str).unwrap_or_default()
    }
}

#[async_trait]
impl PromptSurface for ScriptedSurface {
    async fn input(&mut self, options: InputOptions) -> PromptResponse<String> {
        self.titles.push(options.title.clone());
        self.inputs.push(options.clone());
        loop {
            match self.script.pop_front() {
                Some(Scripted::Text(text)) => {
                    let value = match (&options.value, text.is_empty()) {
                        (Some(default), true) => default.clone(),
                        _ => text,
                    };
                    if let Some(error) = options.check(&value) {
                        self.validation_errors.push(error);
                        continue;
                    }
                    return PromptResponse::Value(value);
                },
                Some(Scripted::Unchecked(text)) => return PromptResponse::Value(text),
                Some(Scripted::Back) => return PromptResponse::Back,
                None | Some(Scripted::Dismiss) => return PromptResponse::Dismissed,
                Some(other) => panic!("input {:?} got {other:?}", options.title),
            }
        }
    }

    async fn pick(&mut self, options: PickOptions) -> PickResponse {
        self.titles.push(options.title.clone());
        self.picks.push(options.clone());
        match self.script.pop_front() {
            Some(Scripted::Pick(ids)) => PickResponse::Accepted(ids),
            Some(Scripted::PickDefault) => PickResponse::Accepted(options.preselected()),
            Some(Scripted::Button(id, button)) => PickResponse::ItemButton { id, button },
            Some(Scripted::Back) => PickResponse::Back,
            Some(other @ (Scripted::Text(_) | Scripted::Unchecked(_) | Scripted::Modal(_))) => {
                panic!("picker {:?} got {other:?}", options.title)
            },
            None | Some(Scripted::Dismiss) => PickResponse::Dismissed,
        }
    }

    async fn show_error(&mut self, modal: ErrorModal) -> Option<ModalAction> {
        self.modals.push(modal.clone());
        match self.script.pop_front() {
            Some(Scripted::Modal(action)) => action,
            Some(other) => panic!("modal {:?} got {other:?}", modal.title),
            None => None,
        }
    }

    async fn notify(&mut self, message: &str) {
        self.notifications.push(message.to_string());
    }
}

/// Provider double with switchable failure modes.
pub struct FakeProvider {
    name: String,
    auth_type: AuthType,
    family: ProviderFamily,
    needs_capabilities: bool,
    models: Vec<ModelEntry>,
    discovered: Option<Vec<ModelEntry>>,
    listing_failures: Mutex<Vec<String>>,
    reject_key: bool,
    bad_probe_key: Option<String>,
    unreachable_probe: bool,
}

impl FakeProvider {
    fn new(name: &str, auth_type: AuthType) -> Self {
        Self {
            name: name.to_string(),
            auth_type,
            family: ProviderFamily::OpenAiCompatible,
            needs_capabilities: true,
            models: Vec::new(),
            discovered: None,
            listing_failures: Mutex::new(Vec::new()),
            reject_key: false,
            bad_probe_key: None,
            unreachable_probe: false,
        }
    }

    pub fn global(name: &str) -> Self {
        Self::new(name, AuthType::GlobalApiKey)
    }

    pub fn per_model(name: &str) -> Self {
        Self::new(name, AuthType::PerModelDeployment)
    }

    pub fn with_models(mut self, models: Vec<ModelEntry>) -> Self {
        self.models = models;
        self
    }

    pub fn with_family(mut self, family: ProviderFamily) -> Self {
        self.family = family;
        self
    }

    /// Enables discovery, answering with `models`.
    pub fn with_discovered(mut self, models: Vec<ModelEntry>) -> Self {
        self.discovered = Some(models);
        self
    }

    pub fn without_capabilities(mut self) -> Self {
        self.needs_capabilities = false;
        self
    }

    pub fn failing_once(self, message: &str) -> Self {
        self.listing_failures
            .lock()
            .unwrap()
            .push(message.to_string());
        self
    }

    pub fn rejecting_key(mut self) -> Self {
        self.reject_key = true;
        self
    }

    pub fn rejecting_probe_key(mut self, key: &str) -> Self {
        self.bad_probe_key = Some(key.to_string());
        self
    }

    pub fn unreachable_probe(mut self) -> Self {
        self.unreachable_probe = true;
        self
    }
}

#[async_trait]
impl ModelDiscovery for FakeProvider {
    async fn fetch_models_from_endpoint(
        &self,
        _endpoint: &str,
        _api_key: Option<&Secret<String>>,
    ) -> Vec<ModelEntry> {
        self.discovered.clone().unwrap_or_default()
    }
}

#[async_trait]
impl ByokProvider for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn auth_type(&self) -> AuthType {
        self.auth_type
    }

    fn family(&self) -> ProviderFamily {
        self.family
    }

    fn needs_capabilities(&self) -> bool {
        self.needs_capabilities
    }

    async fn get_all_models(
        &self,
        _api_key: Option<&Secret<String>>,
    ) -> byok_providers::Result<Vec<ModelEntry>> {
        if self.reject_key {
            return Err(byok_providers::Error::Unauthorized {
                provider: self.name.clone(),
                status: 401,
            });
        }
        if let Some(message) = self.listing_failures.lock().unwrap().pop() {
            return Err(byok_providers::Error::message(message));
        }
        Ok(self.models.clone())
    }

    fn discovery(&self) -> Option<&dyn ModelDiscovery> {
        self.discovered
            .as_ref()
            .map(|_| self as &dyn ModelDiscovery)
    }

    async fn probe_endpoint(
        &self,
        endpoint: &str,
        api_key: &Secret<String>,
    ) -> byok_providers::Result<()> {
        if self.bad_probe_key.as_deref() == Some(api_key.expose_secret().as_str()) {
            return Err(byok_providers::Error::Unauthorized {
                provider: self.name.clone(),
                status: 401,
            });
        }
        if self.unreachable_probe {
            return Err(byok_providers::Error::message(format!(
                "connection timed out after 10 seconds while probing {endpoint}"
            )));
        }
        Ok(())
    }

    fn register_model(
        &self,
        config: CustomModelConfig,
    ) -> byok_providers::Result<RegistrationHandle> {
        Ok(RegistrationHandle::new(config.id, || {}))
    }
}

/// Credential and model store kept in memory.
#[derive(Default)]
pub struct MemoryStore {
    keys: Mutex<HashMap<String, String>>,
    models: Mutex<HashMap<String, Vec<RegisteredModel>>>,
    writes: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn put_key(&self, provider: &str, key: &str) {
        self.keys
            .lock()
            .unwrap()
            .insert(provider.to_string(), key.to_string());
    }

    pub fn key(&self, provider: &str) -> Option<String> {
        self.keys.lock().unwrap().get(provider).cloned()
    }

    pub fn put_model(&self, provider: &str, id: &str, custom: bool) {
        self.models
            .lock()
            .unwrap()
            .entry(provider.to_string())
            .or_default()
            .push(RegisteredModel {
                id: id.to_string(),
                custom,
            });
    }

    /// Credential writes made through the store contract.
    pub fn key_writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get_api_key(
        &self,
        provider: &str,
    ) -> byok_provider_setup::Result<Option<Secret<String>>> {
        Ok(self.key(provider).map(Secret::new))
    }

    async fn store_api_key(
        &self,
        provider: &str,
        api_key: &Secret<String>,
        _auth_type: AuthType,
    ) -> byok_provider_setup::Result<()> {
        self.put_key(provider, api_key.expose_secret());
        self.writes.lock().unwrap().push(format!("store {provider}"));
        Ok(())
    }

    async fn delete_api_key(
        &self,
        provider: &str,
        _auth_type: AuthType,
    ) -> byok_provider_setup::Result<()> {
        self.keys.lock().unwrap().remove(provider);
        self.writes.lock().unwrap().push(format!("delete {provider}"));
        Ok(())
    }
}

#[async_trait]
impl ModelStore for MemoryStore {
    async fn registered_models(
        &self,
        provider: &str,
    ) -> byok_provider_setup::Result<Vec<RegisteredModel>> {
        Ok(self
            .models
            .lock()
            .unwrap()
            .get(provider)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_selected_models(
        &self,
        provider: &str,
        models: &[String],
    ) -> byok_provider_setup::Result<()> {
        let mut all = self.models.lock().unwrap();
        let entry = all.entry(provider.to_string()).or_default();
        entry.retain(|m| m.custom);
        entry.extend(models.iter().map(|id| RegisteredModel {
            id: id.clone(),
            custom: false,
        }));
        Ok(())
    }

    async fn save_custom_model(
        &self,
        provider: &str,
        model: CustomModelConfig,
    ) -> byok_provider_setup::Result<()> {
        self.put_model(provider, &model.id, true);
        Ok(())
    }

    async fn custom_models(
        &self,
        provider: &str,
    ) -> byok_provider_setup::Result<Vec<CustomModelConfig>> {
        Ok(self
            .registered_models(provider)
            .await?
            .into_iter()
            .filter(|m| m.custom)
            .map(|m| CustomModelConfig {
                id: m.id,
                deployment_url: None,
                capabilities: None,
                api_key: None,
            })
            .collect())
    }

    async fn remove_model(&self, provider: &str, model_id: &str) -> byok_provider_setup::Result<bool> {
        let mut all = self.models.lock().unwrap();
        let Some(entry) = all.get_mut(provider) else {
            return Ok(false);
        };
        let before = entry.len();
        entry.retain(|m| m.id != model_id);
        Ok(entry.len() != before)
    }
}
