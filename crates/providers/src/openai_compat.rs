//! Adapter for providers that speak the OpenAI REST conventions
//! (`GET {base}/models`, bearer or `api-key` header auth).

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    async_trait::async_trait,
    byok_config::ProviderSetting,
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, info, warn},
};

use crate::{
    AuthType, ByokProvider, CHAT_COMPLETIONS_SUFFIX, CustomModelConfig, Error, ModelDiscovery,
    ModelEntry, ProviderFamily, RegistrationHandle, Result, shared_http_client,
};

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, serde::Deserialize)]
struct ApiModel {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ApiModel>,
}

/// OpenAI-compatible provider. Serves both global-key catalogs and
/// per-model deployment endpoints, including the Azure family.
pub struct OpenAiCompatProvider {
    name: String,
    auth_type: AuthType,
    family: ProviderFamily,
    base_url: Option<String>,
    needs_capabilities: bool,
    probe_timeout: Duration,
    registered: Arc<Mutex<HashMap<String, CustomModelConfig>>>,
}

impl OpenAiCompatProvider {
    pub fn new(name: impl Into<String>, auth_type: AuthType) -> Self {
        Self {
            name: name.into(),
            auth_type,
            family: ProviderFamily::OpenAiCompatible,
            base_url: None,
            needs_capabilities: true,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            registered: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn from_setting(setting: &ProviderSetting, probe_timeout: Duration) -> Self {
        let mut provider = Self::new(setting.name.clone(), setting.auth_type.into())
            .with_family(setting.family.into())
            .with_needs_capabilities(setting.needs_capabilities)
            .with_probe_timeout(probe_timeout);
        provider.base_url = setting.base_url.clone();
        provider
    }

    pub fn with_family(mut self, family: ProviderFamily) -> Self {
        self.family = family;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_needs_capabilities(mut self, needs_capabilities: bool) -> Self {
        self.needs_capabilities = needs_capabilities;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Models registered through [`ByokProvider::register_model`] and not yet
    /// disposed.
    pub fn registered_models(&self) -> Vec<CustomModelConfig> {
        let mut models: Vec<_> = self
            .registered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        models.sort_by(|a, b| a.id.cmp(&b.id));
        models
    }

    fn authorize(
        &self,
        request: reqwest::RequestBuilder,
        api_key: Option<&Secret<String>>,
    ) -> reqwest::RequestBuilder {
        let Some(key) = api_key else {
            return request;
        };
        match self.family {
            ProviderFamily::Azure => request.header("api-key", key.expose_secret().as_str()),
            ProviderFamily::OpenAiCompatible => request.bearer_auth(key.expose_secret()),
        }
    }

    async fn list_models(&self, url: &str, api_key: Option<&Secret<String>>) -> Result<Vec<ModelEntry>> {
        let response = self
            .authorize(shared_http_client().get(url), api_key)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::Unauthorized {
                provider: self.name.clone(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                provider: self.name.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let payload: ModelsResponse = response.json().await?;
        let mut models: Vec<ModelEntry> = payload
            .data
            .into_iter()
            .filter(|m| !m.id.trim().is_empty())
            .map(|m| {
                let name = m.name.unwrap_or_else(|| m.id.clone());
                ModelEntry::new(m.id, name)
            })
            .collect();
        models.sort_by(|a, b| a.id.cmp(&b.id));
        models.dedup_by(|a, b| a.id == b.id);
        Ok(models)
    }
}

/// `{base}/models` for a deployment endpoint: a trailing completions path is
/// dropped, the query (e.g. `api-version`) is kept.
pub fn models_url_for_endpoint(endpoint: &str) -> String {
    let Ok(mut url) = url::Url::parse(endpoint) else {
        let trimmed = endpoint.trim_end_matches('/');
        let base = trimmed.strip_suffix(CHAT_COMPLETIONS_SUFFIX).unwrap_or(trimmed);
        return format!("{}/models", base.trim_end_matches('/'));
    };
    let path = url.path().trim_end_matches('/');
    let base = path
        .strip_suffix(CHAT_COMPLETIONS_SUFFIX)
        .unwrap_or(path)
        .trim_end_matches('/');
    let models_path = format!("{base}/models");
    url.set_path(&models_path);
    url.set_fragment(None);
    url.into()
}

#[async_trait]
impl ModelDiscovery for OpenAiCompatProvider {
    async fn fetch_models_from_endpoint(
        &self,
        endpoint: &str,
        api_key: Option<&Secret<String>>,
    ) -> Vec<ModelEntry> {
        let url = models_url_for_endpoint(endpoint);
        match self.list_models(&url, api_key).await {
            Ok(models) => {
                debug!(provider = %self.name, url = %url, count = models.len(), "discovered endpoint models");
                models
            },
            Err(e) => {
                debug!(provider = %self.name, url = %url, error = %e, "endpoint model discovery failed");
                Vec::new()
            },
        }
    }
}

#[async_trait]
impl ByokProvider for OpenAiCompatProvider {
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

    async fn get_all_models(&self, api_key: Option<&Secret<String>>) -> Result<Vec<ModelEntry>> {
        // Deployment providers have no provider-wide catalog.
        let Some(base_url) = self.base_url.as_deref() else {
            return Ok(Vec::new());
        };
        let url = format!("{}/models", base_url.trim_end_matches('/'));
        self.list_models(&url, api_key).await
    }

    fn discovery(&self) -> Option<&dyn ModelDiscovery> {
        match self.auth_type {
            AuthType::PerModelDeployment => Some(self),
            AuthType::GlobalApiKey => None,
        }
    }

    async fn probe_endpoint(&self, endpoint: &str, api_key: &Secret<String>) -> Result<()> {
        let url = models_url_for_endpoint(endpoint);
        match tokio::time::timeout(self.probe_timeout, self.list_models(&url, Some(api_key))).await
        {
            Ok(result) => result.map(|_| ()),
            Err(_) => {
                warn!(provider = %self.name, url = %url, "endpoint probe timed out");
                Err(Error::message(format!(
                    "connection timed out after {} seconds while probing {url}",
                    self.probe_timeout.as_secs()
                )))
            },
        }
    }

    fn register_model(&self, config: CustomModelConfig) -> Result<RegistrationHandle> {
        let id = config.id.trim().to_string();
        if id.is_empty() {
            return Err(Error::message("cannot register a model without an id"));
        }
        self.registered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.clone(), config);
        info!(provider = %self.name, model = %id, "registered custom model");

        let registered = Arc::clone(&self.registered);
        let provider = self.name.clone();
        let model = id.clone();
        Ok(RegistrationHandle::new(id, move || {
            registered
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&model);
            debug!(provider = %provider, model = %model, "unregistered custom model");
        }))
    }
}
