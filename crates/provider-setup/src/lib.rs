//! Credential and model persistence for bring-your-own-key providers, plus
//! the validation rules applied to user input.

pub mod error;
pub mod validate;

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use {
    async_trait::async_trait,
    byok_providers::{AuthType, CustomModelConfig},
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, info, warn},
};

pub use {
    error::{Error, Result},
    validate::{EndpointUrl, ValidationError, Validator},
};

// ── Collaborator contracts ─────────────────────────────────────────────────

/// Secret storage keyed by provider name. Writes are last-writer-wins.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_api_key(&self, provider: &str) -> Result<Option<Secret<String>>>;
    async fn store_api_key(
        &self,
        provider: &str,
        api_key: &Secret<String>,
        auth_type: AuthType,
    ) -> Result<()>;
    async fn delete_api_key(&self, provider: &str, auth_type: AuthType) -> Result<()>;
}

/// A model the user registered earlier for a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredModel {
    pub id: String,
    /// Added by hand (as opposed to picked from the provider's list).
    pub custom: bool,
}

/// Persistence of the models registered per provider.
#[async_trait]
pub trait ModelStore: Send + Sync {
    async fn registered_models(&self, provider: &str) -> Result<Vec<RegisteredModel>>;
    async fn save_selected_models(&self, provider: &str, models: &[String]) -> Result<()>;
    async fn save_custom_model(&self, provider: &str, model: CustomModelConfig) -> Result<()>;
    async fn custom_models(&self, provider: &str) -> Result<Vec<CustomModelConfig>>;
    /// Returns whether a model was removed.
    async fn remove_model(&self, provider: &str, model_id: &str) -> Result<bool>;
}

// ── Key store ──────────────────────────────────────────────────────────────

/// Per-provider stored configuration.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_models: Vec<CustomModelConfig>,
}

fn normalize_model_list(models: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for model in models {
        let trimmed = model.trim();
        if trimmed.is_empty() || out.iter().any(|existing| existing == trimmed) {
            continue;
        }
        out.push(trimmed.to_string());
    }
    out
}

/// File-based provider storage at `<config dir>/provider_keys.json`.
/// Implements both [`CredentialStore`] and [`ModelStore`].
#[derive(Debug, Clone)]
pub struct KeyStore {
    inner: Arc<Mutex<KeyStoreInner>>,
}

#[derive(Debug)]
struct KeyStoreInner {
    path: PathBuf,
}

impl Default for KeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStore {
    pub fn new() -> Self {
        let path = byok_config::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config/byok"))
            .join("provider_keys.json");
        Self::with_path(path)
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            inner: Arc::new(Mutex::new(KeyStoreInner { path })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, KeyStoreInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn path(&self) -> PathBuf {
        self.lock().path.clone()
    }

    fn load_all_from_path(path: &PathBuf) -> HashMap<String, ProviderRecord> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(error) => {
                if error.kind() != std::io::ErrorKind::NotFound {
                    warn!(
                        path = %path.display(),
                        error = %error,
                        "failed to read provider key store"
                    );
                }
                return HashMap::new();
            },
        };

        match serde_json::from_str(&content) {
            Ok(records) => records,
            Err(error) => {
                warn!(
                    path = %path.display(),
                    error = %error,
                    "provider key store is invalid JSON and will be ignored"
                );
                HashMap::new()
            },
        }
    }

    pub fn load_all(&self) -> HashMap<String, ProviderRecord> {
        let guard = self.lock();
        Self::load_all_from_path(&guard.path)
    }

    pub fn load(&self, provider: &str) -> Option<ProviderRecord> {
        self.load_all().remove(provider)
    }

    fn save_all_to_path(path: &PathBuf, records: &HashMap<String, ProviderRecord>) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).inspect_err(|error| {
                warn!(
                    path = %parent.display(),
                    error = %error,
                    "failed to create provider key store directory"
                );
            })?;
        }
        let data = serde_json::to_string_pretty(records)?;

        // Temp file + rename so readers never observe partially-written JSON.
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let temp_path = path.with_extension(format!("json.tmp.{nanos}"));
        std::fs::write(&temp_path, &data)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600));
        }

        std::fs::rename(&temp_path, path).inspect_err(|error| {
            warn!(
                temp_path = %temp_path.display(),
                path = %path.display(),
                error = %error,
                "failed to atomically replace provider key store"
            );
        })?;
        Ok(())
    }

    /// Load, mutate one provider's record, save. Empty records are dropped.
    fn update<T>(&self, provider: &str, f: impl FnOnce(&mut ProviderRecord) -> T) -> Result<T> {
        let guard = self.lock();
        let mut records = Self::load_all_from_path(&guard.path);
        let entry = records.entry(provider.to_string()).or_default();
        let out = f(entry);
        if entry.api_key.is_none() && entry.models.is_empty() && entry.custom_models.is_empty() {
            records.remove(provider);
        }
        Self::save_all_to_path(&guard.path, &records)?;
        Ok(out)
    }
}

#[async_trait]
impl CredentialStore for KeyStore {
    async fn get_api_key(&self, provider: &str) -> Result<Option<Secret<String>>> {
        Ok(self
            .load(provider)
            .and_then(|r| r.api_key)
            .filter(|k| !k.trim().is_empty())
            .map(Secret::new))
    }

    async fn store_api_key(
        &self,
        provider: &str,
        api_key: &Secret<String>,
        auth_type: AuthType,
    ) -> Result<()> {
        let key = api_key.expose_secret().trim().to_string();
        if key.is_empty() {
            return Err(Error::message("refusing to store an empty API key"));
        }
        self.update(provider, |record| record.api_key = Some(key))?;
        info!(provider, auth_type = %auth_type, "stored API key");
        Ok(())
    }

    async fn delete_api_key(&self, provider: &str, auth_type: AuthType) -> Result<()> {
        let removed = self.update(provider, |record| record.api_key.take().is_some())?;
        info!(provider, auth_type = %auth_type, removed, "deleted API key");
        Ok(())
    }
}

#[async_trait]
impl ModelStore for KeyStore {
    async fn registered_models(&self, provider: &str) -> Result<Vec<RegisteredModel>> {
        let Some(record) = self.load(provider) else {
            return Ok(Vec::new());
        };
        let mut models: Vec<RegisteredModel> = normalize_model_list(record.models)
            .into_iter()
            .map(|id| RegisteredModel { id, custom: false })
            .collect();
        for custom in record.custom_models {
            if let Some(existing) = models.iter_mut().find(|m| m.id == custom.id) {
                existing.custom = true;
            } else {
                models.push(RegisteredModel {
                    id: custom.id,
                    custom: true,
                });
            }
        }
        Ok(models)
    }

    async fn save_selected_models(&self, provider: &str, models: &[String]) -> Result<()> {
        let models = normalize_model_list(models.iter().cloned());
        let count = models.len();
        self.update(provider, |record| record.models = models)?;
        debug!(provider, count, "saved selected models");
        Ok(())
    }

    async fn save_custom_model(&self, provider: &str, model: CustomModelConfig) -> Result<()> {
        let id = model.id.trim().to_string();
        if id.is_empty() {
            return Err(Error::message("custom model id cannot be empty"));
        }
        self.update(provider, |record| {
            record.custom_models.retain(|m| m.id != id);
            record.custom_models.push(CustomModelConfig { id: id.clone(), ..model });
        })?;
        info!(provider, model = %id, "saved custom model");
        Ok(())
    }

    async fn custom_models(&self, provider: &str) -> Result<Vec<CustomModelConfig>> {
        Ok(self
            .load(provider)
            .map(|r| r.custom_models)
            .unwrap_or_default())
    }

    async fn remove_model(&self, provider: &str, model_id: &str) -> Result<bool> {
        let removed = self.update(provider, |record| {
            let before = record.models.len() + record.custom_models.len();
            record.models.retain(|m| m != model_id);
            record.custom_models.retain(|m| m.id != model_id);
            before != record.models.len() + record.custom_models.len()
        })?;
        info!(provider, model = %model_id, removed, "removed registered model");
        Ok(removed)
    }
}
