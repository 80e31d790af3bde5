use std::sync::Arc;

use {
    anyhow::{Context, Result, anyhow, bail},
    byok_config::ByokConfig,
    byok_onboarding::{ConfigurationFlow, FlowResult, TerminalSurface},
    byok_provider_setup::{CredentialStore, KeyStore, ModelStore, Validator},
    byok_providers::{AuthType, ByokProvider},
    tracing::info,
};

/// What applying a finished flow changed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Applied {
    pub key_saved: bool,
    pub deleted: Option<String>,
    pub custom_model: Option<String>,
    pub selected: usize,
}

pub async fn run(config: &ByokConfig, store: KeyStore) -> Result<()> {
    let providers = crate::build_providers(config);
    let store = Arc::new(store);

    let mut flow = ConfigurationFlow::new(
        TerminalSurface::stdio(),
        providers.clone(),
        Arc::clone(&store) as Arc<dyn CredentialStore>,
        Arc::clone(&store) as Arc<dyn ModelStore>,
    )
    .with_validator(Validator::new(config.validation.clone()))
    .with_flow_config(config.flow.clone());

    let Some(result) = flow.run().await else {
        eprintln!("Configuration cancelled.");
        return Ok(());
    };

    let applied = apply_result(&result, &providers, store.as_ref(), store.as_ref()).await?;
    if let Some(model) = &applied.deleted {
        println!("Removed model {model} from {}.", result.provider_name);
        return Ok(());
    }
    if applied.key_saved {
        println!("Saved API key for {}.", result.provider_name);
    }
    if let Some(model) = &applied.custom_model {
        println!("Registered custom model {model}.");
    }
    println!(
        "{} model(s) enabled for {}.",
        applied.selected, result.provider_name
    );
    Ok(())
}

/// Persist a finished flow: delete a model, or save the key, register the
/// custom model and store the selection.
pub async fn apply_result(
    result: &FlowResult,
    providers: &[Arc<dyn ByokProvider>],
    credentials: &dyn CredentialStore,
    models: &dyn ModelStore,
) -> Result<Applied> {
    let provider = providers
        .iter()
        .find(|p| p.name() == result.provider_name)
        .ok_or_else(|| anyhow!("unknown provider {}", result.provider_name))?;
    let name = provider.name();
    let auth_type = provider.auth_type();

    if let Some(model) = &result.custom_model_to_delete {
        let removed = models.remove_model(name, model).await?;
        if !removed {
            bail!("model {model} is not registered for {name}");
        }
        return Ok(Applied {
            deleted: Some(model.clone()),
            ..Applied::default()
        });
    }

    result
        .validate(auth_type)
        .context("configuration is incomplete")?;

    let mut applied = Applied::default();
    if auth_type == AuthType::GlobalApiKey
        && result.new_api_key_provided
        && let Some(key) = &result.api_key
    {
        credentials.store_api_key(name, key, auth_type).await?;
        applied.key_saved = true;
    }

    if let Some(custom) = &result.custom_model {
        let config = custom.to_config(auth_type);
        let handle = provider
            .register_model(config.clone())
            .map_err(|e| anyhow!("Failed to register model {}: {e}", custom.id))?;
        if let Err(error) = models.save_custom_model(name, config).await {
            handle.dispose();
            return Err(anyhow!("Failed to save model {}: {error}", custom.id));
        }
        info!(provider = %name, model = %custom.id, "custom model registered");
        applied.custom_model = Some(custom.id.clone());
    }

    models
        .save_selected_models(name, &result.selected_models)
        .await?;
    applied.selected = result.selected_models.len();
    Ok(applied)
}
