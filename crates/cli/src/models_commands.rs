use {
    anyhow::Result,
    byok_provider_setup::{KeyStore, ModelStore},
};

pub async fn list(store: &KeyStore, provider: &str) -> Result<()> {
    let models = store.registered_models(provider).await?;
    if models.is_empty() {
        println!("No models registered for {provider}.");
        return Ok(());
    }
    for model in models {
        if model.custom {
            println!("{} (custom)", model.id);
        } else {
            println!("{}", model.id);
        }
    }
    Ok(())
}
