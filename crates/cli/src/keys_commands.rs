use {
    anyhow::{Result, bail},
    byok_config::ByokConfig,
    byok_provider_setup::{CredentialStore, KeyStore},
    byok_providers::AuthType,
    clap::Subcommand,
};

#[derive(Subcommand)]
pub enum KeysAction {
    /// Show which providers have a stored key.
    List,
    /// Forget the stored key of a provider.
    Remove { provider: String },
}

pub async fn handle(action: KeysAction, config: &ByokConfig, store: &KeyStore) -> Result<()> {
    match action {
        KeysAction::List => {
            for setting in config.effective_providers() {
                let auth_type = AuthType::from(setting.auth_type);
                let status = match auth_type {
                    AuthType::PerModelDeployment => "keys stored per model",
                    AuthType::GlobalApiKey => {
                        if store.get_api_key(&setting.name).await?.is_some() {
                            "key stored"
                        } else {
                            "no key"
                        }
                    },
                };
                println!("{:<16} {status}", setting.name);
            }
        },
        KeysAction::Remove { provider } => {
            let Some(setting) = config
                .effective_providers()
                .into_iter()
                .find(|s| s.name == provider)
            else {
                bail!("unknown provider {provider}");
            };
            store
                .delete_api_key(&setting.name, setting.auth_type.into())
                .await?;
            println!("Removed stored key for {provider}.");
        },
    }
    Ok(())
}
