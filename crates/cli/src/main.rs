mod config_commands;
mod configure_commands;
mod keys_commands;
mod models_commands;

use std::{sync::Arc, time::Duration};

use {
    byok_config::ByokConfig,
    byok_provider_setup::KeyStore,
    byok_providers::{ByokProvider, OpenAiCompatProvider},
    clap::{Parser, Subcommand},
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "byok", about = "Configure bring-your-own-key LLM providers", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Custom config directory (overrides default ~/.config/byok/).
    #[arg(long, global = true, env = "BYOK_CONFIG_DIR")]
    config_dir: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure a provider interactively (default when no subcommand is given).
    Configure,
    /// Write a starter `byok.toml` with the current provider list.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// List the models registered for a provider.
    Models { provider: String },
    /// Manage stored API keys.
    Keys {
        #[command(subcommand)]
        action: keys_commands::KeysAction,
    },
}

/// Logs go to stderr so they never interleave with prompts on stdout.
fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// One adapter per configured (or built-in) provider.
pub(crate) fn build_providers(config: &ByokConfig) -> Vec<Arc<dyn ByokProvider>> {
    let probe_timeout = Duration::from_secs(config.flow.probe_timeout_secs);
    config
        .effective_providers()
        .iter()
        .map(|setting| {
            Arc::new(OpenAiCompatProvider::from_setting(setting, probe_timeout))
                as Arc<dyn ByokProvider>
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_telemetry(&cli);

    if let Some(ref dir) = cli.config_dir {
        byok_config::set_config_dir(dir.clone());
    }
    let config = byok_config::discover_and_load();
    let store = KeyStore::new();
    debug!(
        version = env!("CARGO_PKG_VERSION"),
        key_store = %store.path().display(),
        "byok starting"
    );

    match cli.command {
        None | Some(Commands::Configure) => configure_commands::run(&config, store).await,
        Some(Commands::Init { force }) => config_commands::init(&config, force),
        Some(Commands::Models { provider }) => models_commands::list(&store, &provider).await,
        Some(Commands::Keys { action }) => keys_commands::handle(action, &config, &store).await,
    }
}
