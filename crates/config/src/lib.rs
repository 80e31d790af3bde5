//! Configuration loading for the BYOK model setup tool.
//!
//! Config file: `byok.toml`, searched in `./` then `~/.config/byok/`.

pub mod loader;
pub mod schema;

pub use {
    loader::{
        config_dir, discover_and_load, find_or_default_config_path, load_config,
        save_config, set_config_dir,
    },
    schema::{
        AuthTypeSetting, ByokConfig, FlowConfig, ProviderFamilySetting, ProviderSetting,
        ValidationConfig,
    },
};
