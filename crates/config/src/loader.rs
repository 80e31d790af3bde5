use std::{
    path::{Path, PathBuf},
    sync::{LazyLock, RwLock},
};

use tracing::{debug, warn};

use crate::schema::ByokConfig;

const CONFIG_FILENAME: &str = "byok.toml";

static CONFIG_DIR_OVERRIDE: LazyLock<RwLock<Option<PathBuf>>> =
    LazyLock::new(|| RwLock::new(None));

/// Override the user-global config directory (`--config-dir`).
pub fn set_config_dir(path: PathBuf) {
    *CONFIG_DIR_OVERRIDE
        .write()
        .unwrap_or_else(|e| e.into_inner()) = Some(path);
}

/// Returns the config directory: the override if set, else `~/.config/byok/`.
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = CONFIG_DIR_OVERRIDE
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
    {
        return Some(dir);
    }
    directories::ProjectDirs::from("", "", "byok").map(|d| d.config_dir().to_path_buf())
}

/// Load config from the given path.
pub fn load_config(path: &Path) -> anyhow::Result<ByokConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    toml::from_str(&raw).map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./byok.toml` (project-local)
/// 2. `<config dir>/byok.toml` (user-global)
///
/// Returns `ByokConfig::default()` if no config file is found or it fails to
/// parse.
pub fn discover_and_load() -> ByokConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    ByokConfig::default()
}

fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILENAME);
    if local.exists() {
        return Some(local);
    }
    config_dir()
        .map(|dir| dir.join(CONFIG_FILENAME))
        .filter(|p| p.exists())
}

/// Returns the path of an existing config file, or the default user-global path.
pub fn find_or_default_config_path() -> PathBuf {
    if let Some(path) = find_config_file() {
        return path;
    }
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_FILENAME)
}

/// Serialize `config` to TOML and write it to `path`, creating parent
/// directories as needed.
pub fn save_config(config: &ByokConfig, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("serialize config: {e}"))?;
    std::fs::write(path, toml_str)?;
    debug!(path = %path.display(), "saved config");
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_preserves_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILENAME);

        let mut cfg = ByokConfig::default();
        cfg.flow.probe_timeout_secs = 3;
        cfg.validation.placeholder_keys.push("sk-xxxx".into());
        save_config(&cfg, &path).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.flow.probe_timeout_secs, 3);
        assert!(loaded.validation.placeholder_keys.iter().any(|k| k == "sk-xxxx"));
    }

    #[test]
    fn load_reports_parse_errors_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[flow\nbroken").unwrap();

        let err = load_config(&path).unwrap_err().to_string();
        assert!(err.contains("failed to parse"), "{err}");
    }
}
