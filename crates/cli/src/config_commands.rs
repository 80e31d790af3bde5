use std::path::Path;

use {
    anyhow::{Result, bail},
    byok_config::ByokConfig,
};

/// Write a config file listing the current providers so they can be edited.
pub fn init(config: &ByokConfig, force: bool) -> Result<()> {
    let path = byok_config::find_or_default_config_path();
    write_starter(config, &path, force)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn write_starter(config: &ByokConfig, path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let starter = ByokConfig {
        providers: config.effective_providers(),
        ..config.clone()
    };
    byok_config::save_config(&starter, path)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starter_lists_builtin_providers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("byok.toml");

        write_starter(&ByokConfig::default(), &path, false).unwrap();
        let written = byok_config::load_config(&path).unwrap();
        assert!(written.providers.iter().any(|p| p.name == "Azure"));
        assert_eq!(written.flow.probe_timeout_secs, 10);
    }

    #[test]
    fn existing_file_needs_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("byok.toml");
        std::fs::write(&path, "").unwrap();

        let err = write_starter(&ByokConfig::default(), &path, false).unwrap_err();
        assert!(err.to_string().contains("--force"));
        write_starter(&ByokConfig::default(), &path, true).unwrap();
    }
}
