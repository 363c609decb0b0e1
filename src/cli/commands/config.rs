//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::Result;
use std::path::PathBuf;

/// Run the config command.
pub fn run_config(action: &ConfigAction, settings: Settings, path: Option<PathBuf>) -> Result<()> {
    let config_path = path.unwrap_or_else(Settings::default_config_path);

    match action {
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(&settings)
                .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
            println!("{}", toml_str);
        }

        ConfigAction::Path => {
            println!("{}", config_path.display());
        }

        ConfigAction::Init { force } => {
            if config_path.exists() && !force {
                Output::warning(&format!(
                    "Config already exists at {}. Use --force to overwrite.",
                    config_path.display()
                ));
                return Ok(());
            }
            settings.save_to(&config_path)?;
            Output::success(&format!("Wrote config to {}", config_path.display()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut settings = Settings::default();
        settings.nl2sql.max_rows = 25;
        run_config(&ConfigAction::Init { force: false }, settings, Some(path.clone())).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = toml::from_str(&content).unwrap();
        assert_eq!(loaded.nl2sql.max_rows, 25);

        // Existing files are left alone without --force
        run_config(&ConfigAction::Init { force: false }, Settings::default(), Some(path.clone()))
            .unwrap();
        let loaded: Settings = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.nl2sql.max_rows, 25);
    }
}
