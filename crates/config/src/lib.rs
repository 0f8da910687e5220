//! `<config_dir>/config.yaml` loading (spec §6). Read once at startup;
//! written only by the CLI's `create` subcommand, never by the core.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

mod error;
pub use error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub provider_host: String,
    #[serde(default = "default_window_size")]
    pub window_size: u64,
}

fn default_window_size() -> u64 {
    3600
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub vaults: HashMap<String, VaultConfig>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let config: Config = serde_yaml::from_str(&contents)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = serde_yaml::to_string(self)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        }
        std::fs::write(path, contents)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })
    }

    pub fn vault(&self, vault_id: &str) -> Result<&VaultConfig, ConfigError> {
        self.vaults
            .get(vault_id)
            .ok_or_else(|| ConfigError::UnknownVault(vault_id.to_string()))
    }
}

/// Default config directory: `<project dirs>/basin`, following the same
/// platform-appropriate resolution the teacher uses `directories` for.
pub fn default_config_dir() -> PathBuf {
    ProjectDirs::from("dev", "tableland", "basin")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".basin"))
}

pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join("config.yaml")
}

/// The on-disk workspace directory for one vault's live and sealed
/// databases: `<config_dir>/<vault_id>/`.
pub fn vault_workspace_dir(config_dir: &Path, vault_id: &str) -> PathBuf {
    config_dir.join(vault_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_config_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"
vaults:
  public.events:
    host: localhost
    port: 5432
    user: postgres
    password: secret
    database: mydb
    provider_host: https://vault.example.com
"#
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        let vault = config.vault("public.events").unwrap();
        assert_eq!(vault.host, "localhost");
        assert_eq!(vault.window_size, 3600);
    }

    #[test]
    fn unknown_vault_is_error() {
        let config = Config::default();
        assert!(config.vault("nope").is_err());
    }
}
