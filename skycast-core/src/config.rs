use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::model::Units;

/// Environment variables consulted for API credentials, in priority order.
/// Mirrors the three-slot scheme the dashboard has always shipped with.
const KEY_ENV_VARS: [&str; 3] =
    ["SKYCAST_API_KEY", "SKYCAST_API_KEY_BACKUP", "SKYCAST_API_KEY_BACKUP_BACKUP"];

fn default_city() -> String {
    "London".to_string()
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_keys = ["abc123", "def456"]
/// default_city = "Toronto"
/// units = "metric"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API credentials in rotation order. Extended (not replaced) by the
    /// `SKYCAST_API_KEY*` environment variables.
    #[serde(default)]
    pub api_keys: Vec<String>,

    /// City shown when geolocation fails or nothing has been searched yet.
    #[serde(default = "default_city")]
    pub default_city: String,

    #[serde(default)]
    pub units: Units,
}

impl Default for Config {
    fn default() -> Self {
        Config { api_keys: Vec::new(), default_city: default_city(), units: Units::default() }
    }
}

impl Config {
    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Directory holding persisted dashboard state (history, preferences).
    pub fn data_dir() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "skycast", "skycast")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Append an API key to the rotation pool, skipping duplicates.
    pub fn add_api_key(&mut self, key: String) {
        if !key.is_empty() && !self.api_keys.contains(&key) {
            self.api_keys.push(key);
        }
    }

    /// The full credential pool: environment keys first, then config-file
    /// keys, with blanks filtered out. Order is rotation order.
    pub fn credential_pool(&self) -> Vec<String> {
        let env_keys = KEY_ENV_VARS.iter().map(|var| std::env::var(var).ok());
        merge_credentials(env_keys, &self.api_keys)
    }
}

fn merge_credentials(
    env_keys: impl Iterator<Item = Option<String>>,
    file_keys: &[String],
) -> Vec<String> {
    let mut pool: Vec<String> = env_keys.flatten().filter(|k| !k.trim().is_empty()).collect();
    for key in file_keys {
        if !key.trim().is_empty() && !pool.contains(key) {
            pool.push(key.clone());
        }
    }
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_a_fallback_city() {
        let cfg = Config::default();
        assert_eq!(cfg.default_city, "London");
        assert!(cfg.api_keys.is_empty());
        assert_eq!(cfg.units, Units::Metric);
    }

    #[test]
    fn add_api_key_skips_blanks_and_duplicates() {
        let mut cfg = Config::default();
        cfg.add_api_key("KEY_A".into());
        cfg.add_api_key("KEY_A".into());
        cfg.add_api_key(String::new());
        cfg.add_api_key("KEY_B".into());

        assert_eq!(cfg.api_keys, vec!["KEY_A".to_string(), "KEY_B".to_string()]);
    }

    #[test]
    fn merge_filters_absent_and_blank_env_slots() {
        let env = vec![Some("PRIMARY".to_string()), None, Some("  ".to_string())];
        let pool = merge_credentials(env.into_iter(), &["FILE_KEY".to_string()]);
        assert_eq!(pool, vec!["PRIMARY".to_string(), "FILE_KEY".to_string()]);
    }

    #[test]
    fn merge_keeps_env_keys_ahead_of_file_keys() {
        let env = vec![Some("ENV1".to_string()), Some("ENV2".to_string()), None];
        let pool = merge_credentials(env.into_iter(), &["FILE1".to_string(), "ENV1".to_string()]);
        assert_eq!(pool, vec!["ENV1".to_string(), "ENV2".to_string(), "FILE1".to_string()]);
    }

    #[test]
    fn config_roundtrips_through_toml() {
        let mut cfg = Config::default();
        cfg.add_api_key("KEY".into());
        cfg.default_city = "Oslo".into();
        cfg.units = Units::Imperial;

        let text = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&text).expect("parse");
        assert_eq!(parsed.api_keys, vec!["KEY".to_string()]);
        assert_eq!(parsed.default_city, "Oslo");
        assert_eq!(parsed.units, Units::Imperial);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let parsed: Config = toml::from_str("api_keys = [\"K\"]").expect("parse");
        assert_eq!(parsed.default_city, "London");
        assert_eq!(parsed.units, Units::Metric);
    }
}
