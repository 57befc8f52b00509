//! CLI configuration management.
//!
//! Precedence, lowest first: built-in defaults, the JSON config file,
//! environment variables (a `.env` file is honored), command-line flags.

use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use mml_search::SearchConfig;
use serde::{Deserialize, Serialize};

/// Application-wide configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Search parameters used when a flag does not override them.
    #[serde(default)]
    pub search: SearchConfig,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid value for {key}: {raw}")),
        Err(_) => Ok(None),
    }
}

impl Config {
    /// Load configuration from the config file and environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present (silently ignore if missing)
        let _ = dotenvy::dotenv();

        let mut config = match Self::config_file_path() {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config from {}", path.display()))?;
                serde_json::from_str(&contents)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            _ => Self::default(),
        };

        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        let search = &mut self.search;
        if let Some(seed) = env_parse("MML_SEED")? {
            search.seed = seed;
        }
        if let Some(max_parents) = env_parse("MML_MAX_PARENTS")? {
            search.max_parents = max_parents;
        }
        if let Some(temperature) = env_parse("MML_TEMPERATURE")? {
            search.temperature = temperature;
        }
        if let Some(steps) = env_parse("MML_SAMPLING_STEPS")? {
            search.sampling_steps = steps;
        }
        if let Some(steps) = env_parse("MML_BURN_IN_STEPS")? {
            search.burn_in_steps = steps;
        }
        Ok(())
    }

    /// Save current configuration to the config file.
    pub fn save(&self) -> Result<()> {
        if let Some(config_path) = Self::config_file_path() {
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config directory: {}", parent.display())
                })?;
            }
            let contents = serde_json::to_string_pretty(self)?;
            std::fs::write(&config_path, contents)
                .with_context(|| format!("Failed to write config to {}", config_path.display()))?;
        }
        Ok(())
    }

    /// Get the path to the config file.
    ///
    /// `MML_CONFIG` overrides the platform config directory.
    pub fn config_file_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("MML_CONFIG") {
            return Some(PathBuf::from(path));
        }
        ProjectDirs::from("dev", "mml", "mml").map(|dirs| dirs.config_dir().join("config.json"))
    }
}
