use std::path::PathBuf;
use std::time::Duration;

use eyre::Result;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::naming::NameStrategy;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub backend_url: Option<String>,
    pub default_format: Option<String>,
    pub debounce_ms: Option<u64>,
    pub ad_keywords: Vec<String>,
    pub name_strategy: Option<NameStrategy>,
}

impl Config {
    /// Load config from ~/.config/vidgroup/config.toml if it exists
    pub fn load() -> Result<Self> {
        let path = config_path();
        if path.exists() {
            debug!("Loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            debug!("No config file found at {}", path.display());
            Ok(Config::default())
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce_ms
            .map(Duration::from_millis)
            .unwrap_or(crate::capture::DEFAULT_DEBOUNCE)
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("vidgroup")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
backend_url = "http://localhost:3000"
default_format = "json"
debounce_ms = 250
ad_keywords = ["preroll", "midroll"]
name_strategy = "consensus"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.backend_url.as_deref(), Some("http://localhost:3000"));
        assert_eq!(config.default_format.as_deref(), Some("json"));
        assert_eq!(config.debounce(), Duration::from_millis(250));
        assert_eq!(config.ad_keywords, vec!["preroll", "midroll"]);
        assert_eq!(config.name_strategy, Some(NameStrategy::Consensus));
    }

    #[test]
    fn test_parse_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.backend_url.is_none());
        assert!(config.ad_keywords.is_empty());
        assert_eq!(config.debounce(), crate::capture::DEFAULT_DEBOUNCE);
    }

    #[test]
    fn test_parse_partial_config() {
        let config: Config = toml::from_str(r#"name_strategy = "first_stream""#).unwrap();
        assert_eq!(config.name_strategy, Some(NameStrategy::FirstStream));
        assert!(config.default_format.is_none());
    }
}
