use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read bridge config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Static viewport description handed to scripts as `screen`, `screenX` and `screenY`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScreenConfig {
    pub width: u32,
    pub height: u32,
    pub x: i32,
    pub y: i32,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 1024,
            x: 0,
            y: 25,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NavigatorConfig {
    pub platform: String,
    pub user_agent: String,
    pub language: String,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            platform: "Linux x86_64".to_string(),
            user_agent: "Mozilla/5.0 (compatible; dombridge/0.1)".to_string(),
            language: "en-US".to_string(),
        }
    }
}

/// Per-session settings for the bridge environment.
///
/// Every field has a default, so a YAML file only needs to name what it
/// overrides:
///
/// ```yaml
/// screen:
///   width: 800
/// script_timeout_ms: 5000
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeConfig {
    pub screen: ScreenConfig,
    pub navigator: NavigatorConfig,
    pub script_timeout_ms: u64,
    pub memory_limit_bytes: usize,
    pub max_pending_jobs: usize,
    /// Initial `localStorage` contents, for hosts that persist storage across sessions.
    pub local_storage: HashMap<String, String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            screen: ScreenConfig::default(),
            navigator: NavigatorConfig::default(),
            script_timeout_ms: 60_000,
            memory_limit_bytes: 256 * 1024 * 1024,
            max_pending_jobs: 1000,
            local_storage: HashMap::new(),
        }
    }
}

impl BridgeConfig {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        match config_path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)?;
                Self::from_yaml(&contents)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn script_timeout(&self) -> Option<Duration> {
        if self.script_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.script_timeout_ms))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn loads_default() {
        let config = BridgeConfig::load(None).unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.screen.width, 1280);
        assert_eq!(config.script_timeout(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn missing_file_falls_back_to_default() {
        let config =
            BridgeConfig::load(Some(PathBuf::from("/nonexistent/dombridge.yaml"))).unwrap();
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn loads_partial_overrides_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        use std::io::Write;
        writeln!(
            file,
            "screen:\n  width: 800\nnavigator:\n  platform: test-os\nscript_timeout_ms: 0\nlocal_storage:\n  theme: dark"
        )
        .unwrap();
        let config = BridgeConfig::load(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.screen.width, 800);
        assert_eq!(config.screen.height, 1024);
        assert_eq!(config.navigator.platform, "test-os");
        assert_eq!(
            config.navigator.user_agent,
            NavigatorConfig::default().user_agent
        );
        assert_eq!(config.script_timeout(), None);
        assert_eq!(config.local_storage.get("theme").map(String::as_str), Some("dark"));
    }

    #[test]
    fn rejects_malformed_yaml() {
        let err = BridgeConfig::from_yaml("screen: [1, 2").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }
}
