use super::resolver::DEFAULT_LOOKBACK_DAYS;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_CVM_BASE_URL: &str = "http://dados.cvm.gov.br/dados/FI";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CvmProviderConfig {
    pub base_url: String,
}

impl Default for CvmProviderConfig {
    fn default() -> Self {
        CvmProviderConfig {
            base_url: DEFAULT_CVM_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub cvm: CvmProviderConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig { enabled: true }
    }
}

fn default_cache_enabled() -> bool {
    true
}

fn default_lookback_days() -> u32 {
    DEFAULT_LOOKBACK_DAYS
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    pub data_path: Option<String>,
    /// How many days back to look for the latest registry snapshot.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            providers: ProvidersConfig::default(),
            data_path: None,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            cache: CacheConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads the config from the default location, or the built-in defaults
    /// when no file has been set up yet.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(path = %config_path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("br", "fundosbr", "fundosbr")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("br", "fundosbr", "fundosbr")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.providers.cvm.base_url, DEFAULT_CVM_BASE_URL);
        assert_eq!(config.lookback_days, 29);
        assert!(config.cache.enabled);
        assert!(config.data_path.is_none());
    }

    #[test]
    fn reads_all_settings() {
        let yaml_str = r#"
providers:
  cvm:
    base_url: "http://localhost:8080/dados/FI"
data_path: "/tmp/fundosbr"
lookback_days: 10
cache:
  enabled: false
"#;
        let config: AppConfig = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(
            config.providers.cvm.base_url,
            "http://localhost:8080/dados/FI"
        );
        assert_eq!(config.lookback_days, 10);
        assert!(!config.cache.enabled);
        assert_eq!(
            config.default_data_path().unwrap(),
            PathBuf::from("/tmp/fundosbr")
        );
    }

    #[test]
    fn partial_sections_fill_in_defaults() {
        let yaml_str = r#"
providers: {}
cache: {}
"#;
        let config: AppConfig = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(config.providers.cvm.base_url, DEFAULT_CVM_BASE_URL);
        assert!(config.cache.enabled);
    }

    #[test]
    fn load_from_path_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "lookback_days: 5").unwrap();
        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.lookback_days, 5);
    }

    #[test]
    fn load_from_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = AppConfig::load_from_path(dir.path().join("missing.yaml"));
        assert!(result.is_err());
    }

    #[test]
    fn example_config_parses() {
        let config: AppConfig =
            serde_yaml::from_str(include_str!("../../docs/example_config.yaml")).unwrap();
        assert_eq!(config.providers.cvm.base_url, DEFAULT_CVM_BASE_URL);
        assert_eq!(config.lookback_days, 29);
    }
}
