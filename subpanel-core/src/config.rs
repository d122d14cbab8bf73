//! Configuration for the subpanel stores.
//!
//! Loaded from TOML. Every section has defaults so an empty file is valid;
//! `validate()` rejects values the stores cannot work with.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "SUBPANEL_STORE_CONFIG";

/// Page size config key used by subpanel record lists.
pub const SUBPANEL_PAGE_SIZE_KEY: &str = "list_max_entries_per_subpanel";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StoreConfig {
    pub record_list: RecordListConfig,
    pub subpanel: SubpanelConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RecordListConfig {
    /// Page size used when a page size key has no entry.
    pub default_page_size: u32,
    /// Page sizes by config key.
    pub page_sizes: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SubpanelConfig {
    /// Page size key handed to the record list on init.
    pub page_size_key: String,
    /// Disable record list caching for subpanels.
    pub cache_disabled: bool,
    /// Start loading every statistic as soon as the panel is initialized.
    pub load_statistics_on_init: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (set SUBPANEL_STORE_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl Default for RecordListConfig {
    fn default() -> Self {
        let mut page_sizes = BTreeMap::new();
        page_sizes.insert(SUBPANEL_PAGE_SIZE_KEY.to_string(), 10);
        Self {
            default_page_size: 20,
            page_sizes,
        }
    }
}

impl Default for SubpanelConfig {
    fn default() -> Self {
        Self {
            page_size_key: SUBPANEL_PAGE_SIZE_KEY.to_string(),
            cache_disabled: false,
            load_statistics_on_init: false,
        }
    }
}

impl RecordListConfig {
    /// Resolve a page size key, falling back to the default size.
    pub fn page_size(&self, key: &str) -> u32 {
        self.page_sizes
            .get(key)
            .copied()
            .unwrap_or(self.default_page_size)
    }
}

impl StoreConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate the file named by [`CONFIG_PATH_ENV`].
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: StoreConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Set the fallback page size.
    pub fn with_default_page_size(mut self, size: u32) -> Self {
        self.record_list.default_page_size = size;
        self
    }

    /// Set the page size for a config key.
    pub fn with_page_size(mut self, key: impl Into<String>, size: u32) -> Self {
        self.record_list.page_sizes.insert(key.into(), size);
        self
    }

    /// Enable or disable record list caching for subpanels.
    pub fn with_cache_disabled(mut self, disabled: bool) -> Self {
        self.subpanel.cache_disabled = disabled;
        self
    }

    /// Enable or disable loading statistics during panel init.
    pub fn with_load_statistics_on_init(mut self, enabled: bool) -> Self {
        self.subpanel.load_statistics_on_init = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.record_list.default_page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "record_list.default_page_size".to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        if let Some((key, _)) = self
            .record_list
            .page_sizes
            .iter()
            .find(|(_, size)| **size == 0)
        {
            return Err(ConfigError::InvalidValue {
                field: format!("record_list.page_sizes.{key}"),
                reason: "must be > 0".to_string(),
            });
        }
        if self.subpanel.page_size_key.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "subpanel.page_size_key".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = StoreConfig::from_toml_str("").unwrap();
        assert_eq!(config, StoreConfig::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.record_list.page_size(SUBPANEL_PAGE_SIZE_KEY), 10);
        assert_eq!(config.record_list.page_size("list_max_entries_per_page"), 20);
    }

    #[test]
    fn test_parse_full_file() {
        let config = StoreConfig::from_toml_str(
            r#"
            [record_list]
            default_page_size = 25

            [record_list.page_sizes]
            list_max_entries_per_subpanel = 5

            [subpanel]
            page_size_key = "list_max_entries_per_subpanel"
            cache_disabled = true
            load_statistics_on_init = true
            "#,
        )
        .unwrap();

        assert_eq!(config.record_list.default_page_size, 25);
        assert_eq!(config.record_list.page_size(SUBPANEL_PAGE_SIZE_KEY), 5);
        assert!(config.subpanel.cache_disabled);
        assert!(config.subpanel.load_statistics_on_init);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result = StoreConfig::from_toml_str("[subpanel]\nbatch = true\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validate_rejects_zero_page_sizes() {
        let config = StoreConfig::new().with_default_page_size(0);
        assert!(config.validate().is_err());

        let config = StoreConfig::new().with_page_size("list_max_entries_per_dashlet", 0);
        match config.validate() {
            Err(ConfigError::InvalidValue { field, .. }) => {
                assert_eq!(field, "record_list.page_sizes.list_max_entries_per_dashlet");
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_blank_page_size_key() {
        let mut config = StoreConfig::new();
        config.subpanel.page_size_key = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_path_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[subpanel]\ncache_disabled = true").unwrap();

        let config = StoreConfig::from_path(file.path()).unwrap();
        assert!(config.subpanel.cache_disabled);
    }

    #[test]
    fn test_from_path_missing_file() {
        let result = StoreConfig::from_path(Path::new("/nonexistent/subpanel.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
