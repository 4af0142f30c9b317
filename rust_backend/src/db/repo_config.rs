//! Repository configuration file support.
//!
//! Configuration is read from a TOML file and may be overridden from the
//! environment:
//!
//! ```toml
//! [repository]
//! type = "local"
//!
//! [read]
//! default_page_size = 1000
//! max_page_size = 5000
//!
//! [aggregation]
//! default_zone_offset_seconds = 0
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::factory::RepositoryType;
use super::repository::{RepositoryError, RepositoryResult};
use crate::models::ZoneOffset;

pub const ENV_REPOSITORY_TYPE: &str = "HEALTH_REPOSITORY_TYPE";
pub const ENV_DEFAULT_PAGE_SIZE: &str = "HEALTH_DEFAULT_PAGE_SIZE";
pub const ENV_MAX_PAGE_SIZE: &str = "HEALTH_MAX_PAGE_SIZE";
pub const ENV_ZONE_OFFSET_SECONDS: &str = "HEALTH_ZONE_OFFSET_SECONDS";

/// Repository configuration from file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub repository: RepositorySettings,
    #[serde(default)]
    pub read: ReadSettings,
    #[serde(default)]
    pub aggregation: AggregationSettings,
}

/// Repository type settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositorySettings {
    #[serde(rename = "type")]
    pub repo_type: String,
}

/// Paging limits for the read path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadSettings {
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

/// Defaults applied to aggregation requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AggregationSettings {
    /// Zone used to resolve local time ranges and period labels.
    #[serde(default)]
    pub default_zone_offset_seconds: i32,
}

fn default_page_size() -> usize {
    1000
}

fn default_max_page_size() -> usize {
    5000
}

impl Default for ReadSettings {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            repository: RepositorySettings {
                repo_type: RepositoryType::Local.to_string(),
            },
            read: ReadSettings::default(),
            aggregation: AggregationSettings::default(),
        }
    }
}

fn config_error(msg: impl Into<String>) -> RepositoryError {
    RepositoryError::ConfigurationError(msg.into())
}

impl RepositoryConfig {
    /// Load repository configuration from a TOML file.
    ///
    /// # Returns
    /// * `Ok(RepositoryConfig)` if successful
    /// * `Err(RepositoryError)` if the file cannot be read, parsed or validated
    pub fn from_file<P: AsRef<Path>>(path: P) -> RepositoryResult<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| config_error(format!("Failed to read config file: {}", e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    ///
    /// Parse errors name the offending key path, e.g. `read.max_page_size`.
    pub fn from_toml_str(content: &str) -> RepositoryResult<Self> {
        let deserializer = toml::Deserializer::new(content);
        let config: RepositoryConfig = serde_path_to_error::deserialize(deserializer)
            .map_err(|e| {
                config_error(format!(
                    "Failed to parse config file at '{}': {}",
                    e.path(),
                    e.inner()
                ))
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load repository configuration from the default location.
    ///
    /// Searches for `repository.toml` in:
    /// 1. Current directory
    /// 2. `rust_backend/` directory
    /// 3. Parent directory
    pub fn from_default_location() -> RepositoryResult<Self> {
        let search_paths = [
            PathBuf::from("repository.toml"),
            PathBuf::from("rust_backend/repository.toml"),
            PathBuf::from("../repository.toml"),
        ];

        for path in search_paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(config_error("No repository.toml found in standard locations"))
    }

    /// Apply `HEALTH_*` environment variable overrides.
    pub fn with_env_overrides(self) -> RepositoryResult<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn with_overrides<F>(mut self, lookup: F) -> RepositoryResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> RepositoryResult<T> {
            raw.trim()
                .parse()
                .map_err(|_| config_error(format!("Invalid value for {}: '{}'", key, raw)))
        }

        if let Some(repo_type) = lookup(ENV_REPOSITORY_TYPE) {
            self.repository.repo_type = repo_type;
        }
        if let Some(raw) = lookup(ENV_DEFAULT_PAGE_SIZE) {
            self.read.default_page_size = parse(ENV_DEFAULT_PAGE_SIZE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_PAGE_SIZE) {
            self.read.max_page_size = parse(ENV_MAX_PAGE_SIZE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_ZONE_OFFSET_SECONDS) {
            self.aggregation.default_zone_offset_seconds = parse(ENV_ZONE_OFFSET_SECONDS, &raw)?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> RepositoryResult<()> {
        self.repository_type()?;
        if self.read.default_page_size == 0 {
            return Err(config_error("read.default_page_size must be positive"));
        }
        if self.read.default_page_size > self.read.max_page_size {
            return Err(config_error(format!(
                "read.default_page_size ({}) exceeds read.max_page_size ({})",
                self.read.default_page_size, self.read.max_page_size
            )));
        }
        self.zone_offset()?;
        Ok(())
    }

    /// Get the repository type from configuration.
    pub fn repository_type(&self) -> RepositoryResult<RepositoryType> {
        self.repository
            .repo_type
            .parse()
            .map_err(|e| config_error(format!("Invalid repository type: {}", e)))
    }

    /// Default zone offset for aggregation.
    pub fn zone_offset(&self) -> RepositoryResult<ZoneOffset> {
        let seconds = self.aggregation.default_zone_offset_seconds;
        ZoneOffset::from_seconds(seconds).ok_or_else(|| {
            config_error(format!(
                "aggregation.default_zone_offset_seconds out of range: {}",
                seconds
            ))
        })
    }
}
