//! Repository factory for dependency injection.
//!
//! This module creates repository instances from runtime configuration. The
//! record type registry is built by the caller and injected here so every
//! component shares one immutable instance.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::registry::RecordTypeRegistry;
use super::repo_config::RepositoryConfig;
use super::repositories::LocalRepository;
use super::repository::{FullRepository, RepositoryResult};

/// Repository type configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryType {
    /// In-memory repository
    Local,
}

impl FromStr for RepositoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "memory" => Ok(Self::Local),
            _ => Err(format!("Unknown repository type: {}", s)),
        }
    }
}

impl fmt::Display for RepositoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryType::Local => f.write_str("local"),
        }
    }
}

/// Repository factory for creating repository instances.
///
/// # Example
/// ```ignore
/// let registry = Arc::new(RecordTypeRegistry::standard());
/// let config = RepositoryConfig::from_default_location()?.with_env_overrides()?;
/// let repo = RepositoryFactory::from_config(&config, registry)?;
/// ```
pub struct RepositoryFactory;

impl RepositoryFactory {
    /// Create a repository instance with default settings.
    pub fn create(
        repo_type: RepositoryType,
        registry: Arc<RecordTypeRegistry>,
    ) -> Arc<dyn FullRepository> {
        match repo_type {
            RepositoryType::Local => Arc::new(LocalRepository::with_registry(registry)),
        }
    }

    /// Create a repository configured from a loaded configuration.
    pub fn from_config(
        config: &RepositoryConfig,
        registry: Arc<RecordTypeRegistry>,
    ) -> RepositoryResult<Arc<dyn FullRepository>> {
        match config.repository_type()? {
            RepositoryType::Local => Ok(Arc::new(Self::create_local(config, registry)?)),
        }
    }

    /// Create a concrete local repository from configuration.
    pub fn create_local(
        config: &RepositoryConfig,
        registry: Arc<RecordTypeRegistry>,
    ) -> RepositoryResult<LocalRepository> {
        config.validate()?;
        Ok(LocalRepository::with_registry(registry)
            .with_read_settings(config.read)
            .with_zone_offset(config.zone_offset()?))
    }
}

/// Builder for configuring repository creation.
///
/// # Example
/// ```ignore
/// let repo = RepositoryBuilder::new()
///     .repository_type(RepositoryType::Local)
///     .registry(Arc::new(RecordTypeRegistry::standard()))
///     .build()?;
/// ```
pub struct RepositoryBuilder {
    config: RepositoryConfig,
    registry: Option<Arc<RecordTypeRegistry>>,
}

impl RepositoryBuilder {
    /// Create a new repository builder with default settings.
    ///
    /// Defaults to the local repository over the standard registry.
    pub fn new() -> Self {
        Self {
            config: RepositoryConfig::default(),
            registry: None,
        }
    }

    /// Set the repository type.
    pub fn repository_type(mut self, repo_type: RepositoryType) -> Self {
        self.config.repository.repo_type = repo_type.to_string();
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: RepositoryConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an already built registry.
    pub fn registry(mut self, registry: Arc<RecordTypeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Apply environment overrides to the configuration.
    pub fn from_env(mut self) -> RepositoryResult<Self> {
        self.config = self.config.with_env_overrides()?;
        Ok(self)
    }

    /// Build the repository instance.
    pub fn build(self) -> RepositoryResult<Arc<dyn FullRepository>> {
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(RecordTypeRegistry::standard()));
        RepositoryFactory::from_config(&self.config, registry)
    }
}

impl Default for RepositoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
