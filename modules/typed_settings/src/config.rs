//! Configuration for the typed settings module

use serde::Deserialize;
use std::collections::BTreeMap;

/// Typed settings configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Repository used by settings types that do not select one
    #[serde(default = "default_repository")]
    pub default_repository: String,

    /// Named repository backends
    #[serde(default = "default_repositories")]
    pub repositories: BTreeMap<String, RepositoryConfig>,

    /// Hydrate instances when they are created instead of on first access
    #[serde(default)]
    pub eager_load: bool,

    /// Secret the encryption key is derived from
    #[serde(default)]
    pub encryption_key: Option<String>,
}

/// One repository backend
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum RepositoryConfig {
    Memory,
    Database {
        url: String,
        #[serde(default = "default_true")]
        run_migrations: bool,
    },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_repository: default_repository(),
            repositories: default_repositories(),
            eager_load: false,
            encryption_key: None,
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

fn default_repository() -> String {
    "memory".to_string()
}

fn default_repositories() -> BTreeMap<String, RepositoryConfig> {
    BTreeMap::from([(default_repository(), RepositoryConfig::Memory)])
}

fn default_true() -> bool {
    true
}
