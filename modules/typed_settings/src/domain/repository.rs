//! Repository trait for settings storage
//!
//! The only storage abstraction the core talks to. Implementations live in
//! infra/memory.rs and infra/storage/repositories.rs.

use crate::contract::{RepositoryError, SettingsError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Grouped key/value storage with per-property lock state.
///
/// Every call is atomic at group level: callers never observe a partially
/// applied `update_properties_in_group`.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// All raw payloads stored under a group
    async fn get_properties_in_group(&self, group: &str)
        -> RepositoryResult<BTreeMap<String, Value>>;

    /// Check if a property exists
    async fn check_if_property_exists(&self, group: &str, name: &str) -> RepositoryResult<bool>;

    /// Raw payload of one property; `RepositoryError::NotFound` if absent
    async fn get_property_payload(&self, group: &str, name: &str) -> RepositoryResult<Value>;

    /// Store a new property
    async fn create_property(&self, group: &str, name: &str, payload: Value)
        -> RepositoryResult<()>;

    /// Insert or overwrite several properties of a group in one step
    async fn update_properties_in_group(
        &self,
        group: &str,
        properties: BTreeMap<String, Value>,
    ) -> RepositoryResult<()>;

    /// Remove properties from a group
    async fn delete_properties_in_group(&self, group: &str, names: &[String])
        -> RepositoryResult<()>;

    /// Mark properties as locked
    async fn lock_properties(&self, group: &str, names: &[String]) -> RepositoryResult<()>;

    /// Clear the lock on properties
    async fn unlock_properties(&self, group: &str, names: &[String]) -> RepositoryResult<()>;

    /// Names of the locked properties of a group
    async fn get_locked_properties(&self, group: &str) -> RepositoryResult<BTreeSet<String>>;
}

/// Named repositories plus the name used when a settings type has no selector
#[derive(Clone)]
pub struct RepositoryFactory {
    default: String,
    repositories: HashMap<String, Arc<dyn SettingsRepository>>,
}

impl RepositoryFactory {
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            default: default.into(),
            repositories: HashMap::new(),
        }
    }

    /// Factory with a single repository that is also the default
    pub fn single(name: impl Into<String>, repository: Arc<dyn SettingsRepository>) -> Self {
        let name = name.into();
        let mut factory = Self::new(name.clone());
        factory.register(name, repository);
        factory
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        repository: Arc<dyn SettingsRepository>,
    ) -> &mut Self {
        self.repositories.insert(name.into(), repository);
        self
    }

    pub fn default_name(&self) -> &str {
        &self.default
    }

    /// Repository for a selector; `None` picks the default
    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<dyn SettingsRepository>, SettingsError> {
        let name = name.unwrap_or(&self.default);
        self.repositories
            .get(name)
            .cloned()
            .ok_or_else(|| SettingsError::RepositoryNotConfigured {
                name: name.to_string(),
            })
    }
}

impl std::fmt::Debug for RepositoryFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryFactory")
            .field("default", &self.default)
            .field("repositories", &self.repositories.keys().collect::<Vec<_>>())
            .finish()
    }
}
