//! In-memory settings repository
//!
//! Groups live in a single map behind one lock, so every call is atomic
//! with respect to other callers. Useful for tests, development, and as a
//! process-local cache backend.

use crate::contract::RepositoryError;
use crate::domain::repository::{RepositoryResult, SettingsRepository};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

#[derive(Default)]
struct Group {
    properties: BTreeMap<String, Value>,
    locked: BTreeSet<String>,
}

#[derive(Clone, Default)]
pub struct InMemorySettingsRepository {
    groups: Arc<RwLock<HashMap<String, Group>>>,
}

impl InMemorySettingsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of properties stored in a group
    pub fn count(&self, group: &str) -> usize {
        self.groups
            .read()
            .get(group)
            .map_or(0, |g| g.properties.len())
    }
}

#[async_trait]
impl SettingsRepository for InMemorySettingsRepository {
    async fn get_properties_in_group(
        &self,
        group: &str,
    ) -> RepositoryResult<BTreeMap<String, Value>> {
        Ok(self
            .groups
            .read()
            .get(group)
            .map(|g| g.properties.clone())
            .unwrap_or_default())
    }

    async fn check_if_property_exists(&self, group: &str, name: &str) -> RepositoryResult<bool> {
        Ok(self
            .groups
            .read()
            .get(group)
            .is_some_and(|g| g.properties.contains_key(name)))
    }

    async fn get_property_payload(&self, group: &str, name: &str) -> RepositoryResult<Value> {
        self.groups
            .read()
            .get(group)
            .and_then(|g| g.properties.get(name).cloned())
            .ok_or_else(|| RepositoryError::NotFound {
                group: group.to_string(),
                name: name.to_string(),
            })
    }

    async fn create_property(
        &self,
        group: &str,
        name: &str,
        payload: Value,
    ) -> RepositoryResult<()> {
        self.groups
            .write()
            .entry(group.to_string())
            .or_default()
            .properties
            .insert(name.to_string(), payload);
        Ok(())
    }

    async fn update_properties_in_group(
        &self,
        group: &str,
        properties: BTreeMap<String, Value>,
    ) -> RepositoryResult<()> {
        self.groups
            .write()
            .entry(group.to_string())
            .or_default()
            .properties
            .extend(properties);
        Ok(())
    }

    async fn delete_properties_in_group(
        &self,
        group: &str,
        names: &[String],
    ) -> RepositoryResult<()> {
        if let Some(g) = self.groups.write().get_mut(group) {
            for name in names {
                g.properties.remove(name);
            }
        }
        Ok(())
    }

    async fn lock_properties(&self, group: &str, names: &[String]) -> RepositoryResult<()> {
        self.groups
            .write()
            .entry(group.to_string())
            .or_default()
            .locked
            .extend(names.iter().cloned());
        Ok(())
    }

    async fn unlock_properties(&self, group: &str, names: &[String]) -> RepositoryResult<()> {
        if let Some(g) = self.groups.write().get_mut(group) {
            for name in names {
                g.locked.remove(name);
            }
        }
        Ok(())
    }

    async fn get_locked_properties(&self, group: &str) -> RepositoryResult<BTreeSet<String>> {
        Ok(self
            .groups
            .read()
            .get(group)
            .map(|g| g.locked.clone())
            .unwrap_or_default())
    }
}
