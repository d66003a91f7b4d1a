//! Live settings object
//!
//! Values are hydrated from the descriptor's repository on first access
//! (or eagerly), read and written through explicit accessors, and persisted
//! on `save`. Writes to locked fields are rejected.

use super::descriptor::SettingsDescriptor;
use super::events::{publish_best_effort, SettingsEvent};
use crate::contract::{FieldSpec, FromSettingValue, Settings, SettingValue, SettingsError};
use indexmap::IndexMap;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;
use std::sync::Arc;

pub struct SettingsInstance<S: Settings> {
    descriptor: Arc<SettingsDescriptor>,
    values: IndexMap<String, SettingValue>,
    /// Values as last loaded from or written to storage
    persisted: IndexMap<String, SettingValue>,
    loaded: bool,
    _settings: PhantomData<fn() -> S>,
}

impl<S: Settings> SettingsInstance<S> {
    /// Unloaded instance; hydrates on first access
    pub fn new(descriptor: Arc<SettingsDescriptor>) -> Self {
        Self {
            descriptor,
            values: IndexMap::new(),
            persisted: IndexMap::new(),
            loaded: false,
            _settings: PhantomData,
        }
    }

    /// Instance hydrated before it is returned
    pub async fn loaded(descriptor: Arc<SettingsDescriptor>) -> Result<Self, SettingsError> {
        let mut instance = Self::new(descriptor);
        instance.load_values().await?;
        Ok(instance)
    }

    pub fn descriptor(&self) -> &Arc<SettingsDescriptor> {
        &self.descriptor
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Read the whole group and populate every declared field
    pub async fn load_values(&mut self) -> Result<(), SettingsError> {
        let descriptor = self.descriptor.clone();
        let group = descriptor.group();
        publish_best_effort(
            descriptor.events(),
            SettingsEvent::loading(descriptor.type_name(), group),
        )
        .await;

        let raw = descriptor.repository().get_properties_in_group(group).await?;

        let mut values = IndexMap::new();
        for field in descriptor.fields() {
            let value = match raw.get(&field.name) {
                Some(payload) if !payload.is_null() => descriptor.decode(&field.name, payload)?,
                Some(_) if field.nullable => SettingValue::Null,
                _ => missing_value(group, field)?,
            };
            values.insert(field.name.clone(), value);
        }

        tracing::debug!(group = %group, fields = values.len(), "hydrated settings");
        self.persisted = values.clone();
        self.values = values;
        self.loaded = true;

        publish_best_effort(
            descriptor.events(),
            SettingsEvent::loaded(
                descriptor.type_name(),
                group,
                self.values.keys().cloned().collect(),
            ),
        )
        .await;
        Ok(())
    }

    /// Instance hydrated from a [`to_json`](Self::to_json) snapshot
    pub fn from_json(
        descriptor: Arc<SettingsDescriptor>,
        values: &Value,
    ) -> Result<Self, SettingsError> {
        let mut instance = Self::new(descriptor);
        instance.load_from_json(values)?;
        Ok(instance)
    }

    /// Hydrate from a [`to_json`](Self::to_json) snapshot without reading
    /// the repository. Absent fields fall back to defaults like `load_values`.
    pub fn load_from_json(&mut self, values: &Value) -> Result<(), SettingsError> {
        let descriptor = self.descriptor.clone();
        let Value::Object(object) = values else {
            return Err(SettingsError::InvalidSettingsType {
                type_name: descriptor.type_name().to_string(),
                reason: "settings snapshot is not a JSON object".to_string(),
            });
        };

        let mut loaded = IndexMap::new();
        for field in descriptor.fields() {
            let value = match object.get(&field.name) {
                Some(json) if !json.is_null() => descriptor.value_from_json(&field.name, json)?,
                Some(_) if field.nullable => SettingValue::Null,
                _ => missing_value(descriptor.group(), field)?,
            };
            descriptor.validate_value(&field.name, &value)?;
            loaded.insert(field.name.clone(), value);
        }

        tracing::debug!(
            group = %descriptor.group(),
            fields = loaded.len(),
            "hydrated settings from snapshot"
        );
        self.persisted = loaded.clone();
        self.values = loaded;
        self.loaded = true;
        Ok(())
    }

    async fn ensure_loaded(&mut self) -> Result<(), SettingsError> {
        if !self.loaded {
            self.load_values().await?;
        }
        Ok(())
    }

    /// Drop in-memory changes and re-read the group
    pub async fn refresh(&mut self) -> Result<(), SettingsError> {
        self.loaded = false;
        self.load_values().await
    }

    pub async fn get(&mut self, name: &str) -> Result<&SettingValue, SettingsError> {
        self.ensure_loaded().await?;
        self.values
            .get(name)
            .ok_or_else(|| self.descriptor.unknown_field(name))
    }

    /// Read a field as a Rust type
    pub async fn get_as<T: FromSettingValue>(&mut self, name: &str) -> Result<T, SettingsError> {
        let value = self.get(name).await?;
        T::from_setting_value(value).map_err(|e| SettingsError::InvalidValue {
            field: name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Assign a field in memory. Rejected if the field is locked.
    pub async fn set(
        &mut self,
        name: &str,
        value: impl Into<SettingValue>,
    ) -> Result<(), SettingsError> {
        self.ensure_loaded().await?;
        if self.descriptor.field(name).is_none() {
            return Err(self.descriptor.unknown_field(name));
        }
        if self.descriptor.is_locked(name).await? {
            return Err(SettingsError::LockedProperty {
                group: self.descriptor.group().to_string(),
                field: name.to_string(),
            });
        }

        let value = value.into();
        self.descriptor.validate_value(name, &value)?;
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Write every unlocked field back to storage in one repository call
    pub async fn save(&mut self) -> Result<(), SettingsError> {
        self.ensure_loaded().await?;
        let descriptor = self.descriptor.clone();
        let group = descriptor.group();
        let locked = descriptor.get_locked().await?;

        let mut payload = BTreeMap::new();
        for (name, value) in &self.values {
            if locked.contains(name) {
                if self.is_dirty(name) {
                    tracing::debug!(group = %group, field = %name, "skipping locked field on save");
                }
                continue;
            }
            payload.insert(name.clone(), descriptor.encode(name, value)?);
        }
        if payload.is_empty() {
            return Ok(());
        }

        let fields: Vec<String> = payload.keys().cloned().collect();
        publish_best_effort(
            descriptor.events(),
            SettingsEvent::saving(descriptor.type_name(), group, fields.clone()),
        )
        .await;

        descriptor
            .repository()
            .update_properties_in_group(group, payload)
            .await?;

        for name in &fields {
            if let Some(value) = self.values.get(name) {
                self.persisted.insert(name.clone(), value.clone());
            }
        }
        tracing::debug!(group = %group, fields = fields.len(), "saved settings");

        publish_best_effort(
            descriptor.events(),
            SettingsEvent::saved(descriptor.type_name(), group, fields),
        )
        .await;
        Ok(())
    }

    /// Whether the in-memory value differs from the stored one
    pub fn is_dirty(&self, name: &str) -> bool {
        self.values.get(name) != self.persisted.get(name)
    }

    pub fn dirty_fields(&self) -> Vec<&str> {
        self.values
            .keys()
            .filter(|name| self.is_dirty(name))
            .map(String::as_str)
            .collect()
    }

    pub async fn lock(&self, names: &[&str]) -> Result<(), SettingsError> {
        self.descriptor.lock(names).await
    }

    pub async fn unlock(&self, names: &[&str]) -> Result<(), SettingsError> {
        self.descriptor.unlock(names).await
    }

    pub async fn is_locked(&self, name: &str) -> Result<bool, SettingsError> {
        self.descriptor.is_locked(name).await
    }

    pub async fn locked_fields(&self) -> Result<BTreeSet<String>, SettingsError> {
        self.descriptor.get_locked().await
    }

    /// JSON object of all field values in declaration order
    pub async fn to_json(&mut self) -> Result<Value, SettingsError> {
        self.ensure_loaded().await?;
        Ok(Value::Object(
            self.values
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect::<Map<String, Value>>(),
        ))
    }

    /// Deserialize the current values into the settings struct
    pub async fn to_settings(&mut self) -> Result<S, SettingsError>
    where
        S: DeserializeOwned,
    {
        let json = self.to_json().await?;
        serde_json::from_value(json).map_err(|e| SettingsError::InvalidSettingsType {
            type_name: self.descriptor.type_name().to_string(),
            reason: format!("values do not deserialize into the settings type: {}", e),
        })
    }

    /// Assign every field whose value in `settings` differs from the current one
    pub async fn fill(&mut self, settings: &S) -> Result<(), SettingsError>
    where
        S: Serialize,
    {
        self.ensure_loaded().await?;
        let not_an_object = |reason: String| SettingsError::InvalidSettingsType {
            type_name: self.descriptor.type_name().to_string(),
            reason,
        };
        let Value::Object(object) =
            serde_json::to_value(settings).map_err(|e| not_an_object(e.to_string()))?
        else {
            return Err(not_an_object(
                "settings type does not serialize to an object".to_string(),
            ));
        };

        let descriptor = self.descriptor.clone();
        for field in descriptor.fields() {
            let Some(json) = object.get(&field.name) else {
                continue;
            };
            let current = self.values.get(&field.name).map(SettingValue::to_json);
            if current.as_ref() == Some(json) {
                continue;
            }
            let value = descriptor.value_from_json(&field.name, json)?;
            if self.values.get(&field.name) != Some(&value) {
                self.set(&field.name, value).await?;
            }
        }
        Ok(())
    }
}

/// Value of a field storage has nothing for: default, then `Null` if nullable
fn missing_value(group: &str, field: &FieldSpec) -> Result<SettingValue, SettingsError> {
    match &field.default {
        Some(default) => Ok(default.clone()),
        None if field.nullable => Ok(SettingValue::Null),
        None => Err(SettingsError::MissingRequiredValue {
            group: group.to_string(),
            field: field.name.clone(),
        }),
    }
}

impl<S: Settings> std::fmt::Debug for SettingsInstance<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsInstance")
            .field("group", &self.descriptor.group())
            .field("loaded", &self.loaded)
            .field("values", &self.values)
            .finish()
    }
}
