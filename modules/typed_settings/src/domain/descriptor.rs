//! Per-type settings descriptor
//!
//! Built once per settings type. Binds each declared field to its cast, knows
//! which fields are encrypted, owns the bound repository and caches the
//! group's locked field names for every instance of the type.

use super::cast::{self, CastKind, CastRegistry};
use super::encryption::Encrypter;
use super::events::{publish_best_effort, EventPublisher, SettingsEvent};
use super::repository::{RepositoryFactory, SettingsRepository};
use super::validation::validate_definition;
use crate::contract::{
    Cast, FieldSpec, FieldType, Settings, SettingValue, SettingsDefinition, SettingsError,
};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

pub struct SettingsDescriptor {
    type_name: String,
    group: String,
    fields: IndexMap<String, FieldSpec>,
    casts: IndexMap<String, Option<CastKind>>,
    encrypted: BTreeSet<String>,
    /// `None` until fetched; afterwards a full snapshot of the group's locks
    locked: RwLock<Option<BTreeSet<String>>>,
    repository: Arc<dyn SettingsRepository>,
    encrypter: Option<Arc<dyn Encrypter>>,
    events: Arc<dyn EventPublisher>,
}

impl SettingsDescriptor {
    /// Build a descriptor from a settings definition.
    ///
    /// Fails with `InvalidSettingsType` for malformed definitions,
    /// `UnresolvableCast` when a field has no usable cast,
    /// `RepositoryNotConfigured` for an unknown repository selector and
    /// `EncrypterMissing` when encrypted fields have no encrypter.
    pub fn new(
        definition: SettingsDefinition,
        casts: &CastRegistry,
        repositories: &RepositoryFactory,
        encrypter: Option<Arc<dyn Encrypter>>,
        events: Arc<dyn EventPublisher>,
    ) -> Result<Self, SettingsError> {
        let declared = validate_definition(&definition)?;

        let explicit: HashMap<_, _> = definition.casts.into_iter().collect();
        let mut fields = IndexMap::with_capacity(declared.len());
        let mut resolved = IndexMap::with_capacity(declared.len());
        for field in declared {
            let kind = cast::resolve(&field, &explicit, casts)?;
            resolved.insert(field.name.clone(), kind);
            fields.insert(field.name.clone(), field);
        }

        let encrypted: BTreeSet<String> = definition.encrypted.into_iter().collect();
        if !encrypted.is_empty() && encrypter.is_none() {
            return Err(SettingsError::EncrypterMissing {
                type_name: definition.type_name,
            });
        }

        let repository = repositories.resolve(definition.repository.as_deref())?;

        tracing::debug!(
            settings_type = %definition.type_name,
            group = %definition.group,
            fields = fields.len(),
            encrypted = encrypted.len(),
            "built settings descriptor"
        );

        Ok(Self {
            type_name: definition.type_name,
            group: definition.group,
            fields,
            casts: resolved,
            encrypted,
            locked: RwLock::new(None),
            repository,
            encrypter,
            events,
        })
    }

    /// Build the descriptor of a [`Settings`] type
    pub fn for_type<S: Settings>(
        casts: &CastRegistry,
        repositories: &RepositoryFactory,
        encrypter: Option<Arc<dyn Encrypter>>,
        events: Arc<dyn EventPublisher>,
    ) -> Result<Self, SettingsError> {
        Self::new(S::definition(), casts, repositories, encrypter, events)
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Declared fields in declaration order
    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.values()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn repository(&self) -> &Arc<dyn SettingsRepository> {
        &self.repository
    }

    pub(crate) fn events(&self) -> &dyn EventPublisher {
        self.events.as_ref()
    }

    pub fn is_encrypted(&self, name: &str) -> bool {
        self.encrypted.contains(name)
    }

    /// Cast of a field; `None` for pass-through and unknown fields
    pub fn get_cast(&self, name: &str) -> Option<&CastKind> {
        self.casts.get(name).and_then(Option::as_ref)
    }

    pub async fn is_locked(&self, name: &str) -> Result<bool, SettingsError> {
        Ok(self.get_locked().await?.contains(name))
    }

    /// Locked field names, fetched from the repository on first use
    pub async fn get_locked(&self) -> Result<BTreeSet<String>, SettingsError> {
        let cached = self.locked.read().clone();
        if let Some(locked) = cached {
            return Ok(locked);
        }

        let fetched = self.repository.get_locked_properties(&self.group).await?;
        tracing::debug!(group = %self.group, locked = fetched.len(), "fetched locked properties");
        *self.locked.write() = Some(fetched.clone());
        Ok(fetched)
    }

    /// Lock fields in storage, then add them to the cached set
    pub async fn lock(&self, names: &[&str]) -> Result<(), SettingsError> {
        let names = self.known_fields(names)?;
        let mut locked = self.get_locked().await?;

        self.repository.lock_properties(&self.group, &names).await?;
        locked.extend(names.iter().cloned());
        *self.locked.write() = Some(locked);

        tracing::info!(group = %self.group, fields = ?names, "locked settings properties");
        publish_best_effort(
            self.events(),
            SettingsEvent::locked(&self.type_name, &self.group, names),
        )
        .await;
        Ok(())
    }

    /// Unlock fields in storage, then remove them from the cached set
    pub async fn unlock(&self, names: &[&str]) -> Result<(), SettingsError> {
        let names = self.known_fields(names)?;
        let mut locked = self.get_locked().await?;

        self.repository.unlock_properties(&self.group, &names).await?;
        for name in &names {
            locked.remove(name);
        }
        *self.locked.write() = Some(locked);

        tracing::info!(group = %self.group, fields = ?names, "unlocked settings properties");
        publish_best_effort(
            self.events(),
            SettingsEvent::unlocked(&self.type_name, &self.group, names),
        )
        .await;
        Ok(())
    }

    /// Forget the cached lock state; the next lookup hits the repository
    pub fn clear_cached_locked_properties(&self) {
        *self.locked.write() = None;
    }

    fn known_fields(&self, names: &[&str]) -> Result<Vec<String>, SettingsError> {
        names
            .iter()
            .map(|name| {
                if self.fields.contains_key(*name) {
                    Ok(name.to_string())
                } else {
                    Err(self.unknown_field(name))
                }
            })
            .collect()
    }

    pub(crate) fn unknown_field(&self, name: &str) -> SettingsError {
        SettingsError::UnknownField {
            group: self.group.clone(),
            field: name.to_string(),
        }
    }

    /// Check a value against the field's nullability and its cast.
    ///
    /// Fields with a cast accept exactly what the cast can store; the rest
    /// are checked against the declared type.
    pub fn validate_value(&self, name: &str, value: &SettingValue) -> Result<(), SettingsError> {
        let field = self.field(name).ok_or_else(|| self.unknown_field(name))?;
        let invalid = |reason: String| SettingsError::InvalidValue {
            field: name.to_string(),
            reason,
        };

        if value.is_null() {
            return if field.nullable {
                Ok(())
            } else {
                Err(invalid(format!("{} is not nullable", field.field_type)))
            };
        }
        if !value.is_finite() {
            return Err(invalid(format!("{:?} is not a finite number", value)));
        }

        match self.get_cast(name) {
            Some(cast) => cast
                .set(value)
                .map(|_| ())
                .map_err(|e| invalid(e.to_string())),
            None if field.field_type.accepts(value) => Ok(()),
            None => Err(invalid(format!(
                "{:?} is not a valid {}",
                value, field.field_type
            ))),
        }
    }

    /// Typed value from the JSON view produced by [`SettingValue::to_json`].
    ///
    /// The declared type is tried first. When the field's cast does not
    /// store that reading, temporal readings are tried, then the cast's own
    /// parser.
    pub fn value_from_json(&self, name: &str, json: &Value) -> Result<SettingValue, SettingsError> {
        let field = self.field(name).ok_or_else(|| self.unknown_field(name))?;
        let invalid = |reason: String| SettingsError::InvalidValue {
            field: name.to_string(),
            reason,
        };

        let declared = SettingValue::from_json_as(&field.field_type, json)
            .map_err(|e| invalid(e.to_string()))?;
        let Some(cast) = self.get_cast(name) else {
            return Ok(declared);
        };
        if declared.is_null() || cast.set(&declared).is_ok() {
            return Ok(declared);
        }

        for field_type in [FieldType::DateTime, FieldType::Date] {
            if let Ok(value) = SettingValue::from_json_as(&field_type, json) {
                if cast.set(&value).is_ok() {
                    return Ok(value);
                }
            }
        }
        cast.get(json).map_err(|e| invalid(e.to_string()))
    }

    /// Raw payload to typed value: decrypt if flagged, then cast
    pub fn decode(&self, name: &str, raw: &Value) -> Result<SettingValue, SettingsError> {
        if raw.is_null() {
            return Ok(SettingValue::Null);
        }

        let decrypted;
        let raw = if self.is_encrypted(name) {
            decrypted = self.decrypt(name, raw)?;
            &decrypted
        } else {
            raw
        };

        match self.get_cast(name) {
            Some(cast) => cast.get(raw).map_err(|e| SettingsError::InvalidValue {
                field: name.to_string(),
                reason: e.to_string(),
            }),
            None => Ok(SettingValue::from_json(raw)),
        }
    }

    /// Typed value to raw payload: cast, then encrypt if flagged
    pub fn encode(&self, name: &str, value: &SettingValue) -> Result<Value, SettingsError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        if !value.is_finite() {
            return Err(SettingsError::InvalidValue {
                field: name.to_string(),
                reason: format!("{:?} is not a finite number", value),
            });
        }

        let raw = match self.get_cast(name) {
            Some(cast) => cast.set(value).map_err(|e| SettingsError::InvalidValue {
                field: name.to_string(),
                reason: e.to_string(),
            })?,
            None => value.to_json(),
        };

        if self.is_encrypted(name) {
            self.encrypt(name, &raw)
        } else {
            Ok(raw)
        }
    }

    fn encrypter(&self, name: &str) -> Result<&dyn Encrypter, SettingsError> {
        self.encrypter
            .as_deref()
            .ok_or_else(|| SettingsError::Encryption {
                field: name.to_string(),
                reason: "no encrypter configured".to_string(),
            })
    }

    fn encrypt(&self, name: &str, raw: &Value) -> Result<Value, SettingsError> {
        let failure = |reason: String| SettingsError::Encryption {
            field: name.to_string(),
            reason,
        };
        let plaintext = serde_json::to_string(raw).map_err(|e| failure(e.to_string()))?;
        let sealed = self
            .encrypter(name)?
            .encrypt(&plaintext)
            .map_err(|e| failure(e.to_string()))?;
        Ok(Value::String(sealed))
    }

    fn decrypt(&self, name: &str, raw: &Value) -> Result<Value, SettingsError> {
        let failure = |reason: String| SettingsError::Encryption {
            field: name.to_string(),
            reason,
        };
        let sealed = raw
            .as_str()
            .ok_or_else(|| failure("encrypted payload is not a string".to_string()))?;
        let plaintext = self
            .encrypter(name)?
            .decrypt(sealed)
            .map_err(|e| failure(e.to_string()))?;
        serde_json::from_str(&plaintext).map_err(|e| failure(e.to_string()))
    }
}

impl fmt::Debug for SettingsDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsDescriptor")
            .field("type_name", &self.type_name)
            .field("group", &self.group)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("encrypted", &self.encrypted)
            .field("locked", &*self.locked.read())
            .finish_non_exhaustive()
    }
}
