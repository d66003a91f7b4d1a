//! Descriptor registry
//!
//! Owns one descriptor per settings type together with the services every
//! descriptor is built from. Held by the host application; there is no
//! process-global state.

use super::cast::CastRegistry;
use super::descriptor::SettingsDescriptor;
use super::encryption::Encrypter;
use super::events::{EventPublisher, NoOpEventPublisher};
use super::instance::SettingsInstance;
use super::repository::RepositoryFactory;
use crate::contract::{Settings, SettingsError};
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

pub struct SettingsRegistry {
    casts: CastRegistry,
    repositories: RepositoryFactory,
    encrypter: Option<Arc<dyn Encrypter>>,
    events: Arc<dyn EventPublisher>,
    eager_load: bool,
    descriptors: RwLock<HashMap<TypeId, Arc<SettingsDescriptor>>>,
    by_name: RwLock<HashMap<String, TypeId>>,
}

impl SettingsRegistry {
    pub fn new(repositories: RepositoryFactory) -> Self {
        Self {
            casts: CastRegistry::new(),
            repositories,
            encrypter: None,
            events: Arc::new(NoOpEventPublisher),
            eager_load: false,
            descriptors: RwLock::new(HashMap::new()),
            by_name: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_casts(mut self, casts: CastRegistry) -> Self {
        self.casts = casts;
        self
    }

    pub fn with_encrypter(mut self, encrypter: Arc<dyn Encrypter>) -> Self {
        self.encrypter = Some(encrypter);
        self
    }

    pub fn with_event_publisher(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = events;
        self
    }

    /// Hydrate instances as soon as they are created
    pub fn with_eager_load(mut self, eager_load: bool) -> Self {
        self.eager_load = eager_load;
        self
    }

    pub fn repositories(&self) -> &RepositoryFactory {
        &self.repositories
    }

    /// Build and store the descriptor of `S`; a no-op if already registered
    pub fn register<S: Settings>(&self) -> Result<Arc<SettingsDescriptor>, SettingsError> {
        self.descriptor::<S>()
    }

    /// Descriptor of `S`, built on first use
    pub fn descriptor<S: Settings>(&self) -> Result<Arc<SettingsDescriptor>, SettingsError> {
        let type_id = TypeId::of::<S>();
        if let Some(descriptor) = self.descriptors.read().get(&type_id) {
            return Ok(descriptor.clone());
        }

        let built = Arc::new(SettingsDescriptor::for_type::<S>(
            &self.casts,
            &self.repositories,
            self.encrypter.clone(),
            self.events.clone(),
        )?);

        let mut descriptors = self.descriptors.write();
        // Another caller may have built it while we were not holding the lock
        let descriptor = descriptors.entry(type_id).or_insert(built).clone();
        self.by_name
            .write()
            .insert(descriptor.type_name().to_string(), type_id);
        tracing::debug!(settings_type = %descriptor.type_name(), "registered settings type");
        Ok(descriptor)
    }

    /// Descriptor of a registered type looked up by its type name
    pub fn descriptor_named(&self, type_name: &str) -> Result<Arc<SettingsDescriptor>, SettingsError> {
        let type_id = self.by_name.read().get(type_name).copied();
        type_id
            .and_then(|id| self.descriptors.read().get(&id).cloned())
            .ok_or_else(|| SettingsError::InvalidSettingsType {
                type_name: type_name.to_string(),
                reason: "not a registered settings type".to_string(),
            })
    }

    /// New instance of `S`; hydrated immediately when eager loading is on
    pub async fn instance<S: Settings>(&self) -> Result<SettingsInstance<S>, SettingsError> {
        let descriptor = self.descriptor::<S>()?;
        if self.eager_load {
            SettingsInstance::loaded(descriptor).await
        } else {
            Ok(SettingsInstance::new(descriptor))
        }
    }

    /// Type names of all registered settings types
    pub fn registered(&self) -> Vec<String> {
        let mut names: Vec<_> = self.by_name.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Forget cached lock state of every registered type
    pub fn clear_cached_locked_properties(&self) {
        for descriptor in self.descriptors.read().values() {
            descriptor.clear_cached_locked_properties();
        }
    }
}

impl std::fmt::Debug for SettingsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsRegistry")
            .field("repositories", &self.repositories)
            .field("casts", &self.casts)
            .field("eager_load", &self.eager_load)
            .field("registered", &self.registered())
            .finish_non_exhaustive()
    }
}
