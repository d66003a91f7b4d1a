//! Typed Settings Module
//!
//! Binds strongly-typed settings objects to grouped key/value storage.
//! Each settings type declares a group and a field schema; fields are cast
//! between raw JSON payloads and typed values, optionally encrypted at rest
//! and individually lockable against writes.

// Public exports
pub mod contract;
pub use contract::{
    Cast, CastError, CastSpec, FieldSpec, FieldType, RepositoryError, SettingValue, Settings,
    SettingsDefinition, SettingsError,
};

pub mod module;
pub use module::SettingsModule;

pub mod config;
pub use config::{Config, RepositoryConfig};

pub mod domain;
pub use domain::{
    CastRegistry, Encrypter, EventPublisher, RepositoryFactory, SettingsDescriptor,
    SettingsInstance, SettingsRegistry, SettingsRepository,
};

pub mod infra;
pub use infra::{InMemorySettingsRepository, SeaOrmSettingsRepository};
