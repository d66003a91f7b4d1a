//! Domain layer - casting, binding and locking engine

pub mod cast;
pub mod descriptor;
pub mod encryption;
pub mod events;
pub mod instance;
pub mod registry;
pub mod repository;
pub mod validation;

pub use cast::{CastKind, CastRegistry};
pub use descriptor::SettingsDescriptor;
pub use encryption::{AesGcmEncrypter, Encrypter, EncryptionError};
pub use events::{EventPublisher, NoOpEventPublisher, SettingsEvent};
pub use instance::SettingsInstance;
pub use registry::SettingsRegistry;
pub use repository::{RepositoryFactory, SettingsRepository};
