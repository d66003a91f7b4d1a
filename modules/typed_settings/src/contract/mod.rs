//! Contract layer - types a settings definition and its callers depend on
//!
//! Field schema, typed values, the `Settings` trait and the error taxonomy.
//! No storage or runtime concerns live here.

pub mod definition;
pub mod error;
pub mod model;

pub use definition::{Cast, CastError, CastSpec, Settings, SettingsDefinition};
pub use error::{RepositoryError, SettingsError};
pub use model::{FieldSpec, FieldType, FromSettingValue, SettingValue, ValueTypeError};
