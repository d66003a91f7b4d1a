//! Error types for typed settings
//!
//! Construction-time errors (`InvalidSettingsType`, `UnresolvableCast`,
//! `RepositoryNotConfigured`, `EncrypterMissing`) mean the settings definition
//! itself is wrong. The rest surface while loading, writing or saving values.

/// Typed settings errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The type is not a usable settings definition
    #[error("invalid settings type {type_name}: {reason}")]
    InvalidSettingsType { type_name: String, reason: String },

    /// No cast declared or known for a non-primitive field type
    #[error("cannot resolve a cast for field '{field}' of type {field_type}")]
    UnresolvableCast { field: String, field_type: String },

    /// Storage has no value for the requested property
    #[error("property not found: {group}.{name}")]
    PropertyNotFound { group: String, name: String },

    /// Hydration found no value and no default for a non-nullable field
    #[error("missing required value for {group}.{field}")]
    MissingRequiredValue { group: String, field: String },

    /// Write attempted against a locked field
    #[error("property is locked: {group}.{field}")]
    LockedProperty { group: String, field: String },

    /// Field is not declared by the settings definition
    #[error("unknown field '{field}' in settings group {group}")]
    UnknownField { group: String, field: String },

    /// Value does not fit the field's type or cast
    #[error("invalid value for field '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// Encrypting or decrypting a payload failed
    #[error("encryption failure on field '{field}': {reason}")]
    Encryption { field: String, reason: String },

    /// Encrypted fields were declared but no encrypter is configured
    #[error("settings type {type_name} declares encrypted fields but no encrypter is configured")]
    EncrypterMissing { type_name: String },

    /// The repository selector names an unknown repository
    #[error("settings repository not configured: {name}")]
    RepositoryNotConfigured { name: String },

    /// Backend failure, passed through unchanged
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Errors reported by repository implementations
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("property not found: {group}.{name}")]
    NotFound { group: String, name: String },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sea_orm::DbErr> for RepositoryError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Backend(err.into())
    }
}

impl From<RepositoryError> for SettingsError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { group, name } => Self::PropertyNotFound { group, name },
            RepositoryError::Backend(err) => Self::Backend(err),
        }
    }
}
