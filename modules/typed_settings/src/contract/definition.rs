//! Static configuration of a settings type
//!
//! A settings type implements [`Settings`] to declare its group, field schema,
//! cast overrides, encrypted fields and repository. The descriptor reads this
//! once, at construction.

use super::model::{FieldSpec, SettingValue};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Failure converting between raw and typed form
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct CastError(pub String);

impl CastError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Bidirectional converter between a persisted payload and a typed value.
///
/// `set(get(raw)) == raw` and `get(set(value)) == value` must hold for every
/// value the cast accepts.
pub trait Cast: Send + Sync + fmt::Debug {
    /// Raw payload to typed value
    fn get(&self, raw: &Value) -> Result<SettingValue, CastError>;

    /// Typed value to raw payload
    fn set(&self, value: &SettingValue) -> Result<Value, CastError>;
}

/// Explicit cast declaration for a field
#[derive(Clone)]
pub enum CastSpec {
    /// Cast referenced by name, e.g. `datetime`
    Named(String),
    /// Cast referenced by name with constructor arguments
    WithArgs(String, Vec<String>),
    /// Ready-made cast instance
    Custom(Arc<dyn Cast>),
}

impl CastSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn with_args<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::WithArgs(name.into(), args.into_iter().map(Into::into).collect())
    }

    pub fn custom(cast: impl Cast + 'static) -> Self {
        Self::Custom(Arc::new(cast))
    }

    /// Parse the compact `name:arg1,arg2` form. Only the first `:` separates
    /// the name, so arguments may themselves contain colons.
    pub fn parse(spec: &str) -> Self {
        match spec.split_once(':') {
            Some((name, args)) if !args.is_empty() => Self::WithArgs(
                name.trim().to_string(),
                args.split(',').map(|a| a.trim().to_string()).collect(),
            ),
            Some((name, _)) => Self::Named(name.trim().to_string()),
            None => Self::Named(spec.trim().to_string()),
        }
    }
}

impl fmt::Debug for CastSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::WithArgs(name, args) => f.debug_tuple("WithArgs").field(name).field(args).finish(),
            Self::Custom(cast) => f.debug_tuple("Custom").field(cast).finish(),
        }
    }
}

/// Everything a descriptor needs to know about a settings type
#[derive(Debug, Clone)]
pub struct SettingsDefinition {
    pub type_name: String,
    pub group: String,
    pub fields: Vec<FieldSpec>,
    pub casts: Vec<(String, CastSpec)>,
    pub encrypted: Vec<String>,
    pub repository: Option<String>,
}

impl SettingsDefinition {
    pub fn new(type_name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            group: group.into(),
            fields: Vec::new(),
            casts: Vec::new(),
            encrypted: Vec::new(),
            repository: None,
        }
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn cast(mut self, field: impl Into<String>, spec: CastSpec) -> Self {
        self.casts.push((field.into(), spec));
        self
    }

    pub fn encrypted(mut self, field: impl Into<String>) -> Self {
        self.encrypted.push(field.into());
        self
    }

    pub fn repository(mut self, name: impl Into<String>) -> Self {
        self.repository = Some(name.into());
        self
    }
}

/// A settings type: a struct whose fields are bound to one storage group.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct GeneralSettings { site_name: String, site_active: bool }
///
/// impl Settings for GeneralSettings {
///     fn group() -> &'static str { "general" }
///     fn schema() -> Vec<FieldSpec> {
///         vec![
///             FieldSpec::new("site_name", FieldType::String),
///             FieldSpec::new("site_active", FieldType::Bool).with_default(true),
///         ]
///     }
/// }
/// ```
pub trait Settings: Send + Sync + 'static {
    /// Storage namespace of this type's values and lock state
    fn group() -> &'static str;

    /// Ordered field schema
    fn schema() -> Vec<FieldSpec>;

    /// Repository name; `None` selects the default repository
    fn repository() -> Option<&'static str> {
        None
    }

    /// Explicit cast declarations, keyed by field name
    fn casts() -> Vec<(&'static str, CastSpec)> {
        Vec::new()
    }

    /// Fields encrypted at rest
    fn encrypted() -> &'static [&'static str] {
        &[]
    }

    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    fn definition() -> SettingsDefinition {
        SettingsDefinition {
            type_name: Self::type_name().to_string(),
            group: Self::group().to_string(),
            fields: Self::schema(),
            casts: Self::casts()
                .into_iter()
                .map(|(name, spec)| (name.to_string(), spec))
                .collect(),
            encrypted: Self::encrypted().iter().map(|s| s.to_string()).collect(),
            repository: Self::repository().map(str::to_string),
        }
    }
}
