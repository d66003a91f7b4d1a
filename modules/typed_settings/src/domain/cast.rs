//! Field casts and cast resolution
//!
//! A field either passes its raw payload straight through (primitive types)
//! or gets a [`CastKind`], resolved once when the descriptor is built.

use crate::contract::{
    Cast, CastError, CastSpec, FieldSpec, FieldType, SettingValue, SettingsError,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Write as _};
use std::sync::Arc;

/// Builds a cast from the arguments of a `CastSpec::WithArgs` declaration
pub type CastFactory = Arc<dyn Fn(&[String]) -> Result<Arc<dyn Cast>, CastError> + Send + Sync>;

/// Resolved cast of a field
#[derive(Debug, Clone)]
pub enum CastKind {
    DateTime(DateTimeCast),
    Date(DateCast),
    Enum(EnumCast),
    Data(DataCast),
    ArrayOf(ArrayCast),
    Custom(Arc<dyn Cast>),
}

impl Cast for CastKind {
    fn get(&self, raw: &Value) -> Result<SettingValue, CastError> {
        match self {
            Self::DateTime(cast) => cast.get(raw),
            Self::Date(cast) => cast.get(raw),
            Self::Enum(cast) => cast.get(raw),
            Self::Data(cast) => cast.get(raw),
            Self::ArrayOf(cast) => cast.get(raw),
            Self::Custom(cast) => cast.get(raw),
        }
    }

    fn set(&self, value: &SettingValue) -> Result<Value, CastError> {
        match self {
            Self::DateTime(cast) => cast.set(value),
            Self::Date(cast) => cast.set(value),
            Self::Enum(cast) => cast.set(value),
            Self::Data(cast) => cast.set(value),
            Self::ArrayOf(cast) => cast.set(value),
            Self::Custom(cast) => cast.set(value),
        }
    }
}

/// Format without panicking on invalid format strings
fn render(formatted: &impl fmt::Display, format: &str) -> Result<String, CastError> {
    let mut text = String::new();
    write!(text, "{}", formatted)
        .map_err(|_| CastError::new(format!("invalid format string '{}'", format)))?;
    Ok(text)
}

fn expect_str<'a>(raw: &'a Value, what: &str) -> Result<&'a str, CastError> {
    raw.as_str()
        .ok_or_else(|| CastError::new(format!("expected {} string, found {}", what, raw)))
}

/// RFC 3339 timestamps in UTC, or a custom `chrono` format read as UTC
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateTimeCast {
    format: Option<String>,
}

impl DateTimeCast {
    pub fn with_format(format: impl Into<String>) -> Self {
        Self {
            format: Some(format.into()),
        }
    }
}

impl Cast for DateTimeCast {
    fn get(&self, raw: &Value) -> Result<SettingValue, CastError> {
        let text = expect_str(raw, "datetime")?;
        let parsed = match &self.format {
            Some(format) => NaiveDateTime::parse_from_str(text, format).map(|dt| dt.and_utc()),
            None => DateTime::parse_from_rfc3339(text).map(|dt| dt.with_timezone(&Utc)),
        };
        parsed
            .map(SettingValue::DateTime)
            .map_err(|e| CastError::new(format!("invalid datetime '{}': {}", text, e)))
    }

    fn set(&self, value: &SettingValue) -> Result<Value, CastError> {
        let SettingValue::DateTime(dt) = value else {
            return Err(CastError::new("expected a datetime value"));
        };
        let Some(format) = &self.format else {
            return Ok(Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)));
        };
        let text = render(&dt.format(format), format)?;
        // The stored text must read back as the same instant
        match NaiveDateTime::parse_from_str(&text, format) {
            Ok(parsed) if parsed.and_utc() == *dt => Ok(Value::String(text)),
            _ => Err(CastError::new(format!(
                "format '{}' cannot store {} exactly",
                format, dt
            ))),
        }
    }
}

/// Calendar dates, `%Y-%m-%d` unless a format is given
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateCast {
    format: String,
}

impl Default for DateCast {
    fn default() -> Self {
        Self {
            format: "%Y-%m-%d".to_string(),
        }
    }
}

impl DateCast {
    pub fn with_format(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
        }
    }
}

impl Cast for DateCast {
    fn get(&self, raw: &Value) -> Result<SettingValue, CastError> {
        let text = expect_str(raw, "date")?;
        NaiveDate::parse_from_str(text, &self.format)
            .map(SettingValue::Date)
            .map_err(|e| CastError::new(format!("invalid date '{}': {}", text, e)))
    }

    fn set(&self, value: &SettingValue) -> Result<Value, CastError> {
        let SettingValue::Date(d) = value else {
            return Err(CastError::new("expected a date value"));
        };
        let text = render(&d.format(&self.format), &self.format)?;
        match NaiveDate::parse_from_str(&text, &self.format) {
            Ok(parsed) if parsed == *d => Ok(Value::String(text)),
            _ => Err(CastError::new(format!(
                "format '{}' cannot store {} exactly",
                self.format, d
            ))),
        }
    }
}

/// String variants from a fixed list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumCast {
    variants: Vec<String>,
}

impl EnumCast {
    pub fn new(variants: Vec<String>) -> Self {
        Self { variants }
    }

    fn check(&self, variant: &str) -> Result<(), CastError> {
        if self.variants.iter().any(|v| v == variant) {
            Ok(())
        } else {
            Err(CastError::new(format!(
                "'{}' is not one of [{}]",
                variant,
                self.variants.join(", ")
            )))
        }
    }
}

impl Cast for EnumCast {
    fn get(&self, raw: &Value) -> Result<SettingValue, CastError> {
        let variant = expect_str(raw, "enum")?;
        self.check(variant)?;
        Ok(SettingValue::Enum(variant.to_string()))
    }

    fn set(&self, value: &SettingValue) -> Result<Value, CastError> {
        match value {
            SettingValue::Enum(variant) | SettingValue::String(variant) => {
                self.check(variant)?;
                Ok(Value::String(variant.clone()))
            }
            _ => Err(CastError::new("expected an enum variant")),
        }
    }
}

/// Nested aggregate stored as a JSON object, one key per nested field
#[derive(Debug, Clone)]
pub struct DataCast {
    fields: Vec<(FieldSpec, Option<CastKind>)>,
}

impl DataCast {
    fn field_from_raw(
        spec: &FieldSpec,
        cast: &Option<CastKind>,
        raw: Option<&Value>,
    ) -> Result<SettingValue, CastError> {
        match raw {
            Some(Value::Null) | None => {
                if let Some(default) = &spec.default {
                    Ok(default.clone())
                } else if spec.nullable {
                    Ok(SettingValue::Null)
                } else {
                    Err(CastError::new(format!("missing nested field '{}'", spec.name)))
                }
            }
            Some(raw) => match cast {
                Some(cast) => cast.get(raw),
                None => Ok(SettingValue::from_json(raw)),
            },
        }
    }
}

impl Cast for DataCast {
    fn get(&self, raw: &Value) -> Result<SettingValue, CastError> {
        let Value::Object(object) = raw else {
            return Err(CastError::new(format!("expected object, found {}", raw)));
        };
        let mut values = BTreeMap::new();
        for (spec, cast) in &self.fields {
            let value = Self::field_from_raw(spec, cast, object.get(&spec.name))?;
            values.insert(spec.name.clone(), value);
        }
        Ok(SettingValue::Map(values))
    }

    fn set(&self, value: &SettingValue) -> Result<Value, CastError> {
        let SettingValue::Map(values) = value else {
            return Err(CastError::new("expected a map value"));
        };
        let mut object = Map::new();
        for (spec, cast) in &self.fields {
            let raw = match values.get(&spec.name) {
                None | Some(SettingValue::Null) if spec.nullable => Value::Null,
                None | Some(SettingValue::Null) => {
                    return Err(CastError::new(format!("missing nested field '{}'", spec.name)))
                }
                Some(nested) => match cast {
                    Some(cast) => cast.set(nested)?,
                    None => nested.to_json(),
                },
            };
            object.insert(spec.name.clone(), raw);
        }
        Ok(Value::Object(object))
    }
}

/// List whose elements go through the element cast; `null` elements pass
#[derive(Debug, Clone)]
pub struct ArrayCast {
    element: Box<CastKind>,
}

impl ArrayCast {
    pub fn new(element: CastKind) -> Self {
        Self {
            element: Box::new(element),
        }
    }
}

impl Cast for ArrayCast {
    fn get(&self, raw: &Value) -> Result<SettingValue, CastError> {
        let Value::Array(items) = raw else {
            return Err(CastError::new(format!("expected array, found {}", raw)));
        };
        items
            .iter()
            .map(|item| match item {
                Value::Null => Ok(SettingValue::Null),
                item => self.element.get(item),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(SettingValue::List)
    }

    fn set(&self, value: &SettingValue) -> Result<Value, CastError> {
        let SettingValue::List(items) = value else {
            return Err(CastError::new("expected a list value"));
        };
        items
            .iter()
            .map(|item| match item {
                SettingValue::Null => Ok(Value::Null),
                item => self.element.set(item),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }
}

/// Application-provided casts.
///
/// Named casts are looked up by `CastSpec::Named`/`WithArgs` before the
/// built-in names. Global casts apply to every `FieldType::Other` field of
/// the registered type name that has no explicit declaration.
#[derive(Clone, Default)]
pub struct CastRegistry {
    named: HashMap<String, CastFactory>,
    global: HashMap<String, CastFactory>,
}

impl CastRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_named<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&[String]) -> Result<Arc<dyn Cast>, CastError> + Send + Sync + 'static,
    {
        self.named.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn register_global<F>(&mut self, type_name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&[String]) -> Result<Arc<dyn Cast>, CastError> + Send + Sync + 'static,
    {
        self.global.insert(type_name.into(), Arc::new(factory));
        self
    }
}

impl std::fmt::Debug for CastRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CastRegistry")
            .field("named", &self.named.keys().collect::<Vec<_>>())
            .field("global", &self.global.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn unresolvable(field: &FieldSpec) -> SettingsError {
    SettingsError::UnresolvableCast {
        field: field.name.clone(),
        field_type: field.field_type.to_string(),
    }
}

fn invalid_declaration(field: &FieldSpec, err: CastError) -> SettingsError {
    SettingsError::InvalidValue {
        field: field.name.clone(),
        reason: format!("bad cast declaration: {}", err),
    }
}

/// Resolve the cast of one field.
///
/// `Ok(None)` means the field's raw payload is used as-is.
pub fn resolve(
    field: &FieldSpec,
    explicit: &HashMap<String, CastSpec>,
    registry: &CastRegistry,
) -> Result<Option<CastKind>, SettingsError> {
    if let Some(spec) = explicit.get(&field.name) {
        return instantiate(field, spec, registry).map(Some);
    }
    resolve_by_type(field, &field.field_type, registry)
}

const NO_ARGS: &[String] = &[];

fn instantiate(
    field: &FieldSpec,
    spec: &CastSpec,
    registry: &CastRegistry,
) -> Result<CastKind, SettingsError> {
    let (name, args): (&str, &[String]) = match spec {
        CastSpec::Custom(cast) => return Ok(CastKind::Custom(cast.clone())),
        CastSpec::Named(name) => (name.as_str(), NO_ARGS),
        CastSpec::WithArgs(name, args) => (name.as_str(), args.as_slice()),
    };

    if let Some(factory) = registry.named.get(name) {
        return factory(args)
            .map(CastKind::Custom)
            .map_err(|e| invalid_declaration(field, e));
    }

    let kind = match name {
        "datetime" => CastKind::DateTime(match args.first() {
            Some(format) => DateTimeCast::with_format(format.clone()),
            None => DateTimeCast::default(),
        }),
        "date" => CastKind::Date(match args.first() {
            Some(format) => DateCast::with_format(format.clone()),
            None => DateCast::default(),
        }),
        "enum" => {
            let variants = match (&field.field_type, args.is_empty()) {
                (_, false) => args.to_vec(),
                (FieldType::Enum(variants), true) => variants.clone(),
                _ => return Err(unresolvable(field)),
            };
            CastKind::Enum(EnumCast::new(variants))
        }
        "data" | "array" => match resolve_by_type(field, &field.field_type, registry)? {
            Some(kind) => kind,
            None => return Err(unresolvable(field)),
        },
        _ => return Err(unresolvable(field)),
    };
    Ok(kind)
}

fn resolve_by_type(
    field: &FieldSpec,
    field_type: &FieldType,
    registry: &CastRegistry,
) -> Result<Option<CastKind>, SettingsError> {
    if field_type.is_primitive() {
        return Ok(None);
    }

    let kind = match field_type {
        FieldType::DateTime => CastKind::DateTime(DateTimeCast::default()),
        FieldType::Date => CastKind::Date(DateCast::default()),
        FieldType::Enum(variants) => CastKind::Enum(EnumCast::new(variants.clone())),
        FieldType::Data(nested) => {
            let no_overrides = HashMap::new();
            let fields = nested
                .iter()
                .map(|spec| Ok((spec.clone(), resolve(spec, &no_overrides, registry)?)))
                .collect::<Result<Vec<_>, SettingsError>>()?;
            CastKind::Data(DataCast { fields })
        }
        FieldType::ArrayOf(element) => match resolve_by_type(field, element, registry)? {
            Some(element) => CastKind::ArrayOf(ArrayCast::new(element)),
            None => return Ok(None),
        },
        FieldType::Other(type_name) => match registry.global.get(type_name) {
            Some(factory) => {
                CastKind::Custom(factory(NO_ARGS).map_err(|e| invalid_declaration(field, e))?)
            }
            None => return Err(unresolvable(field)),
        },
        _ => return Err(unresolvable(field)),
    };

    tracing::debug!(field = %field.name, field_type = %field_type, "resolved built-in cast");
    Ok(Some(kind))
}
