//! Contract models for typed settings
//!
//! Field schema declared by a settings definition and the typed values that
//! flow between a settings instance and its casts.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Declared type of a settings field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Bool,
    Int,
    Float,
    String,
    /// Plain list of primitive values
    Array,
    /// Plain string-keyed mapping of primitive values
    Map,
    /// Point in time, stored as RFC 3339 UTC unless a format is given
    DateTime,
    /// Calendar date
    Date,
    /// One of a fixed set of string variants
    Enum(Vec<String>),
    /// Nested aggregate with its own field schema
    Data(Vec<FieldSpec>),
    /// List whose elements have the given type
    ArrayOf(Box<FieldType>),
    /// Application type without a built-in cast (needs an explicit or global cast)
    Other(String),
}

impl FieldType {
    /// Primitive types are stored as-is and never need a cast
    pub fn is_primitive(&self) -> bool {
        match self {
            Self::Bool | Self::Int | Self::Float | Self::String | Self::Array | Self::Map => true,
            Self::ArrayOf(inner) => inner.is_primitive(),
            _ => false,
        }
    }

    /// Whether an in-memory value is acceptable for this type.
    ///
    /// `Null` is handled by the caller (field nullability).
    pub fn accepts(&self, value: &SettingValue) -> bool {
        match (self, value) {
            (Self::Bool, SettingValue::Bool(_)) => true,
            (Self::Int, SettingValue::Int(_)) => true,
            (Self::Float, SettingValue::Float(_) | SettingValue::Int(_)) => true,
            (Self::String, SettingValue::String(_)) => true,
            (Self::Array, SettingValue::List(_)) => true,
            (Self::Map, SettingValue::Map(_)) => true,
            (Self::DateTime, SettingValue::DateTime(_)) => true,
            (Self::Date, SettingValue::Date(_)) => true,
            (Self::Enum(variants), SettingValue::Enum(v) | SettingValue::String(v)) => {
                variants.iter().any(|candidate| candidate == v)
            }
            (Self::Data(_), SettingValue::Map(_)) => true,
            (Self::ArrayOf(inner), SettingValue::List(items)) => items
                .iter()
                .all(|item| item.is_null() || inner.accepts(item)),
            // Custom casts decide for themselves
            (Self::Other(_), _) => true,
            _ => false,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::String => write!(f, "string"),
            Self::Array => write!(f, "array"),
            Self::Map => write!(f, "map"),
            Self::DateTime => write!(f, "datetime"),
            Self::Date => write!(f, "date"),
            Self::Enum(variants) => write!(f, "enum({})", variants.join("|")),
            Self::Data(fields) => write!(f, "data({} fields)", fields.len()),
            Self::ArrayOf(inner) => write!(f, "array<{}>", inner),
            Self::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Schema entry for one settings field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    /// Field name, also the property name in storage
    pub name: String,
    /// Declared type
    pub field_type: FieldType,
    /// Whether `Null` is a valid value
    pub nullable: bool,
    /// Value used when storage has nothing for this field
    pub default: Option<SettingValue>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: false,
            default: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_default(mut self, default: impl Into<SettingValue>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Typed in-memory value of a settings field
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<SettingValue>),
    Map(BTreeMap<String, SettingValue>),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    Enum(String),
}

impl SettingValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// False if any float inside the value is NaN or infinite; JSON has no
    /// representation for those
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Float(f) => f.is_finite(),
            Self::List(items) => items.iter().all(Self::is_finite),
            Self::Map(map) => map.values().all(Self::is_finite),
            _ => true,
        }
    }

    /// Structural conversion of a raw payload, used for pass-through fields
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            Value::Object(map) => Self::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Inverse of [`SettingValue::to_json`] for a declared type: reads the
    /// serde form of a settings struct field back into a typed value.
    pub fn from_json_as(field_type: &FieldType, value: &Value) -> Result<Self, ValueTypeError> {
        let found = || Self::from_json(value).kind();
        match (field_type, value) {
            (_, Value::Null) => Ok(Self::Null),
            (FieldType::DateTime, Value::String(s)) => DateTime::parse_from_rfc3339(s)
                .map(|dt| Self::DateTime(dt.with_timezone(&Utc)))
                .map_err(|_| ValueTypeError {
                    expected: "RFC 3339 datetime",
                    found: "string",
                }),
            (FieldType::DateTime, _) => Err(ValueTypeError {
                expected: "datetime",
                found: found(),
            }),
            (FieldType::Date, Value::String(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(Self::Date)
                .map_err(|_| ValueTypeError {
                    expected: "date",
                    found: "string",
                }),
            (FieldType::Date, _) => Err(ValueTypeError {
                expected: "date",
                found: found(),
            }),
            (FieldType::Enum(_), Value::String(s)) => Ok(Self::Enum(s.clone())),
            (FieldType::Enum(_), _) => Err(ValueTypeError {
                expected: "enum",
                found: found(),
            }),
            (FieldType::Data(fields), Value::Object(object)) => fields
                .iter()
                .map(|spec| {
                    let nested = object.get(&spec.name).unwrap_or(&Value::Null);
                    Ok((spec.name.clone(), Self::from_json_as(&spec.field_type, nested)?))
                })
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(Self::Map),
            (FieldType::ArrayOf(inner), Value::Array(items)) => items
                .iter()
                .map(|item| Self::from_json_as(inner, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Self::List),
            _ => Ok(Self::from_json(value)),
        }
    }

    /// JSON view of the value; temporal values use their canonical text forms
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::Number((*i).into()),
            Self::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            Self::String(s) | Self::Enum(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<String, Value>>(),
            ),
            Self::DateTime(dt) => {
                Value::String(dt.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true))
            }
            Self::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::DateTime(_) => "datetime",
            Self::Date(_) => "date",
            Self::Enum(_) => "enum",
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for SettingValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<u32> for SettingValue {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<DateTime<Utc>> for SettingValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value)
    }
}

impl From<NaiveDate> for SettingValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl<T: Into<SettingValue>> From<Vec<T>> for SettingValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<SettingValue>> From<Option<T>> for SettingValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Conversion error from a typed value into a Rust type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected {expected}, found {found}")]
pub struct ValueTypeError {
    pub expected: &'static str,
    pub found: &'static str,
}

/// Read a Rust value out of a [`SettingValue`]
pub trait FromSettingValue: Sized {
    fn from_setting_value(value: &SettingValue) -> Result<Self, ValueTypeError>;
}

fn mismatch<T>(expected: &'static str, value: &SettingValue) -> Result<T, ValueTypeError> {
    Err(ValueTypeError {
        expected,
        found: value.kind(),
    })
}

impl FromSettingValue for SettingValue {
    fn from_setting_value(value: &SettingValue) -> Result<Self, ValueTypeError> {
        Ok(value.clone())
    }
}

impl FromSettingValue for bool {
    fn from_setting_value(value: &SettingValue) -> Result<Self, ValueTypeError> {
        match value {
            SettingValue::Bool(b) => Ok(*b),
            other => mismatch("bool", other),
        }
    }
}

impl FromSettingValue for i64 {
    fn from_setting_value(value: &SettingValue) -> Result<Self, ValueTypeError> {
        match value {
            SettingValue::Int(i) => Ok(*i),
            other => mismatch("int", other),
        }
    }
}

impl FromSettingValue for f64 {
    fn from_setting_value(value: &SettingValue) -> Result<Self, ValueTypeError> {
        match value {
            SettingValue::Float(f) => Ok(*f),
            SettingValue::Int(i) => Ok(*i as f64),
            other => mismatch("float", other),
        }
    }
}

impl FromSettingValue for String {
    fn from_setting_value(value: &SettingValue) -> Result<Self, ValueTypeError> {
        match value {
            SettingValue::String(s) | SettingValue::Enum(s) => Ok(s.clone()),
            other => mismatch("string", other),
        }
    }
}

impl FromSettingValue for DateTime<Utc> {
    fn from_setting_value(value: &SettingValue) -> Result<Self, ValueTypeError> {
        match value {
            SettingValue::DateTime(dt) => Ok(*dt),
            other => mismatch("datetime", other),
        }
    }
}

impl FromSettingValue for NaiveDate {
    fn from_setting_value(value: &SettingValue) -> Result<Self, ValueTypeError> {
        match value {
            SettingValue::Date(d) => Ok(*d),
            other => mismatch("date", other),
        }
    }
}

impl<T: FromSettingValue> FromSettingValue for Vec<T> {
    fn from_setting_value(value: &SettingValue) -> Result<Self, ValueTypeError> {
        match value {
            SettingValue::List(items) => items.iter().map(T::from_setting_value).collect(),
            other => mismatch("list", other),
        }
    }
}

impl<T: FromSettingValue> FromSettingValue for Option<T> {
    fn from_setting_value(value: &SettingValue) -> Result<Self, ValueTypeError> {
        match value {
            SettingValue::Null => Ok(None),
            other => T::from_setting_value(other).map(Some),
        }
    }
}
