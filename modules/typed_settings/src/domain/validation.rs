//! Validation of settings definitions

use crate::contract::{FieldSpec, SettingsDefinition, SettingsError};
use std::collections::HashSet;

/// Names owned by the instance machinery; never bound to storage.
pub const RESERVED_FIELDS: &[&str] = &[
    "loaded",
    "locked",
    "encrypter",
    "repository",
    "descriptor",
    "exists",
    "timestamps",
    "incrementing",
    "snake_attributes",
    "prevents_lazy_loading",
    "was_recently_created",
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_FIELDS.contains(&name)
}

/// Validate a group name
///
/// Accepts identifiers that start with an alphanumeric character and contain
/// only alphanumeric characters, `_`, `.` and `-`.
pub fn validate_group(group: &str) -> Result<(), String> {
    let Some(first) = group.chars().next() else {
        return Err("group cannot be empty".to_string());
    };
    if !first.is_alphanumeric() {
        return Err(format!(
            "group '{}' must start with alphanumeric character",
            group
        ));
    }
    if !group
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '-')
    {
        return Err(format!(
            "group '{}' contains invalid characters. Only alphanumeric, '_', '.', and '-' are allowed",
            group
        ));
    }
    Ok(())
}

fn validate_field_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("field name cannot be empty".to_string());
    }
    if !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(format!(
            "field name '{}' may only contain alphanumeric characters and '_'",
            name
        ));
    }
    Ok(())
}

/// Check a definition and return its bindable fields (reserved names removed)
pub fn validate_definition(definition: &SettingsDefinition) -> Result<Vec<FieldSpec>, SettingsError> {
    let invalid = |reason: String| SettingsError::InvalidSettingsType {
        type_name: definition.type_name.clone(),
        reason,
    };

    validate_group(&definition.group).map_err(invalid)?;

    let mut seen = HashSet::new();
    let mut fields = Vec::with_capacity(definition.fields.len());
    for field in &definition.fields {
        validate_field_name(&field.name).map_err(invalid)?;
        if !seen.insert(field.name.as_str()) {
            return Err(invalid(format!("field '{}' is declared twice", field.name)));
        }
        if is_reserved(&field.name) {
            tracing::debug!(
                settings_type = %definition.type_name,
                field = %field.name,
                "skipping reserved field name"
            );
            continue;
        }
        fields.push(field.clone());
    }

    if fields.is_empty() {
        return Err(invalid("declares no settings fields".to_string()));
    }

    let declared = |name: &str| fields.iter().any(|f| f.name == name);
    for (name, _) in &definition.casts {
        if !declared(name) {
            return Err(invalid(format!("cast declared for unknown field '{}'", name)));
        }
    }
    for name in &definition.encrypted {
        if !declared(name) {
            return Err(invalid(format!("unknown encrypted field '{}'", name)));
        }
    }

    Ok(fields)
}
