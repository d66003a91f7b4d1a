//! Entity to record mappers
//!
//! Conversions between SeaORM entities and the maps/sets the repository
//! trait speaks in.

use super::entity;
use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

// ===== Property Conversions =====

pub(super) fn new_property(
    group: &str,
    name: &str,
    payload: Value,
    now: DateTime<Utc>,
) -> entity::ActiveModel {
    entity::ActiveModel {
        group: Set(group.to_string()),
        name: Set(name.to_string()),
        payload: Set(payload),
        created_at: Set(now),
        updated_at: Set(now),
    }
}

/// Change only the payload of a stored property
pub(super) fn updated_property(
    existing: entity::Model,
    payload: Value,
    now: DateTime<Utc>,
) -> entity::ActiveModel {
    let mut active: entity::ActiveModel = existing.into();
    active.payload = Set(payload);
    active.updated_at = Set(now);
    active
}

pub(super) fn into_properties(models: Vec<entity::Model>) -> BTreeMap<String, Value> {
    models.into_iter().map(|m| (m.name, m.payload)).collect()
}

// ===== Lock Conversions =====

pub(super) fn new_lock(group: &str, name: &str, now: DateTime<Utc>) -> entity::lock::ActiveModel {
    entity::lock::ActiveModel {
        group: Set(group.to_string()),
        name: Set(name.to_string()),
        locked_at: Set(now),
    }
}

pub(super) fn into_names(models: Vec<entity::lock::Model>) -> BTreeSet<String> {
    models.into_iter().map(|m| m.name).collect()
}
