//! Common test fixtures: settings types, a counting repository and a
//! recording event publisher
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use typed_settings::domain::repository::RepositoryResult;
use typed_settings::domain::{EventPublisher, SettingsEvent};
use typed_settings::{
    CastSpec, FieldSpec, FieldType, InMemorySettingsRepository, RepositoryFactory, Settings,
    SettingsRegistry, SettingsRepository,
};

pub const TEST_SECRET: &str = "correct horse battery staple";

/// Route `tracing` output through the test harness; `RUST_LOG` filters it
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn print_test_header(test_name: &str, purpose: &[&str]) {
    init_tracing();
    println!("\n🧪 TEST: {}", test_name);
    if let Some(first) = purpose.first() {
        println!("📋 PURPOSE: {}", first);
    }
    for line in purpose.iter().skip(1) {
        println!("   {}", line);
    }
}

// ===== Settings Fixtures =====

/// Two pass-through fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralSettings {
    pub count: i64,
    pub label: String,
}

impl Settings for GeneralSettings {
    fn group() -> &'static str {
        "general"
    }

    fn schema() -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("count", FieldType::Int),
            FieldSpec::new("label", FieldType::String),
        ]
    }
}

/// Same group as [`GeneralSettings`] but with defaults for every field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultedSettings {
    pub count: i64,
    pub note: Option<String>,
}

impl Settings for DefaultedSettings {
    fn group() -> &'static str {
        "defaulted"
    }

    fn schema() -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("count", FieldType::Int).with_default(10),
            FieldSpec::new("note", FieldType::String).nullable(),
        ]
    }
}

/// One field encrypted at rest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretSettings {
    pub label: String,
}

impl Settings for SecretSettings {
    fn group() -> &'static str {
        "secrets"
    }

    fn schema() -> Vec<FieldSpec> {
        vec![FieldSpec::new("label", FieldType::String)]
    }

    fn encrypted() -> &'static [&'static str] {
        &["label"]
    }
}

/// Temporal and enum fields, one with an explicit cast format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSettings {
    pub starts_at: chrono::DateTime<chrono::Utc>,
    pub day: chrono::NaiveDate,
    pub mode: String,
}

impl Settings for ScheduleSettings {
    fn group() -> &'static str {
        "schedule"
    }

    fn schema() -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("starts_at", FieldType::DateTime),
            FieldSpec::new("day", FieldType::Date),
            FieldSpec::new(
                "mode",
                FieldType::Enum(vec!["daily".to_string(), "weekly".to_string()]),
            ),
        ]
    }

    fn casts() -> Vec<(&'static str, CastSpec)> {
        vec![("day", CastSpec::parse("date:%d/%m/%Y"))]
    }
}

/// A single float field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioSettings {
    pub ratio: f64,
}

impl Settings for RatioSettings {
    fn group() -> &'static str {
        "ratio"
    }

    fn schema() -> Vec<FieldSpec> {
        vec![FieldSpec::new("ratio", FieldType::Float)]
    }
}

/// Declared as a string, cast to a datetime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampSettings {
    pub stamp: String,
}

impl Settings for StampSettings {
    fn group() -> &'static str {
        "stamp"
    }

    fn schema() -> Vec<FieldSpec> {
        vec![FieldSpec::new("stamp", FieldType::String)]
    }

    fn casts() -> Vec<(&'static str, CastSpec)> {
        vec![("stamp", CastSpec::named("datetime"))]
    }
}

/// Datetime stored with minute precision
pub struct MinuteSettings;

impl Settings for MinuteSettings {
    fn group() -> &'static str {
        "minutes"
    }

    fn schema() -> Vec<FieldSpec> {
        vec![FieldSpec::new("at", FieldType::DateTime)]
    }

    fn casts() -> Vec<(&'static str, CastSpec)> {
        vec![("at", CastSpec::parse("datetime:%Y-%m-%d %H:%M"))]
    }
}

/// Field of a type no cast knows about
pub struct MoneySettings;

impl Settings for MoneySettings {
    fn group() -> &'static str {
        "billing"
    }

    fn schema() -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("currency", FieldType::String),
            FieldSpec::new("amount", FieldType::Other("Money".to_string())),
        ]
    }
}

/// Selects a repository that is not configured
pub struct ArchivedSettings;

impl Settings for ArchivedSettings {
    fn group() -> &'static str {
        "archive"
    }

    fn schema() -> Vec<FieldSpec> {
        vec![FieldSpec::new("count", FieldType::Int)]
    }

    fn repository() -> Option<&'static str> {
        Some("archive")
    }
}

// ===== Counting Repository =====

/// In-memory repository that counts calls per operation
#[derive(Clone, Default)]
pub struct CountingRepository {
    inner: InMemorySettingsRepository,
    group_reads: Arc<AtomicUsize>,
    group_writes: Arc<AtomicUsize>,
    lock_reads: Arc<AtomicUsize>,
}

impl CountingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemorySettingsRepository {
        &self.inner
    }

    pub fn group_reads(&self) -> usize {
        self.group_reads.load(Ordering::SeqCst)
    }

    pub fn group_writes(&self) -> usize {
        self.group_writes.load(Ordering::SeqCst)
    }

    pub fn lock_reads(&self) -> usize {
        self.lock_reads.load(Ordering::SeqCst)
    }

    /// Stored payload, bypassing the counters
    pub async fn payload(&self, group: &str, name: &str) -> Value {
        self.inner.get_property_payload(group, name).await.unwrap()
    }

    pub async fn seed(&self, group: &str, properties: &[(&str, Value)]) {
        for (name, payload) in properties {
            self.inner
                .create_property(group, name, payload.clone())
                .await
                .unwrap();
        }
    }
}

#[async_trait]
impl SettingsRepository for CountingRepository {
    async fn get_properties_in_group(
        &self,
        group: &str,
    ) -> RepositoryResult<BTreeMap<String, Value>> {
        self.group_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_properties_in_group(group).await
    }

    async fn check_if_property_exists(&self, group: &str, name: &str) -> RepositoryResult<bool> {
        self.inner.check_if_property_exists(group, name).await
    }

    async fn get_property_payload(&self, group: &str, name: &str) -> RepositoryResult<Value> {
        self.inner.get_property_payload(group, name).await
    }

    async fn create_property(
        &self,
        group: &str,
        name: &str,
        payload: Value,
    ) -> RepositoryResult<()> {
        self.inner.create_property(group, name, payload).await
    }

    async fn update_properties_in_group(
        &self,
        group: &str,
        properties: BTreeMap<String, Value>,
    ) -> RepositoryResult<()> {
        self.group_writes.fetch_add(1, Ordering::SeqCst);
        self.inner.update_properties_in_group(group, properties).await
    }

    async fn delete_properties_in_group(
        &self,
        group: &str,
        names: &[String],
    ) -> RepositoryResult<()> {
        self.inner.delete_properties_in_group(group, names).await
    }

    async fn lock_properties(&self, group: &str, names: &[String]) -> RepositoryResult<()> {
        self.inner.lock_properties(group, names).await
    }

    async fn unlock_properties(&self, group: &str, names: &[String]) -> RepositoryResult<()> {
        self.inner.unlock_properties(group, names).await
    }

    async fn get_locked_properties(&self, group: &str) -> RepositoryResult<BTreeSet<String>> {
        self.lock_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_locked_properties(group).await
    }
}

// ===== Recording Event Publisher =====

#[derive(Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<SettingsEvent>>,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SettingsEvent> {
        self.events.lock().clone()
    }

    /// Event kinds in publish order, e.g. `["loading", "loaded"]`
    pub fn kinds(&self) -> Vec<String> {
        self.events()
            .iter()
            .map(|e| {
                serde_json::to_value(e).unwrap()["event_type"]
                    .as_str()
                    .unwrap()
                    .to_string()
            })
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(&self, event: SettingsEvent) -> anyhow::Result<()> {
        self.events.lock().push(event);
        Ok(())
    }
}

// ===== Registry Builders =====

pub fn registry_with(repo: &CountingRepository) -> SettingsRegistry {
    SettingsRegistry::new(RepositoryFactory::single("memory", Arc::new(repo.clone())))
}

pub fn encrypted_registry_with(repo: &CountingRepository) -> SettingsRegistry {
    registry_with(repo).with_encrypter(Arc::new(
        typed_settings::domain::AesGcmEncrypter::from_secret(TEST_SECRET),
    ))
}
