/// Lifecycle events for settings groups
///
/// Published around hydration, persistence and lock changes:
/// - `Loading` / `Loaded`: an instance hydrates its group
/// - `Saving` / `Saved`: an instance writes its group back
/// - `Locked` / `Unlocked`: a descriptor changes lock state
///
/// Publishing is best effort; a failing publisher never fails the operation.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Domain event types for settings groups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum SettingsEvent {
    /// Instance is about to read its group
    Loading(GroupEvent),
    /// Instance finished hydrating its group
    Loaded(GroupEvent),
    /// Instance is about to write its group
    Saving(GroupEvent),
    /// Instance finished writing its group
    Saved(GroupEvent),
    /// Properties were locked
    Locked(GroupEvent),
    /// Properties were unlocked
    Unlocked(GroupEvent),
}

/// Event payload: which group, which fields, when
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEvent {
    /// Settings type identifier
    pub settings_type: String,
    /// Storage group
    pub group: String,
    /// Fields involved (empty for `Loading`)
    pub fields: Vec<String>,
    /// Timestamp of the event
    pub timestamp: DateTime<Utc>,
}

impl GroupEvent {
    fn new(settings_type: &str, group: &str, fields: Vec<String>) -> Self {
        Self {
            settings_type: settings_type.to_string(),
            group: group.to_string(),
            fields,
            timestamp: Utc::now(),
        }
    }
}

impl SettingsEvent {
    pub fn loading(settings_type: &str, group: &str) -> Self {
        Self::Loading(GroupEvent::new(settings_type, group, Vec::new()))
    }

    pub fn loaded(settings_type: &str, group: &str, fields: Vec<String>) -> Self {
        Self::Loaded(GroupEvent::new(settings_type, group, fields))
    }

    pub fn saving(settings_type: &str, group: &str, fields: Vec<String>) -> Self {
        Self::Saving(GroupEvent::new(settings_type, group, fields))
    }

    pub fn saved(settings_type: &str, group: &str, fields: Vec<String>) -> Self {
        Self::Saved(GroupEvent::new(settings_type, group, fields))
    }

    pub fn locked(settings_type: &str, group: &str, fields: Vec<String>) -> Self {
        Self::Locked(GroupEvent::new(settings_type, group, fields))
    }

    pub fn unlocked(settings_type: &str, group: &str, fields: Vec<String>) -> Self {
        Self::Unlocked(GroupEvent::new(settings_type, group, fields))
    }

    pub fn group_event(&self) -> &GroupEvent {
        match self {
            Self::Loading(e)
            | Self::Loaded(e)
            | Self::Saving(e)
            | Self::Saved(e)
            | Self::Locked(e)
            | Self::Unlocked(e) => e,
        }
    }
}

/// Event publisher trait for settings lifecycle events
#[async_trait::async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: SettingsEvent) -> anyhow::Result<()>;
}

/// No-op event publisher for testing or when events are disabled
pub struct NoOpEventPublisher;

#[async_trait::async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish(&self, _event: SettingsEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Publish and log failures instead of returning them
pub(crate) async fn publish_best_effort(publisher: &dyn EventPublisher, event: SettingsEvent) {
    let group = event.group_event().group.clone();
    if let Err(e) = publisher.publish(event).await {
        tracing::warn!(group = %group, error = %e, "failed to publish settings event");
    }
}
