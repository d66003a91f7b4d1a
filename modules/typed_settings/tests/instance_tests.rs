//! Settings instance tests: hydration, writes, locks, encryption and events

use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;
use typed_settings::{SettingValue, SettingsError, SettingsInstance};

mod common;
use common::*;

#[tokio::test]
async fn test_lock_blocks_write_until_unlocked() {
    print_test_header(
        "test_lock_blocks_write_until_unlocked",
        &[
            "Locked field rejects set and keeps its value",
            "After unlock the write goes through and is persisted",
        ],
    );

    let repo = CountingRepository::new();
    repo.seed("general", &[("count", json!(1)), ("label", json!("a"))])
        .await;
    let registry = registry_with(&repo);
    let mut settings = registry.instance::<GeneralSettings>().await.unwrap();

    settings.lock(&["count"]).await.unwrap();
    let err = settings.set("count", 5).await.unwrap_err();
    assert!(matches!(err, SettingsError::LockedProperty { ref field, .. } if field == "count"));
    assert_eq!(settings.get("count").await.unwrap(), &SettingValue::Int(1));

    settings.unlock(&["count"]).await.unwrap();
    settings.set("count", 5).await.unwrap();
    settings.save().await.unwrap();

    assert_eq!(repo.payload("general", "count").await, json!(5));
}

#[tokio::test]
async fn test_save_skips_locked_fields() {
    print_test_header(
        "test_save_skips_locked_fields",
        &["A field locked after it was changed keeps its stored value"],
    );

    let repo = CountingRepository::new();
    repo.seed("general", &[("count", json!(1)), ("label", json!("a"))])
        .await;
    let registry = registry_with(&repo);
    let mut settings = registry.instance::<GeneralSettings>().await.unwrap();

    settings.set("count", 9).await.unwrap();
    settings.set("label", "b").await.unwrap();
    registry
        .descriptor::<GeneralSettings>()
        .unwrap()
        .lock(&["count"])
        .await
        .unwrap();
    settings.save().await.unwrap();

    assert_eq!(repo.payload("general", "count").await, json!(1));
    assert_eq!(repo.payload("general", "label").await, json!("b"));
    assert_eq!(settings.dirty_fields(), vec!["count"]);
    assert_eq!(repo.group_writes(), 1);
}

#[tokio::test]
async fn test_save_with_every_field_locked_writes_nothing() {
    let repo = CountingRepository::new();
    repo.seed("general", &[("count", json!(1)), ("label", json!("a"))])
        .await;
    let registry = registry_with(&repo);
    let mut settings = registry.instance::<GeneralSettings>().await.unwrap();

    settings.lock(&["count", "label"]).await.unwrap();
    settings.save().await.unwrap();
    assert_eq!(repo.group_writes(), 0);
}

#[tokio::test]
async fn test_encrypted_field_round_trip() {
    print_test_header(
        "test_encrypted_field_round_trip",
        &[
            "Encrypted field reads back as written",
            "Stored payload is not the plaintext",
        ],
    );

    let repo = CountingRepository::new();
    let registry = encrypted_registry_with(&repo);
    let descriptor = registry.descriptor::<SecretSettings>().unwrap();
    let initial = descriptor
        .encode("label", &SettingValue::from("initial"))
        .unwrap();
    repo.seed("secrets", &[("label", initial)]).await;

    let mut settings = registry.instance::<SecretSettings>().await.unwrap();
    assert_eq!(settings.get_as::<String>("label").await.unwrap(), "initial");
    settings.set("label", "secret").await.unwrap();
    settings.save().await.unwrap();

    let stored = repo.payload("secrets", "label").await;
    assert!(stored.is_string());
    assert_ne!(stored, json!("secret"));
    assert!(!stored.as_str().unwrap().contains("secret"));

    let mut reread = registry.instance::<SecretSettings>().await.unwrap();
    assert_eq!(reread.get_as::<String>("label").await.unwrap(), "secret");
}

#[tokio::test]
async fn test_encrypted_payload_needs_matching_key() {
    let repo = CountingRepository::new();
    let descriptor = encrypted_registry_with(&repo)
        .descriptor::<SecretSettings>()
        .unwrap();
    let sealed = descriptor
        .encode("label", &SettingValue::from("secret"))
        .unwrap();
    repo.seed("secrets", &[("label", sealed)]).await;

    let other = registry_with(&repo).with_encrypter(Arc::new(
        typed_settings::domain::AesGcmEncrypter::from_secret("another secret"),
    ));
    let mut settings = other.instance::<SecretSettings>().await.unwrap();
    assert!(matches!(
        settings.get("label").await,
        Err(SettingsError::Encryption { .. })
    ));
}

#[tokio::test]
async fn test_hydration_is_lazy() {
    let repo = CountingRepository::new();
    repo.seed("general", &[("count", json!(1)), ("label", json!("a"))])
        .await;
    let registry = registry_with(&repo);

    let mut settings = registry.instance::<GeneralSettings>().await.unwrap();
    assert!(!settings.is_loaded());
    assert_eq!(repo.group_reads(), 0);

    assert_eq!(settings.get_as::<i64>("count").await.unwrap(), 1);
    assert_eq!(settings.get_as::<String>("label").await.unwrap(), "a");
    assert!(settings.is_loaded());
    assert_eq!(repo.group_reads(), 1);
}

#[tokio::test]
async fn test_eager_registry_hydrates_on_creation() {
    let repo = CountingRepository::new();
    repo.seed("general", &[("count", json!(1)), ("label", json!("a"))])
        .await;
    let registry = registry_with(&repo).with_eager_load(true);

    let settings = registry.instance::<GeneralSettings>().await.unwrap();
    assert!(settings.is_loaded());
    assert_eq!(repo.group_reads(), 1);
}

#[tokio::test]
async fn test_defaults_and_nullable_fields() {
    let repo = CountingRepository::new();
    let registry = registry_with(&repo);
    let mut settings = registry.instance::<DefaultedSettings>().await.unwrap();

    assert_eq!(settings.get("count").await.unwrap(), &SettingValue::Int(10));
    assert_eq!(settings.get("note").await.unwrap(), &SettingValue::Null);
    assert_eq!(
        settings.to_settings().await.unwrap(),
        DefaultedSettings {
            count: 10,
            note: None,
        }
    );
}

#[tokio::test]
async fn test_missing_required_value() {
    let repo = CountingRepository::new();
    repo.seed("general", &[("count", json!(1))]).await;
    let registry = registry_with(&repo);
    let mut settings = registry.instance::<GeneralSettings>().await.unwrap();

    let err = settings.get("count").await.unwrap_err();
    assert!(
        matches!(err, SettingsError::MissingRequiredValue { ref group, ref field } if group == "general" && field == "label")
    );
}

#[tokio::test]
async fn test_set_rejects_unknown_field_and_wrong_type() {
    let repo = CountingRepository::new();
    repo.seed("general", &[("count", json!(1)), ("label", json!("a"))])
        .await;
    let registry = registry_with(&repo);
    let mut settings = registry.instance::<GeneralSettings>().await.unwrap();

    assert!(matches!(
        settings.set("missing", 1).await,
        Err(SettingsError::UnknownField { .. })
    ));
    assert!(matches!(
        settings.set("count", "five").await,
        Err(SettingsError::InvalidValue { .. })
    ));
    assert!(matches!(
        settings.set("label", SettingValue::Null).await,
        Err(SettingsError::InvalidValue { .. })
    ));
    assert!(matches!(
        settings.get("missing").await,
        Err(SettingsError::UnknownField { .. })
    ));
    assert!(settings.dirty_fields().is_empty());
}

#[tokio::test]
async fn test_refresh_discards_unsaved_changes() {
    let repo = CountingRepository::new();
    repo.seed("general", &[("count", json!(1)), ("label", json!("a"))])
        .await;
    let registry = registry_with(&repo);
    let mut settings = registry.instance::<GeneralSettings>().await.unwrap();

    settings.set("count", 2).await.unwrap();
    assert!(settings.is_dirty("count"));

    settings.refresh().await.unwrap();
    assert!(!settings.is_dirty("count"));
    assert_eq!(settings.get_as::<i64>("count").await.unwrap(), 1);
}

#[tokio::test]
async fn test_fill_and_to_settings() {
    print_test_header(
        "test_fill_and_to_settings",
        &["Assign a whole settings struct and read it back"],
    );

    let repo = CountingRepository::new();
    repo.seed("general", &[("count", json!(1)), ("label", json!("a"))])
        .await;
    let registry = registry_with(&repo);
    let mut settings = registry.instance::<GeneralSettings>().await.unwrap();

    let wanted = GeneralSettings {
        count: 42,
        label: "filled".to_string(),
    };
    settings.fill(&wanted).await.unwrap();
    settings.save().await.unwrap();

    let mut reread = registry.instance::<GeneralSettings>().await.unwrap();
    assert_eq!(reread.to_settings().await.unwrap(), wanted);
    assert_eq!(
        reread.to_json().await.unwrap(),
        json!({"count": 42, "label": "filled"})
    );
}

#[tokio::test]
async fn test_fill_respects_locks() {
    let repo = CountingRepository::new();
    repo.seed("general", &[("count", json!(1)), ("label", json!("a"))])
        .await;
    let registry = registry_with(&repo);
    let mut settings = registry.instance::<GeneralSettings>().await.unwrap();
    settings.lock(&["count"]).await.unwrap();

    // Unchanged locked fields are fine
    let same_count = GeneralSettings {
        count: 1,
        label: "b".to_string(),
    };
    settings.fill(&same_count).await.unwrap();

    let new_count = GeneralSettings {
        count: 2,
        label: "b".to_string(),
    };
    assert!(matches!(
        settings.fill(&new_count).await,
        Err(SettingsError::LockedProperty { .. })
    ));
}

#[tokio::test]
async fn test_temporal_and_enum_fields() {
    print_test_header(
        "test_temporal_and_enum_fields",
        &[
            "DateTime and Date fields cast to and from text",
            "Explicit date format is used in storage",
        ],
    );

    let repo = CountingRepository::new();
    repo.seed(
        "schedule",
        &[
            ("starts_at", json!("2026-10-19T08:30:00Z")),
            ("day", json!("19/10/2026")),
            ("mode", json!("daily")),
        ],
    )
    .await;
    let registry = registry_with(&repo);
    let mut settings = registry.instance::<ScheduleSettings>().await.unwrap();

    let starts_at = Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap();
    assert_eq!(
        settings.get("starts_at").await.unwrap(),
        &SettingValue::DateTime(starts_at)
    );
    assert_eq!(
        settings.get_as::<NaiveDate>("day").await.unwrap(),
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    );

    settings
        .set("day", NaiveDate::from_ymd_opt(2026, 12, 24).unwrap())
        .await
        .unwrap();
    settings
        .set("mode", SettingValue::Enum("weekly".to_string()))
        .await
        .unwrap();
    assert!(matches!(
        settings
            .set("mode", SettingValue::Enum("hourly".to_string()))
            .await,
        Err(SettingsError::InvalidValue { .. })
    ));
    settings.save().await.unwrap();

    assert_eq!(repo.payload("schedule", "day").await, json!("24/12/2026"));
    assert_eq!(repo.payload("schedule", "mode").await, json!("weekly"));
    assert_eq!(
        repo.payload("schedule", "starts_at").await,
        json!("2026-10-19T08:30:00Z")
    );

    let typed = settings.to_settings().await.unwrap();
    assert_eq!(typed.mode, "weekly");
    assert_eq!(typed.day, NaiveDate::from_ymd_opt(2026, 12, 24).unwrap());
}

#[tokio::test]
async fn test_lifecycle_events() {
    let repo = CountingRepository::new();
    repo.seed("general", &[("count", json!(1)), ("label", json!("a"))])
        .await;
    let events = Arc::new(RecordingEventPublisher::new());
    let registry = registry_with(&repo).with_event_publisher(events.clone());
    let mut settings = registry.instance::<GeneralSettings>().await.unwrap();

    settings.set("count", 2).await.unwrap();
    settings.lock(&["count"]).await.unwrap();
    settings.save().await.unwrap();

    assert_eq!(
        events.kinds(),
        vec!["loading", "loaded", "locked", "saving", "saved"]
    );
    let saved = events.events().pop().unwrap();
    assert_eq!(saved.group_event().group, "general");
    assert_eq!(saved.group_event().fields, vec!["label".to_string()]);
}

#[tokio::test]
async fn test_non_finite_floats_rejected() {
    print_test_header(
        "test_non_finite_floats_rejected",
        &[
            "NaN and infinities have no JSON form",
            "They are refused instead of being stored as null",
        ],
    );

    let repo = CountingRepository::new();
    repo.seed("ratio", &[("ratio", json!(0.5))]).await;
    let registry = registry_with(&repo);
    let mut settings = registry.instance::<RatioSettings>().await.unwrap();

    for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        assert!(matches!(
            settings.set("ratio", bad).await,
            Err(SettingsError::InvalidValue { .. })
        ));
    }
    assert!(settings.dirty_fields().is_empty());
    settings.save().await.unwrap();
    assert_eq!(repo.payload("ratio", "ratio").await, json!(0.5));

    let descriptor = registry.descriptor::<RatioSettings>().unwrap();
    assert!(descriptor
        .encode("ratio", &SettingValue::Float(f64::NAN))
        .is_err());

    let mut reread = registry.instance::<RatioSettings>().await.unwrap();
    assert_eq!(reread.get_as::<f64>("ratio").await.unwrap(), 0.5);
}

#[tokio::test]
async fn test_cast_decides_what_a_field_accepts() {
    print_test_header(
        "test_cast_decides_what_a_field_accepts",
        &[
            "A string field with a datetime cast reads a datetime",
            "The value read can be set back and saved",
        ],
    );

    let repo = CountingRepository::new();
    repo.seed("stamp", &[("stamp", json!("2024-05-01T10:00:00Z"))])
        .await;
    let registry = registry_with(&repo);
    let mut settings = registry.instance::<StampSettings>().await.unwrap();

    let read = settings.get("stamp").await.unwrap().clone();
    let first = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    assert_eq!(read, SettingValue::DateTime(first));
    settings.set("stamp", read).await.unwrap();

    // Plain strings are not something the cast can store
    assert!(matches!(
        settings.set("stamp", "2024-06-01T00:00:00Z").await,
        Err(SettingsError::InvalidValue { .. })
    ));

    let later = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    settings.set("stamp", later).await.unwrap();
    settings.save().await.unwrap();
    assert_eq!(
        repo.payload("stamp", "stamp").await,
        json!("2024-06-01T00:00:00Z")
    );
}

#[tokio::test]
async fn test_fill_round_trips_through_cast_fields() {
    let repo = CountingRepository::new();
    repo.seed("stamp", &[("stamp", json!("2024-05-01T10:00:00Z"))])
        .await;
    let registry = registry_with(&repo);
    let mut settings = registry.instance::<StampSettings>().await.unwrap();

    let snapshot = settings.to_settings().await.unwrap();
    assert_eq!(snapshot.stamp, "2024-05-01T10:00:00Z");
    settings.fill(&snapshot).await.unwrap();
    assert!(settings.dirty_fields().is_empty());

    let changed = StampSettings {
        stamp: "2024-06-01T00:00:00Z".to_string(),
    };
    settings.fill(&changed).await.unwrap();
    settings.save().await.unwrap();
    assert_eq!(
        repo.payload("stamp", "stamp").await,
        json!("2024-06-01T00:00:00Z")
    );
}

#[tokio::test]
async fn test_lossy_datetime_format_refuses_write() {
    print_test_header(
        "test_lossy_datetime_format_refuses_write",
        &["Seconds cannot be written through a minute-precision format"],
    );

    let repo = CountingRepository::new();
    repo.seed("minutes", &[("at", json!("2024-05-01 10:00"))]).await;
    let registry = registry_with(&repo);
    let mut settings = registry.instance::<MinuteSettings>().await.unwrap();

    let with_seconds = Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 45).unwrap();
    assert!(matches!(
        settings.set("at", with_seconds).await,
        Err(SettingsError::InvalidValue { .. })
    ));
    assert!(!settings.is_dirty("at"));

    let on_the_minute = Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap();
    settings.set("at", on_the_minute).await.unwrap();
    settings.save().await.unwrap();
    assert_eq!(repo.payload("minutes", "at").await, json!("2024-05-01 10:30"));

    let mut reread = registry.instance::<MinuteSettings>().await.unwrap();
    assert_eq!(
        reread.get("at").await.unwrap(),
        &SettingValue::DateTime(on_the_minute)
    );
}

#[tokio::test]
async fn test_hydrate_from_snapshot_without_repository() {
    print_test_header(
        "test_hydrate_from_snapshot_without_repository",
        &["A to_json snapshot restores an instance with no repository read"],
    );

    let repo = CountingRepository::new();
    repo.seed(
        "schedule",
        &[
            ("starts_at", json!("2026-10-19T08:30:00Z")),
            ("day", json!("19/10/2026")),
            ("mode", json!("daily")),
        ],
    )
    .await;
    let registry = registry_with(&repo);
    let mut original = registry.instance::<ScheduleSettings>().await.unwrap();
    let snapshot = original.to_json().await.unwrap();
    assert_eq!(repo.group_reads(), 1);

    let descriptor = registry.descriptor::<ScheduleSettings>().unwrap();
    let mut restored =
        SettingsInstance::<ScheduleSettings>::from_json(descriptor, &snapshot).unwrap();
    assert!(restored.is_loaded());
    assert!(restored.dirty_fields().is_empty());
    assert_eq!(restored.to_json().await.unwrap(), snapshot);
    assert_eq!(
        restored.get_as::<NaiveDate>("day").await.unwrap(),
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    );
    assert_eq!(repo.group_reads(), 1);
}

#[tokio::test]
async fn test_snapshot_applies_defaults_and_checks_shape() {
    let repo = CountingRepository::new();
    let registry = registry_with(&repo);

    let defaulted = registry.descriptor::<DefaultedSettings>().unwrap();
    let mut restored =
        SettingsInstance::<DefaultedSettings>::from_json(defaulted.clone(), &json!({})).unwrap();
    assert_eq!(
        restored.to_json().await.unwrap(),
        json!({"count": 10, "note": null})
    );

    assert!(matches!(
        SettingsInstance::<DefaultedSettings>::from_json(defaulted, &json!([1, 2])),
        Err(SettingsError::InvalidSettingsType { .. })
    ));

    let general = registry.descriptor::<GeneralSettings>().unwrap();
    assert!(matches!(
        SettingsInstance::<GeneralSettings>::from_json(general.clone(), &json!({"count": 1})),
        Err(SettingsError::MissingRequiredValue { .. })
    ));
    assert!(matches!(
        SettingsInstance::<GeneralSettings>::from_json(
            general,
            &json!({"count": "one", "label": "a"})
        ),
        Err(SettingsError::InvalidValue { .. })
    ));
    assert_eq!(repo.group_reads(), 0);
}
