//! Contract Test: Message Log Routing
//!
//! Constraints verified:
//! - Alarm and state messages are mirrored into the event log
//! - A retention of zero disables a log and blanks its text
//! - The state log keeps only the newest N messages
//! - Deleting a log leaves its placeholder
//! - Every message goes to the archive while archiving is enabled
//! - Deselecting the archive switches its logging off
//! - Archive failures never abort an ingest
//! - Logs survive a restart through the FileLogStore

mod common;

use alarmlog_core::messages::IngestOutcome;
use alarmlog_core::state::FileLogStore;
use alarmlog_core::traits::{ArchiveSink, LogStore};
use alarmlog_core::{MessageCategory, MessageLogManager};
use common::*;
use std::sync::Arc;

const NOW: (i32, u32, u32) = (2024, 3, 15);

fn harness() -> Harness {
    Harness::new(at(NOW.0, NOW.1, NOW.2, 10, 0))
}

#[tokio::test]
async fn alarm_is_logged_to_event_and_alarm_log() {
    let h = harness();
    let manager = h.manager().await;

    let outcome = manager
        .ingest("15.03.2024, 10:00:00, Zone 1, Motion detected", MessageCategory::Alarm)
        .await;

    assert_eq!(
        outcome,
        IngestOutcome::Logged {
            targets: vec![MessageCategory::Event, MessageCategory::Alarm],
            archived: true,
        }
    );
    assert_eq!(
        manager.text(MessageCategory::Alarm).await,
        "15.03.2024, 10:00:00, Zone 1, Motion detected"
    );
    assert_eq!(
        manager.text(MessageCategory::Event).await,
        "15.03.2024, 10:00:00, Zone 1, Motion detected"
    );
    assert_eq!(
        manager.text(MessageCategory::State).await,
        MessageCategory::State.placeholder()
    );
}

#[tokio::test]
async fn newest_message_comes_first_and_is_persisted() {
    let h = harness();
    let manager = h.manager().await;

    manager
        .ingest("14.03.2024, 09:00:00, Door open", MessageCategory::Event)
        .await;
    manager
        .ingest("15.03.2024, 09:30:00, Door closed", MessageCategory::Event)
        .await;

    let expected = "15.03.2024, 09:30:00, Door closed\n14.03.2024, 09:00:00, Door open";
    assert_eq!(manager.text(MessageCategory::Event).await, expected);

    assert_eq!(
        h.store.load(MessageCategory::Event).await.unwrap().as_deref(),
        Some(expected)
    );
}

#[tokio::test]
async fn state_log_keeps_newest_messages() {
    let mut h = harness();
    h.config.messages.state_message_count = 2;
    let manager = h.manager().await;

    for i in 1..=4 {
        manager
            .ingest(&format!("15.03.2024, 10:0{}:00, State {}", i, i), MessageCategory::State)
            .await;
    }

    let entries = manager.entries(MessageCategory::State).await;
    assert_eq!(entries.len(), 2);
    assert!(entries[0].text().ends_with("State 4"));
    assert!(entries[1].text().ends_with("State 3"));

    // The event log is bounded by age only
    assert_eq!(manager.entries(MessageCategory::Event).await.len(), 4);
}

#[tokio::test]
async fn disabled_alarm_log_is_blank_and_ignores_alarms() {
    let mut h = harness();
    h.config.messages.alarm_retention_days = 0;
    let manager = h.manager().await;

    let outcome = manager
        .ingest("15.03.2024, 10:00:00, Zone 1, Motion detected", MessageCategory::Alarm)
        .await;

    assert_eq!(
        outcome,
        IngestOutcome::Logged {
            targets: vec![],
            archived: true,
        }
    );
    assert!(!outcome.is_logged());
    assert_eq!(manager.text(MessageCategory::Alarm).await, "");
    assert_eq!(
        manager.text(MessageCategory::Event).await,
        MessageCategory::Event.placeholder()
    );
}

#[tokio::test]
async fn disabled_event_log_does_not_mirror() {
    let mut h = harness();
    h.config.messages.event_retention_days = 0;
    let manager = h.manager().await;

    let outcome = manager
        .ingest("15.03.2024, 10:00:00, Armed", MessageCategory::State)
        .await;

    assert_eq!(
        outcome,
        IngestOutcome::Logged {
            targets: vec![MessageCategory::State],
            archived: true,
        }
    );
    assert_eq!(manager.text(MessageCategory::Event).await, "");
    assert_eq!(
        manager.text(MessageCategory::State).await,
        "15.03.2024, 10:00:00, Armed"
    );
}

#[tokio::test]
async fn delete_restores_placeholders() {
    let h = harness();
    let manager = h.manager().await;

    manager
        .ingest("15.03.2024, 10:00:00, Zone 1, Motion detected", MessageCategory::Alarm)
        .await;
    manager
        .ingest("15.03.2024, 10:01:00, Armed", MessageCategory::State)
        .await;

    manager.delete_category(MessageCategory::Alarm).await;
    assert_eq!(
        manager.text(MessageCategory::Alarm).await,
        MessageCategory::Alarm.placeholder()
    );
    assert_eq!(manager.entries(MessageCategory::Event).await.len(), 2);

    manager.delete_all().await;
    for category in MessageCategory::ALL {
        assert_eq!(manager.text(category).await, category.placeholder());
    }

    // The next message replaces the placeholder
    manager
        .ingest("15.03.2024, 10:02:00, Disarmed", MessageCategory::State)
        .await;
    assert_eq!(
        manager.text(MessageCategory::State).await,
        "15.03.2024, 10:02:00, Disarmed"
    );
}

#[tokio::test]
async fn inactive_instance_changes_nothing() {
    let h = harness();
    let manager = h.manager().await;
    manager.set_active(false);

    let outcome = manager
        .ingest("15.03.2024, 10:00:00, Zone 1, Motion detected", MessageCategory::Alarm)
        .await;

    assert_eq!(outcome, IngestOutcome::Inactive);
    assert!(manager.entries(MessageCategory::Alarm).await.is_empty());

    let archived = h
        .archive
        .logged_values("message_archive", at(2000, 1, 1, 0, 0), at(2100, 1, 1, 0, 0))
        .await
        .unwrap();
    assert!(archived.is_empty());
}

#[tokio::test]
async fn messages_are_archived_with_their_timestamp() {
    let h = harness();
    let manager = h.manager().await;

    manager
        .ingest("15.03.2024, 10:00:00, Door open", MessageCategory::Event)
        .await;

    let archived = h
        .archive
        .logged_values("message_archive", at(2024, 3, 15, 0, 0), at(2024, 3, 15, 23, 59))
        .await
        .unwrap();
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].value, "15.03.2024, 10:00:00, Door open");
    assert_eq!(archived[0].timestamp, at(2024, 3, 15, 10, 0));
}

#[tokio::test]
async fn disabled_archiving_records_nothing() {
    let mut h = harness();
    h.config.archive.use_archiving = false;
    let manager = h.manager().await;

    manager
        .ingest("15.03.2024, 10:00:00, Door open", MessageCategory::Event)
        .await;

    assert!(!h.archive.logging_enabled("message_archive").await.unwrap());
    let archived = h
        .archive
        .logged_values("message_archive", at(2024, 3, 15, 0, 0), at(2024, 3, 15, 23, 59))
        .await
        .unwrap();
    assert!(archived.is_empty());
}

#[tokio::test]
async fn deselected_archive_stops_logging() {
    let mut h = harness();
    let manager = h.manager().await;
    assert!(h.archive.logging_enabled("message_archive").await.unwrap());

    h.config.archive.archive = None;
    manager.apply_config(&h.config).await;

    assert!(!h.archive.logging_enabled("message_archive").await.unwrap());
    let outcome = manager
        .ingest("15.03.2024, 10:00:00, Door open", MessageCategory::Event)
        .await;
    assert_eq!(
        outcome,
        IngestOutcome::Logged {
            targets: vec![MessageCategory::Event],
            archived: false,
        }
    );
}

#[tokio::test]
async fn zero_archive_retention_skips_the_archive() {
    let mut h = harness();
    h.config.archive.retention_days = 0;
    let manager = h.manager().await;

    let outcome = manager
        .ingest("15.03.2024, 10:00:00, Door open", MessageCategory::Event)
        .await;

    assert_eq!(
        outcome,
        IngestOutcome::Logged {
            targets: vec![MessageCategory::Event],
            archived: false,
        }
    );
}

#[tokio::test]
async fn failing_archive_does_not_abort_ingest() {
    let h = harness();
    h.registry.register_archive(ARCHIVE_ID, Arc::new(FailingArchive));
    let manager = h.manager().await;

    let outcome = manager
        .ingest("15.03.2024, 10:00:00, Door open", MessageCategory::Event)
        .await;

    assert_eq!(
        outcome,
        IngestOutcome::Logged {
            targets: vec![MessageCategory::Event],
            archived: false,
        }
    );
    assert_eq!(manager.entries(MessageCategory::Event).await.len(), 1);
}

#[tokio::test]
async fn shrinking_state_count_trims_existing_log() {
    let mut h = harness();
    let manager = h.manager().await;
    for i in 1..=5 {
        manager
            .ingest(&format!("15.03.2024, 10:0{}:00, State {}", i, i), MessageCategory::State)
            .await;
    }

    h.config.messages.state_message_count = 3;
    manager.apply_config(&h.config).await;

    let entries = manager.entries(MessageCategory::State).await;
    assert_eq!(entries.len(), 3);
    assert!(entries[0].text().ends_with("State 5"));
    assert_eq!(manager.display_name(MessageCategory::State), "State messages (last 3)");
}

#[tokio::test]
async fn display_names_carry_retention() {
    let h = harness();
    let manager = h.manager().await;

    assert_eq!(manager.display_name(MessageCategory::Alarm), "Alarm messages (2 days)");
    assert_eq!(manager.display_name(MessageCategory::State), "State messages (last 8)");
    assert_eq!(manager.display_name(MessageCategory::Event), "Event messages (7 days)");
    assert_eq!(manager.archive_display_name(), "Archive data (90 days)");
}

#[tokio::test]
async fn logs_survive_restart_with_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("messages.json");
    let h = harness();

    {
        let store = FileLogStore::new(&path).await.unwrap();
        let manager = MessageLogManager::load(
            &h.config,
            Arc::clone(&h.registry),
            Arc::new(store),
            h.clock.clone(),
        )
        .await
        .unwrap();
        manager.apply_config(&h.config).await;

        manager
            .ingest("15.03.2024, 10:00:00, Zone 1, Motion detected", MessageCategory::Alarm)
            .await;
        manager.flush().await.unwrap();
    }

    let store = FileLogStore::new(&path).await.unwrap();
    let manager = MessageLogManager::load(
        &h.config,
        Arc::clone(&h.registry),
        Arc::new(store),
        h.clock.clone(),
    )
    .await
    .unwrap();

    assert_eq!(
        manager.text(MessageCategory::Alarm).await,
        "15.03.2024, 10:00:00, Zone 1, Motion detected"
    );
    assert_eq!(manager.entries(MessageCategory::Event).await.len(), 1);
    assert_eq!(
        manager.text(MessageCategory::State).await,
        MessageCategory::State.placeholder()
    );
}
