//! Contract Test: Recipients and Dispatch
//!
//! Constraints verified:
//! - One mail per enabled recipient with a plausible address
//! - A failing recipient does not stop delivery to the others
//! - A second dispatch while one is running is skipped
//! - The last rendered report can be re-sent
//! - The archive protocol lists everything archived so far
//! - Custom reports are rendered to PDF for a date range

mod common;

use alarmlog_core::config::Recipient;
use alarmlog_core::error::Error;
use alarmlog_core::protocol::{
    DispatchOutcome, DispatchState, DispatcherServices, ProtocolDispatcher, ProtocolPeriod,
    SkipReason, Trigger,
};
use alarmlog_core::traits::{ArchiveSink, Mailer, MediaStore};
use alarmlog_core::{MessageCategory, SendSummary};
use chrono::NaiveDate;
use common::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Mailer taking a while per mail
#[derive(Clone, Default)]
struct SlowMailer {
    sent: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl Mailer for SlowMailer {
    async fn send_mail(&self, _: &str, _: &str, _: &str) -> alarmlog_core::Result<()> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send_mail_with_attachment(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        _: &Path,
    ) -> alarmlog_core::Result<()> {
        self.send_mail(to, subject, body).await
    }

    fn mailer_name(&self) -> &'static str {
        "slow"
    }
}

#[tokio::test]
async fn only_enabled_plausible_recipients_get_mail() {
    let mut h = Harness::new(at(2024, 3, 1, 8, 0));
    h.config.monthly_protocol.recipients = vec![
        Recipient::new("Ops", " ops@example.com "),
        Recipient::new("Away", "away@example.com").with_enabled(false),
        Recipient::new("Typo", "a@b.c"),
    ];
    let manager = h.manager().await;
    let dispatcher = h.dispatcher(manager);

    let run = dispatcher
        .evaluate_and_maybe_send(Trigger::Scheduled, ProtocolPeriod::PreviousMonth)
        .await;

    assert_eq!(
        run.outcome,
        DispatchOutcome::Sent(SendSummary {
            attempted: 1,
            delivered: 1,
            skipped_invalid: 1,
            skipped_disabled: 1,
            failed: 0,
        })
    );
    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ops@example.com");
}

#[tokio::test]
async fn shortest_plausible_address_is_accepted() {
    let mut h = Harness::new(at(2024, 3, 1, 8, 0));
    h.config.monthly_protocol.recipients = vec![
        Recipient::new("", "a@b.co"),
        Recipient::new("", "x"),
        Recipient::new("", "c@d.com").with_enabled(false),
    ];
    let manager = h.manager().await;
    let dispatcher = h.dispatcher(manager);

    dispatcher
        .evaluate_and_maybe_send(Trigger::Scheduled, ProtocolPeriod::PreviousMonth)
        .await;

    assert_eq!(h.mailer.call_count(), 1);
    assert_eq!(h.mailer.sent()[0].to, "a@b.co");
}

#[tokio::test]
async fn failing_recipient_does_not_stop_the_others() {
    let mut h = Harness::with_mailer(
        at(2024, 3, 1, 8, 0),
        RecordingMailer::failing_for("bounce@example.com"),
    );
    h.config.monthly_protocol.recipients = vec![
        Recipient::new("Bounce", "bounce@example.com"),
        Recipient::new("Ops", "ops@example.com"),
    ];
    let manager = h.manager().await;
    let dispatcher = h.dispatcher(manager);

    let run = dispatcher
        .evaluate_and_maybe_send(Trigger::Manual, ProtocolPeriod::PreviousMonth)
        .await;

    assert_eq!(
        run.outcome,
        DispatchOutcome::Sent(SendSummary {
            attempted: 2,
            delivered: 1,
            failed: 1,
            ..SendSummary::default()
        })
    );
    assert_eq!(h.mailer.call_count(), 2);
    assert_eq!(h.mailer.sent()[0].to, "ops@example.com");
    assert_eq!(dispatcher.state(), DispatchState::Idle);
}

#[tokio::test]
async fn no_recipients_sends_nothing() {
    let mut h = Harness::new(at(2024, 3, 1, 8, 0));
    h.config.monthly_protocol.recipients.clear();
    let manager = h.manager().await;
    let dispatcher = h.dispatcher(manager);

    let run = dispatcher
        .evaluate_and_maybe_send(Trigger::Manual, ProtocolPeriod::PreviousMonth)
        .await;

    assert_eq!(run.outcome, DispatchOutcome::Sent(SendSummary::default()));
    assert_eq!(h.mailer.call_count(), 0);
}

#[tokio::test]
async fn concurrent_dispatch_is_skipped() {
    let h = Harness::new(at(2024, 3, 1, 8, 0));
    let slow = SlowMailer::default();
    h.registry.register_mailer(MAILER_ID, Arc::new(slow.clone()));
    let manager = h.manager().await;
    let dispatcher = Arc::new(h.dispatcher(manager));

    let first = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            dispatcher
                .evaluate_and_maybe_send(Trigger::Manual, ProtocolPeriod::PreviousMonth)
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(dispatcher.state(), DispatchState::Dispatching);

    let second = dispatcher
        .evaluate_and_maybe_send(Trigger::Manual, ProtocolPeriod::PreviousMonth)
        .await;
    assert_eq!(
        second.outcome,
        DispatchOutcome::Skipped(SkipReason::AlreadyDispatching)
    );
    assert_eq!(
        dispatcher.send_archive_protocol().await,
        DispatchOutcome::Skipped(SkipReason::AlreadyDispatching)
    );

    let first = first.await.unwrap();
    assert!(matches!(first.outcome, DispatchOutcome::Sent(_)));
    assert_eq!(slow.sent.load(Ordering::SeqCst), 1);
    assert_eq!(dispatcher.state(), DispatchState::Idle);
}

#[tokio::test]
async fn send_report_needs_a_rendered_report() {
    let h = Harness::new(at(2024, 3, 1, 8, 0));
    let manager = h.manager().await;
    let dispatcher = h.dispatcher(manager);

    assert!(matches!(
        dispatcher.send_report().await,
        Err(Error::NotFound(_))
    ));

    dispatcher
        .evaluate_and_maybe_send(Trigger::Manual, ProtocolPeriod::PreviousMonth)
        .await;
    let summary = dispatcher.send_report().await.unwrap();

    assert_eq!(summary.delivered, 1);
    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], sent[1]);
}

#[tokio::test]
async fn archive_protocol_lists_all_archived_messages() {
    let h = Harness::new(at(2024, 3, 15, 12, 0));
    let manager = h.manager().await;
    manager
        .ingest("15.03.2024, 10:00:00, Zone 1, Motion detected", MessageCategory::Alarm)
        .await;
    h.archive
        .write_value("message_archive", "01.06.2001, 09:00:00, Early", at(2001, 6, 1, 9, 0))
        .await
        .unwrap();
    let dispatcher = h.dispatcher(manager);

    let outcome = dispatcher.send_archive_protocol().await;
    assert!(matches!(outcome, DispatchOutcome::Sent(summary) if summary.delivered == 1));

    let sent = h.mailer.sent();
    assert_eq!(sent[0].subject, "Archive protocol Office");
    assert_eq!(
        sent[0].body,
        "Archive protocol Office:\n\n\n\
         01.06.2001, 09:00:00, Early\n\
         15.03.2024, 10:00:00, Zone 1, Motion detected\n"
    );
}

#[tokio::test]
async fn disabled_archive_protocol_is_skipped() {
    let mut h = Harness::new(at(2024, 3, 15, 12, 0));
    h.config.archive_protocol.enabled = false;
    let manager = h.manager().await;
    let dispatcher = h.dispatcher(manager);

    assert_eq!(
        dispatcher.send_archive_protocol().await,
        DispatchOutcome::Skipped(SkipReason::Disabled)
    );
    assert!(h.mailer.sent().is_empty());
}

#[tokio::test]
async fn custom_report_is_rendered_for_the_range() {
    let h = Harness::new(at(2024, 3, 15, 12, 0));
    let manager = h.manager().await;
    for (timestamp, value) in [
        (at(2024, 3, 9, 23, 0), "Outside"),
        (at(2024, 3, 10, 8, 0), "Inside & first"),
        (at(2024, 3, 12, 23, 59), "Inside last"),
    ] {
        h.archive
            .write_value("message_archive", value, timestamp)
            .await
            .unwrap();
    }
    let dispatcher = h.dispatcher(manager);

    let path = dispatcher
        .generate_report(date(2024, 3, 10), date(2024, 3, 12))
        .await
        .unwrap();

    assert_eq!(path, PathBuf::from("report.pdf"));
    assert!(h.media.get("report").await.unwrap().is_some());

    let html = h.renderer.last_html().unwrap();
    assert!(html.contains("Alarm protocol 10.03.2024 to 12.03.2024"));
    assert!(html.contains("Inside &amp; first"));
    assert!(html.contains("Inside last"));
    assert!(!html.contains("Outside"));
}

#[tokio::test]
async fn custom_report_rejects_inverted_range() {
    let h = Harness::new(at(2024, 3, 15, 12, 0));
    let manager = h.manager().await;
    let dispatcher = h.dispatcher(manager);

    let result = dispatcher
        .generate_report(date(2024, 3, 12), date(2024, 3, 10))
        .await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn custom_report_needs_a_renderer() {
    let h = Harness::new(at(2024, 3, 15, 12, 0));
    let manager = h.manager().await;
    let dispatcher = ProtocolDispatcher::new(
        &h.config,
        manager,
        DispatcherServices {
            registry: Arc::clone(&h.registry),
            media_store: Arc::new(h.media.clone()),
            pdf_renderer: None,
            clock: h.clock.clone(),
        },
    );

    let result = dispatcher
        .generate_report(date(2024, 3, 10), date(2024, 3, 12))
        .await;
    assert!(matches!(result, Err(Error::Renderer(_))));
    assert!(h.media.get("report").await.unwrap().is_none());
}

#[tokio::test]
async fn custom_report_without_archive_lists_no_events() {
    let mut h = Harness::new(at(2024, 3, 15, 12, 0));
    h.config.archive.archive = None;
    let manager = h.manager().await;
    let dispatcher = h.dispatcher(manager);

    dispatcher
        .generate_report(date(2024, 3, 1), date(2024, 3, 15))
        .await
        .unwrap();

    let html = h.renderer.last_html().unwrap();
    assert!(html.contains("No events present."));
}
