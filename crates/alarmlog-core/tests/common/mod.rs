//! Test doubles and common utilities for contract tests
//!
//! The doubles record what the core asked of them so tests can verify the
//! observable behavior (mails sent, values archived, documents stored)
//! without real host services.

#![allow(dead_code)]

use alarmlog_core::archive::MemoryArchive;
use alarmlog_core::config::{AlarmLogConfig, Recipient};
use alarmlog_core::error::{Error, Result};
use alarmlog_core::media::MemoryMediaStore;
use alarmlog_core::protocol::{DispatcherServices, ProtocolDispatcher};
use alarmlog_core::state::MemoryLogStore;
use alarmlog_core::traits::{ArchiveSink, DocumentInfo, LoggedValue, Mailer, PdfRenderer};
use alarmlog_core::{
    AlarmLogEngine, EngineEvent, EngineServices, FixedClock, MessageLogManager, ObjectId,
    ServiceRegistry,
};
use chrono::{NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub const ARCHIVE_ID: ObjectId = ObjectId(100);
pub const MAILER_ID: ObjectId = ObjectId(200);

/// Local date and time
pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

/// A mail handed to the RecordingMailer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<PathBuf>,
}

/// Mailer recording every mail; clones share the record
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<SentMail>>>,
    fail_for: Arc<Mutex<Option<String>>>,
    calls: Arc<AtomicUsize>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every mail to `address`
    pub fn failing_for(address: &str) -> Self {
        let mailer = Self::default();
        *mailer.fail_for.lock().unwrap() = Some(address.to_string());
        mailer
    }

    /// Mails accepted so far
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }

    /// Send calls so far, including rejected ones
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self, to: &str, subject: &str, body: &str, attachment: Option<&Path>) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_for.lock().unwrap().as_deref() == Some(to) {
            return Err(Error::mailer(format!("Mailbox {} unavailable", to)));
        }
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            attachment: attachment.map(Path::to_path_buf),
        });
        Ok(())
    }
}

#[async_trait::async_trait]
impl Mailer for RecordingMailer {
    async fn send_mail(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        self.record(to, subject, body, None)
    }

    async fn send_mail_with_attachment(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachment: &Path,
    ) -> Result<()> {
        self.record(to, subject, body, Some(attachment))
    }

    fn mailer_name(&self) -> &'static str {
        "recording"
    }
}

/// Archive failing every call
#[derive(Debug, Default)]
pub struct FailingArchive;

#[async_trait::async_trait]
impl ArchiveSink for FailingArchive {
    async fn write_value(&self, _: &str, _: &str, _: NaiveDateTime) -> Result<()> {
        Err(Error::archive("archive offline"))
    }

    async fn set_logging_enabled(&self, _: &str, _: bool) -> Result<()> {
        Err(Error::archive("archive offline"))
    }

    async fn logging_enabled(&self, _: &str) -> Result<bool> {
        Err(Error::archive("archive offline"))
    }

    async fn logged_values(
        &self,
        _: &str,
        _: NaiveDateTime,
        _: NaiveDateTime,
    ) -> Result<Vec<LoggedValue>> {
        Err(Error::archive("archive offline"))
    }

    async fn delete_values(&self, _: &str, _: NaiveDateTime, _: NaiveDateTime) -> Result<usize> {
        Err(Error::archive("archive offline"))
    }

    fn archive_name(&self) -> &'static str {
        "failing"
    }
}

/// PDF renderer returning a marker document and keeping the last HTML
#[derive(Clone, Default)]
pub struct FakePdfRenderer {
    last_html: Arc<Mutex<Option<String>>>,
}

impl FakePdfRenderer {
    pub fn last_html(&self) -> Option<String> {
        self.last_html.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl PdfRenderer for FakePdfRenderer {
    async fn render(&self, html: &str, _info: &DocumentInfo) -> Result<Vec<u8>> {
        *self.last_html.lock().unwrap() = Some(html.to_string());
        Ok(b"%PDF-1.4 fake".to_vec())
    }
}

/// Configuration wired to [`ARCHIVE_ID`] and [`MAILER_ID`] with one
/// recipient for each protocol
pub fn wired_config() -> AlarmLogConfig {
    let mut config = AlarmLogConfig::new("Office");
    config.archive.archive = Some(ARCHIVE_ID);
    config.archive.use_archiving = true;
    config.monthly_protocol.mailer = Some(MAILER_ID);
    config.monthly_protocol.recipients = vec![Recipient::new("Ops", "ops@example.com")];
    config.archive_protocol.mailer = Some(MAILER_ID);
    config.archive_protocol.recipients = vec![Recipient::new("Ops", "ops@example.com")];
    config
}

/// Everything a manager, dispatcher or engine is built from
pub struct Harness {
    pub config: AlarmLogConfig,
    pub registry: Arc<ServiceRegistry>,
    pub archive: MemoryArchive,
    pub mailer: RecordingMailer,
    pub media: MemoryMediaStore,
    pub store: MemoryLogStore,
    pub renderer: FakePdfRenderer,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    /// Harness with a memory archive and a recording mailer registered
    pub fn new(now: NaiveDateTime) -> Self {
        Self::with_mailer(now, RecordingMailer::new())
    }

    pub fn with_mailer(now: NaiveDateTime, mailer: RecordingMailer) -> Self {
        let registry = Arc::new(ServiceRegistry::new());
        let archive = MemoryArchive::new();
        registry.register_archive(ARCHIVE_ID, Arc::new(archive.clone()));
        registry.register_mailer(MAILER_ID, Arc::new(mailer.clone()));

        Self {
            config: wired_config(),
            registry,
            archive,
            mailer,
            media: MemoryMediaStore::new(),
            store: MemoryLogStore::new(),
            renderer: FakePdfRenderer::default(),
            clock: Arc::new(FixedClock::new(now)),
        }
    }

    /// Manager with the configuration applied
    pub async fn manager(&self) -> Arc<MessageLogManager> {
        let manager = MessageLogManager::load(
            &self.config,
            Arc::clone(&self.registry),
            Arc::new(self.store.clone()),
            self.clock.clone(),
        )
        .await
        .expect("manager loads");
        manager.apply_config(&self.config).await;
        Arc::new(manager)
    }

    /// Dispatcher sharing `manager`
    pub fn dispatcher(&self, manager: Arc<MessageLogManager>) -> ProtocolDispatcher {
        ProtocolDispatcher::new(
            &self.config,
            manager,
            DispatcherServices {
                registry: Arc::clone(&self.registry),
                media_store: Arc::new(self.media.clone()),
                pdf_renderer: Some(Arc::new(self.renderer.clone())),
                clock: self.clock.clone(),
            },
        )
    }

    /// Engine over the harness services
    pub async fn engine(&self) -> (AlarmLogEngine, mpsc::Receiver<EngineEvent>) {
        AlarmLogEngine::new(
            self.config.clone(),
            EngineServices {
                registry: Arc::clone(&self.registry),
                log_store: Arc::new(self.store.clone()),
                media_store: Arc::new(self.media.clone()),
                pdf_renderer: Some(Arc::new(self.renderer.clone())),
                clock: self.clock.clone(),
            },
        )
        .await
        .expect("engine construction succeeds")
    }
}
