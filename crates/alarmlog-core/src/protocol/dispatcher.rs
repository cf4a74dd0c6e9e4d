// # Protocol Dispatcher
//
// Decides whether a protocol is due, renders it from the archive and mails
// it to the configured recipients.
//
// ## Dispatch Flow
//
// ```text
// evaluate_and_maybe_send(trigger, period)
//   -> preconditions (active, enabled, mailer, send day, archive)
//   -> Idle -> Dispatching
//   -> archived values for the period
//   -> render (text, text attachment or PDF attachment)
//   -> send_report(): one mail per enabled, valid recipient
//   -> Dispatching -> Idle
// ```
//
// Every precondition that does not hold skips the run with a
// [`SkipReason`]. The next fire delay is reported on every exit path, so
// the engine can re-arm its timer regardless of the outcome.

use chrono::{NaiveDate, NaiveDateTime};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::period::{ProtocolPeriod, ReportRange, compute_next_fire_delay, is_send_day};
use super::report::{self, Report, ReportKind};
use crate::clock::Clock;
use crate::config::{AlarmLogConfig, Delivery, Recipient, ReportFormat};
use crate::media::{MONTHLY_PROTOCOL, REPORT};
use crate::messages::MessageLogManager;
use crate::messages::manager::archive_epoch;
use crate::registry::ServiceRegistry;
use crate::traits::{ArchiveSink, DocumentInfo, LoggedValue, Mailer, MediaStore, PdfRenderer};

/// Dispatcher state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// No dispatch running
    Idle,
    /// A protocol is being rendered or sent
    Dispatching,
}

/// What caused a protocol evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Timer fire; the protocol is only sent on the configured day
    Scheduled,
    /// Operator request; the day check is skipped
    Manual,
}

/// Why a dispatch did not happen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The instance is inactive
    Inactive,
    /// The protocol is disabled
    Disabled,
    /// No mailer configured or the mailer does not exist
    NoMailer,
    /// Today is not the configured send day
    NotSendDay,
    /// No archive configured or the archive does not exist
    NoArchive,
    /// Reading the archive failed
    ArchiveUnavailable,
    /// The protocol could not be rendered or stored
    RenderFailed,
    /// Another dispatch is running
    AlreadyDispatching,
}

/// Per-recipient results of a send
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendSummary {
    /// Mails handed to the mailer
    pub attempted: usize,
    /// Mails the mailer accepted
    pub delivered: usize,
    /// Enabled recipients skipped for an implausible address
    pub skipped_invalid: usize,
    /// Disabled recipients
    pub skipped_disabled: usize,
    /// Mails the mailer rejected
    pub failed: usize,
}

/// Outcome of a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The protocol was rendered and sent
    Sent(SendSummary),
    /// The protocol was not sent
    Skipped(SkipReason),
}

/// Outcome of a monthly protocol evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolRun {
    /// What happened
    pub outcome: DispatchOutcome,
    /// Delay until the next scheduled evaluation
    pub next_fire_in: Duration,
}

/// Resets the dispatcher to `Idle` when dropped
struct DispatchGuard<'a> {
    state: &'a Mutex<DispatchState>,
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = DispatchState::Idle;
    }
}

/// Services the dispatcher renders and sends with
pub struct DispatcherServices {
    /// Archive and mailer instances
    pub registry: Arc<ServiceRegistry>,
    /// Storage for generated documents
    pub media_store: Arc<dyn MediaStore>,
    /// HTML to PDF conversion, required for PDF protocols
    pub pdf_renderer: Option<Arc<dyn PdfRenderer>>,
    /// Wall clock
    pub clock: Arc<dyn Clock>,
}

/// Monthly and archive protocol dispatcher
pub struct ProtocolDispatcher {
    config: RwLock<AlarmLogConfig>,
    messages: Arc<MessageLogManager>,
    services: DispatcherServices,
    state: Mutex<DispatchState>,
    last_report: tokio::sync::Mutex<Option<Report>>,
}

impl ProtocolDispatcher {
    /// Create a dispatcher for the instance owning `messages`
    pub fn new(
        config: &AlarmLogConfig,
        messages: Arc<MessageLogManager>,
        services: DispatcherServices,
    ) -> Self {
        Self {
            config: RwLock::new(config.clone()),
            messages,
            services,
            state: Mutex::new(DispatchState::Idle),
            last_report: tokio::sync::Mutex::new(None),
        }
    }

    /// Replace the configuration used by later dispatches
    pub fn apply_config(&self, config: &AlarmLogConfig) {
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = config.clone();
    }

    fn config(&self) -> AlarmLogConfig {
        self.config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Current dispatcher state
    pub fn state(&self) -> DispatchState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn begin(&self) -> Option<DispatchGuard<'_>> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state == DispatchState::Dispatching {
            return None;
        }
        *state = DispatchState::Dispatching;
        Some(DispatchGuard { state: &self.state })
    }

    /// The most recently rendered report
    pub async fn last_report(&self) -> Option<Report> {
        self.last_report.lock().await.clone()
    }

    /// Delay until the next scheduled evaluation
    pub fn next_fire_delay(&self) -> Duration {
        compute_next_fire_delay(
            self.config().monthly_protocol.send_time,
            self.services.clock.now(),
        )
    }

    /// Send the monthly protocol if it is due
    pub async fn evaluate_and_maybe_send(
        &self,
        trigger: Trigger,
        period: ProtocolPeriod,
    ) -> ProtocolRun {
        let config = self.config();
        let now = self.services.clock.now();
        debug!("Evaluating monthly protocol ({:?}, {:?})", trigger, period);

        let outcome = match self.dispatch_monthly(&config, trigger, period, now).await {
            Ok(summary) => DispatchOutcome::Sent(summary),
            Err(reason) => {
                debug!("Monthly protocol skipped: {:?}", reason);
                DispatchOutcome::Skipped(reason)
            }
        };

        ProtocolRun {
            outcome,
            next_fire_in: compute_next_fire_delay(config.monthly_protocol.send_time, now),
        }
    }

    async fn dispatch_monthly(
        &self,
        config: &AlarmLogConfig,
        trigger: Trigger,
        period: ProtocolPeriod,
        now: NaiveDateTime,
    ) -> Result<SendSummary, SkipReason> {
        let monthly = &config.monthly_protocol;
        if !self.messages.is_active() {
            return Err(SkipReason::Inactive);
        }
        if !monthly.enabled {
            return Err(SkipReason::Disabled);
        }
        let mailer = self
            .services
            .registry
            .mailer(monthly.mailer)
            .ok_or(SkipReason::NoMailer)?;
        if trigger == Trigger::Scheduled && !is_send_day(monthly.day_of_month, now.date()) {
            return Err(SkipReason::NotSendDay);
        }
        let archive = self
            .services
            .registry
            .archive(config.archive.archive)
            .ok_or(SkipReason::NoArchive)?;

        let _guard = self.begin().ok_or(SkipReason::AlreadyDispatching)?;

        let range = period.resolve(now.date()).map_err(|e| {
            warn!("Failed to resolve protocol period: {}", e);
            SkipReason::RenderFailed
        })?;
        let values = self
            .read_archive(archive.as_ref(), &config.archive.variable, &range)
            .await?;

        let report = self
            .render_monthly(config, &range, &values)
            .await
            .map_err(|e| {
                warn!("Failed to render monthly protocol: {}", e);
                SkipReason::RenderFailed
            })?;
        *self.last_report.lock().await = Some(report.clone());

        Ok(self
            .deliver(&report, mailer.as_ref(), &monthly.recipients)
            .await)
    }

    async fn read_archive(
        &self,
        archive: &dyn ArchiveSink,
        variable: &str,
        range: &ReportRange,
    ) -> Result<Vec<LoggedValue>, SkipReason> {
        archive
            .logged_values(variable, range.start, range.end)
            .await
            .map_err(|e| {
                warn!("Failed to read archive {}: {}", archive.archive_name(), e);
                SkipReason::ArchiveUnavailable
            })
    }

    async fn render_monthly(
        &self,
        config: &AlarmLogConfig,
        range: &ReportRange,
        values: &[LoggedValue],
    ) -> crate::Result<Report> {
        let monthly = &config.monthly_protocol;
        let title = report::monthly_title(&config.designation, range);
        let subject = report::monthly_subject(&monthly.subject, &config.designation, range);

        let (body, attachment) = match (monthly.format, monthly.delivery) {
            (ReportFormat::Text, Delivery::Inline) => (report::render_text(&title, values), None),
            (ReportFormat::Text, Delivery::Attachment) => {
                let text = report::render_text(&title, values);
                let path = self
                    .services
                    .media_store
                    .put(MONTHLY_PROTOCOL, "txt", text.as_bytes())
                    .await?;
                (title.clone(), Some(path))
            }
            (ReportFormat::Pdf, _) => {
                let html = report::render_html(
                    &config.designation,
                    range,
                    values,
                    monthly.logo.as_deref(),
                );
                let pdf = self.render_pdf(&html).await?;
                let path = self
                    .services
                    .media_store
                    .put(MONTHLY_PROTOCOL, "pdf", &pdf)
                    .await?;
                (title.clone(), Some(path))
            }
        };

        Ok(Report {
            kind: ReportKind::Monthly,
            title,
            subject,
            body,
            attachment,
        })
    }

    async fn render_pdf(&self, html: &str) -> crate::Result<Vec<u8>> {
        let renderer = self
            .services
            .pdf_renderer
            .as_ref()
            .ok_or_else(|| crate::Error::renderer("No PDF renderer available"))?;
        let info = DocumentInfo {
            author: format!("alarmlog {}", env!("CARGO_PKG_VERSION")),
            title: "Alarm protocol".to_string(),
            subject: "Alarm protocol".to_string(),
        };
        renderer.render(html, &info).await
    }

    /// Send the last rendered report to its recipients
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if no report has been rendered yet or its mailer
    ///   is not available
    pub async fn send_report(&self) -> crate::Result<SendSummary> {
        let report = self
            .last_report()
            .await
            .ok_or_else(|| crate::Error::not_found("No protocol has been rendered yet"))?;

        let config = self.config();
        let (mailer, recipients) = match report.kind {
            ReportKind::Monthly => (
                config.monthly_protocol.mailer,
                &config.monthly_protocol.recipients,
            ),
            ReportKind::Archive => (
                config.archive_protocol.mailer,
                &config.archive_protocol.recipients,
            ),
        };
        let mailer = self
            .services
            .registry
            .mailer(mailer)
            .ok_or_else(|| crate::Error::not_found("Mailer is not available"))?;

        Ok(self.deliver(&report, mailer.as_ref(), recipients).await)
    }

    async fn deliver(
        &self,
        report: &Report,
        mailer: &dyn Mailer,
        recipients: &[Recipient],
    ) -> SendSummary {
        let mut summary = SendSummary::default();

        for recipient in recipients {
            if !recipient.enabled {
                summary.skipped_disabled += 1;
                continue;
            }
            if !recipient.is_valid() {
                debug!(
                    "Skipping recipient {:?}: address shorter than 6 characters",
                    recipient.name
                );
                summary.skipped_invalid += 1;
                continue;
            }

            let address = recipient.address.trim();
            summary.attempted += 1;
            let result = match &report.attachment {
                Some(path) => {
                    mailer
                        .send_mail_with_attachment(address, &report.subject, &report.body, path)
                        .await
                }
                None => {
                    mailer
                        .send_mail(address, &report.subject, &report.body)
                        .await
                }
            };

            match result {
                Ok(()) => {
                    summary.delivered += 1;
                    info!("Sent {:?} to {}", report.subject, address);
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!("Failed to send {:?} to {}: {}", report.subject, address, e);
                }
            }
        }

        summary
    }

    /// Mail everything archived so far as plain text
    pub async fn send_archive_protocol(&self) -> DispatchOutcome {
        match self.dispatch_archive().await {
            Ok(summary) => DispatchOutcome::Sent(summary),
            Err(reason) => {
                debug!("Archive protocol skipped: {:?}", reason);
                DispatchOutcome::Skipped(reason)
            }
        }
    }

    async fn dispatch_archive(&self) -> Result<SendSummary, SkipReason> {
        let config = self.config();
        let protocol = &config.archive_protocol;
        if !self.messages.is_active() {
            return Err(SkipReason::Inactive);
        }
        if !protocol.enabled {
            return Err(SkipReason::Disabled);
        }
        let mailer = self
            .services
            .registry
            .mailer(protocol.mailer)
            .ok_or(SkipReason::NoMailer)?;
        let archive = self
            .services
            .registry
            .archive(config.archive.archive)
            .ok_or(SkipReason::NoArchive)?;

        let _guard = self.begin().ok_or(SkipReason::AlreadyDispatching)?;

        let range = ReportRange {
            start: archive_epoch(),
            end: self.services.clock.now(),
        };
        let values = self
            .read_archive(archive.as_ref(), &config.archive.variable, &range)
            .await?;

        let title = report::archive_title(&config.designation);
        let report = Report {
            kind: ReportKind::Archive,
            subject: report::archive_subject(&protocol.subject, &config.designation),
            body: report::render_text(&title, &values),
            title,
            attachment: None,
        };
        *self.last_report.lock().await = Some(report.clone());

        Ok(self
            .deliver(&report, mailer.as_ref(), &protocol.recipients)
            .await)
    }

    /// Render a PDF report for `[start_date, end_date]` into the media store
    ///
    /// Without a resolvable archive the report lists no events.
    pub async fn generate_report(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> crate::Result<PathBuf> {
        let config = self.config();
        let range = ReportRange::for_dates(start_date, end_date)?;

        let values = match self.services.registry.archive(config.archive.archive) {
            Some(archive) => {
                archive
                    .logged_values(&config.archive.variable, range.start, range.end)
                    .await?
            }
            None => Vec::new(),
        };

        let html = report::render_html(
            &config.designation,
            &range,
            &values,
            config.monthly_protocol.logo.as_deref(),
        );
        let pdf = self.render_pdf(&html).await?;
        let path = self.services.media_store.put(REPORT, "pdf", &pdf).await?;

        info!("Generated report for {} at {}", range.label(), path.display());
        Ok(path)
    }
}

impl std::fmt::Debug for ProtocolDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolDispatcher")
            .field("state", &self.state())
            .finish()
    }
}
