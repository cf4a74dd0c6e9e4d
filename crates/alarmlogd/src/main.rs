// # alarmlogd - Alarm Protocol Daemon
//
// The alarmlogd daemon is a thin integration layer around alarmlog-core:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Wiring file-backed stores, the archive and the mailer
// 4. Feeding messages from stdin into the engine until SIGTERM/SIGINT
//
// ## Input
//
// One message per line on stdin, `<category>\t<message>`, where category is
// `alarm`, `state`, `event` or the codes `2`, `1`, `0`:
//
// ```text
// alarm	15.03.2024, 10:00:00, Zone 1, Motion detected
// ```
//
// ## Configuration
//
// ### General
// - `ALARMLOG_DESIGNATION`: Name of the alarm system
// - `ALARMLOG_DATA_DIR`: Directory for logs, archive and documents
// - `ALARMLOG_LOG_LEVEL`: trace, debug, info, warn, error
//
// ### Retention
// - `ALARMLOG_ALARM_RETENTION_DAYS`, `ALARMLOG_STATE_MESSAGE_COUNT`,
//   `ALARMLOG_EVENT_RETENTION_DAYS`, `ALARMLOG_ARCHIVE_RETENTION_DAYS`
// - `ALARMLOG_USE_ARCHIVING`: Log messages into the archive (default true)
//
// ### Monthly protocol
// - `ALARMLOG_MONTHLY_ENABLED`, `ALARMLOG_MONTHLY_DAY`, `ALARMLOG_MONTHLY_TIME`
// - `ALARMLOG_MONTHLY_PERIOD`: current_month, previous_month, two_months_before
// - `ALARMLOG_MONTHLY_SUBJECT`, `ALARMLOG_MONTHLY_RECIPIENTS`
// - `ALARMLOG_MONTHLY_FORMAT`: text; `ALARMLOG_MONTHLY_DELIVERY`: inline, attachment
//
// ### Archive protocol
// - `ALARMLOG_ARCHIVE_PROTOCOL_SUBJECT`, `ALARMLOG_ARCHIVE_PROTOCOL_RECIPIENTS`
//
// ### Mail
// - `ALARMLOG_MAIL_DROP_DIR`: Directory the `.eml` files are written to
// - `ALARMLOG_MAIL_FROM`: Sender mailbox
//
// Recipient lists are comma separated, each entry `name:address` or just
// `address`.
//
// ## Example
//
// ```bash
// export ALARMLOG_DESIGNATION="Office"
// export ALARMLOG_DATA_DIR=/var/lib/alarmlog
// export ALARMLOG_MONTHLY_RECIPIENTS="Ops:ops@example.com"
//
// alarm-source | alarmlogd
// ```

use alarmlog_core::archive::FileArchive;
use alarmlog_core::config::{AlarmLogConfig, Delivery, Recipient, ReportFormat};
use alarmlog_core::media::FileMediaStore;
use alarmlog_core::state::FileLogStore;
use alarmlog_core::{
    AlarmLogEngine, EngineEvent, EngineServices, IngestRequest, MessageCategory, ObjectId,
    ProtocolPeriod, ServiceRegistry, SystemClock,
};
use anyhow::{Context, Result};
use chrono::NaiveTime;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Id the file archive is registered under
const ARCHIVE_ID: ObjectId = ObjectId(100);

/// Id the drop directory mailer is registered under
const MAILER_ID: ObjectId = ObjectId(200);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum AlarmlogExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<AlarmlogExitCode> for ExitCode {
    fn from(code: AlarmlogExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Daemon configuration
#[derive(Debug)]
struct Config {
    data_dir: PathBuf,
    mail_drop_dir: PathBuf,
    mail_from: String,
    log_level: String,
    core: AlarmLogConfig,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let parsed = |name: &str| -> Result<Option<u32>> {
            var(name)
                .map(|value| {
                    value
                        .trim()
                        .parse::<u32>()
                        .with_context(|| format!("{} must be a non-negative integer, got {:?}", name, value))
                })
                .transpose()
        };
        let flag = |name: &str| -> Result<Option<bool>> {
            var(name).map(|value| parse_bool(name, &value)).transpose()
        };

        let data_dir = PathBuf::from(var("ALARMLOG_DATA_DIR").unwrap_or_else(|| "/var/lib/alarmlog".to_string()));
        let mut core = AlarmLogConfig::new(
            var("ALARMLOG_DESIGNATION").unwrap_or_else(|| "Alarm system".to_string()),
        );

        if let Some(days) = parsed("ALARMLOG_ALARM_RETENTION_DAYS")? {
            core.messages.alarm_retention_days = days;
        }
        if let Some(count) = parsed("ALARMLOG_STATE_MESSAGE_COUNT")? {
            core.messages.state_message_count = count;
        }
        if let Some(days) = parsed("ALARMLOG_EVENT_RETENTION_DAYS")? {
            core.messages.event_retention_days = days;
        }

        core.archive.archive = Some(ARCHIVE_ID);
        core.archive.use_archiving = flag("ALARMLOG_USE_ARCHIVING")?.unwrap_or(true);
        if let Some(days) = parsed("ALARMLOG_ARCHIVE_RETENTION_DAYS")? {
            core.archive.retention_days = days;
        }

        let monthly = &mut core.monthly_protocol;
        monthly.mailer = Some(MAILER_ID);
        if let Some(enabled) = flag("ALARMLOG_MONTHLY_ENABLED")? {
            monthly.enabled = enabled;
        }
        if let Some(day) = parsed("ALARMLOG_MONTHLY_DAY")? {
            monthly.day_of_month = day;
        }
        if let Some(time) = var("ALARMLOG_MONTHLY_TIME") {
            monthly.send_time = parse_time(&time)?;
        }
        if let Some(period) = var("ALARMLOG_MONTHLY_PERIOD") {
            monthly.period = parse_period(&period)?;
        }
        if let Some(subject) = var("ALARMLOG_MONTHLY_SUBJECT") {
            monthly.subject = subject;
        }
        if let Some(recipients) = var("ALARMLOG_MONTHLY_RECIPIENTS") {
            monthly.recipients = parse_recipients(&recipients);
        }
        if let Some(format) = var("ALARMLOG_MONTHLY_FORMAT") {
            monthly.format = match format.trim().to_lowercase().as_str() {
                "text" => ReportFormat::Text,
                "pdf" => ReportFormat::Pdf,
                other => anyhow::bail!("ALARMLOG_MONTHLY_FORMAT '{}' is not valid. Valid: text, pdf", other),
            };
        }
        if let Some(delivery) = var("ALARMLOG_MONTHLY_DELIVERY") {
            monthly.delivery = match delivery.trim().to_lowercase().as_str() {
                "inline" => Delivery::Inline,
                "attachment" => Delivery::Attachment,
                other => anyhow::bail!(
                    "ALARMLOG_MONTHLY_DELIVERY '{}' is not valid. Valid: inline, attachment",
                    other
                ),
            };
        }

        let archive_protocol = &mut core.archive_protocol;
        archive_protocol.mailer = Some(MAILER_ID);
        if let Some(subject) = var("ALARMLOG_ARCHIVE_PROTOCOL_SUBJECT") {
            archive_protocol.subject = subject;
        }
        if let Some(recipients) = var("ALARMLOG_ARCHIVE_PROTOCOL_RECIPIENTS") {
            archive_protocol.recipients = parse_recipients(&recipients);
        }

        Ok(Self {
            mail_drop_dir: var("ALARMLOG_MAIL_DROP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("outbox")),
            mail_from: var("ALARMLOG_MAIL_FROM").unwrap_or_else(|| "alarmlog@localhost".to_string()),
            log_level: var("ALARMLOG_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            data_dir,
            core,
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.core
            .validate()
            .map_err(|e| anyhow::anyhow!("{}", e))?;

        if self.core.monthly_protocol.format == ReportFormat::Pdf {
            anyhow::bail!(
                "ALARMLOG_MONTHLY_FORMAT=pdf needs a PDF renderer, which alarmlogd does not provide. \
                Use text with inline or attachment delivery."
            );
        }

        if !self.mail_from.contains('@') {
            anyhow::bail!(
                "ALARMLOG_MAIL_FROM '{}' is not a mail address",
                self.mail_from
            );
        }

        for recipient in self
            .core
            .monthly_protocol
            .recipients
            .iter()
            .chain(&self.core.archive_protocol.recipients)
        {
            if !recipient.is_valid() {
                eprintln!(
                    "WARNING: recipient {:?} has an implausible address and will be skipped",
                    recipient.address
                );
            }
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "ALARMLOG_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("{} must be true or false, got {:?}", name, value),
    }
}

fn parse_time(value: &str) -> Result<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .with_context(|| format!("ALARMLOG_MONTHLY_TIME must be HH:MM or HH:MM:SS, got {:?}", value))
}

fn parse_period(value: &str) -> Result<ProtocolPeriod> {
    let value = value.trim().to_lowercase();
    if let Ok(code) = value.parse::<i64>() {
        return ProtocolPeriod::from_code(code)
            .with_context(|| format!("ALARMLOG_MONTHLY_PERIOD code {} is not valid (0, 1, 2)", code));
    }
    match value.as_str() {
        "current_month" => Ok(ProtocolPeriod::CurrentMonth),
        "previous_month" => Ok(ProtocolPeriod::PreviousMonth),
        "two_months_before" => Ok(ProtocolPeriod::TwoMonthsBefore),
        other => anyhow::bail!(
            "ALARMLOG_MONTHLY_PERIOD '{}' is not valid. \
            Valid: current_month, previous_month, two_months_before",
            other
        ),
    }
}

/// Parse `name:address,address,...`
fn parse_recipients(value: &str) -> Vec<Recipient> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((name, address)) => Recipient::new(name.trim(), address.trim()),
            None => Recipient::new("", entry),
        })
        .collect()
}

/// Parse one stdin line into an ingest request
fn parse_line(line: &str) -> Option<IngestRequest> {
    let (category, message) = line.split_once('\t')?;
    let category = category.parse::<MessageCategory>().ok()?;
    let message = message.trim_end_matches(['\r', '\n']);
    if message.trim().is_empty() {
        return None;
    }
    Some(IngestRequest::new(message, category))
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return AlarmlogExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return AlarmlogExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return AlarmlogExitCode::ConfigError.into();
    }

    info!("Starting alarmlogd for {:?}", config.core.designation);

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return AlarmlogExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {:#}", e);
            AlarmlogExitCode::RuntimeError
        } else {
            AlarmlogExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let registry = Arc::new(ServiceRegistry::new());

    let archive = FileArchive::new(config.data_dir.join("archive.json"))
        .await
        .context("Failed to open archive")?;
    registry.register_archive(ARCHIVE_ID, Arc::new(archive));

    #[cfg(feature = "lettre")]
    {
        let mailer =
            alarmlog_mailer_lettre::FileDropMailer::new(&config.mail_drop_dir, &config.mail_from)
                .await
                .context("Failed to set up mailer")?;
        info!("Writing protocol mails to {}", config.mail_drop_dir.display());
        registry.register_mailer(MAILER_ID, Arc::new(mailer));
    }
    #[cfg(not(feature = "lettre"))]
    warn!("Built without the lettre feature, protocols will not be mailed");

    let log_store = FileLogStore::new(config.data_dir.join("messages.json"))
        .await
        .context("Failed to open message logs")?;
    let media_store = FileMediaStore::new(config.data_dir.join("media"))
        .await
        .context("Failed to open media directory")?;

    let (engine, mut events) = AlarmLogEngine::new(
        config.core,
        EngineServices {
            registry,
            log_store: Arc::new(log_store),
            media_store: Arc::new(media_store),
            pdf_renderer: None,
            clock: Arc::new(SystemClock),
        },
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to start engine: {}", e))?;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                EngineEvent::ProtocolDispatched { summary } => info!(
                    "Monthly protocol: {} of {} mails written",
                    summary.delivered, summary.attempted
                ),
                EngineEvent::IngestSkipped {
                    category,
                    contended: true,
                } => warn!("Dropped {} message under contention", category),
                other => debug!("Engine event: {:?}", other),
            }
        }
    });

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match parse_line(&line) {
                    Some(request) => {
                        if tx.send(request).is_err() {
                            break;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => warn!("Ignoring malformed input line: {:?}", line),
                },
                Ok(None) => {
                    debug!("stdin closed");
                    break;
                }
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Shutdown error: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    info!("Daemon initialized, reading messages from stdin");
    engine
        .run_with_shutdown(Box::pin(UnboundedReceiverStream::new(rx)), Some(shutdown_rx))
        .await
        .map_err(|e| anyhow::anyhow!("Engine stopped with error: {}", e))?;

    info!("Shutting down daemon");
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
