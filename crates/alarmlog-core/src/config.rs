//! Configuration types for the alarm protocol
//!
//! This module defines all configuration structures used throughout the crate.
//! Every section is defaulted, so a partial JSON document is a valid
//! configuration.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::messages::{MessageCategory, RetentionPolicy};
use crate::protocol::ProtocolPeriod;
use crate::registry::ObjectId;

/// Main alarm protocol configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmLogConfig {
    /// Name of the alarm system, used in protocol titles
    pub designation: String,

    /// Message log retention
    pub messages: MessageLogConfig,

    /// Message archive settings
    pub archive: ArchiveConfig,

    /// Monthly protocol schedule and delivery
    pub monthly_protocol: MonthlyProtocolConfig,

    /// Archive protocol delivery
    pub archive_protocol: ArchiveProtocolConfig,

    /// Instance lock tuning
    pub lock: LockConfig,

    /// Engine settings
    pub engine: EngineConfig,
}

impl AlarmLogConfig {
    /// Create a new configuration with defaults
    pub fn new(designation: impl Into<String>) -> Self {
        Self {
            designation: designation.into(),
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.archive.validate()?;
        self.monthly_protocol.validate()?;
        self.lock.validate()?;

        if self.engine.event_channel_capacity == 0 {
            return Err(crate::Error::config(
                "Event channel capacity must be > 0",
            ));
        }

        Ok(())
    }
}

/// Message log retention
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageLogConfig {
    /// Days an alarm message is kept (0 disables the alarm log)
    pub alarm_retention_days: u32,

    /// Number of state messages kept (0 disables the state log)
    pub state_message_count: u32,

    /// Days an event message is kept (0 disables the event log)
    pub event_retention_days: u32,
}

impl MessageLogConfig {
    /// Retention policy of the log for `category`
    pub fn policy(&self, category: MessageCategory) -> RetentionPolicy {
        match category {
            MessageCategory::Alarm => RetentionPolicy::Age {
                limit_days: self.alarm_retention_days,
            },
            MessageCategory::State => RetentionPolicy::Count {
                limit: self.state_message_count,
            },
            MessageCategory::Event => RetentionPolicy::Age {
                limit_days: self.event_retention_days,
            },
        }
    }
}

impl Default for MessageLogConfig {
    fn default() -> Self {
        Self {
            alarm_retention_days: 2,
            state_message_count: 8,
            event_retention_days: 7,
        }
    }
}

/// Message archive settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Archive instance the messages are written to
    pub archive: Option<ObjectId>,

    /// Enable logging of the archive variable on the archive
    pub use_archiving: bool,

    /// Days archived messages are kept (0 disables archiving)
    pub retention_days: u32,

    /// Identifier of the archive variable
    pub variable: String,
}

impl ArchiveConfig {
    /// Validate the archive configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.variable.trim().is_empty() {
            return Err(crate::Error::config("Archive variable cannot be empty"));
        }
        Ok(())
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            archive: None,
            use_archiving: false,
            retention_days: 90,
            variable: "message_archive".to_string(),
        }
    }
}

/// A mail recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Display name
    #[serde(default)]
    pub name: String,

    /// Mail address
    pub address: String,

    /// Whether mails are sent to this recipient
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Recipient {
    /// Create an enabled recipient
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            enabled: true,
        }
    }

    /// Enable or disable the recipient
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Whether the address is plausible enough to send to
    pub fn is_valid(&self) -> bool {
        self.address.trim().len() >= 6
    }
}

/// Output format of the monthly protocol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Plain text
    #[default]
    Text,
    /// PDF rendered from HTML
    Pdf,
}

/// How the monthly protocol is delivered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    /// Protocol text in the mail body
    #[default]
    Inline,
    /// Protocol document as attachment
    Attachment,
}

/// Monthly protocol schedule and delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonthlyProtocolConfig {
    /// Whether the monthly protocol is sent
    pub enabled: bool,

    /// Day of the month the protocol is sent (1..=31)
    ///
    /// In months shorter than this day the protocol is not sent.
    pub day_of_month: u32,

    /// Time of day the check runs
    pub send_time: NaiveTime,

    /// Period covered by the protocol
    pub period: ProtocolPeriod,

    /// Subject prefix
    pub subject: String,

    /// Mailer instance used for sending
    pub mailer: Option<ObjectId>,

    /// Recipients
    pub recipients: Vec<Recipient>,

    /// Output format
    pub format: ReportFormat,

    /// Delivery mode
    pub delivery: Delivery,

    /// Logo for the PDF header (data URI or base64 image)
    pub logo: Option<String>,
}

impl MonthlyProtocolConfig {
    /// Validate the monthly protocol configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !(1..=31).contains(&self.day_of_month) {
            return Err(crate::Error::config(format!(
                "Monthly protocol day must be within 1..=31, got {}",
                self.day_of_month
            )));
        }
        if self.format == ReportFormat::Pdf && self.delivery == Delivery::Inline {
            return Err(crate::Error::config(
                "PDF protocols can only be delivered as attachment",
            ));
        }
        Ok(())
    }
}

impl Default for MonthlyProtocolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            day_of_month: 1,
            send_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            period: ProtocolPeriod::default(),
            subject: "Monthly protocol".to_string(),
            mailer: None,
            recipients: Vec::new(),
            format: ReportFormat::default(),
            delivery: Delivery::default(),
            logo: None,
        }
    }
}

/// Archive protocol delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveProtocolConfig {
    /// Whether the archive protocol can be sent
    pub enabled: bool,

    /// Subject prefix
    pub subject: String,

    /// Mailer instance used for sending
    pub mailer: Option<ObjectId>,

    /// Recipients
    pub recipients: Vec<Recipient>,
}

impl Default for ArchiveProtocolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            subject: "Archive protocol".to_string(),
            mailer: None,
            recipients: Vec::new(),
        }
    }
}

/// Instance lock tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Bounded waits before an update is skipped
    pub max_attempts: u32,

    /// Shortest wait per attempt (in milliseconds)
    pub min_backoff_ms: u64,

    /// Longest wait per attempt (in milliseconds)
    pub max_backoff_ms: u64,
}

impl LockConfig {
    /// Validate the lock configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_attempts == 0 {
            return Err(crate::Error::config("Lock attempts must be > 0"));
        }
        if self.min_backoff_ms == 0 {
            return Err(crate::Error::config("Lock backoff must be > 0"));
        }
        if self.min_backoff_ms > self.max_backoff_ms {
            return Err(crate::Error::config(format!(
                "Lock backoff bounds are inverted ({} > {})",
                self.min_backoff_ms, self.max_backoff_ms
            )));
        }
        Ok(())
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            max_attempts: 100,
            min_backoff_ms: 1,
            max_backoff_ms: 5,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    pub event_channel_capacity: usize,

    /// Whether the instance accepts messages right after start
    pub start_active: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: 1000,
            start_active: true,
        }
    }
}

fn default_enabled() -> bool {
    true
}
