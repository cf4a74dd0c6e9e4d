//! Message logs
//!
//! Three independent logs are kept per instance:
//!
//! - **alarm**: alarm messages, pruned by age
//! - **state**: state messages, capped to the newest N entries
//! - **event**: every event, state and alarm message, pruned by age
//!
//! A log is stored as text, newest line first. The date of an entry is not a
//! structured field: it is read back from the `DD.MM.YYYY` prefix that
//! producers put at the start of every message.

pub mod lock;
pub mod manager;

pub use lock::{InstanceLock, LockPolicy};
pub use manager::{CleanupReport, IngestOutcome, MessageLogManager};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Date format of the message prefix and of report periods
pub const DATE_FORMAT: &str = "%d.%m.%Y";

/// Category of an incoming message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageCategory {
    /// Plain event (code 0)
    Event,
    /// State change (code 1)
    State,
    /// Alarm (code 2)
    Alarm,
}

impl MessageCategory {
    /// All categories, in display order
    pub const ALL: [MessageCategory; 3] = [Self::Alarm, Self::State, Self::Event];

    /// Map the numeric code used by message producers
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Event),
            1 => Some(Self::State),
            2 => Some(Self::Alarm),
            _ => None,
        }
    }

    /// Numeric code used by message producers
    pub fn code(self) -> i64 {
        match self {
            Self::Event => 0,
            Self::State => 1,
            Self::Alarm => 2,
        }
    }

    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::State => "state",
            Self::Alarm => "alarm",
        }
    }

    /// Text shown while the log of this category has no entries
    pub fn placeholder(self) -> &'static str {
        match self {
            Self::Alarm => "No alarm messages present!",
            Self::State => "No state messages present!",
            Self::Event => "No event messages present!",
        }
    }
}

impl fmt::Display for MessageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageCategory {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<i64>() {
            return Self::from_code(code)
                .ok_or_else(|| crate::Error::invalid_input(format!("Unknown category code: {}", code)));
        }
        match s.to_lowercase().as_str() {
            "event" => Ok(Self::Event),
            "state" => Ok(Self::State),
            "alarm" => Ok(Self::Alarm),
            other => Err(crate::Error::invalid_input(format!(
                "Unknown message category: {}",
                other
            ))),
        }
    }
}

/// How long a log keeps its entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Keep the newest `limit` entries
    Count { limit: u32 },
    /// Keep entries younger than `limit_days` days
    Age { limit_days: u32 },
}

impl RetentionPolicy {
    /// A limit of zero disables the log
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Count { limit } => *limit > 0,
            Self::Age { limit_days } => *limit_days > 0,
        }
    }

    /// Human readable qualifier, e.g. `2 days` or `last 8`
    pub fn describe(&self) -> String {
        match *self {
            Self::Count { limit: 0 } | Self::Age { limit_days: 0 } => "disabled".to_string(),
            Self::Count { limit: 1 } => "last".to_string(),
            Self::Count { limit } => format!("last {}", limit),
            Self::Age { limit_days: 1 } => "1 day".to_string(),
            Self::Age { limit_days } => format!("{} days", limit_days),
        }
    }
}

/// A single logged message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEntry {
    text: String,
}

impl MessageEntry {
    /// Wrap a message line
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The message text, including its date prefix
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Date parsed from the `DD.MM.YYYY` prefix
    pub fn date(&self) -> Option<NaiveDate> {
        let prefix = self.text.get(..10)?;
        NaiveDate::parse_from_str(prefix, DATE_FORMAT).ok()
    }

    /// Whole days between the entry date and `today`, in either direction
    pub fn age_days(&self, today: NaiveDate) -> Option<i64> {
        self.date()
            .map(|date| today.signed_duration_since(date).num_days().abs())
    }
}

/// A newest-first message log with its retention policy
#[derive(Debug, Clone)]
pub struct MessageLog {
    category: MessageCategory,
    policy: RetentionPolicy,
    entries: Vec<MessageEntry>,
    blank: bool,
}

impl MessageLog {
    /// Create an empty log
    pub fn new(category: MessageCategory, policy: RetentionPolicy) -> Self {
        Self {
            category,
            policy,
            entries: Vec::new(),
            blank: false,
        }
    }

    /// Rebuild a log from its rendered text
    ///
    /// Empty lines and placeholder lines are dropped.
    pub fn from_text(category: MessageCategory, policy: RetentionPolicy, text: &str) -> Self {
        let placeholder = category.placeholder();
        let entries = text
            .lines()
            .filter(|line| !line.trim().is_empty() && !line.contains(placeholder))
            .map(MessageEntry::new)
            .collect();

        Self {
            category,
            policy,
            entries,
            blank: text.is_empty(),
        }
    }

    /// Category of this log
    pub fn category(&self) -> MessageCategory {
        self.category
    }

    /// Retention policy of this log
    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Switch to a new retention policy
    ///
    /// A count-bounded log is trimmed to its new limit right away.
    pub fn set_policy(&mut self, policy: RetentionPolicy) {
        self.policy = policy;
        if let RetentionPolicy::Count { limit } = policy {
            self.entries.truncate(limit as usize);
        }
    }

    /// Entries, newest first
    pub fn entries(&self) -> &[MessageEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add `message` as the newest entry
    ///
    /// Count-bounded logs are trimmed to their limit afterwards.
    pub fn prepend(&mut self, message: &str) {
        let placeholder = self.category.placeholder();
        self.blank = false;
        self.entries.retain(|entry| !entry.text().contains(placeholder));
        self.entries.insert(0, MessageEntry::new(message));

        if let RetentionPolicy::Count { limit } = self.policy {
            self.entries.truncate(limit as usize);
        }
    }

    /// Drop entries whose age is at least the retention window
    ///
    /// Entries without a parseable date prefix are dropped as well, and an
    /// emptied log renders its placeholder. Returns the number of removed
    /// entries.
    pub fn prune(&mut self, today: NaiveDate) -> usize {
        let RetentionPolicy::Age { limit_days } = self.policy else {
            return 0;
        };

        self.blank = false;
        let before = self.entries.len();
        self.entries.retain(|entry| match entry.age_days(today) {
            Some(age) => age < i64::from(limit_days),
            None => false,
        });
        before - self.entries.len()
    }

    /// Whether the log was blanked by disabling it
    pub fn is_blank(&self) -> bool {
        self.blank && self.entries.is_empty()
    }

    /// Remove all entries; the log renders as its placeholder
    pub fn clear(&mut self) {
        self.entries.clear();
        self.blank = false;
    }

    /// Remove all entries; the log renders as the empty string
    pub fn blank(&mut self) {
        self.entries.clear();
        self.blank = true;
    }

    /// Render the log as newline-joined text
    pub fn render(&self) -> String {
        if self.entries.is_empty() {
            if self.blank {
                return String::new();
            }
            return self.category.placeholder().to_string();
        }

        self.entries
            .iter()
            .map(MessageEntry::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
