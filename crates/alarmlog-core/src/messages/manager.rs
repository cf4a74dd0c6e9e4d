// # Message Log Manager
//
// Owns the three message logs of an instance and the write-through to the
// message archive.
//
// ## Write Path
//
// ```text
// ingest(message, category)
//   -> instance lock (bounded, skipped on contention)
//   -> archive variable (if archiving is enabled)
//   -> event / state / alarm log by category
//   -> LogStore
// ```
//
// Archive and store failures are logged and never abort an ingest; the
// in-memory logs stay authoritative until the next successful save.

use chrono::{Days, NaiveDate, NaiveDateTime, Timelike};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{InstanceLock, LockPolicy, MessageCategory, MessageEntry, MessageLog, RetentionPolicy};
use crate::clock::Clock;
use crate::config::{AlarmLogConfig, ArchiveConfig, MessageLogConfig};
use crate::protocol::next_cleanup_delay;
use crate::registry::ServiceRegistry;
use crate::traits::{ArchiveSink, LogStore};

/// Result of an ingest call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The message was processed
    Logged {
        /// Logs the message was added to
        targets: Vec<MessageCategory>,
        /// Whether the archive accepted the message
        archived: bool,
    },
    /// The instance is inactive; nothing changed
    Inactive,
    /// The instance lock could not be acquired; nothing changed
    Contended,
}

impl IngestOutcome {
    /// Whether any log was changed
    pub fn is_logged(&self) -> bool {
        matches!(self, Self::Logged { targets, .. } if !targets.is_empty())
    }
}

/// Result of a cleanup run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    /// Entries removed from the age-bounded logs
    pub pruned: usize,
    /// Archived values deleted, `None` if archive cleanup did not run
    pub archive_deleted: Option<usize>,
    /// Whether pruning was skipped because the lock was busy
    pub contended: bool,
    /// Delay until the next cleanup run
    pub next_run_in: Duration,
}

/// First instant covered by archive cleanup and the archive protocol
pub(crate) fn archive_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or(NaiveDateTime::MIN)
}

#[derive(Debug, Clone)]
struct Settings {
    messages: MessageLogConfig,
    archive: ArchiveConfig,
}

#[derive(Debug)]
struct LogSet {
    alarm: MessageLog,
    state: MessageLog,
    event: MessageLog,
}

impl LogSet {
    fn get(&self, category: MessageCategory) -> &MessageLog {
        match category {
            MessageCategory::Alarm => &self.alarm,
            MessageCategory::State => &self.state,
            MessageCategory::Event => &self.event,
        }
    }

    fn get_mut(&mut self, category: MessageCategory) -> &mut MessageLog {
        match category {
            MessageCategory::Alarm => &mut self.alarm,
            MessageCategory::State => &mut self.state,
            MessageCategory::Event => &mut self.event,
        }
    }
}

/// Message log manager of one instance
pub struct MessageLogManager {
    settings: RwLock<Settings>,
    logs: InstanceLock<LogSet>,
    store: Arc<dyn LogStore>,
    registry: Arc<ServiceRegistry>,
    clock: Arc<dyn Clock>,
    active: AtomicBool,
    ready: AtomicBool,
}

impl MessageLogManager {
    /// Create a manager, restoring the logs from `store`
    ///
    /// The instance starts active but not ready; call
    /// [`apply_config`](Self::apply_config) to finish setup.
    pub async fn load(
        config: &AlarmLogConfig,
        registry: Arc<ServiceRegistry>,
        store: Arc<dyn LogStore>,
        clock: Arc<dyn Clock>,
    ) -> crate::Result<Self> {
        let restore = |category: MessageCategory, text: Option<String>| {
            let policy = config.messages.policy(category);
            match text {
                Some(text) => MessageLog::from_text(category, policy, &text),
                None => MessageLog::new(category, policy),
            }
        };

        let logs = LogSet {
            alarm: restore(MessageCategory::Alarm, store.load(MessageCategory::Alarm).await?),
            state: restore(MessageCategory::State, store.load(MessageCategory::State).await?),
            event: restore(MessageCategory::Event, store.load(MessageCategory::Event).await?),
        };

        debug!(
            "Restored message logs: {} alarm, {} state, {} event",
            logs.alarm.len(),
            logs.state.len(),
            logs.event.len()
        );

        Ok(Self {
            settings: RwLock::new(Settings {
                messages: config.messages.clone(),
                archive: config.archive.clone(),
            }),
            logs: InstanceLock::new("messages", LockPolicy::from(&config.lock), logs),
            store,
            registry,
            clock,
            active: AtomicBool::new(true),
            ready: AtomicBool::new(false),
        })
    }

    fn settings(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn archive(&self, settings: &Settings) -> Option<Arc<dyn ArchiveSink>> {
        self.registry.archive(settings.archive.archive)
    }

    /// Enable or disable message processing (maintenance mode)
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
        info!("Message logging {}", if active { "activated" } else { "deactivated" });
    }

    /// Whether messages are processed
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Whether the configuration has been applied
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Add a message to the logs selected by its category
    pub async fn ingest(&self, message: &str, category: MessageCategory) -> IngestOutcome {
        if !self.is_active() {
            debug!("Instance inactive, ignoring {} message", category);
            return IngestOutcome::Inactive;
        }

        let Some(mut logs) = self.logs.acquire().await else {
            warn!("Instance busy, {} message skipped: {}", category, message);
            return IngestOutcome::Contended;
        };

        let settings = self.settings();
        let mut archived = false;
        if settings.archive.retention_days > 0 {
            if let Some(archive) = self.archive(&settings) {
                // Whole seconds, report ranges end at 23:59:59
                let now = self.clock.now();
                let timestamp = now.with_nanosecond(0).unwrap_or(now);
                match archive
                    .write_value(&settings.archive.variable, message, timestamp)
                    .await
                {
                    Ok(()) => archived = true,
                    Err(e) => warn!("Failed to archive message: {}", e),
                }
            }
        }

        let messages = &settings.messages;
        let mut targets = Vec::new();
        match category {
            MessageCategory::Event => {
                if messages.event_retention_days > 0 {
                    targets.push(MessageCategory::Event);
                }
            }
            MessageCategory::State => {
                if messages.state_message_count > 0 {
                    if messages.event_retention_days > 0 {
                        targets.push(MessageCategory::Event);
                    }
                    targets.push(MessageCategory::State);
                }
            }
            MessageCategory::Alarm => {
                if messages.alarm_retention_days > 0 {
                    if messages.event_retention_days > 0 {
                        targets.push(MessageCategory::Event);
                    }
                    targets.push(MessageCategory::Alarm);
                }
            }
        }

        for &target in &targets {
            logs.get_mut(target).prepend(message);
            self.persist(logs.get(target)).await;
        }

        debug!("Logged {} message to {:?}", category, targets);
        IngestOutcome::Logged { targets, archived }
    }

    /// Reset all logs to their placeholders
    pub async fn delete_all(&self) {
        let mut logs = self.logs.lock().await;
        for category in MessageCategory::ALL {
            logs.get_mut(category).clear();
            self.persist(logs.get(category)).await;
        }
        info!("All message logs deleted");
    }

    /// Reset one log to its placeholder
    pub async fn delete_category(&self, category: MessageCategory) {
        let mut logs = self.logs.lock().await;
        logs.get_mut(category).clear();
        self.persist(logs.get(category)).await;
        info!("{} messages deleted", category);
    }

    /// Prune expired messages and archived values
    pub async fn cleanup(&self) -> CleanupReport {
        let now = self.clock.now();
        let today = now.date();
        let settings = self.settings();

        let mut pruned = 0;
        let mut contended = false;
        match self.logs.acquire().await {
            Some(mut logs) => {
                for category in [MessageCategory::Event, MessageCategory::Alarm] {
                    if !settings.messages.policy(category).is_enabled() {
                        continue;
                    }
                    let log = logs.get_mut(category);
                    let before = log.render();
                    let removed = log.prune(today);
                    if removed > 0 || log.render() != before {
                        self.persist(log).await;
                    }
                    pruned += removed;
                }
            }
            None => {
                warn!("Instance busy, message cleanup skipped");
                contended = true;
            }
        }

        let archive_deleted = self.cleanup_archive(&settings, now).await;

        let report = CleanupReport {
            pruned,
            archive_deleted,
            contended,
            next_run_in: next_cleanup_delay(now),
        };
        info!(
            "Cleanup finished: {} messages pruned, {:?} archived values deleted",
            report.pruned, report.archive_deleted
        );
        report
    }

    async fn cleanup_archive(&self, settings: &Settings, now: NaiveDateTime) -> Option<usize> {
        let retention_days = settings.archive.retention_days;
        if retention_days == 0 {
            return None;
        }
        if !self.is_ready() {
            debug!("Instance not ready, archive cleanup skipped");
            return None;
        }
        let archive = self.archive(settings)?;

        let variable = &settings.archive.variable;
        match archive.logging_enabled(variable).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("Archive logging disabled for {}, cleanup skipped", variable);
                return None;
            }
            Err(e) => {
                warn!("Failed to query archive logging state: {}", e);
                return None;
            }
        }

        let end = now
            .checked_sub_days(Days::new(u64::from(retention_days)))
            .unwrap_or(now);
        match archive.delete_values(variable, archive_epoch(), end).await {
            Ok(deleted) => Some(deleted),
            Err(e) => {
                warn!("Failed to delete archived messages: {}", e);
                None
            }
        }
    }

    /// Apply a (possibly changed) configuration
    ///
    /// Disabled logs are blanked and re-enabled logs get their placeholder
    /// back. Archive logging follows `archive.use_archiving`; without a
    /// selected archive it is switched off everywhere. The instance becomes
    /// ready afterwards.
    pub async fn apply_config(&self, config: &AlarmLogConfig) {
        {
            let mut settings = self.settings.write().unwrap_or_else(|e| e.into_inner());
            settings.messages = config.messages.clone();
            settings.archive = config.archive.clone();
        }

        {
            let mut logs = self.logs.lock().await;
            for category in MessageCategory::ALL {
                let policy = config.messages.policy(category);
                let log = logs.get_mut(category);
                log.set_policy(policy);
                if !policy.is_enabled() {
                    log.blank();
                } else if log.is_blank() {
                    log.clear();
                }
                self.persist(log).await;
            }
        }

        let settings = self.settings();
        let variable = &settings.archive.variable;
        match self.archive(&settings) {
            Some(archive) => {
                if let Err(e) = archive
                    .set_logging_enabled(variable, settings.archive.use_archiving)
                    .await
                {
                    warn!("Failed to switch archive logging for {}: {}", variable, e);
                }
            }
            None if settings.archive.archive.is_none() => {
                self.disable_archive_logging(variable).await;
            }
            None => {}
        }

        self.ready.store(true, Ordering::SeqCst);
        debug!("Configuration applied");
    }

    /// Rendered text of a log
    pub async fn text(&self, category: MessageCategory) -> String {
        self.logs.lock().await.get(category).render()
    }

    /// Entries of a log, newest first
    pub async fn entries(&self, category: MessageCategory) -> Vec<MessageEntry> {
        self.logs.lock().await.get(category).entries().to_vec()
    }

    /// Display name of a log including its retention
    pub fn display_name(&self, category: MessageCategory) -> String {
        let policy = self.settings().messages.policy(category);
        let label = match category {
            MessageCategory::Alarm => "Alarm messages",
            MessageCategory::State => "State messages",
            MessageCategory::Event => "Event messages",
        };
        format!("{} ({})", label, policy.describe())
    }

    /// Display name of the archive variable including its retention
    pub fn archive_display_name(&self) -> String {
        let days = self.settings().archive.retention_days;
        let qualifier = RetentionPolicy::Age { limit_days: days }.describe();
        format!("Archive data ({})", qualifier)
    }

    /// Write all logs through to the store
    pub async fn flush(&self) -> crate::Result<()> {
        self.store.flush().await
    }

    /// Stop logging `variable` in every registered archive
    async fn disable_archive_logging(&self, variable: &str) {
        for id in self.registry.list_archives() {
            let Some(archive) = self.registry.archive(Some(id)) else {
                continue;
            };
            match archive.logging_enabled(variable).await {
                Ok(true) => {
                    if let Err(e) = archive.set_logging_enabled(variable, false).await {
                        warn!("Failed to disable logging of {} in archive {}: {}", variable, id, e);
                    } else {
                        debug!("Logging of {} disabled in archive {}", variable, id);
                    }
                }
                Ok(false) => {}
                Err(e) => warn!("Failed to query archive {}: {}", id, e),
            }
        }
    }

    async fn persist(&self, log: &MessageLog) {
        if let Err(e) = self.store.save(log.category(), &log.render()).await {
            warn!("Failed to save {} messages: {}", log.category(), e);
        }
    }
}

impl std::fmt::Debug for MessageLogManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageLogManager")
            .field("lock", &self.logs.name())
            .field("active", &self.is_active())
            .field("ready", &self.is_ready())
            .finish()
    }
}
