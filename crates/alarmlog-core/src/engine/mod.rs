//! Alarm protocol engine
//!
//! The AlarmLogEngine is responsible for:
//! - Feeding incoming messages into the message logs
//! - Running the daily cleanup at 00:05
//! - Evaluating the monthly protocol at its send time
//! - Flushing the log store on shutdown
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐
//! │ ingest stream │─── IngestRequest ───┐
//! └───────────────┘                     │
//!                                       ▼
//!   cleanup timer ───────────▶ ┌────────────────┐ ◀─────────── protocol timer
//!                              │ AlarmLogEngine │
//!                              └────────────────┘
//!                                       │
//!         ┌─────────────────────────────┼─────────────────────────────┐
//!         │                             │                             │
//!         ▼                             ▼                             ▼
//! ┌───────────────────┐      ┌────────────────────┐         ┌─────────────┐
//! │ MessageLogManager │      │ ProtocolDispatcher │         │   Events    │
//! │ (logs, archive)   │      │ (render, mail)     │         │  (notify)   │
//! └───────────────────┘      └────────────────────┘         └─────────────┘
//! ```
//!
//! Both timers are re-armed from the delay the core reports after each run,
//! so the next fire time is always recomputed from the wall clock. A
//! configuration change through [`AlarmLogEngine::apply_config()`] re-arms
//! the protocol timer immediately.

use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::{Notify, mpsc, oneshot};
use tokio::time::Instant;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::AlarmLogConfig;
use crate::error::Result;
use crate::messages::{IngestOutcome, MessageCategory, MessageLogManager};
use crate::protocol::{
    DispatchOutcome, DispatcherServices, ProtocolDispatcher, SendSummary, SkipReason, Trigger,
    next_cleanup_delay,
};
use crate::registry::ServiceRegistry;
use crate::traits::{LogStore, MediaStore, PdfRenderer};

/// A message to be logged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestRequest {
    /// Message text, starting with a `DD.MM.YYYY` date
    pub message: String,
    /// Message category
    pub category: MessageCategory,
}

impl IngestRequest {
    /// Create an ingest request
    pub fn new(message: impl Into<String>, category: MessageCategory) -> Self {
        Self {
            message: message.into(),
            category,
        }
    }
}

/// Stream of messages fed into the engine
pub type IngestStream = Pin<Box<dyn Stream<Item = IngestRequest> + Send>>;

/// Events emitted by the AlarmLogEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started {
        designation: String,
    },

    /// A message was added to at least one log
    MessageLogged {
        category: MessageCategory,
        targets: Vec<MessageCategory>,
        archived: bool,
    },

    /// A message was not logged
    IngestSkipped {
        category: MessageCategory,
        contended: bool,
    },

    /// Daily cleanup finished
    CleanupFinished {
        pruned: usize,
        archive_deleted: Option<usize>,
    },

    /// Monthly protocol sent
    ProtocolDispatched {
        summary: SendSummary,
    },

    /// Monthly protocol evaluated but not sent
    ProtocolSkipped {
        reason: SkipReason,
    },

    /// Engine stopped
    Stopped {
        reason: String,
    },
}

/// Services the engine is wired with
pub struct EngineServices {
    /// Archive and mailer instances
    pub registry: Arc<ServiceRegistry>,
    /// Persistence of the message logs
    pub log_store: Arc<dyn LogStore>,
    /// Storage for generated documents
    pub media_store: Arc<dyn MediaStore>,
    /// HTML to PDF conversion, required for PDF protocols
    pub pdf_renderer: Option<Arc<dyn PdfRenderer>>,
    /// Wall clock
    pub clock: Arc<dyn Clock>,
}

/// Alarm protocol engine
///
/// ## Lifecycle
///
/// 1. Create with [`AlarmLogEngine::new()`]; the configuration is applied
/// 2. Start with [`AlarmLogEngine::run()`]
/// 3. Engine runs until shutdown signal received
/// 4. The log store is flushed before `run()` returns
///
/// Manual operations (deleting logs, sending the archive protocol,
/// generating reports) go through [`messages()`](Self::messages) and
/// [`dispatcher()`](Self::dispatcher) and may run while the engine loop is
/// active. Configuration changes go through
/// [`apply_config()`](Self::apply_config).
pub struct AlarmLogEngine {
    config: RwLock<AlarmLogConfig>,
    messages: Arc<MessageLogManager>,
    dispatcher: Arc<ProtocolDispatcher>,
    clock: Arc<dyn Clock>,
    event_tx: mpsc::Sender<EngineEvent>,
    reconfigured: Notify,
}

impl AlarmLogEngine {
    /// Create a new engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub async fn new(
        config: AlarmLogConfig,
        services: EngineServices,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let messages = Arc::new(
            MessageLogManager::load(
                &config,
                Arc::clone(&services.registry),
                services.log_store,
                Arc::clone(&services.clock),
            )
            .await?,
        );
        messages.apply_config(&config).await;
        messages.set_active(config.engine.start_active);

        let dispatcher = Arc::new(ProtocolDispatcher::new(
            &config,
            Arc::clone(&messages),
            DispatcherServices {
                registry: services.registry,
                media_store: services.media_store,
                pdf_renderer: services.pdf_renderer,
                clock: Arc::clone(&services.clock),
            },
        ));

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let engine = Self {
            config: RwLock::new(config),
            messages,
            dispatcher,
            clock: services.clock,
            event_tx: tx,
            reconfigured: Notify::new(),
        };

        Ok((engine, rx))
    }

    /// Message log manager of this instance
    pub fn messages(&self) -> &Arc<MessageLogManager> {
        &self.messages
    }

    /// Protocol dispatcher of this instance
    pub fn dispatcher(&self) -> &Arc<ProtocolDispatcher> {
        &self.dispatcher
    }

    /// Current configuration
    pub fn config(&self) -> AlarmLogConfig {
        self.config.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Apply a changed configuration to a running or idle engine
    ///
    /// The configuration is validated first; an invalid one leaves the
    /// engine untouched. A running loop re-arms the protocol timer.
    pub async fn apply_config(&self, config: AlarmLogConfig) -> Result<()> {
        config.validate()?;

        self.messages.apply_config(&config).await;
        self.dispatcher.apply_config(&config);
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = config;

        info!("Configuration applied, rescheduling monthly protocol");
        self.reconfigured.notify_one();
        Ok(())
    }

    /// Run the engine until Ctrl-C
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: The log store could not be flushed
    pub async fn run(&self, ingest: IngestStream) -> Result<()> {
        self.run_internal(ingest, None).await
    }

    /// Run the engine until `shutdown_rx` fires (or Ctrl-C if `None`)
    pub async fn run_with_shutdown(
        &self,
        ingest: IngestStream,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(ingest, shutdown_rx).await
    }

    async fn run_internal(
        &self,
        mut ingest: IngestStream,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<()> {
        let designation = self.config().designation;
        info!("Alarm protocol engine started for {:?}", designation);
        self.emit_event(EngineEvent::Started { designation });

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!("Failed to listen for Ctrl-C: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
        };
        tokio::pin!(shutdown);

        let cleanup_timer = tokio::time::sleep(next_cleanup_delay(self.clock.now()));
        tokio::pin!(cleanup_timer);

        let mut protocol_armed = self.config().monthly_protocol.enabled;
        let protocol_timer = tokio::time::sleep(self.dispatcher.next_fire_delay());
        tokio::pin!(protocol_timer);
        if !protocol_armed {
            debug!("Monthly protocol disabled, timer not armed");
        }

        let mut ingest_open = true;

        loop {
            tokio::select! {
                request = ingest.next(), if ingest_open => {
                    match request {
                        Some(request) => self.handle_ingest(request).await,
                        None => {
                            debug!("Ingest stream ended");
                            ingest_open = false;
                        }
                    }
                }

                _ = &mut cleanup_timer => {
                    let next_run_in = self.handle_cleanup().await;
                    cleanup_timer.as_mut().reset(Instant::now() + next_run_in);
                }

                _ = &mut protocol_timer, if protocol_armed => {
                    let next_fire_in = self.handle_protocol_timer().await;
                    protocol_timer.as_mut().reset(Instant::now() + next_fire_in);
                }

                _ = self.reconfigured.notified() => {
                    protocol_armed = self.config().monthly_protocol.enabled;
                    let next_fire_in = self.dispatcher.next_fire_delay();
                    protocol_timer.as_mut().reset(Instant::now() + next_fire_in);
                    debug!(
                        "Protocol timer re-armed (enabled: {}), next check in {:?}",
                        protocol_armed, next_fire_in
                    );
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(EngineEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        // Flush logs before exiting
        self.messages.flush().await?;
        info!("Message logs flushed, engine stopped");

        Ok(())
    }

    async fn handle_ingest(&self, request: IngestRequest) {
        let category = request.category;
        match self.messages.ingest(&request.message, category).await {
            IngestOutcome::Logged { targets, archived } => {
                self.emit_event(EngineEvent::MessageLogged {
                    category,
                    targets,
                    archived,
                });
            }
            IngestOutcome::Inactive => {
                self.emit_event(EngineEvent::IngestSkipped {
                    category,
                    contended: false,
                });
            }
            IngestOutcome::Contended => {
                self.emit_event(EngineEvent::IngestSkipped {
                    category,
                    contended: true,
                });
            }
        }
    }

    async fn handle_cleanup(&self) -> Duration {
        let report = self.messages.cleanup().await;
        self.emit_event(EngineEvent::CleanupFinished {
            pruned: report.pruned,
            archive_deleted: report.archive_deleted,
        });
        report.next_run_in
    }

    async fn handle_protocol_timer(&self) -> Duration {
        let run = self
            .dispatcher
            .evaluate_and_maybe_send(Trigger::Scheduled, self.config().monthly_protocol.period)
            .await;

        match run.outcome {
            DispatchOutcome::Sent(summary) => {
                info!(
                    "Monthly protocol sent: {} delivered, {} failed",
                    summary.delivered, summary.failed
                );
                self.emit_event(EngineEvent::ProtocolDispatched { summary });
            }
            DispatchOutcome::Skipped(reason) => {
                self.emit_event(EngineEvent::ProtocolSkipped { reason });
            }
        }
        debug!("Next monthly protocol check in {:?}", run.next_fire_in);
        run.next_fire_in
    }

    fn emit_event(&self, event: EngineEvent) {
        // Send event, logging warning if channel is full (backpressure)
        if self.event_tx.try_send(event).is_err() {
            warn!(
                "Event channel full, dropping event. Consider increasing event_channel_capacity."
            );
        }
    }
}
