// # alarmlog-core
//
// Core library for the alarm protocol of an alarm system.
//
// ## Architecture Overview
//
// - **MessageLogManager**: alarm, state and event logs with retention, plus
//   the write-through to the message archive
// - **ProtocolDispatcher**: monthly and archive protocols, rendered from the
//   archive and mailed to the configured recipients
// - **AlarmLogEngine**: drives ingest, the daily cleanup and the monthly
//   protocol timer
// - **ServiceRegistry**: resolves archive and mailer references
//
// Host services (archive, mailer, media store, log store, PDF renderer,
// clock) are injected through the traits in [`traits`].
//
// ## Design Principles
//
// 1. **Library-First**: all behavior is usable without the daemon
// 2. **Advisory services**: a failing archive or mailer is logged, never fatal
// 3. **Bounded contention**: overlapping updates give up instead of blocking

pub mod archive;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod media;
pub mod messages;
pub mod protocol;
pub mod registry;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AlarmLogConfig, Delivery, Recipient, ReportFormat};
pub use engine::{AlarmLogEngine, EngineEvent, EngineServices, IngestRequest, IngestStream};
pub use error::{Error, Result};
pub use messages::{IngestOutcome, MessageCategory, MessageLogManager};
pub use protocol::{
    DispatchOutcome, ProtocolDispatcher, ProtocolPeriod, SendSummary, SkipReason, Trigger,
};
pub use registry::{ObjectId, ServiceRegistry};
pub use traits::{ArchiveSink, LogStore, Mailer, MediaStore, PdfRenderer};
