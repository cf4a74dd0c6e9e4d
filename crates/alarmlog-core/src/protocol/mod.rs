//! Monthly and archive protocols
//!
//! - [`period`]: calendar-month ranges and timer delays
//! - [`report`]: text and HTML rendering
//! - [`dispatcher`]: due checks, rendering and mailing

pub mod dispatcher;
pub mod period;
pub mod report;

pub use dispatcher::{
    DispatchOutcome, DispatchState, DispatcherServices, ProtocolDispatcher, ProtocolRun,
    SendSummary, SkipReason, Trigger,
};
pub use period::{
    ProtocolPeriod, ReportRange, compute_next_fire_delay, month_name, next_cleanup_delay,
};
pub use report::{Report, ReportKind};
