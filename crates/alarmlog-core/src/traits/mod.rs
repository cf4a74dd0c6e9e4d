//! Core traits for the alarm protocol
//!
//! This module defines the abstract interfaces to the services the core calls
//! into.
//!
//! - [`ArchiveSink`]: Time-series archive for the message archive variable
//! - [`Mailer`]: Sends protocol mails
//! - [`MediaStore`]: Stores generated documents
//! - [`LogStore`]: Persists the rendered message logs
//! - [`PdfRenderer`]: Converts protocol HTML into PDF

pub mod archive_sink;
pub mod log_store;
pub mod mailer;
pub mod media_store;
pub mod pdf_renderer;

pub use archive_sink::{ArchiveSink, LoggedValue};
pub use log_store::LogStore;
pub use mailer::Mailer;
pub use media_store::MediaStore;
pub use pdf_renderer::{DocumentInfo, PdfRenderer};
