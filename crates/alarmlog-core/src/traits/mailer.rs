// # Mailer Trait
//
// Defines the interface for sending protocol mails.
//
// ## Implementations
//
// - Drop directory via lettre: `alarmlog-mailer-lettre` crate
// - Host SMTP instances: provided by the embedding runtime
//
// A mailer sends exactly one message per call. Recipient validation, the
// recipient loop and failure accounting belong to the protocol dispatcher.

use async_trait::async_trait;
use std::path::Path;

/// Trait for mail sender implementations
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send a plain-text mail
    async fn send_mail(&self, to: &str, subject: &str, body: &str) -> Result<(), crate::Error>;

    /// Send a plain-text mail with the file at `attachment` attached
    async fn send_mail_with_attachment(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachment: &Path,
    ) -> Result<(), crate::Error>;

    /// Mailer name (for logging/debugging)
    fn mailer_name(&self) -> &'static str;
}
