// # Drop Directory Mailer
//
// This crate provides a `Mailer` implementation for the alarm protocol that
// builds RFC 5322 messages with lettre and writes them as `.eml` files into
// a drop directory. A local MTA, a spool watcher or an operator picks them
// up from there.
//
// ## Behavior
//
// - One `.eml` file per call; the file name is the message id
// - Attachments are read from disk and attached with a content type derived
//   from their extension
// - No retries: the protocol dispatcher counts failures and moves on to the
//   next recipient
//
// ## Usage
//
// ```rust,ignore
// use alarmlog_mailer_lettre::FileDropMailer;
//
// let mailer = FileDropMailer::new("/var/spool/alarmlog", "Alarm system <alarm@example.com>").await?;
// registry.register_mailer(ObjectId(200), Arc::new(mailer));
// ```

use alarmlog_core::{Error, Mailer, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::{AsyncFileTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::{Path, PathBuf};

/// Mailer writing messages into a drop directory
pub struct FileDropMailer {
    from: Mailbox,
    dir: PathBuf,
    transport: AsyncFileTransport<Tokio1Executor>,
}

impl FileDropMailer {
    /// Create a mailer writing to `dir`, creating the directory if needed
    ///
    /// # Errors
    ///
    /// - `Error::Config` if `from` is not a valid mailbox or the directory
    ///   cannot be created
    pub async fn new(dir: impl AsRef<Path>, from: &str) -> Result<Self> {
        let from: Mailbox = from
            .parse()
            .map_err(|e| Error::config(format!("Invalid sender address {:?}: {}", from, e)))?;

        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            Error::config(format!(
                "Failed to create mail drop directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        Ok(Self {
            from,
            transport: AsyncFileTransport::<Tokio1Executor>::new(&dir),
            dir,
        })
    }

    /// Directory the messages are written to
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn deliver(&self, message: Message) -> Result<()> {
        let id = self
            .transport
            .send(message)
            .await
            .map_err(|e| Error::mailer(format!("Failed to write message: {}", e)))?;
        tracing::debug!("Wrote message {} to {}", id, self.dir.display());
        Ok(())
    }
}

impl std::fmt::Debug for FileDropMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDropMailer")
            .field("from", &self.from.to_string())
            .field("dir", &self.dir)
            .finish()
    }
}

/// Build a message with an optional attachment
///
/// # Errors
///
/// - `Error::Mailer` if an address does not parse or the message cannot be
///   assembled
pub fn build_message(
    from: &Mailbox,
    to: &str,
    subject: &str,
    body: &str,
    attachment: Option<(&str, Vec<u8>)>,
) -> Result<Message> {
    let to: Mailbox = to
        .parse()
        .map_err(|e| Error::mailer(format!("Invalid recipient address {:?}: {}", to, e)))?;

    let builder = Message::builder()
        .from(from.clone())
        .to(to)
        .subject(subject);

    let message = match attachment {
        None => builder
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string()),
        Some((filename, content)) => {
            let content_type = content_type_for(filename)?;
            builder.multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(body.to_string()))
                    .singlepart(Attachment::new(filename.to_string()).body(content, content_type)),
            )
        }
    };

    message.map_err(|e| Error::mailer(format!("Failed to build message: {}", e)))
}

fn content_type_for(filename: &str) -> Result<ContentType> {
    let mime = match Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        _ => "application/octet-stream",
    };
    ContentType::parse(mime).map_err(|e| Error::mailer(format!("Invalid content type: {}", e)))
}

#[async_trait]
impl Mailer for FileDropMailer {
    async fn send_mail(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let message = build_message(&self.from, to, subject, body, None)?;
        self.deliver(message).await
    }

    async fn send_mail_with_attachment(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachment: &Path,
    ) -> Result<()> {
        let content = tokio::fs::read(attachment).await.map_err(|e| {
            Error::mailer(format!(
                "Failed to read attachment {}: {}",
                attachment.display(),
                e
            ))
        })?;
        let filename = attachment
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("attachment");

        let message = build_message(&self.from, to, subject, body, Some((filename, content)))?;
        self.deliver(message).await
    }

    fn mailer_name(&self) -> &'static str {
        "file-drop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn eml_files(dir: &Path) -> Vec<String> {
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            if entry.path().extension().and_then(|e| e.to_str()) == Some("eml") {
                files.push(tokio::fs::read_to_string(entry.path()).await.unwrap());
            }
        }
        files
    }

    #[tokio::test]
    async fn test_send_mail_writes_eml() {
        let dir = tempdir().unwrap();
        let mailer = FileDropMailer::new(dir.path(), "Alarm <alarm@example.com>")
            .await
            .unwrap();

        mailer
            .send_mail("ops@example.com", "Monthly protocol", "No events present.")
            .await
            .unwrap();

        let files = eml_files(dir.path()).await;
        assert_eq!(files.len(), 1);
        assert!(files[0].contains("To: ops@example.com"));
        assert!(files[0].contains("Subject: Monthly protocol"));
        assert!(files[0].contains("No events present."));
    }

    #[tokio::test]
    async fn test_send_mail_with_attachment() {
        let dir = tempdir().unwrap();
        let attachment = dir.path().join("monthly_protocol.pdf");
        tokio::fs::write(&attachment, b"%PDF-1.4").await.unwrap();

        let drop_dir = dir.path().join("drop");
        let mailer = FileDropMailer::new(&drop_dir, "alarm@example.com")
            .await
            .unwrap();
        mailer
            .send_mail_with_attachment("ops@example.com", "Protocol", "See attachment", &attachment)
            .await
            .unwrap();

        let files = eml_files(&drop_dir).await;
        assert_eq!(files.len(), 1);
        assert!(files[0].contains("application/pdf"));
        assert!(files[0].contains("monthly_protocol.pdf"));
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_an_error() {
        let dir = tempdir().unwrap();
        let mailer = FileDropMailer::new(dir.path(), "alarm@example.com")
            .await
            .unwrap();

        let result = mailer.send_mail("not an address", "s", "b").await;
        assert!(matches!(result, Err(Error::Mailer(_))));
        assert!(eml_files(dir.path()).await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_attachment_is_an_error() {
        let dir = tempdir().unwrap();
        let mailer = FileDropMailer::new(dir.path(), "alarm@example.com")
            .await
            .unwrap();

        let result = mailer
            .send_mail_with_attachment("ops@example.com", "s", "b", &dir.path().join("missing.pdf"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_invalid_sender_rejected() {
        let dir = tempdir().unwrap();
        assert!(FileDropMailer::new(dir.path(), "nobody").await.is_err());
    }

    #[test]
    fn test_content_types() {
        assert!(content_type_for("report.PDF").is_ok());
        assert!(content_type_for("protocol.txt").is_ok());
        assert!(content_type_for("blob").is_ok());
    }
}
