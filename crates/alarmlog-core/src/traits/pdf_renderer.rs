// # PDF Renderer Trait
//
// HTML to PDF conversion is an external service. The dispatcher builds the
// protocol as HTML and hands it over together with the document metadata.

use async_trait::async_trait;

/// Metadata embedded in a rendered document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    /// Document author
    pub author: String,
    /// Document title
    pub title: String,
    /// Document subject
    pub subject: String,
}

/// Trait for HTML to PDF renderers
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    /// Render `html` into PDF bytes
    async fn render(&self, html: &str, info: &DocumentInfo) -> Result<Vec<u8>, crate::Error>;
}
