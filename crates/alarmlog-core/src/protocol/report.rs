// # Protocol Documents
//
// Renders archived values into the plain-text mail body and into the HTML
// handed to the PDF renderer.

use chrono::Datelike;
use std::fmt::Write;
use std::path::PathBuf;

use super::period::{ReportRange, month_name};
use crate::traits::LoggedValue;

/// Text used when a range holds no archived values
pub const NO_EVENTS: &str = "No events present.";

/// Which protocol a report belongs to
///
/// The kind selects the mailer and recipients a report is sent with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// Monthly protocol
    Monthly,
    /// Protocol of the whole archive
    Archive,
}

/// A rendered protocol, ready to be mailed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Protocol kind
    pub kind: ReportKind,
    /// Document title
    pub title: String,
    /// Mail subject
    pub subject: String,
    /// Mail body
    pub body: String,
    /// Stored document sent as attachment, if any
    pub attachment: Option<PathBuf>,
}

/// `Monthly protocol March 2024, Office`
pub fn monthly_title(designation: &str, range: &ReportRange) -> String {
    format!(
        "Monthly protocol {}, {}",
        month_label(range),
        designation
    )
}

/// `<subject> March 2024, Office`
pub fn monthly_subject(subject: &str, designation: &str, range: &ReportRange) -> String {
    format!("{} {}, {}", subject, month_label(range), designation)
}

/// `Archive protocol Office`
pub fn archive_title(designation: &str) -> String {
    format!("Archive protocol {}", designation)
}

/// `<subject> Office`
pub fn archive_subject(subject: &str, designation: &str) -> String {
    format!("{} {}", subject, designation)
}

fn month_label(range: &ReportRange) -> String {
    format!(
        "{} {}",
        month_name(range.start.month()),
        range.start.year()
    )
}

/// Plain-text protocol: the title, then one archived value per line
pub fn render_text(title: &str, values: &[LoggedValue]) -> String {
    let mut text = format!("{}:\n\n\n", title);
    if values.is_empty() {
        text.push_str(NO_EVENTS);
    } else {
        for value in values {
            text.push_str(&value.value);
            text.push('\n');
        }
    }
    text
}

/// HTML protocol for PDF rendering
pub fn render_html(
    designation: &str,
    range: &ReportRange,
    values: &[LoggedValue],
    logo: Option<&str>,
) -> String {
    let mut html = String::new();

    if let Some(logo) = logo.filter(|logo| !logo.trim().is_empty()) {
        let src = if logo.starts_with("data:") {
            logo.to_string()
        } else {
            format!("@{}", logo)
        };
        let _ = write!(
            html,
            "<table cellpadding=\"5\" cellspacing=\"0\" border=\"0\" width=\"95%\">\
             <tr><td width=\"20%\"><img src=\"{}\" alt=\"\"></td></tr></table>",
            escape_html(&src)
        );
    }

    let _ = write!(
        html,
        "<br/><h2>Alarm system {}</h2><h4>Alarm protocol {}</h4><h5> </h5>\
         <table cellpadding=\"5\" cellspacing=\"0\" border=\"0\" width=\"95%\">\
         <tr style=\"background-color: #cccccc; padding:5px;\">\
         <td style=\"padding:5px;\" width=\"100%\"><b>Events</b></td></tr>",
        escape_html(designation),
        range.label()
    );

    if values.is_empty() {
        push_row(&mut html, NO_EVENTS);
    } else {
        for value in values {
            push_row(&mut html, &value.value);
        }
    }

    html.push_str("<tr><td colspan=\"5\"><hr/></td></tr></table><br/>");
    html
}

fn push_row(html: &mut String, cell: &str) {
    let _ = write!(
        html,
        "<tr><td style=\"text-align: left;\">{}</td></tr>",
        escape_html(cell)
    );
}

/// Escape text for use in HTML content and attribute values
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
