//! HTML report rendering
//!
//! Output is a small HTML fragment, not a document. Every piece of text that
//! comes from the server or the configuration is escaped before it is embedded.

use crate::{Error, Result};
use std::fmt::Write;

/// Whether the session is encrypted, and with which cipher
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsStatus {
    cipher: Option<String>,
}

impl TlsStatus {
    /// Status for an unencrypted session
    pub fn inactive() -> Self {
        Self { cipher: None }
    }

    /// Status from the server-reported cipher; empty means not encrypted
    pub fn from_cipher(cipher: Option<&str>) -> Self {
        Self {
            cipher: cipher
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        }
    }

    /// Whether TLS is active
    pub fn active(&self) -> bool {
        self.cipher.is_some()
    }

    /// Active cipher name, present only if TLS is active
    pub fn cipher(&self) -> Option<&str> {
        self.cipher.as_deref()
    }
}

/// Database names in the order the server returned them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseListing {
    names: Vec<String>,
}

impl DatabaseListing {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for DatabaseListing {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

/// Escape text for inclusion in HTML element content or quoted attributes.
///
/// Replaces `&`, `<`, `>`, `"` and `'`.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

/// Render the probe report.
///
/// `label` names the engine variant in the heading. A query error replaces the
/// database list with a single error line.
pub fn render(label: &str, listing: &Result<DatabaseListing>, tls: &TlsStatus) -> String {
    let mut out = String::new();

    let suffix = if tls.active() { " (SSL Encrypted)" } else { "" };
    // Writing to a String cannot fail.
    let _ = writeln!(
        out,
        "<h2>{} - Database List{}</h2>",
        escape_html(label),
        suffix
    );

    if let Some(cipher) = tls.cipher() {
        let _ = writeln!(out, "<p>SSL Cipher: {}</p>", escape_html(cipher));
    }

    match listing {
        Ok(listing) => {
            out.push_str("<h3>Available Databases:</h3>\n<ul>\n");
            for name in listing.names() {
                let _ = writeln!(out, "<li>{}</li>", escape_html(name));
            }
            out.push_str("</ul>\n");
        }
        Err(err) => {
            let _ = writeln!(out, "<p>Error: {}</p>", escape_html(&error_text(err)));
        }
    }

    out
}

fn error_text(err: &Error) -> String {
    match err {
        Error::Query(text) => text.clone(),
        other => other.to_string(),
    }
}
