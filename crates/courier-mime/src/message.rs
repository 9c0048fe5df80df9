//! Top-level MIME message.

use crate::error::Result;
use crate::header::Headers;
use crate::part::BodyPart;
use chrono::{DateTime, TimeZone};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

static MESSAGE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A complete message: envelope headers plus a root body part.
///
/// Bcc headers are kept on the message so callers can derive the envelope
/// from it, but are never written out.
#[derive(Debug, Clone, Default)]
pub struct MimeMessage {
    /// Message headers (From, To, Subject, ...), in rendering order.
    pub headers: Headers,
    body: BodyPart,
}

impl MimeMessage {
    /// Creates an empty message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the root body part.
    #[must_use]
    pub const fn body(&self) -> &BodyPart {
        &self.body
    }

    /// Returns the root body part mutably.
    pub const fn body_mut(&mut self) -> &mut BodyPart {
        &mut self.body
    }

    /// Replaces the root body part.
    pub fn set_body(&mut self, body: BodyPart) {
        self.body = body;
    }

    /// Gets the From header.
    #[must_use]
    pub fn from(&self) -> Option<&str> {
        self.headers.get("From")
    }

    /// Gets the Subject header.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.headers.get("Subject")
    }

    /// Gets the Date header.
    #[must_use]
    pub fn date(&self) -> Option<&str> {
        self.headers.get("Date")
    }

    /// Gets the Message-ID header.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.headers.get("Message-ID")
    }

    /// Sets the Date header in RFC 2822 format.
    pub fn set_sent_date<Tz: TimeZone>(&mut self, date: &DateTime<Tz>)
    where
        Tz::Offset: std::fmt::Display,
    {
        self.headers.set("Date", date.to_rfc2822());
    }

    /// Returns the Message-ID, generating one under `domain` if absent.
    pub fn ensure_message_id(&mut self, domain: &str) -> String {
        if let Some(id) = self.message_id() {
            return id.to_string();
        }
        let sequence = MESSAGE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let salt: u32 = rand::random();
        let millis = chrono::Utc::now().timestamp_millis();
        let id = format!("<{salt}.{sequence}.{millis}@{domain}>");
        self.headers.set("Message-ID", id.clone());
        id
    }

    /// Writes the message in wire format, omitting Bcc.
    ///
    /// `MIME-Version: 1.0` is added unless already present.
    ///
    /// # Errors
    ///
    /// Returns an error if body content cannot be read or writing fails.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        let mut headers = Headers::new();
        for (name, value) in self.headers.iter() {
            if !name.eq_ignore_ascii_case("Bcc") {
                headers.add(name, value);
            }
        }
        if !headers.contains("MIME-Version") {
            headers.add("MIME-Version", "1.0");
        }
        self.body.write_with_headers(&headers, out)
    }

    /// Renders the message in wire format.
    ///
    /// # Errors
    ///
    /// Returns an error if body content cannot be read.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }
}
