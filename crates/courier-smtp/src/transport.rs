//! Envelope and the transport seam.

use crate::error::{Error, Result};
use courier_mime::Address;
use std::sync::{Mutex, PoisonError};

/// SMTP envelope: reverse path and forward paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    from: Address,
    recipients: Vec<Address>,
}

impl Envelope {
    /// Creates an envelope.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidEnvelope` if there are no recipients.
    pub fn new(from: Address, recipients: Vec<Address>) -> Result<Self> {
        if recipients.is_empty() {
            return Err(Error::InvalidEnvelope("at least one recipient required".into()));
        }
        Ok(Self { from, recipients })
    }

    /// Returns the reverse path.
    #[must_use]
    pub const fn from(&self) -> &Address {
        &self.from
    }

    /// Returns the forward paths.
    #[must_use]
    pub fn recipients(&self) -> &[Address] {
        &self.recipients
    }
}

/// Something that delivers rendered messages.
pub trait Transport: Send + Sync {
    /// Delivers `message` (wire format) to the envelope recipients.
    ///
    /// # Errors
    ///
    /// Returns an error if the message could not be delivered.
    fn send(&self, envelope: &Envelope, message: &[u8]) -> Result<()>;

    /// Describes the destination for error messages (e.g. `host:port`).
    fn describe(&self) -> String;
}

/// A delivered message captured by [`StubTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Envelope the message was sent with.
    pub envelope: Envelope,
    /// Raw message bytes.
    pub data: Vec<u8>,
}

impl SentMessage {
    /// Returns the message as text (lossy).
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// In-memory transport that records messages instead of sending them.
#[derive(Debug, Default)]
pub struct StubTransport {
    sent: Mutex<Vec<SentMessage>>,
    failure: Option<String>,
}

impl StubTransport {
    /// Creates a transport that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport that rejects every message with `reason`.
    #[must_use]
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failure: Some(reason.into()),
        }
    }

    /// Returns the messages accepted so far.
    #[must_use]
    pub fn messages(&self) -> Vec<SentMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Transport for StubTransport {
    fn send(&self, envelope: &Envelope, message: &[u8]) -> Result<()> {
        if let Some(reason) = &self.failure {
            return Err(Error::Rejected(reason.clone()));
        }
        tracing::debug!(
            from = %envelope.from(),
            recipients = envelope.recipients().len(),
            bytes = message.len(),
            "Stub transport accepted message"
        );
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentMessage {
                envelope: envelope.clone(),
                data: message.to_vec(),
            });
        Ok(())
    }

    fn describe(&self) -> String {
        "stub".to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn envelope() -> Envelope {
        Envelope::new(
            Address::new("from@example.com").unwrap(),
            vec![Address::new("to@example.com").unwrap()],
        )
        .unwrap()
    }

    #[test]
    fn test_envelope_requires_recipients() {
        let from = Address::new("from@example.com").unwrap();
        assert!(Envelope::new(from, Vec::new()).is_err());
    }

    #[test]
    fn test_stub_records_messages() {
        let transport = StubTransport::new();
        transport.send(&envelope(), b"Subject: hi\r\n\r\nbody").unwrap();
        let sent = transport.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].envelope.recipients()[0].as_str(), "to@example.com");
        assert!(sent[0].text().ends_with("body"));
    }

    #[test]
    fn test_failing_stub() {
        let transport = StubTransport::failing("mailbox full");
        let err = transport.send(&envelope(), b"x").unwrap_err();
        assert!(matches!(err, Error::Rejected(reason) if reason == "mailbox full"));
        assert!(transport.messages().is_empty());
    }
}
