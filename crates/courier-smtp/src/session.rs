//! Materialized mail session backed by a blocking SMTP transport.

use crate::config::{SessionConfig, Security};
use crate::error::{Error, Result};
use crate::transport::{Envelope, Transport};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{SmtpTransport, Transport as _};
use std::time::Duration;

/// A configured SMTP session.
///
/// Sessions are immutable once created and may be shared (e.g. behind an
/// `Arc`) by many messages; connections are pooled between sends.
#[derive(Clone)]
pub struct Session {
    config: SessionConfig,
    transport: SmtpTransport,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Materializes a session from configuration.
    ///
    /// No connection is opened until the first message is sent.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingHostName` if no host is configured, or
    /// `Error::Smtp` if TLS parameters cannot be built.
    pub fn new(config: SessionConfig) -> Result<Self> {
        if config.host.trim().is_empty() {
            return Err(Error::MissingHostName);
        }
        let transport = Self::build_transport(&config)?;
        tracing::debug!(
            host = %config.host,
            port = config.port(),
            security = config.security.display_name(),
            authenticated = config.credentials.is_some(),
            "Mail session created"
        );
        Ok(Self { config, transport })
    }

    /// Returns the configuration the session was created from.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn build_transport(config: &SessionConfig) -> Result<SmtpTransport> {
        let tls = match config.security {
            Security::None => Tls::None,
            Security::StartTls => {
                let parameters = Self::tls_parameters(config)?;
                if config.start_tls_required {
                    Tls::Required(parameters)
                } else {
                    Tls::Opportunistic(parameters)
                }
            }
            Security::Tls => Tls::Wrapper(Self::tls_parameters(config)?),
        };

        let mut builder = SmtpTransport::builder_dangerous(config.host.as_str())
            .port(config.port())
            .tls(tls)
            .timeout(Some(Duration::from_millis(config.socket_timeout)));

        if let Some(credentials) = &config.credentials {
            builder = builder.credentials(Credentials::new(
                credentials.username.clone(),
                credentials.password.clone(),
            ));
        }

        Ok(builder.build())
    }

    fn tls_parameters(config: &SessionConfig) -> Result<TlsParameters> {
        Ok(TlsParameters::builder(config.host.clone())
            .dangerous_accept_invalid_certs(!config.check_server_identity)
            .build()?)
    }
}

fn to_lettre(address: &courier_mime::Address) -> Result<lettre::Address> {
    address
        .as_str()
        .parse()
        .map_err(|e| Error::InvalidAddress(format!("{address}: {e}")))
}

impl Transport for Session {
    fn send(&self, envelope: &Envelope, message: &[u8]) -> Result<()> {
        let recipients = envelope
            .recipients()
            .iter()
            .map(to_lettre)
            .collect::<Result<Vec<_>>>()?;
        let envelope = lettre::address::Envelope::new(Some(to_lettre(envelope.from())?), recipients)
            .map_err(|e| Error::InvalidEnvelope(e.to_string()))?;

        tracing::debug!(
            host = %self.config.host,
            recipients = envelope.to().len(),
            bytes = message.len(),
            "Sending message"
        );
        self.transport.send_raw(&envelope, message)?;
        tracing::info!(host = %self.config.host, "Message sent");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port())
    }
}
