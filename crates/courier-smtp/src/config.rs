//! Mail session configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default socket and connection timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Security/encryption mode for connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    /// No encryption.
    #[default]
    None,
    /// STARTTLS upgrade after plaintext connect.
    StartTls,
    /// Implicit TLS (connect directly with TLS).
    Tls,
}

impl Security {
    /// Get display name for the security mode.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::None => "None (insecure)",
            Self::StartTls => "STARTTLS",
            Self::Tls => "SSL/TLS",
        }
    }
}

impl FromStr for Security {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "plain" => Ok(Self::None),
            "starttls" => Ok(Self::StartTls),
            "tls" | "ssl" => Ok(Self::Tls),
            other => Err(Error::Config(format!("Unknown security mode: {other}"))),
        }
    }
}

/// Username and password for SMTP AUTH.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Username.
    pub username: String,
    /// Password.
    pub password: String,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Settings a mail session is materialized from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Server hostname.
    pub host: String,
    /// Port for plain and STARTTLS connections.
    pub smtp_port: u16,
    /// Port for implicit TLS connections.
    pub ssl_smtp_port: u16,
    /// Security mode.
    pub security: Security,
    /// Fail instead of sending in clear text when STARTTLS is unavailable.
    pub start_tls_required: bool,
    /// Verify the server certificate.
    pub check_server_identity: bool,
    /// Optional SMTP AUTH credentials.
    pub credentials: Option<Credentials>,
    /// Socket I/O timeout in milliseconds.
    pub socket_timeout: u64,
    /// Connection timeout in milliseconds.
    pub connection_timeout: u64,
    /// Sender used when a message carries no From address.
    pub from: Option<String>,
    /// Envelope sender (bounce address) overriding the From address.
    pub bounce_address: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            smtp_port: Self::default_port(Security::None),
            ssl_smtp_port: Self::default_port(Security::Tls),
            security: Security::None,
            start_tls_required: false,
            check_server_identity: true,
            credentials: None,
            socket_timeout: DEFAULT_TIMEOUT_MS,
            connection_timeout: DEFAULT_TIMEOUT_MS,
            from: None,
            bounce_address: None,
        }
    }
}

impl SessionConfig {
    /// Creates a configuration for `host` with defaults elsewhere.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Get default port for the security mode.
    #[must_use]
    pub const fn default_port(security: Security) -> u16 {
        match security {
            Security::None => 25,
            Security::StartTls => 587,
            Security::Tls => 465,
        }
    }

    /// Port the session connects to for the configured security mode.
    #[must_use]
    pub const fn port(&self) -> u16 {
        match self.security {
            Security::Tls => self.ssl_smtp_port,
            Security::None | Security::StartTls => self.smtp_port,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `SMTP_HOST`: SMTP server hostname (required)
    /// - `SMTP_SECURITY`: `none`, `starttls` or `tls` (default: none)
    /// - `SMTP_PORT`: SMTP server port (default: depends on security)
    /// - `SMTP_USERNAME` / `SMTP_PASSWORD`: credentials (optional)
    /// - `SMTP_FROM`: default sender (optional)
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if a variable is missing or malformed.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if a variable is missing or malformed.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("SMTP_HOST")
            .filter(|host| !host.trim().is_empty())
            .ok_or_else(|| Error::Config("SMTP_HOST environment variable not set".into()))?;

        let security = lookup("SMTP_SECURITY")
            .map(|value| value.parse::<Security>())
            .transpose()?
            .unwrap_or_default();

        let port = lookup("SMTP_PORT")
            .map(|value| {
                value
                    .trim()
                    .parse::<u16>()
                    .map_err(|_| Error::Config("SMTP_PORT must be a valid port number".into()))
            })
            .transpose()?
            .unwrap_or(Self::default_port(security));

        let credentials = match (lookup("SMTP_USERNAME"), lookup("SMTP_PASSWORD")) {
            (Some(username), Some(password)) => Some(Credentials::new(username, password)),
            (Some(_), None) => {
                return Err(Error::Config(
                    "SMTP_PASSWORD environment variable not set".into(),
                ));
            }
            _ => None,
        };

        let mut config = Self::new(host);
        config.security = security;
        match security {
            Security::Tls => config.ssl_smtp_port = port,
            Security::None | Security::StartTls => config.smtp_port = port,
        }
        config.credentials = credentials;
        config.from = lookup("SMTP_FROM");
        Ok(config)
    }
}
