//! # courier-smtp
//!
//! Mail session configuration and message delivery.
//!
//! ## Features
//!
//! - **Session configuration**: host, ports, security mode, credentials and
//!   timeouts, loadable from serde or environment variables
//! - **SMTP delivery**: blocking transport with connection pooling (via `lettre`)
//! - **Stub transport**: records messages in memory for tests
//!
//! ## Quick Start
//!
//! ```ignore
//! use courier_smtp::{Envelope, Security, Session, SessionConfig, Transport};
//! use courier_mime::Address;
//!
//! let mut config = SessionConfig::new("smtp.example.com");
//! config.security = Security::StartTls;
//! config.smtp_port = 587;
//!
//! let session = Session::new(config)?;
//! let envelope = Envelope::new(
//!     Address::new("sender@example.com")?,
//!     vec![Address::new("recipient@example.com")?],
//! )?;
//! session.send(&envelope, raw_message)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod session;
mod transport;

pub use config::{Credentials, DEFAULT_TIMEOUT_MS, Security, SessionConfig};
pub use error::{Error, Result};
pub use session::Session;
pub use transport::{Envelope, SentMessage, StubTransport, Transport};
