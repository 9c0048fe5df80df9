//! Error types for building and sending email.

use crate::resolver::ResolveError;
use std::io;

/// Result type alias for email operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Email error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `build` was called on an email that was already built.
    #[error("The MimeMessage is already built")]
    AlreadyBuilt,

    /// The multipart container was initialized twice.
    #[error("Multipart container already initialized")]
    AlreadyInitialized,

    /// Session settings changed after the session was created.
    #[error("The mail session is already initialized")]
    SessionInitialized,

    /// An empty address collection was supplied.
    #[error("Address List provided was invalid")]
    InvalidAddressList,

    /// Header name was empty.
    #[error("Header name can not be empty")]
    EmptyHeaderName,

    /// Header value was empty.
    #[error("Header value can not be empty")]
    EmptyHeaderValue,

    /// Message text was empty.
    #[error("Invalid message supplied")]
    InvalidMessage,

    /// Neither the email nor the session names a sender.
    #[error("From address required")]
    MissingFrom,

    /// No To, Cc or Bcc recipients.
    #[error("At least one receiver address required")]
    NoRecipients,

    /// No SMTP host configured.
    #[error("Cannot find valid hostname for mail session")]
    MissingHostName,

    /// Resource name was empty.
    #[error("Name cannot be null or empty")]
    EmptyName,

    /// Send was requested before a message was built.
    #[error("MimeMessage has not been created yet")]
    NotBuilt,

    /// Port number out of range.
    #[error("Cannot connect to a port number that is less than 1 ({0})")]
    InvalidPort(u16),

    /// An attachment could not be read.
    #[error("Cannot attach {target}: {source}")]
    Attach {
        /// What was being attached (file path, URL, data source name).
        target: String,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// A URL could not be parsed or opened.
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The URL as supplied.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A file could not be embedded.
    #[error("{0}")]
    EmbedFile(String),

    /// An inline name is already bound to a different resource.
    #[error("embedded name '{name}' is already bound to {existing}; existing names cannot be rebound")]
    NameAlreadyBound {
        /// The inline resource name.
        name: String,
        /// Description of the resource it is bound to.
        existing: String,
    },

    /// A resource reference could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Markup scanning pattern failed to compile.
    #[error("Invalid markup pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Failure from the MIME layer (addresses, charsets, rendering).
    #[error(transparent)]
    Mime(#[from] courier_mime::Error),

    /// Delivery failed.
    #[error("Sending the email to the following server failed : {server}")]
    Send {
        /// Destination description, e.g. `host:port`.
        server: String,
        /// Transport failure.
        #[source]
        source: courier_smtp::Error,
    },
}

impl Error {
    /// Returns true for errors caused by calling the API in the wrong
    /// order or with empty input, as opposed to resource or delivery
    /// failures.
    #[must_use]
    pub const fn is_usage(&self) -> bool {
        matches!(
            self,
            Self::AlreadyBuilt
                | Self::AlreadyInitialized
                | Self::SessionInitialized
                | Self::InvalidAddressList
                | Self::EmptyHeaderName
                | Self::EmptyHeaderValue
                | Self::InvalidMessage
                | Self::MissingFrom
                | Self::NoRecipients
                | Self::MissingHostName
                | Self::EmptyName
                | Self::NotBuilt
                | Self::InvalidPort(_)
        )
    }

    pub(crate) fn attach(target: impl Into<String>, source: io::Error) -> Self {
        Self::Attach {
            target: target.into(),
            source,
        }
    }

    pub(crate) fn invalid_url(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}
