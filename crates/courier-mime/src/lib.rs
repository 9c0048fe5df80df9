//! # courier-mime
//!
//! MIME entity construction and rendering for outgoing email.
//!
//! ## Features
//!
//! - **Body parts**: text, bytes, data sources and nested multiparts
//! - **Multipart**: mixed, alternative and related containers
//! - **Encoding**: Base64, Quoted-Printable, RFC 2047 encoded words, header folding
//! - **Charsets**: US-ASCII, ISO-8859-1 and UTF-8 with alias lookup
//! - **Addresses**: syntax checks and encoded display names
//!
//! ## Quick Start
//!
//! ```ignore
//! use courier_mime::{BodyPart, MimeMessage, Multipart};
//!
//! let mut text = BodyPart::new();
//! text.set_text("Plain text version", None, "plain");
//! let mut html = BodyPart::new();
//! html.set_text("<h1>HTML version</h1>", None, "html");
//!
//! let mut alternative = Multipart::alternative();
//! alternative.add_part(text);
//! alternative.add_part(html);
//!
//! let mut message = MimeMessage::new();
//! message.headers.add("From", "sender@example.com");
//! message.headers.add("To", "recipient@example.com");
//! message.body_mut().set_multipart(alternative);
//!
//! let raw = message.to_bytes()?;
//! ```
//!
//! ### Data sources
//!
//! ```ignore
//! use courier_mime::{BodyPart, Disposition, FileDataSource};
//! use std::sync::Arc;
//!
//! let mut part = BodyPart::new();
//! part.set_data_source(Arc::new(FileDataSource::new("report.pdf")));
//! part.set_file_name("report.pdf");
//! part.set_disposition(Disposition::Attachment);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod charset;
mod content_type;
mod data_source;
mod error;
mod header;
mod message;
mod part;

pub mod encoding;

pub use address::{Address, Mailbox};
pub use charset::Charset;
pub use content_type::ContentType;
pub use data_source::{
    APPLICATION_OCTET_STREAM, BytesDataSource, DataSource, FileDataSource, ResourceIdentity,
    same_resource,
};
pub use error::{Error, Result};
pub use header::Headers;
pub use message::MimeMessage;
pub use part::{BodyPart, Content, Disposition, Multipart, TransferEncoding};
