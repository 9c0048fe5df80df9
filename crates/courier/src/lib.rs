//! # courier
//!
//! Build and send plain, multipart and HTML email.
//!
//! ## Features
//!
//! - **Email kinds**: [`SimpleEmail`], [`MultiPartEmail`], [`HtmlEmail`] and
//!   [`ImageHtmlEmail`], one builder parameterized by body kind
//! - **Attachments**: files, URLs and arbitrary data sources
//! - **Inline resources**: embedded images referenced by Content-ID, with
//!   name/resource binding checks
//! - **Automatic embedding**: `<img>` and `<script>` references resolved
//!   from files, URLs or bundled assets
//! - **Delivery**: SMTP sessions (via `courier-smtp`) or any [`Transport`]
//!
//! ## Quick Start
//!
//! ```ignore
//! use courier::SimpleEmail;
//!
//! let mut email = SimpleEmail::new();
//! email
//!     .set_host_name("smtp.example.com")?
//!     .set_from("alice@example.com")?
//!     .add_to("bob@example.com")?
//!     .set_subject("Hello")
//!     .set_msg("Hi Bob")?;
//! let message_id = email.send()?;
//! ```
//!
//! ### HTML with embedded images
//!
//! ```ignore
//! use courier::{ImageHtmlEmail, resolver::FileResolver};
//! use std::sync::Arc;
//!
//! let mut email = ImageHtmlEmail::new();
//! email.set_data_source_resolver(Arc::new(FileResolver::new("templates")));
//! email.set_html_msg(r#"<img src="images/logo.png"> Welcome!"#)?;
//! email.set_text_msg("Welcome!")?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod attachment;
mod body;
pub mod cid;
pub mod content_type;
mod email;
mod error;
mod html;
mod image_html;
mod multipart;
pub mod resolver;
mod url_source;

pub use attachment::{AttachmentSource, EmailAttachment};
pub use body::{Body, BuildContext, Stage, TextBody};
pub use email::Email;
pub use error::{Error, Result};
pub use html::{AsHtml, BodyShape, HtmlBody, InlineRegistry, InlineResource};
pub use image_html::{ImageHtmlBody, SrcMatcher};
pub use multipart::{AsMultipart, MultipartBody};
pub use url_source::UrlDataSource;

pub use courier_mime::{
    BodyPart, BytesDataSource, Charset, DataSource, Disposition, FileDataSource, Mailbox,
    MimeMessage, Multipart,
};
pub use courier_smtp::{Security, Session, SessionConfig, StubTransport, Transport};

/// `text/plain`
pub const TEXT_PLAIN: &str = "text/plain";
/// `text/html`
pub const TEXT_HTML: &str = "text/html";

/// Single-part text email.
pub type SimpleEmail = Email<TextBody>;
/// Email with a multipart body and attachments.
pub type MultiPartEmail = Email<MultipartBody>;
/// Email with HTML, a text alternative and inline resources.
pub type HtmlEmail = Email<HtmlBody>;
/// HTML email whose image and script references are embedded at build time.
pub type ImageHtmlEmail = Email<ImageHtmlBody>;
