//! Attachment descriptors.

use courier_mime::Disposition;
use std::path::PathBuf;
use url::Url;

/// Where an attachment's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSource {
    /// A local file.
    Path(PathBuf),
    /// A remote or `file:` URL.
    Url(Url),
}

/// Describes a file or URL to attach.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct EmailAttachment {
    /// Content location.
    pub source: AttachmentSource,
    /// File name shown to the recipient; defaults to the source's name.
    pub name: Option<String>,
    /// Optional description.
    pub description: Option<String>,
    /// Disposition, `attachment` unless changed.
    pub disposition: Disposition,
}

impl EmailAttachment {
    /// Attachment read from a local file.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::new(AttachmentSource::Path(path.into()))
    }

    /// Attachment fetched from a URL.
    pub fn from_url(url: Url) -> Self {
        Self::new(AttachmentSource::Url(url))
    }

    const fn new(source: AttachmentSource) -> Self {
        Self {
            source,
            name: None,
            description: None,
            disposition: Disposition::Attachment,
        }
    }

    /// Sets the file name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the disposition.
    pub const fn with_disposition(mut self, disposition: Disposition) -> Self {
        self.disposition = disposition;
        self
    }
}
