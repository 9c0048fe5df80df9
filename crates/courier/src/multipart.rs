//! Multipart bodies with attachments.

use crate::attachment::{AttachmentSource, EmailAttachment};
use crate::body::{Body, BuildContext, Stage};
use crate::email::Email;
use crate::error::{Error, Result};
use crate::url_source::UrlDataSource;
use courier_mime::{BodyPart, DataSource, Disposition, FileDataSource, Multipart};
use std::io;
use std::path::Path;
use std::sync::Arc;
use url::Url;

/// Body holding a multipart container, `multipart/mixed` unless a subtype
/// is set.
///
/// The container is created on first use. The primary body part is
/// inserted as the first part when it is first requested.
#[derive(Debug, Default)]
pub struct MultipartBody {
    container: Option<Multipart>,
    initialized: bool,
    primary: Option<usize>,
    sub_type: Option<String>,
    has_attachments: bool,
}

impl MultipartBody {
    pub(crate) fn container(&mut self) -> &mut Multipart {
        self.initialized = true;
        self.container.get_or_insert_with(Multipart::mixed)
    }

    pub(crate) fn insert_part(&mut self, index: usize, part: BodyPart) -> Result<()> {
        self.container().insert_part(index, part)?;
        if let Some(primary) = self.primary.as_mut() {
            if *primary >= index {
                *primary += 1;
            }
        }
        Ok(())
    }

    pub(crate) fn push_part(&mut self, part: BodyPart) {
        self.container().add_part(part);
    }

    fn primary_body_part(&mut self) -> Result<&mut BodyPart> {
        let index = match self.primary {
            Some(index) => index,
            None => {
                self.insert_part(0, BodyPart::new())?;
                self.primary = Some(0);
                0
            }
        };
        self.container().get_mut(index).ok_or_else(|| {
            Error::Mime(courier_mime::Error::InvalidMultipart(
                "primary body part is missing".into(),
            ))
        })
    }

    pub(crate) const fn has_attachments(&self) -> bool {
        self.has_attachments
    }

    pub(crate) fn take_multipart(&mut self) -> Option<Multipart> {
        self.container.take()
    }
}

/// Access to the multipart state of a body kind.
pub trait AsMultipart: Body {
    /// Multipart state.
    fn multipart(&self) -> &MultipartBody;
    /// Mutable multipart state.
    fn multipart_mut(&mut self) -> &mut MultipartBody;
}

impl AsMultipart for MultipartBody {
    fn multipart(&self) -> &MultipartBody {
        self
    }

    fn multipart_mut(&mut self) -> &mut MultipartBody {
        self
    }
}

impl Body for MultipartBody {
    fn stages() -> Vec<Stage<Self>> {
        vec![Stage::new("apply multipart subtype", apply_sub_type::<Self>)]
    }

    fn set_msg(email: &mut Email<Self>, msg: &str) -> Result<()> {
        let charset = email.charset();
        email
            .body
            .primary_body_part()?
            .set_text(msg, charset, "plain");
        Ok(())
    }

    fn take_container(&mut self) -> Option<Multipart> {
        self.take_multipart()
    }
}

pub(crate) fn apply_sub_type<B: AsMultipart>(
    email: &mut Email<B>,
    _ctx: &mut BuildContext,
) -> Result<()> {
    let body = email.body.multipart_mut();
    if let Some(sub_type) = body.sub_type.clone() {
        body.container().set_subtype(sub_type);
    }
    Ok(())
}

impl<B: AsMultipart> Email<B> {
    /// Creates the multipart container.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyInitialized`] if the container exists.
    pub fn init(&mut self) -> Result<&mut Self> {
        let body = self.body.multipart_mut();
        if body.initialized {
            return Err(Error::AlreadyInitialized);
        }
        body.container();
        Ok(self)
    }

    /// Sets the container subtype, e.g. `related` or `alternative`.
    pub fn set_sub_type(&mut self, sub_type: &str) -> &mut Self {
        self.body.multipart_mut().sub_type = Some(sub_type.to_string());
        self
    }

    /// Returns the container subtype set by the caller.
    #[must_use]
    pub fn sub_type(&self) -> Option<&str> {
        self.body.multipart().sub_type.as_deref()
    }

    /// Returns true once anything was attached.
    #[must_use]
    pub fn has_attachments(&self) -> bool {
        self.body.multipart().has_attachments
    }

    /// Overrides the attachment flag.
    pub fn set_has_attachments(&mut self, has_attachments: bool) -> &mut Self {
        self.body.multipart_mut().has_attachments = has_attachments;
        self
    }

    /// Returns the container, creating it if needed.
    pub fn container(&mut self) -> &mut Multipart {
        self.body.multipart_mut().container()
    }

    /// Returns the primary body part, creating it as the first part of the
    /// container if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot take the part.
    pub fn primary_body_part(&mut self) -> Result<&mut BodyPart> {
        self.body.multipart_mut().primary_body_part()
    }

    /// Appends a part with the given content and content type.
    ///
    /// # Errors
    ///
    /// Returns an error for an unparseable content type.
    pub fn add_part(&mut self, content: &str, content_type: &str) -> Result<&mut Self> {
        let mut part = BodyPart::new();
        part.set_text_content(content, content_type)?;
        self.body.multipart_mut().push_part(part);
        Ok(self)
    }

    /// Appends a nested multipart.
    pub fn add_multipart(&mut self, multipart: Multipart) -> &mut Self {
        let mut part = BodyPart::new();
        part.set_multipart(multipart);
        self.body.multipart_mut().push_part(part);
        self
    }

    /// Inserts a nested multipart at `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is past the end of the container.
    pub fn add_multipart_at(&mut self, multipart: Multipart, index: usize) -> Result<&mut Self> {
        let mut part = BodyPart::new();
        part.set_multipart(multipart);
        self.body.multipart_mut().insert_part(index, part)?;
        Ok(self)
    }

    /// Attaches the file or URL described by `attachment`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Attach`] if the file is missing or unreadable, or
    /// [`Error::InvalidUrl`] for a URL that cannot be fetched.
    pub fn attach(&mut self, attachment: &EmailAttachment) -> Result<&mut Self> {
        let name = attachment.name.as_deref();
        let description = attachment.description.as_deref();
        match &attachment.source {
            AttachmentSource::Path(path) => {
                self.attach_path(path, name, description, attachment.disposition)
            }
            AttachmentSource::Url(url) => {
                self.attach_url(url.as_str(), name, description, attachment.disposition)
            }
        }
    }

    /// Attaches a file under its own file name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Attach`] if the file is missing or unreadable.
    pub fn attach_file(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        self.attach_path(path.as_ref(), None, None, Disposition::Attachment)
    }

    fn attach_path(
        &mut self,
        path: &Path,
        name: Option<&str>,
        description: Option<&str>,
        disposition: Disposition,
    ) -> Result<&mut Self> {
        if !path.exists() {
            let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
            return Err(Error::attach(
                format!("file {}", absolute.display()),
                io::Error::new(io::ErrorKind::NotFound, "file does not exist"),
            ));
        }
        if !path.is_file() {
            return Err(Error::attach(
                format!("file {}", path.display()),
                io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
            ));
        }
        let source: Arc<dyn DataSource> = Arc::new(FileDataSource::new(path));
        self.attach_data_source(source, name, description, disposition)
    }

    /// Attaches the resource at `url`, fetching it once to check that it
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the URL cannot be parsed or fetched.
    pub fn attach_url(
        &mut self,
        url: &str,
        name: Option<&str>,
        description: Option<&str>,
        disposition: Disposition,
    ) -> Result<&mut Self> {
        let parsed = Url::parse(url).map_err(|e| Error::invalid_url(url, e))?;
        let source = UrlDataSource::new(parsed);
        source.probe().map_err(|e| Error::invalid_url(url, e))?;
        self.add_attachment(Arc::new(source), name, description, disposition);
        Ok(self)
    }

    /// Attaches a data source. The name defaults to the source's own name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Attach`] if the source cannot be opened.
    pub fn attach_data_source(
        &mut self,
        source: Arc<dyn DataSource>,
        name: Option<&str>,
        description: Option<&str>,
        disposition: Disposition,
    ) -> Result<&mut Self> {
        if let Err(e) = source.open() {
            let target = name
                .map(str::to_string)
                .or_else(|| source.name())
                .unwrap_or_else(|| "data source".into());
            return Err(Error::attach(target, e));
        }
        self.add_attachment(source, name, description, disposition);
        Ok(self)
    }

    fn add_attachment(
        &mut self,
        source: Arc<dyn DataSource>,
        name: Option<&str>,
        description: Option<&str>,
        disposition: Disposition,
    ) {
        let name = name
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or_else(|| source.name());

        let mut part = BodyPart::new();
        part.set_disposition(disposition);
        if let Some(name) = &name {
            part.set_file_name(name);
        }
        if let Some(description) = description {
            part.set_description(description);
        }
        part.set_data_source(source);

        let body = self.body.multipart_mut();
        body.push_part(part);
        body.has_attachments = true;
        tracing::debug!(name = name.as_deref().unwrap_or_default(), %disposition, "Attached part");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::MultiPartEmail;
    use courier_mime::BytesDataSource;

    fn email() -> MultiPartEmail {
        let mut email = MultiPartEmail::new();
        email
            .set_from("alice@example.com")
            .unwrap()
            .add_to("bob@example.com")
            .unwrap();
        email
    }

    #[test]
    fn test_init_twice() {
        let mut email = email();
        email.init().unwrap();
        assert!(matches!(email.init(), Err(Error::AlreadyInitialized)));
    }

    #[test]
    fn test_primary_part_stays_first() {
        let mut email = email();
        email.add_part("second", "text/plain").unwrap();
        email.set_msg("first").unwrap();
        email
            .add_multipart_at(Multipart::alternative(), 0)
            .unwrap();
        email.set_msg("first again").unwrap();

        let container = email.container();
        assert_eq!(container.len(), 3);
        assert!(container.parts()[0].multipart().is_some());
        assert!(container.parts()[1].content_type().starts_with("text/plain"));
    }

    #[test]
    fn test_attach_sets_flag() {
        let mut email = email();
        assert!(!email.has_attachments());
        let source = Arc::new(BytesDataSource::new(b"a,b".to_vec(), "text/csv").with_name("data.csv"));
        email
            .attach_data_source(source, None, Some("numbers"), Disposition::Attachment)
            .unwrap();
        assert!(email.has_attachments());

        let part = &email.container().parts()[0];
        assert_eq!(part.file_name(), Some("data.csv"));
        assert_eq!(part.description(), Some("numbers"));
        assert_eq!(part.disposition(), Some(Disposition::Attachment));
    }

    #[test]
    fn test_attach_missing_file() {
        let mut email = email();
        let err = email.attach_file("/definitely/not/here.pdf").unwrap_err();
        assert!(matches!(err, Error::Attach { .. }));
        assert!(!email.has_attachments());
    }

    #[test]
    fn test_attach_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut email = email();
        let err = email.attach_file(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Attach { .. }));
        assert!(!email.has_attachments());
        assert!(email.container().is_empty());
    }

    #[test]
    fn test_attach_file_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        std::fs::write(&path, "numbers").unwrap();

        let mut email = email();
        email.attach_file(&path).unwrap();
        let attachment = EmailAttachment::from_path(&path)
            .with_name("renamed.txt")
            .with_disposition(Disposition::Inline);
        email.attach(&attachment).unwrap();

        let parts = email.container().parts();
        assert_eq!(parts[0].file_name(), Some("report.txt"));
        assert_eq!(parts[1].file_name(), Some("renamed.txt"));
        assert_eq!(parts[1].disposition(), Some(Disposition::Inline));
    }

    #[test]
    fn test_attach_bad_url() {
        let mut email = email();
        assert!(matches!(
            email.attach_url("not a url", None, None, Disposition::Attachment),
            Err(Error::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_sub_type_applied_at_build() {
        let mut email = email();
        email.set_sub_type("related").set_msg("hi").unwrap();
        email.build().unwrap();
        let body = email.mime_message().unwrap().body();
        assert_eq!(body.multipart().unwrap().subtype(), "related");
    }
}
