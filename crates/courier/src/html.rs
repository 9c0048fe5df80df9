//! HTML bodies with a plain-text alternative and inline resources.

use crate::body::{Body, BuildContext, Stage};
use crate::cid;
use crate::email::Email;
use crate::error::{Error, Result};
use crate::multipart::{AsMultipart, MultipartBody, apply_sub_type};
use crate::url_source::UrlDataSource;
use courier_mime::encoding::encode_url;
use courier_mime::{
    BodyPart, Charset, DataSource, Disposition, FileDataSource, Multipart,
    ResourceIdentity, same_resource,
};
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use url::Url;

/// A resource embedded in the HTML body and referenced as `cid:<cid>`.
#[derive(Clone)]
pub struct InlineResource {
    cid: String,
    source: Arc<dyn DataSource>,
    part: BodyPart,
}

impl InlineResource {
    /// Content-ID, without angle brackets.
    #[must_use]
    pub fn cid(&self) -> &str {
        &self.cid
    }

    /// Where the bytes come from.
    #[must_use]
    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    /// The inline body part.
    #[must_use]
    pub const fn part(&self) -> &BodyPart {
        &self.part
    }
}

impl fmt::Debug for InlineResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineResource")
            .field("cid", &self.cid)
            .field("source", &describe(self.source.as_ref()))
            .finish_non_exhaustive()
    }
}

/// Inline resources keyed by name, in embedding order.
///
/// A name is bound once. Embedding the same resource under the same name
/// again returns the existing Content-ID; any other resource under that
/// name is rejected.
#[derive(Debug, Clone, Default)]
pub struct InlineRegistry {
    entries: Vec<(String, InlineResource)>,
}

impl InlineRegistry {
    /// Looks up a resource by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&InlineResource> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, resource)| resource)
    }

    /// Number of embedded resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is embedded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(name, resource)` in embedding order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &InlineResource)> {
        self.entries.iter().map(|(name, resource)| (name.as_str(), resource))
    }

    fn existing_cid(&self, name: &str, identity: &ResourceIdentity) -> Result<Option<String>> {
        let Some(existing) = self.get(name) else {
            return Ok(None);
        };
        if identity != &ResourceIdentity::Opaque && existing.source.identity() == *identity {
            return Ok(Some(existing.cid.clone()));
        }
        Err(Error::NameAlreadyBound {
            name: name.to_string(),
            existing: describe(existing.source.as_ref()),
        })
    }

    fn bind(&mut self, name: &str, source: Arc<dyn DataSource>, cid: &str) -> Result<String> {
        if name.is_empty() {
            return Err(Error::EmptyName);
        }
        if let Some(existing) = self.get(name) {
            if same_resource(&existing.source, &source) {
                tracing::debug!(name, cid = %existing.cid, "Reusing embedded resource");
                return Ok(existing.cid.clone());
            }
            return Err(Error::NameAlreadyBound {
                name: name.to_string(),
                existing: describe(existing.source.as_ref()),
            });
        }

        let cid = encode_url(cid);
        let mut part = BodyPart::new();
        part.set_data_source(Arc::clone(&source));
        part.set_file_name(name);
        part.set_disposition(Disposition::Inline);
        part.set_content_id(format!("<{cid}>"));

        tracing::debug!(name, cid = %cid, "Embedded resource");
        self.entries.push((
            name.to_string(),
            InlineResource {
                cid: cid.clone(),
                source,
                part,
            },
        ));
        Ok(cid)
    }

    fn parts(&self) -> impl Iterator<Item = BodyPart> + '_ {
        self.entries.iter().map(|(_, resource)| resource.part.clone())
    }
}

fn describe(source: &dyn DataSource) -> String {
    match source.identity() {
        ResourceIdentity::File(path) => format!("file {}", path.display()),
        ResourceIdentity::Url(url) => format!("URL {url}"),
        ResourceIdentity::Opaque => format!(
            "data source {}",
            source.name().unwrap_or_else(|| "<unnamed>".into())
        ),
    }
}

/// Layout of the assembled HTML body.
///
/// `mixed` is the container that attachments live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyShape {
    /// `mixed[related[alternative[text, html], inline...], ...]`
    RelatedAlternative,
    /// `mixed[related[html, inline...], ...]`
    Related,
    /// `mixed[alternative[text, html], ...]`
    NestedAlternative,
    /// `alternative[text, html]`
    Alternative,
    /// `mixed[html, ...]`
    Html,
    /// `mixed[text, ...]`
    Text,
    /// Nothing to assemble.
    Empty,
}

impl BodyShape {
    /// Picks the layout for the given body content.
    #[must_use]
    pub const fn decide(has_html: bool, has_inline: bool, has_text: bool, has_attachments: bool) -> Self {
        match (has_html, has_text) {
            (true, _) if has_inline && has_text => Self::RelatedAlternative,
            (true, _) if has_inline => Self::Related,
            (true, true) if has_attachments => Self::NestedAlternative,
            (true, true) => Self::Alternative,
            (true, false) => Self::Html,
            (false, true) => Self::Text,
            (false, false) => Self::Empty,
        }
    }
}

/// Body with HTML, an optional plain-text alternative and inline
/// resources, on top of the multipart container.
#[derive(Debug, Default)]
pub struct HtmlBody {
    multipart: MultipartBody,
    text: Option<String>,
    html: Option<String>,
    inline: InlineRegistry,
}

/// Access to the HTML state of a body kind.
pub trait AsHtml: AsMultipart {
    /// HTML state.
    fn html_body(&self) -> &HtmlBody;
    /// Mutable HTML state.
    fn html_body_mut(&mut self) -> &mut HtmlBody;
}

impl AsMultipart for HtmlBody {
    fn multipart(&self) -> &MultipartBody {
        &self.multipart
    }

    fn multipart_mut(&mut self) -> &mut MultipartBody {
        &mut self.multipart
    }
}

impl AsHtml for HtmlBody {
    fn html_body(&self) -> &HtmlBody {
        self
    }

    fn html_body_mut(&mut self) -> &mut HtmlBody {
        self
    }
}

impl Body for HtmlBody {
    fn stages() -> Vec<Stage<Self>> {
        vec![
            Stage::new("assemble html body", assemble::<Self>),
            Stage::new("apply multipart subtype", apply_sub_type::<Self>),
        ]
    }

    fn set_msg(email: &mut Email<Self>, msg: &str) -> Result<()> {
        set_text_and_html(email, msg)
    }

    fn take_container(&mut self) -> Option<Multipart> {
        self.multipart.take_multipart()
    }
}

/// Uses `msg` as the text part and as preformatted HTML.
pub(crate) fn set_text_and_html<B: AsHtml>(email: &mut Email<B>, msg: &str) -> Result<()> {
    email.set_text_msg(msg)?;
    email.set_html_msg(&format!("<html><body><pre>{}</pre></body></html>", escape_html(msg)))?;
    Ok(())
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

impl<B: AsHtml> Email<B> {
    /// Sets the plain-text alternative.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMessage`] for empty text.
    pub fn set_text_msg(&mut self, text: &str) -> Result<&mut Self> {
        if text.is_empty() {
            return Err(Error::InvalidMessage);
        }
        self.body.html_body_mut().text = Some(text.to_string());
        Ok(self)
    }

    /// Returns the plain-text alternative.
    #[must_use]
    pub fn text_msg(&self) -> Option<&str> {
        self.body.html_body().text.as_deref()
    }

    /// Sets the HTML body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMessage`] for empty HTML.
    pub fn set_html_msg(&mut self, html: &str) -> Result<&mut Self> {
        if html.is_empty() {
            return Err(Error::InvalidMessage);
        }
        self.body.html_body_mut().html = Some(html.to_string());
        Ok(self)
    }

    /// Returns the HTML body as set.
    #[must_use]
    pub fn html_msg(&self) -> Option<&str> {
        self.body.html_body().html.as_deref()
    }

    /// Returns the embedded resources.
    #[must_use]
    pub fn inline_resources(&self) -> &InlineRegistry {
        &self.body.html_body().inline
    }

    /// Embeds the resource at `url` under `name` and returns its Content-ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyName`], [`Error::NameAlreadyBound`] when `name`
    /// holds a different resource, or [`Error::InvalidUrl`] if the URL
    /// cannot be fetched.
    pub fn embed_url(&mut self, url: &str, name: &str) -> Result<String> {
        if name.is_empty() {
            return Err(Error::EmptyName);
        }
        let parsed = Url::parse(url).map_err(|e| Error::invalid_url(url, e))?;
        let identity = ResourceIdentity::Url(parsed.to_string());
        if let Some(cid) = self.inline_resources().existing_cid(name, &identity)? {
            return Ok(cid);
        }

        let source = UrlDataSource::new(parsed);
        source.probe().map_err(|e| Error::invalid_url(url, e))?;
        self.embed_data_source(Arc::new(source), name)
    }

    /// Embeds a file under its file name and returns its Content-ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmbedFile`] if the file is missing, not a regular
    /// file or unreadable, or [`Error::NameAlreadyBound`] when a different
    /// file with the same name is embedded.
    pub fn embed_file(&mut self, path: impl AsRef<Path>) -> Result<String> {
        self.embed_file_with_cid(path, &cid::generate())
    }

    /// Embeds a file with a caller-chosen Content-ID.
    ///
    /// # Errors
    ///
    /// Same as [`embed_file`](Self::embed_file).
    pub fn embed_file_with_cid(&mut self, path: impl AsRef<Path>, cid: &str) -> Result<String> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::EmbedFile(format!("file {} has no file name", path.display())))?;

        let source = FileDataSource::new(path);
        let canonical = source.canonical_path();
        let identity = ResourceIdentity::File(canonical.clone());
        if let Some(cid) = self.inline_resources().existing_cid(&name, &identity)? {
            return Ok(cid);
        }

        if !path.exists() {
            return Err(Error::EmbedFile(format!("file {} doesn't exist", canonical.display())));
        }
        if !path.is_file() {
            return Err(Error::EmbedFile(format!("file {} isn't a normal file", canonical.display())));
        }
        if File::open(path).is_err() {
            return Err(Error::EmbedFile(format!("file {} isn't readable", canonical.display())));
        }

        self.body
            .html_body_mut()
            .inline
            .bind(&name, Arc::new(source), cid)
    }

    /// Embeds a data source under `name` and returns its Content-ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyName`] or [`Error::NameAlreadyBound`].
    pub fn embed_data_source(&mut self, source: Arc<dyn DataSource>, name: &str) -> Result<String> {
        self.embed_data_source_with_cid(source, name, &cid::generate())
    }

    /// Embeds a data source with a caller-chosen Content-ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyName`] or [`Error::NameAlreadyBound`].
    pub fn embed_data_source_with_cid(
        &mut self,
        source: Arc<dyn DataSource>,
        name: &str,
        cid: &str,
    ) -> Result<String> {
        self.body.html_body_mut().inline.bind(name, source, cid)
    }
}

fn html_part(html: &str, charset: Option<Charset>) -> BodyPart {
    let mut part = BodyPart::new();
    part.set_text(html, charset, "html");
    part
}

fn text_part(text: &str, charset: Option<Charset>) -> BodyPart {
    let mut part = BodyPart::new();
    part.set_text(text, charset, "plain");
    part
}

fn wrap(multipart: Multipart) -> BodyPart {
    let mut part = BodyPart::new();
    part.set_multipart(multipart);
    part
}

pub(crate) fn assemble<B: AsHtml>(email: &mut Email<B>, ctx: &mut BuildContext) -> Result<()> {
    let charset = email.charset();
    let body = email.body.html_body_mut();
    let html = ctx
        .html
        .take()
        .or_else(|| body.html.clone())
        .filter(|h| !h.is_empty());
    let text = body.text.clone().filter(|t| !t.is_empty());
    let shape = BodyShape::decide(
        html.is_some(),
        !body.inline.is_empty(),
        text.is_some(),
        body.multipart.has_attachments(),
    );
    tracing::debug!(?shape, inline = body.inline.len(), "Assembling HTML body");

    let html = html.as_deref().map(|h| html_part(h, charset));
    let text = text.as_deref().map(|t| text_part(t, charset));
    let alternative = |text: BodyPart, html: BodyPart| {
        let mut alternative = Multipart::alternative();
        alternative.add_part(text);
        alternative.add_part(html);
        alternative
    };

    let container = &mut body.multipart;
    container.container().set_subtype("mixed");
    match (shape, text, html) {
        (BodyShape::RelatedAlternative, Some(text), Some(html)) => {
            let mut related = Multipart::related();
            related.add_part(wrap(alternative(text, html)));
            body.inline.parts().for_each(|part| related.add_part(part));
            container.insert_part(0, wrap(related))?;
        }
        (BodyShape::Related, _, Some(html)) => {
            let mut related = Multipart::related();
            related.add_part(html);
            body.inline.parts().for_each(|part| related.add_part(part));
            container.insert_part(0, wrap(related))?;
        }
        (BodyShape::NestedAlternative, Some(text), Some(html)) => {
            container.insert_part(0, wrap(alternative(text, html)))?;
        }
        (BodyShape::Alternative, Some(text), Some(html)) => {
            container.container().set_subtype("alternative");
            container.insert_part(0, html)?;
            container.insert_part(0, text)?;
        }
        (BodyShape::Html, _, Some(html)) => container.insert_part(0, html)?,
        (BodyShape::Text, Some(text), _) => container.insert_part(0, text)?,
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::HtmlEmail;
    use courier_mime::BytesDataSource;

    fn email() -> HtmlEmail {
        let mut email = HtmlEmail::new();
        email
            .set_from("alice@example.com")
            .unwrap()
            .add_to("bob@example.com")
            .unwrap();
        email
    }

    fn root(email: &HtmlEmail) -> &Multipart {
        email.mime_message().unwrap().body().multipart().unwrap()
    }

    #[test]
    fn test_html_part_is_text_html() {
        let part = html_part("<p>caf\u{e9}</p>", Some(Charset::for_name("ISO-8859-1").unwrap()));
        assert_eq!(part.content_type(), "text/html; charset=ISO-8859-1");
        let part = html_part("<p>hi</p>", None);
        assert!(part.content_type().starts_with("text/html; charset="));
    }

    #[test]
    fn test_shape_table() {
        assert_eq!(BodyShape::decide(true, true, true, false), BodyShape::RelatedAlternative);
        assert_eq!(BodyShape::decide(true, true, false, true), BodyShape::Related);
        assert_eq!(BodyShape::decide(true, false, true, true), BodyShape::NestedAlternative);
        assert_eq!(BodyShape::decide(true, false, true, false), BodyShape::Alternative);
        assert_eq!(BodyShape::decide(true, false, false, false), BodyShape::Html);
        assert_eq!(BodyShape::decide(false, true, true, false), BodyShape::Text);
        assert_eq!(BodyShape::decide(false, false, false, true), BodyShape::Empty);
    }

    #[test]
    fn test_text_and_html_collapse_to_alternative() {
        let mut email = email();
        email.set_text_msg("plain").unwrap().set_html_msg("<b>rich</b>").unwrap();
        email.build().unwrap();

        let root = root(&email);
        assert_eq!(root.subtype(), "alternative");
        assert_eq!(root.len(), 2);
        assert!(root.parts()[0].content_type().starts_with("text/plain"));
        assert!(root.parts()[1].content_type().starts_with("text/html"));
    }

    #[test]
    fn test_inline_resources_nest_under_related() {
        let mut email = email();
        let logo = Arc::new(BytesDataSource::new(b"png".to_vec(), "image/png").with_name("logo.png"));
        let cid = email.embed_data_source(logo, "logo.png").unwrap();
        email
            .set_html_msg(&format!("<img src=\"cid:{cid}\">"))
            .unwrap()
            .set_text_msg("logo")
            .unwrap();
        email.build().unwrap();

        let root = root(&email);
        assert_eq!(root.subtype(), "mixed");
        let related = root.parts()[0].multipart().unwrap();
        assert_eq!(related.subtype(), "related");
        assert_eq!(related.len(), 2);
        assert_eq!(related.parts()[0].multipart().unwrap().subtype(), "alternative");
        let inline = &related.parts()[1];
        assert_eq!(inline.content_id(), Some(format!("<{cid}>").as_str()));
        assert_eq!(inline.disposition(), Some(Disposition::Inline));
    }

    #[test]
    fn test_html_with_attachment_stays_mixed() {
        let mut email = email();
        let data = Arc::new(BytesDataSource::new(b"a,b".to_vec(), "text/csv"));
        email
            .attach_data_source(data, Some("data.csv"), None, Disposition::Attachment)
            .unwrap();
        email.set_html_msg("<p>see attached</p>").unwrap();
        email.build().unwrap();

        let root = root(&email);
        assert_eq!(root.subtype(), "mixed");
        assert_eq!(root.len(), 2);
        assert!(root.parts()[0].content_type().starts_with("text/html"));
        assert_eq!(root.parts()[1].file_name(), Some("data.csv"));
    }

    #[test]
    fn test_set_msg_escapes_markup() {
        let mut email = email();
        email.set_msg("1 < 2 & 3 > 2").unwrap();
        assert_eq!(email.text_msg(), Some("1 < 2 & 3 > 2"));
        assert_eq!(
            email.html_msg(),
            Some("<html><body><pre>1 &lt; 2 &amp; 3 &gt; 2</pre></body></html>")
        );
    }

    #[test]
    fn test_embed_same_file_twice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        std::fs::write(&path, b"png").unwrap();

        let mut email = email();
        let first = email.embed_file(&path).unwrap();
        let second = email.embed_file(&path).unwrap();
        assert_eq!(first, second);
        assert_eq!(email.inline_resources().len(), 1);
    }

    #[test]
    fn test_rebinding_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::create_dir(dir.path().join("b")).unwrap();
        std::fs::write(dir.path().join("a/logo.png"), b"a").unwrap();
        std::fs::write(dir.path().join("b/logo.png"), b"b").unwrap();

        let mut email = email();
        email.embed_file(dir.path().join("a/logo.png")).unwrap();
        let err = email.embed_file(dir.path().join("b/logo.png")).unwrap_err();
        assert!(matches!(err, Error::NameAlreadyBound { ref name, .. } if name == "logo.png"));

        // an explicit cid does not bypass the check
        let err = email
            .embed_file_with_cid(dir.path().join("b/logo.png"), "mine")
            .unwrap_err();
        assert!(matches!(err, Error::NameAlreadyBound { .. }));
    }

    #[test]
    fn test_embed_missing_file() {
        let mut email = email();
        let err = email.embed_file("/no/such/dir/logo.png").unwrap_err();
        assert!(matches!(err, Error::EmbedFile(ref msg) if msg.ends_with("doesn't exist")));
    }

    #[test]
    fn test_embed_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("pics")).unwrap();
        let mut email = email();
        let err = email.embed_file(dir.path().join("pics")).unwrap_err();
        assert!(matches!(err, Error::EmbedFile(ref msg) if msg.ends_with("isn't a normal file")));
    }

    #[test]
    fn test_explicit_cid_is_url_encoded() {
        let mut email = email();
        let source = Arc::new(BytesDataSource::new(b"x".to_vec(), "image/gif"));
        let cid = email
            .embed_data_source_with_cid(source, "dot.gif", "my dot")
            .unwrap();
        assert_eq!(cid, "my%20dot");
    }

    #[test]
    fn test_embed_url_empty_name() {
        let mut email = email();
        assert!(matches!(
            email.embed_url("http://example.com/a.png", ""),
            Err(Error::EmptyName)
        ));
    }

    #[test]
    fn test_embed_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        std::fs::write(&path, b"png").unwrap();
        let url = Url::from_file_path(&path).unwrap();

        let mut email = email();
        let first = email.embed_url(url.as_str(), "a").unwrap();
        assert_eq!(email.embed_url(url.as_str(), "a").unwrap(), first);
        assert!(matches!(
            email.embed_url("file:///elsewhere/a.png", "a"),
            Err(Error::NameAlreadyBound { .. })
        ));
    }
}
