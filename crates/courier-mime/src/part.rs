//! Body parts and multipart containers.

use crate::charset::Charset;
use crate::content_type::ContentType;
use crate::data_source::DataSource;
use crate::encoding::{encode_base64_lines, encode_quoted_printable, encode_text, fold};
use crate::error::{Error, Result};
use crate::header::Headers;
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Longest line allowed in a 7bit body (RFC 5322).
const MAX_7BIT_LINE: usize = 998;

/// Content-Disposition of a body part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Disposition {
    /// Rendered in place (e.g. an image referenced by `cid:`).
    Inline,
    /// Offered as a separate file.
    #[default]
    Attachment,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline => f.write_str("inline"),
            Self::Attachment => f.write_str("attachment"),
        }
    }
}

impl FromStr for Disposition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(Self::Inline),
            "attachment" => Ok(Self::Attachment),
            other => Err(Error::InvalidHeader(format!("Unknown disposition: {other}"))),
        }
    }
}

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Base64 encoding.
    Base64,
}

impl TransferEncoding {
    /// Picks the encoding for `data`.
    ///
    /// Short-lined ASCII goes out as 7bit. Text that is mostly ASCII uses
    /// quoted-printable, everything else base64.
    #[must_use]
    pub fn choose(data: &[u8], is_text: bool) -> Self {
        let non_ascii = data
            .iter()
            .filter(|b| !b.is_ascii() || **b == 0)
            .count();
        let long_lines = data
            .split(|b| *b == b'\n')
            .any(|line| line.len() > MAX_7BIT_LINE);

        if non_ascii == 0 && !long_lines && (is_text || !data.contains(&b'\r')) {
            Self::SevenBit
        } else if is_text && non_ascii * 3 < data.len() {
            Self::QuotedPrintable
        } else {
            Self::Base64
        }
    }

    fn encode(self, data: &[u8]) -> String {
        match self {
            Self::SevenBit => {
                let text = String::from_utf8_lossy(data);
                text.split('\n')
                    .map(|line| line.strip_suffix('\r').unwrap_or(line))
                    .collect::<Vec<_>>()
                    .join("\r\n")
            }
            Self::QuotedPrintable => encode_quoted_printable(data),
            Self::Base64 => encode_base64_lines(data).trim_end().to_string(),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Base64 => write!(f, "base64"),
        }
    }
}

/// Payload of a body part.
#[derive(Debug, Clone, Default)]
pub enum Content {
    /// Nothing set yet; renders as an empty text body.
    #[default]
    Empty,
    /// Raw bytes already in their final charset.
    Bytes(Vec<u8>),
    /// Content read from a data source when the part is written.
    Source(Arc<dyn DataSource>),
    /// A nested container.
    Multipart(Multipart),
}

/// MIME body part.
#[derive(Debug, Clone, Default)]
pub struct BodyPart {
    content_type: Option<String>,
    disposition: Option<Disposition>,
    file_name: Option<String>,
    description: Option<String>,
    content_id: Option<String>,
    /// Additional part headers.
    pub headers: Headers,
    content: Content,
}

impl BodyPart {
    /// Creates an empty part.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets text content as `text/<subtype>` in the given charset.
    ///
    /// Without a charset, US-ASCII is used for pure ASCII text and UTF-8
    /// otherwise.
    pub fn set_text(&mut self, text: &str, charset: Option<Charset>, subtype: &str) {
        let charset = charset.unwrap_or_else(|| Charset::default_for(text));
        self.content = Content::Bytes(charset.encode(text));
        self.content_type = Some(ContentType::text(subtype, charset.name()).to_string());
    }

    /// Sets text content with an explicit content type string.
    ///
    /// The type is recorded verbatim. A `charset` parameter on a text type
    /// decides the byte encoding; otherwise UTF-8 bytes are stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the content type does not parse or names an
    /// unsupported charset.
    pub fn set_text_content(&mut self, text: &str, content_type: &str) -> Result<()> {
        let parsed = ContentType::parse(content_type)?;
        let bytes = match parsed.charset() {
            Some(name) if parsed.is_text() => Charset::for_name(name)?.encode(text),
            _ => text.as_bytes().to_vec(),
        };
        self.content = Content::Bytes(bytes);
        self.content_type = Some(content_type.to_string());
        Ok(())
    }

    /// Sets raw bytes with an explicit content type string.
    ///
    /// # Errors
    ///
    /// Returns an error if the content type does not parse.
    pub fn set_bytes(&mut self, data: impl Into<Vec<u8>>, content_type: &str) -> Result<()> {
        ContentType::parse(content_type)?;
        self.content = Content::Bytes(data.into());
        self.content_type = Some(content_type.to_string());
        Ok(())
    }

    /// Uses a data source as content; its type becomes the part's type.
    pub fn set_data_source(&mut self, source: Arc<dyn DataSource>) {
        self.content_type = None;
        self.content = Content::Source(source);
    }

    /// Nests a container inside this part.
    pub fn set_multipart(&mut self, multipart: Multipart) {
        self.content_type = None;
        self.content = Content::Multipart(multipart);
    }

    /// Returns the payload.
    #[must_use]
    pub const fn content(&self) -> &Content {
        &self.content
    }

    /// Returns true if no content has been set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self.content, Content::Empty)
    }

    /// Returns the nested container, if any.
    #[must_use]
    pub const fn multipart(&self) -> Option<&Multipart> {
        match &self.content {
            Content::Multipart(multipart) => Some(multipart),
            _ => None,
        }
    }

    /// Returns the nested container mutably, if any.
    pub const fn multipart_mut(&mut self) -> Option<&mut Multipart> {
        match &mut self.content {
            Content::Multipart(multipart) => Some(multipart),
            _ => None,
        }
    }

    /// Returns the effective content type string.
    #[must_use]
    pub fn content_type(&self) -> String {
        if let Some(content_type) = &self.content_type {
            return content_type.clone();
        }
        match &self.content {
            Content::Multipart(multipart) => multipart.content_type().to_string(),
            Content::Source(source) => source.content_type(),
            Content::Empty | Content::Bytes(_) => "text/plain; charset=US-ASCII".to_string(),
        }
    }

    /// Sets the file name offered to the recipient.
    pub fn set_file_name(&mut self, name: impl Into<String>) {
        self.file_name = Some(name.into());
    }

    /// Returns the file name.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Sets the disposition.
    pub const fn set_disposition(&mut self, disposition: Disposition) {
        self.disposition = Some(disposition);
    }

    /// Returns the disposition.
    #[must_use]
    pub const fn disposition(&self) -> Option<Disposition> {
        self.disposition
    }

    /// Sets the description.
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Sets the Content-ID header value, including angle brackets.
    pub fn set_content_id(&mut self, content_id: impl Into<String>) {
        self.content_id = Some(content_id.into());
    }

    /// Returns the Content-ID header value.
    #[must_use]
    pub fn content_id(&self) -> Option<&str> {
        self.content_id.as_deref()
    }

    /// Loads the payload bytes (reading data sources) without encoding.
    fn payload(&self) -> Result<Vec<u8>> {
        match &self.content {
            Content::Empty | Content::Multipart(_) => Ok(Vec::new()),
            Content::Bytes(bytes) => Ok(bytes.clone()),
            Content::Source(source) => Ok(source.read_all()?),
        }
    }

    /// Builds the entity headers (Content-*), encoding for `payload`.
    fn entity_headers(&self, encoding: Option<TransferEncoding>) -> Result<Headers> {
        let mut headers = Headers::new();

        let mut content_type = self.content_type();
        if let Some(name) = &self.file_name {
            let mut parsed = ContentType::parse(&content_type)?;
            if parsed.parameter("name").is_none() {
                parsed.set_parameter("name", encode_text(name, Charset::Utf8));
                content_type = parsed.to_string();
            }
        }
        headers.add("Content-Type", fold("Content-Type: ".len(), &content_type));

        if let Some(encoding) = encoding {
            headers.add("Content-Transfer-Encoding", encoding.to_string());
        }

        if self.disposition.is_some() || self.file_name.is_some() {
            let disposition = self.disposition.unwrap_or_default();
            let value = match &self.file_name {
                Some(name) => {
                    let encoded = encode_text(name, Charset::Utf8)
                        .replace('\\', "\\\\")
                        .replace('"', "\\\"");
                    format!("{disposition}; filename=\"{encoded}\"")
                }
                None => disposition.to_string(),
            };
            headers.add(
                "Content-Disposition",
                fold("Content-Disposition: ".len(), &value),
            );
        }

        if let Some(description) = &self.description {
            let encoded = encode_text(description, Charset::Utf8);
            headers.add(
                "Content-Description",
                fold("Content-Description: ".len(), &encoded),
            );
        }

        if let Some(content_id) = &self.content_id {
            headers.add("Content-ID", content_id.clone());
        }

        for (name, value) in self.headers.iter() {
            headers.add(name, value);
        }

        Ok(headers)
    }

    /// Writes the entity headers, a blank line, and the encoded body.
    ///
    /// `extra` headers are written before the entity headers; this is how a
    /// message prepends its envelope headers.
    ///
    /// # Errors
    ///
    /// Returns an error if a data source cannot be read or writing fails.
    pub fn write_with_headers<W: Write>(&self, extra: &Headers, out: &mut W) -> Result<()> {
        if let Content::Multipart(multipart) = &self.content {
            let headers = self.entity_headers(None)?;
            write!(out, "{extra}{headers}\r\n")?;
            return multipart.write_body(out);
        }

        let payload = self.payload()?;
        let is_text = ContentType::parse(&self.content_type()).is_ok_and(|ct| ct.is_text());
        let encoding = TransferEncoding::choose(&payload, is_text);
        let headers = self.entity_headers(Some(encoding))?;
        write!(out, "{extra}{headers}\r\n{}", encoding.encode(&payload))?;
        Ok(())
    }

    /// Writes this part as a standalone entity.
    ///
    /// # Errors
    ///
    /// Returns an error if a data source cannot be read or writing fails.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        self.write_with_headers(&Headers::new(), out)
    }
}

static BOUNDARY_COUNTER: AtomicU64 = AtomicU64::new(0);

fn new_boundary() -> String {
    let part = BOUNDARY_COUNTER.fetch_add(1, Ordering::Relaxed);
    let salt: u32 = rand::random();
    let millis = chrono::Utc::now().timestamp_millis();
    format!("----=_Part_{part}_{salt}.{millis}")
}

/// Ordered sequence of body parts with a multipart subtype.
#[derive(Debug, Clone)]
pub struct Multipart {
    subtype: String,
    boundary: String,
    parts: Vec<BodyPart>,
}

impl Multipart {
    /// Creates an empty container with a fresh boundary.
    #[must_use]
    pub fn new(subtype: impl Into<String>) -> Self {
        Self {
            subtype: subtype.into(),
            boundary: new_boundary(),
            parts: Vec::new(),
        }
    }

    /// Creates a `multipart/mixed` container.
    #[must_use]
    pub fn mixed() -> Self {
        Self::new("mixed")
    }

    /// Creates a `multipart/alternative` container.
    #[must_use]
    pub fn alternative() -> Self {
        Self::new("alternative")
    }

    /// Creates a `multipart/related` container.
    #[must_use]
    pub fn related() -> Self {
        Self::new("related")
    }

    /// Returns the subtype.
    #[must_use]
    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    /// Changes the subtype.
    pub fn set_subtype(&mut self, subtype: impl Into<String>) {
        self.subtype = subtype.into();
    }

    /// Returns the boundary.
    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Returns the content type including the boundary parameter.
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        ContentType::multipart(self.subtype.clone(), self.boundary.clone())
    }

    /// Appends a part.
    pub fn add_part(&mut self, part: BodyPart) {
        self.parts.push(part);
    }

    /// Inserts a part at `index`, shifting later parts.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is past the end.
    pub fn insert_part(&mut self, index: usize, part: BodyPart) -> Result<()> {
        if index > self.parts.len() {
            return Err(Error::InvalidMultipart(format!(
                "index {index} out of range for {} parts",
                self.parts.len()
            )));
        }
        self.parts.insert(index, part);
        Ok(())
    }

    /// Returns the parts in order.
    #[must_use]
    pub fn parts(&self) -> &[BodyPart] {
        &self.parts
    }

    /// Returns a part by index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&BodyPart> {
        self.parts.get(index)
    }

    /// Returns a part mutably by index.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut BodyPart> {
        self.parts.get_mut(index)
    }

    /// Returns the number of parts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Returns true if the container holds no parts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Writes all parts separated by the boundary, then the close delimiter.
    ///
    /// # Errors
    ///
    /// Returns an error if the container is empty or a part cannot be
    /// written.
    pub fn write_body<W: Write>(&self, out: &mut W) -> Result<()> {
        if self.parts.is_empty() {
            return Err(Error::InvalidMultipart(format!(
                "multipart/{} has no parts",
                self.subtype
            )));
        }
        for part in &self.parts {
            write!(out, "--{}\r\n", self.boundary)?;
            part.write_to(out)?;
            out.write_all(b"\r\n")?;
        }
        write!(out, "--{}--\r\n", self.boundary)?;
        Ok(())
    }
}
