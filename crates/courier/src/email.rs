//! The email builder shared by every body kind.

use crate::body::{Body, BuildContext, Stage};
use crate::content_type::negotiate;
use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, Local, TimeZone};
use courier_mime::encoding::{encode_text, fold};
use courier_mime::{Address, Charset, Headers, Mailbox, MimeMessage, Multipart};
use courier_smtp::{Credentials, Envelope, Security, Session, SessionConfig, Transport};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Domain used for generated Message-IDs when the sender has none.
const FALLBACK_DOMAIN: &str = "localhost";

/// An email under construction.
///
/// `B` decides how the body is put together; see the aliases
/// [`SimpleEmail`](crate::SimpleEmail), [`MultiPartEmail`](crate::MultiPartEmail),
/// [`HtmlEmail`](crate::HtmlEmail) and [`ImageHtmlEmail`](crate::ImageHtmlEmail).
///
/// An email is built at most once. After [`build`](Self::build) has been
/// called, successfully or not, further builds fail with
/// [`Error::AlreadyBuilt`].
pub struct Email<B> {
    from: Option<Mailbox>,
    to: Vec<Mailbox>,
    cc: Vec<Mailbox>,
    bcc: Vec<Mailbox>,
    reply_to: Vec<Mailbox>,
    headers: Headers,
    subject: Option<String>,
    sent_date: Option<DateTime<FixedOffset>>,
    charset: Option<Charset>,
    content: Option<String>,
    content_type: Option<String>,
    email_body: Option<Multipart>,
    session_config: SessionConfig,
    transport: Option<Arc<dyn Transport>>,
    built: bool,
    message: Option<MimeMessage>,
    pub(crate) body: B,
}

impl<B: fmt::Debug> fmt::Debug for Email<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Email")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("cc", &self.cc)
            .field("bcc", &self.bcc)
            .field("subject", &self.subject)
            .field("charset", &self.charset)
            .field("content_type", &self.content_type)
            .field("host", &self.session_config.host)
            .field("transport", &self.transport.as_ref().map(|t| t.describe()))
            .field("built", &self.built)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

impl<B: Body> Default for Email<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Body> Email<B> {
    /// Creates an empty email.
    #[must_use]
    pub fn new() -> Self {
        Self {
            from: None,
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            reply_to: Vec::new(),
            headers: Headers::new(),
            subject: None,
            sent_date: None,
            charset: None,
            content: None,
            content_type: None,
            email_body: None,
            session_config: SessionConfig::default(),
            transport: None,
            built: false,
            message: None,
            body: B::default(),
        }
    }

    // === Charset and content ===

    /// Sets the charset used for text content, display names, the subject
    /// and header values.
    ///
    /// Accepts `US-ASCII`, `ISO-8859-1`, `ISO-8859-15`, `windows-1252` and
    /// `UTF-8` under their common aliases.
    ///
    /// # Errors
    ///
    /// Returns an error if the charset is not supported.
    pub fn set_charset(&mut self, charset: &str) -> Result<&mut Self> {
        self.charset = Some(Charset::for_name(charset)?);
        Ok(self)
    }

    /// Returns the charset, if one was set or negotiated.
    #[must_use]
    pub const fn charset(&self) -> Option<Charset> {
        self.charset
    }

    /// Sets the body text and its content type.
    ///
    /// The content type is negotiated right away: an explicit charset
    /// parameter becomes the email charset, and a text type without one
    /// gets the email charset appended.
    pub fn set_content(&mut self, content: impl Into<String>, content_type: &str) -> &mut Self {
        self.content = Some(content.into());
        self.update_content_type(content_type);
        self
    }

    /// Uses `multipart` as the message body.
    pub fn set_content_multipart(&mut self, multipart: Multipart) -> &mut Self {
        self.email_body = Some(multipart);
        self
    }

    /// Returns the negotiated content type.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    fn update_content_type(&mut self, requested: &str) {
        let negotiated = negotiate(requested, self.charset.map(Charset::name));
        self.content_type = negotiated.content_type;
        if let Some(name) = negotiated.charset {
            match Charset::for_name(&name) {
                Ok(charset) => self.charset = Some(charset),
                Err(e) => tracing::warn!(charset = %name, error = %e, "Ignoring unsupported charset"),
            }
        }
    }

    /// Sets the message text in the way the body kind presents it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMessage`] for empty text.
    pub fn set_msg(&mut self, msg: &str) -> Result<&mut Self> {
        if msg.is_empty() {
            return Err(Error::InvalidMessage);
        }
        B::set_msg(self, msg)?;
        Ok(self)
    }

    // === Addresses ===

    fn mailbox(&self, email: &str, name: Option<&str>) -> Result<Mailbox> {
        Ok(Mailbox::with_personal(email, name.unwrap_or_default(), self.charset)?)
    }

    /// Sets the sender.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn set_from(&mut self, email: &str) -> Result<&mut Self> {
        self.from = Some(self.mailbox(email, None)?);
        Ok(self)
    }

    /// Sets the sender with a display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn set_from_with_name(&mut self, email: &str, name: &str) -> Result<&mut Self> {
        self.from = Some(self.mailbox(email, Some(name))?);
        Ok(self)
    }

    /// Returns the sender.
    #[must_use]
    pub const fn from_address(&self) -> Option<&Mailbox> {
        self.from.as_ref()
    }

    /// Adds a To recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn add_to(&mut self, email: &str) -> Result<&mut Self> {
        let mailbox = self.mailbox(email, None)?;
        self.to.push(mailbox);
        Ok(self)
    }

    /// Adds a To recipient with a display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn add_to_with_name(&mut self, email: &str, name: &str) -> Result<&mut Self> {
        let mailbox = self.mailbox(email, Some(name))?;
        self.to.push(mailbox);
        Ok(self)
    }

    /// Replaces the To recipients.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddressList`] if `mailboxes` is empty.
    pub fn set_to(&mut self, mailboxes: Vec<Mailbox>) -> Result<&mut Self> {
        self.to = non_empty(mailboxes)?;
        Ok(self)
    }

    /// Returns the To recipients.
    #[must_use]
    pub fn to_addresses(&self) -> &[Mailbox] {
        &self.to
    }

    /// Adds a Cc recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn add_cc(&mut self, email: &str) -> Result<&mut Self> {
        let mailbox = self.mailbox(email, None)?;
        self.cc.push(mailbox);
        Ok(self)
    }

    /// Adds a Cc recipient with a display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn add_cc_with_name(&mut self, email: &str, name: &str) -> Result<&mut Self> {
        let mailbox = self.mailbox(email, Some(name))?;
        self.cc.push(mailbox);
        Ok(self)
    }

    /// Replaces the Cc recipients.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddressList`] if `mailboxes` is empty.
    pub fn set_cc(&mut self, mailboxes: Vec<Mailbox>) -> Result<&mut Self> {
        self.cc = non_empty(mailboxes)?;
        Ok(self)
    }

    /// Returns the Cc recipients.
    #[must_use]
    pub fn cc_addresses(&self) -> &[Mailbox] {
        &self.cc
    }

    /// Adds a Bcc recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn add_bcc(&mut self, email: &str) -> Result<&mut Self> {
        let mailbox = self.mailbox(email, None)?;
        self.bcc.push(mailbox);
        Ok(self)
    }

    /// Adds a Bcc recipient with a display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn add_bcc_with_name(&mut self, email: &str, name: &str) -> Result<&mut Self> {
        let mailbox = self.mailbox(email, Some(name))?;
        self.bcc.push(mailbox);
        Ok(self)
    }

    /// Replaces the Bcc recipients.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddressList`] if `mailboxes` is empty.
    pub fn set_bcc(&mut self, mailboxes: Vec<Mailbox>) -> Result<&mut Self> {
        self.bcc = non_empty(mailboxes)?;
        Ok(self)
    }

    /// Returns the Bcc recipients.
    #[must_use]
    pub fn bcc_addresses(&self) -> &[Mailbox] {
        &self.bcc
    }

    /// Adds a Reply-To address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn add_reply_to(&mut self, email: &str) -> Result<&mut Self> {
        let mailbox = self.mailbox(email, None)?;
        self.reply_to.push(mailbox);
        Ok(self)
    }

    /// Adds a Reply-To address with a display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn add_reply_to_with_name(&mut self, email: &str, name: &str) -> Result<&mut Self> {
        let mailbox = self.mailbox(email, Some(name))?;
        self.reply_to.push(mailbox);
        Ok(self)
    }

    /// Replaces the Reply-To addresses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddressList`] if `mailboxes` is empty.
    pub fn set_reply_to(&mut self, mailboxes: Vec<Mailbox>) -> Result<&mut Self> {
        self.reply_to = non_empty(mailboxes)?;
        Ok(self)
    }

    /// Returns the Reply-To addresses.
    #[must_use]
    pub fn reply_to_addresses(&self) -> &[Mailbox] {
        &self.reply_to
    }

    // === Headers, subject, date ===

    /// Sets a custom header, replacing an earlier value of the same name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyHeaderName`] or [`Error::EmptyHeaderValue`].
    pub fn add_header(&mut self, name: &str, value: &str) -> Result<&mut Self> {
        if name.is_empty() {
            return Err(Error::EmptyHeaderName);
        }
        if value.is_empty() {
            return Err(Error::EmptyHeaderValue);
        }
        self.headers.set(name, value);
        Ok(self)
    }

    /// Replaces all custom headers.
    ///
    /// # Errors
    ///
    /// Returns an error if any name or value is empty.
    pub fn set_headers<I, K, V>(&mut self, headers: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.headers = Headers::new();
        for (name, value) in headers {
            self.add_header(name.as_ref(), value.as_ref())?;
        }
        Ok(self)
    }

    /// Returns a custom header value.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Returns the custom headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Sets the subject. Control characters are replaced with spaces.
    pub fn set_subject(&mut self, subject: &str) -> &mut Self {
        let cleaned = subject
            .chars()
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect();
        self.subject = Some(cleaned);
        self
    }

    /// Returns the subject.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Sets the sent date; the current time is used otherwise.
    pub fn set_sent_date<Tz: TimeZone>(&mut self, date: &DateTime<Tz>) -> &mut Self {
        self.sent_date = Some(date.fixed_offset());
        self
    }

    /// Returns the sent date, or now if none was set.
    #[must_use]
    pub fn sent_date(&self) -> DateTime<FixedOffset> {
        self.sent_date
            .unwrap_or_else(|| Local::now().fixed_offset())
    }

    // === Session ===

    fn check_session_not_initialized(&self) -> Result<()> {
        if self.transport.is_some() {
            return Err(Error::SessionInitialized);
        }
        Ok(())
    }

    /// Sets the SMTP host.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionInitialized`] once a session exists.
    pub fn set_host_name(&mut self, host: &str) -> Result<&mut Self> {
        self.check_session_not_initialized()?;
        self.session_config.host = host.to_string();
        Ok(self)
    }

    /// Returns the SMTP host.
    #[must_use]
    pub fn host_name(&self) -> Option<&str> {
        Some(self.session_config.host.as_str()).filter(|h| !h.is_empty())
    }

    /// Sets the port for plain and STARTTLS connections.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPort`] for port 0 and
    /// [`Error::SessionInitialized`] once a session exists.
    pub fn set_smtp_port(&mut self, port: u16) -> Result<&mut Self> {
        self.check_session_not_initialized()?;
        if port == 0 {
            return Err(Error::InvalidPort(port));
        }
        self.session_config.smtp_port = port;
        Ok(self)
    }

    /// Returns the port for plain and STARTTLS connections.
    #[must_use]
    pub const fn smtp_port(&self) -> u16 {
        self.session_config.smtp_port
    }

    /// Sets the port for implicit TLS connections.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPort`] for port 0 and
    /// [`Error::SessionInitialized`] once a session exists.
    pub fn set_ssl_smtp_port(&mut self, port: u16) -> Result<&mut Self> {
        self.check_session_not_initialized()?;
        if port == 0 {
            return Err(Error::InvalidPort(port));
        }
        self.session_config.ssl_smtp_port = port;
        Ok(self)
    }

    /// Returns the port for implicit TLS connections.
    #[must_use]
    pub const fn ssl_smtp_port(&self) -> u16 {
        self.session_config.ssl_smtp_port
    }

    /// Sets SMTP AUTH credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionInitialized`] once a session exists.
    pub fn set_authentication(&mut self, username: &str, password: &str) -> Result<&mut Self> {
        self.check_session_not_initialized()?;
        self.session_config.credentials = Some(Credentials::new(username, password));
        Ok(self)
    }

    /// Sets the security mode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionInitialized`] once a session exists.
    pub fn set_security(&mut self, security: Security) -> Result<&mut Self> {
        self.check_session_not_initialized()?;
        self.session_config.security = security;
        Ok(self)
    }

    /// Returns the security mode.
    #[must_use]
    pub const fn security(&self) -> Security {
        self.session_config.security
    }

    /// Requires STARTTLS instead of falling back to clear text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionInitialized`] once a session exists.
    pub fn set_start_tls_required(&mut self, required: bool) -> Result<&mut Self> {
        self.check_session_not_initialized()?;
        self.session_config.start_tls_required = required;
        Ok(self)
    }

    /// Enables or disables server certificate checks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionInitialized`] once a session exists.
    pub fn set_check_server_identity(&mut self, check: bool) -> Result<&mut Self> {
        self.check_session_not_initialized()?;
        self.session_config.check_server_identity = check;
        Ok(self)
    }

    /// Sets the socket I/O timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionInitialized`] once a session exists.
    pub fn set_socket_timeout(&mut self, timeout: Duration) -> Result<&mut Self> {
        self.check_session_not_initialized()?;
        self.session_config.socket_timeout = millis(timeout);
        Ok(self)
    }

    /// Sets the connection timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionInitialized`] once a session exists.
    pub fn set_connection_timeout(&mut self, timeout: Duration) -> Result<&mut Self> {
        self.check_session_not_initialized()?;
        self.session_config.connection_timeout = millis(timeout);
        Ok(self)
    }

    /// Sets the envelope sender that bounces go to. An empty string clears it.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid address, or
    /// [`Error::SessionInitialized`] once a session exists.
    pub fn set_bounce_address(&mut self, email: &str) -> Result<&mut Self> {
        self.check_session_not_initialized()?;
        self.session_config.bounce_address = if email.is_empty() {
            None
        } else {
            Some(Address::new(email)?.to_string())
        };
        Ok(self)
    }

    /// Returns the bounce address.
    #[must_use]
    pub fn bounce_address(&self) -> Option<&str> {
        self.session_config.bounce_address.as_deref()
    }

    /// Returns the session settings.
    #[must_use]
    pub const fn session_config(&self) -> &SessionConfig {
        &self.session_config
    }

    /// Replaces all session settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionInitialized`] once a session exists.
    pub fn set_session_config(&mut self, config: SessionConfig) -> Result<&mut Self> {
        self.check_session_not_initialized()?;
        self.session_config = config;
        Ok(self)
    }

    /// Uses an existing session; its settings replace the email's.
    pub fn set_mail_session(&mut self, session: Arc<Session>) -> &mut Self {
        self.session_config = session.config().clone();
        self.transport = Some(session);
        self
    }

    /// Sends through `transport` instead of an SMTP session.
    pub fn set_transport(&mut self, transport: Arc<dyn Transport>) -> &mut Self {
        self.transport = Some(transport);
        self
    }

    /// Returns the transport, creating an SMTP session from the settings
    /// on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingHostName`] if no host is configured.
    pub fn mail_session(&mut self) -> Result<Arc<dyn Transport>> {
        if let Some(transport) = &self.transport {
            return Ok(Arc::clone(transport));
        }
        let session = Session::new(self.session_config.clone()).map_err(|e| match e {
            courier_smtp::Error::MissingHostName => Error::MissingHostName,
            source => Error::Send {
                server: self.session_config.host.clone(),
                source,
            },
        })?;
        tracing::debug!(
            host = %self.session_config.host,
            port = self.session_config.port(),
            security = self.session_config.security.display_name(),
            "Created mail session"
        );
        let transport: Arc<dyn Transport> = Arc::new(session);
        self.transport = Some(Arc::clone(&transport));
        Ok(transport)
    }

    // === Build and send ===

    fn pipeline() -> Vec<Stage<B>> {
        let mut stages = vec![Stage::new("negotiate content type", negotiate_content_type::<B>)];
        stages.extend(B::stages());
        stages.push(Stage::new("place content", place_content::<B>));
        stages.push(Stage::new("finalize headers", finalize_headers::<B>));
        stages
    }

    /// Builds the MIME message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyBuilt`] on a second call, [`Error::MissingFrom`]
    /// or [`Error::NoRecipients`] for incomplete addressing, or any error
    /// from assembling the body.
    pub fn build(&mut self) -> Result<()> {
        if self.built {
            return Err(Error::AlreadyBuilt);
        }
        self.built = true;

        let mut ctx = BuildContext::default();
        for stage in Self::pipeline() {
            tracing::trace!(stage = stage.name, "Running build stage");
            (stage.run)(self, &mut ctx)?;
        }
        tracing::debug!(
            message_id = ctx.message.message_id().unwrap_or_default(),
            "Built message"
        );
        self.message = Some(ctx.message);
        Ok(())
    }

    /// Returns true once [`build`](Self::build) has been called.
    #[must_use]
    pub const fn is_built(&self) -> bool {
        self.built
    }

    /// Returns the built message.
    #[must_use]
    pub const fn mime_message(&self) -> Option<&MimeMessage> {
        self.message.as_ref()
    }

    /// Builds the message and sends it through the mail session.
    ///
    /// Returns the Message-ID.
    ///
    /// # Errors
    ///
    /// Returns build errors, [`Error::MissingHostName`] without a host, or
    /// [`Error::Send`] when delivery fails.
    pub fn send(&mut self) -> Result<String> {
        self.build()?;
        self.send_mime_message()
    }

    /// Sends the already built message through the mail session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotBuilt`] before [`build`](Self::build), or
    /// session and delivery errors.
    pub fn send_mime_message(&mut self) -> Result<String> {
        if self.message.is_none() {
            return Err(Error::NotBuilt);
        }
        let transport = self.mail_session()?;
        self.deliver(transport.as_ref())
    }

    /// Builds the message and sends it through `transport`.
    ///
    /// # Errors
    ///
    /// Returns build errors or [`Error::Send`] when delivery fails.
    pub fn send_with(&mut self, transport: &dyn Transport) -> Result<String> {
        self.build()?;
        self.deliver(transport)
    }

    fn deliver(&self, transport: &dyn Transport) -> Result<String> {
        let message = self.message.as_ref().ok_or(Error::NotBuilt)?;
        let envelope = self.envelope()?;
        let raw = message.to_bytes()?;
        let message_id = message.message_id().unwrap_or_default().to_string();

        transport
            .send(&envelope, &raw)
            .map_err(|source| Error::Send {
                server: transport.describe(),
                source,
            })?;

        tracing::info!(
            message_id = %message_id,
            server = %transport.describe(),
            recipients = envelope.recipients().len(),
            "Email sent"
        );
        Ok(message_id)
    }

    fn envelope(&self) -> Result<Envelope> {
        let from = if let Some(bounce) = &self.session_config.bounce_address {
            Address::new(bounce.as_str())?
        } else if let Some(from) = &self.from {
            from.address.clone()
        } else if let Some(mailbox) = self.session_from()? {
            mailbox.address
        } else {
            return Err(Error::MissingFrom);
        };

        let recipients = self
            .to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .map(|m| m.address.clone())
            .collect();
        Envelope::new(from, recipients).map_err(|_| Error::NoRecipients)
    }

    fn session_from(&self) -> Result<Option<Mailbox>> {
        match self.session_config.from.as_deref() {
            Some(from) if !from.is_empty() => Ok(Some(from.parse()?)),
            _ => Ok(None),
        }
    }
}

fn non_empty(mailboxes: Vec<Mailbox>) -> Result<Vec<Mailbox>> {
    if mailboxes.is_empty() {
        return Err(Error::InvalidAddressList);
    }
    Ok(mailboxes)
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn address_list(mailboxes: &[Mailbox]) -> String {
    mailboxes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn negotiate_content_type<B: Body>(email: &mut Email<B>, _ctx: &mut BuildContext) -> Result<()> {
    if let Some(requested) = email.content_type.clone() {
        email.update_content_type(&requested);
    }
    Ok(())
}

fn place_content<B: Body>(email: &mut Email<B>, ctx: &mut BuildContext) -> Result<()> {
    let body = ctx.message.body_mut();
    if let Some(content) = email.content.take() {
        match email.content_type.as_deref() {
            Some(ct) if !ct.eq_ignore_ascii_case(crate::TEXT_PLAIN) => body.set_text_content(&content, ct)?,
            _ => body.set_text(&content, email.charset, "plain"),
        }
    } else if let Some(multipart) = email.email_body.take().or_else(|| email.body.take_container()) {
        body.set_multipart(multipart);
    } else {
        body.set_text("", email.charset, "plain");
    }
    Ok(())
}

fn finalize_headers<B: Body>(email: &mut Email<B>, ctx: &mut BuildContext) -> Result<()> {
    let message = &mut ctx.message;
    message.set_sent_date(&email.sent_date());

    let from = match &email.from {
        Some(from) => from.clone(),
        None => email.session_from()?.ok_or(Error::MissingFrom)?,
    };
    if email.to.is_empty() && email.cc.is_empty() && email.bcc.is_empty() {
        return Err(Error::NoRecipients);
    }

    let headers = &mut message.headers;
    headers.set("From", fold(6, &from.to_string()));
    for (name, list) in [
        ("Reply-To", &email.reply_to),
        ("To", &email.to),
        ("Cc", &email.cc),
        ("Bcc", &email.bcc),
    ] {
        if !list.is_empty() {
            headers.set(name, fold(name.len() + 2, &address_list(list)));
        }
    }

    let domain = match from.address.domain() {
        "" => FALLBACK_DOMAIN,
        domain => domain,
    };
    message.ensure_message_id(domain);

    let charset = email.charset.unwrap_or(Charset::Utf8);
    if let Some(subject) = email.subject.as_deref().filter(|s| !s.is_empty()) {
        message.headers.set("Subject", fold(9, &encode_text(subject, charset)));
    }
    for (name, value) in email.headers.iter() {
        message
            .headers
            .set(name, fold(name.len() + 2, &encode_text(value, charset)));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::SimpleEmail;
    use courier_smtp::StubTransport;

    fn simple() -> SimpleEmail {
        let mut email = SimpleEmail::new();
        email
            .set_from("alice@example.com")
            .unwrap()
            .add_to("bob@example.com")
            .unwrap()
            .set_subject("Hello");
        email
    }

    #[test]
    fn test_build_once() {
        let mut email = simple();
        email.set_msg("Hi Bob").unwrap();
        email.build().unwrap();
        assert!(matches!(email.build(), Err(Error::AlreadyBuilt)));
    }

    #[test]
    fn test_failed_build_is_terminal() {
        let mut email = SimpleEmail::new();
        email.add_to("bob@example.com").unwrap();
        assert!(matches!(email.build(), Err(Error::MissingFrom)));
        email.set_from("alice@example.com").unwrap();
        assert!(matches!(email.build(), Err(Error::AlreadyBuilt)));
    }

    #[test]
    fn test_requires_recipient() {
        let mut email = SimpleEmail::new();
        email.set_from("alice@example.com").unwrap();
        assert!(matches!(email.build(), Err(Error::NoRecipients)));
    }

    #[test]
    fn test_session_from_fills_in_sender() {
        let mut email = SimpleEmail::new();
        let mut config = SessionConfig::new("smtp.example.com");
        config.from = Some("Robot <robot@example.com>".into());
        email.set_session_config(config).unwrap();
        email.add_to("bob@example.com").unwrap();
        email.build().unwrap();
        let message = email.mime_message().unwrap();
        assert_eq!(message.from(), Some("Robot <robot@example.com>"));
        assert!(message.message_id().unwrap().ends_with("@example.com>"));
    }

    #[test]
    fn test_empty_inputs_rejected() {
        let mut email = simple();
        assert!(matches!(email.set_msg(""), Err(Error::InvalidMessage)));
        assert!(matches!(email.add_header("", "v"), Err(Error::EmptyHeaderName)));
        assert!(matches!(email.add_header("X-A", ""), Err(Error::EmptyHeaderValue)));
        assert!(matches!(email.set_to(Vec::new()), Err(Error::InvalidAddressList)));
        assert!(matches!(email.set_smtp_port(0), Err(Error::InvalidPort(0))));
    }

    #[test]
    fn test_subject_control_chars_replaced() {
        let mut email = simple();
        email.set_subject("line\r\nbreak");
        assert_eq!(email.subject(), Some("line  break"));
    }

    #[test]
    fn test_windows_1252_subject() {
        let mut email = simple();
        email
            .set_charset("cp1252")
            .unwrap()
            .set_subject("\u{20ac}10 off")
            .set_msg("deal")
            .unwrap();
        email.build().unwrap();
        let subject = email.mime_message().unwrap().subject().unwrap().to_string();
        assert!(subject.starts_with("=?windows-1252?"));
        assert_eq!(
            courier_mime::encoding::decode_rfc2047(&subject).unwrap(),
            "\u{20ac}10 off"
        );
    }

    #[test]
    fn test_content_type_negotiation() {
        let mut email = simple();
        email.set_content("<p>x</p>", "text/html; charset=ISO-8859-1");
        assert_eq!(email.charset(), Some(Charset::Iso8859_1));
        assert_eq!(email.content_type(), Some("text/html; charset=ISO-8859-1"));

        let mut email = simple();
        email.set_charset("UTF-8").unwrap();
        email.set_content("x", "text/plain");
        assert_eq!(email.content_type(), Some("text/plain; charset=UTF-8"));
    }

    #[test]
    fn test_header_set_replaces_value() {
        let mut email = simple();
        email.set_charset("UTF-8").unwrap();
        email.add_header("X-Note", "caf\u{e9}").unwrap();
        email.add_header("X-Note", "plain").unwrap();
        email.set_msg("body").unwrap();
        email.build().unwrap();
        let message = email.mime_message().unwrap();
        assert_eq!(message.headers.get("X-Note"), Some("plain"));
        assert_eq!(message.headers.get_all("X-Note").len(), 1);
    }

    #[test]
    fn test_session_settings_locked_after_injection() {
        let mut email = simple();
        email.set_transport(Arc::new(StubTransport::new()));
        assert!(matches!(email.set_host_name("smtp.example.com"), Err(Error::SessionInitialized)));
        assert!(matches!(email.set_bounce_address("b@example.com"), Err(Error::SessionInitialized)));
    }

    #[test]
    fn test_mail_session_needs_host() {
        let mut email = simple();
        assert!(matches!(email.mail_session(), Err(Error::MissingHostName)));
    }

    #[test]
    fn test_send_mime_message_requires_build() {
        let mut email = simple();
        email.set_transport(Arc::new(StubTransport::new()));
        assert!(matches!(email.send_mime_message(), Err(Error::NotBuilt)));
    }

    #[test]
    fn test_send_with_uses_bounce_address() {
        let mut email = simple();
        email.set_bounce_address("bounces@example.com").unwrap();
        email.add_bcc("hidden@example.com").unwrap();
        email.set_msg("Hi").unwrap();

        let transport = StubTransport::new();
        let message_id = email.send_with(&transport).unwrap();

        let sent = transport.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].envelope.from().as_str(), "bounces@example.com");
        assert_eq!(sent[0].envelope.recipients().len(), 2);
        let text = sent[0].text();
        assert!(text.contains(&format!("Message-ID: {message_id}")));
        assert!(!text.contains("Bcc:"));
    }

    #[test]
    fn test_send_failure_names_server() {
        let mut email = simple();
        email.set_msg("Hi").unwrap();
        let transport = StubTransport::failing("mailbox unavailable");
        let err = email.send_with(&transport).unwrap_err();
        assert!(matches!(err, Error::Send { ref server, .. } if server == "stub"));
    }
}
