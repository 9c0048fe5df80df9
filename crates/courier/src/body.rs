//! Body kinds and the build pipeline they plug into.
//!
//! [`Email::build`](crate::Email::build) runs an ordered list of named
//! stages over a shared [`BuildContext`]:
//!
//! 1. negotiate the content type,
//! 2. the stages contributed by the body kind (resolve embedded resources,
//!    assemble the multipart tree, apply the container subtype),
//! 3. place the content into the message,
//! 4. finalize the headers.

use crate::email::Email;
use crate::error::Result;
use courier_mime::{MimeMessage, Multipart};
use std::fmt;

/// State shared by the build stages.
#[derive(Debug, Default)]
pub struct BuildContext {
    /// Message under construction.
    pub message: MimeMessage,
    /// Working copy of the HTML body. Resource resolution rewrites this
    /// copy; the HTML set on the email is left untouched.
    pub html: Option<String>,
}

/// A named step of the build pipeline.
pub struct Stage<B> {
    /// Name used in logs.
    pub name: &'static str,
    /// Step implementation.
    pub run: fn(&mut Email<B>, &mut BuildContext) -> Result<()>,
}

impl<B> Stage<B> {
    /// Creates a stage.
    #[must_use]
    pub const fn new(name: &'static str, run: fn(&mut Email<B>, &mut BuildContext) -> Result<()>) -> Self {
        Self { name, run }
    }
}

impl<B> fmt::Debug for Stage<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage").field("name", &self.name).finish()
    }
}

/// The body-specific part of an email.
pub trait Body: Default + fmt::Debug + Sized {
    /// Stages run between content type negotiation and content placement.
    fn stages() -> Vec<Stage<Self>>;

    /// Applies non-empty message text in the way this body kind presents it.
    ///
    /// # Errors
    ///
    /// Returns an error if the text cannot be applied.
    fn set_msg(email: &mut Email<Self>, msg: &str) -> Result<()>;

    /// Hands over the assembled multipart container, if this body has one.
    fn take_container(&mut self) -> Option<Multipart> {
        None
    }
}

/// Single-part text body.
#[derive(Debug, Default)]
pub struct TextBody;

impl Body for TextBody {
    fn stages() -> Vec<Stage<Self>> {
        Vec::new()
    }

    fn set_msg(email: &mut Email<Self>, msg: &str) -> Result<()> {
        email.set_content(msg, crate::TEXT_PLAIN);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_debug_shows_name() {
        let stage: Stage<TextBody> = Stage::new("noop", |_, _| Ok(()));
        assert_eq!(format!("{stage:?}"), "Stage { name: \"noop\" }");
    }

    #[test]
    fn test_text_body_has_no_extra_stages() {
        assert!(TextBody::stages().is_empty());
    }
}
