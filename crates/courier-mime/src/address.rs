//! Email address types.

use crate::charset::Charset;
use crate::encoding::encode_text;
use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Bare `local@domain` email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into().trim().to_string();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the part after the last `@`.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.rsplit_once('@').map_or("", |(_, domain)| domain)
    }

    /// Validates an email address (basic validation).
    fn validate(addr: &str) -> Result<()> {
        if addr.is_empty() {
            return Err(Error::InvalidAddress("Address cannot be empty".into()));
        }

        if addr.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(Error::InvalidAddress(format!(
                "Address contains whitespace or control characters: {addr}"
            )));
        }

        if addr.contains(['<', '>', ',', ';']) {
            return Err(Error::InvalidAddress(format!(
                "Address contains illegal characters: {addr}"
            )));
        }

        let Some((local, domain)) = addr.rsplit_once('@') else {
            return Err(Error::InvalidAddress(format!("Address must contain @: {addr}")));
        };

        if local.is_empty() || domain.is_empty() {
            return Err(Error::InvalidAddress(
                "Local and domain parts cannot be empty".into(),
            ));
        }

        if local.contains('@') && !(local.starts_with('"') && local.ends_with('"')) {
            return Err(Error::InvalidAddress(format!(
                "Address must have exactly one @: {addr}"
            )));
        }

        if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
            return Err(Error::InvalidAddress(format!("Invalid domain: {domain}")));
        }

        Ok(())
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mailbox (optional display name + address).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    /// Display name as given by the caller.
    pub personal: Option<String>,
    /// Display name as rendered in a header.
    encoded_personal: Option<String>,
    /// Email address.
    pub address: Address,
}

impl Mailbox {
    /// Creates a new mailbox with just an address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn new(address: impl Into<String>) -> Result<Self> {
        Ok(Self {
            personal: None,
            encoded_personal: None,
            address: Address::new(address)?,
        })
    }

    /// Creates a mailbox with a display name encoded in `charset`.
    ///
    /// An empty name yields a mailbox without display name. Names that are
    /// not printable ASCII are RFC 2047 encoded; UTF-8 is used when no
    /// charset is given.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn with_personal(
        address: impl Into<String>,
        name: &str,
        charset: Option<Charset>,
    ) -> Result<Self> {
        let mut mailbox = Self::new(address)?;
        if !name.is_empty() {
            mailbox.personal = Some(name.to_string());
            mailbox.encoded_personal = Some(encode_personal(name, charset.unwrap_or(Charset::Utf8)));
        }
        Ok(mailbox)
    }
}

/// Renders a display name as a phrase: plain atoms stay bare, specials are
/// quoted, anything else becomes encoded words.
fn encode_personal(name: &str, charset: Charset) -> String {
    let encoded = encode_text(name, charset);
    if encoded != name {
        return encoded;
    }
    if name.contains(|c: char| "()<>@,;:\\\".[]".contains(c)) {
        let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{escaped}\"")
    } else {
        name.to_string()
    }
}

impl FromStr for Mailbox {
    type Err = Error;

    /// Parses `addr` or `Name <addr>`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match (s.rfind('<'), s.ends_with('>')) {
            (Some(open), true) => {
                let name = s[..open].trim().trim_matches('"');
                Self::with_personal(&s[open + 1..s.len() - 1], name, None)
            }
            _ => Self::new(s),
        }
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.encoded_personal {
            Some(name) => write!(f, "{name} <{}>", self.address),
            None => write!(f, "{}", self.address),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_address() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.as_str(), "user@example.com");
        assert_eq!(addr.domain(), "example.com");
    }

    #[test]
    fn test_invalid_address_no_at() {
        assert!(Address::new("userexample.com").is_err());
    }

    #[test]
    fn test_invalid_address_empty() {
        assert!(Address::new("").is_err());
    }

    #[test]
    fn test_invalid_address_empty_local() {
        assert!(Address::new("@example.com").is_err());
    }

    #[test]
    fn test_invalid_address_empty_domain() {
        assert!(Address::new("user@").is_err());
    }

    #[test]
    fn test_invalid_address_whitespace() {
        assert!(Address::new("us er@example.com").is_err());
        assert!(Address::new("user@exa..mple.com").is_err());
        assert!(Address::new("a@b@example.com").is_err());
    }

    #[test]
    fn test_mailbox_new() {
        let mailbox = Mailbox::new("user@example.com").unwrap();
        assert_eq!(mailbox.address.as_str(), "user@example.com");
        assert!(mailbox.personal.is_none());
        assert_eq!(mailbox.to_string(), "user@example.com");
    }

    #[test]
    fn test_mailbox_with_personal() {
        let mailbox = Mailbox::with_personal("john@example.com", "John Doe", None).unwrap();
        assert_eq!(mailbox.personal.as_deref(), Some("John Doe"));
        assert_eq!(mailbox.to_string(), "John Doe <john@example.com>");
    }

    #[test]
    fn test_mailbox_quotes_specials() {
        let mailbox = Mailbox::with_personal("john@example.com", "Doe, John", None).unwrap();
        assert_eq!(mailbox.to_string(), "\"Doe, John\" <john@example.com>");
    }

    #[test]
    fn test_mailbox_encodes_non_ascii_name() {
        let mailbox =
            Mailbox::with_personal("jo@example.com", "J\u{f6}rg", Some(Charset::Iso8859_1)).unwrap();
        assert_eq!(mailbox.to_string(), "=?ISO-8859-1?Q?J=F6rg?= <jo@example.com>");
    }

    #[test]
    fn test_mailbox_parse() {
        let mailbox: Mailbox = "\"Jane Roe\" <jane@example.com>".parse().unwrap();
        assert_eq!(mailbox.personal.as_deref(), Some("Jane Roe"));
        assert_eq!(mailbox.address.as_str(), "jane@example.com");

        let bare: Mailbox = "jane@example.com".parse().unwrap();
        assert!(bare.personal.is_none());
    }
}
