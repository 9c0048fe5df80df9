//! Character sets supported for text bodies and encoded headers.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A supported MIME charset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Charset {
    /// 7-bit ASCII.
    UsAscii,
    /// ISO Latin-1.
    Iso8859_1,
    /// ISO Latin-9, Latin-1 with the euro sign.
    Iso8859_15,
    /// Windows Western European code page.
    Windows1252,
    /// UTF-8.
    Utf8,
}

const US_ASCII_ALIASES: &[&str] = &[
    "us-ascii",
    "ascii",
    "us",
    "iso646-us",
    "ansi_x3.4-1968",
    "ansi_x3.4-1986",
    "cp367",
    "ibm367",
    "csascii",
    "646",
];

const ISO_8859_1_ALIASES: &[&str] = &[
    "iso-8859-1",
    "iso8859-1",
    "iso_8859-1",
    "iso_8859_1",
    "iso8859_1",
    "8859_1",
    "latin1",
    "l1",
    "cp819",
    "ibm819",
    "csisolatin1",
];

const ISO_8859_15_ALIASES: &[&str] = &[
    "iso-8859-15",
    "iso8859-15",
    "iso_8859-15",
    "iso8859_15",
    "latin-9",
    "latin9",
    "l9",
    "csiso885915",
];

const WINDOWS_1252_ALIASES: &[&str] = &["windows-1252", "cp1252", "x-cp1252", "cswindows1252"];

/// Bytes of ISO-8859-15 that differ from Latin-1.
const ISO_8859_15_DIFF: [(u8, char); 8] = [
    (0xA4, '\u{20AC}'),
    (0xA6, '\u{0160}'),
    (0xA8, '\u{0161}'),
    (0xB4, '\u{017D}'),
    (0xB8, '\u{017E}'),
    (0xBC, '\u{0152}'),
    (0xBD, '\u{0153}'),
    (0xBE, '\u{0178}'),
];

/// Windows-1252 bytes 0x80..=0x9F. Unassigned bytes map to the C1 control
/// of the same value.
const WINDOWS_1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
];

const UTF_8_ALIASES: &[&str] = &["utf-8", "utf8", "unicode-1-1-utf-8"];

impl Charset {
    /// Looks up a charset by its canonical name or one of its aliases.
    ///
    /// Supported: `US-ASCII`, `ISO-8859-1`, `ISO-8859-15`, `windows-1252`
    /// and `UTF-8`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedCharset`] for unknown names.
    pub fn for_name(name: &str) -> Result<Self> {
        let lower = name.trim().to_ascii_lowercase();
        let lower = lower.as_str();
        [
            (US_ASCII_ALIASES, Self::UsAscii),
            (ISO_8859_1_ALIASES, Self::Iso8859_1),
            (ISO_8859_15_ALIASES, Self::Iso8859_15),
            (WINDOWS_1252_ALIASES, Self::Windows1252),
            (UTF_8_ALIASES, Self::Utf8),
        ]
        .into_iter()
        .find_map(|(aliases, charset)| aliases.contains(&lower).then_some(charset))
        .ok_or_else(|| Error::UnsupportedCharset(name.to_string()))
    }

    /// Returns the canonical (IANA preferred) name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::UsAscii => "US-ASCII",
            Self::Iso8859_1 => "ISO-8859-1",
            Self::Iso8859_15 => "ISO-8859-15",
            Self::Windows1252 => "windows-1252",
            Self::Utf8 => "UTF-8",
        }
    }

    /// Returns true if every character of `text` is representable.
    #[must_use]
    pub fn can_encode(self, text: &str) -> bool {
        match self {
            Self::Utf8 => true,
            _ => text.chars().all(|c| self.encode_char(c).is_some()),
        }
    }

    /// Encodes `text` into bytes of this charset.
    ///
    /// Unmappable characters are replaced with `?`.
    #[must_use]
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Self::Utf8 => text.as_bytes().to_vec(),
            _ => text
                .chars()
                .map(|c| self.encode_char(c).unwrap_or(b'?'))
                .collect(),
        }
    }

    /// Decodes bytes of this charset.
    ///
    /// # Errors
    ///
    /// Returns an error if UTF-8 input is malformed.
    pub fn decode(self, bytes: Vec<u8>) -> Result<String> {
        match self {
            Self::Utf8 => Ok(String::from_utf8(bytes)?),
            _ => Ok(bytes.into_iter().map(|b| self.decode_byte(b)).collect()),
        }
    }

    /// Byte for `c` in a single-byte charset.
    fn encode_char(self, c: char) -> Option<u8> {
        let latin1 = u8::try_from(c).ok();
        match self {
            Self::UsAscii => latin1.filter(u8::is_ascii),
            Self::Iso8859_1 => latin1,
            Self::Iso8859_15 => ISO_8859_15_DIFF
                .iter()
                .find_map(|&(byte, mapped)| (mapped == c).then_some(byte))
                .or_else(|| latin1.filter(|b| !ISO_8859_15_DIFF.iter().any(|&(d, _)| d == *b))),
            Self::Windows1252 => match latin1 {
                Some(b @ 0x80..=0x9F) => (WINDOWS_1252_HIGH[usize::from(b - 0x80)] == c).then_some(b),
                Some(b) => Some(b),
                None => WINDOWS_1252_HIGH
                    .iter()
                    .position(|&mapped| mapped == c)
                    .and_then(|i| u8::try_from(i).ok())
                    .map(|i| 0x80 + i),
            },
            Self::Utf8 => None,
        }
    }

    /// Character for `byte` in a single-byte charset.
    fn decode_byte(self, byte: u8) -> char {
        match self {
            Self::Iso8859_15 => ISO_8859_15_DIFF
                .iter()
                .find_map(|&(b, mapped)| (b == byte).then_some(mapped))
                .unwrap_or_else(|| char::from(byte)),
            Self::Windows1252 if (0x80..=0x9F).contains(&byte) => {
                WINDOWS_1252_HIGH[usize::from(byte - 0x80)]
            }
            _ => char::from(byte),
        }
    }

    /// Picks the charset a text body gets when none was requested.
    #[must_use]
    pub fn default_for(text: &str) -> Self {
        if text.is_ascii() { Self::UsAscii } else { Self::Utf8 }
    }
}

impl FromStr for Charset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::for_name(s)
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_for_name_aliases() {
        assert_eq!(Charset::for_name("utf8").unwrap(), Charset::Utf8);
        assert_eq!(Charset::for_name("Latin1").unwrap(), Charset::Iso8859_1);
        assert_eq!(Charset::for_name(" US-ASCII ").unwrap(), Charset::UsAscii);
    }

    #[test]
    fn test_for_name_unknown() {
        assert!(matches!(
            Charset::for_name("klingon-8"),
            Err(Error::UnsupportedCharset(_))
        ));
    }

    #[test]
    fn test_encode_latin1() {
        assert_eq!(Charset::Iso8859_1.encode("caf\u{e9}"), b"caf\xe9");
        assert_eq!(Charset::Iso8859_1.encode("\u{20ac}"), b"?");
        assert!(!Charset::Iso8859_1.can_encode("\u{20ac}"));
    }

    #[test]
    fn test_latin9_and_cp1252() {
        assert_eq!(Charset::for_name("Latin-9").unwrap(), Charset::Iso8859_15);
        assert_eq!(Charset::for_name("CP1252").unwrap(), Charset::Windows1252);
        assert_eq!(Charset::Windows1252.name(), "windows-1252");

        assert_eq!(Charset::Iso8859_15.encode("\u{20ac}5"), b"\xa45");
        // the currency sign was replaced by the euro in Latin-9
        assert_eq!(Charset::Iso8859_15.encode("\u{a4}"), b"?");
        assert_eq!(
            Charset::Windows1252.encode("\u{201c}caf\u{e9}\u{201d}"),
            b"\x93caf\xe9\x94"
        );
        assert!(!Charset::Windows1252.can_encode("\u{2603}"));

        assert_eq!(Charset::Iso8859_15.decode(b"\xa4\xbd".to_vec()).unwrap(), "\u{20ac}\u{153}");
        assert_eq!(Charset::Windows1252.decode(b"\x80\xe9".to_vec()).unwrap(), "\u{20ac}\u{e9}");
    }

    #[test]
    fn test_default_for() {
        assert_eq!(Charset::default_for("plain"), Charset::UsAscii);
        assert_eq!(Charset::default_for("gr\u{fc}n"), Charset::Utf8);
    }
}
