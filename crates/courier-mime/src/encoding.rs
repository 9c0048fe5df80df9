//! MIME encoding and decoding utilities.
//!
//! Supports Base64, Quoted-Printable, RFC 2047 encoded words and
//! RFC 5322 header folding.

use crate::charset::Charset;
use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt::Write as _;

/// Maximum line length for encoded bodies and folded headers.
pub const MAX_LINE_LENGTH: usize = 76;

/// Maximum length of a single RFC 2047 encoded word.
const MAX_ENCODED_WORD: usize = 75;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64, broken into CRLF-terminated 76 character lines.
#[must_use]
pub fn encode_base64_lines(data: &[u8]) -> String {
    let encoded = encode_base64(data);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2 + 2);
    for chunk in encoded.as_bytes().chunks(MAX_LINE_LENGTH) {
        // base64 output is pure ASCII
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push_str("\r\n");
    }
    out
}

/// Decodes Base64 data, ignoring embedded whitespace.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(cleaned).map_err(Into::into)
}

/// Encodes bytes using Quoted-Printable encoding (RFC 2045).
///
/// Line breaks (`\n` or `\r\n`) in the input are kept as hard CRLF
/// breaks; long lines get soft breaks.
#[must_use]
pub fn encode_quoted_printable(data: &[u8]) -> String {
    let mut result = String::new();
    for (index, line) in split_lines(data).enumerate() {
        if index > 0 {
            result.push_str("\r\n");
        }
        encode_qp_line(line, &mut result);
    }
    result
}

fn split_lines(data: &[u8]) -> impl Iterator<Item = &[u8]> {
    data.split(|b| *b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
}

fn encode_qp_line(line: &[u8], result: &mut String) {
    let mut line_length = 0;
    for (index, byte) in line.iter().enumerate() {
        let last = index + 1 == line.len();
        let literal = match byte {
            b'!'..=b'<' | b'>'..=b'~' => true,
            // Whitespace at the end of a line must be encoded
            b' ' | b'\t' => !last,
            _ => false,
        };
        let width = if literal { 1 } else { 3 };

        if line_length + width > MAX_LINE_LENGTH - 1 {
            result.push_str("=\r\n");
            line_length = 0;
        }

        if literal {
            result.push(char::from(*byte));
        } else {
            let _ = write!(result, "={byte:02X}");
        }
        line_length += width;
    }
}

/// Decodes Quoted-Printable text (RFC 2045).
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences.
pub fn decode_quoted_printable(text: &str) -> Result<String> {
    String::from_utf8(decode_quoted_printable_bytes(text)?).map_err(Into::into)
}

fn decode_quoted_printable_bytes(text: &str) -> Result<Vec<u8>> {
    let mut result = Vec::new();
    let mut bytes = text.bytes().peekable();

    while let Some(byte) = bytes.next() {
        if byte != b'=' {
            result.push(byte);
            continue;
        }

        // Soft line break
        if bytes.peek() == Some(&b'\r') {
            bytes.next();
            if bytes.peek() == Some(&b'\n') {
                bytes.next();
            }
            continue;
        } else if bytes.peek() == Some(&b'\n') {
            bytes.next();
            continue;
        }

        let hex: Vec<u8> = bytes.by_ref().take(2).collect();
        if hex.len() != 2 {
            return Err(Error::InvalidEncoding(
                "Incomplete escape sequence".to_string(),
            ));
        }
        let hex = std::str::from_utf8(&hex)
            .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
        let value = u8::from_str_radix(hex, 16)
            .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
        result.push(value);
    }

    Ok(result)
}

/// Characters allowed verbatim inside a Q encoded word in a phrase.
const fn is_q_safe(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'!' | b'*' | b'+' | b'-' | b'/')
}

/// Encodes a header value using RFC 2047 encoded words if needed.
///
/// Printable ASCII passes through unchanged. Otherwise the value is
/// converted to `charset` and split into encoded words of at most 75
/// characters each, separated by a space so [`fold`] can break between
/// them. Q encoding is used for mostly-ASCII values, B encoding otherwise.
#[must_use]
pub fn encode_text(text: &str, charset: Charset) -> String {
    if text.bytes().all(|b| (b' '..=b'~').contains(&b)) && !text.contains("=?") {
        return text.to_string();
    }

    let non_ascii = text.chars().filter(|c| !c.is_ascii()).count();
    let ascii = text.chars().count() - non_ascii;
    if ascii > non_ascii {
        encode_words(text, charset, 'Q')
    } else {
        encode_words(text, charset, 'B')
    }
}

fn encode_words(text: &str, charset: Charset, method: char) -> String {
    let prefix = format!("=?{}?{method}?", charset.name());
    let budget = MAX_ENCODED_WORD - prefix.len() - 2;

    let mut words: Vec<String> = Vec::new();
    let mut pending: Vec<u8> = Vec::new();
    let mut buf = [0u8; 4];

    for c in text.chars() {
        let bytes = charset.encode(c.encode_utf8(&mut buf));
        let mut candidate = pending.clone();
        candidate.extend_from_slice(&bytes);
        if !pending.is_empty() && encoded_word_len(&candidate, method) > budget {
            words.push(encode_word_payload(&pending, method));
            pending = bytes;
        } else {
            pending = candidate;
        }
    }
    if !pending.is_empty() {
        words.push(encode_word_payload(&pending, method));
    }

    words
        .iter()
        .map(|payload| format!("{prefix}{payload}?="))
        .collect::<Vec<_>>()
        .join(" ")
}

fn encoded_word_len(bytes: &[u8], method: char) -> usize {
    if method == 'B' {
        bytes.len().div_ceil(3) * 4
    } else {
        bytes
            .iter()
            .map(|b| if is_q_safe(*b) || *b == b' ' { 1 } else { 3 })
            .sum()
    }
}

fn encode_word_payload(bytes: &[u8], method: char) -> String {
    if method == 'B' {
        return encode_base64(bytes);
    }
    let mut out = String::new();
    for byte in bytes {
        if *byte == b' ' {
            out.push('_');
        } else if is_q_safe(*byte) {
            out.push(char::from(*byte));
        } else {
            let _ = write!(out, "={byte:02X}");
        }
    }
    out
}

/// Decodes a header value containing RFC 2047 encoded words.
///
/// Whitespace between adjacent encoded words is dropped; other text is
/// kept as is.
///
/// # Errors
///
/// Returns an error if an encoded word is malformed.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    let unfolded = text.replace("\r\n", "");
    let mut result = String::new();
    let mut previous_was_word = false;

    for token in unfolded.split([' ', '\t']) {
        if token.starts_with("=?") && token.ends_with("?=") && token.len() > 4 {
            if !previous_was_word && !result.is_empty() {
                result.push(' ');
            }
            result.push_str(&decode_word(&token[2..token.len() - 2])?);
            previous_was_word = true;
        } else if !token.is_empty() {
            if !result.is_empty() {
                result.push(' ');
            }
            result.push_str(token);
            previous_was_word = false;
        }
    }

    Ok(result)
}

fn decode_word(inner: &str) -> Result<String> {
    let parts: Vec<&str> = inner.split('?').collect();
    if parts.len() != 3 {
        return Err(Error::InvalidEncoding(
            "Invalid RFC 2047 format".to_string(),
        ));
    }

    let charset = Charset::for_name(parts[0])?;
    let bytes = match parts[1].to_uppercase().as_str() {
        "B" => decode_base64(parts[2])?,
        "Q" => decode_quoted_printable_bytes(&parts[2].replace('_', " "))?,
        other => {
            return Err(Error::InvalidEncoding(format!(
                "Unknown encoding: {other}"
            )));
        }
    };

    charset.decode(bytes)
}

/// Folds a header value so that no line exceeds 76 characters.
///
/// `used` is the number of characters already occupied on the first line,
/// typically the header name plus `": "`. Lines are broken before a
/// whitespace character, which starts the continuation line. A value
/// without usable whitespace is left long.
#[must_use]
pub fn fold(used: usize, value: &str) -> String {
    let value = value.trim_end();
    if used + value.chars().count() <= MAX_LINE_LENGTH {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len() + 8);
    let mut rest = value;
    let mut used = used;
    let mut last: Option<char> = None;

    while used + rest.chars().count() > MAX_LINE_LENGTH {
        let mut break_at: Option<usize> = None;
        for (position, (index, c)) in rest.char_indices().enumerate() {
            if break_at.is_some() && used + position > MAX_LINE_LENGTH {
                break;
            }
            let is_space = c == ' ' || c == '\t';
            let after_space = matches!(last, Some(' ' | '\t'));
            if is_space && !after_space && index > 0 {
                break_at = Some(index);
            }
            last = Some(c);
        }

        let Some(index) = break_at else {
            break;
        };
        out.push_str(&rest[..index]);
        out.push_str("\r\n");
        rest = &rest[index..];
        used = 0;
        last = None;
    }

    out.push_str(rest);
    out
}

/// Percent-encodes a value for use as a `cid:` URL (RFC 2392).
///
/// Bytes outside `A-Z a-z 0-9 - _ . * + $ ! ' ( ) , @` are written as `%XX`
/// with uppercase hex digits.
#[must_use]
pub fn encode_url(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || b"-_.*+$!'(),@".contains(&byte) {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_base64_lines_wrap_at_76() {
        let data = vec![0xAB; 200];
        let encoded = encode_base64_lines(&data);
        for line in encoded.split("\r\n").filter(|l| !l.is_empty()) {
            assert!(line.len() <= MAX_LINE_LENGTH);
        }
        assert_eq!(decode_base64(&encoded).unwrap(), data);
    }

    #[test]
    fn test_quoted_printable_encode() {
        let encoded = encode_quoted_printable(b"Hello, World!");
        assert_eq!(encoded, "Hello, World!");

        let encoded = encode_quoted_printable("H\u{e9}llo, W\u{f8}rld!".as_bytes());
        assert!(encoded.contains("=C3"));
    }

    #[test]
    fn test_quoted_printable_keeps_line_breaks() {
        let encoded = encode_quoted_printable(b"one \ntwo\r\nthree");
        assert_eq!(encoded, "one=20\r\ntwo\r\nthree");
    }

    #[test]
    fn test_quoted_printable_soft_breaks() {
        let long = "x".repeat(200);
        let encoded = encode_quoted_printable(long.as_bytes());
        for line in encoded.split("\r\n") {
            assert!(line.len() <= MAX_LINE_LENGTH);
        }
        assert_eq!(decode_quoted_printable(&encoded).unwrap(), long);
    }

    #[test]
    fn test_quoted_printable_decode() {
        let decoded = decode_quoted_printable("H=C3=A9llo").unwrap();
        assert_eq!(decoded, "H\u{e9}llo");
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        let decoded = decode_quoted_printable("Hello=\r\nWorld").unwrap();
        assert_eq!(decoded, "HelloWorld");
    }

    #[test]
    fn test_encode_text_ascii_passthrough() {
        assert_eq!(encode_text("Hello", Charset::Utf8), "Hello");
    }

    #[test]
    fn test_encode_text_q_word() {
        let encoded = encode_text("H\u{e9}llo world", Charset::Utf8);
        assert!(encoded.starts_with("=?UTF-8?Q?"));
        assert_eq!(decode_rfc2047(&encoded).unwrap(), "H\u{e9}llo world");
    }

    #[test]
    fn test_encode_text_b_word() {
        let encoded = encode_text("\u{41f}\u{440}\u{438}\u{432}\u{435}\u{442}", Charset::Utf8);
        assert!(encoded.starts_with("=?UTF-8?B?"));
        assert_eq!(
            decode_rfc2047(&encoded).unwrap(),
            "\u{41f}\u{440}\u{438}\u{432}\u{435}\u{442}"
        );
    }

    #[test]
    fn test_encode_text_splits_long_values() {
        let text = "\u{e9}t\u{e9} ".repeat(40);
        let encoded = encode_text(&text, Charset::Iso8859_1);
        for word in encoded.split(' ') {
            assert!(word.len() <= MAX_ENCODED_WORD, "{word}");
        }
        assert_eq!(decode_rfc2047(&encoded).unwrap(), text);
    }

    #[test]
    fn test_rfc2047_decode_plain() {
        assert_eq!(decode_rfc2047("Hello").unwrap(), "Hello");
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?=").unwrap(), "H\u{e9}llo");
        assert_eq!(decode_rfc2047("=?utf-8?Q?H=C3=A9llo?=").unwrap(), "H\u{e9}llo");
    }

    #[test]
    fn test_fold_short_value_untouched() {
        assert_eq!(fold(9, "short value"), "short value");
    }

    #[test]
    fn test_fold_long_value() {
        let value = "word ".repeat(40);
        let folded = fold(9, &value);
        let mut lines = folded.split("\r\n");
        let first = lines.next().unwrap();
        assert!(first.len() + 9 <= MAX_LINE_LENGTH);
        for line in lines {
            assert!(line.starts_with(' '));
            assert!(line.len() <= MAX_LINE_LENGTH);
        }
        assert_eq!(folded.replace("\r\n", ""), value.trim_end());
    }

    #[test]
    fn test_fold_without_whitespace() {
        let value = "x".repeat(100);
        assert_eq!(fold(0, &value), value);
    }

    #[test]
    fn test_encode_url() {
        assert_eq!(encode_url("Test CID"), "Test%20CID");
        assert_eq!(encode_url("joe.doe@apache.org"), "joe.doe@apache.org");
        assert_eq!(
            encode_url("peter&paul&mary@oldmusic.org"),
            "peter%26paul%26mary@oldmusic.org"
        );
    }
}
