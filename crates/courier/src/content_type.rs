//! Content type negotiation for single-content messages.

/// Marker introducing a charset parameter.
const CHARSET_MARKER: &str = "; charset=";

/// Outcome of [`negotiate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiated {
    /// Final content type, `None` when nothing was requested.
    pub content_type: Option<String>,
    /// Charset in effect afterwards: the explicit one from the content
    /// type, otherwise the default passed in.
    pub charset: Option<String>,
}

/// Decides the final content type for `requested` given the email's
/// default charset.
///
/// - empty input records no content type;
/// - an explicit `; charset=` parameter wins and becomes the active charset;
/// - `text/*` types without one get `; charset=<default>` appended;
/// - everything else passes through unchanged.
///
/// Never fails; malformed charset markers pass through as given.
#[must_use]
pub fn negotiate(requested: &str, default_charset: Option<&str>) -> Negotiated {
    let default_charset = default_charset.filter(|c| !c.is_empty());
    if requested.is_empty() {
        return Negotiated {
            content_type: None,
            charset: default_charset.map(str::to_string),
        };
    }

    let lower = requested.to_ascii_lowercase();
    if let Some(position) = lower.find(CHARSET_MARKER) {
        let start = position + CHARSET_MARKER.len();
        let value = &requested[start..];
        let end = value.find([' ', ';']).unwrap_or(value.len());
        let explicit = value[..end].trim_matches('"');
        return Negotiated {
            content_type: Some(requested.to_string()),
            charset: if explicit.is_empty() {
                default_charset.map(str::to_string)
            } else {
                Some(explicit.to_string())
            },
        };
    }

    let content_type = match default_charset {
        Some(charset) if lower.starts_with("text/") && !lower.contains("charset") => {
            format!("{requested}{CHARSET_MARKER}{charset}")
        }
        _ => requested.to_string(),
    };

    Negotiated {
        content_type: Some(content_type),
        charset: default_charset.map(str::to_string),
    }
}
