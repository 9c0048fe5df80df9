//! URL resolver.

use super::{
    DataSourceResolver, Resolved, invalid, is_cid_url, is_file_url, is_http_url, missing,
};
use crate::url_source::UrlDataSource;
use courier_mime::DataSource;
use std::io;
use std::sync::Arc;
use ::url::Url;

/// Resolves locations as URLs, relative ones against a base URL.
///
/// Each resolved resource is fetched once to check that it exists.
#[derive(Debug, Clone)]
pub struct UrlResolver {
    base_url: Option<Url>,
    lenient: bool,
}

impl UrlResolver {
    /// Creates a strict resolver. Without a base URL every location must be
    /// an absolute URL.
    #[must_use]
    pub const fn new(base_url: Option<Url>) -> Self {
        Self {
            base_url,
            lenient: false,
        }
    }

    /// Sets the lenient policy.
    #[must_use]
    pub const fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    /// Returns the base URL.
    #[must_use]
    pub const fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Returns the URL for `location`, or why it cannot be built.
    fn create_url(&self, location: &str) -> Result<Url, String> {
        let Some(base) = &self.base_url else {
            return Url::parse(location).map_err(|e| e.to_string());
        };
        if location.is_empty() {
            return Err("No resource defined".into());
        }
        if is_file_url(location) || is_http_url(location) {
            return Url::parse(location).map_err(|e| e.to_string());
        }
        base.join(&location.replace("&amp;", "&"))
            .map_err(|e| e.to_string())
    }
}

impl DataSourceResolver for UrlResolver {
    fn resolve_with(&self, location: &str, lenient: bool) -> Resolved {
        if is_cid_url(location) {
            return Ok(None);
        }

        let url = match self.create_url(location) {
            Ok(url) => url,
            Err(reason) => return invalid(location, lenient, reason),
        };
        let source = UrlDataSource::new(url);
        match source.probe() {
            Ok(()) => {
                tracing::trace!(location, url = %source.url(), "Resolved URL resource");
                let source: Arc<dyn DataSource> = Arc::new(source);
                Ok(Some(source))
            }
            Err(e) if e.kind() == io::ErrorKind::Unsupported => {
                invalid(location, lenient, e.to_string())
            }
            Err(e) => missing(location, lenient, Some(e)),
        }
    }

    fn is_lenient(&self) -> bool {
        self.lenient
    }
}
