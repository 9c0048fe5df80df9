//! Data source for resources addressed by URL.

use courier_mime::{APPLICATION_OCTET_STREAM, DataSource, ResourceIdentity};
use std::io::{self, Cursor, Read};
use std::sync::OnceLock;
use url::Url;

#[derive(Debug)]
struct Fetched {
    data: Vec<u8>,
    content_type: Option<String>,
}

/// Content at an `http`, `https` or `file` URL.
///
/// Remote content is fetched once, on first use, and kept in memory.
#[derive(Debug)]
pub struct UrlDataSource {
    url: Url,
    fetched: OnceLock<Fetched>,
}

impl UrlDataSource {
    /// Creates a source for `url`. Nothing is fetched yet.
    #[must_use]
    pub const fn new(url: Url) -> Self {
        Self {
            url,
            fetched: OnceLock::new(),
        }
    }

    /// Returns the URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Fetches the content, failing if it cannot be retrieved.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for missing files and HTTP 404/410, other I/O
    /// errors for everything else.
    pub fn probe(&self) -> io::Result<()> {
        self.fetch().map(|_| ())
    }

    fn fetch(&self) -> io::Result<&Fetched> {
        if let Some(fetched) = self.fetched.get() {
            return Ok(fetched);
        }
        let fetched = match self.url.scheme() {
            "file" => self.fetch_file()?,
            "http" | "https" => self.fetch_http()?,
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    format!("unsupported URL scheme: {other}"),
                ));
            }
        };
        tracing::trace!(url = %self.url, bytes = fetched.data.len(), "Fetched URL resource");
        Ok(self.fetched.get_or_init(|| fetched))
    }

    fn fetch_file(&self) -> io::Result<Fetched> {
        let path = self.url.to_file_path().map_err(|()| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("not a local path: {}", self.url))
        })?;
        Ok(Fetched {
            data: std::fs::read(&path)?,
            content_type: mime_guess::from_path(&path).first_raw().map(str::to_string),
        })
    }

    fn fetch_http(&self) -> io::Result<Fetched> {
        let response = reqwest::blocking::get(self.url.clone()).map_err(io::Error::other)?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} returned {status}", self.url),
            ));
        }
        let response = response.error_for_status().map_err(io::Error::other)?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let data = response.bytes().map_err(io::Error::other)?.to_vec();
        Ok(Fetched { data, content_type })
    }
}

impl DataSource for UrlDataSource {
    /// The URL path including any query, like `/images/logo.png`.
    fn name(&self) -> Option<String> {
        let mut name = self.url.path().to_string();
        if let Some(query) = self.url.query() {
            name.push('?');
            name.push_str(query);
        }
        Some(name)
    }

    fn content_type(&self) -> String {
        self.fetched
            .get()
            .and_then(|fetched| fetched.content_type.clone())
            .or_else(|| {
                mime_guess::from_path(self.url.path())
                    .first_raw()
                    .map(str::to_string)
            })
            .unwrap_or_else(|| APPLICATION_OCTET_STREAM.to_string())
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send + '_>> {
        Ok(Box::new(Cursor::new(self.fetch()?.data.as_slice())))
    }

    fn identity(&self) -> ResourceIdentity {
        ResourceIdentity::Url(self.url.as_str().to_string())
    }
}
