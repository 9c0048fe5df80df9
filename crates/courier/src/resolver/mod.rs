//! Resolvers turning resource locations found in markup into data sources.
//!
//! A resolver is either strict or lenient. In lenient mode a resource that
//! does not exist, or a location that cannot be turned into a path or URL,
//! resolves to `Ok(None)`; in strict mode they are reported as
//! [`ResolveError::NotFound`] and [`ResolveError::InvalidLocation`]. Read
//! failures are errors in both modes. Locations starting with `cid:` are
//! already inline references and always resolve to `Ok(None)`.

mod asset;
mod composite;
mod file;
mod url;

pub use self::asset::AssetResolver;
pub use self::composite::CompositeResolver;
pub use self::file::FileResolver;
pub use self::url::UrlResolver;

use courier_mime::DataSource;
use std::fmt;
use std::io;
use std::sync::Arc;

/// Resolved data source, if any.
pub type Resolved = Result<Option<Arc<dyn DataSource>>, ResolveError>;

/// Resource resolution failures.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The resource does not exist or could not be reached.
    #[error("The following resource was not found : {location}")]
    NotFound {
        /// Location as written in the markup.
        location: String,
        /// Underlying failure, if there was one.
        #[source]
        source: Option<io::Error>,
    },

    /// The location cannot be turned into a path or URL.
    #[error("Invalid resource location {location}: {reason}")]
    InvalidLocation {
        /// Location as written in the markup.
        location: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The resource exists but could not be read.
    #[error("Failed to read resource {location}: {source}")]
    Io {
        /// Location as written in the markup.
        location: String,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
}

impl ResolveError {
    /// Creates a `NotFound` error.
    #[must_use]
    pub fn not_found(location: impl Into<String>, source: Option<io::Error>) -> Self {
        Self::NotFound {
            location: location.into(),
            source,
        }
    }

    /// Returns true if the resource simply does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Maps locations to data sources.
pub trait DataSourceResolver: fmt::Debug + Send + Sync {
    /// Resolves `location` with an explicit lenient/strict policy.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `InvalidLocation` in strict mode when the
    /// resource does not exist or cannot be addressed, and `Io` in either
    /// mode.
    fn resolve_with(&self, location: &str, lenient: bool) -> Resolved;

    /// Returns the policy used by [`resolve`](Self::resolve).
    fn is_lenient(&self) -> bool;

    /// Resolves `location` using this resolver's own policy.
    ///
    /// # Errors
    ///
    /// See [`resolve_with`](Self::resolve_with).
    fn resolve(&self, location: &str) -> Resolved {
        self.resolve_with(location, self.is_lenient())
    }
}

/// Returns true for inline `cid:` references.
pub(crate) fn is_cid_url(location: &str) -> bool {
    location.starts_with("cid:")
}

/// Returns true for absolute `file:` URLs.
pub(crate) fn is_file_url(location: &str) -> bool {
    location.starts_with("file:/")
}

/// Returns true for `http` and `https` URLs.
pub(crate) fn is_http_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Applies the lenient policy to a missing resource.
pub(crate) fn missing(location: &str, lenient: bool, source: Option<io::Error>) -> Resolved {
    if lenient {
        tracing::debug!(location, "Resource not found, leaving reference as is");
        Ok(None)
    } else {
        Err(ResolveError::not_found(location, source))
    }
}

/// Applies the lenient policy to a location that cannot be addressed.
pub(crate) fn invalid(location: &str, lenient: bool, reason: impl Into<String>) -> Resolved {
    let reason = reason.into();
    if lenient {
        tracing::debug!(location, %reason, "Invalid location, leaving reference as is");
        Ok(None)
    } else {
        Err(ResolveError::InvalidLocation {
            location: location.to_string(),
            reason,
        })
    }
}
