//! Resolver over bundled in-memory assets.

use super::{DataSourceResolver, Resolved, is_cid_url, missing};
use courier_mime::{APPLICATION_OCTET_STREAM, BytesDataSource, DataSource};
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves locations against a table of bundled assets, e.g. files
/// compiled in with `include_bytes!`.
///
/// Locations are looked up under a base path: with base `/templates/`,
/// `images/logo.png` resolves to the asset registered as
/// `/templates/images/logo.png`.
#[derive(Debug, Clone)]
pub struct AssetResolver {
    base: String,
    assets: HashMap<String, Arc<[u8]>>,
    lenient: bool,
}

impl Default for AssetResolver {
    fn default() -> Self {
        Self::new("/")
    }
}

impl AssetResolver {
    /// Creates an empty strict resolver with the given base path.
    #[must_use]
    pub fn new(base: &str) -> Self {
        let mut base = base.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Self {
            base,
            assets: HashMap::new(),
            lenient: false,
        }
    }

    /// Sets the lenient policy.
    #[must_use]
    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    /// Registers an asset under its full path.
    #[must_use]
    pub fn with_asset(mut self, path: &str, data: impl Into<Arc<[u8]>>) -> Self {
        self.insert(path, data);
        self
    }

    /// Registers an asset under its full path.
    pub fn insert(&mut self, path: &str, data: impl Into<Arc<[u8]>>) {
        self.assets.insert(normalize(&format!("/{path}")), data.into());
    }

    /// Returns the base path (always ending in `/`).
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    fn resource_name(&self, location: &str) -> String {
        normalize(&format!("{}{location}", self.base))
    }
}

fn normalize(path: &str) -> String {
    let mut normalized = path.to_string();
    while normalized.contains("//") {
        normalized = normalized.replace("//", "/");
    }
    normalized
}

impl DataSourceResolver for AssetResolver {
    fn resolve_with(&self, location: &str, lenient: bool) -> Resolved {
        if is_cid_url(location) {
            return Ok(None);
        }

        let name = self.resource_name(location);
        let Some(data) = self.assets.get(&name) else {
            return missing(location, lenient, None);
        };

        let content_type = mime_guess::from_path(location)
            .first_raw()
            .unwrap_or(APPLICATION_OCTET_STREAM);
        tracing::trace!(location, asset = %name, "Resolved bundled asset");
        let source: Arc<dyn DataSource> =
            Arc::new(BytesDataSource::new(data.to_vec(), content_type).with_name(name));
        Ok(Some(source))
    }

    fn is_lenient(&self) -> bool {
        self.lenient
    }
}
