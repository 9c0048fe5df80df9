//! Filesystem resolver.

use super::{DataSourceResolver, Resolved, is_cid_url, missing};
use courier_mime::{DataSource, FileDataSource};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Resolves locations as file paths, relative ones against a base directory.
#[derive(Debug, Clone)]
pub struct FileResolver {
    base_dir: PathBuf,
    lenient: bool,
}

impl Default for FileResolver {
    fn default() -> Self {
        Self::new(".")
    }
}

impl FileResolver {
    /// Creates a strict resolver rooted at `base_dir`.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            lenient: false,
        }
    }

    /// Sets the lenient policy.
    #[must_use]
    pub const fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    /// Returns the base directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl DataSourceResolver for FileResolver {
    fn resolve_with(&self, location: &str, lenient: bool) -> Resolved {
        if is_cid_url(location) {
            return Ok(None);
        }

        let path = Path::new(location);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        };

        if path.exists() {
            tracing::trace!(location, path = %path.display(), "Resolved file resource");
            let source: Arc<dyn DataSource> = Arc::new(FileDataSource::new(path));
            Ok(Some(source))
        } else {
            missing(location, lenient, None)
        }
    }

    fn is_lenient(&self) -> bool {
        self.lenient
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_relative_to_base() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("images")).unwrap();
        std::fs::write(dir.path().join("images/logo.png"), b"png").unwrap();

        let resolver = FileResolver::new(dir.path());
        let source = resolver.resolve("images/logo.png").unwrap().unwrap();
        assert_eq!(source.name().as_deref(), Some("logo.png"));
        assert_eq!(source.content_type(), "image/png");
        assert_eq!(source.read_all().unwrap(), b"png");
    }

    #[test]
    fn test_absolute_path_ignores_base() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.gif");
        std::fs::write(&path, b"gif").unwrap();

        let resolver = FileResolver::new("/nonexistent-base");
        assert!(resolver.resolve(path.to_str().unwrap()).unwrap().is_some());
    }

    #[test]
    fn test_missing_file_policy() {
        let dir = tempfile::tempdir().unwrap();
        let strict = FileResolver::new(dir.path());
        assert!(strict.resolve("nope.png").unwrap_err().is_not_found());

        let lenient = strict.clone().lenient(true);
        assert!(lenient.resolve("nope.png").unwrap().is_none());
        assert!(lenient.resolve_with("nope.png", false).is_err());
    }

    #[test]
    fn test_cid_is_skipped() {
        let resolver = FileResolver::default();
        assert!(resolver.resolve("cid:abcdefghij").unwrap().is_none());
    }
}
