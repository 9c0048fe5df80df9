//! Typed byte sources backing attachments and inline resources.

use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Content type used when nothing better is known.
pub const APPLICATION_OCTET_STREAM: &str = "application/octet-stream";

/// What a data source points at, used to decide whether two sources
/// refer to the same resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceIdentity {
    /// A file, by canonical path.
    File(PathBuf),
    /// A URL, by external form.
    Url(String),
    /// No stable identity; only the same source instance is equivalent.
    Opaque,
}

/// A named, typed stream of bytes.
pub trait DataSource: fmt::Debug + Send + Sync {
    /// Intrinsic name of the resource (e.g. a file name), if any.
    fn name(&self) -> Option<String>;

    /// MIME type of the content.
    fn content_type(&self) -> String;

    /// Opens a fresh reader over the content.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying resource cannot be opened.
    fn open(&self) -> io::Result<Box<dyn Read + Send + '_>>;

    /// Identity used for equivalence checks.
    fn identity(&self) -> ResourceIdentity {
        ResourceIdentity::Opaque
    }

    /// Reads the whole content into memory.
    ///
    /// # Errors
    ///
    /// Returns an error if opening or reading fails.
    fn read_all(&self) -> io::Result<Vec<u8>> {
        let mut data = Vec::new();
        self.open()?.read_to_end(&mut data)?;
        Ok(data)
    }
}

/// Returns true if both sources refer to the same resource: equal canonical
/// file paths, equal URL external forms, or the very same instance.
#[must_use]
pub fn same_resource(a: &Arc<dyn DataSource>, b: &Arc<dyn DataSource>) -> bool {
    match (a.identity(), b.identity()) {
        (ResourceIdentity::File(x), ResourceIdentity::File(y)) => x == y,
        (ResourceIdentity::Url(x), ResourceIdentity::Url(y)) => x == y,
        _ => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
    }
}

/// A file on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileDataSource {
    path: PathBuf,
    content_type: String,
}

impl FileDataSource {
    /// Creates a source for `path`, guessing the content type from the
    /// file extension.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let content_type = mime_guess::from_path(&path)
            .first_raw()
            .unwrap_or(APPLICATION_OCTET_STREAM)
            .to_string();
        Self { path, content_type }
    }

    /// Overrides the guessed content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Returns the path as given.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the canonical path. Paths that do not exist are made
    /// absolute without resolving links.
    #[must_use]
    pub fn canonical_path(&self) -> PathBuf {
        self.path
            .canonicalize()
            .or_else(|_| std::path::absolute(&self.path))
            .unwrap_or_else(|_| self.path.clone())
    }
}

impl DataSource for FileDataSource {
    fn name(&self) -> Option<String> {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }

    fn content_type(&self) -> String {
        self.content_type.clone()
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send + '_>> {
        Ok(Box::new(File::open(&self.path)?))
    }

    fn identity(&self) -> ResourceIdentity {
        ResourceIdentity::File(self.canonical_path())
    }
}

/// In-memory content.
#[derive(Debug, Clone)]
pub struct BytesDataSource {
    data: Vec<u8>,
    content_type: String,
    name: Option<String>,
}

impl BytesDataSource {
    /// Creates a source over `data` with the given content type.
    #[must_use]
    pub fn new(data: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            content_type: content_type.into(),
            name: None,
        }
    }

    /// Sets the intrinsic name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns the content.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl DataSource for BytesDataSource {
    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    fn content_type(&self) -> String {
        self.content_type.clone()
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send + '_>> {
        Ok(Box::new(Cursor::new(self.data.as_slice())))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_data_source_guesses_type() {
        let source = FileDataSource::new("images/logo.png");
        assert_eq!(source.content_type(), "image/png");
        assert_eq!(source.name().as_deref(), Some("logo.png"));

        let unknown = FileDataSource::new("blob.unknownext");
        assert_eq!(unknown.content_type(), APPLICATION_OCTET_STREAM);
    }

    #[test]
    fn test_file_data_source_reads() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"attachment body").unwrap();

        let source = FileDataSource::new(file.path());
        assert_eq!(source.read_all().unwrap(), b"attachment body");
    }

    #[test]
    fn test_missing_file_fails_to_open() {
        let source = FileDataSource::new("/definitely/not/here.txt");
        assert!(source.open().is_err());
    }

    #[test]
    fn test_same_resource_by_canonical_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"x").unwrap();

        let direct: Arc<dyn DataSource> = Arc::new(FileDataSource::new(&path));
        let dotted: Arc<dyn DataSource> =
            Arc::new(FileDataSource::new(dir.path().join(".").join("a.txt")));
        assert!(same_resource(&direct, &dotted));
    }

    #[test]
    fn test_same_resource_opaque_is_instance_equality() {
        let a: Arc<dyn DataSource> = Arc::new(BytesDataSource::new(b"x".to_vec(), "text/plain"));
        let b: Arc<dyn DataSource> = Arc::new(BytesDataSource::new(b"x".to_vec(), "text/plain"));
        assert!(same_resource(&a, &Arc::clone(&a)));
        assert!(!same_resource(&a, &b));
    }
}
