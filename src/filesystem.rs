//! The public entry point: path normalization, option merging and stream wrapping in
//! front of a [`FilesystemAdapter`].

use tracing::debug;

use crate::config::Config;
use crate::core::{FilesystemAdapter, Result};
use crate::listing::DirectoryListing;
use crate::path::{PathNormalizer, WhitespacePathNormalizer};
use crate::stream::{ReadableStream, Resource, ResourceStream};

/// Content accepted by [`Filesystem::write_stream`].
pub enum Contents<'a> {
    /// A stream the caller keeps ownership of.
    Stream(&'a mut dyn ReadableStream),
    /// A raw source; the facade wraps it and drops it once the backend is done.
    Resource(Resource),
}

impl<'a, S: ReadableStream> From<&'a mut S> for Contents<'a> {
    fn from(stream: &'a mut S) -> Self {
        Contents::Stream(stream)
    }
}

impl From<Resource> for Contents<'_> {
    fn from(resource: Resource) -> Self {
        Contents::Resource(resource)
    }
}

impl From<std::fs::File> for Contents<'_> {
    fn from(file: std::fs::File) -> Self {
        Contents::Resource(Resource::File(file))
    }
}

/// Backend-agnostic filesystem.
///
/// Every path argument is normalized before the backend sees it, so `" docs//a.txt "`
/// and `"docs/a.txt"` address the same file. A path that cannot be normalized fails
/// with [`Error::InvalidPath`](crate::Error::InvalidPath) and the backend is never
/// called. Backend errors are returned untouched.
///
/// ### Example
///
/// ```
/// use vfs_facade::{Config, Filesystem, MapFS};
///
/// let mut fs = Filesystem::new(MapFS::new());
/// fs.write("  docs//note.txt ", b"Hello", Config::default()).unwrap();
///
/// assert!(fs.file_exists("docs/note.txt").unwrap());
/// assert_eq!(fs.read("/docs/note.txt").unwrap(), b"Hello");
/// ```
pub struct Filesystem {
    adapter: Box<dyn FilesystemAdapter>,
    config: Config,
    normalizer: Box<dyn PathNormalizer>,
}

impl Filesystem {
    pub const LIST_SHALLOW: bool = false;
    pub const LIST_DEEP: bool = true;

    /// Creates a facade over `adapter` with empty default options and the
    /// [`WhitespacePathNormalizer`].
    pub fn new<A: FilesystemAdapter + 'static>(adapter: A) -> Self {
        Self {
            adapter: Box::new(adapter),
            config: Config::default(),
            normalizer: Box::new(WhitespacePathNormalizer::new()),
        }
    }

    /// Sets the options every call starts from.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_path_normalizer<N: PathNormalizer + 'static>(mut self, normalizer: N) -> Self {
        self.normalizer = Box::new(normalizer);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn normalize(&self, location: &str) -> Result<String> {
        self.normalizer.normalize_path(location)
    }

    pub fn file_exists(&self, location: &str) -> Result<bool> {
        let path = self.normalize(location)?;
        debug!(%path, "file_exists");
        self.adapter.file_exists(&path)
    }

    pub fn write(&mut self, location: &str, contents: &[u8], config: Config) -> Result<()> {
        let path = self.normalize(location)?;
        debug!(%path, len = contents.len(), "write");
        let config = self.config.extend(&config);
        self.adapter.write(&path, contents, &config)
    }

    /// Writes everything `contents` yields, always starting from its first byte.
    ///
    /// A [`Contents::Resource`] is validated and wrapped into a [`ResourceStream`] first.
    /// The stream is rewound right before the backend reads it, whatever the caller did
    /// with it beforehand; for a non-seekable source that rewind does nothing.
    pub fn write_stream<'c, C>(&mut self, location: &str, contents: C, config: Config) -> Result<()>
    where
        C: Into<Contents<'c>>,
    {
        let path = self.normalize(location)?;
        let config = self.config.extend(&config);

        let mut owned;
        let stream: &mut dyn ReadableStream = match contents.into() {
            Contents::Stream(stream) => stream,
            Contents::Resource(resource) => {
                owned = ResourceStream::new(resource)?;
                &mut owned
            }
        };

        stream.rewind()?;
        debug!(%path, seekable = stream.is_seekable(), "write_stream");
        self.adapter.write_stream(&path, stream, &config)
    }

    pub fn read(&self, location: &str) -> Result<Vec<u8>> {
        let path = self.normalize(location)?;
        debug!(%path, "read");
        self.adapter.read(&path)
    }

    /// Opens the file for reading. The caller owns, and should close, the result.
    pub fn read_stream(&self, location: &str) -> Result<Box<dyn ReadableStream>> {
        let path = self.normalize(location)?;
        debug!(%path, "read_stream");
        self.adapter.read_stream(&path)
    }

    pub fn delete(&mut self, location: &str) -> Result<()> {
        let path = self.normalize(location)?;
        debug!(%path, "delete");
        self.adapter.delete(&path)
    }

    pub fn delete_directory(&mut self, location: &str) -> Result<()> {
        let path = self.normalize(location)?;
        debug!(%path, "delete_directory");
        self.adapter.delete_directory(&path)
    }

    pub fn create_directory(&mut self, location: &str, config: Config) -> Result<()> {
        let path = self.normalize(location)?;
        debug!(%path, "create_directory");
        let config = self.config.extend(&config);
        self.adapter.create_directory(&path, &config)
    }

    /// Lists `location`, recursively if `deep` is [`Filesystem::LIST_DEEP`].
    pub fn list_contents(&self, location: &str, deep: bool) -> Result<DirectoryListing<'_>> {
        let path = self.normalize(location)?;
        debug!(%path, deep, "list_contents");
        Ok(DirectoryListing::new(self.adapter.list_contents(&path, deep)?))
    }

    pub fn move_file(&mut self, source: &str, destination: &str, config: Config) -> Result<()> {
        let source = self.normalize(source)?;
        let destination = self.normalize(destination)?;
        debug!(%source, %destination, "move");
        let config = self.config.extend(&config);
        self.adapter.move_file(&source, &destination, &config)
    }

    pub fn copy_file(&mut self, source: &str, destination: &str, config: Config) -> Result<()> {
        let source = self.normalize(source)?;
        let destination = self.normalize(destination)?;
        debug!(%source, %destination, "copy");
        let config = self.config.extend(&config);
        self.adapter.copy_file(&source, &destination, &config)
    }

    /// Unix timestamp, in seconds, of the last modification.
    pub fn last_modified(&self, location: &str) -> Result<i64> {
        let path = self.normalize(location)?;
        debug!(%path, "last_modified");
        self.adapter.last_modified(&path)
    }

    pub fn file_size(&self, location: &str) -> Result<u64> {
        let path = self.normalize(location)?;
        debug!(%path, "file_size");
        self.adapter.file_size(&path)
    }

    pub fn mime_type(&self, location: &str) -> Result<String> {
        let path = self.normalize(location)?;
        debug!(%path, "mime_type");
        self.adapter.mime_type(&path)
    }

    pub fn set_visibility(&mut self, location: &str, visibility: &str) -> Result<()> {
        let path = self.normalize(location)?;
        debug!(%path, visibility, "set_visibility");
        self.adapter.set_visibility(&path, visibility)
    }

    pub fn visibility(&self, location: &str) -> Result<String> {
        let path = self.normalize(location)?;
        debug!(%path, "visibility");
        self.adapter.visibility(&path)
    }
}
