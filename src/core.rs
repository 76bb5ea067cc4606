use crate::config::Config;
use crate::stream::ReadableStream;
use crate::vfs::Entry;

/// Storage backend contract consumed by [`Filesystem`](crate::Filesystem).
///
/// Every `path` argument is already canonical: no leading or trailing `/`, no empty,
/// `.` or `..` segments, and `""` for the root. Implementations may rely on that.
///
/// Errors are returned as-is to the facade caller, so they should carry enough
/// context (usually the path) to be useful on their own.
pub trait FilesystemAdapter {
    /// Returns true if `path` is an existing file.
    fn file_exists(&self, path: &str) -> Result<bool>;

    /// Creates or overwrites the file at `path`.
    fn write(&mut self, path: &str, contents: &[u8], config: &Config) -> Result<()>;

    /// Creates or overwrites the file at `path`, reading `contents` until end of data.
    /// The stream is positioned at its origin when this is called.
    fn write_stream(
        &mut self,
        path: &str,
        contents: &mut dyn ReadableStream,
        config: &Config,
    ) -> Result<()>;

    fn read(&self, path: &str) -> Result<Vec<u8>>;

    fn read_stream(&self, path: &str) -> Result<Box<dyn ReadableStream>>;

    fn delete(&mut self, path: &str) -> Result<()>;

    fn delete_directory(&mut self, path: &str) -> Result<()>;

    fn create_directory(&mut self, path: &str, config: &Config) -> Result<()>;

    /// Lists entries below `path`; with `deep` the whole subtree, otherwise only the
    /// immediate children. The directory itself is never yielded.
    fn list_contents<'a>(
        &'a self,
        path: &str,
        deep: bool,
    ) -> Result<Box<dyn Iterator<Item = Result<Entry>> + 'a>>;

    fn move_file(&mut self, source: &str, destination: &str, config: &Config) -> Result<()>;

    fn copy_file(&mut self, source: &str, destination: &str, config: &Config) -> Result<()>;

    /// Unix timestamp in seconds.
    fn last_modified(&self, path: &str) -> Result<i64>;

    fn file_size(&self, path: &str) -> Result<u64>;

    fn mime_type(&self, path: &str) -> Result<String>;

    fn visibility(&self, path: &str) -> Result<String>;

    fn set_visibility(&mut self, path: &str, visibility: &str) -> Result<()>;
}

/// Failures raised by the facade itself, before any backend is involved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("invalid stream provided, expected stream resource, received {0}")]
    InvalidStreamProvided(String),
}

pub type Result<T> = std::result::Result<T, anyhow::Error>;

pub(crate) mod utils {
    use std::time::SystemTime;

    const FALLBACK_TEXT: &str = "text/plain";
    const FALLBACK_BINARY: &str = "application/octet-stream";

    /// Bytes inspected when sniffing the mime type of a file on disk.
    pub const MIME_SAMPLE_LEN: usize = 8192;

    /// Guesses a mime type from the leading bytes of `content`.
    /// `content` may be a truncated sample; a multi-byte character cut at the end still
    /// counts as text.
    pub fn detect_mime_type(content: &[u8]) -> String {
        if let Some(kind) = infer::get(content) {
            return kind.mime_type().to_string();
        }
        match std::str::from_utf8(content) {
            Ok(_) => FALLBACK_TEXT.to_string(),
            Err(e) if e.error_len().is_none() => FALLBACK_TEXT.to_string(),
            Err(_) => FALLBACK_BINARY.to_string(),
        }
    }

    pub fn unix_timestamp(time: SystemTime) -> i64 {
        match time.duration_since(SystemTime::UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_secs() as i64,
            Err(before) => -(before.duration().as_secs() as i64),
        }
    }

    /// Returns the parent of a canonical path, `""` for top-level entries.
    pub fn parent(path: &str) -> Option<&str> {
        if path.is_empty() {
            return None;
        }
        Some(path.rsplit_once('/').map_or("", |(parent, _)| parent))
    }

    /// True if canonical `path` lies strictly below canonical `dir`.
    pub fn is_descendant(path: &str, dir: &str) -> bool {
        if dir.is_empty() {
            return !path.is_empty();
        }
        path.len() > dir.len() && path.starts_with(dir) && path.as_bytes()[dir.len()] == b'/'
    }

}
