//! This module provides a storage backend that maps canonical paths onto a real directory
//! on the host system.
//!
//! ### Key Features:
//! - **Isolated root**: all operations are confined to a designated root directory (self.root).
//!   Canonical paths never contain `..`, so `root.join(path)` cannot leave it.
//! - **Implicit parents**: writes, copies and moves create missing parent directories.
//! - **Visibility**: `public`/`private` map onto Unix permission bits through a
//!   [`PermissionMap`].
//! - **Lazy listing**: directory trees are walked with a stack of open `read_dir` handles,
//!   one entry at a time.

use std::fs::{self, File, ReadDir};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tracing::{debug, trace};

use crate::config::{Config, Visibility};
use crate::core::{FilesystemAdapter, Result, utils};
use crate::stream::{ReadableStream, ResourceStream, StreamReader};
use crate::{Entry, EntryType};

/// Unix permission bits used for each visibility.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PermissionMap {
    pub file_public: u32,
    pub file_private: u32,
    pub dir_public: u32,
    pub dir_private: u32,
    /// Visibility of directories created implicitly, when the options don't say.
    pub default_for_directories: Visibility,
}

impl Default for PermissionMap {
    fn default() -> Self {
        Self {
            file_public: 0o644,
            file_private: 0o600,
            dir_public: 0o755,
            dir_private: 0o700,
            default_for_directories: Visibility::Public,
        }
    }
}

impl PermissionMap {
    pub fn for_file(&self, visibility: Visibility) -> u32 {
        match visibility {
            Visibility::Public => self.file_public,
            Visibility::Private => self.file_private,
        }
    }

    pub fn for_directory(&self, visibility: Visibility) -> u32 {
        match visibility {
            Visibility::Public => self.dir_public,
            Visibility::Private => self.dir_private,
        }
    }

    /// Anything that is not exactly the private mode reads as public.
    pub fn inverse_for_file(&self, mode: u32) -> Visibility {
        if mode & 0o777 == self.file_private {
            Visibility::Private
        } else {
            Visibility::Public
        }
    }

    pub fn inverse_for_directory(&self, mode: u32) -> Visibility {
        if mode & 0o777 == self.dir_private {
            Visibility::Private
        } else {
            Visibility::Public
        }
    }
}

/// A storage backend rooted at a directory on the host system.
///
/// ### Usage notes:
/// - `DirFS` does not follow symlinks while listing; a link is reported as a file.
/// - Visibility needs Unix permissions; on other hosts `visibility()` and
///   `set_visibility()` return an error and the visibility options are ignored.
/// - Not thread-safe in current version (wrap the owning facade in `Mutex` if needed).
///
/// ### Example:
/// ```
/// use vfs_facade::{Config, DirFS, Filesystem};
///
/// let root = std::env::temp_dir().join("vfs_facade_doc");
///
/// let mut fs = Filesystem::new(DirFS::new(&root).unwrap());
/// fs.write("docs/note.txt", b"Hello", Config::default()).unwrap();
/// assert!(fs.file_exists("docs/note.txt").unwrap());
///
/// fs.delete_directory("docs").unwrap();
/// ```
pub struct DirFS {
    root: PathBuf, // host-related absolute path
    permissions: PermissionMap,
}

impl DirFS {
    /// Creates a new DirFS instance with the root directory at `root`.
    /// * `root` is an absolute host path. If it does not exist it will be created.
    ///
    /// If `root` is empty, relative or not a directory, or if it is not writable, error
    /// returns.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        Self::with_permissions(root, PermissionMap::default())
    }

    pub fn with_permissions<P: AsRef<Path>>(root: P, permissions: PermissionMap) -> Result<Self> {
        let root = root.as_ref();

        if root.as_os_str().is_empty() {
            return Err(anyhow!("invalid root path: empty"));
        }
        if root.is_relative() {
            return Err(anyhow!("the root path must be absolute"));
        }
        if root.exists() && !root.is_dir() {
            return Err(anyhow!("{:?} is not a directory", root));
        }

        if !fs::exists(root)? {
            let created = Self::mkdir_all(root)?;
            debug!(root = %root.display(), created = created.len(), "created root directory");
        }

        // check permissions
        if !Self::check_permissions(root) {
            return Err(anyhow!("Access denied: {:?}", root));
        }

        Ok(Self {
            root: root.to_path_buf(),
            permissions,
        })
    }

    /// Returns root path related to the host file system.
    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    /// Returns the host path for canonical `path`.
    fn host(&self, path: &str) -> PathBuf {
        if path.is_empty() {
            self.root.clone()
        } else {
            self.root.join(path)
        }
    }

    /// Make directories recursively.
    /// * `path` is an absolute host path.
    /// Returns vector of created directories.
    fn mkdir_all<P: AsRef<Path>>(path: P) -> Result<Vec<PathBuf>> {
        let host_path = path.as_ref().to_path_buf();

        // Looking for the first existing parent
        let mut existed_part = host_path.clone();
        while let Some(parent) = existed_part.parent() {
            let parent_buf = parent.to_path_buf();
            if fs::exists(parent)? {
                existed_part = parent_buf;
                break;
            }
            existed_part = parent_buf;
        }

        // Create from the closest existing parent to the target path
        let need_to_create: Vec<_> = host_path
            .strip_prefix(&existed_part)?
            .components()
            .collect();

        let mut created = Vec::new();

        let mut built = existed_part;
        for component in need_to_create {
            built.push(component);
            if fs::exists(&built)? {
                if !built.is_dir() {
                    return Err(anyhow!("{} exists but is not a directory", built.display()));
                }
                continue;
            }
            fs::create_dir(&built)
                .with_context(|| format!("unable to create directory {}", built.display()))?;
            created.push(built.clone());
        }

        Ok(created)
    }

    fn check_permissions<P: AsRef<Path>>(path: P) -> bool {
        let filename = path.as_ref().join(".access");
        if fs::write(&filename, b"check").is_err() {
            return false;
        }
        fs::remove_file(filename).is_ok()
    }

    fn visibility_option(config: &Config, key: &str) -> Result<Option<Visibility>> {
        config
            .get(key)
            .map(str::parse::<Visibility>)
            .transpose()
            .with_context(|| format!("invalid `{}` option", key))
    }

    /// Creates `host` and missing parents, giving new directories the requested visibility.
    fn create_directories(&self, host: &Path, visibility: Visibility) -> Result<()> {
        for dir in Self::mkdir_all(host)? {
            self.chmod(&dir, self.permissions.for_directory(visibility))?;
        }
        Ok(())
    }

    /// Parses the visibility options of a write, copy or move.
    fn write_options(&self, config: &Config) -> Result<WriteOptions> {
        Ok(WriteOptions {
            file: Self::visibility_option(config, Config::VISIBILITY)?,
            directory: Self::visibility_option(config, Config::DIRECTORY_VISIBILITY)?
                .unwrap_or(self.permissions.default_for_directories),
        })
    }

    /// Makes sure the parent directory of canonical `path` exists.
    fn ensure_parent(&self, path: &str, visibility: Visibility) -> Result<()> {
        match utils::parent(path) {
            Some(parent) => self.create_directories(&self.host(parent), visibility),
            None => Ok(()),
        }
    }

    fn apply_file_visibility(&self, host: &Path, visibility: Option<Visibility>) -> Result<()> {
        match visibility {
            Some(visibility) => self.chmod(host, self.permissions.for_file(visibility)),
            None => Ok(()),
        }
    }

    #[cfg(unix)]
    fn chmod(&self, host: &Path, mode: u32) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        trace!(path = %host.display(), mode = format_args!("{:o}", mode), "chmod");
        fs::set_permissions(host, fs::Permissions::from_mode(mode))
            .with_context(|| format!("unable to set permissions of {}", host.display()))
    }

    #[cfg(not(unix))]
    fn chmod(&self, _host: &Path, _mode: u32) -> Result<()> {
        Ok(())
    }

    #[cfg(unix)]
    fn visibility_of(&self, metadata: &fs::Metadata) -> Option<Visibility> {
        use std::os::unix::fs::PermissionsExt;

        let mode = metadata.permissions().mode();
        Some(if metadata.is_dir() {
            self.permissions.inverse_for_directory(mode)
        } else {
            self.permissions.inverse_for_file(mode)
        })
    }

    #[cfg(not(unix))]
    fn visibility_of(&self, _metadata: &fs::Metadata) -> Option<Visibility> {
        None
    }

    fn metadata(&self, path: &str) -> Result<fs::Metadata> {
        fs::metadata(self.host(path)).with_context(|| format!("unable to stat {}", path))
    }

    fn file_metadata(&self, path: &str) -> Result<fs::Metadata> {
        let metadata = self.metadata(path)?;
        if metadata.is_dir() {
            return Err(anyhow!("{} is a directory", path));
        }
        Ok(metadata)
    }
}

impl FilesystemAdapter for DirFS {
    fn file_exists(&self, path: &str) -> Result<bool> {
        Ok(self.host(path).is_file())
    }

    /// Creates or truncates the file, creating missing parent directories first.
    fn write(&mut self, path: &str, contents: &[u8], config: &Config) -> Result<()> {
        let options = self.write_options(config)?;
        self.ensure_parent(path, options.directory)?;
        let host = self.host(path);
        fs::write(&host, contents).with_context(|| format!("unable to write {}", path))?;
        self.apply_file_visibility(&host, options.file)
    }

    /// Copies the stream into a hidden sibling first and renames it into place, so a
    /// failing stream leaves the previous file (or no file) behind.
    fn write_stream(
        &mut self,
        path: &str,
        contents: &mut dyn ReadableStream,
        config: &Config,
    ) -> Result<()> {
        let options = self.write_options(config)?;
        self.ensure_parent(path, options.directory)?;
        let host = self.host(path);
        let name = path.rsplit('/').next().unwrap_or(path);
        let partial = host.with_file_name(format!(".{}.part", name));

        let copied = File::create(&partial).and_then(|mut file| {
            io::copy(&mut StreamReader::new(contents), &mut file)?;
            file.sync_all()
        });
        if let Err(e) = copied {
            let _ = fs::remove_file(&partial);
            return Err(e).with_context(|| format!("unable to write {}", path));
        }
        trace!(partial = %partial.display(), "stream copied");

        let replaced = match fs::metadata(&host) {
            Ok(previous) => fs::set_permissions(&partial, previous.permissions()),
            Err(_) => Ok(()),
        }
        .and_then(|()| fs::rename(&partial, &host));
        if let Err(e) = replaced {
            let _ = fs::remove_file(&partial);
            return Err(e).with_context(|| format!("unable to write {}", path));
        }
        self.apply_file_visibility(&host, options.file)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        fs::read(self.host(path)).with_context(|| format!("unable to read {}", path))
    }

    fn read_stream(&self, path: &str) -> Result<Box<dyn ReadableStream>> {
        let file = File::open(self.host(path)).with_context(|| format!("unable to read {}", path))?;
        Ok(Box::new(ResourceStream::new(file.into())?))
    }

    /// Removes a file. A missing file is not an error.
    fn delete(&mut self, path: &str) -> Result<()> {
        match fs::remove_file(self.host(path)) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            result => result.with_context(|| format!("unable to delete {}", path)),
        }
    }

    /// Removes the directory tree. For the root only its contents are removed.
    /// A missing directory is not an error.
    fn delete_directory(&mut self, path: &str) -> Result<()> {
        let host = self.host(path);
        if !fs::exists(&host)? {
            return Ok(());
        }
        if !host.is_dir() {
            return Err(anyhow!("{} is not a directory", path));
        }

        if !path.is_empty() {
            return fs::remove_dir_all(&host)
                .with_context(|| format!("unable to delete directory {}", path));
        }
        for child in fs::read_dir(&host)? {
            let child = child?.path();
            let result = if child.is_dir() {
                fs::remove_dir_all(&child)
            } else {
                fs::remove_file(&child)
            };
            result.with_context(|| format!("unable to delete {}", child.display()))?;
        }
        Ok(())
    }

    fn create_directory(&mut self, path: &str, config: &Config) -> Result<()> {
        let visibility = match Self::visibility_option(config, Config::DIRECTORY_VISIBILITY)? {
            Some(visibility) => Some(visibility),
            None => Self::visibility_option(config, Config::VISIBILITY)?,
        }
        .unwrap_or(self.permissions.default_for_directories);
        self.create_directories(&self.host(path), visibility)
    }

    /// Walks the host tree lazily. A missing directory yields nothing.
    fn list_contents<'a>(
        &'a self,
        path: &str,
        deep: bool,
    ) -> Result<Box<dyn Iterator<Item = Result<Entry>> + 'a>> {
        let mut walker = Walker {
            fs: self,
            stack: Vec::new(),
            deep,
        };
        match fs::read_dir(self.host(path)) {
            Ok(dir) => walker.stack.push(dir),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("unable to list {}", path)),
        }
        Ok(Box::new(walker))
    }

    fn move_file(&mut self, source: &str, destination: &str, config: &Config) -> Result<()> {
        let options = self.write_options(config)?;
        self.ensure_parent(destination, options.directory)?;
        fs::rename(self.host(source), self.host(destination))
            .with_context(|| format!("unable to move {} to {}", source, destination))
    }

    /// Copies a file. Permissions follow the source unless `visibility` is given.
    /// A file copied onto itself is left untouched.
    fn copy_file(&mut self, source: &str, destination: &str, config: &Config) -> Result<()> {
        let options = self.write_options(config)?;
        let host = self.host(destination);
        if source == destination {
            self.file_metadata(source)
                .with_context(|| format!("unable to copy {} to {}", source, destination))?;
            return self.apply_file_visibility(&host, options.file);
        }

        self.ensure_parent(destination, options.directory)?;
        fs::copy(self.host(source), &host)
            .with_context(|| format!("unable to copy {} to {}", source, destination))?;
        self.apply_file_visibility(&host, options.file)
    }

    fn last_modified(&self, path: &str) -> Result<i64> {
        let modified = self.metadata(path)?.modified()?;
        Ok(utils::unix_timestamp(modified))
    }

    fn file_size(&self, path: &str) -> Result<u64> {
        Ok(self.file_metadata(path)?.len())
    }

    /// Sniffs the leading bytes of the file.
    fn mime_type(&self, path: &str) -> Result<String> {
        self.file_metadata(path)?;
        let mut sample = Vec::with_capacity(utils::MIME_SAMPLE_LEN);
        File::open(self.host(path))
            .and_then(|file| file.take(utils::MIME_SAMPLE_LEN as u64).read_to_end(&mut sample))
            .with_context(|| format!("unable to read {}", path))?;
        Ok(utils::detect_mime_type(&sample))
    }

    fn visibility(&self, path: &str) -> Result<String> {
        let metadata = self.metadata(path)?;
        match self.visibility_of(&metadata) {
            Some(visibility) => Ok(visibility.to_string()),
            None => Err(anyhow!("visibility is not supported on this platform")),
        }
    }

    fn set_visibility(&mut self, path: &str, visibility: &str) -> Result<()> {
        let visibility: Visibility = visibility.parse()?;
        if cfg!(not(unix)) {
            return Err(anyhow!("visibility is not supported on this platform"));
        }
        let metadata = self.metadata(path)?;
        let mode = if metadata.is_dir() {
            self.permissions.for_directory(visibility)
        } else {
            self.permissions.for_file(visibility)
        };
        self.chmod(&self.host(path), mode)
    }
}

/// Visibility options of a write, parsed before anything changes on disk.
struct WriteOptions {
    file: Option<Visibility>,
    directory: Visibility,
}

/// Depth-first walk over open `read_dir` handles.
struct Walker<'a> {
    fs: &'a DirFS,
    stack: Vec<ReadDir>,
    deep: bool,
}

impl Walker<'_> {
    fn canonical(&self, host: &Path) -> Result<String> {
        let relative = host.strip_prefix(&self.fs.root)?;
        let segments = relative
            .components()
            .map(|c| {
                c.as_os_str()
                    .to_str()
                    .ok_or_else(|| anyhow!("{} is not a valid UTF-8 name", host.display()))
            })
            .collect::<Result<Vec<&str>>>()?;
        Ok(segments.join("/"))
    }

    fn entry(&mut self, dirent: fs::DirEntry) -> Result<Entry> {
        let host = dirent.path();
        let metadata = dirent
            .metadata()
            .with_context(|| format!("unable to stat {}", host.display()))?;
        let path = self.canonical(&host)?;

        let mut entry = if metadata.is_dir() {
            if self.deep {
                let dir = fs::read_dir(&host)
                    .with_context(|| format!("unable to list {}", path))?;
                self.stack.push(dir);
            }
            Entry::new(path, EntryType::Directory)
        } else {
            Entry::new(path, EntryType::File).with_file_size(metadata.len())
        };
        if let Ok(modified) = metadata.modified() {
            entry = entry.with_last_modified(utils::unix_timestamp(modified));
        }
        if let Some(visibility) = self.fs.visibility_of(&metadata) {
            entry = entry.with_visibility(visibility);
        }
        Ok(entry)
    }
}

impl Iterator for Walker<'_> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            match top.next() {
                None => {
                    self.stack.pop();
                }
                Some(Err(e)) => return Some(Err(e.into())),
                Some(Ok(dirent)) => return Some(self.entry(dirent)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    // Helper function: Creates a temporary directory for tests
    fn setup_test_env() -> TempDir {
        TempDir::new("dirfs_test").unwrap()
    }

    fn sorted_paths(fs: &DirFS, path: &str, deep: bool) -> Result<Vec<String>> {
        let mut paths: Vec<String> = fs
            .list_contents(path, deep)?
            .map(|entry| entry.map(|e| e.path().to_string()))
            .collect::<Result<_>>()?;
        paths.sort();
        Ok(paths)
    }

    #[cfg(unix)]
    fn mode_of(path: &Path) -> u32 {
        use std::os::unix::fs::PermissionsExt;
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    mod creations {
        use super::*;

        #[test]
        fn test_new_absolute_path_existing() {
            let temp_dir = setup_test_env();
            let root = temp_dir.path().to_path_buf();

            let fs = DirFS::new(&root).unwrap();

            assert_eq!(fs.root(), root);
            assert!(!root.join(".access").exists()); // probe file is cleaned up
        }

        #[test]
        fn test_new_nested_nonexistent_path() {
            let temp_dir = setup_test_env();
            let nested = temp_dir.path().join("a/b/c");

            let fs = DirFS::new(&nested).unwrap();

            assert_eq!(fs.root(), nested);
            assert!(nested.is_dir());
        }

        #[test]
        fn test_new_permission_denied() {
            // This test requires a specific environment (e.g. readonly FS)
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;

                let temp_dir = setup_test_env();
                let protected = temp_dir.path().join("protected");
                let protected_root = protected.join("root");
                fs::create_dir_all(&protected_root).unwrap();
                fs::set_permissions(&protected, PermissionsExt::from_mode(0o000)).unwrap(); // No access

                let result = DirFS::new(&protected_root);
                let is_root = fs::read_dir(&protected).is_ok(); // root ignores permissions

                fs::set_permissions(&protected, PermissionsExt::from_mode(0o755)).unwrap(); // Grant access
                if !is_root {
                    assert!(result.is_err());
                }
            }
        }

        #[test]
        fn test_new_root_is_file() {
            let temp_dir = setup_test_env();
            let file_path = temp_dir.path().join("file.txt");
            fs::write(&file_path, "content").unwrap();

            let result = DirFS::new(&file_path);
            assert!(result.is_err()); // Cannot create DirFS on file
        }

        #[test]
        fn test_new_empty_and_relative_path() {
            assert!(DirFS::new("").is_err());
            assert!(DirFS::new("relative/root").is_err());
        }

        #[test]
        fn test_new_special_characters() {
            let temp_dir = setup_test_env();
            let special = temp_dir.path().join("папка с пробелами и юникод!");

            let fs = DirFS::new(&special).unwrap();

            assert_eq!(fs.root(), special);
            assert!(special.exists());
        }
    }

    mod write_read {
        use super::*;
        use std::io::Cursor;

        use crate::stream::Resource;

        #[test]
        fn test_write_creates_parents() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;

            fs.write("a/b/c.txt", b"deep", &Config::default())?;

            assert!(temp_dir.path().join("a/b").is_dir());
            assert_eq!(fs::read(temp_dir.path().join("a/b/c.txt"))?, b"deep");
            assert!(fs.file_exists("a/b/c.txt")?);
            assert!(!fs.file_exists("a/b")?);
            Ok(())
        }

        #[test]
        fn test_write_overwrites() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;

            fs.write("f.txt", b"a much longer first version", &Config::default())?;
            fs.write("f.txt", b"v2", &Config::default())?;

            assert_eq!(fs.read("f.txt")?, b"v2");
            Ok(())
        }

        #[test]
        fn test_write_below_file_fails() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            fs.write("f.txt", b"", &Config::default())?;

            let result = fs.write("f.txt/inner.txt", b"", &Config::default());
            assert!(result.unwrap_err().to_string().contains("not a directory"));
            Ok(())
        }

        #[test]
        fn test_write_stream() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            let data: Vec<u8> = (0..50_000u32).map(|i| (i % 253) as u8).collect();
            let mut stream = ResourceStream::new(Resource::seekable(Cursor::new(data.clone())))?;

            fs.write_stream("big.bin", &mut stream, &Config::default())?;

            assert_eq!(fs::read(temp_dir.path().join("big.bin"))?, data);
            Ok(())
        }

        #[test]
        fn test_read_missing_fails() -> Result<()> {
            let temp_dir = setup_test_env();
            let fs = DirFS::new(temp_dir.path())?;
            let err = fs.read("missing.txt").unwrap_err();
            assert!(err.to_string().contains("unable to read missing.txt"));
            Ok(())
        }

        #[test]
        fn test_read_stream() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            fs.write("s.txt", b"streamed back", &Config::default())?;

            let mut stream = fs.read_stream("s.txt")?;
            assert!(stream.is_seekable());
            assert_eq!(stream.read(8)?, b"streamed");
            assert_eq!(stream.read(100)?, b" back");
            assert!(stream.eof());
            stream.close()?;
            Ok(())
        }

        #[test]
        fn test_unicode_path() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            fs.write("папка/файл.txt", b"hi", &Config::default())?;
            assert!(temp_dir.path().join("папка/файл.txt").exists());
            Ok(())
        }

        #[test]
        fn test_write_invalid_visibility_option() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;

            for key in [Config::VISIBILITY, Config::DIRECTORY_VISIBILITY] {
                let config = Config::new([(key, "hidden")]);
                assert!(fs.write("x/y/a.txt", b"", &config).is_err());
                assert!(fs.copy_file("a.txt", "c/a.txt", &config).is_err());
            }

            assert!(!temp_dir.path().join("x").exists());
            assert!(!temp_dir.path().join("c").exists());
            Ok(())
        }

        #[test]
        fn test_failed_stream_keeps_previous_file() -> Result<()> {
            /// Yields some bytes, then breaks.
            struct Broken(bool);

            impl Read for Broken {
                fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                    if self.0 {
                        return Err(io::Error::other("connection reset"));
                    }
                    self.0 = true;
                    buf[..4].copy_from_slice(b"half");
                    Ok(4)
                }
            }

            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            fs.write("f.txt", b"previous", &Config::default())?;

            let mut stream = ResourceStream::new(Resource::sequential(Broken(false)))?;
            assert!(fs.write_stream("f.txt", &mut stream, &Config::default()).is_err());
            let mut stream = ResourceStream::new(Resource::sequential(Broken(false)))?;
            assert!(fs.write_stream("new.txt", &mut stream, &Config::default()).is_err());

            assert_eq!(fs.read("f.txt")?, b"previous");
            assert!(!fs.file_exists("new.txt")?);
            assert_eq!(fs::read_dir(temp_dir.path())?.count(), 1);
            Ok(())
        }

        #[cfg(unix)]
        #[test]
        fn test_write_stream_keeps_permissions_of_replaced_file() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            fs.write("f.txt", b"v1", &Config::new([(Config::VISIBILITY, "private")]))?;

            let mut stream = ResourceStream::new(Resource::seekable(Cursor::new(b"v2".to_vec())))?;
            fs.write_stream("f.txt", &mut stream, &Config::default())?;

            assert_eq!(fs.read("f.txt")?, b"v2");
            assert_eq!(mode_of(&temp_dir.path().join("f.txt")), 0o600);
            Ok(())
        }
    }

    mod delete {
        use super::*;

        #[test]
        fn test_delete_file() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            fs.write("f.txt", b"", &Config::default())?;

            fs.delete("f.txt")?;

            assert!(!temp_dir.path().join("f.txt").exists());
            Ok(())
        }

        #[test]
        fn test_delete_missing_is_ok() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            fs.delete("missing.txt")?;
            Ok(())
        }

        #[test]
        fn test_delete_directory_tree() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            fs.write("dir/sub/f.txt", b"", &Config::default())?;
            fs.write("keep.txt", b"", &Config::default())?;

            fs.delete_directory("dir")?;

            assert!(!temp_dir.path().join("dir").exists());
            assert!(temp_dir.path().join("keep.txt").exists());
            Ok(())
        }

        #[test]
        fn test_delete_root_keeps_root() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            fs.write("dir/f.txt", b"", &Config::default())?;
            fs.write("top.txt", b"", &Config::default())?;

            fs.delete_directory("")?;

            assert!(temp_dir.path().is_dir());
            assert_eq!(fs::read_dir(temp_dir.path())?.count(), 0);
            Ok(())
        }

        #[test]
        fn test_delete_directory_missing_and_on_file() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            fs.write("f.txt", b"", &Config::default())?;

            fs.delete_directory("nowhere")?;
            assert!(fs.delete_directory("f.txt").is_err());
            Ok(())
        }
    }

    mod list_contents {
        use super::*;

        fn setup_tree() -> (TempDir, DirFS) {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path()).unwrap();
            let config = Config::default();
            fs.create_directory("empty", &config).unwrap();
            fs.write("project/main.rs", b"fn main() {}", &config).unwrap();
            fs.write("project/tests/test.rs", b"#[test] fn it_works() {}", &config)
                .unwrap();
            fs.write("readme.md", b"docs", &config).unwrap();
            (temp_dir, fs)
        }

        #[test]
        fn test_shallow() -> Result<()> {
            let (_temp_dir, fs) = setup_tree();
            assert_eq!(sorted_paths(&fs, "", false)?, ["empty", "project", "readme.md"]);
            assert_eq!(
                sorted_paths(&fs, "project", false)?,
                ["project/main.rs", "project/tests"]
            );
            Ok(())
        }

        #[test]
        fn test_deep() -> Result<()> {
            let (_temp_dir, fs) = setup_tree();
            assert_eq!(
                sorted_paths(&fs, "", true)?,
                [
                    "empty",
                    "project",
                    "project/main.rs",
                    "project/tests",
                    "project/tests/test.rs",
                    "readme.md"
                ]
            );
            Ok(())
        }

        #[test]
        fn test_directory_precedes_its_contents() -> Result<()> {
            let (_temp_dir, fs) = setup_tree();
            let paths: Vec<String> = fs
                .list_contents("project", true)?
                .map(|entry| entry.map(|e| e.path().to_string()))
                .collect::<Result<_>>()?;
            let dir = paths.iter().position(|p| p == "project/tests").unwrap();
            let file = paths.iter().position(|p| p == "project/tests/test.rs").unwrap();
            assert!(dir < file);
            Ok(())
        }

        #[test]
        fn test_entry_attributes() -> Result<()> {
            let (_temp_dir, fs) = setup_tree();
            let entries: Vec<Entry> = fs.list_contents("", false)?.collect::<Result<_>>()?;
            let readme = entries.iter().find(|e| e.path() == "readme.md").unwrap();
            assert!(readme.is_file());
            assert_eq!(readme.file_size(), Some(4));
            assert!(readme.last_modified().is_some());
            let project = entries.iter().find(|e| e.path() == "project").unwrap();
            assert!(project.is_dir());
            assert_eq!(project.file_size(), None);
            Ok(())
        }

        #[test]
        fn test_missing_directory_is_empty() -> Result<()> {
            let (_temp_dir, fs) = setup_tree();
            assert_eq!(fs.list_contents("nowhere", true)?.count(), 0);
            Ok(())
        }

        #[cfg(target_os = "linux")]
        #[test]
        fn test_non_utf8_name_is_an_error() -> Result<()> {
            use std::ffi::OsStr;
            use std::os::unix::ffi::OsStrExt;

            let (temp_dir, fs) = setup_tree();
            fs::write(temp_dir.path().join(OsStr::from_bytes(b"bad\xff")), b"")?;

            let results: Vec<Result<Entry>> = fs.list_contents("", false)?.collect();
            assert_eq!(results.len(), 4);
            let failures: Vec<_> = results.iter().filter(|r| r.is_err()).collect();
            assert_eq!(failures.len(), 1);
            Ok(())
        }
    }

    mod move_copy {
        use super::*;

        #[test]
        fn test_move_into_new_directory() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            fs.write("a.txt", b"moved", &Config::default())?;

            fs.move_file("a.txt", "archive/2024/a.txt", &Config::default())?;

            assert!(!temp_dir.path().join("a.txt").exists());
            assert_eq!(fs.read("archive/2024/a.txt")?, b"moved");
            Ok(())
        }

        #[test]
        fn test_move_missing_source_fails() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            let err = fs.move_file("ghost", "b", &Config::default()).unwrap_err();
            assert!(err.to_string().contains("unable to move ghost to b"));
            Ok(())
        }

        #[test]
        fn test_copy() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            fs.write("a.txt", b"copied", &Config::default())?;

            fs.copy_file("a.txt", "backup/a.txt", &Config::default())?;

            assert_eq!(fs.read("a.txt")?, b"copied");
            assert_eq!(fs.read("backup/a.txt")?, b"copied");
            Ok(())
        }

        #[test]
        fn test_copy_onto_itself_keeps_content() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            fs.write("a.txt", b"precious", &Config::default())?;

            fs.copy_file("a.txt", "a.txt", &Config::default())?;

            assert_eq!(fs.read("a.txt")?, b"precious");
            Ok(())
        }

        #[test]
        fn test_copy_missing_onto_itself_fails() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            assert!(fs.copy_file("ghost", "ghost", &Config::default()).is_err());
            Ok(())
        }
    }

    mod metadata {
        use super::*;

        #[test]
        fn test_file_size() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            fs.write("dir/f.bin", &[0u8; 321], &Config::default())?;

            assert_eq!(fs.file_size("dir/f.bin")?, 321);
            assert!(fs.file_size("dir").unwrap_err().to_string().contains("is a directory"));
            assert!(fs.file_size("nope").is_err());
            Ok(())
        }

        #[test]
        fn test_last_modified() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            fs.write("f.txt", b"", &Config::default())?;

            let expected = utils::unix_timestamp(fs::metadata(temp_dir.path().join("f.txt"))?.modified()?);
            assert_eq!(fs.last_modified("f.txt")?, expected);
            Ok(())
        }

        #[test]
        fn test_mime_type() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            fs.write("notes", b"just text", &Config::default())?;
            fs.write("image", &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0], &Config::default())?;

            assert_eq!(fs.mime_type("notes")?, "text/plain");
            assert_eq!(fs.mime_type("image")?, "image/png");
            Ok(())
        }
    }

    #[cfg(unix)]
    mod visibility {
        use super::*;

        #[test]
        fn test_write_with_visibility() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            let config = Config::new([
                (Config::VISIBILITY, "private"),
                (Config::DIRECTORY_VISIBILITY, "private"),
            ]);

            fs.write("vault/key.pem", b"k", &config)?;

            assert_eq!(mode_of(&temp_dir.path().join("vault/key.pem")), 0o600);
            assert_eq!(mode_of(&temp_dir.path().join("vault")), 0o700);
            assert_eq!(fs.visibility("vault/key.pem")?, "private");
            assert_eq!(fs.visibility("vault")?, "private");
            Ok(())
        }

        #[test]
        fn test_set_visibility() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            fs.write("f.txt", b"", &Config::default())?;
            fs.create_directory("d", &Config::default())?;

            fs.set_visibility("f.txt", "private")?;
            fs.set_visibility("d", "private")?;
            assert_eq!(mode_of(&temp_dir.path().join("f.txt")), 0o600);
            assert_eq!(mode_of(&temp_dir.path().join("d")), 0o700);

            fs.set_visibility("f.txt", "public")?;
            assert_eq!(fs.visibility("f.txt")?, "public");
            assert_eq!(mode_of(&temp_dir.path().join("f.txt")), 0o644);
            Ok(())
        }

        #[test]
        fn test_set_visibility_rejects_unknown_value() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            fs.write("f.txt", b"", &Config::default())?;
            assert!(fs.set_visibility("f.txt", "everyone").is_err());
            Ok(())
        }

        #[test]
        fn test_custom_permission_map() -> Result<()> {
            let temp_dir = setup_test_env();
            let permissions = PermissionMap {
                file_private: 0o640,
                ..PermissionMap::default()
            };
            let mut fs = DirFS::with_permissions(temp_dir.path(), permissions)?;
            fs.write("f.txt", b"", &Config::new([(Config::VISIBILITY, "private")]))?;
            assert_eq!(mode_of(&temp_dir.path().join("f.txt")), 0o640);
            assert_eq!(fs.visibility("f.txt")?, "private");
            Ok(())
        }

        #[test]
        fn test_create_directory_visibility() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            fs.create_directory("a/b", &Config::new([(Config::VISIBILITY, "private")]))?;
            assert_eq!(mode_of(&temp_dir.path().join("a")), 0o700);
            assert_eq!(mode_of(&temp_dir.path().join("a/b")), 0o700);
            Ok(())
        }

        #[test]
        fn test_copy_visibility_option() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            fs.write("a.txt", b"", &Config::default())?;
            fs.copy_file("a.txt", "b.txt", &Config::new([(Config::VISIBILITY, "private")]))?;
            assert_eq!(mode_of(&temp_dir.path().join("b.txt")), 0o600);
            Ok(())
        }
    }
}
