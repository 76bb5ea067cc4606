//! This module provides a storage backend that keeps every file and directory in memory.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::ops::Bound;
use std::time::SystemTime;

use anyhow::{Context, anyhow};

use crate::config::{Config, Visibility};
use crate::core::{FilesystemAdapter, Result, utils};
use crate::stream::{ReadableStream, Resource, ResourceStream, StreamReader};
use crate::{Entry, EntryType};

struct Node {
    entry_type: EntryType,
    content: Vec<u8>,
    visibility: Visibility,
    last_modified: i64,
}

impl Node {
    fn directory(visibility: Visibility) -> Self {
        Self {
            entry_type: EntryType::Directory,
            content: Vec::new(),
            visibility,
            last_modified: utils::unix_timestamp(SystemTime::now()),
        }
    }

    fn file(content: Vec<u8>, visibility: Visibility) -> Self {
        Self {
            entry_type: EntryType::File,
            content,
            visibility,
            last_modified: utils::unix_timestamp(SystemTime::now()),
        }
    }

    fn is_dir(&self) -> bool {
        self.entry_type == EntryType::Directory
    }

    fn to_entry(&self, path: &str) -> Entry {
        let entry = Entry::new(path, self.entry_type)
            .with_last_modified(self.last_modified)
            .with_visibility(self.visibility);
        match self.entry_type {
            EntryType::File => entry.with_file_size(self.content.len() as u64),
            EntryType::Directory => entry,
        }
    }
}

/// A storage backend that keeps files and directories in an ordered in-process map.
///
/// `MapFS` never touches the host filesystem, which makes it the natural backend for tests
/// and scratch data.
///
/// ### Internal state
///
/// * `entries`: the map of every file and directory.
///   - Key: canonical path (`docs/note.txt`); the root is `""`.
///   - Value: node with type, content (files only), visibility and modification time.
///   - A `BTreeMap` gives ordered, prefix-friendly traversal, so listings can be
///     produced lazily by walking a key range.
///
/// ### Invariants
///
/// 1. **Root existence**: `""` is always present and is a directory.
/// 2. **Parent consistency**: for any entry `a/b/c` there is a directory entry `a/b`.
///    Writing a file creates missing parents.
/// 3. **Uniqueness**: a path is either a file or a directory, never both.
///
/// ### Thread Safety
///
/// Not thread-safe. Wrap the owning [`Filesystem`](crate::Filesystem) in a `Mutex` if it
/// is shared between threads.
///
/// ### Example
///
/// ```
/// use vfs_facade::{Config, Filesystem, MapFS};
///
/// let mut fs = Filesystem::new(MapFS::new());
/// fs.write("/docs/note.txt", b"Hello", Config::default()).unwrap();
///
/// assert!(fs.file_exists("docs/note.txt").unwrap());
///
/// fs.delete("docs/note.txt").unwrap();
/// assert!(!fs.file_exists("docs/note.txt").unwrap());
/// ```
pub struct MapFS {
    entries: BTreeMap<String, Node>,
}

impl MapFS {
    /// Creates an empty `MapFS` holding only the root directory.
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(String::new(), Node::directory(Visibility::Public));
        Self { entries }
    }

    #[cfg(test)]
    fn exists(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    fn file(&self, path: &str) -> Result<&Node> {
        match self.entries.get(path) {
            Some(node) if node.is_dir() => Err(anyhow!("{} is a directory", path)),
            Some(node) => Ok(node),
            None => Err(anyhow!("{} does not exist", path)),
        }
    }

    fn visibility_option(config: &Config, key: &str) -> Result<Option<Visibility>> {
        config
            .get(key)
            .map(str::parse::<Visibility>)
            .transpose()
            .with_context(|| format!("invalid `{}` option", key))
    }

    /// Creates `path` and all its parents (if needed).
    fn mkdir_all(&mut self, path: &str, visibility: Visibility) -> Result<()> {
        let mut built = String::new();
        for component in path.split('/').filter(|c| !c.is_empty()) {
            if !built.is_empty() {
                built.push('/');
            }
            built.push_str(component);
            match self.entries.get(&built) {
                Some(node) if !node.is_dir() => {
                    return Err(anyhow!("{} exists but is not a directory", built));
                }
                Some(_) => {}
                None => {
                    self.entries.insert(built.clone(), Node::directory(visibility));
                }
            }
        }
        Ok(())
    }

    fn put_file(&mut self, path: &str, content: Vec<u8>, config: &Config) -> Result<()> {
        // options are validated before anything is touched
        let file_visibility = Self::visibility_option(config, Config::VISIBILITY)?;
        let directory_visibility =
            Self::visibility_option(config, Config::DIRECTORY_VISIBILITY)?.unwrap_or_default();

        if let Some(node) = self.entries.get(path) {
            if node.is_dir() {
                return Err(anyhow!("{} is a directory", path));
            }
        }
        if let Some(parent) = utils::parent(path) {
            self.mkdir_all(parent, directory_visibility)?;
        }

        let visibility = match file_visibility {
            Some(visibility) => visibility,
            None => self
                .entries
                .get(path)
                .map(|node| node.visibility)
                .unwrap_or_default(),
        };
        self.entries
            .insert(path.to_string(), Node::file(content, visibility));
        Ok(())
    }
}

impl Default for MapFS {
    fn default() -> Self {
        Self::new()
    }
}

impl FilesystemAdapter for MapFS {
    fn file_exists(&self, path: &str) -> Result<bool> {
        Ok(self.entries.get(path).is_some_and(|node| !node.is_dir()))
    }

    /// Creates or replaces the file; missing parent directories are created.
    /// Keeps the previous visibility of a replaced file unless `visibility` is given.
    fn write(&mut self, path: &str, contents: &[u8], config: &Config) -> Result<()> {
        self.put_file(path, contents.to_vec(), config)
    }

    fn write_stream(
        &mut self,
        path: &str,
        contents: &mut dyn ReadableStream,
        config: &Config,
    ) -> Result<()> {
        let mut content = Vec::new();
        StreamReader::new(contents)
            .read_to_end(&mut content)
            .with_context(|| format!("unable to read stream for {}", path))?;
        self.put_file(path, content, config)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        Ok(self.file(path)?.content.clone())
    }

    fn read_stream(&self, path: &str) -> Result<Box<dyn ReadableStream>> {
        let content = self.file(path)?.content.clone();
        let stream = ResourceStream::new(Resource::seekable(Cursor::new(content)))?;
        Ok(Box::new(stream))
    }

    /// Removes a file. A missing file is not an error.
    fn delete(&mut self, path: &str) -> Result<()> {
        match self.entries.get(path) {
            Some(node) if node.is_dir() => Err(anyhow!("{} is a directory", path)),
            Some(_) => {
                self.entries.remove(path);
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Removes a directory with everything below it. Deleting the root empties the
    /// filesystem but keeps the root itself. A missing directory is not an error.
    fn delete_directory(&mut self, path: &str) -> Result<()> {
        match self.entries.get(path) {
            Some(node) if !node.is_dir() => return Err(anyhow!("{} is not a directory", path)),
            Some(_) => {}
            None => return Ok(()),
        }

        let removed: Vec<String> = self
            .entries
            .keys()
            .filter(|&key| utils::is_descendant(key, path))
            .cloned()
            .collect();
        for key in &removed {
            self.entries.remove(key);
        }
        if !path.is_empty() {
            self.entries.remove(path);
        }
        Ok(())
    }

    /// Creates directory and all its parents (if needed). An existing directory is left
    /// as is.
    fn create_directory(&mut self, path: &str, config: &Config) -> Result<()> {
        let visibility = match Self::visibility_option(config, Config::DIRECTORY_VISIBILITY)? {
            Some(visibility) => visibility,
            None => Self::visibility_option(config, Config::VISIBILITY)?.unwrap_or_default(),
        };
        self.mkdir_all(path, visibility)
    }

    /// Walks the key range below `path`. Nothing is collected up front; a missing
    /// directory simply yields nothing.
    fn list_contents<'a>(
        &'a self,
        path: &str,
        deep: bool,
    ) -> Result<Box<dyn Iterator<Item = Result<Entry>> + 'a>> {
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{}/", path)
        };
        let start = prefix.clone();

        let entries = self
            .entries
            .range::<str, _>((Bound::Included(start.as_str()), Bound::Unbounded))
            .take_while(move |(key, _)| key.starts_with(&prefix))
            .filter(move |(key, _)| {
                !key.is_empty() && (deep || !key[start.len()..].contains('/'))
            })
            .map(|(key, node)| -> Result<Entry> { Ok(node.to_entry(key)) });

        Ok(Box::new(entries))
    }

    fn move_file(&mut self, source: &str, destination: &str, config: &Config) -> Result<()> {
        if source == destination {
            self.file(source)?;
            return Ok(());
        }
        self.copy_file(source, destination, config)?;
        self.entries.remove(source);
        Ok(())
    }

    /// Copies a file. The copy takes `visibility` from the options, or from the source.
    fn copy_file(&mut self, source: &str, destination: &str, config: &Config) -> Result<()> {
        let node = self
            .file(source)
            .with_context(|| format!("unable to copy {} to {}", source, destination))?;
        let content = node.content.clone();
        let config = match config.get(Config::VISIBILITY) {
            Some(_) => config.clone(),
            None => config.with(Config::VISIBILITY, node.visibility.as_str()),
        };
        self.put_file(destination, content, &config)
    }

    fn last_modified(&self, path: &str) -> Result<i64> {
        Ok(self.file(path)?.last_modified)
    }

    fn file_size(&self, path: &str) -> Result<u64> {
        Ok(self.file(path)?.content.len() as u64)
    }

    fn mime_type(&self, path: &str) -> Result<String> {
        Ok(utils::detect_mime_type(&self.file(path)?.content))
    }

    fn visibility(&self, path: &str) -> Result<String> {
        match self.entries.get(path) {
            Some(node) => Ok(node.visibility.to_string()),
            None => Err(anyhow!("{} does not exist", path)),
        }
    }

    fn set_visibility(&mut self, path: &str, visibility: &str) -> Result<()> {
        let visibility: Visibility = visibility.parse()?;
        match self.entries.get_mut(path) {
            Some(node) => {
                node.visibility = visibility;
                Ok(())
            }
            None => Err(anyhow!("{} does not exist", path)),
        }
    }
}
