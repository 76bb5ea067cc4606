use crate::config::Visibility;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EntryType {
    File,
    Directory,
}

/// A single record of a directory listing.
///
/// `path` is canonical (relative to the backend root, `/`-separated). Attributes a
/// backend could not determine cheaply while listing are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    path: String,
    entry_type: EntryType,
    file_size: Option<u64>,
    last_modified: Option<i64>,
    visibility: Option<Visibility>,
}

impl Entry {
    pub fn new<P: Into<String>>(path: P, entry_type: EntryType) -> Entry {
        Entry {
            path: path.into(),
            entry_type,
            file_size: None,
            last_modified: None,
            visibility: None,
        }
    }

    pub fn file<P: Into<String>>(path: P) -> Entry {
        Entry::new(path, EntryType::File)
    }

    pub fn directory<P: Into<String>>(path: P) -> Entry {
        Entry::new(path, EntryType::Directory)
    }

    pub fn with_file_size(mut self, size: u64) -> Entry {
        self.file_size = Some(size);
        self
    }

    pub fn with_last_modified(mut self, timestamp: i64) -> Entry {
        self.last_modified = Some(timestamp);
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Entry {
        self.visibility = Some(visibility);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    pub fn is_file(&self) -> bool {
        self.entry_type == EntryType::File
    }

    pub fn is_dir(&self) -> bool {
        self.entry_type == EntryType::Directory
    }

    pub fn file_size(&self) -> Option<u64> {
        self.file_size
    }

    pub fn last_modified(&self) -> Option<i64> {
        self.last_modified
    }

    pub fn visibility(&self) -> Option<Visibility> {
        self.visibility
    }
}
