use crate::core::Result;
use crate::vfs::Entry;

/// Lazy, forward-only result of [`Filesystem::list_contents`](crate::Filesystem::list_contents).
///
/// Entries are pulled from the backend one at a time; nothing is materialized unless
/// [`sort_by_path`](Self::sort_by_path) or [`to_vec`](Self::to_vec) is called. To start
/// over, list again.
pub struct DirectoryListing<'a> {
    entries: Box<dyn Iterator<Item = Result<Entry>> + 'a>,
}

impl<'a> DirectoryListing<'a> {
    pub fn new<I>(entries: I) -> Self
    where
        I: Iterator<Item = Result<Entry>> + 'a,
    {
        Self {
            entries: Box::new(entries),
        }
    }

    /// Keeps the entries matching `predicate`. Errors are always passed through.
    pub fn filter<F>(self, mut predicate: F) -> DirectoryListing<'a>
    where
        F: FnMut(&Entry) -> bool + 'a,
    {
        DirectoryListing::new(self.entries.filter(move |item| match item {
            Ok(entry) => predicate(entry),
            Err(_) => true,
        }))
    }

    pub fn map<T, F>(self, mut f: F) -> impl Iterator<Item = Result<T>> + 'a
    where
        T: 'a,
        F: FnMut(Entry) -> T + 'a,
    {
        self.entries.map(move |item| item.map(&mut f))
    }

    /// Collects every entry and orders them by path. Stops at the first error.
    pub fn sort_by_path(self) -> Result<DirectoryListing<'a>> {
        let mut entries = self.to_vec()?;
        entries.sort_by(|a, b| a.path().cmp(b.path()));
        Ok(DirectoryListing::new(entries.into_iter().map(Ok)))
    }

    /// Collects every entry. Stops at the first error.
    pub fn to_vec(self) -> Result<Vec<Entry>> {
        self.entries.collect()
    }
}

impl Iterator for DirectoryListing<'_> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }
}
