//! A small filesystem facade with pluggable storage backends.
//!
//! ### Overview
//!
//! `vfs-facade` gives application code one API for files and directories, whatever actually
//! stores them. Callers talk to a [`Filesystem`]; it cleans up the path, merges per-call
//! options over its defaults and hands the request to a [`FilesystemAdapter`].
//!
//! **Key ideas**:
//! - **Canonical paths**: `"  /foo//./bar.txt "` and `"foo/bar.txt"` name the same file.
//!   Paths that climb above the root or carry a null byte are refused before any backend
//!   sees them.
//! - **Pluggable storage**: [`DirFS`] maps paths onto a host directory, [`MapFS`] keeps
//!   everything in memory. Implement [`FilesystemAdapter`] to add your own.
//! - **Streams**: [`ReadableStream`] lets large content flow through without buffering it
//!   whole; [`ResourceStream`] adapts files and any `Read` source.
//! - **Options**: [`Config`] carries string options such as `visibility`.
//!
//! ```
//! use vfs_facade::{Config, Filesystem, MapFS};
//!
//! let mut fs = Filesystem::new(MapFS::new());
//! fs.write("  docs//readme.md ", b"# Hello", Config::default()).unwrap();
//! assert_eq!(fs.read("docs/readme.md").unwrap(), b"# Hello");
//! ```

mod config;
mod core;
mod filesystem;
mod listing;
mod path;
mod stream;
mod vfs;

pub use config::{Config, Visibility};
pub use crate::core::{Error, FilesystemAdapter, Result};
pub use filesystem::{Contents, Filesystem};
pub use listing::DirectoryListing;
pub use path::{PathNormalizer, WhitespacePathNormalizer};
pub use stream::{ReadSeek, ReadableStream, Resource, ResourceStream, StreamReader};
pub use vfs::{DirFS, Entry, EntryType, MapFS, PermissionMap};
