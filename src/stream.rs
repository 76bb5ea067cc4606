//! Uniform, rewindable view over arbitrary byte sources.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

use anyhow::anyhow;

use crate::core::{Error, Result};

/// Upper bound on the buffer reserved ahead of a `read`.
const READ_CHUNK: usize = 8192;

/// The capability set backends use to consume content, whatever its origin.
pub trait ReadableStream {
    /// Releases the underlying source. Closing twice is an error.
    fn close(&mut self) -> Result<()>;

    /// Whether the last `read` hit the end of data.
    fn eof(&self) -> bool;

    /// Reads up to `length` bytes. A short result means the end of data was reached.
    fn read(&mut self, length: usize) -> Result<Vec<u8>>;

    /// Moves back to the first byte. Does nothing on a non-seekable source.
    fn rewind(&mut self) -> Result<()>;

    fn is_seekable(&self) -> bool;
}

impl<T: ReadableStream + ?Sized> ReadableStream for Box<T> {
    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn eof(&self) -> bool {
        (**self).eof()
    }

    fn read(&mut self, length: usize) -> Result<Vec<u8>> {
        (**self).read(length)
    }

    fn rewind(&mut self) -> Result<()> {
        (**self).rewind()
    }

    fn is_seekable(&self) -> bool {
        (**self).is_seekable()
    }
}

pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// A raw byte source, before it is wrapped into a [`ResourceStream`].
pub enum Resource {
    /// An OS file handle. Seekable only when it refers to a regular file.
    File(File),
    /// Any seekable reader, e.g. `std::io::Cursor`.
    Seekable(Box<dyn ReadSeek>),
    /// A read-once source such as a network body or a pipe.
    Sequential(Box<dyn Read>),
}

impl Resource {
    pub fn seekable<R: Read + Seek + 'static>(reader: R) -> Self {
        Resource::Seekable(Box::new(reader))
    }

    pub fn sequential<R: Read + 'static>(reader: R) -> Self {
        Resource::Sequential(Box::new(reader))
    }

    fn reader(&mut self) -> &mut dyn Read {
        match self {
            Resource::File(file) => file,
            Resource::Seekable(reader) => reader,
            Resource::Sequential(reader) => reader,
        }
    }

    fn position(&mut self) -> io::Result<u64> {
        match self {
            Resource::File(file) => file.stream_position(),
            Resource::Seekable(reader) => reader.stream_position(),
            Resource::Sequential(_) => Err(io::ErrorKind::Unsupported.into()),
        }
    }

    fn seek_to_origin(&mut self) -> io::Result<u64> {
        match self {
            Resource::File(file) => file.seek(SeekFrom::Start(0)),
            Resource::Seekable(reader) => reader.seek(SeekFrom::Start(0)),
            Resource::Sequential(_) => Err(io::ErrorKind::Unsupported.into()),
        }
    }
}

impl From<File> for Resource {
    fn from(file: File) -> Self {
        Resource::File(file)
    }
}

/// [`ReadableStream`] over an exclusively owned [`Resource`].
pub struct ResourceStream {
    resource: Option<Resource>, // None once closed
    seekable: bool,
    eof: bool,
}

impl ResourceStream {
    /// Validates `resource` and takes ownership of it.
    ///
    /// Fails with [`Error::InvalidStreamProvided`] for a file handle whose metadata cannot
    /// be read, for a directory handle, and for a seekable source that cannot report its
    /// position.
    pub fn new(resource: Resource) -> Result<Self> {
        let mut resource = resource;
        let seekable = match &mut resource {
            Resource::File(file) => {
                let metadata = file.metadata().map_err(|e| {
                    Error::InvalidStreamProvided(format!("an unusable file handle ({})", e))
                })?;
                if metadata.is_dir() {
                    return Err(Error::InvalidStreamProvided("a directory handle".into()).into());
                }
                metadata.is_file()
            }
            Resource::Seekable(_) => true,
            Resource::Sequential(_) => false,
        };

        if seekable {
            resource.position().map_err(|e| {
                Error::InvalidStreamProvided(format!(
                    "a seekable source that cannot report its position ({})",
                    e
                ))
            })?;
        }

        Ok(Self {
            resource: Some(resource),
            seekable,
            eof: false,
        })
    }

    fn resource(&mut self) -> Result<&mut Resource> {
        self.resource
            .as_mut()
            .ok_or_else(|| anyhow!("stream is already closed"))
    }
}

impl ReadableStream for ResourceStream {
    fn close(&mut self) -> Result<()> {
        match self.resource.take() {
            Some(resource) => {
                drop(resource);
                Ok(())
            }
            None => Err(anyhow!("stream is already closed")),
        }
    }

    fn eof(&self) -> bool {
        self.eof
    }

    fn read(&mut self, length: usize) -> Result<Vec<u8>> {
        let reader = self.resource()?.reader();
        // The buffer grows with what the source yields, not with `length`.
        let mut buf = Vec::with_capacity(length.min(READ_CHUNK));
        let filled = reader
            .take(u64::try_from(length).unwrap_or(u64::MAX))
            .read_to_end(&mut buf)?;
        if filled < length {
            self.eof = true;
        }
        Ok(buf)
    }

    fn rewind(&mut self) -> Result<()> {
        if !self.seekable {
            return Ok(());
        }
        let resource = self.resource()?;
        if resource.position()? != 0 {
            resource.seek_to_origin()?;
        }
        self.eof = false;
        Ok(())
    }

    fn is_seekable(&self) -> bool {
        self.seekable
    }
}

/// Adapts a [`ReadableStream`] to [`std::io::Read`].
pub struct StreamReader<'a> {
    stream: &'a mut dyn ReadableStream,
}

impl<'a> StreamReader<'a> {
    pub fn new(stream: &'a mut dyn ReadableStream) -> Self {
        Self { stream }
    }
}

impl Read for StreamReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.stream.eof() {
            return Ok(0);
        }
        let chunk = self.stream.read(buf.len()).map_err(io::Error::other)?;
        buf[..chunk.len()].copy_from_slice(&chunk);
        Ok(chunk.len())
    }
}
