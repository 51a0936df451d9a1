//! Rewindable request bodies.
//!
//! A [`Body`] can always be seeked back to its first byte. Seekable sources
//! (files, cursors) are used as-is; anything else is read into memory once,
//! up front, so every attempt sees the same bytes.

use std::fmt;
use std::io::{self, Cursor, Read, Seek, SeekFrom};

use crate::retry::Error;

/// Reader that can also seek. Blanket-implemented for every `Read + Seek + Send`.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send + ?Sized> ReadSeek for T {}

/// Request payload that can be replayed from the start before each attempt.
pub struct Body {
    inner: Box<dyn ReadSeek>,
    len: Option<u64>,
}

impl Body {
    /// In-memory body with a known length.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let len = bytes.len() as u64;
        Self {
            inner: Box::new(Cursor::new(bytes)),
            len: Some(len),
        }
    }

    /// Wraps a seekable source. The length is measured by seeking to the end,
    /// so the transport can send `Content-Length` instead of chunking.
    pub fn from_seekable<R>(mut reader: R) -> Result<Self, Error>
    where
        R: Read + Seek + Send + 'static,
    {
        let len = reader.seek(SeekFrom::End(0)).map_err(Error::BodyRead)?;
        reader.seek(SeekFrom::Start(0)).map_err(Error::BodyRead)?;
        Ok(Self {
            inner: Box::new(reader),
            len: Some(len),
        })
    }

    /// Wraps a seekable source whose length the caller already knows
    /// (e.g. from file metadata). Nothing is read or seeked here.
    pub fn from_seekable_with_len<R>(reader: R, len: u64) -> Self
    where
        R: Read + Seek + Send + 'static,
    {
        Self {
            inner: Box::new(reader),
            len: Some(len),
        }
    }

    /// Buffers a non-seekable reader fully into memory.
    ///
    /// Fails with [`Error::BodyRead`] if the read fails; in that case no
    /// request is ever sent.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, Error> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).map_err(Error::BodyRead)?;
        Ok(Self::from_bytes(buf))
    }

    /// Body length in bytes, if known.
    pub fn len(&self) -> Option<u64> {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == Some(0)
    }

    /// Seek back to the first byte.
    pub(crate) fn rewind(&mut self) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(0)).map(|_| ())
    }
}

impl Read for Body {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body").field("len", &self.len).finish_non_exhaustive()
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Self::from_bytes(s.into_bytes())
    }
}

impl From<&str> for Body {
    fn from(s: &str) -> Self {
        Self::from_bytes(s.as_bytes().to_vec())
    }
}

impl From<&[u8]> for Body {
    fn from(bytes: &[u8]) -> Self {
        Self::from_bytes(bytes.to_vec())
    }
}
