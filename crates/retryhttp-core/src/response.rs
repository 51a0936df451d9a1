//! HTTP responses as returned by a transport.

use std::fmt;
use std::io::{self, Cursor, Read};

use crate::request::Headers;

/// Status line, headers and a body stream.
///
/// A status of `0` means the transport got no usable status code.
pub struct Response {
    status: u32,
    headers: Headers,
    body: Box<dyn Read + Send + Sync>,
}

impl Response {
    pub fn new<R>(status: u32, headers: Headers, body: R) -> Self
    where
        R: Read + Send + Sync + 'static,
    {
        Self {
            status,
            headers,
            body: Box::new(body),
        }
    }

    pub fn from_bytes(status: u32, headers: Headers, body: impl Into<Vec<u8>>) -> Self {
        Self::new(status, headers, Cursor::new(body.into()))
    }

    pub fn status(&self) -> u32 {
        self.status
    }

    /// 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn content_length(&self) -> Option<u64> {
        self.headers.content_length()
    }

    pub fn body_mut(&mut self) -> &mut (dyn Read + Send + Sync) {
        self.body.as_mut()
    }

    pub fn into_body(self) -> Box<dyn Read + Send + Sync> {
        self.body
    }

    /// Reads the rest of the body into memory.
    pub fn bytes(mut self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.body.read_to_end(&mut out)?;
        Ok(out)
    }

    /// Reads the rest of the body as UTF-8 text.
    pub fn text(self) -> io::Result<String> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Reads and discards at most `limit` bytes, then drops the body.
    /// Anything past the limit is discarded without being read.
    pub(crate) fn drain(mut self, limit: u64) -> io::Result<u64> {
        io::copy(&mut self.body.as_mut().take(limit), &mut io::sink())
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}
