//! One curl transfer on its own thread, with the response body streamed back.
//!
//! The calling thread keeps the request body and feeds it to the transfer on
//! demand, then returns a [`Response`] as soon as the final status line and
//! headers are in. Body bytes travel through a bounded channel, so a reader
//! that stops early (or drops the response) stops the transfer as well.

use std::io::{self, Cursor, Read};
use std::str;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Mutex, PoisonError};

use ::curl::easy::{Handler, ReadError, WriteError};

use super::parse::{parse_header_lines, parse_status_code};
use super::{TransportError, TransportErrorKind};
use crate::body::Body;
use crate::cancel::CancelToken;
use crate::response::Response;

/// Body chunks buffered ahead of the reader. curl hands over at most 16 KiB
/// per write, so this bounds memory per transfer to a few hundred KiB.
const CHUNK_QUEUE: usize = 16;

/// Transfer thread to caller, until the response head is out.
enum Setup {
    /// Wants up to this many more request body bytes.
    Upload(usize),
    Head { status: u32, lines: Vec<String> },
    Failed(TransportError),
}

enum Chunk {
    Data(Vec<u8>),
    End,
    Failed(io::Error),
}

/// curl callbacks for one transfer. Pooled handles hold the default (unlinked) state.
#[derive(Default)]
pub(super) struct StreamHandler {
    setup: Option<SyncSender<Setup>>,
    upload: Option<Receiver<io::Result<Vec<u8>>>>,
    chunks: Option<SyncSender<Chunk>>,
    cancel: CancelToken,
    header_lines: Vec<String>,
    head_sent: bool,
    upload_error: Option<io::Error>,
}

impl StreamHandler {
    /// Sends the response head; false once the caller has gone away.
    fn send_head(&mut self, status: u32) -> bool {
        self.head_sent = true;
        let lines = std::mem::take(&mut self.header_lines);
        match &self.setup {
            Some(tx) => tx.send(Setup::Head { status, lines }).is_ok(),
            None => false,
        }
    }

    /// Reports how `perform` ended. `status` is curl's final response code.
    /// Returns true when the handle is fit for reuse.
    pub(super) fn finish(
        &mut self,
        status: u32,
        performed: Result<(), ::curl::Error>,
    ) -> bool {
        let upload_error = self.upload_error.take();
        let result = performed.map_err(|e| match upload_error {
            Some(io_err) => TransportError::new(TransportErrorKind::Io, io_err),
            None => e.into(),
        });
        match result {
            Ok(()) => {
                if !self.head_sent && !self.send_head(status) {
                    return true;
                }
                if let Some(tx) = &self.chunks {
                    let _ = tx.send(Chunk::End);
                }
                true
            }
            Err(e) if self.head_sent => {
                if let Some(tx) = &self.chunks {
                    let _ = tx.send(Chunk::Failed(io::Error::new(io::ErrorKind::Other, e)));
                }
                false
            }
            Err(e) => {
                if let Some(tx) = &self.setup {
                    let _ = tx.send(Setup::Failed(e));
                }
                false
            }
        }
    }
}

impl Handler for StreamHandler {
    fn header(&mut self, data: &[u8]) -> bool {
        if let Ok(s) = str::from_utf8(data) {
            let line = s.trim_end();
            // New status line: a redirect hop or a 1xx; keep only the last response.
            if line.starts_with("HTTP/") {
                self.header_lines.clear();
            }
            self.header_lines.push(line.to_string());
        }
        true
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        if !self.head_sent {
            let status = parse_status_code(&self.header_lines).unwrap_or(0);
            if !self.send_head(status) {
                return Ok(0);
            }
        }
        match &self.chunks {
            Some(tx) if tx.send(Chunk::Data(data.to_vec())).is_ok() => Ok(data.len()),
            // Reader dropped: a short write makes curl abort the transfer.
            _ => Ok(0),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        let (Some(setup), Some(upload)) = (&self.setup, &self.upload) else {
            return Ok(0);
        };
        if setup.send(Setup::Upload(buf.len())).is_err() {
            return Err(ReadError::Abort);
        }
        match upload.recv() {
            Ok(Ok(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Ok(Err(e)) => {
                self.upload_error = Some(e);
                Err(ReadError::Abort)
            }
            Err(_) => Err(ReadError::Abort),
        }
    }

    fn progress(&mut self, _dltotal: f64, _dlnow: f64, _ultotal: f64, _ulnow: f64) -> bool {
        !self.cancel.is_cancelled()
    }
}

/// Calling-thread ends of the channels to one transfer.
pub(super) struct TransferLink {
    setup: Receiver<Setup>,
    upload: SyncSender<io::Result<Vec<u8>>>,
    chunks: Receiver<Chunk>,
}

/// Handler for the transfer thread plus the link the caller waits on.
pub(super) fn link(cancel: &CancelToken, has_body: bool) -> (StreamHandler, TransferLink) {
    let (setup_tx, setup_rx) = mpsc::sync_channel(1);
    let (upload_tx, upload_rx) = mpsc::sync_channel(1);
    let (chunk_tx, chunk_rx) = mpsc::sync_channel(CHUNK_QUEUE);
    let handler = StreamHandler {
        setup: Some(setup_tx),
        upload: has_body.then_some(upload_rx),
        chunks: Some(chunk_tx),
        cancel: cancel.clone(),
        ..StreamHandler::default()
    };
    let link = TransferLink {
        setup: setup_rx,
        upload: upload_tx,
        chunks: chunk_rx,
    };
    (handler, link)
}

impl TransferLink {
    /// Serves body reads until the transfer produces a response head or fails.
    pub(super) fn wait(self, mut body: Option<&mut Body>) -> Result<Response, TransportError> {
        loop {
            match self.setup.recv() {
                Ok(Setup::Upload(max)) => {
                    let reply = match body.as_deref_mut() {
                        Some(body) => read_chunk(body, max),
                        None => Ok(Vec::new()),
                    };
                    // A closed channel shows up as Failed or a disconnect on the next recv.
                    let _ = self.upload.send(reply);
                }
                Ok(Setup::Head { status, lines }) => {
                    let headers = parse_header_lines(&lines);
                    return Ok(Response::new(status, headers, ResponseStream::new(self.chunks)));
                }
                Ok(Setup::Failed(e)) => return Err(e),
                Err(_) => {
                    return Err(TransportError::new(
                        TransportErrorKind::Other,
                        "transfer thread exited without a response",
                    ))
                }
            }
        }
    }
}

fn read_chunk(body: &mut Body, max: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; max];
    let n = body.read(&mut buf)?;
    buf.truncate(n);
    Ok(buf)
}

/// Response body fed by the transfer thread.
struct ResponseStream {
    // Only ever reached through `get_mut`; the mutex just makes the stream `Sync`.
    chunks: Mutex<Receiver<Chunk>>,
    pending: Cursor<Vec<u8>>,
    done: bool,
}

impl ResponseStream {
    fn new(chunks: Receiver<Chunk>) -> Self {
        Self {
            chunks: Mutex::new(chunks),
            pending: Cursor::new(Vec::new()),
            done: false,
        }
    }
}

impl Read for ResponseStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let n = self.pending.read(buf)?;
            if n > 0 || buf.is_empty() || self.done {
                return Ok(n);
            }
            let chunks = self.chunks.get_mut().unwrap_or_else(PoisonError::into_inner);
            match chunks.recv() {
                Ok(Chunk::Data(data)) => self.pending = Cursor::new(data),
                Ok(Chunk::End) => self.done = true,
                Ok(Chunk::Failed(e)) => {
                    self.done = true;
                    return Err(e);
                }
                Err(_) => {
                    self.done = true;
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "transfer ended before the response body was complete",
                    ));
                }
            }
        }
    }
}
