use std::io::{ErrorKind, Read};

use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, warn};

const SCRATCH_CAPACITY: usize = 256;

/// A pull-based source of raw link bytes.
///
/// `read(n)` returns between 0 and `n` bytes. A short result means the
/// source had nothing more to give right now; an empty result additionally
/// means the caller should not expect a frame from this attempt. Reads never
/// fail: ordinary end-of-stream is an empty result, and
/// [`is_closed`](ByteSource::is_closed) tells a retry apart from exhaustion.
pub trait ByteSource: Send {
    /// Read up to `n` bytes.
    fn read(&mut self, n: usize) -> Bytes;

    /// Returns true once the source will never produce bytes again.
    fn is_closed(&self) -> bool {
        false
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read(&mut self, n: usize) -> Bytes {
        (**self).read(n)
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}

/// Adapts any blocking [`Read`] into a [`ByteSource`].
///
/// Each `read(n)` keeps pulling from the reader until `n` bytes are
/// gathered, so a frame split across several OS reads is still delivered
/// whole. It stops early on EOF (the source becomes closed) or on a read
/// timeout (partial bytes are returned, the source stays open).
pub struct ReadSource<R> {
    inner: R,
    scratch: BytesMut,
    closed: bool,
    last_error: Option<std::io::Error>,
}

impl<R: Read> ReadSource<R> {
    /// Wrap a reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            scratch: BytesMut::new(),
            closed: false,
            last_error: None,
        }
    }

    /// The I/O error that closed this source, if any.
    pub fn last_error(&self) -> Option<&std::io::Error> {
        self.last_error.as_ref()
    }

    /// Borrow the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Mutably borrow the underlying reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Consume the source and return the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Send> ByteSource for ReadSource<R> {
    fn read(&mut self, n: usize) -> Bytes {
        if self.closed || n == 0 {
            return Bytes::new();
        }

        // Chunks are split off a reused scratch buffer.
        if self.scratch.capacity() < n {
            self.scratch.reserve(n.max(SCRATCH_CAPACITY));
        }
        self.scratch.resize(n, 0);
        let mut filled = 0usize;
        while filled < n {
            match self.inner.read(&mut self.scratch[filled..]) {
                Ok(0) => {
                    debug!("byte source reached end of stream");
                    self.closed = true;
                    break;
                }
                Ok(read) => filled += read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "byte source read failed; closing");
                    self.closed = true;
                    self.last_error = Some(err);
                    break;
                }
            }
        }

        let chunk = self.scratch.split_to(filled).freeze();
        self.scratch.clear();
        chunk
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<R> std::fmt::Debug for ReadSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadSource")
            .field("closed", &self.closed)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

/// A [`ByteSource`] backed by a `read(n)` closure.
///
/// The closure follows the same contract as [`ByteSource::read`]. Such a
/// source has no exhaustion signal of its own, so it never reports closed.
/// Chunks longer than requested are cut to the requested size.
pub struct FnSource<F> {
    read: F,
}

impl<F> FnSource<F>
where
    F: FnMut(usize) -> Bytes + Send,
{
    pub fn new(read: F) -> Self {
        Self { read }
    }
}

impl<F> ByteSource for FnSource<F>
where
    F: FnMut(usize) -> Bytes + Send,
{
    fn read(&mut self, n: usize) -> Bytes {
        let mut chunk = (self.read)(n);
        chunk.truncate(n);
        chunk
    }
}

/// An in-memory [`ByteSource`], closed once fully consumed.
#[derive(Debug, Clone, Default)]
pub struct SliceSource {
    data: Bytes,
}

impl SliceSource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len()
    }
}

impl ByteSource for SliceSource {
    fn read(&mut self, n: usize) -> Bytes {
        let take = n.min(self.data.remaining());
        self.data.split_to(take)
    }

    fn is_closed(&self) -> bool {
        self.data.is_empty()
    }
}
