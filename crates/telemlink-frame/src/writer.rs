use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_frame, Frame, MAX_PAYLOAD, MIN_FRAME_SIZE};
use crate::error::{FrameError, Result};

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    sender: u16,
}

impl<T: Write> FrameWriter<T> {
    /// Create a frame writer that stamps frames with `sender`.
    pub fn new(inner: T, sender: u16) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(MIN_FRAME_SIZE + MAX_PAYLOAD),
            sender,
        }
    }

    /// Write an already-built frame verbatim, keeping its own sender.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.buf.clear();
        encode_frame(frame.msg_type(), frame.sender(), frame.payload(), &mut self.buf)?;
        self.write_buf()
    }

    /// Encode and send a payload as `msg_type`, returning the CRC written.
    pub fn send(&mut self, msg_type: u16, payload: &[u8]) -> Result<u16> {
        self.buf.clear();
        let crc = encode_frame(msg_type, self.sender, payload, &mut self.buf)?;
        self.write_buf()?;
        Ok(crc)
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Sender id stamped on frames built by [`send`](Self::send).
    pub fn sender(&self) -> u16 {
        self.sender
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn write_buf(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }
}
