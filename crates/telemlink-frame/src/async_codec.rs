//! `tokio_util` codec for framed async streams.
//!
//! Unlike the pull-based [`Framer`](crate::Framer), the codec sees a
//! buffer, so a frame split across reads simply waits for the rest. Noise
//! and CRC failures are still dropped silently: a failed candidate is
//! discarded whole and scanning resumes after its CRC field.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::codec::{
    encode_frame, frame_crc, parse_header, Frame, HEADER_SIZE, MIN_FRAME_SIZE, PREAMBLE,
};
use crate::error::FrameError;
use crate::framer::FramerStats;

/// Decoder/encoder for telemetry frames.
#[derive(Debug, Default)]
pub struct FrameCodec {
    stats: FramerStats,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters accumulated since construction.
    pub fn stats(&self) -> FramerStats {
        self.stats
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        loop {
            match src.iter().position(|b| *b == PREAMBLE) {
                Some(offset) => {
                    self.stats.skipped_bytes += offset as u64;
                    src.advance(offset);
                }
                None => {
                    self.stats.skipped_bytes += src.len() as u64;
                    src.clear();
                    return Ok(None);
                }
            }

            if src.len() < 1 + HEADER_SIZE {
                return Ok(None);
            }
            let length = usize::from(src[HEADER_SIZE]);
            let total = MIN_FRAME_SIZE + length;
            if src.len() < total {
                src.reserve(total - src.len());
                return Ok(None);
            }

            let raw = src.split_to(total).freeze();
            let header = &raw[1..1 + HEADER_SIZE];
            let payload_end = 1 + HEADER_SIZE + length;
            let crc = u16::from_le_bytes([raw[payload_end], raw[payload_end + 1]]);
            let computed = frame_crc(header, &raw[1 + HEADER_SIZE..payload_end]);
            let (msg_type, sender, _) = parse_header(header);

            if computed != crc {
                self.stats.crc_errors += 1;
                debug!(
                    msg_type,
                    sender,
                    expected = crc,
                    computed,
                    "discarding frame with crc mismatch"
                );
                continue;
            }

            self.stats.frames += 1;
            let payload = raw.slice(1 + HEADER_SIZE..payload_end);
            return Ok(Some(Frame::from_verified(msg_type, sender, payload, crc)));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if !src.is_empty() {
            self.stats.truncated += 1;
            debug!(remaining = src.len(), "dropping truncated frame at end of stream");
            src.clear();
        }
        Ok(None)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_frame(frame.msg_type(), frame.sender(), frame.payload(), dst)?;
        Ok(())
    }
}
