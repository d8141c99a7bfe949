//! Preamble-synchronized, CRC-16 validated telemetry framing.
//!
//! Every frame on the wire is laid out as:
//! - a 1-byte preamble (`0x55`) for stream synchronization
//! - a 5-byte header: message type (u16 LE), sender (u16 LE), payload length (u8)
//! - `length` payload bytes
//! - a CRC-16/XMODEM (u16 LE) over header and payload
//!
//! The [`Framer`] turns a noisy byte stream into validated [`Frame`]s, one
//! attempt per call. Noise, truncation and corruption yield `None`, never
//! an error.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod crc;
pub mod error;
pub mod framer;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::FrameCodec;
pub use codec::{
    encode_frame, Frame, CRC_SIZE, HEADER_SIZE, MAX_PAYLOAD, MIN_FRAME_SIZE, PREAMBLE,
};
pub use crc::Crc16;
pub use error::{FrameError, Result};
pub use framer::{Framer, FramerConfig, FramerStats, RawSink};
pub use writer::FrameWriter;
