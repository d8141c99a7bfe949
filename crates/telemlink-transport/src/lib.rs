//! Byte-source abstraction for telemetry links.
//!
//! The framer above this layer only needs one capability: "give me up to
//! `n` bytes". This crate defines that contract ([`ByteSource`]) and the
//! concrete sources used in practice:
//! - any blocking [`std::io::Read`] (serial ports, pipes) via [`ReadSource`]
//! - TCP streams ([`tcp::connect`])
//! - capture files and stdin ([`file::open`], [`file::stdin`])
//! - in-memory buffers ([`SliceSource`]) and closures ([`FnSource`])

pub mod error;
pub mod file;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use traits::{ByteSource, FnSource, ReadSource, SliceSource};
