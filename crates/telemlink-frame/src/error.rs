/// Errors that can occur while encoding or writing frames.
///
/// Decoding has no error type: malformed input is simply "no frame".
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload does not fit the 8-bit length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The sink stopped accepting bytes mid-frame.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
