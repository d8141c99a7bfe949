use std::path::PathBuf;

/// Errors that can occur while opening a byte source.
///
/// Reading never produces these: end-of-stream and read failures surface
/// as empty reads plus [`crate::ByteSource::is_closed`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to a remote endpoint.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to open a file.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An I/O error occurred while configuring the source.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
