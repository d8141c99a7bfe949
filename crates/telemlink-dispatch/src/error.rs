use crate::handler::MsgFilter;

/// Error a sink returns to end its receive loop.
pub type SinkError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur in dispatch operations.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// `start` was called on a loop that is already running.
    #[error("receive loop already started")]
    AlreadyStarted,

    /// `start` was called on a loop that has already been stopped.
    #[error("receive loop cannot be restarted; construct a new one")]
    NotRestartable,

    /// `join` was called on a loop that was never started.
    #[error("receive loop was never started")]
    NotStarted,

    /// The background thread could not be spawned.
    #[error("failed to spawn receive thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// No registration matched the callback and filter being removed.
    #[error("no callback registered for {0}")]
    NoSuchRegistration(MsgFilter),

    /// The sink returned an error and ended the receive loop.
    #[error("sink failed: {0}")]
    Sink(#[source] SinkError),

    /// The receive thread panicked (sink or callback panic).
    #[error("receive thread panicked: {0}")]
    Panicked(String),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
