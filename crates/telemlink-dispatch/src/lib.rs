//! Background receive loop and callback fan-out for telemetry frames.
//!
//! A [`ReceiveLoop`] pumps frames out of a producer (usually a
//! [`Framer`](telemlink_frame::Framer)) on its own thread; a [`Handler`]
//! fans each frame out to registered callbacks, either to every callback or
//! only to those subscribed to the frame's message type.

pub mod error;
pub mod handler;
pub mod listener;

use std::sync::Arc;

use telemlink_frame::Framer;
use telemlink_transport::ByteSource;

pub use error::{DispatchError, Result, SinkError};
pub use handler::{Callback, Handler, MsgFilter};
pub use listener::{ListenerConfig, ListenerState, ReceiveLoop};

/// Start a receive loop that feeds every frame from `framer` into `handler`.
pub fn spawn_handler_loop<S>(framer: Framer<S>, handler: Arc<Handler>) -> Result<ReceiveLoop>
where
    S: ByteSource + 'static,
{
    let mut framer = framer;
    let mut rx = ReceiveLoop::with_handler(move || framer.receive(), handler);
    rx.start()?;
    Ok(rx)
}
