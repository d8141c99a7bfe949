//! Client-side message pipeline for framed telemetry links.
//!
//! telemlink turns the raw byte stream of a positioning/sensor device into
//! CRC-validated frames and fans them out to interested observers.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte sources (any `Read`, TCP, files, closures)
//! - [`frame`]: Frame entity, CRC-16, the resynchronizing [`frame::Framer`]
//! - [`dispatch`]: Callback registry and background receive loop
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use telemlink::dispatch::{spawn_handler_loop, Handler, MsgFilter};
//! use telemlink::frame::{Frame, Framer};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = telemlink::transport::tcp::connect("192.168.0.222:55555", None)?;
//! let handler = Arc::new(Handler::new());
//! handler.add_callback(
//!     Arc::new(|frame: &Frame| println!("{:#06x} from {}", frame.msg_type(), frame.sender())),
//!     MsgFilter::All,
//! );
//! let rx = spawn_handler_loop(Framer::new(source), Arc::clone(&handler))?;
//! # rx.stop();
//! # Ok(())
//! # }
//! ```

/// Re-export transport types.
pub mod transport {
    pub use telemlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use telemlink_frame::*;
}

/// Re-export dispatch types.
pub mod dispatch {
    pub use telemlink_dispatch::*;
}
