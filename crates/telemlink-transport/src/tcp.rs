use std::io::BufReader;
use std::net::TcpStream;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::ReadSource;

/// Connect to a TCP telemetry endpoint (e.g. a device or serial-to-TCP bridge).
///
/// With `read_timeout` set, a read that stalls returns whatever arrived so
/// far instead of blocking indefinitely; without it reads block until data
/// or EOF.
pub fn connect(
    addr: &str,
    read_timeout: Option<Duration>,
) -> Result<ReadSource<BufReader<TcpStream>>> {
    let stream = TcpStream::connect(addr).map_err(|source| TransportError::Connect {
        addr: addr.to_string(),
        source,
    })?;
    stream.set_read_timeout(read_timeout)?;
    stream.set_nodelay(true)?;

    info!(addr, ?read_timeout, "connected to tcp source");
    Ok(ReadSource::new(BufReader::new(stream)))
}

/// Connect a write-side TCP stream, used for sending frames to a device.
pub fn connect_sink(addr: &str) -> Result<TcpStream> {
    let stream = TcpStream::connect(addr).map_err(|source| TransportError::Connect {
        addr: addr.to_string(),
        source,
    })?;
    debug!(addr, "connected to tcp sink");
    Ok(stream)
}
