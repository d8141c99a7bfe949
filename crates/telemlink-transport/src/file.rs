use std::fs::File;
use std::io::{BufReader, Stdin};
use std::path::Path;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::ReadSource;

/// Open a capture file (or a serial device node) as a byte source.
pub fn open(path: impl AsRef<Path>) -> Result<ReadSource<BufReader<File>>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| TransportError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "opened file source");
    Ok(ReadSource::new(BufReader::new(file)))
}

/// Read link bytes from the process's standard input.
pub fn stdin() -> ReadSource<Stdin> {
    ReadSource::new(std::io::stdin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ByteSource;

    #[test]
    fn open_reads_file_then_closes() {
        let dir = std::env::temp_dir().join(format!("telemlink-file-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("capture.bin");
        std::fs::write(&path, b"\x01\x02\x03").unwrap();

        let mut source = open(&path).unwrap();
        assert_eq!(source.read(8).as_ref(), b"\x01\x02\x03");
        assert!(source.is_closed());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn open_scans_noise_byte_by_byte() {
        let dir = std::env::temp_dir().join(format!("telemlink-noise-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("noise.bin");
        let mut bytes = vec![0xEEu8; 4096];
        bytes.push(0x55);
        std::fs::write(&path, &bytes).unwrap();

        let mut source = open(&path).unwrap();
        let noise = (0..4096).filter(|_| source.read(1)[..] == [0xEE]).count();
        assert_eq!(noise, 4096);
        assert_eq!(source.read(1).as_ref(), b"\x55");
        assert!(source.read(1).is_empty());
        assert!(source.is_closed());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn open_missing_file_is_open_error() {
        let err = open("/nonexistent/telemlink/capture.bin").unwrap_err();
        assert!(matches!(err, TransportError::Open { .. }));
    }
}
