use bytes::{BufMut, Bytes, BytesMut};
use telemlink_transport::ByteSource;
use tracing::{debug, trace};

use crate::codec::{frame_crc, parse_header, Frame, CRC_SIZE, HEADER_SIZE, PREAMBLE};

/// Consumer of raw frame bytes (preamble through CRC) for diagnostic capture.
pub type RawSink = Box<dyn FnMut(&[u8]) + Send>;

/// Framer behavior knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramerConfig {
    /// When true, the raw sink also receives fully delimited candidates whose
    /// CRC did not verify. Truncated candidates are never captured.
    pub capture_invalid: bool,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            capture_invalid: true,
        }
    }
}

/// Running counters of what the framer has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FramerStats {
    /// Frames that verified and were returned.
    pub frames: u64,
    /// Delimited candidates discarded for a CRC mismatch.
    pub crc_errors: u64,
    /// Candidates abandoned because a read came back short (source ran dry)
    /// or longer than requested.
    pub truncated: u64,
    /// Non-preamble bytes skipped while searching for sync.
    pub skipped_bytes: u64,
}

/// Finds, delimits and CRC-checks frames in a raw byte stream.
///
/// Each [`receive`](Framer::receive) call makes at most one frame attempt.
/// The framer keeps no buffer between calls: whatever a failed attempt
/// consumed is gone, and the next call resumes right after it.
pub struct Framer<S> {
    source: S,
    raw_sink: Option<RawSink>,
    config: FramerConfig,
    stats: FramerStats,
}

impl<S: ByteSource> Framer<S> {
    /// Create a framer without raw capture.
    pub fn new(source: S) -> Self {
        Self::with_config(source, FramerConfig::default())
    }

    /// Create a framer with explicit configuration.
    pub fn with_config(source: S, config: FramerConfig) -> Self {
        Self {
            source,
            raw_sink: None,
            config,
            stats: FramerStats::default(),
        }
    }

    /// Create a framer that copies every delimited frame to `sink`.
    pub fn with_raw_sink(source: S, sink: impl FnMut(&[u8]) + Send + 'static) -> Self {
        Self::new(source).raw_sink(sink)
    }

    /// Attach (or replace) the raw-frame sink.
    pub fn raw_sink(mut self, sink: impl FnMut(&[u8]) + Send + 'static) -> Self {
        self.raw_sink = Some(Box::new(sink));
        self
    }

    /// Attempt to read one frame.
    ///
    /// Returns `None` when the source runs dry before a preamble shows up,
    /// when a candidate is truncated, or when its CRC does not match.
    pub fn receive(&mut self) -> Option<Frame> {
        if !self.sync() {
            return None;
        }

        let header = self.fetch("header", HEADER_SIZE)?;
        let (msg_type, sender, length) = parse_header(&header);
        let payload = self.fetch("payload", usize::from(length))?;
        let crc_field = self.fetch("crc", CRC_SIZE)?;
        let crc = u16::from_le_bytes([crc_field[0], crc_field[1]]);

        let computed = frame_crc(&header, &payload);
        let valid = computed == crc;
        if valid || self.config.capture_invalid {
            self.capture(&header, &payload, &crc_field);
        }

        if !valid {
            self.stats.crc_errors += 1;
            debug!(
                msg_type,
                sender,
                length,
                expected = crc,
                computed,
                "discarding frame with crc mismatch"
            );
            return None;
        }

        self.stats.frames += 1;
        trace!(msg_type, sender, length, "frame received");
        Some(Frame::from_verified(msg_type, sender, payload, crc))
    }

    /// Counters accumulated since construction.
    pub fn stats(&self) -> FramerStats {
        self.stats
    }

    /// True once the underlying source reports it will never yield again.
    pub fn is_exhausted(&self) -> bool {
        self.source.is_closed()
    }

    /// Current framer configuration.
    pub fn config(&self) -> &FramerConfig {
        &self.config
    }

    /// Borrow the underlying source.
    pub fn get_ref(&self) -> &S {
        &self.source
    }

    /// Mutably borrow the underlying source.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Consume the framer and return the source.
    pub fn into_inner(self) -> S {
        self.source
    }

    /// Skip bytes until a preamble is consumed. False if the source ran dry.
    fn sync(&mut self) -> bool {
        loop {
            match &self.source.read(1)[..] {
                [PREAMBLE] => return true,
                [_] => self.stats.skipped_bytes += 1,
                [] => return false,
                chunk => {
                    self.stats.truncated += 1;
                    debug!(wanted = 1, got = chunk.len(), "source over-delivered during sync");
                    return false;
                }
            }
        }
    }

    /// Read exactly `wanted` bytes; any other count abandons the candidate.
    fn fetch(&mut self, field: &'static str, wanted: usize) -> Option<Bytes> {
        let chunk = self.source.read(wanted);
        if chunk.len() == wanted {
            return Some(chunk);
        }
        self.stats.truncated += 1;
        if chunk.len() < wanted {
            debug!(field, wanted, got = chunk.len(), "frame truncated");
        } else {
            debug!(field, wanted, got = chunk.len(), "source over-delivered; frame dropped");
        }
        None
    }

    fn capture(&mut self, header: &Bytes, payload: &Bytes, crc: &Bytes) {
        let Some(sink) = self.raw_sink.as_mut() else {
            return;
        };
        let mut raw = BytesMut::with_capacity(1 + header.len() + payload.len() + crc.len());
        raw.put_u8(PREAMBLE);
        raw.put_slice(header);
        raw.put_slice(payload);
        raw.put_slice(crc);
        sink(&raw);
    }
}

/// Yields frames until the source reports it is closed.
///
/// Failed attempts are skipped, not surfaced. With a source that never
/// reports closed this iterator does not end on its own.
impl<S: ByteSource> Iterator for Framer<S> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        loop {
            if let Some(frame) = self.receive() {
                return Some(frame);
            }
            if self.is_exhausted() {
                return None;
            }
        }
    }
}

impl<S> std::fmt::Debug for Framer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Framer")
            .field("config", &self.config)
            .field("stats", &self.stats)
            .field("raw_sink", &self.raw_sink.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use bytes::{Bytes, BytesMut};
    use telemlink_transport::{FnSource, SliceSource};

    use super::*;
    use crate::codec::encode_frame;

    const VECTOR: &[u8] = b"\x55\x15\x00\xda\x05\x0d\x9a\x99\x81\x41\x00\x40\xbb\x43\x51\x89\xda\x44\x0e\xeb\x4f";

    fn framer_over(bytes: &[u8]) -> Framer<SliceSource> {
        Framer::new(SliceSource::new(Bytes::copy_from_slice(bytes)))
    }

    fn wire(frames: &[(u16, u16, &[u8])]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for (msg_type, sender, payload) in frames {
            encode_frame(*msg_type, *sender, payload, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    #[test]
    fn receive_known_vector() {
        let mut framer = framer_over(VECTOR);
        let frame = framer.receive().unwrap();

        assert_eq!(frame.msg_type(), 0x15);
        assert_eq!(frame.sender(), 1498);
        assert_eq!(frame.length(), 13);
        assert_eq!(frame.crc(), 0x4FEB);
        assert_eq!(frame.payload().as_ref(), &VECTOR[6..19]);
    }

    #[test]
    fn receive_empty_source() {
        assert!(framer_over(b"").receive().is_none());
    }

    #[test]
    fn receive_single_non_preamble_byte() {
        let mut framer = framer_over(b"\x01");
        assert!(framer.receive().is_none());
        assert_eq!(framer.stats().skipped_bytes, 1);
    }

    #[test]
    fn receive_zeroed_crc_is_none() {
        let mut bad = VECTOR.to_vec();
        let n = bad.len();
        bad[n - 2..].copy_from_slice(&[0x00, 0x00]);

        let mut framer = framer_over(&bad);
        assert!(framer.receive().is_none());
        assert_eq!(framer.stats().crc_errors, 1);
    }

    #[test]
    fn noise_without_preamble_is_fully_consumed() {
        let noise: Vec<u8> = (0u8..=255).filter(|b| *b != PREAMBLE).collect();
        let mut framer = framer_over(&noise);

        assert!(framer.receive().is_none());
        assert_eq!(framer.stats().skipped_bytes, noise.len() as u64);
        assert!(framer.is_exhausted());
        assert_eq!(framer.get_ref().remaining(), 0);
    }

    #[test]
    fn noise_before_frame_is_skipped() {
        let mut bytes = vec![0x00, 0xFF, 0x13, 0x37];
        bytes.extend_from_slice(VECTOR);

        let mut framer = framer_over(&bytes);
        let frame = framer.receive().unwrap();
        assert_eq!(frame.msg_type(), 0x15);
        assert_eq!(framer.stats().skipped_bytes, 4);
    }

    #[test]
    fn every_crc_bit_flip_is_rejected() {
        let n = VECTOR.len();
        for byte in [n - 2, n - 1] {
            for bit in 0..8 {
                let mut corrupted = VECTOR.to_vec();
                corrupted[byte] ^= 1 << bit;
                assert!(
                    framer_over(&corrupted).receive().is_none(),
                    "flip of byte {byte} bit {bit} went undetected"
                );
            }
        }
    }

    #[test]
    fn corrupt_frame_does_not_poison_the_next_one() {
        let mut bytes = wire(&[(0x0100, 7, b"first")]);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        bytes.extend(wire(&[(0x0200, 7, b"second")]));

        let mut framer = framer_over(&bytes);
        assert!(framer.receive().is_none());

        let frame = framer.receive().unwrap();
        assert_eq!(frame.msg_type(), 0x0200);
        assert_eq!(frame.payload().as_ref(), b"second");
        assert_eq!(
            framer.stats(),
            FramerStats {
                frames: 1,
                crc_errors: 1,
                truncated: 0,
                skipped_bytes: 0,
            }
        );
    }

    #[test]
    fn discarded_candidate_is_not_rescanned() {
        // A valid frame hidden inside the payload of a corrupt one is lost
        // along with its container.
        let inner = wire(&[(0x0033, 1, b"x")]);
        let mut outer = wire(&[(0x0044, 1, &inner)]);
        let last = outer.len() - 1;
        outer[last] ^= 0x01;

        let mut framer = framer_over(&outer);
        assert!(framer.receive().is_none());
        assert!(framer.receive().is_none());
        assert!(framer.is_exhausted());
    }

    #[test]
    fn truncation_at_each_boundary_yields_none() {
        for cut in 1..VECTOR.len() {
            let mut framer = framer_over(&VECTOR[..cut]);
            assert!(framer.receive().is_none(), "cut at {cut} produced a frame");
            assert_eq!(framer.stats().truncated, 1, "cut at {cut}");
        }
    }

    #[test]
    fn empty_payload_frame() {
        let bytes = wire(&[(0x00FF, 0x1234, b"")]);
        let frame = framer_over(&bytes).receive().unwrap();

        assert_eq!(frame.msg_type(), 0x00FF);
        assert_eq!(frame.sender(), 0x1234);
        assert_eq!(frame.length(), 0);
        assert!(frame.payload().is_empty());
    }

    #[test]
    fn maximum_payload_frame() {
        let payload = vec![PREAMBLE; 255];
        let bytes = wire(&[(0xFFFF, 0xFFFF, &payload)]);
        let frame = framer_over(&bytes).receive().unwrap();

        assert_eq!(frame.length(), 255);
        assert_eq!(frame.payload().as_ref(), payload.as_slice());
    }

    #[test]
    fn short_read_mid_frame_is_none() {
        let mut chunks = vec![
            Bytes::from_static(&[PREAMBLE]),
            Bytes::copy_from_slice(&VECTOR[1..4]),
        ]
        .into_iter();
        let source = FnSource::new(move |_n| chunks.next().unwrap_or_default());

        let mut framer = Framer::new(source);
        assert!(framer.receive().is_none());
        assert!(!framer.is_exhausted());
        assert_eq!(framer.stats().truncated, 1);
    }

    #[test]
    fn iterator_yields_all_valid_frames() {
        let mut bytes = wire(&[(1, 10, b"a"), (2, 20, b"bb")]);
        bytes.extend_from_slice(b"\x00\x55\x01");
        bytes.extend(wire(&[(3, 30, b"ccc")]));

        let frames: Vec<Frame> = framer_over(&bytes).collect();
        let types: Vec<u16> = frames.iter().map(Frame::msg_type).collect();
        assert_eq!(types, vec![1, 2]);
    }

    #[test]
    fn iterator_over_clean_stream() {
        let bytes = wire(&[(1, 10, b"a"), (2, 20, b"bb"), (3, 30, b"ccc")]);
        let senders: Vec<u16> = framer_over(&bytes).map(|f| f.sender()).collect();
        assert_eq!(senders, vec![10, 20, 30]);
    }

    #[test]
    fn raw_sink_captures_valid_and_invalid_candidates() {
        let captured = Arc::new(Mutex::new(Vec::<Vec<u8>>::new()));
        let mut bad = VECTOR.to_vec();
        let n = bad.len();
        bad[n - 1] = 0x00;
        let mut bytes = bad.clone();
        bytes.extend_from_slice(VECTOR);
        bytes.extend_from_slice(&VECTOR[..5]);

        let sink = {
            let captured = Arc::clone(&captured);
            move |raw: &[u8]| captured.lock().unwrap().push(raw.to_vec())
        };
        let mut framer =
            Framer::with_raw_sink(SliceSource::new(Bytes::copy_from_slice(&bytes)), sink);

        assert!(framer.receive().is_none());
        assert!(framer.receive().is_some());
        assert!(framer.receive().is_none());

        let captured = captured.lock().unwrap();
        assert_eq!(captured.len(), 2);
        assert_eq!(captured[0], bad);
        assert_eq!(captured[1], VECTOR);
    }

    #[test]
    fn raw_sink_can_skip_invalid_candidates() {
        let captured = Arc::new(Mutex::new(0usize));
        let mut bytes = VECTOR.to_vec();
        let n = bytes.len();
        bytes[n - 1] = 0x00;
        bytes.extend_from_slice(VECTOR);

        let sink = {
            let captured = Arc::clone(&captured);
            move |_: &[u8]| *captured.lock().unwrap() += 1
        };
        let config = FramerConfig {
            capture_invalid: false,
        };
        let mut framer =
            Framer::with_config(SliceSource::new(Bytes::copy_from_slice(&bytes)), config)
                .raw_sink(sink);

        assert!(framer.receive().is_none());
        assert!(framer.receive().is_some());
        assert_eq!(*captured.lock().unwrap(), 1);
    }

    #[test]
    fn into_inner_returns_source_position() {
        let mut bytes = VECTOR.to_vec();
        bytes.extend_from_slice(b"tail");
        let mut framer = framer_over(&bytes);

        assert!(framer.receive().is_some());
        let source = framer.into_inner();
        assert_eq!(source.remaining(), 4);
    }

    /// Ignores the requested size and hands out whole scripted chunks.
    struct OversizedChunks(std::vec::IntoIter<Bytes>);

    impl ByteSource for OversizedChunks {
        fn read(&mut self, _n: usize) -> Bytes {
            self.0.next().unwrap_or_default()
        }
    }

    #[test]
    fn oversized_reads_never_produce_a_frame() {
        // Header claims one payload byte, the source hands back three.
        let header = Bytes::from_static(&[0x10, 0x00, 0x01, 0x00, 0x01]);
        let payload = Bytes::from_static(&[0xAA, 0xBB, 0xCC]);
        let crc = crate::codec::frame_crc(&header, &payload).to_le_bytes();
        let chunks = vec![
            Bytes::from_static(&[PREAMBLE]),
            header,
            payload,
            Bytes::copy_from_slice(&crc),
        ];
        let mut framer = Framer::new(OversizedChunks(chunks.into_iter()));

        assert!(framer.receive().is_none());
        assert_eq!(framer.stats().frames, 0);
        assert_eq!(framer.stats().truncated, 1);
    }

    #[test]
    fn oversized_sync_read_abandons_attempt() {
        let chunks = vec![Bytes::copy_from_slice(VECTOR)];
        let mut framer = Framer::new(OversizedChunks(chunks.into_iter()));

        assert!(framer.receive().is_none());
        assert_eq!(framer.stats().frames, 0);
        assert_eq!(framer.stats().truncated, 1);
    }
}
