use bytes::{BufMut, Bytes, BytesMut};

use crate::crc::Crc16;
use crate::error::{FrameError, Result};

/// Start-of-frame marker.
pub const PREAMBLE: u8 = 0x55;

/// Header after the preamble: msg_type (2) + sender (2) + length (1).
pub const HEADER_SIZE: usize = 5;

/// Trailing checksum size.
pub const CRC_SIZE: usize = 2;

/// Largest payload the 8-bit length field can describe.
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// Wire size of a frame with an empty payload.
pub const MIN_FRAME_SIZE: usize = 1 + HEADER_SIZE + CRC_SIZE;

/// A validated telemetry frame.
///
/// Every `Frame` carries a CRC that matches its header and payload: the
/// framer only materializes frames that verified, and [`Frame::new`]
/// computes the checksum itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    msg_type: u16,
    sender: u16,
    payload: Bytes,
    crc: u16,
}

impl Frame {
    /// Build a frame, computing its CRC.
    pub fn new(msg_type: u16, sender: u16, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        let length = checked_length(payload.len())?;
        let crc = frame_crc(&header_bytes(msg_type, sender, length), &payload);
        Ok(Self {
            msg_type,
            sender,
            payload,
            crc,
        })
    }

    /// Assemble a frame whose CRC the caller has already verified.
    pub(crate) fn from_verified(msg_type: u16, sender: u16, payload: Bytes, crc: u16) -> Self {
        debug_assert!(payload.len() <= MAX_PAYLOAD);
        Self {
            msg_type,
            sender,
            payload,
            crc,
        }
    }

    pub fn msg_type(&self) -> u16 {
        self.msg_type
    }

    pub fn sender(&self) -> u16 {
        self.sender
    }

    /// Payload length as carried in the header.
    pub fn length(&self) -> u8 {
        self.payload.len() as u8
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Checksum as transmitted.
    pub fn crc(&self) -> u16 {
        self.crc
    }

    /// The total wire size of this frame (preamble + header + payload + crc).
    pub fn wire_size(&self) -> usize {
        MIN_FRAME_SIZE + self.payload.len()
    }

    /// Serialize back to wire format.
    pub fn to_bytes(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(self.wire_size());
        put_frame(
            &header_bytes(self.msg_type, self.sender, self.length()),
            &self.payload,
            self.crc,
            &mut dst,
        );
        dst.freeze()
    }
}

/// Encode a frame into the wire format, returning the CRC written.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────────┬──────────┬────────┬────────────────┬──────────┐
/// │ Preamble │ MsgType  │ Sender   │ Length │ Payload        │ CRC16    │
/// │ 0x55     │ (2B LE)  │ (2B LE)  │ (1B)   │ (Length bytes) │ (2B LE)  │
/// └──────────┴──────────┴──────────┴────────┴────────────────┴──────────┘
/// ```
pub fn encode_frame(msg_type: u16, sender: u16, payload: &[u8], dst: &mut BytesMut) -> Result<u16> {
    let length = checked_length(payload.len())?;
    let header = header_bytes(msg_type, sender, length);
    let crc = frame_crc(&header, payload);
    put_frame(&header, payload, crc, dst);
    Ok(crc)
}

pub(crate) fn header_bytes(msg_type: u16, sender: u16, length: u8) -> [u8; HEADER_SIZE] {
    let [t0, t1] = msg_type.to_le_bytes();
    let [s0, s1] = sender.to_le_bytes();
    [t0, t1, s0, s1, length]
}

/// Split a raw header into `(msg_type, sender, length)`.
pub(crate) fn parse_header(header: &[u8]) -> (u16, u16, u8) {
    (
        u16::from_le_bytes([header[0], header[1]]),
        u16::from_le_bytes([header[2], header[3]]),
        header[4],
    )
}

pub(crate) fn frame_crc(header: &[u8], payload: &[u8]) -> u16 {
    let mut crc = Crc16::new();
    crc.update(header);
    crc.update(payload);
    crc.finish()
}

fn put_frame(header: &[u8; HEADER_SIZE], payload: &[u8], crc: u16, dst: &mut BytesMut) {
    dst.reserve(MIN_FRAME_SIZE + payload.len());
    dst.put_u8(PREAMBLE);
    dst.put_slice(header);
    dst.put_slice(payload);
    dst.put_u16_le(crc);
}

fn checked_length(len: usize) -> Result<u8> {
    u8::try_from(len).map_err(|_| FrameError::PayloadTooLarge {
        size: len,
        max: MAX_PAYLOAD,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VECTOR: &[u8] = b"\x55\x15\x00\xda\x05\x0d\x9a\x99\x81\x41\x00\x40\xbb\x43\x51\x89\xda\x44\x0e\xeb\x4f";

    #[test]
    fn encode_matches_known_vector() {
        let mut buf = BytesMut::new();
        let crc = encode_frame(0x15, 1498, &VECTOR[6..19], &mut buf).unwrap();

        assert_eq!(crc, 0x4FEB);
        assert_eq!(buf.as_ref(), VECTOR);
    }

    #[test]
    fn new_computes_crc_and_length() {
        let frame = Frame::new(0x15, 1498, Bytes::from_static(&VECTOR[6..19])).unwrap();

        assert_eq!(frame.length(), 13);
        assert_eq!(frame.crc(), 0x4FEB);
        assert_eq!(frame.wire_size(), VECTOR.len());
        assert_eq!(frame.to_bytes().as_ref(), VECTOR);
    }

    #[test]
    fn empty_payload() {
        let frame = Frame::new(0x55, 0x42, Bytes::new()).unwrap();

        assert_eq!(frame.length(), 0);
        assert_eq!(frame.crc(), 0x45A8);
        assert_eq!(frame.to_bytes().as_ref(), b"\x55\x55\x00\x42\x00\x00\xa8\x45");
    }

    #[test]
    fn payload_too_large_is_rejected() {
        let mut buf = BytesMut::new();
        let err = encode_frame(1, 1, &[0u8; 256], &mut buf).unwrap_err();

        assert!(matches!(err, FrameError::PayloadTooLarge { size: 256, max: 255 }));
        assert!(buf.is_empty());
        assert!(Frame::new(1, 1, vec![0u8; 300]).is_err());
    }

    #[test]
    fn max_payload_fits() {
        let frame = Frame::new(7, 8, vec![0xAB; MAX_PAYLOAD]).unwrap();
        assert_eq!(frame.length(), 255);
    }

    #[test]
    fn header_parse_inverts_header_bytes() {
        let header = header_bytes(0xBEEF, 0x1234, 9);
        assert_eq!(parse_header(&header), (0xBEEF, 0x1234, 9));
    }
}
