//! The common length-prefixed, checksummed binary envelope shared by every
//! appliance type (spec §3, §4.2).

use crate::crypto::crc8;
use crate::error::InvalidFrameError;

const START_OF_FRAME: u8 = 0xAA;
const HEADER_LENGTH: usize = 10;

/// App-originated control source byte, carried in header byte 7 on outbound
/// frames.
pub const CONTROL_SOURCE: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DeviceType {
    AirConditioner = 0xAC,
    CommercialAc = 0xCC,
    HeatPump = 0xC3,
}

impl DeviceType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0xAC => Some(Self::AirConditioner),
            0xCC => Some(Self::CommercialAc),
            0xC3 => Some(Self::HeatPump),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    Query = 0x03,
    Control = 0x02,
    Report = 0x04,
    Set = 0x02,
    QueryAlt = 0x01,
}

impl FrameType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x01 => Some(Self::QueryAlt),
            0x02 => Some(Self::Control),
            0x03 => Some(Self::Query),
            0x04 => Some(Self::Report),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Build a complete frame: 10-byte header, payload, one trailing checksum
/// byte (spec §3, §4.2).
pub fn encode(device_type: DeviceType, frame_type: FrameType, payload: &[u8]) -> Vec<u8> {
    let total_len = HEADER_LENGTH + payload.len() + 1;
    let mut frame = Vec::with_capacity(total_len);

    let mut header = [0u8; HEADER_LENGTH];
    header[0] = START_OF_FRAME;
    header[1] = total_len as u8;
    header[2] = device_type.as_u8();
    // bytes 3..8 reserved, zero on send
    header[8] = 0; // protocol version, zero for current devices
    header[9] = frame_type.as_u8();

    frame.extend_from_slice(&header);
    frame.extend_from_slice(payload);
    frame.push(checksum(&frame[1..]));
    frame
}

/// `(~sum(bytes) + 1) & 0xFF` — two's-complement of the byte sum.
pub fn checksum(bytes: &[u8]) -> u8 {
    let sum: u32 = bytes.iter().map(|&b| b as u32).sum();
    (!sum as u8).wrapping_add(1)
}

/// A decoded, validated frame. Borrows nothing; payload is an owned copy so
/// callers can hold it past the lifetime of the network buffer.
#[derive(Debug, Clone)]
pub struct Frame {
    pub device_type: u8,
    pub frame_type: u8,
    pub protocol_version: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Validate and parse a raw frame. Accepts either the canonical
    /// two's-complement checksum over the whole frame, or (for appliances
    /// that append one) a CRC-8 over the payload with the canonical
    /// checksum immediately preceding it (spec §4.2).
    ///
    /// Real devices declare a length one byte short of the frame's actual
    /// size — the trailing checksum byte isn't counted in their own header
    /// field — confirmed against every captured frame in
    /// `original_source/msmart/device/AC/test_command.py`
    /// (`TEST_MESSAGE_V2`/`_V3`/`_CHECKSUM_AS_CRC`, each `len(frame) ==
    /// frame[1] + 1`). Accept both that convention and an exact match, so a
    /// frame built by this crate's own `encode` (which declares its true
    /// length) still round-trips.
    pub fn decode(raw: &[u8]) -> Result<Self, InvalidFrameError> {
        if raw.is_empty() || raw[0] != START_OF_FRAME {
            return Err(InvalidFrameError::new("missing start-of-frame byte", 0));
        }
        if raw.len() < HEADER_LENGTH + 1 {
            return Err(InvalidFrameError::new("frame shorter than header", raw.len()));
        }
        let declared_len = raw[1] as usize;
        if declared_len != raw.len() && declared_len + 1 != raw.len() {
            return Err(InvalidFrameError::new(
                format!("declared length {declared_len} does not match actual length {}", raw.len()),
                1,
            ));
        }

        let canonical = checksum(&raw[1..raw.len() - 1]);
        let trailer_ok = canonical == raw[raw.len() - 1];

        // Some devices append a CRC-8 over the payload after their own
        // checksum byte: [header][payload][checksum][crc8]. In that layout
        // the last byte is the CRC-8 and the payload excludes the final two
        // trailing bytes.
        let crc_ok = raw.len() >= HEADER_LENGTH + 2 && {
            let payload_for_crc = &raw[HEADER_LENGTH..raw.len() - 2];
            crc8(payload_for_crc) == raw[raw.len() - 1]
        };

        if !trailer_ok && !crc_ok {
            return Err(InvalidFrameError::new(
                format!(
                    "checksum mismatch: expected 0x{canonical:02X}, got 0x{:02X}",
                    raw[raw.len() - 1]
                ),
                raw.len() - 1,
            ));
        }

        Ok(Frame {
            device_type: raw[2],
            frame_type: raw[9],
            protocol_version: raw[8],
            payload: raw[HEADER_LENGTH..raw.len() - 1].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let payload = vec![0x41, 0x81, 0x00, 0x00];
        let raw = encode(DeviceType::AirConditioner, FrameType::Query, &payload);
        let frame = Frame::decode(&raw).unwrap();
        assert_eq!(frame.device_type, DeviceType::AirConditioner.as_u8());
        assert_eq!(frame.frame_type, FrameType::Query.as_u8());
        assert_eq!(frame.payload, payload);
    }

    #[test]
    fn single_byte_mutation_is_rejected() {
        let payload = vec![0x41, 0x81, 0x00, 0x00];
        let mut raw = encode(DeviceType::AirConditioner, FrameType::Query, &payload);
        let mid = raw.len() / 2;
        raw[mid] ^= 0x01;
        assert!(Frame::decode(&raw).is_err());
    }

    #[test]
    fn accepts_crc8_trailer_variant() {
        // [header][payload][checksum][crc8], where the checksum byte is
        // deliberately wrong so only the CRC-8 fallback can validate it.
        // Declared length follows the real-device convention of undercounting
        // by one (see `decode`'s doc comment).
        let payload = vec![0x41, 0x81, 0x00, 0x00];
        let total_len = HEADER_LENGTH + payload.len() + 2;

        let mut raw = vec![0u8; HEADER_LENGTH];
        raw[0] = START_OF_FRAME;
        raw[1] = (total_len - 1) as u8;
        raw[2] = DeviceType::AirConditioner.as_u8();
        raw[9] = FrameType::Query.as_u8();
        raw.extend_from_slice(&payload);
        raw.push(0x00); // bogus checksum byte, never validated directly
        raw.push(crc8(&payload));

        let frame = Frame::decode(&raw).unwrap();
        assert_eq!(frame.payload.len(), payload.len() + 1); // includes bogus checksum byte
    }

    #[test]
    fn decodes_real_captured_frames_whose_declared_length_undercounts_by_one() {
        // Literal captures from `original_source/msmart/device/AC/test_command.py`;
        // each is exactly one byte longer than its own `frame[1]` length field.
        const CHECKSUM_AS_CRC: &str = "aa1eac00000000000003c0004b1e7f7f000000000069630000000000000d33";
        const V2: &str = "aa22ac00000000000303c0014566000000300010045eff00000000000000000069fdb9";
        const V3: &str = "aa23ac00000000000303c00145660000003c0010045c6b20000000000000000000020d79";

        for hex_str in [CHECKSUM_AS_CRC, V2, V3] {
            let raw = hex::decode(hex_str).unwrap();
            assert_eq!(raw[1] as usize + 1, raw.len());
            let frame = Frame::decode(&raw).unwrap();
            assert_eq!(frame.device_type, DeviceType::AirConditioner.as_u8());
        }
    }
}
