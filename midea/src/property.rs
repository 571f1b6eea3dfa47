//! The `0xB0` (set) / `0xB1` (report) property channel: a table of
//! per-ID encoders/decoders addressed by 16-bit property id (spec §3 "AC
//! Properties", §4.3, §9 "Property system").

use std::collections::BTreeSet;

use crate::error::InvalidFrameError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum PropertyId {
    SwingUdAngle = 0x0009,
    SwingLrAngle = 0x000A,
    IndoorHumidity = 0x0015,
    BreezeAway = 0x0018,
    BreezeControl = 0x0043,
    Breezeless = 0x0042,
    RateSelect = 0x0048,
}

impl PropertyId {
    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            0x0009 => Some(Self::SwingUdAngle),
            0x000A => Some(Self::SwingLrAngle),
            0x0015 => Some(Self::IndoorHumidity),
            0x0018 => Some(Self::BreezeAway),
            0x0042 => Some(Self::Breezeless),
            0x0043 => Some(Self::BreezeControl),
            0x0048 => Some(Self::RateSelect),
            _ => None,
        }
    }

    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::SwingUdAngle => "SWING_UD_ANGLE",
            Self::SwingLrAngle => "SWING_LR_ANGLE",
            Self::IndoorHumidity => "INDOOR_HUMIDITY",
            Self::BreezeAway => "BREEZE_AWAY",
            Self::Breezeless => "BREEZELESS",
            Self::BreezeControl => "BREEZE_CONTROL",
            Self::RateSelect => "RATE_SELECT",
        }
    }
}

/// A single decoded property entry from a `0xB0`/`0xB1` TLV list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyEntry {
    pub id: u16,
    pub value: Vec<u8>,
    /// Present on `0xB0` *set* responses: 0 = OK, non-zero = rejected.
    pub status: Option<u8>,
}

/// Parse a `0xB1`/`0xB0` payload: `{prop_id:u16 LE, size:u8, value,
/// status:u8}` entries following the leading command-type byte and count
/// byte.
pub fn parse_property_payload(payload: &[u8]) -> Result<Vec<PropertyEntry>, InvalidFrameError> {
    if payload.len() < 2 {
        return Err(InvalidFrameError::new("property payload too short", 0));
    }
    let count = payload[1] as usize;
    let mut data = &payload[2..];
    let mut out = Vec::with_capacity(count);

    while data.len() >= 4 {
        let id = u16::from_le_bytes([data[0], data[1]]);
        let size = data[2] as usize;
        if data.len() < 3 + size + 1 {
            return Err(InvalidFrameError::new("property TLV truncated", 0));
        }
        let value = data[3..3 + size].to_vec();
        let status = data[3 + size];
        out.push(PropertyEntry { id, value, status: Some(status) });
        data = &data[4 + size..];
    }
    Ok(out)
}

/// Encode a `0xB0` set-properties command body: command type + count +
/// `{id:u16 LE, size:u8, value}` entries (no trailing status on a set
/// request; the status byte only appears in responses).
pub fn encode_set_properties(entries: &[(u16, Vec<u8>)]) -> Vec<u8> {
    let mut out = vec![0x02, entries.len() as u8];
    for (id, value) in entries {
        out.extend_from_slice(&id.to_le_bytes());
        out.push(value.len() as u8);
        out.extend_from_slice(value);
    }
    out
}

/// Encode a `0xB1` get-properties query body: command type + count + bare
/// ids (no value/size — this is a request, not a report).
pub fn encode_get_properties(ids: &[u16]) -> Vec<u8> {
    let mut out = vec![0x01, ids.len() as u8];
    for id in ids {
        out.extend_from_slice(&id.to_le_bytes());
    }
    out
}

/// Tracks which property IDs a device has advertised support for, and
/// which local values are "dirty" and need to be sent on the next `apply`.
/// Invariant: `updated ⊆ supported` must hold before emitting a set command
/// (spec §3 "AC Properties", §9 "Dirty-tracking").
#[derive(Debug, Clone, Default)]
pub struct PropertyTracker {
    supported: BTreeSet<u16>,
    updated: BTreeSet<u16>,
}

impl PropertyTracker {
    pub fn mark_supported(&mut self, id: u16) {
        self.supported.insert(id);
    }

    pub fn is_supported(&self, id: u16) -> bool {
        self.supported.contains(&id)
    }

    pub fn mark_dirty(&mut self, id: u16) {
        if self.supported.contains(&id) {
            self.updated.insert(id);
        }
    }

    pub fn clear_dirty(&mut self, id: u16) {
        self.updated.remove(&id);
    }

    pub fn dirty_ids(&self) -> Vec<u16> {
        self.updated.iter().copied().collect()
    }

    pub fn is_dirty(&self, id: u16) -> bool {
        self.updated.contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_dirty_requires_support() {
        let mut t = PropertyTracker::default();
        t.mark_dirty(PropertyId::SwingUdAngle.as_u16());
        assert!(!t.is_dirty(PropertyId::SwingUdAngle.as_u16()));

        t.mark_supported(PropertyId::SwingUdAngle.as_u16());
        t.mark_dirty(PropertyId::SwingUdAngle.as_u16());
        assert!(t.is_dirty(PropertyId::SwingUdAngle.as_u16()));
    }

    #[test]
    fn parse_property_payload_report() {
        // command=0x01, count=0x01, entry: id=SWING_UD_ANGLE LE, size=1,
        // value=0x03 (POS_3), status=0x00 (OK).
        let report = vec![0x01, 0x01, 0x09, 0x00, 0x01, 0x03, 0x00];
        let entries = parse_property_payload(&report).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, PropertyId::SwingUdAngle.as_u16());
        assert_eq!(entries[0].value, vec![0x03]);
        assert_eq!(entries[0].status, Some(0x00));
    }
}
