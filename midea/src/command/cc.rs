//! Commercial cooler payload codec: TLV-addressed "control IDs" for
//! set/get, and the `0x01FE`-headed state query response (spec §3
//! "Commercial cooler state", §9 "Open questions").

use crate::crypto::crc8;
use crate::error::InvalidFrameError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ControlId {
    Power = 0x0000,
    TargetTemperature = 0x0003,
    TemperatureUnit = 0x000C,
    Mode = 0x0012,
    FanSpeed = 0x0015,
    VertSwingAngle = 0x001C,
    HorzSwingAngle = 0x001E,
    WindSense = 0x0020,
    Eco = 0x0028,
    Silent = 0x002A,
    Sleep = 0x002C,
    SelfClean = 0x002E,
    Purifier = 0x003A,
    Beep = 0x003F,
    Display = 0x0040,
    AuxMode = 0x0043,
}

impl ControlId {
    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            0x0000 => Some(Self::Power),
            0x0003 => Some(Self::TargetTemperature),
            0x000C => Some(Self::TemperatureUnit),
            0x0012 => Some(Self::Mode),
            0x0015 => Some(Self::FanSpeed),
            0x001C => Some(Self::VertSwingAngle),
            0x001E => Some(Self::HorzSwingAngle),
            0x0020 => Some(Self::WindSense),
            0x0028 => Some(Self::Eco),
            0x002A => Some(Self::Silent),
            0x002C => Some(Self::Sleep),
            0x002E => Some(Self::SelfClean),
            0x003A => Some(Self::Purifier),
            0x003F => Some(Self::Beep),
            0x0040 => Some(Self::Display),
            0x0043 => Some(Self::AuxMode),
            _ => None,
        }
    }

    /// Wire target-temperature encoding: `byte = (2 * T°C) + 80`.
    pub fn encode_value(self, value: i64) -> Vec<u8> {
        match self {
            Self::TargetTemperature => vec![((2 * value) + 80) as u8],
            Self::Purifier => vec![if value != 0 { 0x01 } else { 0x02 }],
            _ => vec![value as u8],
        }
    }

    pub fn decode_value(self, data: &[u8]) -> ControlValue {
        match self {
            Self::TargetTemperature => ControlValue::Temperature((data[0] as f32 / 2.0) - 40.0),
            Self::Purifier => ControlValue::Bool(data[0] == 0x01),
            _ => ControlValue::Raw(data[0]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlValue {
    Raw(u8),
    Bool(bool),
    Temperature(f32),
}

/// 22-byte bare state query, message-id and CRC-8 trailer appended by the
/// frame layer's common command wrapper.
pub fn encode_query() -> Vec<u8> {
    let mut payload = vec![0u8; 22];
    payload[0] = 0x01; // COMMAND_QUERY
    payload
}

/// Build a `0xC3` control command: a TLV list of `{id:u16 BE, size:u8,
/// value, terminator:0xFF}` entries.
pub fn encode_control(controls: &[(ControlId, i64)]) -> Vec<u8> {
    let mut payload = Vec::new();
    for &(control, value) in controls {
        let bytes = control.encode_value(value);
        payload.extend_from_slice(&(control as u16).to_be_bytes());
        payload.push(bytes.len() as u8);
        payload.extend_from_slice(&bytes);
        payload.push(0xFF);
    }
    payload
}

pub fn append_trailer(payload: &mut Vec<u8>, message_id: u8) {
    payload.push(message_id);
    let crc = crc8(payload);
    payload.push(crc);
}

/// Decoded `0x01FE`-headed state query response (spec §9: fan-speed and
/// related fields only exist at these offsets in this envelope; any
/// payload without the `0x01FE` header is rejected outright rather than
/// guessed at).
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse {
    pub power_on: bool,
    pub target_temperature: f32,
    pub indoor_temperature: f32,
    pub supported_modes: Vec<u8>,
    pub operational_mode: u8,
    pub fan_speed: u8,
    pub swing_ud_angle: u8,
    pub swing_lr_angle: u8,
    pub eco: bool,
    pub silent: bool,
    pub sleep: bool,
    pub purifier: bool,
    pub aux_mode: u8,
}

impl QueryResponse {
    pub fn decode(payload: &[u8]) -> Result<Self, InvalidFrameError> {
        if payload.len() < 88 {
            return Err(InvalidFrameError::new("commercial cooler query payload too short", 0));
        }
        if &payload[0..2] != [0x01, 0xFE] {
            return Err(InvalidFrameError::new("query response missing 0x01FE header", 0));
        }

        Ok(Self {
            power_on: payload[8] != 0,
            target_temperature: (payload[11] as f32 / 2.0) - 40.0,
            indoor_temperature: (((payload[12] as u16) << 8 | payload[13] as u16) as f32) / 10.0,
            supported_modes: payload[26..31].to_vec(),
            operational_mode: payload[31],
            fan_speed: payload[34],
            swing_ud_angle: payload[41],
            swing_lr_angle: payload[43],
            eco: payload[56] != 0,
            silent: payload[58] != 0,
            sleep: payload[60] != 0,
            purifier: payload[75] & 0x01 != 0,
            aux_mode: payload[87],
        })
    }
}

/// Decoded response to a `0xC3` control command: the TLV list echoed back,
/// keyed by control id.
pub fn decode_control_response(payload: &[u8]) -> Result<Vec<(ControlId, ControlValue)>, InvalidFrameError> {
    if payload.len() < 6 {
        return Err(InvalidFrameError::new("commercial cooler control response too short", 0));
    }

    let mut out = Vec::new();
    let mut data = payload;
    while data.len() >= 5 {
        let size = data[2] as usize;
        if size == 0 {
            data = &data[5.min(data.len())..];
            continue;
        }
        if data.len() < 4 + size {
            return Err(InvalidFrameError::new("commercial cooler control entry truncated", 0));
        }
        let raw_id = u16::from_be_bytes([data[0], data[1]]);
        if let Some(control) = ControlId::from_u16(raw_id) {
            out.push((control, control.decode_value(&data[3..3 + size])));
        }
        data = &data[4 + size..];
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_temperature_wire_encoding() {
        assert_eq!(ControlId::TargetTemperature.encode_value(22), vec![124]);
        assert_eq!(ControlId::TargetTemperature.decode_value(&[124]), ControlValue::Temperature(22.0));
    }

    #[test]
    fn query_response_rejects_missing_header() {
        let payload = vec![0u8; 88];
        assert!(QueryResponse::decode(&payload).is_err());
    }

    #[test]
    fn query_response_decodes_fan_speed_at_offset_34() {
        let mut payload = vec![0u8; 88];
        payload[0] = 0x01;
        payload[1] = 0xFE;
        payload[8] = 1; // power on
        payload[11] = 124; // 22C
        payload[34] = 60; // fan speed

        let resp = QueryResponse::decode(&payload).unwrap();
        assert!(resp.power_on);
        assert_eq!(resp.target_temperature, 22.0);
        assert_eq!(resp.fan_speed, 60);
    }

    #[test]
    fn control_response_parses_tlv_entries() {
        let mut payload = vec![0u8, 0x00, 0x01, 0x01, 0xFF]; // POWER=1
        payload.extend_from_slice(&[0x00, 0x0C, 0x01, 0x00, 0xFF]); // TEMPERATURE_UNIT=0
        let entries = decode_control_response(&payload).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, ControlId::Power);
    }
}
