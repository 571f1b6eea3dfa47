//! Residential air conditioner payload codec: request/set-state commands,
//! and state/properties/capabilities/energy/humidity response decoding
//! (spec §3 "AC State"/"AC Capabilities"/"AC Properties", §4.3).

use rand::Rng;

use crate::capability::{parse_capability_payload, CapabilityEntry};
use crate::crypto::crc8;
use crate::error::InvalidFrameError;
use crate::property::{parse_property_payload, PropertyEntry};

/// Unknown/absent/empty inputs decode to the field's declared default
/// rather than failing, per the state-to-enum reduction rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationalMode {
    Auto,
    Cool,
    Dry,
    Heat,
    FanOnly,
    SmartDry,
}

impl OperationalMode {
    pub fn from_value(v: u8) -> Self {
        match v {
            1 => Self::Auto,
            2 => Self::Cool,
            3 => Self::Dry,
            4 => Self::Heat,
            5 => Self::FanOnly,
            6 => Self::SmartDry,
            _ => Self::FanOnly,
        }
    }

    pub fn value(self) -> u8 {
        match self {
            Self::Auto => 1,
            Self::Cool => 2,
            Self::Dry => 3,
            Self::Heat => 4,
            Self::FanOnly => 5,
            Self::SmartDry => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanSpeed {
    Silent,
    Low,
    Medium,
    High,
    Max,
    Auto,
    Custom(u8),
}

impl FanSpeed {
    pub fn from_value(v: u8) -> Self {
        match v {
            20 => Self::Silent,
            40 => Self::Low,
            60 => Self::Medium,
            80 => Self::High,
            100 => Self::Max,
            102 => Self::Auto,
            1..=100 => Self::Custom(v),
            _ => Self::Auto,
        }
    }

    pub fn value(self) -> u8 {
        match self {
            Self::Silent => 20,
            Self::Low => 40,
            Self::Medium => 60,
            Self::High => 80,
            Self::Max => 100,
            Self::Auto => 102,
            Self::Custom(v) => v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwingMode {
    Off,
    Horizontal,
    Vertical,
    Both,
}

impl SwingMode {
    pub fn from_value(v: u8) -> Self {
        match v {
            0x00 => Self::Off,
            0x03 => Self::Horizontal,
            0x0C => Self::Vertical,
            0x0F => Self::Both,
            _ => Self::Off,
        }
    }

    pub fn value(self) -> u8 {
        match self {
            Self::Off => 0x00,
            Self::Horizontal => 0x03,
            Self::Vertical => 0x0C,
            Self::Both => 0x0F,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwingAngle {
    Off,
    Pos1,
    Pos2,
    Pos3,
    Pos4,
    Pos5,
}

impl SwingAngle {
    pub fn from_value(v: u8) -> Self {
        match v {
            1 => Self::Pos1,
            2 => Self::Pos2,
            3 => Self::Pos3,
            4 => Self::Pos4,
            5 => Self::Pos5,
            _ => Self::Off,
        }
    }

    pub fn value(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Pos1 => 1,
            Self::Pos2 => 2,
            Self::Pos3 => 3,
            Self::Pos4 => 4,
            Self::Pos5 => 5,
        }
    }
}

/// Decoded `0xC0` state report. Mirrors the byte layout of the `0x40`
/// set-state command it was generated from.
#[derive(Debug, Clone, PartialEq)]
pub struct StateResponse {
    pub power: bool,
    pub target_temperature: f32,
    pub operational_mode: OperationalMode,
    pub fan_speed: FanSpeed,
    pub swing_mode: SwingMode,
    pub eco_mode: bool,
    pub turbo_mode: bool,
    pub freeze_protection_mode: bool,
    pub sleep_mode: bool,
    pub indoor_temperature: f32,
    pub outdoor_temperature: f32,
}

/// `byte = (2 * T) + 50` for indoor/outdoor sensor readings in the state
/// report, distinct from the nibble encoding used for the target setpoint.
fn decode_sensor_temperature(byte: u8) -> f32 {
    (byte as f32 - 50.0) / 2.0
}

fn encode_sensor_temperature(celsius: f32) -> u8 {
    ((celsius * 2.0) + 50.0).round() as u8
}

impl StateResponse {
    pub fn decode(payload: &[u8]) -> Result<Self, InvalidFrameError> {
        if payload.len() < 14 || payload[0] != 0xC0 {
            return Err(InvalidFrameError::new("AC state payload too short or missing 0xC0 marker", 0));
        }

        let power = payload[1] & 0x01 != 0;
        let mode_bits = (payload[2] & 0xE0) >> 5;
        let temp_integer = (payload[2] & 0x1F) as i32 + 16;
        let half_step = payload[3] & 0x80 != 0;
        let target_temperature = temp_integer as f32 + if half_step { 0.5 } else { 0.0 };

        let fan_value = payload[3] & 0x7F;
        let turbo_mode = payload[8] & 0x20 != 0;
        let eco_mode = payload[9] & 0x10 != 0;
        let sleep_mode = payload[9] & 0x02 != 0;
        let swing_mode = SwingMode::from_value(payload[7] & 0x0F);
        let freeze_protection_mode = payload[18] & 0x08 != 0;

        let indoor_temperature = decode_sensor_temperature(payload[11]);
        let outdoor_temperature = decode_sensor_temperature(payload[12]);

        Ok(Self {
            power,
            target_temperature,
            operational_mode: OperationalMode::from_value(mode_bits),
            fan_speed: FanSpeed::from_value(fan_value),
            swing_mode,
            eco_mode,
            turbo_mode,
            freeze_protection_mode,
            sleep_mode,
            indoor_temperature,
            outdoor_temperature,
        })
    }
}

/// Build a 21-byte `0x41` request-state query. Byte 1 is fixed `0x81`; the
/// trailing two bytes are a random nonce the device echoes back.
pub fn encode_request_state() -> Vec<u8> {
    let mut payload = vec![0u8; 21];
    payload[0] = 0x41;
    payload[1] = 0x81;
    let mut rng = rand::thread_rng();
    payload[19] = rng.gen();
    payload[20] = rng.gen();
    payload
}

/// Full desired-state snapshot used to build a `0x40` set-state command.
/// Every field is always sent: the device overwrites its entire state from
/// this payload, so a partial send would silently clear unrelated settings.
#[derive(Debug, Clone)]
pub struct SetStateCommand {
    pub power: bool,
    pub target_temperature: f32,
    pub operational_mode: OperationalMode,
    pub fan_speed: FanSpeed,
    pub swing_mode: SwingMode,
    pub eco_mode: bool,
    pub turbo_mode: bool,
    pub freeze_protection_mode: bool,
}

pub fn encode_set_state(cmd: &SetStateCommand) -> Vec<u8> {
    let mut payload = vec![0u8; 24];
    payload[0] = 0x40;

    if cmd.power {
        payload[1] |= 0x01;
    }

    let clamped = cmd.target_temperature.clamp(17.0, 30.0);
    let integer = (clamped.floor() as i32 - 16).clamp(0, 0x1F) as u8;
    let half = (clamped.fract().abs() - 0.5).abs() < f32::EPSILON;
    payload[2] = (cmd.operational_mode.value() << 5) | integer;
    payload[3] = if half { 0x80 } else { 0 } | cmd.fan_speed.value();

    if cmd.turbo_mode {
        payload[8] |= 0x20;
    }
    if cmd.eco_mode {
        payload[9] |= 0x10;
    }
    payload[7] = cmd.swing_mode.value();
    if cmd.freeze_protection_mode {
        payload[18] |= 0x08;
    }

    let mut rng = rand::thread_rng();
    payload[22] = rng.gen();
    payload[23] = crc8(&payload[..23]);
    payload
}

/// `0xB5` capability query: a bare one-byte request.
pub fn encode_capability_query() -> Vec<u8> {
    vec![0xB5]
}

pub fn decode_capabilities(payload: &[u8]) -> Result<Vec<CapabilityEntry>, InvalidFrameError> {
    parse_capability_payload(payload)
}

/// `0xC1` energy usage response. `use_alternate_energy_format` selects
/// between the default 5-byte BCD encoding and the 4+3-byte binary
/// encoding used by a subset of models (spec §4.3, §9 "Energy format
/// selection").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyUsageResponse {
    pub total_kwh: f64,
    pub current_kwh: f64,
    pub real_time_w: f64,
}

impl EnergyUsageResponse {
    pub fn decode(payload: &[u8], use_alternate_format: bool) -> Result<Self, InvalidFrameError> {
        if payload.is_empty() || payload[0] != 0xC1 {
            return Err(InvalidFrameError::new("energy payload missing 0xC1 marker", 0));
        }

        if use_alternate_format {
            Self::decode_binary(payload)
        } else {
            Self::decode_bcd(payload)
        }
    }

    fn decode_bcd(payload: &[u8]) -> Result<Self, InvalidFrameError> {
        if payload.len() < 1 + 5 + 5 {
            return Err(InvalidFrameError::new("BCD energy payload too short", 0));
        }
        let total_kwh = bcd_to_u64(&payload[1..6]) as f64 / 100.0;
        let current_kwh = bcd_to_u64(&payload[6..11]) as f64 / 100.0;
        Ok(Self { total_kwh, current_kwh, real_time_w: 0.0 })
    }

    fn decode_binary(payload: &[u8]) -> Result<Self, InvalidFrameError> {
        if payload.len() < 1 + 4 + 4 + 3 {
            return Err(InvalidFrameError::new("binary energy payload too short", 0));
        }
        let total_kwh = be_u32(&payload[1..5]) as f64 / 100.0;
        let current_kwh = be_u32(&payload[5..9]) as f64 / 100.0;
        let real_time_w = be_u24(&payload[9..12]) as f64 / 10.0;
        Ok(Self { total_kwh, current_kwh, real_time_w })
    }
}

fn bcd_to_u64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| {
        acc * 100 + (b >> 4) as u64 * 10 + (b & 0x0F) as u64
    })
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn be_u24(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]])
}

/// `0xB1` humidity response: a single percentage byte.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HumidityResponse {
    pub indoor_humidity: Option<u8>,
}

impl HumidityResponse {
    pub fn decode(payload: &[u8]) -> Result<Self, InvalidFrameError> {
        if payload.len() < 2 {
            return Err(InvalidFrameError::new("humidity payload too short", 0));
        }
        let value = payload[1];
        Ok(Self { indoor_humidity: if value == 0 { None } else { Some(value) } })
    }
}

/// `0xB0`/`0xB1` properties channel glue, reusing the generic property TLV
/// parser.
pub fn decode_properties(payload: &[u8]) -> Result<Vec<PropertyEntry>, InvalidFrameError> {
    parse_property_payload(payload)
}

/// Dispatch a decoded base frame's payload to the matching response kind,
/// for AC frames only.
#[derive(Debug, Clone)]
pub enum Response {
    State(StateResponse),
    Properties(Vec<PropertyEntry>),
    Capabilities(Vec<CapabilityEntry>),
    Energy(EnergyUsageResponse),
    Humidity(HumidityResponse),
}

pub fn construct(payload: &[u8], use_alternate_energy_format: bool) -> Result<Response, InvalidFrameError> {
    match payload.first() {
        Some(0xC0) => StateResponse::decode(payload).map(Response::State),
        Some(0xB0) | Some(0xB1) => decode_properties(payload).map(Response::Properties),
        Some(0xB5) => decode_capabilities(payload).map(Response::Capabilities),
        Some(0xC1) => EnergyUsageResponse::decode(payload, use_alternate_energy_format).map(Response::Energy),
        _ => Err(InvalidFrameError::new("unrecognized AC response marker", 0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A captured V3 state report: target=21.0, indoor=21.0, outdoor=28.5,
    /// eco on, turbo/freeze-protection/sleep off, mode=COOL, fan=AUTO,
    /// swing=VERTICAL.
    const STATE_REPORT_PAYLOAD: [u8; 24] = [
        0xC0, 0x01, 0x45, 0x66, 0x00, 0x00, 0x00, 0x3C, 0x00, 0x10, 0x04, 0x5C, 0x6B, 0x20, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02,
    ];

    #[test]
    fn decodes_captured_state_report() {
        let state = StateResponse::decode(&STATE_REPORT_PAYLOAD).unwrap();
        assert_eq!(state.target_temperature, 21.0);
        assert_eq!(state.indoor_temperature, 21.0);
        assert_eq!(state.outdoor_temperature, 28.5);
        assert!(state.eco_mode);
        assert!(!state.turbo_mode);
        assert!(!state.freeze_protection_mode);
        assert!(!state.sleep_mode);
        assert_eq!(state.operational_mode, OperationalMode::Cool);
        assert_eq!(state.fan_speed, FanSpeed::Auto);
        assert_eq!(state.swing_mode, SwingMode::Vertical);
    }

    #[test]
    fn unknown_mode_value_decodes_to_default() {
        assert_eq!(OperationalMode::from_value(0xFF), OperationalMode::FanOnly);
        assert_eq!(SwingMode::from_value(0xFF), SwingMode::Off);
    }

    #[test]
    fn fan_speed_round_trips_named_and_custom_values() {
        assert_eq!(FanSpeed::from_value(102), FanSpeed::Auto);
        assert_eq!(FanSpeed::from_value(55), FanSpeed::Custom(55));
        assert_eq!(FanSpeed::Custom(55).value(), 55);
    }

    #[test]
    fn request_state_has_fixed_marker_bytes() {
        let payload = encode_request_state();
        assert_eq!(payload.len(), 21);
        assert_eq!(payload[0], 0x41);
        assert_eq!(payload[1], 0x81);
    }

    #[test]
    fn set_state_is_full_snapshot_with_trailing_crc() {
        let cmd = SetStateCommand {
            power: true,
            target_temperature: 21.0,
            operational_mode: OperationalMode::Cool,
            fan_speed: FanSpeed::Auto,
            swing_mode: SwingMode::Vertical,
            eco_mode: true,
            turbo_mode: false,
            freeze_protection_mode: false,
        };
        let payload = encode_set_state(&cmd);
        assert_eq!(payload.len(), 24);
        assert_eq!(payload[0], 0x40);
        assert_eq!(payload[23], crc8(&payload[..23]));
    }

    #[test]
    fn energy_bcd_decode() {
        let mut payload = vec![0xC1];
        payload.extend_from_slice(&[0x00, 0x56, 0x50, 0x00, 0x20]); // 5650.20
        payload.extend_from_slice(&[0x00, 0x15, 0x14, 0x00, 0x00]); // 1514.00
        let energy = EnergyUsageResponse::decode(&payload, false).unwrap();
        assert_eq!(energy.total_kwh, 5650.20);
        assert_eq!(energy.current_kwh, 1514.00);
    }

    #[test]
    fn energy_binary_decode() {
        let mut payload = vec![0xC1];
        payload.extend_from_slice(&1504u32.to_be_bytes()); // 15.04 kWh
        payload.extend_from_slice(&6u32.to_be_bytes()); // 0.06 kWh
        payload.extend_from_slice(&2795u32.to_be_bytes()[1..]); // 279.5 W
        let energy = EnergyUsageResponse::decode(&payload, true).unwrap();
        assert_eq!(energy.total_kwh, 15.04);
        assert_eq!(energy.current_kwh, 0.06);
        assert_eq!(energy.real_time_w, 279.5);
    }
}
