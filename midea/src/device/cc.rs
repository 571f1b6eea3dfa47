//! Commercial cooler state machine: single-zone state plus fan/swing/eco/
//! silent/sleep/purifier/aux toggles, addressed entirely through the
//! TLV-style control-id channel (spec §4.8).

use tracing::{debug, instrument, warn};

use crate::command::cc::{self, ControlId, ControlValue};
use crate::error::Result;
use crate::frame::{self, DeviceType, Frame, FrameType};
use crate::transport::{Transport, LAN_RESPONSE_TIMEOUT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationalMode {
    Fan,
    Cool,
    Heat,
    Dry,
}

impl OperationalMode {
    pub fn from_value(v: u8) -> Self {
        match v {
            0x01 => Self::Fan,
            0x02 => Self::Cool,
            0x03 => Self::Heat,
            0x06 => Self::Dry,
            _ => Self::Fan,
        }
    }

    pub fn value(self) -> u8 {
        match self {
            Self::Fan => 0x01,
            Self::Cool => 0x02,
            Self::Heat => 0x03,
            Self::Dry => 0x06,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanSpeed {
    Off,
    L1,
    L2,
    L3,
    L4,
    L5,
    L6,
    L7,
    Auto,
}

impl FanSpeed {
    pub fn from_value(v: u8) -> Self {
        match v {
            0x00 => Self::Off,
            0x01 => Self::L1,
            0x02 => Self::L2,
            0x03 => Self::L3,
            0x04 => Self::L4,
            0x05 => Self::L5,
            0x06 => Self::L6,
            0x07 => Self::L7,
            _ => Self::Auto,
        }
    }

    pub fn value(self) -> u8 {
        match self {
            Self::Off => 0x00,
            Self::L1 => 0x01,
            Self::L2 => 0x02,
            Self::L3 => 0x03,
            Self::L4 => 0x04,
            Self::L5 => 0x05,
            Self::L6 => 0x06,
            Self::L7 => 0x07,
            Self::Auto => 0x08,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwingAngle {
    Pos1,
    Pos2,
    Pos3,
    Pos4,
    Pos5,
    Auto,
}

impl SwingAngle {
    pub fn from_value(v: u8) -> Self {
        match v {
            0x01 => Self::Pos1,
            0x02 => Self::Pos2,
            0x03 => Self::Pos3,
            0x04 => Self::Pos4,
            0x05 => Self::Pos5,
            0x06 => Self::Auto,
            _ => Self::Pos3,
        }
    }

    pub fn value(self) -> u8 {
        match self {
            Self::Pos1 => 0x01,
            Self::Pos2 => 0x02,
            Self::Pos3 => 0x03,
            Self::Pos4 => 0x04,
            Self::Pos5 => 0x05,
            Self::Auto => 0x06,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommercialCooler {
    pub online: bool,
    pub supported: bool,

    pub power: bool,
    pub target_temperature: f32,
    pub indoor_temperature: Option<f32>,
    pub operational_mode: OperationalMode,
    pub fan_speed: FanSpeed,
    pub horizontal_swing_angle: SwingAngle,
    pub vertical_swing_angle: SwingAngle,

    pub eco: bool,
    pub silent: bool,
    pub sleep: bool,
    pub purifier: bool,
    pub aux_mode: u8,

    pub supported_modes: Vec<u8>,
}

impl Default for CommercialCooler {
    fn default() -> Self {
        Self {
            online: false,
            supported: false,
            power: false,
            target_temperature: 17.0,
            indoor_temperature: None,
            operational_mode: OperationalMode::Fan,
            fan_speed: FanSpeed::Auto,
            horizontal_swing_angle: SwingAngle::Pos3,
            vertical_swing_angle: SwingAngle::Pos3,
            eco: false,
            silent: false,
            sleep: false,
            purifier: false,
            aux_mode: 0x20, // AuxHeatMode::OFF
            supported_modes: Vec::new(),
        }
    }
}

const MIN_TARGET_TEMPERATURE: f32 = 17.0;
const MAX_TARGET_TEMPERATURE: f32 = 30.0;

impl CommercialCooler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_target_temperature(&self) -> f32 {
        MIN_TARGET_TEMPERATURE
    }

    pub fn max_target_temperature(&self) -> f32 {
        MAX_TARGET_TEMPERATURE
    }

    #[instrument(skip(self, transport))]
    pub async fn refresh(&mut self, transport: &mut Transport) -> Result<()> {
        let query = frame::encode(DeviceType::CommercialAc, FrameType::Query, &cc::encode_query());
        match transport.request(&query, LAN_RESPONSE_TIMEOUT).await {
            Ok(raw) => {
                self.online = true;
                self.handle_query_response(&raw);
            }
            Err(e) => {
                warn!(error = %e, "no state response, marking device offline");
                self.online = false;
            }
        }
        Ok(())
    }

    #[instrument(skip(self, transport))]
    pub async fn apply(&mut self, transport: &mut Transport) -> Result<()> {
        let controls = vec![
            (ControlId::Power, self.power as i64),
            (ControlId::TargetTemperature, self.target_temperature.clamp(MIN_TARGET_TEMPERATURE, MAX_TARGET_TEMPERATURE) as i64),
            (ControlId::Mode, self.operational_mode.value() as i64),
            (ControlId::FanSpeed, self.fan_speed.value() as i64),
            (ControlId::VertSwingAngle, self.vertical_swing_angle.value() as i64),
            (ControlId::HorzSwingAngle, self.horizontal_swing_angle.value() as i64),
            (ControlId::Eco, self.eco as i64),
            (ControlId::Sleep, self.sleep as i64),
            (ControlId::AuxMode, self.aux_mode as i64),
        ];
        let mut payload = cc::encode_control(&controls);
        cc::append_trailer(&mut payload, 0x00);

        let control = frame::encode(DeviceType::CommercialAc, FrameType::Control, &payload);
        if let Ok(raw) = transport.request(&control, LAN_RESPONSE_TIMEOUT).await {
            self.handle_control_response(&raw);
        }
        Ok(())
    }

    fn handle_query_response(&mut self, raw: &[u8]) {
        let frame = match Frame::decode(raw) {
            Ok(f) => f,
            Err(e) => {
                debug!(%e, "ignored unparseable frame");
                return;
            }
        };

        match cc::QueryResponse::decode(&frame.payload) {
            Ok(state) => {
                self.power = state.power_on;
                self.target_temperature = state.target_temperature;
                self.indoor_temperature = Some(state.indoor_temperature);
                self.operational_mode = OperationalMode::from_value(state.operational_mode);
                self.fan_speed = FanSpeed::from_value(state.fan_speed);
                self.horizontal_swing_angle = SwingAngle::from_value(state.swing_lr_angle);
                self.vertical_swing_angle = SwingAngle::from_value(state.swing_ud_angle);
                self.eco = state.eco;
                self.silent = state.silent;
                self.sleep = state.sleep;
                self.purifier = state.purifier;
                self.aux_mode = state.aux_mode;
                self.supported_modes = state.supported_modes;
                self.supported = true;
            }
            Err(e) => debug!(%e, "ignored unrecognized commercial cooler query response"),
        }
    }

    fn handle_control_response(&mut self, raw: &[u8]) {
        let frame = match Frame::decode(raw) {
            Ok(f) => f,
            Err(e) => {
                debug!(%e, "ignored unparseable frame");
                return;
            }
        };

        match cc::decode_control_response(&frame.payload) {
            Ok(entries) => {
                for (control, value) in entries {
                    self.apply_control_value(control, value);
                }
            }
            Err(e) => debug!(%e, "ignored unrecognized commercial cooler control response"),
        }
    }

    fn apply_control_value(&mut self, control: ControlId, value: ControlValue) {
        match (control, value) {
            (ControlId::Power, ControlValue::Raw(v)) => self.power = v != 0,
            (ControlId::TargetTemperature, ControlValue::Temperature(t)) => self.target_temperature = t,
            (ControlId::Mode, ControlValue::Raw(v)) => self.operational_mode = OperationalMode::from_value(v),
            (ControlId::FanSpeed, ControlValue::Raw(v)) => self.fan_speed = FanSpeed::from_value(v),
            (ControlId::VertSwingAngle, ControlValue::Raw(v)) => self.vertical_swing_angle = SwingAngle::from_value(v),
            (ControlId::HorzSwingAngle, ControlValue::Raw(v)) => {
                self.horizontal_swing_angle = SwingAngle::from_value(v)
            }
            (ControlId::Eco, ControlValue::Raw(v)) => self.eco = v != 0,
            (ControlId::Silent, ControlValue::Raw(v)) => self.silent = v != 0,
            (ControlId::Sleep, ControlValue::Raw(v)) => self.sleep = v != 0,
            (ControlId::Purifier, ControlValue::Bool(v)) => self.purifier = v,
            (ControlId::AuxMode, ControlValue::Raw(v)) => self.aux_mode = v,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_temperature_clamped_to_device_bounds() {
        let cooler = CommercialCooler::new();
        assert_eq!(cooler.min_target_temperature(), 17.0);
        assert_eq!(cooler.max_target_temperature(), 30.0);
    }

    #[test]
    fn new_commercial_cooler_defaults_to_offline_and_unsupported() {
        let cooler = CommercialCooler::new();
        assert!(!cooler.online);
        assert!(!cooler.supported);
        assert_eq!(cooler.fan_speed, FanSpeed::Auto);
    }

    #[test]
    fn control_response_updates_only_reported_controls() {
        let mut cooler = CommercialCooler::new();
        cooler.apply_control_value(ControlId::Power, ControlValue::Raw(1));
        assert!(cooler.power);
        assert_eq!(cooler.fan_speed, FanSpeed::Auto);
    }
}
