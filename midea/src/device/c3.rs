//! Heat-pump state machine: zone 1/2, domestic hot water, and room
//! thermostat state, refreshed via `QUERY_BASIC` and optionally
//! `QUERY_UNIT_PARAMETERS` (spec §4.8).

use tracing::{debug, instrument, warn};

use crate::command::c3::{self, ControlBasicCommand, QueryType, Response};
use crate::error::Result;
use crate::frame::{self, DeviceType, Frame, FrameType};
use crate::transport::{Transport, LAN_RESPONSE_TIMEOUT};

/// One heating/cooling zone of a heat pump.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Zone {
    pub power: bool,
    pub curve_enabled: bool,
    pub target_temperature: u8,
}

#[derive(Debug, Clone)]
pub struct HeatPump {
    pub online: bool,
    pub supported: bool,

    pub run_mode: u8,
    pub heat_enable: bool,
    pub cool_enable: bool,

    pub zone1: Zone,
    pub zone2: Option<Zone>,

    pub dhw_power: bool,
    pub dhw_enable: bool,
    pub dhw_target_temperature: u8,
    pub dhw_min_temperature: u8,
    pub dhw_max_temperature: u8,

    pub room_thermostat_power: bool,
    pub room_thermostat_enable: bool,
    pub room_target_temperature: f32,
    pub room_min_temperature: f32,
    pub room_max_temperature: f32,

    /// Byte 1 mask 0x40 is shared on the wire by tank-booster force-state
    /// and fast-DHW; both fields read the same bit until a device is found
    /// that disambiguates them (spec §9 "Open Question").
    pub tbh_forced: bool,
    pub fast_dhw: bool,

    pub tank_temperature: Option<u8>,
    pub error_code: u8,

    pub outdoor_temperature: Option<i8>,
    pub room_temperature: Option<i8>,
    pub water_temperature_2: Option<i8>,
}

impl Default for HeatPump {
    fn default() -> Self {
        Self {
            online: false,
            supported: false,
            run_mode: 0,
            heat_enable: false,
            cool_enable: false,
            zone1: Zone { target_temperature: 25, ..Zone::default() },
            zone2: None,
            dhw_power: false,
            dhw_enable: false,
            dhw_target_temperature: 25,
            dhw_min_temperature: 20,
            dhw_max_temperature: 60,
            room_thermostat_power: false,
            room_thermostat_enable: false,
            room_target_temperature: 25.0,
            room_min_temperature: 17.0,
            room_max_temperature: 30.0,
            tbh_forced: false,
            fast_dhw: false,
            tank_temperature: None,
            error_code: 0,
            outdoor_temperature: None,
            room_temperature: None,
            water_temperature_2: None,
        }
    }
}

impl HeatPump {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queries `QUERY_BASIC`, then opportunistically `QUERY_UNIT_PARAMETERS`
    /// for the outdoor/room/secondary-water sensor readings (spec §4.8).
    #[instrument(skip(self, transport))]
    pub async fn refresh(&mut self, transport: &mut Transport) -> Result<()> {
        let basic = frame::encode(DeviceType::HeatPump, FrameType::Query, &c3::encode_query(QueryType::Basic));
        match transport.request(&basic, LAN_RESPONSE_TIMEOUT).await {
            Ok(raw) => {
                self.online = true;
                self.handle_response(&raw);
            }
            Err(e) => {
                warn!(error = %e, "no basic response, marking device offline");
                self.online = false;
                return Ok(());
            }
        }

        let unit_params =
            frame::encode(DeviceType::HeatPump, FrameType::Query, &c3::encode_query(QueryType::UnitParameters));
        if let Ok(raw) = transport.request(&unit_params, LAN_RESPONSE_TIMEOUT).await {
            self.handle_response(&raw);
        }

        Ok(())
    }

    pub async fn apply(&mut self, transport: &mut Transport) -> Result<()> {
        let cmd = ControlBasicCommand {
            zone1_power: self.zone1.power,
            zone2_power: self.zone2.map(|z| z.power).unwrap_or(false),
            dhw_power: self.dhw_power,
            run_mode: self.run_mode,
            zone1_target_temperature: self.zone1.target_temperature,
            zone2_target_temperature: self.zone2.map(|z| z.target_temperature).unwrap_or(0),
            dhw_target_temperature: self.dhw_target_temperature,
            room_target_temperature: self.room_target_temperature,
            zone1_curve: self.zone1.curve_enabled,
            zone2_curve: self.zone2.map(|z| z.curve_enabled).unwrap_or(false),
            tbh: self.tbh_forced,
            fast_dhw: self.fast_dhw,
        };
        let control =
            frame::encode(DeviceType::HeatPump, FrameType::Control, &c3::encode_control_basic(&cmd));
        if let Ok(raw) = transport.request(&control, LAN_RESPONSE_TIMEOUT).await {
            self.handle_response(&raw);
        }
        Ok(())
    }

    fn handle_response(&mut self, raw: &[u8]) {
        let frame = match Frame::decode(raw) {
            Ok(f) => f,
            Err(e) => {
                debug!(%e, "ignored unparseable frame");
                return;
            }
        };

        match c3::construct(frame.frame_type, &frame.payload) {
            Ok(Response::Basic(basic)) => {
                self.run_mode = basic.run_mode;
                self.heat_enable = basic.heat_enable;
                self.cool_enable = basic.cool_enable;

                if basic.zone2_enable && self.zone2.is_none() {
                    self.zone2 = Some(Zone::default());
                }

                self.zone1.power = basic.zone1_power;
                self.zone1.curve_enabled = basic.zone1_curve;
                self.zone1.target_temperature = basic.zone1_target_temperature;

                if let Some(zone2) = self.zone2.as_mut() {
                    zone2.power = basic.zone2_power;
                    zone2.curve_enabled = basic.zone2_curve;
                    zone2.target_temperature = basic.zone2_target_temperature;
                }

                self.dhw_enable = basic.dhw_enable;
                self.dhw_power = basic.dhw_power;
                self.dhw_target_temperature = basic.dhw_target_temperature;
                self.dhw_min_temperature = basic.dhw_min_temperature;
                self.dhw_max_temperature = basic.dhw_max_temperature;

                self.room_thermostat_power = basic.room_thermostat_power;
                self.room_thermostat_enable = basic.room_thermostat_enable;
                self.room_target_temperature = basic.room_target_temperature;
                self.room_min_temperature = basic.room_min_temperature;
                self.room_max_temperature = basic.room_max_temperature;

                self.tbh_forced = basic.tbh_forced;
                self.fast_dhw = basic.fast_dhw;

                self.tank_temperature = basic.tank_temperature;
                self.error_code = basic.error_code;

                self.supported = true;
            }
            Ok(Response::UnitParameters(params)) => {
                self.outdoor_temperature = Some(params.outdoor_temperature);
                self.room_temperature = Some(params.room_temperature);
                self.water_temperature_2 = Some(params.water_temperature_2);
            }
            Ok(Response::Power4(power)) => {
                debug!(electric_power = power.electric_power, thermal_power = power.thermal_power, "power4 report");
                self.outdoor_temperature = Some(power.outdoor_air_temperature);
            }
            Err(e) => debug!(%e, "ignored unrecognized heat pump response"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone2_is_created_lazily_when_enabled() {
        let mut hp = HeatPump::new();
        assert!(hp.zone2.is_none());

        let mut payload = vec![0u8; 25];
        payload[0] = QueryType::Basic as u8;
        payload[2] = 0x08; // zone2_enable
        hp.handle_response(&frame::encode(DeviceType::HeatPump, FrameType::Query, &payload));

        assert!(hp.zone2.is_some());
    }

    #[test]
    fn new_heat_pump_defaults_to_offline_and_unsupported() {
        let hp = HeatPump::new();
        assert!(!hp.online);
        assert!(!hp.supported);
    }
}
