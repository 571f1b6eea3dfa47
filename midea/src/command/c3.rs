//! Heat-pump payload codec: basic query/control, unsolicited POWER4
//! reports, and unit-parameter queries (spec §3 "Heat-pump state", §4.3).

use crate::error::InvalidFrameError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum QueryType {
    Basic = 0x01,
    Eco = 0x07,
    UnitParameters = 0x10,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControlType {
    Basic = 0x01,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReportType {
    Basic = 0x01,
    Power3 = 0x03,
    Power4 = 0x04,
    UnitParameters = 0x05,
}

/// One-byte query command body: just the query type.
pub fn encode_query(query_type: QueryType) -> Vec<u8> {
    vec![query_type as u8]
}

/// Full-snapshot control command: zones 1/2 and DHW power, run mode,
/// per-zone/DHW/room target temperatures, curve and booster-heater flags.
#[derive(Debug, Clone, Default)]
pub struct ControlBasicCommand {
    pub zone1_power: bool,
    pub zone2_power: bool,
    pub dhw_power: bool,
    pub run_mode: u8,
    pub zone1_target_temperature: u8,
    pub zone2_target_temperature: u8,
    pub dhw_target_temperature: u8,
    pub room_target_temperature: f32,
    pub zone1_curve: bool,
    pub zone2_curve: bool,
    pub tbh: bool,
    pub fast_dhw: bool,
}

pub fn encode_control_basic(cmd: &ControlBasicCommand) -> Vec<u8> {
    let mut payload = vec![0u8; 10];
    payload[0] = ControlType::Basic as u8;

    if cmd.zone1_power {
        payload[1] |= 0x01;
    }
    if cmd.zone2_power {
        payload[1] |= 0x02;
    }
    if cmd.dhw_power {
        payload[1] |= 0x04;
    }

    payload[2] = cmd.run_mode;
    payload[3] = cmd.zone1_target_temperature;
    payload[4] = cmd.zone2_target_temperature;
    payload[5] = cmd.dhw_target_temperature;
    payload[6] = (cmd.room_target_temperature * 2.0).round() as u8;

    if cmd.zone1_curve {
        payload[7] |= 0x01;
    }
    if cmd.zone2_curve {
        payload[7] |= 0x02;
    }
    if cmd.tbh {
        payload[7] |= 0x04;
    }
    if cmd.fast_dhw {
        payload[7] |= 0x08;
    }

    payload
}

/// Response to `QUERY_BASIC`: global run-mode, per-zone enable/curve/target
/// bounds, DHW state, and tank sensor reading (§3 "Heat-pump state").
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBasicResponse {
    pub zone1_power: bool,
    pub zone2_power: bool,
    pub dhw_power: bool,
    pub zone1_curve: bool,
    pub zone2_curve: bool,
    /// Byte 24 mask 0x40 is shared on the wire by two distinct concepts
    /// (tank-booster force-state and fast-DHW); both are surfaced and
    /// treated as mutually exclusive by the caller until disambiguated.
    pub tbh_forced: bool,
    pub fast_dhw: bool,
    pub heat_enable: bool,
    pub cool_enable: bool,
    pub dhw_enable: bool,
    pub zone2_enable: bool,
    pub zone1_is_water: bool,
    pub zone2_is_water: bool,
    pub room_thermostat_power: bool,
    pub room_thermostat_enable: bool,
    pub eco_mode: bool,
    pub run_mode: u8,
    pub zone1_target_temperature: u8,
    pub zone2_target_temperature: u8,
    pub dhw_target_temperature: u8,
    pub room_target_temperature: f32,
    pub room_min_temperature: f32,
    pub room_max_temperature: f32,
    pub dhw_min_temperature: u8,
    pub dhw_max_temperature: u8,
    pub tank_temperature: Option<u8>,
    pub error_code: u8,
}

impl QueryBasicResponse {
    pub fn decode(payload: &[u8]) -> Result<Self, InvalidFrameError> {
        if payload.len() < 25 {
            return Err(InvalidFrameError::new("heat pump basic payload too short", 0));
        }

        Ok(Self {
            zone1_power: payload[1] & 0x01 != 0,
            zone2_power: payload[1] & 0x02 != 0,
            dhw_power: payload[1] & 0x04 != 0,
            zone1_curve: payload[1] & 0x08 != 0,
            zone2_curve: payload[1] & 0x10 != 0,
            tbh_forced: payload[1] & 0x40 != 0,
            fast_dhw: payload[1] & 0x40 != 0,
            heat_enable: payload[2] & 0x01 != 0,
            cool_enable: payload[2] & 0x02 != 0,
            dhw_enable: payload[2] & 0x04 != 0,
            zone2_enable: payload[2] & 0x08 != 0,
            zone1_is_water: payload[2] & 0x10 != 0,
            zone2_is_water: payload[2] & 0x20 != 0,
            room_thermostat_power: payload[2] & 0x40 != 0,
            room_thermostat_enable: payload[2] & 0x80 != 0,
            eco_mode: payload[3] & 0x08 != 0,
            run_mode: payload[4],
            zone1_target_temperature: payload[6],
            zone2_target_temperature: payload[7],
            dhw_target_temperature: payload[8],
            room_target_temperature: payload[9] as f32 / 2.0,
            room_min_temperature: payload[19] as f32 / 2.0,
            room_max_temperature: payload[18] as f32 / 2.0,
            dhw_min_temperature: payload[21],
            dhw_max_temperature: payload[20],
            tank_temperature: if payload[22] == 0xFF { None } else { Some(payload[22]) },
            error_code: payload[23],
        })
    }
}

/// Unsolicited POWER4 report: electric/thermal cumulative energy counters
/// and the outdoor/tank sensor snapshot (§3, §8 scenario 6).
#[derive(Debug, Clone, PartialEq)]
pub struct ReportPower4Response {
    pub heat_active: bool,
    pub cool_active: bool,
    pub dhw_active: bool,
    pub tbh_active: bool,
    pub electric_power: u32,
    pub thermal_power: u32,
    pub outdoor_air_temperature: i8,
    pub zone1_target_temperature: u8,
    pub zone2_target_temperature: u8,
    pub water_tank_temperature: u8,
    pub online: bool,
    pub voltage: Option<u8>,
}

impl ReportPower4Response {
    pub fn decode(payload: &[u8]) -> Result<Self, InvalidFrameError> {
        if payload.len() < 18 {
            return Err(InvalidFrameError::new("power4 report payload too short", 0));
        }

        let electric_power = u32::from_be_bytes([payload[2], payload[3], payload[4], payload[5]]);
        let thermal_power = u32::from_be_bytes([payload[6], payload[7], payload[8], payload[9]]);

        Ok(Self {
            heat_active: payload[1] & 0x01 != 0,
            cool_active: payload[1] & 0x02 != 0,
            dhw_active: payload[1] & 0x04 != 0,
            tbh_active: payload[1] & 0x08 != 0,
            electric_power,
            thermal_power,
            outdoor_air_temperature: payload[10] as i8,
            zone1_target_temperature: payload[11],
            zone2_target_temperature: payload[12],
            water_tank_temperature: payload[13],
            online: payload[17] & 0x01 != 0,
            voltage: payload.get(156).copied(),
        })
    }
}

/// Response to `QUERY_UNIT_PARAMETERS`. Most fields of this response go
/// unused; only the sensor readings a consumer typically needs are parsed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryUnitParametersResponse {
    pub outdoor_temperature: i8,
    pub water_temperature_2: i8,
    pub room_temperature: i8,
}

impl QueryUnitParametersResponse {
    pub fn decode(payload: &[u8]) -> Result<Self, InvalidFrameError> {
        if payload.len() < 40 {
            return Err(InvalidFrameError::new("unit parameters payload too short", 0));
        }
        Ok(Self {
            outdoor_temperature: payload[8] as i8,
            water_temperature_2: payload[11] as i8,
            room_temperature: payload[39] as i8,
        })
    }
}

#[derive(Debug, Clone)]
pub enum Response {
    Basic(QueryBasicResponse),
    Power4(ReportPower4Response),
    UnitParameters(QueryUnitParametersResponse),
}

pub fn construct(frame_type: u8, payload: &[u8]) -> Result<Response, InvalidFrameError> {
    const QUERY: u8 = 0x03;
    const REPORT: u8 = 0x04;

    if payload.is_empty() {
        return Err(InvalidFrameError::new("empty heat pump payload", 0));
    }

    match (frame_type, payload[0]) {
        (QUERY, t) if t == QueryType::Basic as u8 => QueryBasicResponse::decode(payload).map(Response::Basic),
        (QUERY, t) if t == QueryType::UnitParameters as u8 => {
            QueryUnitParametersResponse::decode(payload).map(Response::UnitParameters)
        }
        (REPORT, t) if t == ReportType::Power4 as u8 => ReportPower4Response::decode(payload).map(Response::Power4),
        _ => Err(InvalidFrameError::new("unrecognized heat pump response type", 0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_power4_report() {
        let mut payload = vec![0u8; 18];
        payload[0] = ReportType::Power4 as u8;
        payload[1] = 0x01; // heat_active
        payload[2..6].copy_from_slice(&4860u32.to_be_bytes());
        payload[6..10].copy_from_slice(&9130u32.to_be_bytes());
        payload[10] = 11; // outdoor temperature
        payload[11] = 0x20;
        payload[12] = 0x1E;
        payload[13] = 41; // water tank
        payload[17] = 0x01; // online

        let report = ReportPower4Response::decode(&payload).unwrap();
        assert_eq!(report.electric_power, 4860);
        assert_eq!(report.thermal_power, 9130);
        assert_eq!(report.outdoor_air_temperature, 11);
        assert_eq!(report.water_tank_temperature, 41);
        assert!(report.online);
        assert!(report.heat_active);
    }

    #[test]
    fn tank_temperature_0xff_decodes_to_absent() {
        let mut payload = vec![0u8; 25];
        payload[22] = 0xFF;
        let basic = QueryBasicResponse::decode(&payload).unwrap();
        assert_eq!(basic.tank_temperature, None);
    }

    #[test]
    fn tbh_and_fastdhw_share_the_same_bit() {
        let mut payload = vec![0u8; 25];
        payload[1] = 0x40;
        let basic = QueryBasicResponse::decode(&payload).unwrap();
        assert!(basic.tbh_forced);
        assert!(basic.fast_dhw);
    }
}
