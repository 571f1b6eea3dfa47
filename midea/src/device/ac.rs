//! Residential air conditioner state machine: decodes state/property/
//! capability/energy reports into a local record and builds the commands
//! needed to push local changes back to the device (spec §4.8).

use tracing::{debug, instrument, warn};

use crate::capability::AcCapabilities;
use crate::command::ac::{
    self, EnergyUsageResponse, FanSpeed, OperationalMode, Response, SetStateCommand, SwingAngle, SwingMode,
};
use crate::error::Result;
use crate::frame::{self, DeviceType, Frame, FrameType};
use crate::property::{PropertyEntry, PropertyId, PropertyTracker};
use crate::transport::{Transport, LAN_RESPONSE_TIMEOUT};

/// Local copy of one air conditioner's state, plus the bookkeeping needed to
/// apply only what changed and to request only what the device supports.
#[derive(Debug, Clone)]
pub struct AirConditioner {
    pub online: bool,
    pub supported: bool,

    pub power: bool,
    pub target_temperature: f32,
    pub operational_mode: OperationalMode,
    pub fan_speed: FanSpeed,
    pub swing_mode: SwingMode,
    pub eco_mode: bool,
    pub turbo_mode: bool,
    pub freeze_protection_mode: bool,
    pub sleep_mode: bool,

    pub indoor_temperature: Option<f32>,
    pub outdoor_temperature: Option<f32>,
    pub indoor_humidity: Option<u8>,
    pub energy: Option<EnergyUsageResponse>,

    pub swing_ud_angle: SwingAngle,
    pub swing_lr_angle: SwingAngle,
    pub breeze_away: bool,
    pub breezeless: bool,

    /// Some models report energy usage in a 4+3-byte binary encoding rather
    /// than the default 5+5-byte BCD encoding; set from capability query
    /// results before calling `refresh`.
    pub use_alternate_energy_format: bool,

    pub capabilities: AcCapabilities,
    properties: PropertyTracker,
}

impl Default for AirConditioner {
    fn default() -> Self {
        Self {
            online: false,
            supported: false,
            power: false,
            target_temperature: 24.0,
            operational_mode: OperationalMode::from_value(0),
            fan_speed: FanSpeed::from_value(0),
            swing_mode: SwingMode::from_value(0),
            eco_mode: false,
            turbo_mode: false,
            freeze_protection_mode: false,
            sleep_mode: false,
            indoor_temperature: None,
            outdoor_temperature: None,
            indoor_humidity: None,
            energy: None,
            swing_ud_angle: SwingAngle::from_value(0),
            swing_lr_angle: SwingAngle::from_value(0),
            breeze_away: false,
            breezeless: false,
            use_alternate_energy_format: false,
            capabilities: AcCapabilities::default(),
            properties: PropertyTracker::default(),
        }
    }
}

impl AirConditioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_swing_ud_angle(&mut self, angle: SwingAngle) {
        self.swing_ud_angle = angle;
        self.properties.mark_dirty(PropertyId::SwingUdAngle.as_u16());
    }

    pub fn set_swing_lr_angle(&mut self, angle: SwingAngle) {
        self.swing_lr_angle = angle;
        self.properties.mark_dirty(PropertyId::SwingLrAngle.as_u16());
    }

    pub fn set_breeze_away(&mut self, enabled: bool) {
        self.breeze_away = enabled;
        self.properties.mark_dirty(PropertyId::BreezeAway.as_u16());
    }

    pub fn set_breezeless(&mut self, enabled: bool) {
        self.breezeless = enabled;
        self.properties.mark_dirty(PropertyId::Breezeless.as_u16());
    }

    /// Issues a state query plus, for properties the device has advertised
    /// support for, a follow-up properties query (spec §4.8 "refresh").
    #[instrument(skip(self, transport))]
    pub async fn refresh(&mut self, transport: &mut Transport) -> Result<()> {
        let query = frame::encode(DeviceType::AirConditioner, FrameType::Query, &ac::encode_request_state());
        match transport.request(&query, LAN_RESPONSE_TIMEOUT).await {
            Ok(raw) => {
                self.online = true;
                self.handle_response(&raw);
            }
            Err(e) => {
                warn!(error = %e, "no state response, marking device offline");
                self.online = false;
                return Ok(());
            }
        }

        let supported_props: Vec<u16> = [
            PropertyId::SwingUdAngle,
            PropertyId::SwingLrAngle,
            PropertyId::IndoorHumidity,
            PropertyId::BreezeAway,
            PropertyId::Breezeless,
            PropertyId::BreezeControl,
            PropertyId::RateSelect,
        ]
        .into_iter()
        .map(|p| p.as_u16())
        .filter(|id| self.properties.is_supported(*id))
        .collect();

        if !supported_props.is_empty() {
            let get = frame::encode(
                DeviceType::AirConditioner,
                FrameType::Query,
                &crate::property::encode_get_properties(&supported_props),
            );
            if let Ok(raw) = transport.request(&get, LAN_RESPONSE_TIMEOUT).await {
                self.handle_response(&raw);
            }
        }

        Ok(())
    }

    /// Sends the full-snapshot set-state command, then any dirty properties
    /// (spec §4.8 "apply"): breeze control and the individual breeze
    /// properties are mutually exclusive on the wire, so one side is cleared
    /// before the properties command is built.
    #[instrument(skip(self, transport))]
    pub async fn apply(&mut self, transport: &mut Transport) -> Result<()> {
        let cmd = SetStateCommand {
            power: self.power,
            target_temperature: self.target_temperature,
            operational_mode: self.operational_mode,
            fan_speed: self.fan_speed,
            swing_mode: self.swing_mode,
            eco_mode: self.eco_mode,
            turbo_mode: self.turbo_mode,
            freeze_protection_mode: self.freeze_protection_mode,
        };
        let set_state = frame::encode(DeviceType::AirConditioner, FrameType::Set, &ac::encode_set_state(&cmd));
        if let Ok(raw) = transport.request(&set_state, LAN_RESPONSE_TIMEOUT).await {
            self.handle_response(&raw);
        }

        self.reconcile_breeze();

        let dirty = self.properties.dirty_ids();
        if !dirty.is_empty() {
            let entries: Vec<(u16, Vec<u8>)> = dirty.iter().map(|&id| (id, self.property_value(id))).collect();
            let set_props = frame::encode(
                DeviceType::AirConditioner,
                FrameType::Control,
                &crate::property::encode_set_properties(&entries),
            );
            if let Ok(raw) = transport.request(&set_props, LAN_RESPONSE_TIMEOUT).await {
                self.handle_response(&raw);
            }
        }

        Ok(())
    }

    fn reconcile_breeze(&mut self) {
        if self.capabilities.supports_breeze_control {
            self.properties.clear_dirty(PropertyId::BreezeAway.as_u16());
            self.properties.clear_dirty(PropertyId::Breezeless.as_u16());
        } else {
            self.properties.clear_dirty(PropertyId::BreezeControl.as_u16());
        }
    }

    fn property_value(&self, id: u16) -> Vec<u8> {
        match PropertyId::from_u16(id) {
            Some(PropertyId::SwingUdAngle) => vec![self.swing_ud_angle.value()],
            Some(PropertyId::SwingLrAngle) => vec![self.swing_lr_angle.value()],
            Some(PropertyId::BreezeAway) => vec![self.breeze_away as u8],
            Some(PropertyId::Breezeless) => vec![self.breezeless as u8],
            _ => vec![0],
        }
    }

    /// Sends the capability query and a follow-up "additional capability"
    /// query, merges both, then derives which property ids the device has
    /// advertised support for (spec §4.8 "get_capabilities", idempotent).
    #[instrument(skip(self, transport))]
    pub async fn get_capabilities(&mut self, transport: &mut Transport) -> Result<()> {
        let query = frame::encode(DeviceType::AirConditioner, FrameType::Query, &ac::encode_capability_query());
        if let Ok(raw) = transport.request(&query, LAN_RESPONSE_TIMEOUT).await {
            self.handle_response(&raw);
        }

        // Additional-capability follow-up: some models paginate the
        // capability table across more than one 0xB5 response.
        if let Ok(raw) = transport.request(&query, LAN_RESPONSE_TIMEOUT).await {
            self.handle_response(&raw);
        }

        if self.capabilities.supports_humidity {
            self.properties.mark_supported(PropertyId::IndoorHumidity.as_u16());
        }
        if self.capabilities.supports_breeze_away {
            self.properties.mark_supported(PropertyId::BreezeAway.as_u16());
        }
        if self.capabilities.supports_breezeless {
            self.properties.mark_supported(PropertyId::Breezeless.as_u16());
        }
        if self.capabilities.supports_breeze_control {
            self.properties.mark_supported(PropertyId::BreezeControl.as_u16());
        }
        if self.capabilities.supports_swing_vertical {
            self.properties.mark_supported(PropertyId::SwingUdAngle.as_u16());
        }
        if self.capabilities.supports_swing_horizontal {
            self.properties.mark_supported(PropertyId::SwingLrAngle.as_u16());
        }
        if !self.capabilities.rate_select_levels.is_empty() {
            self.properties.mark_supported(PropertyId::RateSelect.as_u16());
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

        match ac::construct(&frame.payload, self.use_alternate_energy_format) {
            Ok(Response::State(state)) => {
                self.power = state.power;
                self.target_temperature = state.target_temperature;
                self.operational_mode = state.operational_mode;
                self.fan_speed = state.fan_speed;
                self.swing_mode = state.swing_mode;
                self.eco_mode = state.eco_mode;
                self.turbo_mode = state.turbo_mode;
                self.freeze_protection_mode = state.freeze_protection_mode;
                self.sleep_mode = state.sleep_mode;
                self.indoor_temperature = Some(state.indoor_temperature);
                self.outdoor_temperature = Some(state.outdoor_temperature);
                self.supported = true;
            }
            Ok(Response::Properties(entries)) => self.apply_properties(&entries),
            Ok(Response::Capabilities(entries)) => self.capabilities.merge(&entries),
            Ok(Response::Energy(energy)) => self.energy = Some(energy),
            Ok(Response::Humidity(humidity)) => self.indoor_humidity = humidity.indoor_humidity,
            Err(e) => debug!(%e, "ignored unrecognized AC response"),
        }
    }

    /// Applies a decoded property-report/set-response body. A non-zero
    /// `status` means the device rejected the value we sent: log it and
    /// leave the local field exactly as it was, rather than adopting
    /// whatever the device echoed back (spec §8 scenario 3).
    fn apply_properties(&mut self, entries: &[PropertyEntry]) {
        for entry in entries {
            let property = PropertyId::from_u16(entry.id);

            if let Some(status) = entry.status {
                if status != 0 {
                    let name = property.map(PropertyId::name).unwrap_or("UNKNOWN");
                    warn!(property = name, result = format!("{status:#04x}"), "property set rejected");
                    self.properties.mark_supported(entry.id);
                    continue;
                }
            }

            match property {
                Some(PropertyId::SwingUdAngle) => {
                    self.swing_ud_angle = SwingAngle::from_value(entry.value.first().copied().unwrap_or(0));
                }
                Some(PropertyId::SwingLrAngle) => {
                    self.swing_lr_angle = SwingAngle::from_value(entry.value.first().copied().unwrap_or(0));
                }
                Some(PropertyId::IndoorHumidity) => self.indoor_humidity = entry.value.first().copied(),
                Some(PropertyId::BreezeAway) => self.breeze_away = entry.value.first().copied().unwrap_or(0) != 0,
                Some(PropertyId::Breezeless) => self.breezeless = entry.value.first().copied().unwrap_or(0) != 0,
                Some(PropertyId::BreezeControl) | Some(PropertyId::RateSelect) | None => {}
            }
            self.properties.mark_supported(entry.id);
            self.properties.clear_dirty(entry.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityEntry;

    #[test]
    fn breeze_control_reconciliation_prefers_merged_control() {
        let mut ac = AirConditioner::new();
        ac.capabilities.merge(&[CapabilityEntry { id: crate::capability::cap_id::BREEZE_CONTROL, value: vec![1] }]);
        ac.set_breeze_away(true);
        ac.set_breezeless(true);
        ac.reconcile_breeze();
        assert!(!ac.properties.is_dirty(PropertyId::BreezeAway.as_u16()));
        assert!(!ac.properties.is_dirty(PropertyId::Breezeless.as_u16()));
    }

    #[test]
    fn breeze_away_stays_dirty_without_breeze_control_support() {
        let mut ac = AirConditioner::new();
        ac.set_breeze_away(true);
        ac.reconcile_breeze();
        assert!(ac.properties.is_dirty(PropertyId::BreezeAway.as_u16()));
    }

    #[test]
    fn partial_properties_response_only_updates_reported_fields() {
        let mut ac = AirConditioner::new();
        ac.set_swing_lr_angle(SwingAngle::Pos5);
        ac.properties.mark_supported(PropertyId::SwingUdAngle.as_u16());
        ac.properties.clear_dirty(PropertyId::SwingUdAngle.as_u16());

        // Only horizontal angle reported back; vertical must stay untouched.
        let entries = vec![PropertyEntry { id: PropertyId::SwingLrAngle.as_u16(), value: vec![5], status: Some(0) }];
        ac.apply_properties(&entries);

        assert_eq!(ac.swing_lr_angle, SwingAngle::Pos5);
        assert_eq!(ac.swing_ud_angle, SwingAngle::from_value(0));
    }

    #[test]
    fn rejected_property_set_leaves_local_value_unchanged() {
        let mut ac = AirConditioner::new();
        ac.set_swing_ud_angle(SwingAngle::Pos5);
        ac.properties.mark_supported(PropertyId::SwingUdAngle.as_u16());
        ac.properties.mark_dirty(PropertyId::SwingUdAngle.as_u16());

        // Device reports the set failed (result 0x11); local value must stay
        // at its prior POS_3 default rather than whatever was echoed back.
        let entries = vec![PropertyEntry { id: PropertyId::SwingUdAngle.as_u16(), value: vec![0x09], status: Some(0x11) }];
        ac.swing_ud_angle = SwingAngle::from_value(0); // simulate the pre-set value (POS_3 default)
        ac.apply_properties(&entries);

        assert_eq!(ac.swing_ud_angle, SwingAngle::from_value(0));
        assert!(ac.properties.is_dirty(PropertyId::SwingUdAngle.as_u16()));
    }

    #[test]
    fn breeze_away_capability_merge_is_visible_before_get_capabilities_runs() {
        let mut ac = AirConditioner::new();
        ac.capabilities.merge(&[CapabilityEntry { id: crate::capability::cap_id::ECO, value: vec![1] }]);
        ac.capabilities.merge(&[CapabilityEntry { id: crate::capability::cap_id::BREEZE_AWAY, value: vec![1] }]);
        assert!(ac.capabilities.supports_breeze_away);
    }
}
