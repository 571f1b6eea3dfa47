//! Capability TLVs (`0xB5`) and the merged capability set they describe
//! (spec §3 "AC Capabilities", §4.3, §6).

use std::collections::BTreeMap;

use crate::error::InvalidFrameError;

/// One `{id:u16, size:u8, bytes}` entry from a `0xB5` capability response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityEntry {
    pub id: u16,
    pub value: Vec<u8>,
}

/// Parse a `0xB5` capabilities response payload (minus the leading `0xB5`
/// byte and count byte, which callers strip via [`parse_capability_payload`]).
fn parse_tlvs(mut data: &[u8]) -> Result<Vec<CapabilityEntry>, InvalidFrameError> {
    let mut out = Vec::new();
    while !data.is_empty() {
        if data.len() < 3 {
            return Err(InvalidFrameError::new("truncated capability TLV", 0));
        }
        let id = u16::from_be_bytes([data[0], data[1]]);
        let size = data[2] as usize;
        if data.len() < 3 + size {
            return Err(InvalidFrameError::new("capability TLV value truncated", 0));
        }
        let value = data[3..3 + size].to_vec();
        out.push(CapabilityEntry { id, value });
        data = &data[3 + size..];
    }
    Ok(out)
}

/// Parse a complete `0xB5` response payload: `0xB5`, a count byte, then TLVs.
pub fn parse_capability_payload(payload: &[u8]) -> Result<Vec<CapabilityEntry>, InvalidFrameError> {
    if payload.len() < 2 || payload[0] != 0xB5 {
        return Err(InvalidFrameError::new("capability payload missing 0xB5 marker", 0));
    }
    parse_tlvs(&payload[2..])
}

pub mod cap_id {
    pub const MODES: u16 = 0x0012;
    pub const SWING: u16 = 0x0014;
    pub const FAN: u16 = 0x0015;
    pub const HUMIDITY: u16 = 0x0016;
    pub const TEMPERATURE_UNIT: u16 = 0x0017;
    pub const BREEZE_AWAY: u16 = 0x0018;
    pub const TARGET_HUMIDITY: u16 = 0x0019;
    pub const PURIFIER: u16 = 0x001A;
    pub const ECO: u16 = 0x001E;
    pub const TURBO: u16 = 0x001F;
    pub const SELF_CLEAN: u16 = 0x0022;
    pub const RATE_SELECT_4: u16 = 0x0024;
    pub const TEMPERATURE_BOUNDS: u16 = 0x0025;
    pub const RATE_SELECT_5: u16 = 0x002C;
    pub const FREEZE_PROTECTION: u16 = 0x0039;
    pub const ANION: u16 = 0x0040;
    pub const BREEZELESS: u16 = 0x0042;
    pub const BREEZE_CONTROL: u16 = 0x0043;
    pub const RATE_SELECT_4_ALT: u16 = 0x0048;
    pub const SELF_CLEAN_ALT: u16 = 0x0051;
    pub const BUZZER: u16 = 0x00E3;
}

/// Rate-select (compressor throttling) levels (spec §3, glossary "Rate select").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateSelect {
    #[default]
    Off,
    Pct50,
    Pct75,
    Pct100,
}

/// Merged capability set for an AC device. Merge is over `cap_id`: a
/// repeated id has its later value win (spec §4.3, §8, §9).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcCapabilities {
    pub supported_modes: Vec<u8>,
    pub supports_swing_vertical: bool,
    pub supports_swing_horizontal: bool,
    pub custom_fan_speed: bool,
    pub supports_humidity: bool,
    pub supports_target_humidity: bool,
    pub fahrenheit_unit: bool,
    pub supports_breeze_away: bool,
    pub supports_breeze_mild: bool,
    pub supports_breezeless: bool,
    pub supports_breeze_control: bool,
    pub supports_purifier: bool,
    pub supports_eco: bool,
    pub supports_turbo: bool,
    pub supports_self_clean: bool,
    pub supports_freeze_protection: bool,
    pub supports_anion: bool,
    pub supports_buzzer: bool,
    pub rate_select_levels: Vec<RateSelect>,
    pub min_temperature: Option<f32>,
    pub max_temperature: Option<f32>,
    raw: BTreeMap<u16, Vec<u8>>,
}

impl AcCapabilities {
    /// Merge a freshly-parsed set of TLVs into this capability set.
    /// Associative and commutative on distinct ids; last-write-wins per id
    /// (spec §8 invariant). Multi-frame capability responses are merged by
    /// calling this repeatedly.
    pub fn merge(&mut self, entries: &[CapabilityEntry]) {
        for entry in entries {
            self.raw.insert(entry.id, entry.value.clone());
        }
        self.recompute();
    }

    fn recompute(&mut self) {
        use cap_id::*;

        self.supported_modes = self.raw.get(&MODES).cloned().unwrap_or_default();

        if let Some(v) = self.raw.get(&SWING) {
            let bits = v.first().copied().unwrap_or(0);
            self.supports_swing_vertical = bits & 0x01 != 0 || bits & 0x0C != 0;
            self.supports_swing_horizontal = bits & 0x02 != 0 || bits & 0x30 != 0;
        }

        if let Some(v) = self.raw.get(&FAN) {
            self.custom_fan_speed = v.first().copied().unwrap_or(0) == 1;
        }

        self.supports_humidity = truthy(self.raw.get(&HUMIDITY));
        self.supports_target_humidity = truthy(self.raw.get(&TARGET_HUMIDITY));
        self.fahrenheit_unit = truthy(self.raw.get(&TEMPERATURE_UNIT));
        self.supports_breeze_away = truthy(self.raw.get(&BREEZE_AWAY));
        self.supports_purifier = truthy(self.raw.get(&PURIFIER));
        self.supports_eco = truthy(self.raw.get(&ECO));
        self.supports_turbo = truthy(self.raw.get(&TURBO));
        self.supports_self_clean = truthy(self.raw.get(&SELF_CLEAN)) || truthy(self.raw.get(&SELF_CLEAN_ALT));
        self.supports_freeze_protection = truthy(self.raw.get(&FREEZE_PROTECTION));
        self.supports_anion = truthy(self.raw.get(&ANION));
        self.supports_buzzer = truthy(self.raw.get(&BUZZER));
        self.supports_breezeless = truthy(self.raw.get(&BREEZELESS));
        self.supports_breeze_control = truthy(self.raw.get(&BREEZE_CONTROL));
        // "Breeze-mild" has no dedicated capability id in the TLV table; it
        // rides on the same feature flag as breeze-away in observed traces.
        self.supports_breeze_mild = self.supports_breeze_away;

        let levels4 = self.raw.get(&RATE_SELECT_4).or_else(|| self.raw.get(&RATE_SELECT_4_ALT));
        let levels5 = self.raw.get(&RATE_SELECT_5);
        self.rate_select_levels = if let Some(v) = levels5.or(levels4) {
            let n = v.first().copied().unwrap_or(0);
            rate_select_levels(n)
        } else {
            Vec::new()
        };

        if let Some(v) = self.raw.get(&TEMPERATURE_BOUNDS) {
            if v.len() >= 2 {
                self.min_temperature = Some(v[0] as f32);
                self.max_temperature = Some(v[1] as f32);
            }
        }
    }

    pub fn supports_mode(&self, mode_value: u8) -> bool {
        self.supported_modes.is_empty() || self.supported_modes.contains(&mode_value)
    }
}

fn truthy(v: Option<&Vec<u8>>) -> bool {
    v.map(|b| b.first().copied().unwrap_or(0) != 0).unwrap_or(false)
}

fn rate_select_levels(count: u8) -> Vec<RateSelect> {
    match count {
        0 => Vec::new(),
        1 => vec![RateSelect::Off],
        2 => vec![RateSelect::Off, RateSelect::Pct100],
        3 => vec![RateSelect::Off, RateSelect::Pct75, RateSelect::Pct100],
        _ => vec![RateSelect::Off, RateSelect::Pct50, RateSelect::Pct75, RateSelect::Pct100],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_last_write_wins_per_id() {
        let mut caps = AcCapabilities::default();
        caps.merge(&[CapabilityEntry { id: cap_id::ECO, value: vec![0] }]);
        assert!(!caps.supports_eco);
        caps.merge(&[CapabilityEntry { id: cap_id::ECO, value: vec![1] }]);
        assert!(caps.supports_eco);
    }

    #[test]
    fn merge_is_associative_on_distinct_ids() {
        let mut a = AcCapabilities::default();
        a.merge(&[CapabilityEntry { id: cap_id::ECO, value: vec![1] }]);
        a.merge(&[CapabilityEntry { id: cap_id::TURBO, value: vec![1] }]);

        let mut b = AcCapabilities::default();
        b.merge(&[CapabilityEntry { id: cap_id::TURBO, value: vec![1] }]);
        b.merge(&[CapabilityEntry { id: cap_id::ECO, value: vec![1] }]);

        assert_eq!(a, b);
    }

    #[test]
    fn unadvertised_features_default_unsupported() {
        let caps = AcCapabilities::default();
        assert!(!caps.supports_eco);
        assert!(!caps.supports_breeze_away);
        assert!(caps.rate_select_levels.is_empty());
    }

    #[test]
    fn parse_capability_payload_round_trips_tlvs() {
        let mut payload = vec![0xB5, 0x02];
        payload.extend_from_slice(&[0x00, 0x1E, 0x01, 0x01]); // ECO = true
        payload.extend_from_slice(&[0x00, 0x1F, 0x01, 0x00]); // TURBO = false
        let entries = parse_capability_payload(&payload).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, cap_id::ECO);
        assert_eq!(entries[1].id, cap_id::TURBO);
    }
}
