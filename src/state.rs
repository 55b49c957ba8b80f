//! Generation independent breezer state.
//!
//! Every generation decodes into [`TionState`] and encodes writes from a [`StateCall`], checked
//! against the generation's [`TionTraits`]. Boost, presets and CO2 auto mode are built on top of
//! state calls and never touch the wire themselves.

use std::collections::BTreeMap;
use std::time::Instant;

use strum_macros::{Display, EnumString};
use thiserror::Error;
use tracing::{debug, warn};

use crate::pi::PiController;

/// Boost duration until configured otherwise, s.
pub const DEFAULT_BOOST_TIME: u16 = 10 * 60;

pub const PRESET_NONE: &str = "none";


#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CommSource {
    #[default]
    Auto,
    User,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum GatePosition {
    Outdoor,
    Indoor,
    Mixed,
    #[default]
    Unknown,
}

impl GatePosition {
    pub const OPENED: GatePosition = GatePosition::Outdoor;
    pub const CLOSED: GatePosition = GatePosition::Indoor;
}


/// Error and warning bit ranges of a generation's error word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ErrorBits {
    pub error_min: u8,
    pub error_max: u8,
    pub warning_min: u8,
    pub warning_max: u8,
}

impl ErrorBits {
    pub const fn errors(min: u8, max: u8) -> Self {
        Self { error_min: min, error_max: max, warning_min: 0, warning_max: 0 }
    }

    pub fn decode(&self, errors: u32) -> String {
        decode_errors(errors, self.error_min, self.error_max, self.warning_min, self.warning_max)
    }
}

/// Names the set bits of `errors`: `EC{n}` for error bits, `WS{n}` for warning bits, one-based.
///
/// Warnings are skipped when `warning_min == warning_max`.
pub fn decode_errors(errors: u32, error_min: u8, error_max: u8, warning_min: u8, warning_max: u8) -> String {
    if errors == 0 {
        return String::new();
    }

    let set = |bit: &u8| *bit < 32 && errors & (1 << *bit) != 0;

    let mut names: Vec<String> = (error_min..=error_max)
        .filter(set)
        .map(|bit| format!("EC{}", bit + 1))
        .collect();

    if warning_min != warning_max {
        names.extend((warning_min..=warning_max)
            .filter(set)
            .map(|bit| format!("WS{}", bit + 1)));
    }

    names.join(", ")
}


/// What a generation can do, built once per device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TionTraits {
    pub supports_led_state: bool,
    pub supports_sound_state: bool,
    /// At least outdoor and indoor
    pub supports_gate_position_change: bool,
    pub supports_gate_position_change_mixed: bool,
    pub supports_heater_var: bool,
    pub supports_work_time: bool,
    pub supports_fan_time: bool,
    pub supports_airflow_counter: bool,
    pub supports_gate_error: bool,
    pub supports_pcb_ctl_temperature: bool,
    pub supports_pcb_pwr_temperature: bool,
    /// Heater is switched on by the host when it is freezing outside
    pub supports_manual_antifreeze: bool,
    /// Breezer runs boost itself
    pub supports_boost: bool,
    pub supports_reset_filter: bool,
    pub supports_kiv: bool,

    pub errors: Option<ErrorBits>,

    /// s
    pub boost_time: u16,
    /// Below zero keeps the current heater state
    pub boost_heater_state: i8,
    /// Zero keeps the current target
    pub boost_target_temperature: i8,

    pub max_fan_speed: u8,
    pub min_target_temperature: i8,
    pub max_target_temperature: i8,

    /// W / 10, zero without a heater
    pub max_heater_power: u8,
    /// W * 100 without the heater, indexed by fan speed, 0 is standby
    pub max_fan_power: [u16; 7],
    /// Productivity, m³/h, indexed by fan speed
    pub auto_prod: [u8; 7],
}

impl Default for TionTraits {
    fn default() -> Self {
        Self {
            supports_led_state: false,
            supports_sound_state: false,
            supports_gate_position_change: false,
            supports_gate_position_change_mixed: false,
            supports_heater_var: false,
            supports_work_time: false,
            supports_fan_time: false,
            supports_airflow_counter: false,
            supports_gate_error: false,
            supports_pcb_ctl_temperature: false,
            supports_pcb_pwr_temperature: false,
            supports_manual_antifreeze: false,
            supports_boost: false,
            supports_reset_filter: false,
            supports_kiv: false,
            errors: None,
            boost_time: DEFAULT_BOOST_TIME,
            boost_heater_state: -1,
            boost_target_temperature: 0,
            max_fan_speed: 6,
            min_target_temperature: 0,
            max_target_temperature: 25,
            max_heater_power: 0,
            max_fan_power: [0; 7],
            auto_prod: [0; 7],
        }
    }
}

impl TionTraits {
    pub fn max_heater_power_w(&self) -> u16 {
        self.max_heater_power as u16 * 10
    }

    pub fn max_fan_power_w(&self, fan_speed: u8) -> f32 {
        self.max_fan_power.get(fan_speed as usize).map_or(0.0, |power| *power as f32 / 100.0)
    }

    pub fn productivity(&self, fan_speed: u8) -> u8 {
        self.auto_prod.get(fan_speed as usize).copied().unwrap_or(0)
    }
}


/// Normalised state. Fields a generation does not report keep their previous value.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TionState {
    pub power_state: bool,
    pub heater_state: bool,
    pub sound_state: bool,
    pub led_state: bool,
    pub auto_state: bool,
    /// Filter replacement warning
    pub filter_state: bool,
    pub gate_error_state: bool,
    pub comm_source: CommSource,

    pub initialized: bool,
    pub fan_speed: u8,
    pub gate_position: GatePosition,

    /// Before the heater, °C
    pub outdoor_temperature: i8,
    /// After the heater, °C
    pub current_temperature: i8,
    pub target_temperature: i8,
    /// m³/h
    pub productivity: u8,
    /// Heater load, %
    pub heater_var: u8,

    /// s
    pub work_time: u32,
    /// s
    pub fan_time: u32,
    /// days
    pub filter_time_left: u32,
    pub airflow_counter: u32,
    pub airflow_m3: f32,

    /// s, zero when boost is off
    pub boost_time_left: u16,

    pub firmware_version: u16,
    pub hardware_version: u16,

    pub pcb_ctl_temperature: i8,
    pub pcb_pwr_temperature: i8,

    pub errors: u32,
}

impl TionState {
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn gate_state(&self) -> bool {
        self.gate_position == GatePosition::OPENED
    }

    /// Whether the heater draws power right now.
    ///
    /// Without a reported heater load this is estimated from the temperature rise across the
    /// heater.
    pub fn is_heating(&self, traits: &TionTraits) -> bool {
        if traits.supports_heater_var {
            return self.heater_var > 0;
        }

        if !self.heater_state || traits.max_heater_power == 0 {
            return false;
        }

        (self.target_temperature as i16 - self.outdoor_temperature as i16) > 3
            && self.current_temperature > self.outdoor_temperature
    }

    /// Heater consumption, W.
    pub fn heater_power(&self, traits: &TionTraits) -> f32 {
        if traits.supports_heater_var {
            return traits.max_heater_power as f32 * self.heater_var as f32 * 0.1;
        }

        if self.is_heating(traits) {
            traits.max_heater_power_w() as f32
        } else {
            0.0
        }
    }

    /// Fan consumption at the current speed, W.
    pub fn fan_power(&self, traits: &TionTraits) -> f32 {
        traits.max_fan_power_w(if self.power_state { self.fan_speed } else { 0 })
    }

    pub fn gate_position_name(&self, traits: &TionTraits) -> &'static str {
        if traits.supports_gate_error && self.gate_error_state {
            return "error";
        }

        if traits.supports_gate_position_change_mixed {
            match self.gate_position {
                GatePosition::Outdoor => "outdoor",
                GatePosition::Indoor => "indoor",
                GatePosition::Mixed => "mixed",
                GatePosition::Unknown => "unknown",
            }
        } else if traits.supports_gate_position_change {
            match self.gate_position {
                GatePosition::Outdoor => "inflow",
                GatePosition::Indoor => "recirculation",
                _ => "unknown",
            }
        } else if self.gate_state() {
            "opened"
        } else {
            "closed"
        }
    }

    /// Decoded error word, empty when there is nothing to report.
    pub fn errors_text(&self, traits: &TionTraits) -> String {
        traits.errors.map(|bits| bits.decode(self.errors)).unwrap_or_default()
    }
}


/// Requested changes; `None` leaves a field as it is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StateCall {
    pub fan_speed: Option<u8>,
    pub power_state: Option<bool>,
    pub heater_state: Option<bool>,
    pub target_temperature: Option<i8>,
    pub sound_state: Option<bool>,
    pub led_state: Option<bool>,
    pub gate_position: Option<GatePosition>,
    pub auto_state: Option<bool>,
}

impl StateCall {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_gate_state(&mut self, opened: bool) {
        self.gate_position = Some(if opened { GatePosition::OPENED } else { GatePosition::CLOSED });
    }

    pub fn has_changes(&self) -> bool {
        *self != Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}


/// The state to write for `call` on top of `cs`.
///
/// `call` is corrected in place: a zero fan speed becomes a power off, an out of range fan
/// speed or target temperature is replaced by the current one.
pub fn make_write_state(cs: &TionState, traits: &TionTraits, call: &mut StateCall) -> TionState {
    let mut ns = *cs;

    if let Some(fan_speed) = call.fan_speed {
        if fan_speed == 0 {
            if call.power_state.unwrap_or(cs.power_state) {
                warn!("Zero fan speed lead to power off");
                call.power_state = Some(false);
                call.fan_speed = Some(cs.fan_speed);
            }
        } else if fan_speed > traits.max_fan_speed {
            warn!("Disallowed fan speed: {fan_speed}");
            call.fan_speed = Some(cs.fan_speed);
        } else {
            if cs.fan_speed != fan_speed {
                debug!("New fan speed {} -> {fan_speed}", cs.fan_speed);
            }
            ns.fan_speed = fan_speed;
        }
    }

    if let Some(power_state) = call.power_state {
        if cs.power_state != power_state {
            debug!("New power state {} -> {power_state}", cs.power_state);
        }
        ns.power_state = power_state;
    }

    if let Some(heater_state) = call.heater_state {
        if cs.heater_state != heater_state {
            debug!("New heater state {} -> {heater_state}", cs.heater_state);
        }
        ns.heater_state = heater_state;
    }

    if let Some(target_temperature) = call.target_temperature {
        if !(traits.min_target_temperature..=traits.max_target_temperature).contains(&target_temperature) {
            warn!(
                "Disallowed target temperature {target_temperature}, allowed {}..={}",
                traits.min_target_temperature, traits.max_target_temperature
            );
            call.target_temperature = Some(cs.target_temperature);
        } else {
            if cs.target_temperature != target_temperature {
                debug!("New target temperature {} -> {target_temperature}", cs.target_temperature);
            }
            ns.target_temperature = target_temperature;
        }
    }

    if let Some(auto_state) = call.auto_state {
        ns.auto_state = auto_state;
    }

    if traits.supports_sound_state {
        if let Some(sound_state) = call.sound_state {
            ns.sound_state = sound_state;
        }
    }

    if traits.supports_led_state {
        if let Some(led_state) = call.led_state {
            ns.led_state = led_state;
        }
    }

    if traits.supports_gate_position_change {
        if let Some(gate_position) = call.gate_position {
            let gate_position = match gate_position {
                GatePosition::Outdoor => gate_position,
                GatePosition::Indoor => {
                    if ns.heater_state {
                        warn!("Indoor gate position disallow heater");
                        ns.heater_state = false;
                    }
                    gate_position
                },
                GatePosition::Mixed if traits.supports_gate_position_change_mixed => gate_position,
                _ => cs.gate_position,
            };

            if cs.gate_position != gate_position {
                debug!("New gate position {} -> {gate_position}", cs.gate_position);
            }
            ns.gate_position = gate_position;
        }
    }

    if check_antifreeze(&ns, traits) {
        ns.heater_state = true;
    }

    ns
}

/// Whether the heater has to be switched on to protect a running breezer from frost.
pub fn check_antifreeze(state: &TionState, traits: &TionTraits) -> bool {
    if traits.supports_manual_antifreeze
        && state.power_state
        && !state.heater_state
        && state.outdoor_temperature < 0
    {
        warn!("Antifreeze protection, heater enabled");
        return true;
    }

    false
}


/// Preset values. Targets of zero, negative switches, a zero fan speed and an unknown gate leave
/// the current value unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PresetData {
    pub target_temperature: i8,
    pub heater_state: i8,
    pub power_state: i8,
    pub fan_speed: u8,
    pub gate_position: GatePosition,
    pub auto_state: i8,
}

impl Default for PresetData {
    fn default() -> Self {
        Self {
            target_temperature: 0,
            heater_state: -1,
            power_state: -1,
            fan_speed: 0,
            gate_position: GatePosition::Unknown,
            auto_state: -1,
        }
    }
}

impl PresetData {
    pub fn has_changes(&self) -> bool {
        self.target_temperature != 0
            || self.heater_state >= 0
            || self.power_state >= 0
            || self.fan_speed != 0
            || self.gate_position != GatePosition::Unknown
    }

    pub fn apply(&self, call: &mut StateCall) {
        if self.power_state >= 0 {
            call.power_state = Some(self.power_state > 0);
        }
        if self.heater_state >= 0 {
            call.heater_state = Some(self.heater_state > 0);
        }
        if self.fan_speed != 0 {
            call.fan_speed = Some(self.fan_speed);
        }
        if self.target_temperature != 0 {
            call.target_temperature = Some(self.target_temperature);
        }
        if self.gate_position != GatePosition::Unknown {
            call.gate_position = Some(self.gate_position);
        }
        if self.auto_state >= 0 {
            call.auto_state = Some(self.auto_state > 0);
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PresetError {
    #[error("empty preset name")]
    EmptyName,
    #[error("preset name '{0}' is reserved")]
    Reserved(String),
    #[error("preset '{0}' has no data to change")]
    NoChanges(String),
    #[error("preset '{name}' has invalid target temperature {value}")]
    InvalidTargetTemperature {
        name: String,
        value: i8
    },
    #[error("preset '{name}' has invalid fan speed {value}")]
    InvalidFanSpeed {
        name: String,
        value: u8
    },
    #[error("preset '{0}' not found")]
    NotFound(String),
}

/// Named presets and the one last activated.
#[derive(Clone, Debug)]
pub struct Presets {
    presets: BTreeMap<String, PresetData>,
    active: String,
}

impl Default for Presets {
    fn default() -> Self {
        Self {
            presets: BTreeMap::new(),
            active: PRESET_NONE.to_string(),
        }
    }
}

impl Presets {
    pub fn add(&mut self, name: &str, data: PresetData, traits: &TionTraits) -> Result<(), PresetError> {
        if name.is_empty() {
            return Err(PresetError::EmptyName);
        }

        if name.eq_ignore_ascii_case(PRESET_NONE) {
            return Err(PresetError::Reserved(name.to_string()));
        }

        if !data.has_changes() {
            return Err(PresetError::NoChanges(name.to_string()));
        }

        if data.target_temperature != 0
            && !(traits.min_target_temperature..=traits.max_target_temperature).contains(&data.target_temperature)
        {
            return Err(PresetError::InvalidTargetTemperature { name: name.to_string(), value: data.target_temperature });
        }

        if data.fan_speed > traits.max_fan_speed {
            return Err(PresetError::InvalidFanSpeed { name: name.to_string(), value: data.fan_speed });
        }

        debug!("Setup preset '{name}': {data:?}");
        self.presets.insert(name.to_string(), data);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&PresetData> {
        self.presets.get(name)
    }

    /// Preset names, `none` first.
    pub fn names(&self) -> Vec<&str> {
        std::iter::once(PRESET_NONE)
            .chain(self.presets.keys().map(String::as_str))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn active(&self) -> &str {
        &self.active
    }

    /// Make `name` active and add its changes to `call`. `none` only clears the active name.
    pub fn activate(&mut self, name: &str, call: &mut StateCall) -> Result<(), PresetError> {
        debug!("Activate preset '{name}'");

        if name.is_empty() || name.eq_ignore_ascii_case(PRESET_NONE) {
            self.active = name.to_string();
            return Ok(());
        }

        let preset = self.presets.get(name)
            .ok_or_else(|| PresetError::NotFound(name.to_string()))?;

        preset.apply(call);
        self.active = name.to_string();
        Ok(())
    }
}


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoostAction {
    /// Apply through a regular state write
    Write(StateCall),
    /// Start or stop the breezer's own turbo mode
    Native {
        enable: bool,
        time: u16
    },
}

/// Host driven boost: maximum fan speed on outdoor air for a while, then back to what was set
/// before.
#[derive(Clone, Copy, Debug, Default)]
pub struct Boost {
    saved: PresetData,
    start_time: u32,
}

impl Boost {
    pub fn enable(&mut self, state: &mut TionState, traits: &TionTraits) -> Option<BoostAction> {
        if !state.is_initialized() {
            warn!("State is not initialized");
            return None;
        }

        if state.boost_time_left > 0 {
            warn!("Boost is already in progress, time left {} s", state.boost_time_left);
            return None;
        }

        if state.fan_speed == traits.max_fan_speed {
            warn!("Fan is already running at maximum speed");
            return None;
        }

        if traits.boost_time == 0 {
            warn!("Boost time is not configured");
            return None;
        }

        if traits.supports_boost {
            return Some(BoostAction::Native { enable: true, time: traits.boost_time });
        }

        self.save(state, true);
        debug!("Schedule boost for {} s", traits.boost_time);
        state.boost_time_left = traits.boost_time;

        let mut call = StateCall {
            fan_speed: Some(traits.max_fan_speed),
            power_state: Some(true),
            gate_position: Some(GatePosition::Outdoor),
            ..StateCall::default()
        };

        if traits.boost_heater_state >= 0 {
            call.heater_state = Some(traits.boost_heater_state > 0);
        }

        if traits.boost_target_temperature != 0 {
            call.target_temperature = Some(traits.boost_target_temperature);
        }

        Some(BoostAction::Write(call))
    }

    pub fn cancel(&mut self, state: &mut TionState, traits: &TionTraits) -> Option<BoostAction> {
        if state.boost_time_left == 0 {
            return None;
        }

        debug!("Boost finished");

        if traits.supports_boost {
            return Some(BoostAction::Native { enable: false, time: 0 });
        }

        state.boost_time_left = 0;

        let mut call = StateCall::default();
        self.saved.apply(&mut call);
        Some(BoostAction::Write(call))
    }

    /// Boost book-keeping for a freshly decoded state.
    ///
    /// A user change of fan speed or power ends boost and keeps the user's values. Otherwise the
    /// remaining time follows the breezer's work time.
    pub fn notify_state(&mut self, state: &mut TionState, traits: &TionTraits) -> Option<BoostAction> {
        if state.boost_time_left == 0 {
            return None;
        }

        if state.fan_speed != traits.max_fan_speed || !state.power_state {
            debug!("Boost canceled by user action");
            self.save(state, state.fan_speed != traits.max_fan_speed);
            return self.cancel(state, traits);
        }

        if !traits.supports_boost {
            let elapsed = state.work_time.wrapping_sub(self.start_time);
            if elapsed >= traits.boost_time as u32 {
                return self.cancel(state, traits);
            }
            state.boost_time_left = traits.boost_time - elapsed as u16;
        }

        debug!("Boost time left {} s", state.boost_time_left);
        None
    }

    fn save(&mut self, state: &TionState, save_fan: bool) {
        self.start_time = state.work_time;
        self.saved.power_state = state.power_state as i8;
        self.saved.heater_state = state.heater_state as i8;
        if save_fan {
            self.saved.fan_speed = state.fan_speed;
        }
        self.saved.target_temperature = state.target_temperature;
        self.saved.gate_position = state.gate_position;
    }
}


/// CO2 driven fan speed.
#[derive(Clone, Debug)]
pub struct AutoFan {
    pi: PiController,
    setpoint: u16,
    min_fan_speed: u8,
    max_fan_speed: u8,
}

impl Default for AutoFan {
    fn default() -> Self {
        Self {
            pi: PiController::new(0.2736, 8.0, 50),
            setpoint: 0,
            min_fan_speed: 0,
            max_fan_speed: 0,
        }
    }
}

impl AutoFan {
    pub fn set_pi(&mut self, kp: f32, ti: f32, db: i32) {
        self.pi.reset_gains(kp, ti, db);
    }

    /// ppm
    pub fn set_setpoint(&mut self, setpoint: u16) {
        self.setpoint = setpoint;
    }

    pub fn setpoint(&self) -> u16 {
        self.setpoint
    }

    pub fn set_min_fan_speed(&mut self, fan_speed: u8, traits: &TionTraits) {
        self.min_fan_speed = fan_speed;
        self.pi.set_min(traits.productivity(fan_speed) as f32);
        self.pi.reset();
    }

    pub fn set_max_fan_speed(&mut self, fan_speed: u8, traits: &TionTraits) {
        self.max_fan_speed = fan_speed;
        self.pi.set_max(traits.productivity(fan_speed) as f32);
        self.pi.reset();
    }

    pub fn min_fan_speed(&self) -> u8 {
        self.min_fan_speed
    }

    pub fn max_fan_speed(&self) -> u8 {
        self.max_fan_speed
    }

    pub fn is_valid(&self, traits: &TionTraits) -> bool {
        self.setpoint > 0
            && self.min_fan_speed > 0
            && self.min_fan_speed <= self.max_fan_speed
            && self.max_fan_speed <= traits.max_fan_speed
    }

    pub fn update(&mut self, current: u16, state: &TionState, traits: &TionTraits, call: &mut StateCall) -> bool {
        self.update_at(current, state, traits, call, Instant::now())
    }

    /// Run the controller for a CO2 reading, ppm. Returns whether `call` got a new fan speed.
    pub fn update_at(
        &mut self,
        current: u16,
        state: &TionState,
        traits: &TionTraits,
        call: &mut StateCall,
        now: Instant
    ) -> bool {
        if !self.is_valid(traits) {
            warn!("Auto mode is not configured");
            return false;
        }

        let rate = self.pi.update_at(self.setpoint as i32, current as i32, now);
        let fan_speed = self.fan_speed_for(rate, traits);

        debug!("Auto: co2={current}, rate={rate:.1}, fan_speed={fan_speed}");

        if fan_speed == state.fan_speed {
            return false;
        }

        call.fan_speed = Some(fan_speed);
        true
    }

    /// Lowest configured speed covering `rate`, rounded to whole m³/h, the maximum otherwise.
    fn fan_speed_for(&self, rate: f32, traits: &TionTraits) -> u8 {
        let rate = rate.round();

        (self.min_fan_speed..=self.max_fan_speed)
            .find(|speed| traits.productivity(*speed) as f32 >= rate)
            .unwrap_or(self.max_fan_speed)
    }
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn traits() -> TionTraits {
        TionTraits {
            supports_led_state: true,
            supports_sound_state: true,
            supports_gate_position_change: true,
            supports_manual_antifreeze: true,
            max_heater_power: 145,
            min_target_temperature: -20,
            max_target_temperature: 25,
            auto_prod: [0, 15, 30, 45, 60, 75, 120],
            ..TionTraits::default()
        }
    }

    fn state() -> TionState {
        TionState {
            initialized: true,
            power_state: true,
            heater_state: true,
            fan_speed: 2,
            gate_position: GatePosition::Outdoor,
            outdoor_temperature: 5,
            current_temperature: 17,
            target_temperature: 18,
            work_time: 1000,
            ..TionState::default()
        }
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(decode_errors(0, 0, 10, 24, 29), "");
        assert_eq!(decode_errors(0b101, 0, 10, 24, 29), "EC1, EC3");
        assert_eq!(decode_errors(1 | 1 << 24, 0, 10, 24, 29), "EC1, WS25");
        assert_eq!(decode_errors(1 << 24, 0, 10, 0, 0), "");
        assert_eq!(ErrorBits::errors(0, 10).decode(1 << 10), "EC11");
    }

    #[test]
    fn test_heating() {
        let traits = traits();
        let mut state = state();

        assert!(state.is_heating(&traits));
        assert_eq!(state.heater_power(&traits), 1450.0);

        state.current_temperature = 5;
        assert!(!state.is_heating(&traits));

        state.heater_var = 50;
        let traits = TionTraits { supports_heater_var: true, max_heater_power: 140, ..traits };
        assert!(state.is_heating(&traits));
        assert_eq!(state.heater_power(&traits), 700.0);
    }

    #[test]
    fn test_zero_fan_speed_powers_off() {
        let cs = state();
        let mut call = StateCall { fan_speed: Some(0), ..StateCall::default() };

        let ns = make_write_state(&cs, &traits(), &mut call);
        assert!(!ns.power_state);
        assert_eq!(ns.fan_speed, 2);
        assert_eq!(call.power_state, Some(false));
        assert_eq!(call.fan_speed, Some(2));
    }

    #[test]
    fn test_fan_speed_above_max_is_ignored() {
        let cs = state();
        let mut call = StateCall { fan_speed: Some(7), target_temperature: Some(20), ..StateCall::default() };

        let ns = make_write_state(&cs, &traits(), &mut call);
        assert_eq!(ns.fan_speed, 2);
        assert_eq!(ns.target_temperature, 20);
        assert_eq!(call.fan_speed, Some(2));
    }

    #[test]
    fn test_target_temperature_out_of_range_is_ignored() {
        let cs = TionState { target_temperature: 18, ..state() };
        let traits = traits();

        let mut call = StateCall { target_temperature: Some(100), fan_speed: Some(3), ..StateCall::default() };
        let ns = make_write_state(&cs, &traits, &mut call);
        assert_eq!(ns.target_temperature, 18);
        assert_eq!(ns.fan_speed, 3);
        assert_eq!(call.target_temperature, Some(18));

        let mut call = StateCall { target_temperature: Some(-21), ..StateCall::default() };
        assert_eq!(make_write_state(&cs, &traits, &mut call).target_temperature, 18);

        let mut call = StateCall { target_temperature: Some(-20), ..StateCall::default() };
        assert_eq!(make_write_state(&cs, &traits, &mut call).target_temperature, -20);

        let mut call = StateCall { target_temperature: Some(30), ..StateCall::default() };
        assert_eq!(make_write_state(&cs, &TionTraits::default(), &mut call).target_temperature, 18);
    }

    #[test]
    fn test_gate_rules() {
        let cs = state();
        let traits = traits();

        let mut call = StateCall { gate_position: Some(GatePosition::Indoor), ..StateCall::default() };
        let ns = make_write_state(&cs, &traits, &mut call);
        assert_eq!(ns.gate_position, GatePosition::Indoor);
        assert!(!ns.heater_state);

        let mut call = StateCall { gate_position: Some(GatePosition::Mixed), ..StateCall::default() };
        assert_eq!(make_write_state(&cs, &traits, &mut call).gate_position, GatePosition::Outdoor);

        let mixed = TionTraits { supports_gate_position_change_mixed: true, ..traits.clone() };
        assert_eq!(make_write_state(&cs, &mixed, &mut call).gate_position, GatePosition::Mixed);

        let fixed = TionTraits { supports_gate_position_change: false, ..traits };
        let mut call = StateCall { gate_position: Some(GatePosition::Indoor), ..StateCall::default() };
        assert_eq!(make_write_state(&cs, &fixed, &mut call).gate_position, GatePosition::Outdoor);
    }

    #[test]
    fn test_antifreeze() {
        let cs = TionState { heater_state: false, outdoor_temperature: -3, ..state() };
        let mut call = StateCall { fan_speed: Some(3), ..StateCall::default() };

        assert!(make_write_state(&cs, &traits(), &mut call).heater_state);

        let traits = TionTraits { supports_manual_antifreeze: false, ..traits() };
        assert!(!make_write_state(&cs, &traits, &mut call).heater_state);
    }

    #[test]
    fn test_sound_needs_support() {
        let cs = state();
        let mut call = StateCall { sound_state: Some(true), led_state: Some(true), ..StateCall::default() };

        let ns = make_write_state(&cs, &TionTraits::default(), &mut call);
        assert!(!ns.sound_state);
        assert!(!ns.led_state);

        let ns = make_write_state(&cs, &traits(), &mut call);
        assert!(ns.sound_state);
        assert!(ns.led_state);
    }

    #[test]
    fn test_presets() {
        let traits = traits();
        let mut presets = Presets::default();

        let night = PresetData { fan_speed: 1, power_state: 1, ..PresetData::default() };
        assert_eq!(presets.add("night", night, &traits), Ok(()));

        assert_eq!(presets.add("", night, &traits), Err(PresetError::EmptyName));
        assert_eq!(presets.add("None", night, &traits), Err(PresetError::Reserved("None".into())));
        assert_eq!(presets.add("empty", PresetData::default(), &traits), Err(PresetError::NoChanges("empty".into())));
        assert!(matches!(
            presets.add("hot", PresetData { target_temperature: 40, ..PresetData::default() }, &traits),
            Err(PresetError::InvalidTargetTemperature { value: 40, .. })
        ));
        assert!(matches!(
            presets.add("fast", PresetData { fan_speed: 7, ..PresetData::default() }, &traits),
            Err(PresetError::InvalidFanSpeed { value: 7, .. })
        ));

        assert_eq!(presets.names(), vec!["none", "night"]);

        let mut call = StateCall::default();
        presets.activate("night", &mut call).expect("activate");
        assert_eq!(presets.active(), "night");
        assert_eq!(call, StateCall { fan_speed: Some(1), power_state: Some(true), ..StateCall::default() });

        let mut call = StateCall::default();
        presets.activate("none", &mut call).expect("activate");
        assert_eq!(presets.active(), "none");
        assert!(!call.has_changes());

        assert_eq!(presets.activate("day", &mut call), Err(PresetError::NotFound("day".into())));
    }

    #[test]
    fn test_boost_cycle() {
        let traits = TionTraits { boost_heater_state: 0, ..traits() };
        let mut state = state();
        let mut boost = Boost::default();

        let Some(BoostAction::Write(call)) = boost.enable(&mut state, &traits) else {
            panic!("expected a state write");
        };
        assert_eq!(call.fan_speed, Some(6));
        assert_eq!(call.power_state, Some(true));
        assert_eq!(call.gate_position, Some(GatePosition::Outdoor));
        assert_eq!(call.heater_state, Some(false));
        assert_eq!(call.target_temperature, None);
        assert_eq!(state.boost_time_left, 600);

        // already running
        assert_eq!(boost.enable(&mut state, &traits), None);

        state.fan_speed = 6;
        state.work_time += 100;
        assert_eq!(boost.notify_state(&mut state, &traits), None);
        assert_eq!(state.boost_time_left, 500);

        state.work_time += 500;
        let Some(BoostAction::Write(call)) = boost.notify_state(&mut state, &traits) else {
            panic!("expected the saved state back");
        };
        assert_eq!(state.boost_time_left, 0);
        assert_eq!(call.fan_speed, Some(2));
        assert_eq!(call.heater_state, Some(true));
        assert_eq!(call.target_temperature, Some(18));
    }

    #[test]
    fn test_boost_canceled_by_user() {
        let traits = traits();
        let mut state = state();
        let mut boost = Boost::default();

        assert!(boost.enable(&mut state, &traits).is_some());

        // user picked speed 4 while boosting
        state.fan_speed = 4;
        let Some(BoostAction::Write(call)) = boost.notify_state(&mut state, &traits) else {
            panic!("expected a state write");
        };
        assert_eq!(call.fan_speed, Some(4));
        assert_eq!(state.boost_time_left, 0);
    }

    #[test]
    fn test_boost_refused() {
        let traits = traits();
        let mut boost = Boost::default();

        let mut state = TionState { initialized: false, ..state() };
        assert_eq!(boost.enable(&mut state, &traits), None);

        let mut state = TionState { fan_speed: 6, ..self::state() };
        assert_eq!(boost.enable(&mut state, &traits), None);

        let mut state = self::state();
        let no_time = TionTraits { boost_time: 0, ..traits.clone() };
        assert_eq!(boost.enable(&mut state, &no_time), None);

        let native = TionTraits { supports_boost: true, ..traits };
        assert_eq!(boost.enable(&mut state, &native), Some(BoostAction::Native { enable: true, time: 600 }));
        assert_eq!(state.boost_time_left, 0);
    }

    #[test]
    fn test_auto_fan() {
        let traits = traits();
        let state = state();
        let mut auto = AutoFan::default();
        let mut call = StateCall::default();

        assert!(!auto.update(500, &state, &traits, &mut call));

        auto.set_setpoint(700);
        auto.set_min_fan_speed(1, &traits);
        auto.set_max_fan_speed(3, &traits);
        assert!(auto.is_valid(&traits));

        // far below the set point, the controller asks for the minimum airflow
        let now = Instant::now();
        assert!(auto.update_at(450, &state, &traits, &mut call, now));
        assert_eq!(call.fan_speed, Some(1));

        // far above, the maximum
        let mut call = StateCall::default();
        assert!(auto.update_at(1200, &state, &traits, &mut call, now + Duration::from_secs(600)));
        assert_eq!(call.fan_speed, Some(3));

        let at_max = TionState { fan_speed: 3, ..state };
        let mut call = StateCall::default();
        assert!(!auto.update_at(1200, &at_max, &traits, &mut call, now + Duration::from_secs(1200)));
        assert_eq!(call.fan_speed, None);
    }

    #[test]
    fn test_gate_names() {
        let state = state();
        assert_eq!(state.gate_position_name(&traits()), "inflow");
        assert_eq!(state.gate_position_name(&TionTraits::default()), "opened");
        assert_eq!("MIXED".parse::<GatePosition>().ok(), Some(GatePosition::Mixed));
        assert_eq!(GatePosition::Indoor.to_string(), "indoor");
    }
}
