use packed_struct::prelude::*;

use crate::protocol::t3s::{cmd, response_type, Flags, GatePosition, State, StateSet};
use crate::state::{self, ErrorBits, TionState, TionTraits};

pub(super) const STATE_RSP: u16 = response_type(cmd::STATE_GET);
pub(super) const STATE_SET_RSP: u16 = response_type(cmd::STATE_SET);
pub(super) const TIMERS_RSP: u16 = response_type(cmd::TIMERS_GET);


pub(super) fn traits() -> TionTraits {
    TionTraits {
        supports_sound_state: true,
        supports_gate_position_change: true,
        supports_gate_position_change_mixed: true,
        supports_reset_filter: true,
        errors: Some(ErrorBits::errors(0, 31)),
        max_heater_power: 145,
        max_fan_power: [100, 1400, 1900, 2800, 4000, 6000, 8500],
        auto_prod: [0, 15, 30, 45, 60, 75, 120],
        ..TionTraits::default()
    }
}

fn gate_position(raw: u8) -> state::GatePosition {
    match GatePosition::from_primitive(raw) {
        Some(GatePosition::Indoor) => state::GatePosition::Indoor,
        Some(GatePosition::Mixed) => state::GatePosition::Mixed,
        Some(GatePosition::Outdoor) => state::GatePosition::Outdoor,
        None => state::GatePosition::Unknown,
    }
}

fn raw_gate_position(gate_position: state::GatePosition) -> u8 {
    match gate_position {
        state::GatePosition::Indoor => GatePosition::Indoor,
        state::GatePosition::Mixed => GatePosition::Mixed,
        state::GatePosition::Outdoor | state::GatePosition::Unknown => GatePosition::Outdoor,
    }.to_primitive()
}

pub(super) fn update_state(cs: &mut TionState, raw: &State) {
    cs.initialized = raw.is_initialized();

    cs.power_state = raw.flags.power_state;
    cs.heater_state = raw.flags.heater_state;
    cs.sound_state = raw.flags.sound_state;
    cs.auto_state = raw.flags.auto_state;
    cs.filter_state = raw.filter_warnout();

    cs.fan_speed = raw.fan_speed;
    cs.gate_position = gate_position(raw.gate_position);
    cs.target_temperature = raw.target_temperature;
    cs.outdoor_temperature = raw.outdoor_temperature;
    cs.current_temperature = raw.current_temperature();
    cs.productivity = raw.productivity;
    cs.filter_time_left = raw.filter_time_left() as u32;
    cs.firmware_version = raw.firmware_version;

    // last error code n is reported as bit n - 1
    cs.errors = match raw.last_error {
        code @ 1..=32 => 1 << (code - 1),
        _ => 0
    };
}

pub(super) fn state_set(ns: &TionState) -> StateSet {
    StateSet {
        fan_speed: ns.fan_speed,
        target_temperature: ns.target_temperature,
        gate_position: raw_gate_position(ns.gate_position),
        flags: Flags {
            heater_state: ns.heater_state,
            power_state: ns.power_state,
            sound_state: ns.sound_state,
            auto_state: ns.auto_state,
            ..Flags::default()
        },
        filter_time: ns.filter_time_left.min(u16::MAX as u32) as u16,
        ..StateSet::default()
    }
}

/// Filter reset as the remote sends it: preset bit set, filter time cleared.
pub(super) fn reset_filter(ns: &TionState) -> StateSet {
    let mut set = state_set(ns);
    set.flags.preset_state = true;
    set.filter_control.reset = true;
    set.filter_time = 0;
    set
}
