use packed_struct::prelude::*;

use crate::protocol::lite::{
    ButtonPresets, GatePosition, SetFlags, State, StateSet, AIRFLOW_K, ERROR_MAX_BIT, ERROR_MIN_BIT,
};
use crate::state::{self, CommSource, ErrorBits, TionState, TionTraits};


pub(super) fn traits() -> TionTraits {
    TionTraits {
        supports_led_state: true,
        supports_sound_state: true,
        supports_gate_position_change: true,
        supports_heater_var: true,
        supports_work_time: true,
        supports_fan_time: true,
        supports_airflow_counter: true,
        supports_pcb_ctl_temperature: true,
        supports_reset_filter: true,
        errors: Some(ErrorBits::errors(ERROR_MIN_BIT, ERROR_MAX_BIT)),
        max_heater_power: 100,
        max_fan_power: [100, 1000, 1400, 2000, 2800, 4000, 5500],
        auto_prod: [0, 20, 35, 50, 65, 80, 100],
        ..TionTraits::default()
    }
}

fn gate_position(raw: u8) -> state::GatePosition {
    match GatePosition::from_primitive(raw) {
        Some(GatePosition::Opened) => state::GatePosition::Outdoor,
        Some(GatePosition::Closed) => state::GatePosition::Indoor,
        None => state::GatePosition::Unknown,
    }
}

fn raw_gate_position(gate_position: state::GatePosition) -> u8 {
    match gate_position {
        state::GatePosition::Outdoor => GatePosition::Opened,
        _ => GatePosition::Closed,
    }.to_primitive()
}

pub(super) fn update_state(cs: &mut TionState, traits: &mut TionTraits, raw: &State) {
    cs.initialized = raw.is_initialized();

    cs.power_state = raw.flags.power_state;
    cs.sound_state = raw.flags.sound_state;
    cs.led_state = raw.flags.led_state;
    cs.heater_state = raw.flags.heater_state;
    cs.filter_state = raw.flags.filter_wornout;
    cs.auto_state = raw.flags.auto_co2;
    cs.comm_source = if raw.flags.last_com_source { CommSource::User } else { CommSource::Auto };

    cs.gate_position = gate_position(raw.gate_position);
    cs.target_temperature = raw.target_temperature;
    cs.fan_speed = raw.fan_speed;
    cs.current_temperature = raw.indoor_temperature;
    cs.outdoor_temperature = raw.outdoor_temperature;
    cs.pcb_ctl_temperature = raw.pcb_temperature;

    cs.productivity = raw.counters.productivity(cs.fan_time, cs.airflow_counter, AIRFLOW_K);
    cs.work_time = raw.counters.work_time;
    cs.fan_time = raw.counters.fan_time;
    cs.filter_time_left = raw.counters.filter_days_left();
    cs.airflow_counter = raw.counters.airflow_counter;
    cs.airflow_m3 = raw.counters.airflow_m3(AIRFLOW_K);

    cs.heater_var = raw.heater_var;
    cs.errors = raw.errors;

    traits.max_heater_power = if raw.flags.heater_present { 100 } else { 0 };
    traits.supports_kiv = raw.flags.kiv_present;
    if raw.max_fan_speed != 0 {
        traits.max_fan_speed = raw.max_fan_speed;
    }
}

/// Set record for `ns`. The preset buttons are not part of the canonical state and are written
/// back as last reported.
pub(super) fn state_set(ns: &TionState, button_presets: &ButtonPresets) -> StateSet {
    StateSet {
        flags: SetFlags {
            power_state: ns.power_state,
            sound_state: ns.sound_state,
            led_state: ns.led_state,
            ma_auto: ns.auto_state,
            heater_state: ns.heater_state,
            comm_source: !ns.auto_state,
            ..SetFlags::default()
        },
        gate_position: raw_gate_position(ns.gate_position),
        target_temperature: ns.target_temperature,
        fan_speed: if ns.fan_speed == 0 { 1 } else { ns.fan_speed },
        button_presets: *button_presets,
        filter_time: 0,
        test_type: 0,
    }
}
