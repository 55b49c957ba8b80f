use crate::protocol::o2::{DevInfoResponse, State, StateSet, Time, ERROR_MAX_BIT, ERROR_MIN_BIT, MAX_FAN_SPEED};
use crate::state::{ErrorBits, GatePosition, TionState, TionTraits};

const USER_SOURCE: u8 = 1;
const AUTO_SOURCE: u8 = 0;

const SECONDS_PER_DAY: i64 = 24 * 3600;


pub(super) fn traits() -> TionTraits {
    TionTraits {
        supports_gate_error: true,
        supports_work_time: true,
        supports_manual_antifreeze: true,
        errors: Some(ErrorBits::errors(ERROR_MIN_BIT, ERROR_MAX_BIT)),
        max_fan_speed: MAX_FAN_SPEED,
        max_heater_power: 145,
        max_fan_power: [100, 1600, 2600, 4000, 6200, 0, 0],
        auto_prod: [0, 30, 60, 90, 120, 0, 0],
        ..TionTraits::default()
    }
}

/// The O2 always takes outdoor air; the gate only reports faults.
pub(super) fn update_state(cs: &mut TionState, raw: &State) {
    cs.initialized = true;

    cs.power_state = raw.flags.power_state;
    cs.heater_state = raw.flags.heater_state;
    cs.filter_state = raw.flags.filter_state;
    cs.gate_error_state = raw.gate_error();
    cs.gate_position = GatePosition::Outdoor;

    cs.outdoor_temperature = raw.outdoor_temperature;
    cs.current_temperature = raw.current_temperature;
    cs.target_temperature = raw.target_temperature;
    cs.fan_speed = raw.fan_speed;
    cs.productivity = raw.productivity;

    cs.errors = raw.errors as u32;
    cs.work_time = raw.work_time;
    cs.filter_time_left = raw.filter_time / SECONDS_PER_DAY as u32;
}

/// The heater's target temperature range, when the breezer reports one.
pub(super) fn update_traits(traits: &mut TionTraits, info: &DevInfoResponse) {
    if info.heater_min < info.heater_max {
        traits.min_target_temperature = info.heater_min;
        traits.max_target_temperature = info.heater_max;
    }
}

pub(super) fn state_set(ns: &TionState) -> StateSet {
    StateSet {
        fan_speed: ns.fan_speed,
        target_temperature: ns.target_temperature,
        power_state: ns.power_state,
        heater_state: ns.heater_state,
        comm_source: if ns.auto_state { AUTO_SOURCE } else { USER_SOURCE },
    }
}

/// Time of day for a unix time.
pub(super) fn time_of_day(unix_time: i64) -> Time {
    let seconds = unix_time.rem_euclid(SECONDS_PER_DAY);

    Time {
        hours: (seconds / 3600) as u8,
        minutes: (seconds / 60 % 60) as u8,
        seconds: (seconds % 60) as u8,
    }
}

/// Seconds since midnight.
pub(super) fn seconds_of_day(time: &Time) -> i64 {
    time.hours as i64 * 3600 + time.minutes as i64 * 60 + time.seconds as i64
}
