use packed_struct::prelude::*;

use crate::protocol::t4s::{
    GatePosition, SetFlags, State, StateSet, AIRFLOW_K, ERROR_MAX_BIT, ERROR_MIN_BIT, WARNING_MAX_BIT,
    WARNING_MIN_BIT,
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
        supports_pcb_pwr_temperature: true,
        supports_boost: true,
        supports_reset_filter: true,
        errors: Some(ErrorBits {
            error_min: ERROR_MIN_BIT,
            error_max: ERROR_MAX_BIT,
            warning_min: WARNING_MIN_BIT,
            warning_max: WARNING_MAX_BIT,
        }),
        max_fan_power: [100, 1400, 1700, 2300, 3200, 4500, 6800],
        auto_prod: [0, 25, 40, 55, 80, 100, 120],
        ..TionTraits::default()
    }
}

fn gate_position(raw: u8) -> state::GatePosition {
    match GatePosition::from_primitive(raw) {
        Some(GatePosition::Inflow) => state::GatePosition::Outdoor,
        Some(GatePosition::Recirculation) => state::GatePosition::Indoor,
        None => state::GatePosition::Unknown,
    }
}

fn raw_gate_position(gate_position: state::GatePosition) -> u8 {
    match gate_position {
        state::GatePosition::Indoor => GatePosition::Recirculation,
        _ => GatePosition::Inflow,
    }.to_primitive()
}

/// Apply a state record. The heater rating reported by the breezer updates `traits`.
pub(super) fn update_state(cs: &mut TionState, traits: &mut TionTraits, raw: &State) {
    cs.initialized = raw.is_initialized();

    cs.power_state = raw.flags.power_state;
    cs.sound_state = raw.flags.sound_state;
    cs.led_state = raw.flags.led_state;
    // heater_mode is set while only maintaining temperature
    cs.heater_state = !raw.flags.heater_mode;
    cs.filter_state = raw.flags.filter_warnout;
    cs.auto_state = raw.flags.ma_auto;
    cs.comm_source = if raw.flags.last_com_source { CommSource::User } else { CommSource::Auto };

    cs.gate_position = gate_position(raw.gate_position);
    cs.target_temperature = raw.target_temperature;
    cs.fan_speed = raw.fan_speed;
    cs.outdoor_temperature = raw.outdoor_temperature;
    cs.current_temperature = raw.current_temperature;
    cs.pcb_ctl_temperature = raw.pcb_ctl_temperature;
    cs.pcb_pwr_temperature = raw.pcb_pwr_temperature;

    cs.productivity = raw.counters.productivity(cs.fan_time, cs.airflow_counter, AIRFLOW_K);
    cs.work_time = raw.counters.work_time;
    cs.fan_time = raw.counters.fan_time;
    cs.filter_time_left = raw.counters.filter_days_left();
    cs.airflow_counter = raw.counters.airflow_counter;
    cs.airflow_m3 = raw.counters.airflow_m3(AIRFLOW_K);

    cs.heater_var = raw.heater_var;
    cs.errors = raw.errors;

    traits.max_heater_power = raw.heater_present().map_or(0, |heater| (heater.watts() / 10) as u8);
    if raw.max_fan_speed != 0 {
        traits.max_fan_speed = raw.max_fan_speed;
    }
}

pub(super) fn state_set(ns: &TionState) -> StateSet {
    StateSet {
        flags: SetFlags {
            power_state: ns.power_state,
            sound_state: ns.sound_state,
            led_state: ns.led_state,
            heater_mode: !ns.heater_state,
            last_com_source: true,
            ma_auto: ns.auto_state,
            ..SetFlags::default()
        },
        gate_position: raw_gate_position(ns.gate_position),
        target_temperature: ns.target_temperature,
        fan_speed: if ns.fan_speed == 0 { 1 } else { ns.fan_speed },
        filter_time: 0,
    }
}


#[cfg(test)]
mod tests {
    use crate::protocol::frame::{Correlated, Frame};
    use crate::protocol::t4s::StateResponse;

    use super::*;

    /// Captured state: powered off, fan 1, outdoor air, heater maintaining 16°C, 1400 W heater.
    const STATE_PAYLOAD: [u8; 35] = [
        0x00, 0x00, 0x00, 0x00, 0x3C, 0x51, 0x00, 0x10, 0x01, 0x0C, 0x17, 0x12, 0x1E, 0x71, 0xEF, 0x29,
        0x00, 0xD8, 0x16, 0x1F, 0x00, 0x28, 0x37, 0xCE, 0x00, 0xFE, 0x56, 0x43, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x06, 0x00
    ];

    fn raw_state() -> State {
        Frame::new(0x3231, STATE_PAYLOAD.to_vec())
            .unpack_as::<StateResponse>()
            .expect("unpack")
            .inner
    }

    #[test]
    fn test_decode_capture() {
        let mut cs = TionState::default();
        let mut traits = traits();
        update_state(&mut cs, &mut traits, &raw_state());

        assert!(cs.initialized);
        assert!(!cs.power_state);
        assert!(cs.led_state);
        assert!(!cs.heater_state);
        assert_eq!(cs.comm_source, CommSource::User);
        assert_eq!(cs.gate_position, state::GatePosition::Outdoor);
        assert_eq!(cs.target_temperature, 16);
        assert_eq!(cs.fan_speed, 1);
        assert_eq!(cs.outdoor_temperature, 12);
        assert_eq!(cs.current_temperature, 23);
        assert_eq!(cs.pcb_ctl_temperature, 18);
        assert_eq!(cs.pcb_pwr_temperature, 30);
        assert_eq!(cs.work_time, 0x0029EF71);
        assert_eq!(cs.filter_time_left, 0x00CE3728 / 86400);
        assert_eq!(cs.productivity, 0);

        assert_eq!(traits.max_heater_power, 140);
        assert_eq!(traits.max_fan_speed, 6);
    }

    #[test]
    fn test_productivity_from_consecutive_states() {
        let mut cs = TionState::default();
        let mut traits = traits();
        let mut raw = raw_state();
        update_state(&mut cs, &mut traits, &raw);

        // 60 s of fan time, 240 airflow pulses: 240 / 60 * 15
        raw.counters.fan_time += 60;
        raw.counters.airflow_counter += 240;
        update_state(&mut cs, &mut traits, &raw);
        assert_eq!(cs.productivity, 60);

        // same counters again, no delta
        update_state(&mut cs, &mut traits, &raw);
        assert_eq!(cs.productivity, 0);
        assert_eq!(cs.fan_speed, 1);
    }

    #[test]
    fn test_state_set() {
        let mut cs = TionState::default();
        let mut traits = traits();
        update_state(&mut cs, &mut traits, &raw_state());

        cs.power_state = true;
        cs.heater_state = true;
        cs.gate_position = state::GatePosition::Indoor;
        cs.fan_speed = 4;
        cs.target_temperature = 20;

        let frame = Frame::pack(&Correlated::new(3, state_set(&cs))).expect("pack");
        assert_eq!(frame.ty, 0x3230);
        // power, led, last command source
        assert_eq!(&frame.data[..], &[0x03, 0x00, 0x00, 0x00, 0x15, 0x00, 0x01, 0x14, 0x04, 0x00, 0x00]);
    }
}
