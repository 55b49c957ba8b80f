use crate::protocol::iq::{Led, State};
use crate::state::{TionState, TionTraits};


pub(super) fn traits() -> TionTraits {
    TionTraits {
        supports_led_state: true,
        supports_sound_state: true,
        auto_prod: [0, 30, 60, 90, 120, 160, 200],
        ..TionTraits::default()
    }
}

pub(super) fn update_state(cs: &mut TionState, raw: &State) {
    cs.initialized = true;

    cs.power_state = raw.flags.power_state;
    cs.sound_state = raw.flags.sound_state;
    cs.led_state = raw.led() != Led::Off;
    cs.auto_state = raw.mode.ma_auto;
    cs.fan_speed = raw.fan_speed;
    cs.filter_time_left = raw.filter_days_left();
}


#[cfg(test)]
mod tests {
    use crate::protocol::iq::Flags;

    use super::*;

    #[test]
    fn test_update_state() {
        let raw = State {
            flags: Flags { power_state: true, ..Flags::default() },
            led: 0,
            fan_speed: 4,
            filter_time: 86400 * 30,
            ..State::default()
        };

        let mut cs = TionState { target_temperature: 20, ..TionState::default() };
        update_state(&mut cs, &raw);

        assert!(cs.initialized);
        assert!(cs.power_state);
        assert!(!cs.led_state);
        assert_eq!(cs.fan_speed, 4);
        assert_eq!(cs.filter_time_left, 30);
        // not reported, left alone
        assert_eq!(cs.target_temperature, 20);
    }
}
