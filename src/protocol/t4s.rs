//! 4S: variable frames over radio or serial.
//!
//! Responses that answer a correlated request carry the request id as the first four bytes of
//! the payload, see [`Correlated`].

use bytes::{Buf, BufMut};
use packed_struct::prelude::*;

use super::devinfo::{Counters, DevInfoResponse};
use super::frame::{empty_command, Command, Correlated, FlagByte, FlagWord, FrameError};

pub mod ty {
    pub const STATE_SET: u16 = 0x3230;
    pub const STATE_RSP: u16 = 0x3231;
    pub const STATE_REQ: u16 = 0x3232;
    pub const STATE_SAVE: u16 = 0x3234;

    pub const DEV_INFO_REQ: u16 = 0x3332;
    pub const DEV_INFO_RSP: u16 = 0x3331;

    pub const TEST_REQ: u16 = 0x3132;
    pub const TEST_RSP: u16 = 0x3131;

    pub const TIMER_SET: u16 = 0x3430;
    pub const TIMER_REQ: u16 = 0x3432;
    pub const TIMER_RSP: u16 = 0x3431;

    pub const TIMERS_STATE_REQ: u16 = 0x3532;
    pub const TIMERS_STATE_RSP: u16 = 0x3531;

    pub const TIME_SET: u16 = 0x3630;
    pub const TIME_REQ: u16 = 0x3632;
    pub const TIME_RSP: u16 = 0x3631;

    pub const ERR_CNT_REQ: u16 = 0x3732;
    pub const ERR_CNT_RSP: u16 = 0x3731;

    pub const TURBO_SET: u16 = 0x4130;
    pub const TURBO_RSP: u16 = 0x4131;
    pub const TURBO_REQ: u16 = 0x4132;

    pub const HEARTBEAT_REQ: u16 = 0x3932;
    pub const HEARTBEAT_RSP: u16 = 0x3931;
}

/// Largest frame accepted on the serial line.
pub const SERIAL_FRAME_MAX_SIZE: usize = 0x2A;

/// Airflow counter calibration, m³ per counter tick per hour.
pub const AIRFLOW_K: f32 = 15.0;

pub const ERROR_MIN_BIT: u8 = 0;
pub const ERROR_MAX_BIT: u8 = 10;
pub const WARNING_MIN_BIT: u8 = 24;
pub const WARNING_MAX_BIT: u8 = 29;


#[derive(PrimitiveEnum_u8, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GatePosition {
    /// Outdoor air
    Inflow = 0,
    Recirculation = 1,
}

#[derive(PrimitiveEnum_u8, Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaterPresent {
    None = 0,
    W1000 = 1,
    W1400 = 2,
}

impl HeaterPresent {
    pub fn watts(&self) -> u16 {
        match self {
            HeaterPresent::None => 0,
            HeaterPresent::W1000 => 1000,
            HeaterPresent::W1400 => 1400,
        }
    }
}

/// State flags. Bits 7-9 hold [`HeaterPresent`] and are read separately.
#[derive(PackedStruct, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[packed_struct(bit_numbering="lsb0", size_bytes="2")]
pub struct Flags {
    #[packed_field(bits="0")]
    pub power_state: bool,
    #[packed_field(bits="1")]
    pub sound_state: bool,
    #[packed_field(bits="2")]
    pub led_state: bool,
    #[packed_field(bits="3")]
    pub heater_state: bool,
    /// Set for temperature maintenance, clear for heating
    #[packed_field(bits="4")]
    pub heater_mode: bool,
    #[packed_field(bits="5")]
    pub last_com_source: bool,
    #[packed_field(bits="6")]
    pub filter_warnout: bool,
    #[packed_field(bits="10")]
    pub ma_connect: bool,
    #[packed_field(bits="11")]
    pub ma_auto: bool,
    #[packed_field(bits="12")]
    pub active_timer: bool,
}

const HEATER_PRESENT_SHIFT: u16 = 7;
const HEATER_PRESENT_MASK: u16 = 0x7;


/// Response `0x3231` -- State, preceded by the request id.
///
/// | byte  | field |
/// |-------|-------|
/// | 0-1   | [`Flags`], heater present in bits 7-9 |
/// | 2     | [`GatePosition`] |
/// | 3     | target temperature |
/// | 4     | fan speed |
/// | 5     | outdoor temperature |
/// | 6     | current temperature |
/// | 7     | control board temperature |
/// | 8     | power board temperature |
/// | 9-24  | [`Counters`] |
/// | 25-28 | errors, bits 0-10, warnings, bits 24-29 |
/// | 29    | max fan speed |
/// | 30    | heater power, % |
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct State {
    pub flags: Flags,
    /// Raw [`HeaterPresent`]
    pub heater_present: u8,
    /// Raw [`GatePosition`]
    pub gate_position: u8,
    pub target_temperature: i8,
    pub fan_speed: u8,
    pub outdoor_temperature: i8,
    pub current_temperature: i8,
    pub pcb_ctl_temperature: i8,
    pub pcb_pwr_temperature: i8,
    pub counters: Counters,
    pub errors: u32,
    pub max_fan_speed: u8,
    pub heater_var: u8,
}

impl State {
    pub fn is_initialized(&self) -> bool {
        self.counters.work_time != 0
    }

    pub fn heater_present(&self) -> Option<HeaterPresent> {
        HeaterPresent::from_primitive(self.heater_present)
    }

    /// Heater consumption, W. `None` for an unknown heater.
    pub fn heater_power(&self) -> Option<f32> {
        if self.heater_var == 0 || !self.flags.heater_state {
            return Some(0.0);
        }

        self.heater_present()
            .map(|heater| self.heater_var as f32 * heater.watts() as f32 / 100.0)
    }
}

impl Command for State {
    const TYPE: u16 = ty::STATE_RSP;
    const SIZE: usize = 31;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        let word = src.get_u16_le();

        Ok(Self {
            flags: Flags::from_word(word)?,
            heater_present: ((word >> HEATER_PRESENT_SHIFT) & HEATER_PRESENT_MASK) as u8,
            gate_position: src.get_u8(),
            target_temperature: src.get_i8(),
            fan_speed: src.get_u8(),
            outdoor_temperature: src.get_i8(),
            current_temperature: src.get_i8(),
            pcb_ctl_temperature: src.get_i8(),
            pcb_pwr_temperature: src.get_i8(),
            counters: Counters::read(src),
            errors: src.get_u32_le(),
            max_fan_speed: src.get_u8(),
            heater_var: src.get_u8(),
        })
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        let heater_present = (self.heater_present as u16 & HEATER_PRESENT_MASK) << HEATER_PRESENT_SHIFT;
        dst.put_u16_le(self.flags.to_word()? | heater_present);
        dst.put_u8(self.gate_position);
        dst.put_i8(self.target_temperature);
        dst.put_u8(self.fan_speed);
        dst.put_i8(self.outdoor_temperature);
        dst.put_i8(self.current_temperature);
        dst.put_i8(self.pcb_ctl_temperature);
        dst.put_i8(self.pcb_pwr_temperature);
        self.counters.write(dst);
        dst.put_u32_le(self.errors);
        dst.put_u8(self.max_fan_speed);
        dst.put_u8(self.heater_var);
        Ok(())
    }
}

pub type StateResponse = Correlated<State>;


#[derive(PackedStruct, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[packed_struct(bit_numbering="lsb0", size_bytes="2")]
pub struct SetFlags {
    #[packed_field(bits="0")]
    pub power_state: bool,
    #[packed_field(bits="1")]
    pub sound_state: bool,
    #[packed_field(bits="2")]
    pub led_state: bool,
    /// Set for temperature maintenance, clear for heating
    #[packed_field(bits="3")]
    pub heater_mode: bool,
    #[packed_field(bits="4")]
    pub last_com_source: bool,
    #[packed_field(bits="5")]
    pub factory_reset: bool,
    #[packed_field(bits="6")]
    pub error_reset: bool,
    #[packed_field(bits="7")]
    pub filter_reset: bool,
    #[packed_field(bits="8")]
    pub ma_connect: bool,
    #[packed_field(bits="9")]
    pub ma_auto: bool,
}

/// Request `0x3230` -- State set, preceded by the request id.
///
/// | byte | field |
/// |------|-------|
/// | 0-1  | [`SetFlags`] |
/// | 2    | [`GatePosition`] |
/// | 3    | target temperature |
/// | 4    | fan speed |
/// | 5-6  | filter time, days |
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StateSet {
    pub flags: SetFlags,
    pub gate_position: u8,
    pub target_temperature: i8,
    pub fan_speed: u8,
    pub filter_time: u16,
}

impl Command for StateSet {
    const TYPE: u16 = ty::STATE_SET;
    const SIZE: usize = 7;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        Ok(Self {
            flags: SetFlags::read_le(src)?,
            gate_position: src.get_u8(),
            target_temperature: src.get_i8(),
            fan_speed: src.get_u8(),
            filter_time: src.get_u16_le(),
        })
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        self.flags.write_le(dst)?;
        dst.put_u8(self.gate_position);
        dst.put_i8(self.target_temperature);
        dst.put_u8(self.fan_speed);
        dst.put_u16_le(self.filter_time);
        Ok(())
    }
}

/// Request `0x3234` -- State set, persisted by the breezer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StateSave(pub StateSet);

impl Command for StateSave {
    const TYPE: u16 = ty::STATE_SAVE;
    const SIZE: usize = StateSet::SIZE;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        StateSet::read(src).map(Self)
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        self.0.write(dst)
    }
}


/// Response `0x4131` -- Turbo (boost) state, preceded by the request id.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Turbo {
    pub is_active: bool,
    /// Seconds left
    pub turbo_time: u16,
    pub err_code: u8,
}

impl Command for Turbo {
    const TYPE: u16 = ty::TURBO_RSP;
    const SIZE: usize = 4;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        Ok(Self {
            is_active: src.get_u8() != 0,
            turbo_time: src.get_u16_le(),
            err_code: src.get_u8(),
        })
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        dst.put_u8(self.is_active as u8);
        dst.put_u16_le(self.turbo_time);
        dst.put_u8(self.err_code);
        Ok(())
    }
}

/// Request `0x4130` -- Start turbo for `time` seconds, `0` stops it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TurboSet {
    pub time: u16,
    pub err_code: u8,
}

impl Command for TurboSet {
    const TYPE: u16 = ty::TURBO_SET;
    const SIZE: usize = 3;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        Ok(Self {
            time: src.get_u16_le(),
            err_code: src.get_u8(),
        })
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        dst.put_u16_le(self.time);
        dst.put_u8(self.err_code);
        Ok(())
    }
}


/// Response `0x3631` -- Breezer clock, unix time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Time {
    pub unix_time: i64,
}

impl Command for Time {
    const TYPE: u16 = ty::TIME_RSP;
    const SIZE: usize = 8;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        Ok(Self { unix_time: src.get_i64_le() })
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        dst.put_i64_le(self.unix_time);
        Ok(())
    }
}

/// Request `0x3630` -- Set the breezer clock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimeSet(pub Time);

impl Command for TimeSet {
    const TYPE: u16 = ty::TIME_SET;
    const SIZE: usize = Time::SIZE;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        Time::read(src).map(Self)
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        self.0.write(dst)
    }
}


/// Response `0x3931` -- Heartbeat, serial line only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Heartbeat {
    pub work_mode: u8,
}

impl Command for Heartbeat {
    const TYPE: u16 = ty::HEARTBEAT_RSP;
    const SIZE: usize = 1;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        Ok(Self { work_mode: src.get_u8() })
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        dst.put_u8(self.work_mode);
        Ok(())
    }
}


#[derive(PackedStruct, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[packed_struct(bit_numbering="lsb0", size_bytes="1")]
pub struct Weekdays {
    #[packed_field(bits="0")]
    pub monday: bool,
    #[packed_field(bits="1")]
    pub tuesday: bool,
    #[packed_field(bits="2")]
    pub wednesday: bool,
    #[packed_field(bits="3")]
    pub thursday: bool,
    #[packed_field(bits="4")]
    pub friday: bool,
    #[packed_field(bits="5")]
    pub saturday: bool,
    #[packed_field(bits="6")]
    pub sunday: bool,
}

#[derive(PackedStruct, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[packed_struct(bit_numbering="lsb0", size_bytes="1")]
pub struct TimerFlags {
    #[packed_field(bits="0")]
    pub power_state: bool,
    #[packed_field(bits="1")]
    pub sound_state: bool,
    #[packed_field(bits="2")]
    pub led_state: bool,
    #[packed_field(bits="3")]
    pub heater_mode: bool,
    #[packed_field(bits="4")]
    pub timer_state: bool,
}

/// One of the twelve weekly timers.
///
/// | byte | field |
/// |------|-------|
/// | 0    | timer id |
/// | 1    | [`Weekdays`] |
/// | 2    | hours |
/// | 3    | minutes |
/// | 4    | [`TimerFlags`] |
/// | 5    | target temperature |
/// | 6    | fan speed |
/// | 7    | device mode |
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timer {
    pub timer_id: u8,
    pub weekdays: Weekdays,
    pub hours: u8,
    pub minutes: u8,
    pub flags: TimerFlags,
    pub target_temperature: i8,
    pub fan_speed: u8,
    pub device_mode: u8,
}

impl Timer {
    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        Ok(Self {
            timer_id: src.get_u8(),
            weekdays: Weekdays::from_byte(src.get_u8())?,
            hours: src.get_u8(),
            minutes: src.get_u8(),
            flags: TimerFlags::from_byte(src.get_u8())?,
            target_temperature: src.get_i8(),
            fan_speed: src.get_u8(),
            device_mode: src.get_u8(),
        })
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        dst.put_u8(self.timer_id);
        dst.put_u8(self.weekdays.to_byte()?);
        dst.put_u8(self.hours);
        dst.put_u8(self.minutes);
        dst.put_u8(self.flags.to_byte()?);
        dst.put_i8(self.target_temperature);
        dst.put_u8(self.fan_speed);
        dst.put_u8(self.device_mode);
        Ok(())
    }
}

macro_rules! timer_command {
    ($(#[$meta:meta])* $name:ident, $ty:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
        pub struct $name(pub Timer);

        impl Command for $name {
            const TYPE: u16 = $ty;
            const SIZE: usize = 8;

            fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
                Timer::read(src).map(Self)
            }

            fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
                self.0.write(dst)
            }
        }
    };
}

timer_command!(
    /// Response `0x3431` -- Timer settings, preceded by the request id.
    TimerResponse, ty::TIMER_RSP
);

timer_command!(
    /// Request `0x3430` -- Write timer settings, preceded by the request id.
    TimerSet, ty::TIMER_SET
);

/// Request `0x3432` -- Read one timer, preceded by the request id.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimerGet {
    pub timer_id: u8,
}

impl Command for TimerGet {
    const TYPE: u16 = ty::TIMER_REQ;
    const SIZE: usize = 1;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        Ok(Self { timer_id: src.get_u8() })
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        dst.put_u8(self.timer_id);
        Ok(())
    }
}

pub const TIMERS_COUNT: usize = 12;

/// Response `0x3531` -- Which timers are active, preceded by the request id.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimersState {
    pub active: [bool; TIMERS_COUNT],
}

impl Command for TimersState {
    const TYPE: u16 = ty::TIMERS_STATE_RSP;
    const SIZE: usize = TIMERS_COUNT;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        let mut active = [false; TIMERS_COUNT];
        for timer in active.iter_mut() {
            *timer = src.get_u8() != 0;
        }
        Ok(Self { active })
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        for timer in self.active {
            dst.put_u8(timer as u8);
        }
        Ok(())
    }
}

pub const ERROR_TYPES_COUNT: usize = 32;

/// Response `0x3731` -- Occurrence count per error code, preceded by the request id.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ErrorCounters {
    pub counts: [u8; ERROR_TYPES_COUNT],
}

impl Command for ErrorCounters {
    const TYPE: u16 = ty::ERR_CNT_RSP;
    const SIZE: usize = ERROR_TYPES_COUNT;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        let mut counts = [0; ERROR_TYPES_COUNT];
        src.copy_to_slice(&mut counts);
        Ok(Self { counts })
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        dst.put_slice(&self.counts);
        Ok(())
    }
}

/// Response `0x3131` -- Self test type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Test {
    pub test_type: u32,
}

impl Command for Test {
    const TYPE: u16 = ty::TEST_RSP;
    const SIZE: usize = 4;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        Ok(Self { test_type: src.get_u32_le() })
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        dst.put_u32_le(self.test_type);
        Ok(())
    }
}

pub type DevInfo = DevInfoResponse<{ ty::DEV_INFO_RSP }>;

empty_command!(
    /// Request `0x3232` -- State get.
    StateGet, ty::STATE_REQ
);

empty_command!(
    /// Request `0x3332` -- Device information.
    DevInfoGet, ty::DEV_INFO_REQ
);

empty_command!(
    /// Request `0x4132` -- Turbo state.
    TurboGet, ty::TURBO_REQ
);

empty_command!(
    /// Request `0x3632` -- Clock, sent as a bare request id.
    TimeGet, ty::TIME_REQ
);

empty_command!(
    /// Request `0x3532` -- Timer activity, sent as a bare request id.
    TimersStateGet, ty::TIMERS_STATE_REQ
);

empty_command!(
    /// Request `0x3732` -- Error counters.
    ErrorCountersGet, ty::ERR_CNT_REQ
);

empty_command!(
    /// Request `0x3132` -- Self test.
    TestGet, ty::TEST_REQ
);

empty_command!(
    /// Request `0x3932` -- Heartbeat, expected every 3 seconds on the serial line.
    HeartbeatGet, ty::HEARTBEAT_REQ
);
