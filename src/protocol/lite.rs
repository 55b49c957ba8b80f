//! Lite: variable frames over radio or serial.

use bytes::{Buf, BufMut};
use packed_struct::prelude::*;

use super::codec::SerialCodec;
use super::devinfo::{Counters, DevInfoResponse};
use super::frame::{empty_command, Command, Correlated, FlagWord, FrameError};

pub mod ty {
    pub const STATE_SET: u16 = 0x1230;
    pub const STATE_RSP: u16 = 0x1231;
    pub const STATE_REQ: u16 = 0x1232;
    pub const STATE_SAVE: u16 = 0x1234;

    pub const DEV_INFO_REQ: u16 = 0x4009;
    pub const DEV_INFO_RSP: u16 = 0x400A;

    pub const AUTOKIV_PARAM_SET: u16 = 0x1240;
    pub const AUTOKIV_PARAM_RSP: u16 = 0x1241;
    pub const AUTOKIV_PARAM_REQ: u16 = 0x1242;

    pub const TEST_REQ: u16 = 0x1111;
    pub const TEST_RSP: u16 = 0x2222;
}

/// Largest frame accepted on the serial line: the state response.
pub const SERIAL_FRAME_MAX_SIZE: usize = SerialCodec::MIN_SIZE + StateResponse::SIZE;

/// Airflow counter calibration, m³ per counter tick per hour.
pub const AIRFLOW_K: f32 = 10.0;

pub const ERROR_MIN_BIT: u8 = 0;
pub const ERROR_MAX_BIT: u8 = 10;

pub const PRESETS_COUNT: usize = 3;
pub const ERROR_TYPES_COUNT: usize = 20;


#[derive(PrimitiveEnum_u8, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GatePosition {
    /// Indoor air
    Closed = 0,
    /// Outdoor air
    Opened = 1,
}

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
    pub last_com_source: bool,
    #[packed_field(bits="4")]
    pub filter_wornout: bool,
    #[packed_field(bits="5")]
    pub auto_co2: bool,
    #[packed_field(bits="6")]
    pub heater_state: bool,
    #[packed_field(bits="7")]
    pub heater_present: bool,
    /// KIV mode available
    #[packed_field(bits="8")]
    pub kiv_present: bool,
    #[packed_field(bits="9")]
    pub kiv_active: bool,
}

/// Target temperature and fan speed for each of the three preset buttons.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ButtonPresets {
    pub temperatures: [i8; PRESETS_COUNT],
    pub fan_speeds: [u8; PRESETS_COUNT],
}

impl ButtonPresets {
    const SIZE: usize = 2 * PRESETS_COUNT;

    fn read<B: Buf>(src: &mut B) -> Self {
        let mut presets = Self::default();
        for temperature in presets.temperatures.iter_mut() {
            *temperature = src.get_i8();
        }
        src.copy_to_slice(&mut presets.fan_speeds);
        presets
    }

    fn write<B: BufMut>(&self, dst: &mut B) {
        for temperature in self.temperatures {
            dst.put_i8(temperature);
        }
        dst.put_slice(&self.fan_speeds);
    }
}


/// Response `0x1231` -- State, preceded by the request id.
///
/// | byte  | field |
/// |-------|-------|
/// | 0-1   | [`Flags`] |
/// | 2     | [`GatePosition`] |
/// | 3     | target temperature |
/// | 4     | fan speed |
/// | 5     | indoor temperature |
/// | 6     | outdoor temperature |
/// | 7     | board temperature |
/// | 8-23  | [`Counters`] |
/// | 24-27 | errors, bits 0-10 |
/// | 28-47 | occurrence count per error |
/// | 48-53 | [`ButtonPresets`] |
/// | 54    | max fan speed |
/// | 55    | heater power, % |
/// | 56    | test type |
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct State {
    pub flags: Flags,
    /// Raw [`GatePosition`]
    pub gate_position: u8,
    pub target_temperature: i8,
    pub fan_speed: u8,
    pub indoor_temperature: i8,
    pub outdoor_temperature: i8,
    pub pcb_temperature: i8,
    pub counters: Counters,
    pub errors: u32,
    pub error_counts: [u8; ERROR_TYPES_COUNT],
    pub button_presets: ButtonPresets,
    pub max_fan_speed: u8,
    pub heater_var: u8,
    pub test_type: u8,
}

impl State {
    pub fn is_initialized(&self) -> bool {
        self.counters.work_time != 0
    }

    /// Heater consumption, W. The Lite heater is rated at 1000 W.
    pub fn heater_power(&self) -> f32 {
        if self.flags.heater_present {
            self.heater_var as f32 * 10.0
        } else {
            0.0
        }
    }
}

impl Command for State {
    const TYPE: u16 = ty::STATE_RSP;
    const SIZE: usize = 57;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        let mut state = Self {
            flags: Flags::read_le(src)?,
            gate_position: src.get_u8(),
            target_temperature: src.get_i8(),
            fan_speed: src.get_u8(),
            indoor_temperature: src.get_i8(),
            outdoor_temperature: src.get_i8(),
            pcb_temperature: src.get_i8(),
            counters: Counters::read(src),
            errors: src.get_u32_le(),
            ..Self::default()
        };

        src.copy_to_slice(&mut state.error_counts);
        state.button_presets = ButtonPresets::read(src);
        state.max_fan_speed = src.get_u8();
        state.heater_var = src.get_u8();
        state.test_type = src.get_u8();

        Ok(state)
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        self.flags.write_le(dst)?;
        dst.put_u8(self.gate_position);
        dst.put_i8(self.target_temperature);
        dst.put_u8(self.fan_speed);
        dst.put_i8(self.indoor_temperature);
        dst.put_i8(self.outdoor_temperature);
        dst.put_i8(self.pcb_temperature);
        self.counters.write(dst);
        dst.put_u32_le(self.errors);
        dst.put_slice(&self.error_counts);
        self.button_presets.write(dst);
        dst.put_u8(self.max_fan_speed);
        dst.put_u8(self.heater_var);
        dst.put_u8(self.test_type);
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
    #[packed_field(bits="3")]
    pub ma_auto: bool,
    #[packed_field(bits="4")]
    pub heater_state: bool,
    /// Set when the change comes from the user, clear for automatic control
    #[packed_field(bits="5")]
    pub comm_source: bool,
    #[packed_field(bits="6")]
    pub factory_reset: bool,
    #[packed_field(bits="7")]
    pub error_reset: bool,
    #[packed_field(bits="8")]
    pub filter_reset: bool,
}

/// Request `0x1230` -- State set, preceded by the request id.
///
/// | byte  | field |
/// |-------|-------|
/// | 0-1   | [`SetFlags`] |
/// | 2     | [`GatePosition`] |
/// | 3     | target temperature |
/// | 4     | fan speed |
/// | 5-10  | [`ButtonPresets`] |
/// | 11-12 | filter time |
/// | 13    | test type |
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StateSet {
    pub flags: SetFlags,
    pub gate_position: u8,
    pub target_temperature: i8,
    pub fan_speed: u8,
    pub button_presets: ButtonPresets,
    pub filter_time: u16,
    pub test_type: u8,
}

impl Command for StateSet {
    const TYPE: u16 = ty::STATE_SET;
    const SIZE: usize = 8 + ButtonPresets::SIZE;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        Ok(Self {
            flags: SetFlags::read_le(src)?,
            gate_position: src.get_u8(),
            target_temperature: src.get_i8(),
            fan_speed: src.get_u8(),
            button_presets: ButtonPresets::read(src),
            filter_time: src.get_u16_le(),
            test_type: src.get_u8(),
        })
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        self.flags.write_le(dst)?;
        dst.put_u8(self.gate_position);
        dst.put_i8(self.target_temperature);
        dst.put_u8(self.fan_speed);
        self.button_presets.write(dst);
        dst.put_u16_le(self.filter_time);
        dst.put_u8(self.test_type);
        Ok(())
    }
}

/// Request `0x1234` -- State set, persisted by the breezer.
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

pub type DevInfo = DevInfoResponse<{ ty::DEV_INFO_RSP }>;

empty_command!(
    /// Request `0x1232` -- State get.
    StateGet, ty::STATE_REQ
);

empty_command!(
    /// Request `0x4009` -- Device information.
    DevInfoGet, ty::DEV_INFO_REQ
);

empty_command!(
    /// Request `0x1242` -- KIV automation parameters. The reply layout is not known.
    AutoKivParamGet, ty::AUTOKIV_PARAM_REQ
);

empty_command!(
    /// Request `0x1111` -- Self test. The reply is a 1 KiB dump.
    TestGet, ty::TEST_REQ
);


#[cfg(test)]
mod tests {
    use crate::protocol::frame::Frame;

    use super::*;

    fn state() -> State {
        State {
            flags: Flags {
                power_state: true,
                sound_state: true,
                heater_state: true,
                heater_present: true,
                auto_co2: true,
                kiv_present: true,
                ..Flags::default()
            },
            gate_position: GatePosition::Opened.to_primitive(),
            target_temperature: 18,
            fan_speed: 3,
            indoor_temperature: 21,
            outdoor_temperature: -5,
            pcb_temperature: 30,
            counters: Counters {
                work_time: 3600,
                fan_time: 1800,
                filter_time: 86400 * 100,
                airflow_counter: 0x1234,
            },
            errors: 0x0000_0401,
            error_counts: [0; ERROR_TYPES_COUNT],
            button_presets: ButtonPresets {
                temperatures: [10, 15, 20],
                fan_speeds: [1, 3, 6],
            },
            max_fan_speed: 6,
            heater_var: 40,
            test_type: 0,
        }
    }

    #[test]
    fn test_state_layout() {
        let frame = Frame::pack(&Correlated::new(9, state())).expect("pack");
        assert_eq!(frame.ty, 0x1231);
        assert_eq!(frame.data.len(), 4 + 57);

        let data = &frame.data[4..];
        // power, sound, auto_co2, heater_state, heater_present, kiv_present
        assert_eq!(&data[..8], &[0xE3, 0x01, 0x01, 0x12, 0x03, 0x15, 0xFB, 0x1E]);
        assert_eq!(&data[8..12], &[0x10, 0x0E, 0x00, 0x00]);
        assert_eq!(&data[24..28], &[0x01, 0x04, 0x00, 0x00]);
        assert_eq!(&data[48..], &[0x0A, 0x0F, 0x14, 0x01, 0x03, 0x06, 0x06, 0x28, 0x00]);

        let decoded = frame.unpack_as::<StateResponse>().expect("unpack");
        assert_eq!(decoded.request_id, 9);
        assert_eq!(decoded.inner, state());
        assert_eq!(decoded.inner.heater_power(), 400.0);
    }

    #[test]
    fn test_state_set_layout() {
        let set = StateSet {
            flags: SetFlags {
                power_state: true,
                sound_state: true,
                ma_auto: true,
                heater_state: true,
                ..SetFlags::default()
            },
            gate_position: GatePosition::Opened.to_primitive(),
            target_temperature: 18,
            fan_speed: 3,
            button_presets: state().button_presets,
            filter_time: 0,
            test_type: 0,
        };

        let frame = Frame::pack(&Correlated::new(1, set)).expect("pack");
        assert_eq!(frame.ty, 0x1230);
        assert_eq!(&frame.data[4..], &[
            0x1B, 0x00, 0x01, 0x12, 0x03, 0x0A, 0x0F, 0x14, 0x01, 0x03, 0x06, 0x00, 0x00, 0x00
        ]);

        let mut reset = set;
        reset.flags.ma_auto = false;
        reset.flags.comm_source = true;
        reset.flags.filter_reset = true;
        let frame = Frame::pack(&StateSave(reset)).expect("pack");
        assert_eq!(frame.ty, 0x1234);
        assert_eq!(&frame.data[..2], &[0x33, 0x01]);
    }

    #[test]
    fn test_serial_max_size() {
        assert_eq!(SERIAL_FRAME_MAX_SIZE, 68);
    }
}
