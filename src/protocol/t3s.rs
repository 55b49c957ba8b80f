//! 3S: fixed 20-byte frames, no checksum and no request id.
//!
//! ```text
//! type:u16 (LE) | data:u8[17] | 0x5A
//! ```
//!
//! Request types are `(cmd << 8) | 0x3D`, response types `((cmd << 4) << 8) | 0xB3`, so on the
//! wire every response starts with `0xB3`.

use bytes::{Buf, BufMut};
use packed_struct::prelude::*;

use super::codec::FramingError;
use super::frame::{empty_command, Command, FlagWord, Frame, FrameError};

pub const FRAME_SIZE: usize = 20;
pub const DATA_SIZE: usize = 17;

pub const FRAME_MAGIC_REQ: u8 = 0x3D;
pub const FRAME_MAGIC_RSP: u8 = 0xB3;
pub const FRAME_MAGIC_END: u8 = 0x5A;

pub mod cmd {
    pub const STATE_GET: u8 = 0x1;
    pub const STATE_SET: u8 = 0x2;
    pub const TIME_SET: u8 = 0x3;
    pub const TIMERS_GET: u8 = 0x4;
    pub const SRV_MODE_SET: u8 = 0x5;
    pub const HARD_RESET: u8 = 0x6;
    pub const MA_PAIRING: u8 = 0x7;
    pub const ALARM: u8 = 0x9;
    pub const ALARM_ON: u8 = 0xA;
    pub const ALARM_OFF: u8 = 0xB;
}

pub const fn request_type(cmd: u8) -> u16 {
    ((cmd as u16) << 8) | FRAME_MAGIC_REQ as u16
}

pub const fn response_type(cmd: u8) -> u16 {
    (((cmd as u16) << 4) << 8) | FRAME_MAGIC_RSP as u16
}


/// Build the 20-byte frame. Payloads shorter than 17 bytes are zero padded.
pub fn pack_frame(frame: &Frame) -> Result<[u8; FRAME_SIZE], FrameError> {
    if frame.data.len() > DATA_SIZE {
        return Err(FrameError::PayloadTooLarge(frame.data.len()))
    }

    let mut raw = [0x00; FRAME_SIZE];
    raw[..2].copy_from_slice(&frame.ty.to_le_bytes());
    raw[2..2 + frame.data.len()].copy_from_slice(&frame.data);
    raw[FRAME_SIZE - 1] = FRAME_MAGIC_END;

    Ok(raw)
}

/// Parse a complete 20-byte frame.
pub fn unpack_frame(raw: &[u8]) -> Result<Frame, FramingError> {
    if raw.len() != FRAME_SIZE {
        return Err(FramingError::InvalidSize(raw.len()))
    }

    if raw[FRAME_SIZE - 1] != FRAME_MAGIC_END {
        return Err(FramingError::FrameEndNotFound)
    }

    let ty = u16::from_le_bytes([raw[0], raw[1]]);

    Ok(Frame::new(ty, bytes::Bytes::copy_from_slice(&raw[2..FRAME_SIZE - 1])))
}


#[derive(PrimitiveEnum_u8, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GatePosition {
    Indoor = 0,
    Mixed = 1,
    Outdoor = 2,
}

#[derive(PackedStruct, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[packed_struct(bit_numbering="lsb0", size_bytes="2")]
pub struct Flags {
    #[packed_field(bits="0")]
    pub heater_state: bool,
    #[packed_field(bits="1")]
    pub power_state: bool,
    #[packed_field(bits="2")]
    pub timer_state: bool,
    #[packed_field(bits="3")]
    pub sound_state: bool,
    #[packed_field(bits="4")]
    pub auto_state: bool,
    /// MagicAir station connected
    #[packed_field(bits="5")]
    pub ma_connect: bool,
    #[packed_field(bits="6")]
    pub save: bool,
    #[packed_field(bits="7")]
    pub ma_pairing: bool,
    #[packed_field(bits="8")]
    pub preset_state: bool,
    #[packed_field(bits="9")]
    pub presets_state: bool,
}


/// Response `0x10B3` -- State.
///
/// Also sent in reply to a state set (`0x20B3`).
///
/// | byte  | field |
/// |-------|-------|
/// | 0     | bits 0-3 fan speed, bits 4-7 gate position |
/// | 1     | target temperature |
/// | 2-3   | [`Flags`] |
/// | 4     | current temperature, sensor 1 |
/// | 5     | current temperature, sensor 2 |
/// | 6     | outdoor temperature |
/// | 7-8   | filter time left, days |
/// | 9     | hours |
/// | 10    | minutes |
/// | 11    | last error code |
/// | 12    | productivity, m³/h |
/// | 13-14 | days since the filter was replaced |
/// | 15-16 | firmware version |
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct State {
    pub fan_speed: u8,
    /// Raw [`GatePosition`]
    pub gate_position: u8,
    pub target_temperature: i8,
    pub flags: Flags,
    pub current_temperature1: i8,
    pub current_temperature2: i8,
    pub outdoor_temperature: i8,
    pub filter_time: u16,
    pub hours: u8,
    pub minutes: u8,
    pub last_error: u8,
    pub productivity: u8,
    pub filter_days: u16,
    pub firmware_version: u16,
}

impl State {
    /// Average of the two room sensors; a sensor reading zero or below is replaced by the other.
    pub fn current_temperature(&self) -> i8 {
        let t1 = self.current_temperature1 as i16;
        let t2 = self.current_temperature2 as i16;

        let avg = ((if t1 <= 0 { t2 } else { t1 }) + (if t2 <= 0 { t1 } else { t2 })) / 2;
        avg as i8
    }

    pub fn filter_time_left(&self) -> u16 {
        if self.filter_time > 360 { 1 } else { self.filter_time }
    }

    pub fn filter_warnout(&self) -> bool {
        self.filter_time <= 10
    }

    pub fn is_initialized(&self) -> bool {
        self.firmware_version != 0
    }
}

impl Command for State {
    const TYPE: u16 = response_type(cmd::STATE_GET);
    const SIZE: usize = DATA_SIZE;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        let fan_gate = src.get_u8();

        Ok(Self {
            fan_speed: fan_gate & 0x0F,
            gate_position: fan_gate >> 4,
            target_temperature: src.get_i8(),
            flags: Flags::read_le(src)?,
            current_temperature1: src.get_i8(),
            current_temperature2: src.get_i8(),
            outdoor_temperature: src.get_i8(),
            filter_time: src.get_u16_le(),
            hours: src.get_u8(),
            minutes: src.get_u8(),
            last_error: src.get_u8(),
            productivity: src.get_u8(),
            filter_days: src.get_u16_le(),
            firmware_version: src.get_u16_le(),
        })
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        dst.put_u8((self.fan_speed & 0x0F) | (self.gate_position << 4));
        dst.put_i8(self.target_temperature);
        self.flags.write_le(dst)?;
        dst.put_i8(self.current_temperature1);
        dst.put_i8(self.current_temperature2);
        dst.put_i8(self.outdoor_temperature);
        dst.put_u16_le(self.filter_time);
        dst.put_u8(self.hours);
        dst.put_u8(self.minutes);
        dst.put_u8(self.last_error);
        dst.put_u8(self.productivity);
        dst.put_u16_le(self.filter_days);
        dst.put_u16_le(self.firmware_version);
        Ok(())
    }
}

/// Response `0x20B3` -- State after a set. Same layout as [`State`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StateSetResponse(pub State);

impl Command for StateSetResponse {
    const TYPE: u16 = response_type(cmd::STATE_SET);
    const SIZE: usize = DATA_SIZE;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        State::read(src).map(Self)
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        self.0.write(dst)
    }
}


#[derive(PackedStruct, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[packed_struct(bit_numbering="lsb0", size_bytes="1")]
pub struct FilterControl {
    #[packed_field(bits="0")]
    pub save: bool,
    #[packed_field(bits="1")]
    pub reset: bool,
}


/// Request `0x023D` -- State set.
///
/// | byte | field |
/// |------|-------|
/// | 0    | fan speed |
/// | 1    | target temperature |
/// | 2    | gate position |
/// | 3-4  | [`Flags`] |
/// | 5    | [`FilterControl`] |
/// | 6-7  | filter time, days |
/// | 8    | factory reset |
/// | 9    | service mode |
/// | 10-16| zero |
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StateSet {
    pub fan_speed: u8,
    pub target_temperature: i8,
    pub gate_position: u8,
    pub flags: Flags,
    pub filter_control: FilterControl,
    pub filter_time: u16,
    pub factory_reset: bool,
    pub service_mode: bool,
}

impl StateSet {
    const USED_SIZE: usize = 10;
}

impl Command for StateSet {
    const TYPE: u16 = request_type(cmd::STATE_SET);
    const SIZE: usize = DATA_SIZE;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        let set = Self {
            fan_speed: src.get_u8(),
            target_temperature: src.get_i8(),
            gate_position: src.get_u8(),
            flags: Flags::read_le(src)?,
            filter_control: FilterControl::unpack(&[src.get_u8()])?,
            filter_time: src.get_u16_le(),
            factory_reset: src.get_u8() != 0,
            service_mode: src.get_u8() != 0,
        };
        src.advance(DATA_SIZE - Self::USED_SIZE);

        Ok(set)
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        dst.put_u8(self.fan_speed);
        dst.put_i8(self.target_temperature);
        dst.put_u8(self.gate_position);
        self.flags.write_le(dst)?;
        dst.put_slice(&self.filter_control.pack()?);
        dst.put_u16_le(self.filter_time);
        dst.put_u8(self.factory_reset as u8);
        dst.put_u8(self.service_mode as u8);
        dst.put_bytes(0x00, DATA_SIZE - Self::USED_SIZE);
        Ok(())
    }
}


/// Request `0x053D` -- Service mode, sent with `[1]` to start pairing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ServiceModeSet {
    pub pair: bool,
}

impl Command for ServiceModeSet {
    const TYPE: u16 = request_type(cmd::SRV_MODE_SET);
    const SIZE: usize = DATA_SIZE;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        let pair = src.get_u8() != 0;
        src.advance(DATA_SIZE - 1);
        Ok(Self { pair })
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        dst.put_u8(self.pair as u8);
        dst.put_bytes(0x00, DATA_SIZE - 1);
        Ok(())
    }
}

empty_command!(
    /// Request `0x013D` -- State get.
    StateGet, request_type(cmd::STATE_GET), DATA_SIZE
);

empty_command!(
    /// Request `0x043D` -- Timers get. The reply layout is not known.
    TimersGet, request_type(cmd::TIMERS_GET), DATA_SIZE
);

empty_command!(
    /// Request `0x063D` -- Hard reset.
    HardReset, request_type(cmd::HARD_RESET), DATA_SIZE
);

empty_command!(
    /// Request `0x0A3D` -- Alarm on.
    AlarmOn, request_type(cmd::ALARM_ON), DATA_SIZE
);

empty_command!(
    /// Request `0x0B3D` -- Alarm off.
    AlarmOff, request_type(cmd::ALARM_OFF), DATA_SIZE
);


#[cfg(test)]
mod tests {
    use super::*;

    /// State response with fan 1, outdoor gate, 23°C, heater/power/sound on, 79 days of filter.
    pub(crate) const STATE_RESPONSE: [u8; FRAME_SIZE] = [
        0xB3, 0x10, 0x21, 0x17, 0x0B, 0x00, 0x00, 0x00, 0x00, 0x4F,
        0x00, 0x0E, 0x2D, 0x00, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0x5A
    ];

    #[test]
    fn test_frame_types() {
        assert_eq!(request_type(cmd::STATE_GET), 0x013D);
        assert_eq!(request_type(cmd::STATE_SET), 0x023D);
        assert_eq!(response_type(cmd::STATE_GET), 0x10B3);
        assert_eq!(response_type(cmd::STATE_SET), 0x20B3);
        assert_eq!(response_type(cmd::TIMERS_GET), 0x40B3);
    }

    #[test]
    fn test_decode_state() {
        let frame = unpack_frame(&STATE_RESPONSE).expect("frame");
        assert_eq!(frame.ty, 0x10B3);

        let state = frame.unpack_as::<State>().expect("state");
        assert_eq!(state.fan_speed, 1);
        assert_eq!(GatePosition::from_primitive(state.gate_position), Some(GatePosition::Outdoor));
        assert_eq!(state.target_temperature, 23);
        assert!(state.flags.heater_state);
        assert!(state.flags.power_state);
        assert!(state.flags.sound_state);
        assert!(!state.flags.timer_state);
        assert_eq!(state.filter_time, 79);
        assert_eq!((state.hours, state.minutes), (14, 45));
        assert_eq!(state.firmware_version, 0xFFFF);
        assert!(state.is_initialized());
    }

    #[test]
    fn test_state_reencodes_identically() {
        let frame = unpack_frame(&STATE_RESPONSE).expect("frame");
        let state = frame.unpack_as::<State>().expect("state");

        let packed = pack_frame(&Frame::pack(&state).expect("pack")).expect("frame");
        assert_eq!(packed, STATE_RESPONSE);
    }

    #[test]
    fn test_encode_state_set() {
        let set = StateSet {
            fan_speed: 1,
            target_temperature: 23,
            gate_position: GatePosition::Outdoor.to_primitive(),
            flags: Flags { heater_state: true, power_state: true, sound_state: true, ..Default::default() },
            filter_time: 79,
            ..Default::default()
        };

        let raw = pack_frame(&Frame::pack(&set).expect("pack")).expect("frame");
        assert_eq!(raw, [
            0x3D, 0x02, 0x01, 0x17, 0x02, 0x0B, 0x00, 0x00, 0x4F, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x5A
        ]);

        let frame = unpack_frame(&raw).expect("frame");
        assert_eq!(frame.unpack_as::<StateSet>().expect("set"), set);
    }

    #[test]
    fn test_encode_requests() {
        let raw = pack_frame(&Frame::pack(&StateGet).expect("pack")).expect("frame");
        assert_eq!(&raw[..3], &[0x3D, 0x01, 0x00]);
        assert_eq!(raw[19], 0x5A);

        let raw = pack_frame(&Frame::pack(&ServiceModeSet { pair: true }).expect("pack")).expect("frame");
        assert_eq!(&raw[..3], &[0x3D, 0x05, 0x01]);
    }

    #[test]
    fn test_current_temperature_average() {
        let mut state = State { current_temperature1: 20, current_temperature2: 23, ..Default::default() };
        assert_eq!(state.current_temperature(), 21);

        state.current_temperature1 = 0;
        assert_eq!(state.current_temperature(), 23);

        state.current_temperature1 = -5;
        state.current_temperature2 = -3;
        assert_eq!(state.current_temperature(), -4);

        state.current_temperature1 = -4;
        state.current_temperature2 = -1;
        assert_eq!(state.current_temperature(), -2);
    }

    #[test]
    fn test_filter_time_left() {
        let mut state = State { filter_time: 361, ..Default::default() };
        assert_eq!(state.filter_time_left(), 1);

        state.filter_time = 10;
        assert_eq!(state.filter_time_left(), 10);
        assert!(state.filter_warnout());
    }

    #[test]
    fn test_unpack_rejects_bad_frames() {
        assert!(matches!(unpack_frame(&STATE_RESPONSE[..19]), Err(FramingError::InvalidSize(19))));

        let mut raw = STATE_RESPONSE;
        raw[19] = 0x00;
        assert!(matches!(unpack_frame(&raw), Err(FramingError::FrameEndNotFound)));
    }
}
