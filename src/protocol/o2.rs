//! O2: single byte frame types on a serial line, sized by type. See [`super::codec::O2Codec`].

use bytes::{Buf, BufMut};
use packed_struct::prelude::*;

use super::devinfo::DevInfo;
use super::frame::{empty_command, Command, FlagByte, FrameError};

pub mod ty {
    pub const CONNECT_REQ: u16 = 0x00;
    pub const CONNECT_RSP: u16 = 0x10;

    pub const STATE_GET_REQ: u16 = 0x01;
    pub const STATE_GET_RSP: u16 = 0x11;

    pub const STATE_SET_REQ: u16 = 0x02;

    pub const DEV_MODE_REQ: u16 = 0x03;
    pub const DEV_MODE_RSP: u16 = 0x13;

    pub const SET_WORK_MODE_REQ: u16 = 0x04;
    pub const SET_WORK_MODE_RSP: u16 = 0x55;

    pub const TIME_GET_REQ: u16 = 0x05;
    pub const TIME_GET_RSP: u16 = 0x15;

    pub const TIME_SET_REQ: u16 = 0x06;

    pub const DEV_INFO_REQ: u16 = 0x07;
    pub const DEV_INFO_RSP: u16 = 0x17;
}

pub const MAX_FAN_SPEED: u8 = 4;

pub const ERROR_MIN_BIT: u8 = 0;
pub const ERROR_MAX_BIT: u8 = 10;
pub const GATE_ERROR_MASK: u16 = 1 << 4;


/// Payload plus checksum size of a response, by type.
pub fn response_size(ty: u8) -> Option<usize> {
    match ty as u16 {
        ty::CONNECT_RSP => Some(5),
        ty::STATE_GET_RSP => Some(18),
        ty::DEV_MODE_RSP => Some(2),
        ty::TIME_GET_RSP => Some(4),
        ty::DEV_INFO_RSP => Some(25),
        ty::SET_WORK_MODE_RSP => Some(1),
        _ => None
    }
}

/// Payload plus checksum size of a request, by type.
pub fn request_size(ty: u8) -> Option<usize> {
    match ty as u16 {
        ty::CONNECT_REQ => Some(1),
        ty::STATE_GET_REQ => Some(1),
        ty::STATE_SET_REQ => Some(6),
        ty::DEV_MODE_REQ => Some(1),
        ty::SET_WORK_MODE_REQ => Some(2),
        ty::TIME_GET_REQ => Some(1),
        ty::TIME_SET_REQ => Some(4),
        ty::DEV_INFO_REQ => Some(1),
        _ => None
    }
}


#[derive(PackedStruct, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[packed_struct(bit_numbering="lsb0", size_bytes="1")]
pub struct Flags {
    #[packed_field(bits="0")]
    pub filter_state: bool,
    #[packed_field(bits="1")]
    pub power_state: bool,
    #[packed_field(bits="2")]
    pub unknown2_state: bool,
    #[packed_field(bits="3")]
    pub heater_state: bool,
}

/// Response `0x11` -- State.
///
/// | byte  | field |
/// |-------|-------|
/// | 0     | [`Flags`] |
/// | 1     | outdoor temperature |
/// | 2     | current temperature |
/// | 3     | target temperature |
/// | 4     | fan speed, 1-4 |
/// | 5     | productivity, m³/h |
/// | 6     | unknown, always 4 |
/// | 7-8   | errors, bits 0-10, gate error bit 4 |
/// | 9-12  | work time, s |
/// | 13-16 | filter time left, s |
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct State {
    pub flags: Flags,
    pub outdoor_temperature: i8,
    pub current_temperature: i8,
    pub target_temperature: i8,
    pub fan_speed: u8,
    pub productivity: u8,
    pub unknown7: u8,
    pub errors: u16,
    pub work_time: u32,
    pub filter_time: u32,
}

impl State {
    pub fn gate_error(&self) -> bool {
        self.errors & GATE_ERROR_MASK != 0
    }
}

impl Command for State {
    const TYPE: u16 = ty::STATE_GET_RSP;
    const SIZE: usize = 17;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        Ok(Self {
            flags: Flags::from_byte(src.get_u8())?,
            outdoor_temperature: src.get_i8(),
            current_temperature: src.get_i8(),
            target_temperature: src.get_i8(),
            fan_speed: src.get_u8(),
            productivity: src.get_u8(),
            unknown7: src.get_u8(),
            errors: src.get_u16_le(),
            work_time: src.get_u32_le(),
            filter_time: src.get_u32_le(),
        })
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        dst.put_u8(self.flags.to_byte()?);
        dst.put_i8(self.outdoor_temperature);
        dst.put_i8(self.current_temperature);
        dst.put_i8(self.target_temperature);
        dst.put_u8(self.fan_speed);
        dst.put_u8(self.productivity);
        dst.put_u8(self.unknown7);
        dst.put_u16_le(self.errors);
        dst.put_u32_le(self.work_time);
        dst.put_u32_le(self.filter_time);
        Ok(())
    }
}


/// Request `0x02` -- State set.
///
/// | byte | field |
/// |------|-------|
/// | 0    | fan speed, 1-4 |
/// | 1    | target temperature |
/// | 2    | power |
/// | 3    | heater |
/// | 4    | source: 0 automatic, 1 user |
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StateSet {
    pub fan_speed: u8,
    pub target_temperature: i8,
    pub power_state: bool,
    pub heater_state: bool,
    pub comm_source: u8,
}

impl Command for StateSet {
    const TYPE: u16 = ty::STATE_SET_REQ;
    const SIZE: usize = 5;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        Ok(Self {
            fan_speed: src.get_u8(),
            target_temperature: src.get_i8(),
            power_state: src.get_u8() != 0,
            heater_state: src.get_u8() != 0,
            comm_source: src.get_u8(),
        })
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        dst.put_u8(if self.fan_speed == 0 { 1 } else { self.fan_speed });
        dst.put_i8(self.target_temperature);
        dst.put_u8(self.power_state as u8);
        dst.put_u8(self.heater_state as u8);
        dst.put_u8(self.comm_source);
        Ok(())
    }
}


/// Response `0x10` -- Connect. Content not decoded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Connect {
    pub data: [u8; 4],
}

impl Command for Connect {
    const TYPE: u16 = ty::CONNECT_RSP;
    const SIZE: usize = 4;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        let mut data = [0; 4];
        src.copy_to_slice(&mut data);
        Ok(Self { data })
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        dst.put_slice(&self.data);
        Ok(())
    }
}


#[derive(PackedStruct, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[packed_struct(bit_numbering="lsb0", size_bytes="1")]
pub struct DevModeFlags {
    /// Pairing in progress
    #[packed_field(bits="0")]
    pub pair: bool,
    /// Last change came from the breezer's own buttons
    #[packed_field(bits="1")]
    pub user: bool,
}

/// Response `0x13` -- Device mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DevMode(pub DevModeFlags);

impl Command for DevMode {
    const TYPE: u16 = ty::DEV_MODE_RSP;
    const SIZE: usize = 1;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        Ok(Self(DevModeFlags::from_byte(src.get_u8())?))
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        dst.put_u8(self.0.to_byte()?);
        Ok(())
    }
}


#[derive(PackedStruct, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[packed_struct(bit_numbering="lsb0", size_bytes="1")]
pub struct WorkModeFlags {
    /// Toggling makes the breezer beep and blink
    #[packed_field(bits="0")]
    pub ma_pair_accepted: bool,
    #[packed_field(bits="1")]
    pub rf_connected: bool,
    #[packed_field(bits="2")]
    pub ma_pairing: bool,
    /// Shows the AUTO icon
    #[packed_field(bits="3")]
    pub ma_auto: bool,
    #[packed_field(bits="4")]
    pub ma_connected: bool,
}

/// Request `0x04` -- Work mode, also serves as the periodic keep-alive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkModeSet(pub WorkModeFlags);

impl Command for WorkModeSet {
    const TYPE: u16 = ty::SET_WORK_MODE_REQ;
    const SIZE: usize = 1;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        Ok(Self(WorkModeFlags::from_byte(src.get_u8())?))
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        dst.put_u8(self.0.to_byte()?);
        Ok(())
    }
}


#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Time {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

impl Command for Time {
    const TYPE: u16 = ty::TIME_GET_RSP;
    const SIZE: usize = 3;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        Ok(Self {
            hours: src.get_u8(),
            minutes: src.get_u8(),
            seconds: src.get_u8(),
        })
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        dst.put_u8(self.hours);
        dst.put_u8(self.minutes);
        dst.put_u8(self.seconds);
        Ok(())
    }
}

/// Request `0x06` -- Set the breezer clock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimeSet(pub Time);

impl Command for TimeSet {
    const TYPE: u16 = ty::TIME_SET_REQ;
    const SIZE: usize = Time::SIZE;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        Time::read(src).map(Self)
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        self.0.write(dst)
    }
}


/// Response `0x17` -- Device information.
///
/// | byte  | field |
/// |-------|-------|
/// | 0     | unknown, always 4 |
/// | 1-15  | zero |
/// | 16-17 | hardware version |
/// | 18-19 | firmware version |
/// | 20-21 | unknown |
/// | 22    | minimum heater temperature |
/// | 23    | maximum heater temperature |
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DevInfoResponse {
    pub unknown1: u8,
    pub hardware_version: u16,
    pub firmware_version: u16,
    pub unknown21: u8,
    pub unknown22: u8,
    pub heater_min: i8,
    pub heater_max: i8,
}

impl DevInfoResponse {
    /// As a generic device information record; O2 reports neither work mode nor device type.
    pub fn to_dev_info(&self) -> DevInfo {
        DevInfo {
            work_mode: 0,
            device_type: 0,
            firmware_version: self.firmware_version,
            hardware_version: self.hardware_version,
        }
    }
}

impl Command for DevInfoResponse {
    const TYPE: u16 = ty::DEV_INFO_RSP;
    const SIZE: usize = 24;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        let unknown1 = src.get_u8();
        src.advance(15);

        Ok(Self {
            unknown1,
            hardware_version: src.get_u16_le(),
            firmware_version: src.get_u16_le(),
            unknown21: src.get_u8(),
            unknown22: src.get_u8(),
            heater_min: src.get_i8(),
            heater_max: src.get_i8(),
        })
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        dst.put_u8(self.unknown1);
        dst.put_bytes(0x00, 15);
        dst.put_u16_le(self.hardware_version);
        dst.put_u16_le(self.firmware_version);
        dst.put_u8(self.unknown21);
        dst.put_u8(self.unknown22);
        dst.put_i8(self.heater_min);
        dst.put_i8(self.heater_max);
        Ok(())
    }
}

empty_command!(
    /// Response `0x55` -- Work mode acknowledged.
    WorkModeAck, ty::SET_WORK_MODE_RSP
);

empty_command!(
    /// Request `0x00` -- Connect, repeated until the breezer answers.
    ConnectGet, ty::CONNECT_REQ
);

empty_command!(
    /// Request `0x01` -- State get.
    StateGet, ty::STATE_GET_REQ
);

empty_command!(
    /// Request `0x03` -- Device mode.
    DevModeGet, ty::DEV_MODE_REQ
);

empty_command!(
    /// Request `0x05` -- Clock.
    TimeGet, ty::TIME_GET_REQ
);

empty_command!(
    /// Request `0x07` -- Device information.
    DevInfoGet, ty::DEV_INFO_REQ
);
