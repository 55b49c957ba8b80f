//! IQ purifiers: state and device information over the 4S style radio frame. Read only.

use bytes::{Buf, BufMut};
use packed_struct::prelude::*;

use super::devinfo::DevInfoResponse;
use super::frame::{empty_command, Command, Correlated, FlagByte, FrameError};

pub mod ty {
    pub const STATE_SET: u16 = 0x3230;
    pub const STATE_RSP: u16 = 0x3231;
    pub const STATE_REQ: u16 = 0x3232;

    pub const DEV_INFO_REQ: u16 = 0x3332;
    pub const DEV_INFO_RSP: u16 = 0x3331;
}

#[derive(PrimitiveEnum_u8, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Led {
    Off = 0,
    Low = 1,
    Medium = 2,
    High = 3,
}

#[derive(PackedStruct, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[packed_struct(bit_numbering="lsb0", size_bytes="1")]
pub struct Flags {
    #[packed_field(bits="0")]
    pub power_state: bool,
    #[packed_field(bits="1")]
    pub sound_state: bool,
    #[packed_field(bits="4")]
    pub lock_state: bool,
}

#[derive(PackedStruct, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[packed_struct(bit_numbering="lsb0", size_bytes="1")]
pub struct ModeFlags {
    #[packed_field(bits="2")]
    pub ma_auto: bool,
    #[packed_field(bits="3")]
    pub timer_state: bool,
}

const LED_SHIFT: u8 = 2;
const LED_MASK: u8 = 0x3;


/// Response `0x3231` -- State, preceded by the request id.
///
/// | byte  | field |
/// |-------|-------|
/// | 0     | [`Flags`], LED brightness in bits 2-3 |
/// | 1     | [`ModeFlags`] |
/// | 2     | unknown |
/// | 3     | fan speed |
/// | 4     | timer |
/// | 5-6   | PM2.5, µg/m³ |
/// | 7-8   | VOC |
/// | 9-16  | unknown |
/// | 17-20 | filter time left, s |
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct State {
    pub flags: Flags,
    pub led: u8,
    pub mode: ModeFlags,
    pub unknown2: u8,
    pub fan_speed: u8,
    pub timer: u8,
    pub pm_value: u16,
    pub voc_value: u16,
    pub unknown9: [u8; 8],
    pub filter_time: u32,
}

impl State {
    pub fn led(&self) -> Led {
        Led::from_primitive(self.led & LED_MASK).unwrap_or(Led::Off)
    }

    pub fn filter_days_left(&self) -> u32 {
        self.filter_time / (24 * 3600)
    }
}

impl Command for State {
    const TYPE: u16 = ty::STATE_RSP;
    const SIZE: usize = 21;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        let byte0 = src.get_u8();
        let mode = ModeFlags::from_byte(src.get_u8())?;
        let unknown2 = src.get_u8();
        let fan_speed = src.get_u8();
        let timer = src.get_u8();
        let pm_value = src.get_u16_le();
        let voc_value = src.get_u16_le();
        let mut unknown9 = [0; 8];
        src.copy_to_slice(&mut unknown9);

        Ok(Self {
            flags: Flags::from_byte(byte0)?,
            led: (byte0 >> LED_SHIFT) & LED_MASK,
            mode,
            unknown2,
            fan_speed,
            timer,
            pm_value,
            voc_value,
            unknown9,
            filter_time: src.get_u32_le(),
        })
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        dst.put_u8(self.flags.to_byte()? | (self.led & LED_MASK) << LED_SHIFT);
        dst.put_u8(self.mode.to_byte()?);
        dst.put_u8(self.unknown2);
        dst.put_u8(self.fan_speed);
        dst.put_u8(self.timer);
        dst.put_u16_le(self.pm_value);
        dst.put_u16_le(self.voc_value);
        dst.put_slice(&self.unknown9);
        dst.put_u32_le(self.filter_time);
        Ok(())
    }
}

pub type StateResponse = Correlated<State>;

pub type DevInfo = DevInfoResponse<{ty::DEV_INFO_RSP}>;

empty_command!(
    /// Request `0x3232` -- State get.
    StateGet, ty::STATE_REQ
);

empty_command!(
    /// Request `0x3332` -- Device information.
    DevInfoGet, ty::DEV_INFO_REQ
);
