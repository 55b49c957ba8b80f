//! Records shared by the 4S, Lite and IQ generations.

use bytes::{Buf, BufMut};

use super::frame::{Command, FrameError};


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkMode {
    Normal = 1,
    Update = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceType {
    Iq200 = 0x8001,
    Lite = 0x8002,
    Br4s = 0x8003,
}

impl DeviceType {
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0x8001 => Some(Self::Iq200),
            0x8002 => Some(Self::Lite),
            0x8003 => Some(Self::Br4s),
            _ => None
        }
    }
}


/// Device information.
///
/// | byte  | field |
/// |-------|-------|
/// | 0     | work mode (1 normal, 2 firmware update) |
/// | 1-4   | device type |
/// | 5-6   | firmware version |
/// | 7-8   | hardware version |
/// | 9-24  | reserved |
///
/// O2 breezers report versions in their own record; it is converted into this one with a work
/// mode of `0` and a device type of `0`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DevInfo {
    pub work_mode: u8,
    pub device_type: u32,
    pub firmware_version: u16,
    pub hardware_version: u16,
}

impl DevInfo {
    pub const SIZE: usize = 25;

    pub fn work_mode(&self) -> Option<WorkMode> {
        match self.work_mode {
            1 => Some(WorkMode::Normal),
            2 => Some(WorkMode::Update),
            _ => None
        }
    }

    pub fn device_type(&self) -> Option<DeviceType> {
        DeviceType::from_tag(self.device_type)
    }

    fn read<B: Buf>(src: &mut B) -> Self {
        let info = Self {
            work_mode: src.get_u8(),
            device_type: src.get_u32_le(),
            firmware_version: src.get_u16_le(),
            hardware_version: src.get_u16_le(),
        };
        src.advance(16);
        info
    }

    fn write<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(self.work_mode);
        dst.put_u32_le(self.device_type);
        dst.put_u16_le(self.firmware_version);
        dst.put_u16_le(self.hardware_version);
        dst.put_bytes(0x00, 16);
    }
}

/// [`DevInfo`] as carried by a generation's device information response type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DevInfoResponse<const TY: u16>(pub DevInfo);

impl<const TY: u16> Command for DevInfoResponse<TY> {
    const TYPE: u16 = TY;
    const SIZE: usize = DevInfo::SIZE;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        Ok(Self(DevInfo::read(src)))
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        self.0.write(dst);
        Ok(())
    }
}


/// Running counters reported by 4S and Lite breezers. All times are in seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    pub work_time: u32,
    pub fan_time: u32,
    pub filter_time: u32,
    pub airflow_counter: u32,
}

impl Counters {
    pub const SIZE: usize = 16;

    pub fn read<B: Buf>(src: &mut B) -> Self {
        Self {
            work_time: src.get_u32_le(),
            fan_time: src.get_u32_le(),
            filter_time: src.get_u32_le(),
            airflow_counter: src.get_u32_le(),
        }
    }

    pub fn write<B: BufMut>(&self, dst: &mut B) {
        dst.put_u32_le(self.work_time);
        dst.put_u32_le(self.fan_time);
        dst.put_u32_le(self.filter_time);
        dst.put_u32_le(self.airflow_counter);
    }

    pub fn filter_days_left(&self) -> u32 {
        self.filter_time / (24 * 3600)
    }

    /// Air volume moved, m³. `k` is the generation's airflow calibration.
    pub fn airflow_m3(&self, k: f32) -> f32 {
        self.airflow_counter as f32 * k / 3600.0
    }

    /// Productivity in m³/h since the previous counters.
    pub fn productivity(&self, prev_fan_time: u32, prev_airflow_counter: u32, k: f32) -> u8 {
        if prev_fan_time == 0 {
            return 0;
        }

        let diff_time = self.fan_time.wrapping_sub(prev_fan_time);
        if diff_time == 0 {
            return 0;
        }

        let diff_airflow = self.airflow_counter.wrapping_sub(prev_airflow_counter);
        (diff_airflow as f32 / diff_time as f32 * k) as u8
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::Frame;

    #[test]
    fn test_dev_info_4s() {
        let data = [
            0x01, 0x03, 0x80, 0x00, 0x00, 0xBC, 0x02, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00
        ];

        let frame = Frame::new(0x3331, data.to_vec());
        let DevInfoResponse(info) = frame.unpack_as::<DevInfoResponse<0x3331>>().expect("unpack");

        assert_eq!(info.work_mode(), Some(WorkMode::Normal));
        assert_eq!(info.device_type(), Some(DeviceType::Br4s));
        assert_eq!(info.firmware_version, 0x02BC);
        assert_eq!(info.hardware_version, 0x0001);

        assert_eq!(Frame::pack(&DevInfoResponse::<0x3331>(info)).expect("pack"), frame);

        assert!(frame.unpack_as::<DevInfoResponse<0x400A>>().is_err());
    }

    #[test]
    fn test_productivity() {
        let counters = Counters {
            work_time: 1000,
            fan_time: 160,
            filter_time: 86400 * 3 + 5,
            airflow_counter: 600,
        };

        assert_eq!(counters.filter_days_left(), 3);
        assert_eq!(counters.productivity(0, 0, 15.0), 0);
        assert_eq!(counters.productivity(160, 500, 15.0), 0);
        // 100 counts over 100 s
        assert_eq!(counters.productivity(60, 500, 15.0), 15);
        assert_eq!(counters.productivity(60, 500, 10.0), 10);

        assert_eq!(counters.airflow_m3(15.0), 2.5);
    }
}
