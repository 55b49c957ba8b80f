//! Firmware update frames for 4S and Lite.
//!
//! The exchange runs prepare, start, one chunk per acknowledgement, a checksum chunk, then
//! finish. Chunk frames are far larger than the radio MTU and go out as multi-packet frames.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::crc::crc16_a;
use super::frame::{empty_command, Command, Frame, FrameError};

pub mod ty {
    pub const PREPARE_REQ: u16 = 0x400E;
    pub const PREPARE_RSP: u16 = 0x4004;

    pub const START_REQ: u16 = 0x4005;
    pub const START_RSP: u16 = 0x400C;

    pub const CHUNK_REQ: u16 = 0x4006;
    pub const CHUNK_RSP: u16 = 0x400B;

    pub const FINISH_REQ: u16 = 0x4007;
    pub const FINISH_RSP: u16 = 0x400D;

    pub const ERROR: u16 = 0x4008;
}

pub const CHUNK_SIZE: usize = 512;
pub const HEADER_SIZE: usize = 128;

/// Marks the chunk carrying the image checksum.
pub const CRC_MARKER: u32 = 0xFFFF_FFFF;


/// Response `0x4004` -- Ready to update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Versions {
    pub device_type: u32,
    pub unknown1: u16,
    pub hardware_version: u16,
}

impl Command for Versions {
    const TYPE: u16 = ty::PREPARE_RSP;
    const SIZE: usize = 8;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        Ok(Self {
            device_type: src.get_u32_le(),
            unknown1: src.get_u16_le(),
            hardware_version: src.get_u16_le(),
        })
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        dst.put_u32_le(self.device_type);
        dst.put_u16_le(self.unknown1);
        dst.put_u16_le(self.hardware_version);
        Ok(())
    }
}


/// Request `0x4005` -- Start.
///
/// `size` counts the image, the header and the trailing checksum. The header content is ignored
/// by the breezer; it is filled with a running counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Start {
    pub size: u32,
    pub header: [u8; HEADER_SIZE],
}

impl Start {
    pub fn for_image(image: &[u8]) -> Self {
        let mut header = [0; HEADER_SIZE];
        for (n, byte) in header.iter_mut().enumerate() {
            *byte = n as u8;
        }

        Self {
            size: (image.len() + HEADER_SIZE + 2) as u32,
            header,
        }
    }
}

impl Command for Start {
    const TYPE: u16 = ty::START_REQ;
    const SIZE: usize = 4 + HEADER_SIZE;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        let size = src.get_u32_le();
        let mut header = [0; HEADER_SIZE];
        src.copy_to_slice(&mut header);
        Ok(Self { size, header })
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        dst.put_u32_le(self.size);
        dst.put_slice(&self.header);
        Ok(())
    }
}


/// Request `0x4006` -- Image chunk. Variable length, so it builds its frame directly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Chunk {
    Data { offset: u32, data: Bytes },
    Crc(u16),
}

impl Chunk {
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        let mut data = BytesMut::new();

        match self {
            Chunk::Data { offset, data: chunk } => {
                if chunk.len() > CHUNK_SIZE {
                    return Err(FrameError::PayloadTooLarge(chunk.len()))
                }

                data.put_u32_le(*offset);
                data.put(&chunk[..]);
            },
            Chunk::Crc(crc) => {
                data.put_u32_le(CRC_MARKER);
                data.put_u16_le(*crc);
            }
        }

        Ok(Frame::new(ty::CHUNK_REQ, data.freeze()))
    }

    pub fn from_frame(frame: &Frame) -> Result<Self, FrameError> {
        if frame.ty != ty::CHUNK_REQ {
            return Err(FrameError::UnexpectedType { expected: ty::CHUNK_REQ, actual: frame.ty })
        }

        let mut src = &frame.data[..];
        if src.len() < 4 || src.len() > 4 + CHUNK_SIZE {
            return Err(FrameError::SizeMismatch { ty: frame.ty, expected: 4 + CHUNK_SIZE, actual: src.len() })
        }

        let offset = src.get_u32_le();
        if offset == CRC_MARKER {
            if src.len() != 2 {
                return Err(FrameError::SizeMismatch { ty: frame.ty, expected: 6, actual: frame.data.len() })
            }
            return Ok(Chunk::Crc(src.get_u16_le()))
        }

        Ok(Chunk::Data { offset, data: Bytes::copy_from_slice(src) })
    }
}

/// Split an image into its chunk requests, checksum chunk last.
pub fn chunks(image: &Bytes) -> Vec<Chunk> {
    let mut chunks: Vec<Chunk> = (0..image.len())
        .step_by(CHUNK_SIZE)
        .map(|offset| Chunk::Data {
            offset: offset as u32,
            data: image.slice(offset..image.len().min(offset + CHUNK_SIZE)),
        })
        .collect();

    chunks.push(Chunk::Crc(crc16_a(image)));
    chunks
}

empty_command!(
    /// Request `0x400E` -- Prepare for update.
    PrepareGet, ty::PREPARE_REQ
);

empty_command!(
    /// Response `0x400C` -- Start accepted.
    StartAck, ty::START_RSP
);

empty_command!(
    /// Response `0x400B` -- Chunk accepted.
    ChunkAck, ty::CHUNK_RSP
);

empty_command!(
    /// Request `0x4007` -- Verify and apply.
    Finish, ty::FINISH_REQ
);

empty_command!(
    /// Response `0x400D` -- Update applied.
    FinishAck, ty::FINISH_RSP
);


#[cfg(test)]
mod tests {
    use crate::protocol::radio::{fragment, pack_frame, MTU};

    use super::*;

    #[test]
    fn test_versions() {
        let frame = Frame::new(0x4004, vec![0x03, 0x80, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00]);
        let versions = frame.unpack_as::<Versions>().expect("unpack");
        assert_eq!(versions.device_type, 0x8003);
        assert_eq!(versions.hardware_version, 1);
    }

    #[test]
    fn test_start() {
        let start = Start::for_image(&[0; 1000]);
        assert_eq!(start.size, 1000 + 128 + 2);

        let frame = Frame::pack(&start).expect("pack");
        assert_eq!(frame.data.len(), 132);
        assert_eq!(&frame.data[..6], &[0x6A, 0x04, 0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_chunks() {
        let image = Bytes::from((0..1100u32).map(|n| n as u8).collect::<Vec<u8>>());
        let chunks = chunks(&image);

        assert_eq!(chunks.len(), 4);
        assert!(matches!(&chunks[0], Chunk::Data { offset: 0, data } if data.len() == 512));
        assert!(matches!(&chunks[1], Chunk::Data { offset: 512, data } if data.len() == 512));
        assert!(matches!(&chunks[2], Chunk::Data { offset: 1024, data } if data.len() == 76));
        assert_eq!(chunks[3], Chunk::Crc(crc16_a(&image)));

        for chunk in &chunks {
            let frame = chunk.to_frame().expect("frame");
            assert_eq!(&Chunk::from_frame(&frame).expect("chunk"), chunk);
        }

        let last = chunks[3].to_frame().expect("frame");
        assert_eq!(&last.data[..4], &[0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_chunk_rides_several_packets() {
        let chunk = Chunk::Data { offset: 0, data: Bytes::from(vec![0xAA; CHUNK_SIZE]) };
        let frame = chunk.to_frame().expect("frame");

        // 10 header + 4 offset + 512 data + 2 crc
        let raw = pack_frame(&frame, 1);
        assert_eq!(raw.len(), 528);
        assert_eq!(fragment(&raw, MTU).len(), 28);

        let oversize = Chunk::Data { offset: 0, data: Bytes::from(vec![0; CHUNK_SIZE + 1]) };
        assert!(matches!(oversize.to_frame(), Err(FrameError::PayloadTooLarge(513))));
    }
}
