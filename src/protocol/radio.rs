//! Radio link framing for 4S, Lite and IQ.
//!
//! A frame is
//!
//! ```text
//! size:u16 (LE, whole frame) | 0x3A | random | type:u16 | request_id:u32 | payload | crc16 (BE)
//! ```
//!
//! and is split into packets of at most `mtu` bytes, each led by a [`PacketRole`] byte.
//! The random byte is sent as `0xAD` and ignored on receive.

use bytes::{BufMut, Bytes, BytesMut};
use packed_struct::prelude::*;
use tracing::{trace, warn};

use super::codec::FramingError;
use super::crc::{crc16_a, crc16_b};
use super::frame::{Frame, DEFAULT_REQUEST_ID};

pub const MTU: usize = 20;

pub const FRAME_MAGIC: u8 = 0x3A;
pub const FRAME_RANDOM: u8 = 0xAD;

/// size, magic, random, type and request id
pub const HEADER_SIZE: usize = 10;
pub const CRC_SIZE: usize = 2;


#[derive(PrimitiveEnum_u8, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketRole {
    First = 0x00,
    Middle = 0x40,
    Full = 0x80,
    Last = 0xC0,
}


pub fn pack_frame(frame: &Frame, request_id: u32) -> Bytes {
    let size = HEADER_SIZE + frame.data.len() + CRC_SIZE;

    let mut raw = BytesMut::with_capacity(size);
    raw.put_u16_le(size as u16);
    raw.put_u8(FRAME_MAGIC);
    raw.put_u8(FRAME_RANDOM);
    raw.put_u16_le(frame.ty);
    raw.put_u32_le(request_id);
    raw.put(&frame.data[..]);

    let crc = crc16_a(&raw);
    raw.put_u16(crc);

    raw.freeze()
}

/// Parse a reassembled frame, returning the transport request id and the frame.
pub fn unpack_frame(raw: &[u8]) -> Result<(u32, Frame), FramingError> {
    if raw.len() < HEADER_SIZE + CRC_SIZE {
        return Err(FramingError::InvalidSize(raw.len()))
    }

    if raw[2] != FRAME_MAGIC {
        return Err(FramingError::FrameStartNotFound)
    }

    let size = u16::from_le_bytes([raw[0], raw[1]]) as usize;
    if size != raw.len() {
        return Err(FramingError::InvalidSize(size))
    }

    let crc = crc16_b(raw);
    if crc != 0 {
        return Err(FramingError::InvalidChecksum(crc))
    }

    let ty = u16::from_le_bytes([raw[4], raw[5]]);
    let request_id = u32::from_le_bytes([raw[6], raw[7], raw[8], raw[9]]);
    let data = Bytes::copy_from_slice(&raw[HEADER_SIZE..size - CRC_SIZE]);

    Ok((request_id, Frame::new(ty, data)))
}


/// Split `raw` into role-tagged packets of at most `mtu` bytes.
pub fn fragment(raw: &[u8], mtu: usize) -> Vec<Bytes> {
    let chunk_size = mtu.saturating_sub(1).max(1);

    let chunks: Vec<&[u8]> = if raw.is_empty() {
        vec![raw]
    } else {
        raw.chunks(chunk_size).collect()
    };
    let last = chunks.len() - 1;

    chunks.iter().enumerate()
        .map(|(n, chunk)| {
            let role = match (n == 0, n == last) {
                (true, true) => PacketRole::Full,
                (true, false) => PacketRole::First,
                (false, true) => PacketRole::Last,
                (false, false) => PacketRole::Middle,
            };

            let mut packet = BytesMut::with_capacity(1 + chunk.len());
            packet.put_u8(role.to_primitive());
            packet.put_slice(chunk);
            packet.freeze()
        })
        .collect()
}


/// Collects packets until a frame is complete.
#[derive(Debug, Default)]
pub struct Reassembler {
    buf: BytesMut,
    in_progress: bool,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.buf.clear();
        self.in_progress = false;
    }

    /// Feed one packet. Returns the frame bytes once the last packet of a frame arrives.
    pub fn push(&mut self, packet: &[u8]) -> Result<Option<Bytes>, FramingError> {
        let Some((&role, data)) = packet.split_first() else {
            return Err(FramingError::BufferTooSmall)
        };

        match PacketRole::from_primitive(role) {
            Some(PacketRole::Full) => {
                self.reset();
                Ok(Some(Bytes::copy_from_slice(data)))
            },

            Some(PacketRole::First) => {
                self.buf.clear();
                self.buf.put_slice(data);
                self.in_progress = true;
                Ok(None)
            },

            Some(PacketRole::Middle) => {
                if !self.in_progress {
                    return Err(FramingError::MissingFirstPacket)
                }
                self.buf.put_slice(data);
                Ok(None)
            },

            Some(PacketRole::Last) => {
                if !self.in_progress {
                    return Err(FramingError::MissingFirstPacket)
                }
                self.buf.put_slice(data);
                self.in_progress = false;
                Ok(Some(self.buf.split().freeze()))
            },

            None => {
                self.reset();
                Err(FramingError::UnknownPacket(role))
            }
        }
    }
}


/// Packet level endpoint of a 4S, Lite or IQ radio link.
#[derive(Debug)]
pub struct RadioLink {
    mtu: usize,
    reassembler: Reassembler,
}

impl RadioLink {
    pub fn new(mtu: usize) -> Self {
        Self {
            mtu,
            reassembler: Reassembler::new()
        }
    }

    /// Feed one received packet; a complete, valid frame is returned.
    pub fn read_packet(&mut self, packet: &[u8]) -> Option<Frame> {
        trace!("RX packet: {:02x?}", packet);

        let raw = match self.reassembler.push(packet) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!("Dropped packet: {err}");
                return None
            }
        };

        match unpack_frame(&raw) {
            Ok((_, frame)) => Some(frame),
            Err(err) => {
                warn!("Dropped frame: {err}: {:02x?}", &raw[..]);
                None
            }
        }
    }

    /// Encode `frame` into the packets to send, in order.
    pub fn write_frame(&self, frame: &Frame) -> Vec<Bytes> {
        let raw = pack_frame(frame, DEFAULT_REQUEST_ID);
        trace!("TX frame: {:02x?}", &raw[..]);

        fragment(&raw, self.mtu)
    }
}

impl Default for RadioLink {
    fn default() -> Self {
        Self::new(MTU)
    }
}
