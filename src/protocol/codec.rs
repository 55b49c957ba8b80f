//! Serial line framing.
//!
//! Each codec is a `tokio_util` [`Decoder`]/[`Encoder`] over [`BytesMut`]. `decode` is called with
//! whatever has arrived so far, returns `Ok(None)` when more bytes are needed and keeps
//! partially received frames buffered between calls. Corrupted input is logged and skipped;
//! decoding never fails.

use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{trace, warn};

use super::crc::{crc16_a, crc16_b, crc8_xor, verify_crc8_xor, CRC8_SEED};
use super::frame::{Frame, FrameError};
use super::{o2, t3s};


/// Byte level framing failure, from the serial codecs and the radio packet layer.
#[derive(Error, Debug)]
pub enum FramingError {
    #[error("input buffer too small")]
    BufferTooSmall,
    #[error("start of frame marker not found")]
    FrameStartNotFound,
    #[error("end of frame marker not found")]
    FrameEndNotFound,
    #[error("invalid frame size {0}")]
    InvalidSize(usize),
    #[error("invalid checksum {0:#06x}")]
    InvalidChecksum(u16),
    #[error("unknown frame type {0:#04x}")]
    UnknownType(u8),
    #[error("unknown packet type {0:#04x}")]
    UnknownPacket(u8),
    #[error("continuation packet without a first packet")]
    MissingFirstPacket,
}


fn invalid_input(err: FrameError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, err)
}


/// 4S and Lite serial framing.
///
/// ```text
/// 0x3A | size:u16 (LE, whole frame) | type:u16 (LE) | payload | crc16 (BE)
/// ```
pub struct SerialCodec {
    max_size: usize,
    state: ReadState,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReadState {
    Magic,
    Size,
    Tail { size: usize },
}

impl SerialCodec {
    pub const FRAME_MAGIC: u8 = 0x3A;
    /// magic, size, type
    pub const HEADER_SIZE: usize = 5;
    pub const MIN_SIZE: usize = Self::HEADER_SIZE + 2;

    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            state: ReadState::Magic
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    fn try_read_frame(&mut self, src: &mut BytesMut) -> Result<Frame, FramingError> {
        loop {
            match self.state {
                ReadState::Magic => {
                    if src.is_empty() {
                        return Err(FramingError::BufferTooSmall);
                    }

                    if src[0] != Self::FRAME_MAGIC {
                        return Err(FramingError::FrameStartNotFound);
                    }

                    self.state = ReadState::Size;
                },
                ReadState::Size => {
                    if src.len() < 3 {
                        return Err(FramingError::BufferTooSmall);
                    }

                    let size = u16::from_le_bytes([src[1], src[2]]) as usize;
                    if size < Self::MIN_SIZE || size > self.max_size {
                        return Err(FramingError::InvalidSize(size));
                    }

                    self.state = ReadState::Tail { size };
                },
                ReadState::Tail { size } => {
                    if src.len() < size {
                        src.reserve(size - src.len());
                        return Err(FramingError::BufferTooSmall);
                    }

                    self.state = ReadState::Magic;

                    let raw = src.split_to(size);
                    trace!("RX: {:02x?}", &raw[..]);

                    let crc = crc16_b(&raw);
                    if crc != 0 {
                        return Err(FramingError::InvalidChecksum(crc));
                    }

                    let ty = u16::from_le_bytes([raw[3], raw[4]]);
                    let data = Bytes::copy_from_slice(&raw[Self::HEADER_SIZE..size - 2]);

                    return Ok(Frame::new(ty, data));
                }
            }
        }
    }
}

impl Decoder for SerialCodec {
    type Item = Frame;

    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.try_read_frame(src) {
                Ok(frame) => return Ok(Some(frame)),

                Err(FramingError::BufferTooSmall) => return Ok(None),

                Err(FramingError::FrameStartNotFound) => {
                    warn!("Unexpected byte: {:#04x}", src[0]);
                    src.advance(1);
                },

                Err(err @ FramingError::InvalidSize(_)) => {
                    // drop the magic and size bytes already read
                    warn!("{err}");
                    src.advance(3);
                    self.state = ReadState::Magic;
                },

                Err(err) => {
                    warn!("Dropped frame: {err}");
                },
            }
        }
    }
}

impl Encoder<Frame> for SerialCodec {
    type Error = io::Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let size = Self::MIN_SIZE + frame.data.len();
        if size > self.max_size {
            return Err(invalid_input(FrameError::PayloadTooLarge(frame.data.len())));
        }

        let start = dst.len();
        dst.reserve(size);

        dst.put_u8(Self::FRAME_MAGIC);
        dst.put_u16_le(size as u16);
        dst.put_u16_le(frame.ty);
        dst.put(&frame.data[..]);

        let crc = crc16_a(&dst[start..]);
        dst.put_u16(crc);

        trace!("TX: {:02x?}", &dst[start..]);

        Ok(())
    }
}


/// 3S serial framing: bare 20-byte frames.
///
/// Frames coming from the breezer begin with `0xB3`, frames going to it with `0x3D`. The head
/// byte the reader scans for depends on which side of the line the codec sits on.
pub struct Serial3sCodec {
    head: u8,
}

impl Serial3sCodec {
    /// Reads breezer responses.
    pub fn host() -> Self {
        Self { head: t3s::FRAME_MAGIC_RSP }
    }

    /// Reads requests, as a breezer would.
    pub fn device() -> Self {
        Self { head: t3s::FRAME_MAGIC_REQ }
    }
}

impl Decoder for Serial3sCodec {
    type Item = Frame;

    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if src.is_empty() {
                return Ok(None);
            }

            if src[0] != self.head {
                trace!("Skipping byte: {:#04x}", src[0]);
                src.advance(1);
                continue;
            }

            if src.len() < t3s::FRAME_SIZE {
                src.reserve(t3s::FRAME_SIZE - src.len());
                return Ok(None);
            }

            match t3s::unpack_frame(&src[..t3s::FRAME_SIZE]) {
                Ok(frame) => {
                    trace!("RX: {:02x?}", &src[..t3s::FRAME_SIZE]);
                    src.advance(t3s::FRAME_SIZE);
                    return Ok(Some(frame));
                },
                Err(err) => {
                    // likely a head byte inside a previous frame
                    warn!("{err}");
                    src.advance(1);
                }
            }
        }
    }
}

impl Encoder<Frame> for Serial3sCodec {
    type Error = io::Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let raw = t3s::pack_frame(&frame).map_err(invalid_input)?;
        trace!("TX: {:02x?}", &raw[..]);

        dst.put_slice(&raw);
        Ok(())
    }
}


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum O2Side {
    /// Reads breezer responses.
    Host,
    /// Reads requests, as a breezer would.
    Device,
}

/// O2 serial framing.
///
/// ```text
/// type:u8 | payload | crc8
/// ```
///
/// There is no length field. The size comes from a per-type table, so once an unknown type or a
/// bad checksum shows up the frame boundaries are lost and everything buffered is dropped.
pub struct O2Codec {
    side: O2Side,
}

impl O2Codec {
    pub fn new(side: O2Side) -> Self {
        Self { side }
    }

    fn frame_size(&self, ty: u8) -> Option<usize> {
        match self.side {
            O2Side::Host => o2::response_size(ty),
            O2Side::Device => o2::request_size(ty),
        }
    }

    fn try_read_frame(&self, src: &mut BytesMut) -> Result<Frame, FramingError> {
        if src.is_empty() {
            return Err(FramingError::BufferTooSmall);
        }

        let ty = src[0];
        let size = self.frame_size(ty).ok_or(FramingError::UnknownType(ty))?;

        // type, payload and crc
        if src.len() < 1 + size {
            src.reserve(1 + size - src.len());
            return Err(FramingError::BufferTooSmall);
        }

        if !verify_crc8_xor(&src[..1 + size]) {
            return Err(FramingError::InvalidChecksum(crc8_xor(CRC8_SEED, &src[..1 + size]) as u16));
        }

        let raw = src.split_to(1 + size);
        trace!("RX: {:02x?}", &raw[..]);

        Ok(Frame::new(ty as u16, Bytes::copy_from_slice(&raw[1..size])))
    }
}

impl Decoder for O2Codec {
    type Item = Frame;

    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.try_read_frame(src) {
            Ok(frame) => Ok(Some(frame)),

            Err(FramingError::BufferTooSmall) => Ok(None),

            // TODO: frame boundaries are unknown here; scanning for the next known type byte
            // could recover a pending response, but the breezer's own desync behaviour is unverified
            Err(err) => {
                warn!("{err}, dropping {} buffered bytes: {:02x?}", src.len(), &src[..]);
                src.clear();
                Ok(None)
            }
        }
    }
}

impl Encoder<Frame> for O2Codec {
    type Error = io::Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let ty = u8::try_from(frame.ty)
            .map_err(|_| invalid_input(frame.unknown()))?;

        let start = dst.len();
        dst.reserve(2 + frame.data.len());

        dst.put_u8(ty);
        dst.put(&frame.data[..]);

        let crc = crc8_xor(CRC8_SEED, &dst[start..]);
        dst.put_u8(crc);

        trace!("TX: {:02x?}", &dst[start..]);

        Ok(())
    }
}
