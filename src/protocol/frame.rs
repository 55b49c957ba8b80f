use bytes::{Buf, BufMut, Bytes, BytesMut};
use packed_struct::{PackedStruct, PackingError};
use thiserror::Error;

/// Request id sent by generations that do not correlate responses.
pub const DEFAULT_REQUEST_ID: u32 = 1;


#[derive(Error, Debug)]
pub enum FrameError {
    #[error("unexpected frame type {actual:#06x} (expected {expected:#06x})")]
    UnexpectedType {
        expected: u16,
        actual: u16
    },
    #[error("incorrect data size for frame {ty:#06x}: {actual} (expected {expected})")]
    SizeMismatch {
        ty: u16,
        expected: usize,
        actual: usize
    },
    #[error("unsupported frame type {ty:#06x}: {data:02x?}")]
    UnknownType {
        ty: u16,
        data: Bytes
    },
    #[error("frame payload is too large: {0} bytes")]
    PayloadTooLarge(usize),
    #[error("bit field packing failed: {0:?}")]
    Packing(PackingError),
}

impl From<PackingError> for FrameError {
    fn from(err: PackingError) -> Self {
        FrameError::Packing(err)
    }
}


/// A logical frame: a type code and the command payload.
///
/// The payload never includes transport framing (magic bytes, sizes, trailers). For commands
/// that carry a device-echoed request id, the id is the first four bytes of `data`
/// (see [`Correlated`]).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub ty: u16,
    pub data: Bytes
}

impl Frame {
    pub fn new(ty: u16, data: impl Into<Bytes>) -> Self {
        Self {
            ty,
            data: data.into()
        }
    }

    pub fn empty(ty: u16) -> Self {
        Self {
            ty,
            data: Bytes::new()
        }
    }

    /// Pack a `Command` into a new `Frame`.
    pub fn pack<T: Command>(cmd: &T) -> Result<Self, FrameError> {
        let mut data = BytesMut::with_capacity(T::SIZE);
        cmd.write(&mut data)?;

        debug_assert_eq!(data.len(), T::SIZE);

        Ok(Self {
            ty: T::TYPE,
            data: data.freeze()
        })
    }

    /// Unpack `Self` as a `Command`, checking the type and the exact payload size.
    pub fn unpack_as<T: Command>(&self) -> Result<T, FrameError> {
        if self.ty != T::TYPE {
            return Err(FrameError::UnexpectedType { expected: T::TYPE, actual: self.ty })
        }

        if self.data.len() != T::SIZE {
            return Err(FrameError::SizeMismatch { ty: self.ty, expected: T::SIZE, actual: self.data.len() })
        }

        T::read(&mut &self.data[..])
    }

    pub fn unknown(&self) -> FrameError {
        FrameError::UnknownType { ty: self.ty, data: self.data.clone() }
    }
}


/// A command payload with a fixed frame type and an exact wire size.
///
/// `read` is only ever handed exactly `SIZE` bytes.
pub trait Command: Sized {
    const TYPE: u16;
    const SIZE: usize;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError>;

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError>;
}


/// Define a command that carries no payload (or a fixed run of zero bytes).
macro_rules! empty_command {
    ($(#[$meta:meta])* $name:ident, $ty:expr) => {
        empty_command!($(#[$meta])* $name, $ty, 0);
    };
    ($(#[$meta:meta])* $name:ident, $ty:expr, $size:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
        pub struct $name;

        impl $crate::protocol::frame::Command for $name {
            const TYPE: u16 = $ty;
            const SIZE: usize = $size;

            fn read<B: ::bytes::Buf>(src: &mut B) -> Result<Self, $crate::protocol::frame::FrameError> {
                src.advance(Self::SIZE);
                Ok(Self)
            }

            fn write<B: ::bytes::BufMut>(&self, dst: &mut B) -> Result<(), $crate::protocol::frame::FrameError> {
                dst.put_bytes(0x00, Self::SIZE);
                Ok(())
            }
        }
    };
}

pub(crate) use empty_command;


/// A command preceded by the 32-bit request id the device echoes back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Correlated<T> {
    pub request_id: u32,
    pub inner: T
}

impl<T> Correlated<T> {
    pub fn new(request_id: u32, inner: T) -> Self {
        Self { request_id, inner }
    }
}

impl<T: Command> Command for Correlated<T> {
    const TYPE: u16 = T::TYPE;
    const SIZE: usize = 4 + T::SIZE;

    fn read<B: Buf>(src: &mut B) -> Result<Self, FrameError> {
        let request_id = src.get_u32_le();
        let inner = T::read(src)?;

        Ok(Self { request_id, inner })
    }

    fn write<B: BufMut>(&self, dst: &mut B) -> Result<(), FrameError> {
        dst.put_u32_le(self.request_id);
        self.inner.write(dst)
    }
}


/// Little-endian flag words declared as `lsb0` packed structs.
///
/// `packed_struct` numbers `lsb0` bits from the least significant bit of the *last* byte, so a
/// word is packed through its big-endian bytes to keep bit `n` of the struct equal to bit `n`
/// of the value.
pub trait FlagWord: PackedStruct<ByteArray = [u8; 2]> {
    fn from_word(word: u16) -> Result<Self, PackingError> {
        Self::unpack(&word.to_be_bytes())
    }

    fn to_word(&self) -> Result<u16, PackingError> {
        Ok(u16::from_be_bytes(self.pack()?))
    }

    fn read_le<B: Buf>(src: &mut B) -> Result<Self, PackingError> {
        Self::from_word(src.get_u16_le())
    }

    fn write_le<B: BufMut>(&self, dst: &mut B) -> Result<(), PackingError> {
        dst.put_u16_le(self.to_word()?);
        Ok(())
    }
}

impl<T> FlagWord for T where T: PackedStruct<ByteArray = [u8; 2]> {}


/// Single-byte flag sets declared as `lsb0` packed structs.
pub trait FlagByte: PackedStruct<ByteArray = [u8; 1]> {
    fn from_byte(byte: u8) -> Result<Self, PackingError> {
        Self::unpack(&[byte])
    }

    fn to_byte(&self) -> Result<u8, PackingError> {
        let [byte] = self.pack()?;
        Ok(byte)
    }
}

impl<T> FlagByte for T where T: PackedStruct<ByteArray = [u8; 1]> {}
