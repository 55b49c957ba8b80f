pub mod codec;
pub mod crc;
pub mod devinfo;
pub mod firmware;
pub mod frame;
pub mod iq;
pub mod lite;
pub mod o2;
pub mod radio;
pub mod t3s;
pub mod t4s;
