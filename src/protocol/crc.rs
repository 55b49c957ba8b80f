//! Checksums used by the frame trailers.
//!
//! 4S, Lite and IQ frames end with a CRC-16/CCITT-FALSE (poly `0x1021`, initial
//! value `0xFFFF`) written big-endian. O2 frames end with a single XOR byte.
//! 3S frames carry no checksum at all.

const CRC16_POLY: u16 = 0x1021;
const CRC16_INIT: u16 = 0xFFFF;

/// Seed for the O2 XOR checksum.
pub const CRC8_SEED: u8 = 0xFF;


pub trait Checksum {
    fn crc16(&mut self, init: u16) -> u16;
    fn crc8_xor(&mut self, seed: u8) -> u8;
}

impl<'a> Checksum for std::slice::Iter<'a, u8> {
    fn crc16(&mut self, init: u16) -> u16 {
        self.fold(init, |mut crc, byte| {
            crc ^= (*byte as u16) << 8;
            for _ in 0..8 {
                crc = if crc & 0x8000 != 0 {
                    (crc << 1) ^ CRC16_POLY
                } else {
                    crc << 1
                };
            }
            crc
        })
    }

    fn crc8_xor(&mut self, seed: u8) -> u8 {
        self.fold(seed, |acc, byte| acc ^ byte)
    }
}


/// CRC-16/CCITT-FALSE, bit by bit.
///
/// The result is meant to be compared against a big-endian trailer, see [`verify_crc16_trailer`].
pub fn crc16_a(buf: &[u8]) -> u16 {
    buf.iter().crc16(CRC16_INIT)
}

/// CRC-16/CCITT-FALSE, one byte per step.
///
/// Same polynomial and initial value as [`crc16_a`]. Running it over a frame that already
/// ends with its own big-endian checksum yields `0`, see [`verify_crc16_residue`].
pub fn crc16_b(buf: &[u8]) -> u16 {
    buf.iter().fold(CRC16_INIT, |crc, byte| {
        let mut x = (crc >> 8) as u8 ^ byte;
        x ^= x >> 4;
        let x = x as u16;
        (crc << 8) ^ (x << 12) ^ (x << 5) ^ x
    })
}

/// XOR of every byte in `buf`, starting from `seed`.
pub fn crc8_xor(seed: u8, buf: &[u8]) -> u8 {
    buf.iter().crc8_xor(seed)
}

/// Checks that the last two bytes of `frame` are the big-endian [`crc16_a`] of the rest.
pub fn verify_crc16_trailer(frame: &[u8]) -> bool {
    match frame {
        [body @ .., hi, lo] => crc16_a(body) == u16::from_be_bytes([*hi, *lo]),
        _ => false
    }
}

/// Checks that [`crc16_b`] over the whole frame, trailer included, is zero.
pub fn verify_crc16_residue(frame: &[u8]) -> bool {
    frame.len() >= 2 && crc16_b(frame) == 0
}

/// Checks an O2 frame: `[type][payload][crc]` must fold to zero.
pub fn verify_crc8_xor(frame: &[u8]) -> bool {
    !frame.is_empty() && crc8_xor(CRC8_SEED, frame) == 0
}


#[cfg(test)]
mod tests {
    use super::*;

    const CAPTURED_FRAMES: [&[u8]; 4] = [
        &[0x0C, 0x00, 0x3A, 0xAD, 0x32, 0x33, 0x01, 0x00, 0x00, 0x00, 0xCE, 0xA6],
        &[0x0C, 0x00, 0x3A, 0xAD, 0x32, 0x32, 0x01, 0x00, 0x00, 0x00, 0x64, 0xF7],
        &[0x3A, 0x07, 0x00, 0x32, 0x39, 0xCE, 0xEC],
        &[
            0x25, 0x00, 0x3A, 0x20, 0x31, 0x33, 0x01, 0x00, 0x00, 0x00, 0x01, 0x03, 0x80, 0x00, 0x00, 0xBC,
            0x02, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x05, 0x23
        ],
    ];

    #[test]
    fn test_crc16_check_value() {
        assert_eq!(crc16_a(b"123456789"), 0x29B1);
        assert_eq!(crc16_b(b"123456789"), 0x29B1);
    }

    #[test]
    fn test_crc16_captured_frames() {
        for frame in CAPTURED_FRAMES {
            assert!(verify_crc16_trailer(frame), "trailer {frame:02x?}");
            assert!(verify_crc16_residue(frame), "residue {frame:02x?}");
        }

        assert_eq!(crc16_a(&[0x3A, 0x07, 0x00, 0x32, 0x39]), 0xCEEC);
    }

    #[test]
    fn test_crc16_append_then_check_is_zero() {
        let mut buf: Vec<u8> = Vec::new();
        for n in 0..64u8 {
            buf.push(n.wrapping_mul(37) ^ 0x5A);

            let crc = crc16_a(&buf);
            let mut framed = buf.clone();
            framed.extend_from_slice(&crc.to_be_bytes());

            assert_eq!(crc16_a(&framed), 0);
            assert_eq!(crc16_b(&buf), crc);
        }
    }

    #[test]
    fn test_crc16_detects_corruption() {
        let mut frame = CAPTURED_FRAMES[1].to_vec();
        frame[4] ^= 0x01;
        assert!(!verify_crc16_trailer(&frame));
        assert!(!verify_crc16_residue(&frame));

        assert!(!verify_crc16_trailer(&[0x01]));
        assert!(!verify_crc16_residue(&[]));
    }

    #[test]
    fn test_crc8_xor() {
        assert_eq!(crc8_xor(CRC8_SEED, &[0x01]), 0xFE);
        assert_eq!(crc8_xor(CRC8_SEED, &[0x07]), 0xF8);
        assert_eq!(crc8_xor(CRC8_SEED, &[0x00]), 0xFF);

        assert!(verify_crc8_xor(&[0x02, 0x01, 0xEC, 0x01, 0x01, 0x01, 0x11]));
        assert!(verify_crc8_xor(&[0x55, 0xAA]));
        assert!(!verify_crc8_xor(&[0x55, 0xAB]));
        assert!(!verify_crc8_xor(&[]));
    }
}
