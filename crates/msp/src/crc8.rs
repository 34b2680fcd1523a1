//! CRC-8/DVB-S2, the checksum protecting MSP v2 frames. It covers the flags,
//! command, length and payload bytes.

use crc::{Crc, Digest, CRC_8_DVB_S2};

pub static CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_DVB_S2);

/// A running CRC, fed one frame byte at a time.
pub fn digest() -> Digest<'static, u8> {
    CRC8.digest()
}

pub fn checksum(bytes: &[u8]) -> u8 {
    CRC8.checksum(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_value() {
        // standard check value for CRC-8/DVB-S2
        assert_eq!(checksum(b"123456789"), 0xBC);
    }

    #[test]
    fn empty_input() {
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn running_matches_one_shot() {
        let data = [0x00, 0x02, 0x00, 0x00, 0x00];

        let mut running = digest();
        for byte in data {
            running.update(&[byte]);
        }

        assert_eq!(running.finalize(), checksum(&data));
        assert_eq!(checksum(&data), 0x8a);
    }
}
