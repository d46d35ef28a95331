//! Block checksum: standard CRC-32 (IEEE 802.3), computed by flate2's
//! crc32fast-backed hasher.

use flate2::Crc;

/// Compute the CRC-32 of a byte slice
pub fn crc32(bytes: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(bytes);
    crc.sum()
}
