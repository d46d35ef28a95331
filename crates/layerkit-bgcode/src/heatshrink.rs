//! Heatshrink decoder
//!
//! Heatshrink is an LZSS variant: every token starts with a one-bit tag.
//! A set tag is followed by an 8-bit literal; a clear tag by a back-reference
//! made of a `window_bits` index and a `lookahead_bits` count, both stored
//! minus one. Bits are read most-significant first.

use tracing::warn;

/// Most-significant-bit-first cursor over a byte slice
#[derive(Debug)]
pub struct BitReader<'a> {
    input: &'a [u8],
    byte_pos: usize,
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    /// Number of unread bits
    pub fn bits_available(&self) -> usize {
        (self.input.len() - self.byte_pos) * 8 - self.bit_pos as usize
    }

    /// Read `count` bits (at most 32), or `None` when the input runs out
    pub fn read_bits(&mut self, count: u32) -> Option<u32> {
        if self.bits_available() < count as usize {
            return None;
        }
        let mut value = 0u32;
        for _ in 0..count {
            let byte = self.input[self.byte_pos];
            value = (value << 1) | ((byte >> (7 - self.bit_pos)) & 1) as u32;
            self.bit_pos += 1;
            if self.bit_pos == 8 {
                self.bit_pos = 0;
                self.byte_pos += 1;
            }
        }
        Some(value)
    }
}

/// Decode a heatshrink stream
///
/// Decoding stops once `output_size` bytes are produced or the input cannot
/// hold another complete token. A short result is logged, not treated as an error.
pub fn decode(input: &[u8], window_bits: u32, lookahead_bits: u32, output_size: usize) -> Vec<u8> {
    let window_size = 1usize << window_bits;
    let mask = window_size - 1;
    let mut ring = vec![0u8; window_size];
    let mut ring_pos = 0usize;
    let mut output = Vec::with_capacity(output_size);
    let mut reader = BitReader::new(input);

    while output.len() < output_size {
        let Some(tag) = reader.read_bits(1) else {
            break;
        };

        if tag == 1 {
            let Some(byte) = reader.read_bits(8) else {
                break;
            };
            let byte = byte as u8;
            ring[ring_pos & mask] = byte;
            ring_pos += 1;
            output.push(byte);
        } else {
            if reader.bits_available() < (window_bits + lookahead_bits) as usize {
                break;
            }
            let (Some(index), Some(count)) =
                (reader.read_bits(window_bits), reader.read_bits(lookahead_bits))
            else {
                break;
            };
            let index = index as usize + 1;
            let count = count as usize + 1;
            for _ in 0..count {
                let byte = ring[ring_pos.wrapping_sub(index) & mask];
                ring[ring_pos & mask] = byte;
                ring_pos += 1;
                output.push(byte);
                if output.len() >= output_size {
                    break;
                }
            }
        }
    }

    if output.len() < output_size {
        warn!(
            "Heatshrink stream ended early: produced {} of {} bytes",
            output.len(),
            output_size
        );
    }

    output
}
