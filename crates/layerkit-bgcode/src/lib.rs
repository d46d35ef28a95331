//! # LayerKit Binary G-code
//!
//! Decoder for the block-structured binary G-code container.
//!
//! ## Layers
//!
//! - **CRC-32**: block integrity checksum (flate2's crc32fast hasher)
//! - **Heatshrink**: bit-level LZ77 window decoder (11/4 and 12/4 variants)
//! - **MeatPack**: nibble-packed text codec with an in-band command protocol
//! - **Container**: block iteration, decompression and decoding orchestration

pub mod container;
pub mod crc32;
pub mod heatshrink;
pub mod meatpack;

pub use container::{
    decode_container, decode_container_with_progress, is_container, BlockHeader, BlockType,
    Compression, ContainerReader, Encoding, FileHeader, MAGIC,
};
pub use crc32::crc32;
