//! Block container reader
//!
//! File layout (all integers little-endian):
//!
//! ```text
//! "GCDE" | version u32 | checksum kind u16
//! block* : type u16 | compression u16 | uncompressed size u32
//!          [compressed size u32, when compression != 0]
//!          [thumbnail params 6 bytes | encoding u16]
//!          payload
//!          [crc32 u32, when checksum kind == 1]
//! ```

use std::io::Read;

use flate2::read::DeflateDecoder;
use layerkit_core::DecodeError;
use tracing::{debug, warn};

use crate::{crc32::crc32, heatshrink, meatpack};

/// Container magic tag
pub const MAGIC: &[u8; 4] = b"GCDE";

const FILE_HEADER_LEN: usize = 10;
const BLOCK_HEADER_LEN: usize = 8;
const THUMBNAIL_PARAMS_LEN: usize = 6;
const CHECKSUM_CRC32: u16 = 1;

/// Check whether a buffer starts with the container magic
pub fn is_container(bytes: &[u8]) -> bool {
    bytes.len() >= MAGIC.len() && &bytes[..MAGIC.len()] == MAGIC
}

/// Block type ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    FileMetadata,
    GCode,
    SlicerMetadata,
    PrinterMetadata,
    PrintMetadata,
    Thumbnail,
    Unknown(u16),
}

impl From<u16> for BlockType {
    fn from(id: u16) -> Self {
        match id {
            0 => BlockType::FileMetadata,
            1 => BlockType::GCode,
            2 => BlockType::SlicerMetadata,
            3 => BlockType::PrinterMetadata,
            4 => BlockType::PrintMetadata,
            5 => BlockType::Thumbnail,
            other => BlockType::Unknown(other),
        }
    }
}

/// Payload compression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    /// Raw deflate, no zlib wrapper
    Deflate,
    /// Heatshrink, window 11 bits, lookahead 4 bits
    Heatshrink11,
    /// Heatshrink, window 12 bits, lookahead 4 bits
    Heatshrink12,
}

impl Compression {
    pub fn from_id(id: u16) -> Result<Self, DecodeError> {
        match id {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Deflate),
            2 => Ok(Compression::Heatshrink11),
            3 => Ok(Compression::Heatshrink12),
            other => Err(DecodeError::UnknownCompression { id: other }),
        }
    }

    /// Decompress a payload to `uncompressed_size` bytes
    pub fn decompress(&self, data: &[u8], uncompressed_size: usize) -> Result<Vec<u8>, DecodeError> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Deflate => {
                let mut decoder = DeflateDecoder::new(data);
                let mut out = Vec::with_capacity(uncompressed_size);
                decoder
                    .read_to_end(&mut out)
                    .map_err(|e| DecodeError::Inflate {
                        message: e.to_string(),
                    })?;
                if out.len() != uncompressed_size {
                    warn!(
                        "Deflate block size mismatch: declared {}, produced {}",
                        uncompressed_size,
                        out.len()
                    );
                }
                Ok(out)
            }
            Compression::Heatshrink11 => Ok(heatshrink::decode(data, 11, 4, uncompressed_size)),
            Compression::Heatshrink12 => Ok(heatshrink::decode(data, 12, 4, uncompressed_size)),
        }
    }
}

/// Payload text encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    None,
    MeatPack,
    /// MeatPack variant that keeps comments
    MeatPackComments,
}

impl Encoding {
    pub fn from_id(id: u16) -> Result<Self, DecodeError> {
        match id {
            0 => Ok(Encoding::None),
            1 => Ok(Encoding::MeatPack),
            2 => Ok(Encoding::MeatPackComments),
            other => Err(DecodeError::UnknownEncoding { id: other }),
        }
    }

    pub fn decode(&self, data: Vec<u8>) -> Vec<u8> {
        match self {
            Encoding::None => data,
            Encoding::MeatPack | Encoding::MeatPackComments => meatpack::decode(&data),
        }
    }
}

/// Fixed file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub version: u32,
    pub checksum_type: u16,
}

impl FileHeader {
    pub fn has_crc(&self) -> bool {
        self.checksum_type == CHECKSUM_CRC32
    }
}

/// One parsed block header with the location of its payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    /// Index of the block in file order
    pub index: usize,
    pub block_type: BlockType,
    /// Raw compression id, validated only when the payload is decoded
    pub compression: u16,
    /// Raw encoding id; thumbnails carry none
    pub encoding: u16,
    pub uncompressed_size: u32,
    pub compressed_size: Option<u32>,
    /// Offset of the first header byte
    pub start: usize,
    /// Offset of the first payload byte
    pub payload_start: usize,
    pub payload_len: usize,
    /// Stored checksum, when the file carries checksums
    pub stored_crc: Option<u32>,
}

impl BlockHeader {
    /// Offset one past the end of the block, checksum included
    pub fn end(&self) -> usize {
        self.payload_start + self.payload_len + if self.stored_crc.is_some() { 4 } else { 0 }
    }
}

fn read_u16(bytes: &[u8], offset: usize) -> Result<u16, DecodeError> {
    let slice = take(bytes, offset, 2)?;
    Ok(u16::from_le_bytes([slice[0], slice[1]]))
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32, DecodeError> {
    let slice = take(bytes, offset, 4)?;
    Ok(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

fn take(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8], DecodeError> {
    let available = bytes.len().saturating_sub(offset);
    if available < len {
        return Err(DecodeError::Truncated {
            offset,
            needed: len,
            available,
        });
    }
    Ok(&bytes[offset..offset + len])
}

/// Sequential block reader over a complete container buffer
#[derive(Debug)]
pub struct ContainerReader<'a> {
    bytes: &'a [u8],
    header: FileHeader,
    offset: usize,
    index: usize,
}

impl<'a> ContainerReader<'a> {
    /// Validate the magic and read the file header
    pub fn new(bytes: &'a [u8]) -> Result<Self, DecodeError> {
        if !is_container(bytes) {
            return Err(DecodeError::InvalidMagic);
        }
        let header = FileHeader {
            version: read_u32(bytes, 4)?,
            checksum_type: read_u16(bytes, 8)?,
        };
        debug!(
            "Container version {} checksum type {}",
            header.version, header.checksum_type
        );
        Ok(Self {
            bytes,
            header,
            offset: FILE_HEADER_LEN,
            index: 0,
        })
    }

    pub fn header(&self) -> FileHeader {
        self.header
    }

    /// Current cursor position
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Total buffer length
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Payload bytes of a block returned by this reader
    pub fn payload(&self, block: &BlockHeader) -> &'a [u8] {
        &self.bytes[block.payload_start..block.payload_start + block.payload_len]
    }

    /// Verify a block's stored checksum; `None` when the file carries none
    pub fn verify_crc(&self, block: &BlockHeader) -> Option<bool> {
        let stored = block.stored_crc?;
        let covered = &self.bytes[block.start..block.payload_start + block.payload_len];
        Some(crc32(covered) == stored)
    }

    /// Read the next block header, or `None` at end of data
    pub fn next_block(&mut self) -> Result<Option<BlockHeader>, DecodeError> {
        let bytes = self.bytes;
        if self.offset + BLOCK_HEADER_LEN > bytes.len() {
            if self.offset < bytes.len() {
                debug!(
                    "Ignoring {} trailing bytes after last block",
                    bytes.len() - self.offset
                );
            }
            return Ok(None);
        }

        let start = self.offset;
        let block_type = BlockType::from(read_u16(bytes, start)?);
        let compression = read_u16(bytes, start + 2)?;
        let uncompressed_size = read_u32(bytes, start + 4)?;
        let mut cursor = start + BLOCK_HEADER_LEN;

        let compressed_size = if compression != 0 {
            let size = read_u32(bytes, cursor)?;
            cursor += 4;
            Some(size)
        } else {
            None
        };

        let encoding = if block_type == BlockType::Thumbnail {
            take(bytes, cursor, THUMBNAIL_PARAMS_LEN)?;
            cursor += THUMBNAIL_PARAMS_LEN;
            0
        } else {
            let encoding = read_u16(bytes, cursor)?;
            cursor += 2;
            encoding
        };

        let payload_len = compressed_size.unwrap_or(uncompressed_size) as usize;
        take(bytes, cursor, payload_len)?;
        let payload_start = cursor;
        cursor += payload_len;

        let stored_crc = if self.header.has_crc() {
            let crc = read_u32(bytes, cursor)?;
            cursor += 4;
            Some(crc)
        } else {
            None
        };

        let block = BlockHeader {
            index: self.index,
            block_type,
            compression,
            encoding,
            uncompressed_size,
            compressed_size,
            start,
            payload_start,
            payload_len,
            stored_crc,
        };
        self.offset = cursor;
        self.index += 1;
        Ok(Some(block))
    }
}

/// Decode a container into G-code text
pub fn decode_container(bytes: &[u8]) -> Result<String, DecodeError> {
    decode_container_with_progress(bytes, None)
}

/// Decode a container into G-code text, reporting the consumed byte fraction
/// after each G-code block
pub fn decode_container_with_progress(
    bytes: &[u8],
    mut progress: Option<&mut dyn FnMut(f64)>,
) -> Result<String, DecodeError> {
    let mut reader = ContainerReader::new(bytes)?;
    let mut gcode = Vec::new();
    let mut gcode_blocks = 0usize;

    while let Some(block) = reader.next_block()? {
        if block.block_type != BlockType::GCode {
            debug!("Skipping {:?} block {}", block.block_type, block.index);
            continue;
        }

        if let Some(false) = reader.verify_crc(&block) {
            warn!(
                "CRC32 mismatch in G-code block {}: stored {:08x}",
                block.index,
                block.stored_crc.unwrap_or_default()
            );
        }

        let compression = Compression::from_id(block.compression)?;
        let encoding = Encoding::from_id(block.encoding)?;
        let decompressed =
            compression.decompress(reader.payload(&block), block.uncompressed_size as usize)?;
        let decoded = encoding.decode(decompressed);
        debug!(
            "G-code block {}: {:?}/{:?}, {} bytes decoded",
            block.index,
            compression,
            encoding,
            decoded.len()
        );
        gcode.extend_from_slice(&decoded);
        gcode_blocks += 1;

        if let Some(cb) = progress.as_mut() {
            cb((reader.offset() as f64 / reader.len() as f64).min(1.0));
        }
    }

    debug!(
        "Decoded {} G-code blocks into {} bytes",
        gcode_blocks,
        gcode.len()
    );

    String::from_utf8(gcode).map_err(|e| DecodeError::InvalidUtf8 {
        message: e.to_string(),
    })
}
