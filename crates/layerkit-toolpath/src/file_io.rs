//! Toolpath file reading
//!
//! Reads plain-text G-code or the binary container, detected by its magic
//! bytes rather than the file extension.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use layerkit_bgcode::{decode_container_with_progress, is_container};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::model::ToolpathModel;
use crate::parser::ToolpathParser;

/// Files above this size are logged before being read into memory
const LARGE_FILE_WARNING: u64 = 500 * 1024 * 1024;

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Text encodings accepted for plain G-code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileEncoding {
    /// UTF-8 (with or without BOM)
    Utf8,
    /// Anything else; read as Latin-1, one character per byte
    Unknown,
}

impl FileEncoding {
    /// Detect encoding from file bytes
    pub fn detect(data: &[u8]) -> Self {
        if data.starts_with(&UTF8_BOM) || std::str::from_utf8(data).is_ok() {
            FileEncoding::Utf8
        } else {
            FileEncoding::Unknown
        }
    }

    /// Decode file bytes (without BOM) to text
    pub fn decode(&self, data: &[u8]) -> String {
        match self {
            FileEncoding::Utf8 => String::from_utf8_lossy(data).into_owned(),
            FileEncoding::Unknown => data.iter().map(|&b| char::from(b)).collect(),
        }
    }
}

/// On-disk format of a loaded file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFormat {
    Text,
    BinaryContainer,
}

/// Decoded file contents
#[derive(Debug, Clone)]
pub struct LoadedToolpath {
    pub filename: String,
    pub text: String,
    pub format: SourceFormat,
    /// Size of the file on disk
    pub file_size: u64,
    pub read_time_ms: u64,
}

impl LoadedToolpath {
    /// Parse the decoded text
    pub fn parse(&self, parser: &ToolpathParser) -> ToolpathModel {
        parser.parse(&self.text, &self.filename)
    }
}

/// Reader for a single toolpath file
pub struct ToolpathFileReader {
    path: PathBuf,
    file_size: u64,
}

impl ToolpathFileReader {
    /// Create a reader
    ///
    /// # Errors
    /// Returns error if the path does not exist or is not a file
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            return Err(anyhow!("File does not exist: {}", path.display()));
        }

        if !path.is_file() {
            return Err(anyhow!("Path is not a file: {}", path.display()));
        }

        let file_size = fs::metadata(&path)?.len();
        Ok(Self { path, file_size })
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and decode the whole file
    pub fn read(&self, progress: Option<&mut dyn FnMut(f64)>) -> Result<LoadedToolpath> {
        if self.file_size > LARGE_FILE_WARNING {
            warn!(
                "Reading very large file ({}MB) into memory",
                self.file_size / (1024 * 1024)
            );
        }

        let started = Instant::now();
        let bytes = fs::read(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;

        let (text, format) = if is_container(&bytes) {
            let text = decode_container_with_progress(&bytes, progress)
                .with_context(|| format!("Failed to decode {}", self.path.display()))?;
            (text, SourceFormat::BinaryContainer)
        } else {
            (decode_text(&bytes), SourceFormat::Text)
        };

        let filename = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let read_time_ms = started.elapsed().as_millis() as u64;
        info!(
            "Loaded {} ({:?}, {} bytes on disk, {} chars) in {}ms",
            filename,
            format,
            self.file_size,
            text.len(),
            read_time_ms
        );

        Ok(LoadedToolpath {
            filename,
            text,
            format,
            file_size: self.file_size,
            read_time_ms,
        })
    }
}

fn decode_text(bytes: &[u8]) -> String {
    let body = bytes.strip_prefix(&UTF8_BOM).unwrap_or(bytes);
    let encoding = FileEncoding::detect(body);
    if encoding == FileEncoding::Unknown {
        warn!("File is not valid UTF-8; reading it as Latin-1");
    }
    encoding.decode(body)
}

/// Read a toolpath file, decoding binary containers transparently
pub fn load_toolpath(path: impl AsRef<Path>) -> Result<LoadedToolpath> {
    ToolpathFileReader::new(path)?.read(None)
}

/// Decoded text and file name of a toolpath file
pub fn load_file(path: impl AsRef<Path>) -> Result<(String, String)> {
    let loaded = load_toolpath(path)?;
    Ok((loaded.text, loaded.filename))
}
