//! # LayerKit Toolpath
//!
//! Turns sliced G-code text into a structural model: the original lines,
//! the layers they group into, and the planar moves of every layer.
//!
//! Layer boundaries follow slicer conventions (`;LAYER:N`,
//! `; layer num/total_layer_count: N/M`, and `;LAYER_CHANGE` as a fallback).
//! The same marker logic is exposed as [`LayerTracker`] so downstream
//! rewriters follow layers exactly the way the parser does.

pub mod arc;
pub mod file_io;
pub mod markers;
pub mod model;
pub mod parser;
pub mod slicer;
pub mod words;

pub use file_io::{load_file, load_toolpath, FileEncoding, LoadedToolpath, SourceFormat, ToolpathFileReader};
pub use markers::{LayerTracker, MarkerStyle};
pub use model::{Layer, LineEnding, Move, ToolpathModel, UNCLASSIFIED};
pub use parser::{parse, parse_with_progress, ToolpathParser};
pub use slicer::SlicerKind;
pub use words::GcodeWords;
