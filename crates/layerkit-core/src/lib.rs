//! # LayerKit Core
//!
//! Core types and utilities shared by every LayerKit crate.
//! Provides the error taxonomy, planar geometry used by the parser and
//! hole detector, and the progress callback alias used by long-running
//! decode and scan operations.

pub mod data;
pub mod error;
pub mod types;

pub use data::{Bounds, Point2D};
pub use error::{DecodeError, Error, InsertError, ModificationError, Result};
pub use types::ProgressFn;
