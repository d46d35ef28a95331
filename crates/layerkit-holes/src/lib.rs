//! # LayerKit Holes
//!
//! Finds enclosed voids in printed layers using only the toolpath.
//!
//! Each layer's extrusion moves are rasterized onto an occupancy grid; empty
//! cells reachable from the grid border are exterior, and every remaining empty
//! region is a hole. Holes are sized, shape-classified, and traced downward to
//! the layer that closes their floor.

pub mod detector;
pub mod flood;
pub mod grid;
pub mod hole;

pub use detector::{DetectorConfig, HoleDetector, DEFAULT_MIN_DIAMETER};
pub use grid::{GridDims, OccupancyGrid, MAX_GRID_CELLS};
pub use hole::{FloorStatus, Hole, HoleShape};
