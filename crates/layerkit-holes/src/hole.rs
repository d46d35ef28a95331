//! Detected hole records and shape classification

use std::fmt;

use layerkit_core::{Bounds, Point2D};
use serde::Serialize;

use crate::flood::Region;
use crate::grid::GridDims;

/// Shape class of a hole's cross-section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HoleShape {
    Circle,
    Square,
    Hexagon,
    Rectangle,
}

impl HoleShape {
    /// Classify from bounding-box aspect ratio and area fill ratio
    ///
    /// Perimeter-based circularity scores rasterized circles below squares, so
    /// the fill ratio of the bounding box is used instead.
    pub fn classify(aspect: f64, fill_ratio: f64) -> Self {
        if aspect < 1.12 {
            if fill_ratio < 0.9 {
                HoleShape::Circle
            } else {
                HoleShape::Square
            }
        } else if aspect < 1.3 {
            if fill_ratio < 0.88 {
                HoleShape::Hexagon
            } else {
                HoleShape::Rectangle
            }
        } else {
            HoleShape::Rectangle
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HoleShape::Circle => "circle",
            HoleShape::Square => "square",
            HoleShape::Hexagon => "hexagon",
            HoleShape::Rectangle => "rectangle",
        }
    }
}

impl fmt::Display for HoleShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of depth analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "status", content = "layer", rename_all = "snake_case")]
pub enum FloorStatus {
    #[default]
    NotAnalyzed,
    /// Layer whose extrusions close the bottom of the hole
    Floor(u32),
    /// No closing layer below; the hole runs through to the bed
    ThroughHole,
}

/// An enclosed void on one layer
#[derive(Debug, Clone, Serialize)]
pub struct Hole {
    /// `hole_{layer}_{n}`
    pub id: String,
    /// Layer the hole was detected on
    pub layer: u32,
    /// Topmost layer of the hole, set by a whole-print scan
    pub top_layer: Option<u32>,
    /// Grid cells of the void, ascending
    #[serde(skip)]
    pub cells: Vec<usize>,
    #[serde(skip)]
    pub grid: Option<GridDims>,
    pub area_mm2: f64,
    /// Circle-equivalent diameter including the wall stamp correction
    pub diameter_mm: f64,
    pub shape: HoleShape,
    pub width_mm: f64,
    pub height_mm: f64,
    pub fill_ratio: f64,
    pub centroid: Point2D,
    pub bbox: Bounds,
    pub floor: FloorStatus,
    /// Height from the floor layer to the detection layer
    pub depth_mm: Option<f64>,
}

impl Hole {
    /// Build a hole from a labeled region; `stamp_correction` is the width of
    /// wall the rasterization stamp ate from the void (both sides together)
    pub fn from_region(
        region: Region,
        dims: &GridDims,
        layer: u32,
        ordinal: usize,
        stamp_correction: f64,
    ) -> Self {
        let res = dims.resolution;
        let area_mm2 = region.cells.len() as f64 * res * res;
        let raw_diameter = 2.0 * (area_mm2 / std::f64::consts::PI).sqrt();

        let raw_w = (region.max_gx - region.min_gx + 1) as f64 * res;
        let raw_h = (region.max_gy - region.min_gy + 1) as f64 * res;
        let width_mm = raw_w + stamp_correction;
        let height_mm = raw_h + stamp_correction;
        let aspect = width_mm.max(height_mm) / width_mm.min(height_mm).max(0.1);
        let raw_bbox_area = raw_w * raw_h;
        let fill_ratio = if raw_bbox_area > 0.0 {
            area_mm2 / raw_bbox_area
        } else {
            0.0
        };

        let min = dims.to_mm(region.min_gx as f64, region.min_gy as f64);
        let max = dims.to_mm(region.max_gx as f64, region.max_gy as f64);

        Self {
            id: format!("hole_{}_{}", layer, ordinal),
            layer,
            top_layer: None,
            centroid: dims.to_mm(region.centroid.0, region.centroid.1),
            bbox: Bounds::from_extents(min.x, max.x, min.y, max.y),
            cells: region.cells,
            grid: Some(*dims),
            area_mm2,
            diameter_mm: raw_diameter + stamp_correction,
            shape: HoleShape::classify(aspect, fill_ratio),
            width_mm,
            height_mm,
            fill_ratio,
            floor: FloorStatus::NotAnalyzed,
            depth_mm: None,
        }
    }

    pub fn radius_mm(&self) -> f64 {
        self.diameter_mm / 2.0
    }

    pub fn is_through_hole(&self) -> bool {
        self.floor == FloorStatus::ThroughHole
    }

    pub fn floor_layer(&self) -> Option<u32> {
        match self.floor {
            FloorStatus::Floor(layer) => Some(layer),
            _ => None,
        }
    }

    /// Membership test for a millimeter position
    pub fn contains_point(&self, point: Point2D) -> bool {
        let Some(dims) = self.grid else {
            return false;
        };
        if !self.bbox.contains(point) {
            return false;
        }
        let (gx, gy) = dims.to_grid(point);
        dims.index(gx, gy)
            .is_some_and(|idx| self.cells.binary_search(&idx).is_ok())
    }

    /// Proximity merge test: centroids closer than the larger radius
    pub fn overlaps(&self, other: &Hole) -> bool {
        let max_radius = self.radius_mm().max(other.radius_mm());
        self.centroid.distance_to(&other.centroid) < max_radius
    }
}
