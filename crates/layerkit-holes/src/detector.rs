//! Hole detector with per-layer grid cache

use std::collections::HashMap;
use std::rc::Rc;

use layerkit_core::Point2D;
use layerkit_toolpath::ToolpathModel;
use tracing::{debug, info};

use crate::flood::enclosed_regions;
use crate::grid::{GridDims, OccupancyGrid};
use crate::hole::{FloorStatus, Hole};

/// Default minimum hole diameter in millimeters
pub const DEFAULT_MIN_DIAMETER: f64 = 4.0;

/// Rasterization parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    /// Millimeters per grid cell
    pub resolution_mm: f64,
    /// Nominal extrusion width
    pub line_width_mm: f64,
    /// Filled fraction of a hole footprint that marks the floor layer
    pub floor_overlap: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            resolution_mm: 0.5,
            line_width_mm: 0.45,
            floor_overlap: 0.8,
        }
    }
}

impl DetectorConfig {
    /// Half-width of the square stamp in cells
    pub fn half_stamp(&self) -> i64 {
        (self.line_width_mm / 2.0 / self.resolution_mm).ceil() as i64
    }

    /// Void width lost to the stamp on both walls
    pub fn stamp_correction(&self) -> f64 {
        self.half_stamp() as f64 * self.resolution_mm * 2.0
    }
}

/// Hole detector
///
/// Owns a grid cache keyed by (layer, ignore-infill) and the results of the
/// last detections. The cache belongs to one toolpath model: call
/// [`HoleDetector::clear_cache`] whenever the model is replaced.
#[derive(Debug, Default)]
pub struct HoleDetector {
    config: DetectorConfig,
    grids: HashMap<(u32, bool), Rc<OccupancyGrid>>,
    holes: HashMap<u32, Vec<Hole>>,
    scanned: Vec<Hole>,
}

impl HoleDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DetectorConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Drop cached grids and every detection result
    pub fn clear_cache(&mut self) {
        self.grids.clear();
        self.holes.clear();
        self.scanned.clear();
    }

    /// Occupancy grid of a layer, rasterized on first use
    ///
    /// Returns `None` when the toolpath has no moves to size a grid from.
    pub fn rasterize_layer(
        &mut self,
        model: &ToolpathModel,
        layer: u32,
        ignore_infill: bool,
    ) -> Option<Rc<OccupancyGrid>> {
        if let Some(grid) = self.grids.get(&(layer, ignore_infill)) {
            return Some(Rc::clone(grid));
        }
        let dims = GridDims::from_bounds(&model.bounds, self.config.resolution_mm)?;
        let grid = match model.moves(layer) {
            Some(moves) => {
                OccupancyGrid::rasterize(dims, moves, self.config.half_stamp(), ignore_infill)
            }
            None => OccupancyGrid::empty(dims),
        };
        debug!(
            "Rasterized layer {} ({}x{}, ignore infill {}): {} filled cells",
            layer,
            dims.width,
            dims.height,
            ignore_infill,
            grid.filled_count()
        );
        let grid = Rc::new(grid);
        self.grids
            .insert((layer, ignore_infill), Rc::clone(&grid));
        Some(grid)
    }

    /// Detect holes on one layer, discarding those below `min_diameter_mm`
    pub fn detect_holes(
        &mut self,
        model: &ToolpathModel,
        layer: u32,
        min_diameter_mm: f64,
        ignore_infill: bool,
    ) -> Vec<Hole> {
        let Some(grid) = self.rasterize_layer(model, layer, ignore_infill) else {
            self.holes.insert(layer, Vec::new());
            return Vec::new();
        };
        let correction = self.config.stamp_correction();

        let mut found = Vec::new();
        for region in enclosed_regions(&grid) {
            let hole = Hole::from_region(region, &grid.dims, layer, found.len(), correction);
            if hole.diameter_mm < min_diameter_mm {
                continue;
            }
            found.push(hole);
        }

        debug!("Layer {}: {} holes", layer, found.len());
        self.holes.insert(layer, found.clone());
        found
    }

    /// Holes from the last detection on a layer
    pub fn holes_for_layer(&self, layer: u32) -> Option<&[Hole]> {
        self.holes.get(&layer).map(Vec::as_slice)
    }

    /// Unique holes from the last whole-print scan
    pub fn unique_holes(&self) -> &[Hole] {
        &self.scanned
    }

    /// Hole of a detected layer containing a millimeter position
    pub fn find_hole_at_point(&self, layer: u32, point: Point2D) -> Option<&Hole> {
        self.holes
            .get(&layer)?
            .iter()
            .find(|hole| hole.contains_point(point))
    }

    /// Trace a hole downward to the layer that closes its floor
    ///
    /// Starts at the layer below `hole.layer`. Infill is always included, since a
    /// floor is usually solid infill.
    pub fn analyze_depth(&mut self, model: &ToolpathModel, hole: &mut Hole) {
        hole.floor = FloorStatus::ThroughHole;
        hole.depth_mm = None;
        if hole.cells.is_empty() {
            return;
        }

        let below: Vec<u32> = model
            .layers
            .iter()
            .rev()
            .map(|l| l.number)
            .filter(|n| *n < hole.layer)
            .collect();

        for number in below {
            let Some(grid) = self.rasterize_layer(model, number, false) else {
                break;
            };
            let filled = hole.cells.iter().filter(|&&idx| grid.is_filled(idx)).count();
            let overlap = filled as f64 / hole.cells.len() as f64;
            if overlap >= self.config.floor_overlap {
                hole.floor = FloorStatus::Floor(number);
                hole.depth_mm = match (
                    model.get_layer(hole.layer).and_then(|l| l.z_height),
                    model.get_layer(number).and_then(|l| l.z_height),
                ) {
                    (Some(top), Some(floor)) => Some(top - floor),
                    _ => None,
                };
                return;
            }
        }
    }

    /// Detect holes on every layer top-down and merge them across layers
    ///
    /// A hole whose centroid lies within the larger radius of an already kept
    /// hole is treated as the same hole; the topmost occurrence is kept. Depth
    /// analysis then runs once per kept hole.
    pub fn scan_all_layers(
        &mut self,
        model: &ToolpathModel,
        min_diameter_mm: f64,
        ignore_infill: bool,
        mut progress: Option<&mut dyn FnMut(f64)>,
    ) -> Vec<Hole> {
        self.scanned.clear();
        let numbers: Vec<u32> = model.layers.iter().rev().map(|l| l.number).collect();
        let total = numbers.len();
        let mut unique: Vec<Hole> = Vec::new();

        for (done, number) in numbers.into_iter().enumerate() {
            if let Some(cb) = progress.as_mut() {
                cb(done as f64 / total as f64);
            }
            for mut hole in self.detect_holes(model, number, min_diameter_mm, ignore_infill) {
                if unique.iter().any(|kept| kept.overlaps(&hole)) {
                    continue;
                }
                hole.top_layer = Some(number);
                unique.push(hole);
            }
        }

        for hole in unique.iter_mut() {
            self.analyze_depth(model, hole);
        }

        if let Some(cb) = progress.as_mut() {
            cb(1.0);
        }

        info!(
            "Scanned {} layers: {} unique holes ({} through-holes)",
            total,
            unique.len(),
            unique.iter().filter(|h| h.is_through_hole()).count()
        );
        self.scanned = unique.clone();
        unique
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layerkit_toolpath::parse;

    /// Square ring of walls 2 mm thick around a 6 mm square void
    fn ring_layer(number: u32, z: f64) -> String {
        let mut out = format!(";LAYER:{}\nG0 X0 Y0 Z{}\n;TYPE:WALL-OUTER\n", number, z);
        let mut e = 0.0;
        for i in 0..5 {
            let o = i as f64 * 0.4;
            let far = 10.0 - o;
            for (x, y) in [(far, o), (far, far), (o, far), (o, o)] {
                e += 1.0;
                out.push_str(&format!("G1 X{:.2} Y{:.2} E{}\n", x, y, e));
            }
            out.push_str(&format!("G0 X{:.2} Y{:.2}\n", o + 0.4, o + 0.4));
        }
        out
    }

    #[test]
    fn test_config_stamp() {
        let config = DetectorConfig::default();
        assert_eq!(config.half_stamp(), 1);
        assert_eq!(config.stamp_correction(), 1.0);
    }

    #[test]
    fn test_detects_square_void() {
        let model = parse(&ring_layer(0, 0.2), "ring.gcode");
        let mut detector = HoleDetector::new();
        let holes = detector.detect_holes(&model, 0, 2.0, true);
        assert_eq!(holes.len(), 1);
        let hole = &holes[0];
        assert_eq!(hole.id, "hole_0_0");
        assert!((hole.centroid.x - 5.0).abs() < 0.3);
        assert!((hole.centroid.y - 5.0).abs() < 0.3);
        assert!(detector.find_hole_at_point(0, Point2D::new(5.0, 5.0)).is_some());
        assert!(detector.find_hole_at_point(0, Point2D::new(0.0, 0.0)).is_none());
    }

    #[test]
    fn test_cache_is_reused_and_cleared() {
        let model = parse(&ring_layer(0, 0.2), "ring.gcode");
        let mut detector = HoleDetector::new();
        let a = detector.rasterize_layer(&model, 0, false).unwrap();
        let b = detector.rasterize_layer(&model, 0, false).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        detector.clear_cache();
        let c = detector.rasterize_layer(&model, 0, false).unwrap();
        assert!(!Rc::ptr_eq(&a, &c));
        assert!(detector.holes_for_layer(0).is_none());
    }

    #[test]
    fn test_missing_layer_has_no_holes() {
        let model = parse(&ring_layer(0, 0.2), "ring.gcode");
        let mut detector = HoleDetector::new();
        assert!(detector.detect_holes(&model, 9, 1.0, false).is_empty());
    }

    #[test]
    fn test_unsliced_model_has_no_holes() {
        let model = parse("G28\n", "empty.gcode");
        let mut detector = HoleDetector::new();
        assert!(detector.detect_holes(&model, 0, 1.0, false).is_empty());
        assert!(detector.scan_all_layers(&model, 1.0, false, None).is_empty());
    }
}
