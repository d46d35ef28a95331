//! Occupancy grid rasterization

use layerkit_core::{Bounds, Point2D};
use layerkit_toolpath::Move;
use tracing::warn;

/// Largest grid allocated for one layer (a 2.5 m square at 0.5 mm)
pub const MAX_GRID_CELLS: usize = 25_000_000;

/// Grid geometry shared by every layer of one toolpath
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridDims {
    pub width: usize,
    pub height: usize,
    /// Millimeter coordinate of cell (0, 0)
    pub origin: Point2D,
    /// Millimeters per cell
    pub resolution: f64,
}

impl GridDims {
    /// Size a grid to cover `bounds`, with one spare cell on the far edges
    ///
    /// Returns `None` for empty bounds and for grids above [`MAX_GRID_CELLS`].
    pub fn from_bounds(bounds: &Bounds, resolution: f64) -> Option<Self> {
        if bounds.is_empty() || !resolution.is_finite() || resolution <= 0.0 {
            return None;
        }
        let span_x = (bounds.width() / resolution).ceil();
        let span_y = (bounds.height() / resolution).ceil();
        let limit = MAX_GRID_CELLS as f64;
        if !(span_x.is_finite() && span_y.is_finite() && span_x < limit && span_y < limit) {
            warn!(
                "Toolpath extent {:.0}x{:.0}mm is too large to rasterize",
                bounds.width(),
                bounds.height()
            );
            return None;
        }
        let width = span_x as usize + 2;
        let height = span_y as usize + 2;
        match width.checked_mul(height) {
            Some(cells) if cells <= MAX_GRID_CELLS => {}
            _ => {
                warn!(
                    "Grid of {}x{} cells exceeds the {} cell budget",
                    width, height, MAX_GRID_CELLS
                );
                return None;
            }
        }
        Some(Self {
            width,
            height,
            origin: Point2D::new(bounds.min_x, bounds.min_y),
            resolution,
        })
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// Nearest cell coordinates of a point (may fall outside the grid)
    pub fn to_grid(&self, point: Point2D) -> (i64, i64) {
        (
            ((point.x - self.origin.x) / self.resolution).round() as i64,
            ((point.y - self.origin.y) / self.resolution).round() as i64,
        )
    }

    /// Millimeter position of (possibly fractional) cell coordinates
    pub fn to_mm(&self, gx: f64, gy: f64) -> Point2D {
        Point2D::new(
            gx * self.resolution + self.origin.x,
            gy * self.resolution + self.origin.y,
        )
    }

    /// Linear index of in-range cell coordinates
    pub fn index(&self, gx: i64, gy: i64) -> Option<usize> {
        if gx < 0 || gy < 0 || gx >= self.width as i64 || gy >= self.height as i64 {
            return None;
        }
        Some(gy as usize * self.width + gx as usize)
    }

    /// Cell coordinates of a linear index
    pub fn coords(&self, index: usize) -> (usize, usize) {
        (index % self.width, index / self.width)
    }
}

/// Filled/empty cells of one layer
#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    pub dims: GridDims,
    pub cells: Vec<bool>,
}

impl OccupancyGrid {
    pub fn empty(dims: GridDims) -> Self {
        Self {
            dims,
            cells: vec![false; dims.cell_count()],
        }
    }

    /// Rasterize extrusion moves, stamping a square of `half_stamp` cells
    /// around every point of each Bresenham line
    pub fn rasterize(dims: GridDims, moves: &[Move], half_stamp: i64, ignore_infill: bool) -> Self {
        let mut grid = Self::empty(dims);
        for mv in moves {
            if !mv.extrude || (ignore_infill && mv.is_infill()) {
                continue;
            }
            grid.stamp_line(dims.to_grid(mv.start), dims.to_grid(mv.end), half_stamp);
        }
        grid
    }

    fn stamp(&mut self, cx: i64, cy: i64, half: i64) {
        for dy in -half..=half {
            for dx in -half..=half {
                if let Some(idx) = self.dims.index(cx + dx, cy + dy) {
                    self.cells[idx] = true;
                }
            }
        }
    }

    fn stamp_line(&mut self, from: (i64, i64), to: (i64, i64), half: i64) {
        let (mut cx, mut cy) = from;
        let dx = (to.0 - from.0).abs();
        let dy = (to.1 - from.1).abs();
        let sx = if from.0 < to.0 { 1 } else { -1 };
        let sy = if from.1 < to.1 { 1 } else { -1 };
        let mut err = dx - dy;

        loop {
            self.stamp(cx, cy, half);
            if (cx, cy) == to {
                break;
            }
            let e2 = 2 * err;
            if e2 > -dy {
                err -= dy;
                cx += sx;
            }
            if e2 < dx {
                err += dx;
                cy += sy;
            }
        }
    }

    pub fn is_filled(&self, index: usize) -> bool {
        self.cells.get(index).copied().unwrap_or(false)
    }

    pub fn filled_count(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }
}
