//! Arc linearization
//!
//! Converts G2/G3 arcs given in center (I/J) form to chord segments so arc-fitted
//! perimeters rasterize like any other extrusion.

use std::f64::consts::PI;

use layerkit_core::Point2D;

/// Maximum chord length in millimeters
pub const DEFAULT_SEGMENT_LENGTH: f64 = 0.5;

/// Upper bound on chords per arc; longer arcs get proportionally longer chords
pub const MAX_SEGMENTS: usize = 4096;

/// Arc linearizer
#[derive(Debug, Clone, Copy)]
pub struct ArcExpander {
    segment_length: f64,
}

impl ArcExpander {
    pub fn new(segment_length: f64) -> Self {
        Self {
            segment_length: segment_length.max(0.01),
        }
    }

    /// Points along the arc from `start` to `end` around `center`, excluding
    /// `start` and ending exactly at `end`
    ///
    /// Coincident start and end describe a full circle.
    pub fn expand(
        &self,
        start: Point2D,
        end: Point2D,
        center: Point2D,
        clockwise: bool,
    ) -> Vec<Point2D> {
        let rx = start.x - center.x;
        let ry = start.y - center.y;
        let radius = (rx * rx + ry * ry).sqrt();
        if !radius.is_finite() || radius < f64::EPSILON {
            return vec![end];
        }

        let start_angle = ry.atan2(rx);
        let end_angle = (end.y - center.y).atan2(end.x - center.x);

        let mut delta = end_angle - start_angle;
        if clockwise && delta >= 0.0 {
            delta -= 2.0 * PI;
        } else if !clockwise && delta <= 0.0 {
            delta += 2.0 * PI;
        }

        let arc_length = radius * delta.abs();
        let segments = (arc_length / self.segment_length)
            .ceil()
            .clamp(1.0, MAX_SEGMENTS as f64) as usize;

        let mut points = Vec::with_capacity(segments);
        for i in 1..segments {
            let angle = start_angle + delta * (i as f64 / segments as f64);
            points.push(Point2D::new(
                center.x + radius * angle.cos(),
                center.y + radius * angle.sin(),
            ));
        }
        points.push(end);
        points
    }
}

impl Default for ArcExpander {
    fn default() -> Self {
        Self::new(DEFAULT_SEGMENT_LENGTH)
    }
}
