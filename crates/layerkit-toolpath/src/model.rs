//! Structural toolpath model

use layerkit_core::{Bounds, Point2D};
use serde::{Deserialize, Serialize};

use crate::markers::MarkerStyle;
use crate::slicer::SlicerKind;

/// Feature label used when no feature-type comment precedes a move
pub const UNCLASSIFIED: &str = "Unclassified";

/// One Z slice of the print
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// 0-based layer ordinal
    pub number: u32,
    /// Layer height in millimeters, when the file states it
    pub z_height: Option<f64>,
    /// Index of the layer's marker line
    pub start_line: usize,
    /// Index of the layer's last line (inclusive)
    pub end_line: usize,
}

impl Layer {
    pub fn line_count(&self) -> usize {
        self.end_line + 1 - self.start_line
    }

    pub fn contains_line(&self, line: usize) -> bool {
        line >= self.start_line && line <= self.end_line
    }
}

/// One straight planar motion segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Move {
    pub start: Point2D,
    pub end: Point2D,
    /// True when filament is pushed during the move
    pub extrude: bool,
    /// Feature-type label from the most recent slicer comment
    pub feature: String,
}

impl Move {
    /// Infill-like features: sparse or solid infill, gap fill, and friends
    pub fn is_infill(&self) -> bool {
        let upper = self.feature.to_uppercase();
        upper.contains("INFILL") || upper.contains("FILL") || upper == "SPARSE" || upper == "SOLID"
    }
}

/// Line terminator of the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// Parsed toolpath: source lines, layers, and per-layer moves
#[derive(Debug, Clone, Default)]
pub struct ToolpathModel {
    pub filename: String,
    /// Source lines without terminators
    pub lines: Vec<String>,
    /// Layers in ascending number and line order
    pub layers: Vec<Layer>,
    /// Moves per layer, parallel to `layers`
    pub moves: Vec<Vec<Move>>,
    pub bounds: Bounds,
    /// Non-blank lines that are neither comments, commands, nor macros
    pub skipped_lines: usize,
    pub slicer: SlicerKind,
    pub marker_style: MarkerStyle,
    pub line_ending: LineEnding,
}

impl ToolpathModel {
    /// False when no layer markers were found
    pub fn is_sliced(&self) -> bool {
        !self.layers.is_empty()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    fn layer_index(&self, number: u32) -> Option<usize> {
        self.layers.binary_search_by_key(&number, |l| l.number).ok()
    }

    /// Look up a layer by its number
    pub fn get_layer(&self, number: u32) -> Option<&Layer> {
        self.layer_index(number).map(|i| &self.layers[i])
    }

    /// Moves of a layer by its number
    pub fn moves(&self, number: u32) -> Option<&[Move]> {
        self.layer_index(number).map(|i| self.moves[i].as_slice())
    }

    /// Layer containing a line index, `None` for preamble lines
    pub fn layer_at_line(&self, line: usize) -> Option<&Layer> {
        let idx = self.layers.partition_point(|l| l.start_line <= line);
        if idx == 0 {
            return None;
        }
        let layer = &self.layers[idx - 1];
        layer.contains_line(line).then_some(layer)
    }

    /// First layer whose height is at or above `z`
    pub fn first_layer_at_or_above(&self, z: f64) -> Option<&Layer> {
        self.layers
            .iter()
            .find(|l| l.z_height.is_some_and(|lz| lz >= z - 1e-9))
    }

    pub fn total_moves(&self) -> usize {
        self.moves.iter().map(Vec::len).sum()
    }

    /// Join lines back into text using the source terminator
    pub fn text(&self) -> String {
        join_lines(&self.lines, self.line_ending)
    }
}

/// Join lines with a terminator
pub fn join_lines<S: AsRef<str>>(lines: &[S], ending: LineEnding) -> String {
    let sep = ending.as_str();
    let mut out = String::with_capacity(lines.iter().map(|l| l.as_ref().len() + sep.len()).sum());
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            out.push_str(sep);
        }
        out.push_str(line.as_ref());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(feature: &str) -> Move {
        Move {
            start: Point2D::default(),
            end: Point2D::new(1.0, 0.0),
            extrude: true,
            feature: feature.to_string(),
        }
    }

    #[test]
    fn test_infill_labels() {
        assert!(mv("Sparse infill").is_infill());
        assert!(mv("FILL").is_infill());
        assert!(mv("Gap fill").is_infill());
        assert!(mv("SOLID").is_infill());
        assert!(mv("sparse").is_infill());
        assert!(!mv("WALL-OUTER").is_infill());
        assert!(!mv(UNCLASSIFIED).is_infill());
    }

    #[test]
    fn test_layer_lines() {
        let layer = Layer {
            number: 0,
            z_height: Some(0.2),
            start_line: 3,
            end_line: 7,
        };
        assert_eq!(layer.line_count(), 5);
        assert!(layer.contains_line(3));
        assert!(layer.contains_line(7));
        assert!(!layer.contains_line(8));
    }

    #[test]
    fn test_join_lines() {
        assert_eq!(join_lines(&["a", "b", ""], LineEnding::Lf), "a\nb\n");
        assert_eq!(join_lines(&["a", "b"], LineEnding::CrLf), "a\r\nb");
        let empty: [&str; 0] = [];
        assert_eq!(join_lines(&empty, LineEnding::Lf), "");
    }
}
