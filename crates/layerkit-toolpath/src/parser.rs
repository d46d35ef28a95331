//! Toolpath parser with motion and extrusion state tracking

use layerkit_core::{Bounds, Point2D};
use tracing::debug;

use crate::arc::ArcExpander;
use crate::markers::{self, LayerTracker, MarkerStyle};
use crate::model::{Layer, LineEnding, Move, ToolpathModel, UNCLASSIFIED};
use crate::slicer::SlicerKind;
use crate::words::{is_macro_line, GcodeWords};

/// Lines between progress reports
const PROGRESS_INTERVAL: usize = 50_000;

/// Header lines searched for a slicer signature
const SLICER_SCAN_LINES: usize = 400;

/// Motion and extrusion modal state
#[derive(Debug, Clone, Copy)]
struct MotionState {
    position: Point2D,
    /// G91 relative XY positioning
    relative_xy: bool,
    /// M83 relative extrusion
    relative_e: bool,
    last_e: f64,
}

impl Default for MotionState {
    fn default() -> Self {
        Self {
            position: Point2D::default(),
            relative_xy: false,
            relative_e: false,
            last_e: 0.0,
        }
    }
}

impl MotionState {
    /// Apply an E word and return the filament increment
    fn extrusion_delta(&mut self, e: Option<f64>) -> f64 {
        let Some(e) = e else {
            return 0.0;
        };
        if self.relative_e {
            e
        } else {
            let delta = e - self.last_e;
            self.last_e = e;
            delta
        }
    }

    fn target(&self, words: &GcodeWords) -> Point2D {
        let x = words.get('X');
        let y = words.get('Y');
        if self.relative_xy {
            Point2D::new(
                self.position.x + x.unwrap_or(0.0),
                self.position.y + y.unwrap_or(0.0),
            )
        } else {
            Point2D::new(x.unwrap_or(self.position.x), y.unwrap_or(self.position.y))
        }
    }
}

/// Layer under construction
#[derive(Debug)]
struct OpenLayer {
    number: u32,
    start_line: usize,
    comment_z: Option<f64>,
    motion_z: Option<f64>,
    moves: Vec<Move>,
}

impl OpenLayer {
    fn close(self, end_line: usize) -> (Layer, Vec<Move>) {
        (
            Layer {
                number: self.number,
                z_height: self.comment_z.or(self.motion_z),
                start_line: self.start_line,
                end_line,
            },
            self.moves,
        )
    }
}

/// Toolpath parser
#[derive(Debug, Default)]
pub struct ToolpathParser {
    arcs: ArcExpander,
}

impl ToolpathParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom arc expander for G2/G3 linearization
    pub fn with_arc_expander(arcs: ArcExpander) -> Self {
        Self { arcs }
    }

    /// Parse text into a toolpath model
    pub fn parse(&self, text: &str, filename: &str) -> ToolpathModel {
        self.parse_with_progress(text, filename, None)
    }

    /// Parse text, reporting the fraction of lines processed
    pub fn parse_with_progress(
        &self,
        text: &str,
        filename: &str,
        mut progress: Option<&mut dyn FnMut(f64)>,
    ) -> ToolpathModel {
        let line_ending = if text.contains("\r\n") {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        };
        let lines: Vec<String> = text
            .split('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l).to_string())
            .collect();

        let marker_style = MarkerStyle::detect(&lines);
        let mut tracker = LayerTracker::new(marker_style);
        let mut state = MotionState::default();
        let mut feature = UNCLASSIFIED.to_string();
        let mut slicer = SlicerKind::Unknown;
        let mut pending_height: Option<f64> = None;
        let mut open: Option<OpenLayer> = None;
        let mut layers = Vec::new();
        let mut moves = Vec::new();
        let mut bounds = Bounds::new();
        let mut skipped = 0usize;
        let total = lines.len();

        for (idx, line) in lines.iter().enumerate() {
            if idx > 0 && idx % PROGRESS_INTERVAL == 0 {
                if let Some(cb) = progress.as_mut() {
                    cb(idx as f64 / total as f64);
                }
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if trimmed.starts_with(';') || trimmed.starts_with('(') {
                if slicer == SlicerKind::Unknown && idx < SLICER_SCAN_LINES {
                    if let Some(kind) = SlicerKind::from_comment(trimmed) {
                        slicer = kind;
                    }
                }

                if let Some(number) = tracker.observe(trimmed) {
                    if let Some(layer) = open.take() {
                        let (layer, layer_moves) = layer.close(idx - 1);
                        layers.push(layer);
                        moves.push(layer_moves);
                    }
                    open = Some(OpenLayer {
                        number,
                        start_line: idx,
                        comment_z: pending_height.take(),
                        motion_z: None,
                        moves: Vec::new(),
                    });
                    continue;
                }

                if let Some(label) = markers::feature_type(trimmed) {
                    feature = label.to_string();
                } else if let Some(z) = markers::height_comment(trimmed) {
                    pending_height = Some(z);
                    if let Some(layer) = open.as_mut() {
                        if layer.comment_z.is_none() && layer.moves.is_empty() {
                            layer.comment_z = Some(z);
                        }
                    }
                }
                continue;
            }

            let Some(words) = GcodeWords::parse(trimmed) else {
                if !is_macro_line(trimmed) {
                    skipped += 1;
                }
                continue;
            };

            match (words.letter, words.code) {
                ('G', 0..=3) => {
                    if let (Some(z), Some(layer)) = (words.get('Z'), open.as_mut()) {
                        if layer.motion_z.is_none() && !state.relative_xy {
                            layer.motion_z = Some(z);
                        }
                    }

                    let delta = state.extrusion_delta(words.get('E'));
                    if !words.has('X') && !words.has('Y') {
                        continue;
                    }

                    let start = state.position;
                    let end = state.target(&words);
                    state.position = end;
                    pending_height = None;

                    let Some(layer) = open.as_mut() else {
                        continue;
                    };
                    let extrude = delta > 0.0;
                    let path = match (words.code, words.get('I'), words.get('J')) {
                        (2 | 3, i, j) if i.is_some() || j.is_some() => {
                            let center = Point2D::new(
                                start.x + i.unwrap_or(0.0),
                                start.y + j.unwrap_or(0.0),
                            );
                            self.arcs.expand(start, end, center, words.code == 2)
                        }
                        _ => vec![end],
                    };

                    let mut from = start;
                    for to in path {
                        bounds.include(from);
                        bounds.include(to);
                        layer.moves.push(Move {
                            start: from,
                            end: to,
                            extrude,
                            feature: feature.clone(),
                        });
                        from = to;
                    }
                }
                ('G', 90) => state.relative_xy = false,
                ('G', 91) => state.relative_xy = true,
                ('G', 92) => {
                    if let Some(e) = words.get('E') {
                        state.last_e = e;
                    }
                    if words.has('X') || words.has('Y') {
                        state.position = Point2D::new(
                            words.get('X').unwrap_or(state.position.x),
                            words.get('Y').unwrap_or(state.position.y),
                        );
                    }
                }
                ('M', 82) => state.relative_e = false,
                ('M', 83) => state.relative_e = true,
                _ => {}
            }
        }

        if let Some(layer) = open.take() {
            let (layer, layer_moves) = layer.close(total.saturating_sub(1));
            layers.push(layer);
            moves.push(layer_moves);
        }

        if let Some(cb) = progress.as_mut() {
            cb(1.0);
        }

        debug!(
            "Parsed {}: {} lines, {} layers, {} skipped, slicer {}",
            filename,
            total,
            layers.len(),
            skipped,
            slicer
        );

        ToolpathModel {
            filename: filename.to_string(),
            lines,
            layers,
            moves,
            bounds,
            skipped_lines: skipped,
            slicer,
            marker_style,
            line_ending,
        }
    }
}

/// Parse text with the default parser
pub fn parse(text: &str, filename: &str) -> ToolpathModel {
    ToolpathParser::new().parse(text, filename)
}

/// Parse text with the default parser, reporting progress
pub fn parse_with_progress(
    text: &str,
    filename: &str,
    progress: Option<&mut dyn FnMut(f64)>,
) -> ToolpathModel {
    ToolpathParser::new().parse_with_progress(text, filename, progress)
}
