//! Line rewriting passes: recovery rewrite and Z-offset adjustment.
//!
//! Both passes edit only the command portion of a line; trailing comments are
//! carried through untouched.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use layerkit_toolpath::words::strip_comment;
use layerkit_toolpath::{GcodeWords, LayerTracker, ToolpathModel};
use regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::modification::ModificationKind;

/// Layer 0 height assumed when the parser found none
const FALLBACK_FIRST_LAYER_Z: f64 = 0.2;

fn z_word_regex() -> &'static Regex {
    static Z_WORD: OnceLock<Regex> = OnceLock::new();
    Z_WORD.get_or_init(|| Regex::new(r"([Zz])(-?\d+\.?\d*|-?\.\d+)").expect("invalid regex pattern"))
}

fn feed_word_regex() -> &'static Regex {
    static FEED_WORD: OnceLock<Regex> = OnceLock::new();
    FEED_WORD.get_or_init(|| Regex::new(r"[Ff]\d*\.?\d+").expect("invalid regex pattern"))
}

fn z_height_comment_regex() -> &'static Regex {
    static Z_HEIGHT: OnceLock<Regex> = OnceLock::new();
    Z_HEIGHT.get_or_init(|| Regex::new(r"^(\s*; Z_HEIGHT:\s*)(\d*\.?\d+)").expect("invalid regex pattern"))
}

fn z_comment_regex() -> &'static Regex {
    static Z_COMMENT: OnceLock<Regex> = OnceLock::new();
    Z_COMMENT.get_or_init(|| Regex::new(r"^(\s*;Z:)(\d*\.?\d+)").expect("invalid regex pattern"))
}

fn layer_count_regex() -> &'static Regex {
    static LAYER_COUNT: OnceLock<Regex> = OnceLock::new();
    LAYER_COUNT.get_or_init(|| {
        Regex::new(r"^(\s*; layer num/total_layer_count:\s*)(\d+)/(\d+)").expect("invalid regex pattern")
    })
}

fn layer_number_regex() -> &'static Regex {
    static LAYER_NUMBER: OnceLock<Regex> = OnceLock::new();
    LAYER_NUMBER.get_or_init(|| {
        Regex::new(r"(?i)^(\s*;LAYER:)(\d+)|^(\s*M73 L)(\d+)|^(\s*M991 S0 P)(\d+)")
            .expect("invalid regex pattern")
    })
}

/// Split a line into its command part and the comment that follows
fn split_comment(line: &str) -> (&str, &str) {
    let code = strip_comment(line);
    (code, &line[code.len()..])
}

/// Rewrite every Z word of a motion line; `None` when the line has no Z
pub fn rewrite_motion_z(line: &str, f: impl Fn(f64) -> f64) -> Option<String> {
    let words = GcodeWords::parse(line)?;
    if !words.is_motion() || !words.has('Z') {
        return None;
    }
    let (code, comment) = split_comment(line);
    let code = z_word_regex().replace_all(code, |caps: &Captures| {
        let value: f64 = caps[2].parse().unwrap_or(0.0);
        format!("{}{:.3}", &caps[1], f(value))
    });
    Some(format!("{}{}", code, comment))
}

/// G0/G1 line that extrudes with an explicit feed rate
fn extrude_feed(line: &str) -> Option<f64> {
    let words = GcodeWords::parse(line)?;
    if words.letter != 'G' || words.code > 1 {
        return None;
    }
    let extrudes = words.get('E').is_some_and(|e| e >= 0.0);
    if !extrudes {
        return None;
    }
    words.get('F')
}

/// Result of the recovery rewrite
#[derive(Debug, Clone)]
pub struct RecoveryOutcome {
    pub lines: Vec<String>,
    /// Index shift from original line numbers to output line numbers for
    /// lines at or after the resume layer
    pub line_shift: isize,
    pub resume_layer: u32,
}

/// Strips the layers below a resume layer and drops the rest onto the bed
///
/// Keeps the preamble (everything before layer 0), emits the recovery header,
/// then every line from the resume layer on with heights shifted down by the
/// resume layer's height above layer 0. Layer numbering in slicer comments and
/// progress commands restarts at zero, and extrusion moves of the new first
/// layer run at the original first layer's feed rate.
#[derive(Debug, Clone)]
pub struct RecoveryRewriter {
    resume_layer: u32,
    header: Vec<String>,
}

impl RecoveryRewriter {
    pub fn new(resume_layer: u32, header: Vec<String>) -> Self {
        Self {
            resume_layer,
            header,
        }
    }

    /// Apply the rewrite, or `None` when the resume layer cannot be used
    pub fn apply(&self, model: &ToolpathModel) -> Option<RecoveryOutcome> {
        let first = model.layers.first()?;
        let Some(resume) = model.get_layer(self.resume_layer) else {
            warn!("Recovery skipped: layer {} not found", self.resume_layer);
            return None;
        };
        let Some(resume_z) = resume.z_height else {
            warn!(
                "Recovery skipped: layer {} has no known height",
                self.resume_layer
            );
            return None;
        };
        let z_shift = resume_z - first.z_height.unwrap_or(FALLBACK_FIRST_LAYER_Z);

        let first_layer_feed = model.lines[first.start_line..=first.end_line]
            .iter()
            .find_map(|line| extrude_feed(line));

        let mut lines: Vec<String> =
            Vec::with_capacity(model.lines.len() - resume.start_line + first.start_line + 3);
        lines.extend(model.lines[..first.start_line].iter().cloned());
        lines.extend(self.header.iter().cloned());
        let remaining_start = lines.len();
        let line_shift = remaining_start as isize - resume.start_line as isize;

        let offset = self.resume_layer as i64;
        let total_remaining = model.layer_count() as i64 - offset;
        let resume_end = remaining_start + resume.line_count() - 1;

        for (i, line) in model.lines[resume.start_line..].iter().enumerate() {
            let mut line = self.renumber(line, z_shift, offset, total_remaining);
            if let Some(feed) = first_layer_feed {
                if remaining_start + i <= resume_end && extrude_feed(&line).is_some() {
                    line = override_feed(&line, feed);
                }
            }
            lines.push(line);
        }

        debug!(
            "Recovery from layer {}: Z shift {:.3}, line shift {}",
            self.resume_layer, z_shift, line_shift
        );

        Some(RecoveryOutcome {
            lines,
            line_shift,
            resume_layer: self.resume_layer,
        })
    }

    fn renumber(&self, line: &str, z_shift: f64, offset: i64, total: i64) -> String {
        if let Some(shifted) = rewrite_motion_z(line, |z| z - z_shift) {
            return shifted;
        }

        let trimmed = line.trim_start();
        if !trimmed.starts_with(';') && !trimmed.starts_with('M') && !trimmed.starts_with('m') {
            return line.to_string();
        }

        for regex in [z_height_comment_regex(), z_comment_regex()] {
            if regex.is_match(line) {
                return regex
                    .replace(line, |caps: &Captures| {
                        let value: f64 = caps[2].parse().unwrap_or(0.0);
                        format!("{}{:.2}", &caps[1], value - z_shift)
                    })
                    .into_owned();
            }
        }

        if layer_count_regex().is_match(line) {
            return layer_count_regex()
                .replace(line, |caps: &Captures| {
                    let n: i64 = caps[2].parse().unwrap_or(0);
                    format!("{}{}/{}", &caps[1], n - offset, total)
                })
                .into_owned();
        }

        layer_number_regex()
            .replace(line, |caps: &Captures| {
                let (prefix, value) = [(1, 2), (3, 4), (5, 6)]
                    .iter()
                    .find_map(|&(p, v)| Some((caps.get(p)?.as_str(), caps.get(v)?.as_str())))
                    .unwrap_or(("", ""));
                let n: i64 = value.parse().unwrap_or(0);
                format!("{}{}", prefix, n - offset)
            })
            .into_owned()
    }
}

fn override_feed(line: &str, feed: f64) -> String {
    let (code, comment) = split_comment(line);
    let code = feed_word_regex().replace(code, format!("F{:.0}", feed).as_str());
    format!("{}{}", code, comment)
}

/// Per-layer Z offsets summed over every queued Z-offset range
#[derive(Debug, Clone, Default)]
pub struct ZOffsetPass {
    offsets: BTreeMap<u32, f64>,
}

impl ZOffsetPass {
    /// Collect offsets for the model's layers from the queued modifications
    pub fn from_modifications<'a>(
        model: &ToolpathModel,
        kinds: impl IntoIterator<Item = &'a ModificationKind>,
    ) -> Self {
        let ranges: Vec<(u32, Option<u32>, f64)> = kinds
            .into_iter()
            .filter_map(|kind| match kind {
                ModificationKind::ZOffset {
                    start_layer,
                    end_layer,
                    offset_mm,
                    ..
                } => Some((*start_layer, *end_layer, *offset_mm)),
                _ => None,
            })
            .collect();

        let mut offsets = BTreeMap::new();
        for layer in &model.layers {
            let total: f64 = ranges
                .iter()
                .filter(|(start, end, _)| {
                    layer.number >= *start && end.is_none_or(|end| layer.number <= end)
                })
                .map(|(_, _, offset)| offset)
                .sum();
            if total != 0.0 {
                offsets.insert(layer.number, total);
            }
        }
        Self { offsets }
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn offset_for(&self, layer: u32) -> Option<f64> {
        self.offsets.get(&layer).copied()
    }

    /// Shift Z words of motion lines in place
    ///
    /// `layer_base` is added to the layer numbers seen in the text, so a
    /// recovery-renumbered file still maps back onto original layers.
    pub fn apply(&self, model: &ToolpathModel, lines: &mut [String], layer_base: u32) {
        if self.is_empty() {
            return;
        }
        let mut tracker = LayerTracker::new(model.marker_style);
        let mut changed = 0usize;
        for line in lines.iter_mut() {
            if tracker.observe(line).is_some() {
                continue;
            }
            let Some(offset) = tracker
                .current()
                .and_then(|n| self.offset_for(n + layer_base))
            else {
                continue;
            };
            if let Some(shifted) = rewrite_motion_z(line, |z| z + offset) {
                *line = shifted;
                changed += 1;
            }
        }
        debug!("Z-offset pass adjusted {} lines", changed);
    }
}
