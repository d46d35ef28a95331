//! Slicer comment conventions: layer boundaries, feature types, layer heights.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

fn layer_regex() -> &'static Regex {
    static LAYER_REGEX: OnceLock<Regex> = OnceLock::new();
    LAYER_REGEX.get_or_init(|| Regex::new(r"(?i)^;LAYER:(\d+)").expect("invalid regex pattern"))
}

fn layer_count_regex() -> &'static Regex {
    static LAYER_COUNT_REGEX: OnceLock<Regex> = OnceLock::new();
    LAYER_COUNT_REGEX.get_or_init(|| {
        Regex::new(r"^; layer num/total_layer_count:\s*(\d+)/(\d+)").expect("invalid regex pattern")
    })
}

fn feature_regex() -> &'static Regex {
    static FEATURE_REGEX: OnceLock<Regex> = OnceLock::new();
    FEATURE_REGEX.get_or_init(|| {
        Regex::new(r"(?i)^;\s*(?:TYPE:|FEATURE:|feature\s+)\s*(.+)$").expect("invalid regex pattern")
    })
}

fn height_regex() -> &'static Regex {
    static HEIGHT_REGEX: OnceLock<Regex> = OnceLock::new();
    HEIGHT_REGEX.get_or_init(|| {
        Regex::new(r"^;(?:Z:| Z_HEIGHT:)\s*([-\d.]+)").expect("invalid regex pattern")
    })
}

/// Which family of layer markers a file uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MarkerStyle {
    /// `;LAYER:N` or `; layer num/total_layer_count: N/M`
    #[default]
    Numbered,
    /// Unnumbered `;LAYER_CHANGE`, counted from zero
    LayerChange,
}

impl MarkerStyle {
    /// Pick the style for a whole file: numbered markers win when present
    pub fn detect<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut saw_layer_change = false;
        for line in lines {
            let trimmed = line.as_ref().trim();
            if !trimmed.starts_with(';') {
                continue;
            }
            if numbered_marker(trimmed).is_some() {
                return MarkerStyle::Numbered;
            }
            if is_layer_change(trimmed) {
                saw_layer_change = true;
            }
        }
        if saw_layer_change {
            MarkerStyle::LayerChange
        } else {
            MarkerStyle::Numbered
        }
    }
}

/// Layer ordinal of a numbered marker on a trimmed line
///
/// `; layer num/total_layer_count:` is 1-based and converted to 0-based.
pub fn numbered_marker(trimmed: &str) -> Option<u32> {
    if let Some(caps) = layer_regex().captures(trimmed) {
        return caps.get(1)?.as_str().parse().ok();
    }
    let caps = layer_count_regex().captures(trimmed)?;
    let n: u32 = caps.get(1)?.as_str().parse().ok()?;
    Some(n.saturating_sub(1))
}

pub fn is_layer_change(trimmed: &str) -> bool {
    trimmed.eq_ignore_ascii_case(";LAYER_CHANGE")
}

/// Feature label of a feature-type comment (`;TYPE:WALL-OUTER`, `; FEATURE: Outer wall`)
pub fn feature_type(trimmed: &str) -> Option<&str> {
    feature_regex()
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

/// Height of a height comment (`;Z:0.2`, `; Z_HEIGHT: 0.2`)
pub fn height_comment(trimmed: &str) -> Option<f64> {
    height_regex()
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Follows layer boundaries through a stream of lines
///
/// Feed every line in order; [`LayerTracker::observe`] reports the new layer
/// number whenever a line opens a layer. Between markers,
/// [`LayerTracker::current`] holds the layer the stream is in.
#[derive(Debug, Clone)]
pub struct LayerTracker {
    style: MarkerStyle,
    current: Option<u32>,
    changes_seen: u32,
}

impl LayerTracker {
    pub fn new(style: MarkerStyle) -> Self {
        Self {
            style,
            current: None,
            changes_seen: 0,
        }
    }

    /// Layer the stream is currently in, `None` before the first marker
    pub fn current(&self) -> Option<u32> {
        self.current
    }

    /// Observe one line; returns the layer number when the line opens a layer
    ///
    /// A numbered marker that does not exceed the current layer is ignored.
    pub fn observe(&mut self, line: &str) -> Option<u32> {
        let trimmed = line.trim();
        if !trimmed.starts_with(';') {
            return None;
        }
        let number = match self.style {
            MarkerStyle::Numbered => numbered_marker(trimmed)?,
            MarkerStyle::LayerChange => {
                if !is_layer_change(trimmed) {
                    return None;
                }
                let n = self.changes_seen;
                self.changes_seen += 1;
                n
            }
        };
        if let Some(current) = self.current.filter(|current| number <= *current) {
            warn!(
                "Ignoring out-of-order layer marker {} after layer {}",
                number, current
            );
            return None;
        }
        self.current = Some(number);
        Some(number)
    }
}
