//! Slicer dialect detection from header comments.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Originating slicer, used for labeling only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SlicerKind {
    PrusaSlicer,
    SuperSlicer,
    OrcaSlicer,
    BambuStudio,
    Cura,
    Simplify3D,
    #[default]
    Unknown,
}

impl SlicerKind {
    /// Identify the slicer from a single comment line
    pub fn from_comment(trimmed: &str) -> Option<Self> {
        if !trimmed.starts_with(';') {
            return None;
        }
        let lower = trimmed.to_ascii_lowercase();
        if lower.contains("superslicer") {
            Some(SlicerKind::SuperSlicer)
        } else if lower.contains("prusaslicer") {
            Some(SlicerKind::PrusaSlicer)
        } else if lower.contains("orcaslicer") {
            Some(SlicerKind::OrcaSlicer)
        } else if lower.contains("bambustudio") || lower.contains("bambu studio") {
            Some(SlicerKind::BambuStudio)
        } else if lower.contains("cura_steamengine") || lower.starts_with(";flavor:") {
            Some(SlicerKind::Cura)
        } else if lower.contains("simplify3d") {
            Some(SlicerKind::Simplify3D)
        } else {
            None
        }
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            SlicerKind::PrusaSlicer => "PrusaSlicer",
            SlicerKind::SuperSlicer => "SuperSlicer",
            SlicerKind::OrcaSlicer => "OrcaSlicer",
            SlicerKind::BambuStudio => "Bambu Studio",
            SlicerKind::Cura => "Cura",
            SlicerKind::Simplify3D => "Simplify3D",
            SlicerKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for SlicerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection() {
        assert_eq!(
            SlicerKind::from_comment("; generated by PrusaSlicer 2.7.1 on 2024-01-01"),
            Some(SlicerKind::PrusaSlicer)
        );
        assert_eq!(
            SlicerKind::from_comment("; generated by SuperSlicer 2.5 based on PrusaSlicer"),
            Some(SlicerKind::SuperSlicer)
        );
        assert_eq!(
            SlicerKind::from_comment("; BambuStudio 01.08.00.62"),
            Some(SlicerKind::BambuStudio)
        );
        assert_eq!(
            SlicerKind::from_comment(";Generated with Cura_SteamEngine 5.6.0"),
            Some(SlicerKind::Cura)
        );
        assert_eq!(SlicerKind::from_comment(";FLAVOR:Marlin"), Some(SlicerKind::Cura));
        assert_eq!(SlicerKind::from_comment("G1 X1 ; PrusaSlicer"), None);
        assert_eq!(SlicerKind::from_comment(";LAYER:0"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(SlicerKind::BambuStudio.to_string(), "Bambu Studio");
        assert_eq!(SlicerKind::default(), SlicerKind::Unknown);
    }
}
