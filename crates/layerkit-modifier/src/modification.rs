//! Queued modification types and their validation

use layerkit_core::ModificationError;
use layerkit_toolpath::ToolpathModel;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::Result;

/// Highest addressable AMS slot (slots are 0-based)
pub const MAX_FILAMENT_SLOT: u32 = 3;

/// Where a point modification is spliced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "TargetRepr", into = "TargetRepr")]
pub enum LayerTarget {
    /// Right after the first line of a layer
    Layer(u32),
    /// End of the file, before the eject sequence
    End,
}

impl fmt::Display for LayerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Layer(n) => write!(f, "layer {}", n),
            Self::End => write!(f, "end"),
        }
    }
}

/// Plan files write targets as a layer number or the word `end`
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum TargetRepr {
    Number(u32),
    Word(String),
}

impl TryFrom<TargetRepr> for LayerTarget {
    type Error = String;

    fn try_from(repr: TargetRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            TargetRepr::Number(n) => Ok(Self::Layer(n)),
            TargetRepr::Word(w) if w.eq_ignore_ascii_case("end") => Ok(Self::End),
            TargetRepr::Word(w) => Err(format!("Invalid layer target: {}", w)),
        }
    }
}

impl From<LayerTarget> for TargetRepr {
    fn from(target: LayerTarget) -> Self {
        match target {
            LayerTarget::Layer(n) => TargetRepr::Number(n),
            LayerTarget::End => TargetRepr::Word("end".to_string()),
        }
    }
}

/// End-of-print eject sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EjectSettings {
    /// Bed Y position to push the part off
    pub bed_y: f64,
    /// Head height during the eject move
    pub head_z: f64,
    /// Feed rate of the eject move (mm/min)
    pub feed_rate: f64,
    pub heaters_off: bool,
    pub home_z: bool,
    /// Annotate the sequence for external looping
    #[serde(rename = "loop")]
    pub loop_mode: bool,
}

impl Default for EjectSettings {
    fn default() -> Self {
        Self {
            bed_y: 200.0,
            head_z: 50.0,
            feed_rate: 3000.0,
            heaters_off: true,
            home_z: false,
            loop_mode: false,
        }
    }
}

impl EjectSettings {
    pub fn validate(&self) -> Result<()> {
        finite("bed Y", self.bed_y)?;
        finite("head Z", self.head_z)?;
        finite("feed rate", self.feed_rate)?;
        if self.bed_y < 0.0 {
            return Err(ModificationError::Negative {
                field: "bed Y",
                value: self.bed_y,
            });
        }
        positive("head Z", self.head_z)?;
        positive("feed rate", self.feed_rate)
    }
}

/// What a modification does
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModificationKind {
    Pause {
        layer: LayerTarget,
        #[serde(default)]
        message: String,
        /// Firmware pause command key; the profile default when absent
        #[serde(default)]
        pause_command: Option<String>,
        /// Lift and park the head before pausing
        #[serde(default)]
        move_head: bool,
    },
    FilamentChange {
        layer: LayerTarget,
        /// 0-based AMS slot, used by `M1020`
        #[serde(default)]
        slot: u32,
        #[serde(default)]
        command: Option<String>,
    },
    Eject(EjectSettings),
    /// Shift Z of every motion line in an inclusive layer range
    ZOffset {
        start_layer: u32,
        /// Last affected layer; open-ended when absent
        #[serde(default)]
        end_layer: Option<u32>,
        offset_mm: f64,
        #[serde(default)]
        note: String,
    },
    Custom {
        layer: LayerTarget,
        gcode: String,
    },
    /// Restart a failed print from a layer, moved down onto the bed
    Recovery {
        resume_layer: u32,
    },
}

impl ModificationKind {
    /// Short type name used in listings
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Pause { .. } => "pause",
            Self::FilamentChange { .. } => "filament_change",
            Self::Eject(_) => "eject",
            Self::ZOffset { .. } => "z_offset",
            Self::Custom { .. } => "custom",
            Self::Recovery { .. } => "recovery",
        }
    }

    /// Kinds of which at most one may be queued
    pub fn is_singleton(&self) -> bool {
        matches!(self, Self::Eject(_) | Self::Recovery { .. })
    }

    /// Splice target of point modifications
    pub fn splice_target(&self) -> Option<LayerTarget> {
        match self {
            Self::Pause { layer, .. }
            | Self::FilamentChange { layer, .. }
            | Self::Custom { layer, .. } => Some(*layer),
            Self::ZOffset { start_layer, .. } => Some(LayerTarget::Layer(*start_layer)),
            Self::Eject(_) | Self::Recovery { .. } => None,
        }
    }

    /// Check the modification against the toolpath it will be applied to
    pub fn validate(&self, model: &ToolpathModel) -> Result<()> {
        match self {
            Self::Pause {
                layer,
                pause_command,
                ..
            } => {
                check_target(model, *layer)?;
                if pause_command.as_deref().is_some_and(|c| c.trim().is_empty()) {
                    return Err(ModificationError::Empty {
                        field: "pause command",
                    });
                }
                Ok(())
            }
            Self::FilamentChange {
                layer,
                slot,
                command,
            } => {
                check_target(model, *layer)?;
                if *slot > MAX_FILAMENT_SLOT {
                    return Err(ModificationError::SlotOutOfRange {
                        slot: *slot,
                        max: MAX_FILAMENT_SLOT,
                    });
                }
                if command.as_deref().is_some_and(|c| c.trim().is_empty()) {
                    return Err(ModificationError::Empty {
                        field: "filament command",
                    });
                }
                Ok(())
            }
            Self::Eject(settings) => settings.validate(),
            Self::ZOffset {
                start_layer,
                end_layer,
                offset_mm,
                ..
            } => {
                finite("Z-offset", *offset_mm)?;
                if *offset_mm == 0.0 {
                    return Err(ModificationError::ZeroOffset);
                }
                check_layer(model, *start_layer)?;
                if let Some(end) = *end_layer {
                    if end < *start_layer {
                        return Err(ModificationError::EndBeforeStart {
                            start: *start_layer,
                            end,
                        });
                    }
                    check_layer(model, end)?;
                }
                Ok(())
            }
            Self::Custom { layer, gcode } => {
                check_target(model, *layer)?;
                if gcode.trim().is_empty() {
                    return Err(ModificationError::Empty { field: "G-code" });
                }
                Ok(())
            }
            Self::Recovery { resume_layer } => check_layer(model, *resume_layer),
        }
    }
}

/// A queued modification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modification {
    pub id: String,
    #[serde(flatten)]
    pub kind: ModificationKind,
}

impl Modification {
    pub fn new(kind: ModificationKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
        }
    }
}

fn check_layer(model: &ToolpathModel, layer: u32) -> Result<()> {
    if !model.is_sliced() {
        return Err(ModificationError::NoLayers);
    }
    if model.get_layer(layer).is_none() {
        return Err(ModificationError::LayerNotFound { layer });
    }
    Ok(())
}

fn check_target(model: &ToolpathModel, target: LayerTarget) -> Result<()> {
    match target {
        LayerTarget::Layer(n) => check_layer(model, n),
        LayerTarget::End => Ok(()),
    }
}

fn finite(field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ModificationError::NotFinite { field })
    }
}

fn positive(field: &'static str, value: f64) -> Result<()> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ModificationError::NotPositive { field, value })
    }
}
