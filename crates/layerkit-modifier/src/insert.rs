//! Insert planning: pause the print once a hole is deep enough for an insert

use layerkit_core::InsertError;
use layerkit_holes::{FloorStatus, Hole};
use layerkit_toolpath::ToolpathModel;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::Modifier;
use crate::modification::LayerTarget;

/// Hardware dropped into a hole during a pause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertSpec {
    /// Name shown in the pause message (`magnet`, `M3 nut`)
    #[serde(default)]
    pub label: Option<String>,
    pub height_mm: f64,
    pub diameter_mm: f64,
    #[serde(default)]
    pub pause_command: Option<String>,
    #[serde(default)]
    pub move_head: bool,
}

impl InsertSpec {
    fn validate(&self) -> Result<(), InsertError> {
        for (field, value) in [("height", self.height_mm), ("diameter", self.diameter_mm)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(InsertError::InvalidDimension { field, value });
            }
        }
        Ok(())
    }

    fn message(&self, hole_id: &str) -> String {
        format!(
            "Insert {} ({}mm dia, {}mm tall) at hole #{}",
            self.label.as_deref().unwrap_or("object"),
            self.diameter_mm,
            self.height_mm,
            hole_id
        )
    }
}

/// Where an insert would be placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InsertOutcome {
    /// Pause before printing this layer
    Planned { layer: u32 },
    /// Hole has no floor to rest the insert on
    ThroughHole,
    /// Floor not traced, or its height is unknown
    DepthUnknown,
    /// Insert reaches above the last layer
    TallerThanPrint,
}

/// An insert that was turned into a pause
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsertRecord {
    pub hole_id: String,
    pub modification_id: String,
    pub pause_layer: u32,
    pub height_mm: f64,
    pub diameter_mm: f64,
    pub label: Option<String>,
}

/// Plans insert pauses and remembers which pause belongs to which hole
#[derive(Debug, Clone, Default)]
pub struct InsertPlanner {
    records: Vec<InsertRecord>,
}

impl InsertPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[InsertRecord] {
        &self.records
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Layer at which an insert of `height_mm` sitting on the hole floor is
    /// fully enclosed by the walls printed so far
    pub fn plan(
        &self,
        model: &ToolpathModel,
        hole: &Hole,
        height_mm: f64,
    ) -> Result<InsertOutcome, InsertError> {
        if !height_mm.is_finite() || height_mm <= 0.0 {
            return Err(InsertError::InvalidDimension {
                field: "height",
                value: height_mm,
            });
        }
        let floor = match hole.floor {
            FloorStatus::ThroughHole => return Ok(InsertOutcome::ThroughHole),
            FloorStatus::NotAnalyzed => return Ok(InsertOutcome::DepthUnknown),
            FloorStatus::Floor(layer) => layer,
        };
        let Some(floor_z) = model.get_layer(floor).and_then(|l| l.z_height) else {
            return Ok(InsertOutcome::DepthUnknown);
        };
        Ok(model
            .first_layer_at_or_above(floor_z + height_mm)
            .map_or(InsertOutcome::TallerThanPrint, |l| InsertOutcome::Planned {
                layer: l.number,
            }))
    }

    /// Plan an insert and queue its pause when placement is possible
    pub fn apply(
        &mut self,
        modifier: &mut Modifier,
        model: &ToolpathModel,
        hole: &Hole,
        spec: &InsertSpec,
    ) -> Result<InsertOutcome, InsertError> {
        spec.validate()?;
        let outcome = self.plan(model, hole, spec.height_mm)?;
        let InsertOutcome::Planned { layer } = outcome else {
            info!("No insert pause for hole {}: {:?}", hole.id, outcome);
            return Ok(outcome);
        };

        let modification = modifier.add_pause(
            model,
            LayerTarget::Layer(layer),
            spec.message(&hole.id),
            spec.pause_command.clone(),
            spec.move_head,
        )?;
        self.records.push(InsertRecord {
            hole_id: hole.id.clone(),
            modification_id: modification.id,
            pause_layer: layer,
            height_mm: spec.height_mm,
            diameter_mm: spec.diameter_mm,
            label: spec.label.clone(),
        });
        Ok(outcome)
    }

    /// Apply the same insert to several holes, skipping those that cannot
    /// take it; returns the outcome per hole id
    pub fn apply_to_holes<'a>(
        &mut self,
        modifier: &mut Modifier,
        model: &ToolpathModel,
        holes: impl IntoIterator<Item = &'a Hole>,
        spec: &InsertSpec,
    ) -> Result<Vec<(String, InsertOutcome)>, InsertError> {
        spec.validate()?;
        let mut outcomes = Vec::new();
        for hole in holes {
            let outcome = self.apply(modifier, model, hole, spec)?;
            outcomes.push((hole.id.clone(), outcome));
        }
        Ok(outcomes)
    }
}
