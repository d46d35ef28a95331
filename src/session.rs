//! Headless editing session
//!
//! A [`Session`] owns one parsed toolpath together with the hole detector and
//! modification queue built against it. Loading a new file replaces all of
//! them at once, so cached grids and queued edits never refer to a stale model.

use std::path::Path;

use anyhow::{anyhow, Context};
use layerkit_core::{Point2D, ProgressFn};
use layerkit_holes::{Hole, HoleDetector};
use layerkit_modifier::{
    InsertOutcome, InsertPlanner, InsertRecord, InsertSpec, Modification, ModificationKind,
    Modifier,
};
use layerkit_settings::Config;
use layerkit_toolpath::{SourceFormat, ToolpathFileReader, ToolpathModel, ToolpathParser};
use tracing::{debug, info};

use crate::plan::EditPlan;

/// Loaded toolpath plus everything derived from it
pub struct Session {
    config: Config,
    model: ToolpathModel,
    format: SourceFormat,
    file_size: u64,
    detector: HoleDetector,
    modifier: Modifier,
    inserts: InsertPlanner,
}

impl Session {
    /// Read, decode and parse a toolpath file
    pub fn open(path: &Path, config: Config) -> anyhow::Result<Self> {
        let loaded = ToolpathFileReader::new(path)?.read(None)?;
        let model = loaded.parse(&ToolpathParser::new());
        info!(
            "Parsed {}: {} layers, {} moves, slicer {}",
            model.filename,
            model.layer_count(),
            model.total_moves(),
            model.slicer
        );
        Ok(Self::build(config, model, loaded.format, loaded.file_size))
    }

    /// Session over in-memory G-code text
    pub fn from_text(text: &str, filename: &str, config: Config) -> Self {
        let model = ToolpathParser::new().parse(text, filename);
        let size = text.len() as u64;
        Self::build(config, model, SourceFormat::Text, size)
    }

    fn build(config: Config, model: ToolpathModel, format: SourceFormat, file_size: u64) -> Self {
        Self {
            detector: HoleDetector::with_config(config.detection.detector_config()),
            modifier: Modifier::with_options(config.output.render_options()),
            inserts: InsertPlanner::new(),
            config,
            model,
            format,
            file_size,
        }
    }

    /// Replace the loaded file; detections and queued edits are discarded
    pub fn load(&mut self, path: &Path) -> anyhow::Result<()> {
        *self = Self::open(path, self.config.clone())?;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn model(&self) -> &ToolpathModel {
        &self.model
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn modifier(&self) -> &Modifier {
        &self.modifier
    }

    pub fn modifications(&self) -> &[Modification] {
        self.modifier.list()
    }

    pub fn insert_records(&self) -> &[InsertRecord] {
        self.inserts.records()
    }

    /// Detect holes on one layer with the configured diameter and infill settings
    pub fn detect_holes(&mut self, layer: u32) -> Vec<Hole> {
        let detection = &self.config.detection;
        self.detector.detect_holes(
            &self.model,
            layer,
            detection.min_diameter_mm,
            detection.ignore_infill,
        )
    }

    /// Scan every layer; the merged holes are kept for insert placement
    pub fn scan_holes(&mut self, progress: Option<ProgressFn<'_>>) -> Vec<Hole> {
        let detection = &self.config.detection;
        self.detector.scan_all_layers(
            &self.model,
            detection.min_diameter_mm,
            detection.ignore_infill,
            progress,
        )
    }

    /// Hole under `point` among those already detected on `layer`
    pub fn find_hole_at_point(&self, layer: u32, point: Point2D) -> Option<&Hole> {
        self.detector.find_hole_at_point(layer, point)
    }

    pub fn add_modification(&mut self, kind: ModificationKind) -> anyhow::Result<Modification> {
        Ok(self.modifier.add(kind, &self.model)?)
    }

    pub fn remove_modification(&mut self, id: &str) -> anyhow::Result<Modification> {
        Ok(self.modifier.remove(id)?)
    }

    /// Queue the configured eject sequence
    pub fn add_eject(&mut self) -> anyhow::Result<Modification> {
        let eject = self.config.eject.clone();
        self.add_modification(ModificationKind::Eject(eject))
    }

    /// Plan inserts into scanned holes; an empty id list selects every hole
    ///
    /// Runs a whole-print scan first when none has been done.
    pub fn place_inserts(
        &mut self,
        spec: &InsertSpec,
        hole_ids: &[String],
    ) -> anyhow::Result<Vec<(String, InsertOutcome)>> {
        if self.detector.unique_holes().is_empty() {
            self.scan_holes(None);
        }

        let scanned = self.detector.unique_holes();
        let holes: Vec<&Hole> = if hole_ids.is_empty() {
            scanned.iter().collect()
        } else {
            hole_ids
                .iter()
                .map(|id| {
                    scanned
                        .iter()
                        .find(|h| &h.id == id)
                        .ok_or_else(|| anyhow!("No scanned hole with id {}", id))
                })
                .collect::<anyhow::Result<_>>()?
        };

        let outcomes =
            self.inserts
                .apply_to_holes(&mut self.modifier, &self.model, holes, spec)?;
        Ok(outcomes)
    }

    /// Queue everything an edit plan asks for, in plan order
    pub fn apply_plan(&mut self, plan: &EditPlan) -> anyhow::Result<()> {
        for kind in &plan.modifications {
            let added = self
                .add_modification(kind.clone())
                .with_context(|| format!("Plan entry {} rejected", kind.type_name()))?;
            debug!("Queued {} ({})", kind.type_name(), added.id);
        }
        for request in &plan.inserts {
            for (hole_id, outcome) in self.place_inserts(&request.insert, &request.hole_ids)? {
                debug!("Insert into {}: {:?}", hole_id, outcome);
            }
        }
        if plan.eject {
            self.add_eject()?;
        }
        info!("Plan queued {} modifications", self.modifier.len());
        Ok(())
    }

    /// Output text with every queued modification spliced in
    pub fn render_text(&self) -> String {
        self.modifier.render_text(&self.model)
    }

    pub fn write_output(&self, path: &Path) -> anyhow::Result<()> {
        let text = self.render_text();
        std::fs::write(path, &text)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote {} ({} bytes)", path.display(), text.len());
        Ok(())
    }
}
