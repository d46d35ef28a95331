//! Modification queue and the render pipeline

use std::collections::BTreeMap;

use layerkit_core::ModificationError;
use layerkit_toolpath::model::join_lines;
use layerkit_toolpath::ToolpathModel;
use tracing::{debug, info, warn};

use crate::modification::{EjectSettings, LayerTarget, Modification, ModificationKind};
use crate::rewrite::{RecoveryRewriter, ZOffsetPass};
use crate::snippet::{render_snippet, RenderOptions};
use crate::Result;

/// Ordered queue of modifications for one toolpath
///
/// Every mutating call validates first and leaves the queue untouched on
/// error. Queue order decides the order of snippets that share a target
/// layer.
#[derive(Debug, Clone, Default)]
pub struct Modifier {
    modifications: Vec<Modification>,
    options: RenderOptions,
}

impl Modifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: RenderOptions) -> Self {
        Self {
            modifications: Vec::new(),
            options,
        }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: RenderOptions) {
        self.options = options;
    }

    pub fn list(&self) -> &[Modification] {
        &self.modifications
    }

    pub fn len(&self) -> usize {
        self.modifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modifications.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Modification> {
        self.modifications.iter().find(|m| m.id == id)
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.modifications
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| ModificationError::NotFound { id: id.to_string() })
    }

    /// Validate and queue a modification
    ///
    /// Eject and recovery are singletons: adding one replaces the queued one.
    pub fn add(&mut self, kind: ModificationKind, model: &ToolpathModel) -> Result<Modification> {
        kind.validate(model)?;
        if kind.is_singleton() {
            let name = kind.type_name();
            self.modifications.retain(|m| m.kind.type_name() != name);
        }
        let modification = Modification::new(kind);
        debug!(
            "Queued {} modification {}",
            modification.kind.type_name(),
            modification.id
        );
        self.modifications.push(modification.clone());
        Ok(modification)
    }

    pub fn add_pause(
        &mut self,
        model: &ToolpathModel,
        layer: LayerTarget,
        message: impl Into<String>,
        pause_command: Option<String>,
        move_head: bool,
    ) -> Result<Modification> {
        self.add(
            ModificationKind::Pause {
                layer,
                message: message.into(),
                pause_command,
                move_head,
            },
            model,
        )
    }

    pub fn add_filament_change(
        &mut self,
        model: &ToolpathModel,
        layer: LayerTarget,
        slot: u32,
        command: Option<String>,
    ) -> Result<Modification> {
        self.add(
            ModificationKind::FilamentChange {
                layer,
                slot,
                command,
            },
            model,
        )
    }

    pub fn add_eject(
        &mut self,
        model: &ToolpathModel,
        settings: EjectSettings,
    ) -> Result<Modification> {
        self.add(ModificationKind::Eject(settings), model)
    }

    pub fn add_z_offset(
        &mut self,
        model: &ToolpathModel,
        start_layer: u32,
        end_layer: Option<u32>,
        offset_mm: f64,
        note: impl Into<String>,
    ) -> Result<Modification> {
        self.add(
            ModificationKind::ZOffset {
                start_layer,
                end_layer,
                offset_mm,
                note: note.into(),
            },
            model,
        )
    }

    pub fn add_custom(
        &mut self,
        model: &ToolpathModel,
        layer: LayerTarget,
        gcode: impl Into<String>,
    ) -> Result<Modification> {
        self.add(
            ModificationKind::Custom {
                layer,
                gcode: gcode.into(),
            },
            model,
        )
    }

    pub fn add_recovery(&mut self, model: &ToolpathModel, resume_layer: u32) -> Result<Modification> {
        self.add(ModificationKind::Recovery { resume_layer }, model)
    }

    /// Replace the kind of a queued modification, keeping its id and position
    pub fn update(
        &mut self,
        id: &str,
        kind: ModificationKind,
        model: &ToolpathModel,
    ) -> Result<Modification> {
        let index = self.position(id)?;
        kind.validate(model)?;
        if kind.is_singleton() {
            let name = kind.type_name();
            let keep = id.to_string();
            self.modifications
                .retain(|m| m.id == keep || m.kind.type_name() != name);
        }
        let index = self.position(id).unwrap_or(index);
        self.modifications[index].kind = kind;
        Ok(self.modifications[index].clone())
    }

    pub fn remove(&mut self, id: &str) -> Result<Modification> {
        let index = self.position(id)?;
        Ok(self.modifications.remove(index))
    }

    /// Move `from_id` to the queue position currently held by `to_id`
    pub fn reorder(&mut self, from_id: &str, to_id: &str) -> Result<()> {
        let from = self.position(from_id)?;
        let to = self.position(to_id)?;
        let item = self.modifications.remove(from);
        self.modifications.insert(to, item);
        Ok(())
    }

    /// Swap with the previous entry; no-op at the front
    pub fn move_up(&mut self, id: &str) -> Result<()> {
        let index = self.position(id)?;
        if index > 0 {
            self.modifications.swap(index - 1, index);
        }
        Ok(())
    }

    /// Swap with the next entry; no-op at the back
    pub fn move_down(&mut self, id: &str) -> Result<()> {
        let index = self.position(id)?;
        if index + 1 < self.modifications.len() {
            self.modifications.swap(index, index + 1);
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.modifications.clear();
    }

    /// Render the modified toolpath as lines
    ///
    /// The model is never mutated; rendering twice gives identical output.
    pub fn render(&self, model: &ToolpathModel) -> Vec<String> {
        // 1. Recovery rewrite
        let recovery = self.modifications.iter().find_map(|m| match &m.kind {
            ModificationKind::Recovery { resume_layer } => Some((*resume_layer, &m.kind)),
            _ => None,
        });
        let recovered = recovery.and_then(|(resume, kind)| {
            RecoveryRewriter::new(resume, render_snippet(kind, &self.options)).apply(model)
        });
        let recovery_applied = recovered.is_some();
        let (mut lines, line_shift, layer_base) = match recovered {
            Some(outcome) => (outcome.lines, outcome.line_shift, outcome.resume_layer),
            None => (model.lines.clone(), 0, 0),
        };

        // 2. Z offsets
        let z_pass = ZOffsetPass::from_modifications(model, self.modifications.iter().map(|m| &m.kind));
        z_pass.apply(model, &mut lines, layer_base);

        // 3. Point modifications, grouped per target in queue order
        let mut blocks: BTreeMap<LayerTarget, Vec<String>> = BTreeMap::new();
        for modification in &self.modifications {
            let Some(target) = modification.kind.splice_target() else {
                continue;
            };
            blocks
                .entry(target)
                .or_default()
                .extend(render_snippet(&modification.kind, &self.options));
        }

        for (target, block) in blocks.into_iter().rev() {
            let at = match target {
                LayerTarget::End => lines.len(),
                LayerTarget::Layer(number) => {
                    if recovery_applied && number < layer_base {
                        debug!("Skipping edits for layer {} removed by recovery", number);
                        continue;
                    }
                    let Some(layer) = model.get_layer(number) else {
                        warn!("Skipping edits for missing layer {}", number);
                        continue;
                    };
                    let at = layer.start_line as isize + 1 + line_shift;
                    match usize::try_from(at) {
                        Ok(at) if at <= lines.len() => at,
                        _ => {
                            warn!("Insertion point for layer {} is out of range", number);
                            continue;
                        }
                    }
                }
            };
            lines.splice(at..at, block);
        }

        // 4. Eject last
        for modification in &self.modifications {
            if let ModificationKind::Eject(_) = modification.kind {
                lines.extend(render_snippet(&modification.kind, &self.options));
            }
        }

        info!(
            "Rendered {} modifications: {} -> {} lines",
            self.modifications.len(),
            model.lines.len(),
            lines.len()
        );
        lines
    }

    /// Render the modified toolpath as text with the source line endings
    pub fn render_text(&self, model: &ToolpathModel) -> String {
        join_lines(&self.render(model), model.line_ending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layerkit_toolpath::parse;

    fn model() -> ToolpathModel {
        parse(
            "; header\n;LAYER:0\nG1 X10 Y10 Z0.2 E1\n;LAYER:1\nG1 X20 Y20 Z0.4 E2\n;LAYER:2\nG1 X30 Y30 Z0.6 E3\n",
            "three.gcode",
        )
    }

    #[test]
    fn test_failed_add_leaves_queue_untouched() {
        let model = model();
        let mut modifier = Modifier::new();
        modifier
            .add_custom(&model, LayerTarget::Layer(1), "M117 a")
            .unwrap();
        let err = modifier.add_z_offset(&model, 0, None, 0.0, "").unwrap_err();
        assert_eq!(err, ModificationError::ZeroOffset);
        assert_eq!(modifier.len(), 1);
    }

    #[test]
    fn test_singletons_replace() {
        let model = model();
        let mut modifier = Modifier::new();
        modifier.add_eject(&model, EjectSettings::default()).unwrap();
        modifier
            .add_eject(
                &model,
                EjectSettings {
                    bed_y: 150.0,
                    ..EjectSettings::default()
                },
            )
            .unwrap();
        modifier.add_recovery(&model, 1).unwrap();
        modifier.add_recovery(&model, 2).unwrap();

        assert_eq!(modifier.len(), 2);
        let ejects: Vec<_> = modifier
            .list()
            .iter()
            .filter_map(|m| match &m.kind {
                ModificationKind::Eject(s) => Some(s.bed_y),
                _ => None,
            })
            .collect();
        assert_eq!(ejects, vec![150.0]);
        assert!(modifier
            .list()
            .iter()
            .any(|m| m.kind == ModificationKind::Recovery { resume_layer: 2 }));
    }

    #[test]
    fn test_reorder_and_moves() {
        let model = model();
        let mut modifier = Modifier::new();
        let a = modifier.add_custom(&model, LayerTarget::Layer(0), "M117 a").unwrap();
        let b = modifier.add_custom(&model, LayerTarget::Layer(0), "M117 b").unwrap();
        let c = modifier.add_custom(&model, LayerTarget::Layer(0), "M117 c").unwrap();

        modifier.reorder(&c.id, &a.id).unwrap();
        let ids: Vec<_> = modifier.list().iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, vec![c.id.clone(), a.id.clone(), b.id.clone()]);

        modifier.move_up(&c.id).unwrap();
        modifier.move_down(&b.id).unwrap();
        assert_eq!(modifier.list()[0].id, c.id);
        assert_eq!(modifier.list()[2].id, b.id);

        modifier.move_down(&a.id).unwrap();
        assert_eq!(modifier.list()[2].id, a.id);

        assert!(matches!(
            modifier.move_up("missing"),
            Err(ModificationError::NotFound { .. })
        ));
    }

    #[test]
    fn test_update_and_remove() {
        let model = model();
        let mut modifier = Modifier::new();
        let m = modifier.add_custom(&model, LayerTarget::Layer(0), "M117 a").unwrap();
        let updated = modifier
            .update(
                &m.id,
                ModificationKind::Custom {
                    layer: LayerTarget::Layer(2),
                    gcode: "M117 b".to_string(),
                },
                &model,
            )
            .unwrap();
        assert_eq!(updated.id, m.id);
        assert_eq!(updated.kind.splice_target(), Some(LayerTarget::Layer(2)));

        let bad = ModificationKind::Custom {
            layer: LayerTarget::Layer(9),
            gcode: "M117".to_string(),
        };
        assert!(modifier.update(&m.id, bad, &model).is_err());
        assert_eq!(modifier.get(&m.id).map(|m| &m.kind), Some(&updated.kind));

        modifier.remove(&m.id).unwrap();
        assert!(modifier.is_empty());
        assert!(modifier.remove(&m.id).is_err());
    }

    #[test]
    fn test_same_layer_block_keeps_queue_order() {
        let model = model();
        let mut modifier = Modifier::new();
        modifier.add_custom(&model, LayerTarget::Layer(1), "M117 first").unwrap();
        modifier.add_custom(&model, LayerTarget::Layer(1), "M117 second").unwrap();
        let lines = modifier.render(&model);

        let first = lines.iter().position(|l| l == "M117 first").unwrap();
        let second = lines.iter().position(|l| l == "M117 second").unwrap();
        assert!(first < second);
        assert_eq!(lines[first - 2], ";LAYER:1");
    }

    #[test]
    fn test_render_does_not_touch_model() {
        let model = model();
        let mut modifier = Modifier::new();
        modifier.add_z_offset(&model, 0, None, 0.1, "").unwrap();
        let once = modifier.render(&model);
        let twice = modifier.render(&model);
        assert_eq!(once, twice);
        assert_eq!(model.lines[2], "G1 X10 Y10 Z0.2 E1");
    }
}
