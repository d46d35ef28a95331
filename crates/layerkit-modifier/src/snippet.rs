//! G-code snippets emitted for each modification kind
//!
//! Every snippet is delimited by `; === ... ===` comment markers so edits stay
//! recognisable in the output file.

use serde::{Deserialize, Serialize};

use crate::firmware::Firmware;
use crate::modification::{EjectSettings, ModificationKind};

/// Lift-and-park move performed before a pause when `move_head` is set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParkMove {
    /// Relative Z lift
    pub lift_mm: f64,
    pub x: f64,
    pub y: f64,
}

impl Default for ParkMove {
    fn default() -> Self {
        Self {
            lift_mm: 5.0,
            x: 5.0,
            y: 5.0,
        }
    }
}

/// Settings that shape rendered snippets
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderOptions {
    pub firmware: Firmware,
    pub park: ParkMove,
}

/// Render the lines a modification contributes to the output
pub fn render_snippet(kind: &ModificationKind, options: &RenderOptions) -> Vec<String> {
    match kind {
        ModificationKind::Pause {
            message,
            pause_command,
            move_head,
            ..
        } => pause_snippet(message, pause_command.as_deref(), *move_head, options),
        ModificationKind::FilamentChange { slot, command, .. } => {
            let command = command
                .as_deref()
                .unwrap_or_else(|| options.firmware.default_filament_command());
            filament_snippet(*slot, command)
        }
        ModificationKind::Eject(settings) => eject_snippet(settings),
        ModificationKind::ZOffset {
            start_layer,
            end_layer,
            offset_mm,
            note,
        } => vec![z_offset_marker(*start_layer, *end_layer, *offset_mm, note)],
        ModificationKind::Custom { gcode, .. } => {
            let mut lines = vec!["; === CUSTOM G-CODE ===".to_string()];
            lines.extend(gcode.lines().map(str::to_string));
            lines.push("; === END CUSTOM ===".to_string());
            lines
        }
        ModificationKind::Recovery { resume_layer } => vec![
            format!("; === PRINT RECOVERY: Resume from layer {} ===", resume_layer),
            format!(
                "; Layers below {} removed, Z shifted to bed",
                resume_layer
            ),
            "; === END RECOVERY HEADER ===".to_string(),
        ],
    }
}

fn pause_snippet(
    message: &str,
    command: Option<&str>,
    move_head: bool,
    options: &RenderOptions,
) -> Vec<String> {
    let mut lines = Vec::new();
    if message.is_empty() {
        lines.push("; === PAUSE ===".to_string());
    } else {
        lines.push(format!("; === PAUSE: {} ===", message));
    }
    if move_head {
        let park = &options.park;
        lines.push("G91 ; Relative positioning".to_string());
        lines.push(format!("G1 Z{} F600 ; Lift Z", park.lift_mm));
        lines.push("G90 ; Absolute positioning".to_string());
        lines.push(format!("G1 X{} Y{} F6000 ; Park head", park.x, park.y));
    }
    let command = command.unwrap_or_else(|| options.firmware.default_pause_command());
    lines.push(options.firmware.pause_line(command));
    lines.push("; === END PAUSE ===".to_string());
    lines
}

fn filament_snippet(slot: u32, command: &str) -> Vec<String> {
    if command == "M1020" {
        vec![
            format!("; === FILAMENT CHANGE: Slot {} ===", slot + 1),
            format!("M1020 S{} ; Bambu AMS filament change", slot),
            "; === END FILAMENT CHANGE ===".to_string(),
        ]
    } else {
        vec![
            "; === FILAMENT CHANGE ===".to_string(),
            format!("{} ; Filament change", command),
            "; === END FILAMENT CHANGE ===".to_string(),
        ]
    }
}

fn eject_snippet(settings: &EjectSettings) -> Vec<String> {
    let mut lines = vec![
        "; === AUTO-EJECT SEQUENCE ===".to_string(),
        format!(
            "G1 X5 Y{} Z{} F{} ; Move to eject position",
            settings.bed_y, settings.head_z, settings.feed_rate
        ),
    ];
    if settings.heaters_off {
        lines.push("M104 S0 ; Extruder off".to_string());
        lines.push("M140 S0 ; Bed off".to_string());
    }
    if settings.home_z {
        lines.push("G28 Z ; Home Z".to_string());
    }
    lines.push("M106 S0 ; Fan off".to_string());
    if settings.loop_mode {
        lines.push("; === LOOP MODE ===".to_string());
        lines.push(
            "; Note: True automatic loop requires firmware support or external automation."
                .to_string(),
        );
        lines.push("; The printer will stop here. Restart manually or via automation.".to_string());
    }
    lines.push("; === END AUTO-EJECT ===".to_string());
    lines
}

fn z_offset_marker(start: u32, end: Option<u32>, offset: f64, note: &str) -> String {
    let sign = if offset >= 0.0 { "+" } else { "" };
    let range = match end {
        Some(end) => format!("layers {}-{}", start, end),
        None => format!("layer {} onward", start),
    };
    let note = if note.is_empty() {
        String::new()
    } else {
        format!(" ({})", note)
    };
    format!("; === Z-OFFSET: {}{}mm for {}{} ===", sign, offset, range, note)
}
