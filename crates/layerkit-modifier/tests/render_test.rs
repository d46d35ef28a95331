use layerkit_core::{Bounds, InsertError, ModificationError, Point2D};
use layerkit_holes::{FloorStatus, Hole, HoleShape};
use layerkit_modifier::{
    EjectSettings, Firmware, InsertOutcome, InsertPlanner, InsertSpec, LayerTarget, Modifier,
    ModificationKind, ParkMove, RenderOptions,
};
use layerkit_toolpath::{parse, ToolpathModel};
use proptest::prelude::*;

fn model_from(lines: &[&str]) -> ToolpathModel {
    parse(&lines.join("\n"), "test.gcode")
}

/// Preamble plus `layers` numbered layers, 0.2 mm apart
fn layered(layers: u32) -> ToolpathModel {
    let mut text = String::from("; generated\nG28\nM83\n");
    for n in 0..layers {
        let z = 0.2 * (n + 1) as f64;
        text.push_str(&format!(";LAYER:{}\n", n));
        text.push_str(&format!("M73 L{}\n", n));
        text.push_str(&format!(";Z:{:.1}\n", z));
        text.push_str(&format!("G1 Z{:.1} F600\n", z));
        let feed = if n == 0 { 1200 } else { 3000 };
        text.push_str(&format!("G1 X{} Y5 E1 F{}\n", n + 5, feed));
        text.push_str("G1 X20 Y20 E0.5\n");
    }
    parse(&text, "layered.gcode")
}

#[test]
fn test_custom_insert_right_after_layer_marker() {
    let model = model_from(&[
        "; header",
        ";LAYER:0",
        "G1 X10 Y10 Z0.2 E1",
        ";LAYER:1",
        "G1 X20 Y20 Z0.4 E2",
    ]);
    let mut modifier = Modifier::new();
    modifier
        .add_custom(&model, LayerTarget::Layer(0), "M106 S255")
        .unwrap();
    let lines = modifier.render(&model);

    assert_eq!(
        lines,
        vec![
            "; header",
            ";LAYER:0",
            "; === CUSTOM G-CODE ===",
            "M106 S255",
            "; === END CUSTOM ===",
            "G1 X10 Y10 Z0.2 E1",
            ";LAYER:1",
            "G1 X20 Y20 Z0.4 E2",
        ]
    );
}

#[test]
fn test_same_layer_blocks_keep_queue_order() {
    let model = layered(3);
    let mut modifier = Modifier::new();
    let pause = modifier
        .add_pause(&model, LayerTarget::Layer(1), "first", None, false)
        .unwrap();
    modifier
        .add_custom(&model, LayerTarget::Layer(1), "M117 second")
        .unwrap();
    modifier
        .add_z_offset(&model, 1, Some(1), 0.1, "third")
        .unwrap();

    let headers = |lines: &[String]| -> Vec<String> {
        let at = lines.iter().position(|l| l == ";LAYER:1").unwrap();
        lines[at + 1..]
            .iter()
            .take_while(|l| !l.starts_with("M73"))
            .filter(|l| l.starts_with("; === ") && !l.starts_with("; === END"))
            .cloned()
            .collect()
    };

    assert_eq!(
        headers(&modifier.render(&model)),
        vec![
            "; === PAUSE: first ===".to_string(),
            "; === CUSTOM G-CODE ===".to_string(),
            "; === Z-OFFSET: +0.1mm for layers 1-1 (third) ===".to_string(),
        ]
    );

    modifier.move_down(&pause.id).unwrap();
    let reordered = headers(&modifier.render(&model));
    assert_eq!(reordered[0], "; === CUSTOM G-CODE ===");
    assert_eq!(reordered[1], "; === PAUSE: first ===");
}

#[test]
fn test_z_offset_limited_to_range() {
    let model = model_from(&[
        ";LAYER:0",
        "G1 X10 Y10 Z0.2 E1",
        ";LAYER:1",
        "G1 X20 Y20 Z0.4 E2",
    ]);
    let mut modifier = Modifier::new();
    modifier.add_z_offset(&model, 0, Some(0), 0.5, "").unwrap();
    let lines = modifier.render(&model);

    assert!(lines.contains(&"G1 X10 Y10 Z0.700 E1".to_string()));
    assert!(lines.contains(&"G1 X20 Y20 Z0.4 E2".to_string()));
    assert_eq!(lines[1], "; === Z-OFFSET: +0.5mm for layers 0-0 ===");
}

#[test]
fn test_z_offset_follows_parsed_layers_past_regressing_marker() {
    let model = model_from(&[
        ";LAYER:0",
        "G1 X1 Y1 Z0.2 E1",
        ";LAYER:1",
        "G1 X2 Y2 Z0.4 E1",
        ";LAYER:0",
        "G1 X3 Y3 Z0.45 E1",
        ";LAYER:2",
        "G1 X4 Y4 Z0.6 E1",
    ]);
    assert_eq!(model.layer_count(), 3);
    assert_eq!(model.get_layer(1).unwrap().end_line, 5);

    let mut modifier = Modifier::new();
    modifier.add_z_offset(&model, 1, Some(1), 0.1, "").unwrap();
    let text = modifier.render_text(&model);
    assert!(text.contains("G1 X1 Y1 Z0.2 E1"));
    assert!(text.contains("G1 X2 Y2 Z0.500 E1"));
    assert!(text.contains("G1 X3 Y3 Z0.550 E1"));
    assert!(text.contains("G1 X4 Y4 Z0.6 E1"));
}

#[test]
fn test_overlapping_z_offsets_sum() {
    let model = layered(3);
    let mut modifier = Modifier::new();
    modifier.add_z_offset(&model, 0, None, 0.1, "").unwrap();
    modifier.add_z_offset(&model, 1, Some(1), 0.05, "").unwrap();
    let text = modifier.render_text(&model);

    assert!(text.contains("G1 Z0.300 F600"));
    assert!(text.contains("G1 Z0.550 F600"));
    assert!(text.contains("G1 Z0.700 F600"));
}

#[test]
fn test_zero_offset_rejected() {
    let model = layered(2);
    let mut modifier = Modifier::new();
    assert_eq!(
        modifier.add_z_offset(&model, 0, None, 0.0, ""),
        Err(ModificationError::ZeroOffset)
    );
    assert!(modifier.is_empty());
}

#[test]
fn test_eject_appended_on_unsliced_file() {
    let model = model_from(&["G28", "G1 X10"]);
    let mut modifier = Modifier::new();
    modifier
        .add_eject(
            &model,
            EjectSettings {
                loop_mode: true,
                ..EjectSettings::default()
            },
        )
        .unwrap();
    modifier
        .add_custom(&model, LayerTarget::End, "M117 done")
        .unwrap();
    let lines = modifier.render(&model);

    assert_eq!(&lines[..2], &["G28", "G1 X10"]);
    let custom = lines.iter().position(|l| l == "M117 done").unwrap();
    let eject = lines
        .iter()
        .position(|l| l == "; === AUTO-EJECT SEQUENCE ===")
        .unwrap();
    assert!(custom < eject);
    assert!(lines.iter().any(|l| l == "; === LOOP MODE ==="));
    assert_eq!(lines.last().unwrap(), "; === END AUTO-EJECT ===");
    assert_eq!(model.lines.len(), 2);
}

#[test]
fn test_pause_uses_firmware_and_park() {
    let model = layered(2);
    let mut modifier = Modifier::with_options(RenderOptions {
        firmware: Firmware::Rrf,
        park: ParkMove {
            lift_mm: 10.0,
            x: 0.0,
            y: 200.0,
        },
    });
    modifier
        .add_pause(&model, LayerTarget::Layer(1), "swap", None, true)
        .unwrap();
    let lines = modifier.render(&model);

    assert!(lines.iter().any(|l| l == "G1 Z10 F600 ; Lift Z"));
    assert!(lines.iter().any(|l| l == "G1 X0 Y200 F6000 ; Park head"));
    assert!(lines.iter().any(|l| l == "M226 ; Pause (RRF)"));
}

#[test]
fn test_recovery_rewrite() {
    let model = layered(4);
    let mut modifier = Modifier::new();
    modifier.add_recovery(&model, 2).unwrap();
    modifier
        .add_pause(&model, LayerTarget::Layer(1), "gone", None, false)
        .unwrap();
    modifier
        .add_custom(&model, LayerTarget::Layer(3), "M117 kept")
        .unwrap();
    let lines = modifier.render(&model);

    assert_eq!(&lines[..3], &["; generated", "G28", "M83"]);
    assert_eq!(lines[3], "; === PRINT RECOVERY: Resume from layer 2 ===");
    assert_eq!(lines[5], "; === END RECOVERY HEADER ===");
    assert_eq!(
        &lines[6..12],
        &[
            ";LAYER:0",
            "M73 L0",
            ";Z:0.20",
            "G1 Z0.200 F600",
            "G1 X7 Y5 E1 F1200",
            "G1 X20 Y20 E0.5",
        ]
    );
    assert_eq!(lines[12], ";LAYER:1");
    assert_eq!(lines[13], "; === CUSTOM G-CODE ===");
    assert!(lines.contains(&"G1 X8 Y5 E1 F3000".to_string()));
    assert!(lines.contains(&"G1 Z0.400 F600".to_string()));
    assert!(!lines.iter().any(|l| l.contains("gone")));
    assert!(!lines.iter().any(|l| l.starts_with("G1 X5 Y5")));
}

#[test]
fn test_recovery_renumbers_bambu_markers() {
    let model = model_from(&[
        "; HEADER_BLOCK_START",
        "; BambuStudio 01.08.00.62",
        "; HEADER_BLOCK_END",
        "; CHANGE_LAYER",
        "; Z_HEIGHT: 0.2",
        "; layer num/total_layer_count: 1/3",
        "M991 S0 P0",
        "G1 Z.2",
        "G1 X10 Y10 E1 F1800",
        "; CHANGE_LAYER",
        "; Z_HEIGHT: 0.4",
        "; layer num/total_layer_count: 2/3",
        "M991 S0 P1",
        "G1 Z.4",
        "G1 X10 Y10 E1 F6000",
        "; CHANGE_LAYER",
        "; Z_HEIGHT: 0.6",
        "; layer num/total_layer_count: 3/3",
        "M991 S0 P2",
        "G1 Z.6",
        "G1 X10 Y10 E1 F6000",
    ]);
    assert_eq!(model.layer_count(), 3);

    let mut modifier = Modifier::new();
    modifier.add_recovery(&model, 1).unwrap();
    modifier.add_z_offset(&model, 2, None, 0.1, "").unwrap();
    let lines = modifier.render(&model);

    assert!(lines.contains(&"; layer num/total_layer_count: 1/2".to_string()));
    assert!(lines.contains(&"; layer num/total_layer_count: 2/2".to_string()));
    assert!(lines.contains(&"M991 S0 P0".to_string()));
    assert!(lines.contains(&"M991 S0 P1".to_string()));
    assert!(lines.contains(&"G1 Z0.200".to_string()));
    assert!(lines.contains(&"G1 Z0.500".to_string()));
    assert!(lines.contains(&"G1 X10 Y10 E1 F1800".to_string()));
}

#[test]
fn test_render_text_keeps_crlf() {
    let model = parse(";LAYER:0\r\nG1 X1 Y1 Z0.2 E1\r\n", "crlf.gcode");
    let mut modifier = Modifier::new();
    modifier
        .add_custom(&model, LayerTarget::Layer(0), "M117 hi")
        .unwrap();
    let text = modifier.render_text(&model);
    assert!(text.starts_with(";LAYER:0\r\n; === CUSTOM G-CODE ===\r\nM117 hi\r\n"));
}

#[test]
fn test_plan_file_entries_queue() {
    let model = layered(3);
    let plan: Vec<ModificationKind> = serde_json::from_str(
        r#"[
            {"type": "filament_change", "layer": 1, "slot": 2},
            {"type": "z_offset", "start_layer": 0, "end_layer": 1, "offset_mm": -0.05},
            {"type": "recovery", "resume_layer": 1}
        ]"#,
    )
    .unwrap();
    let mut modifier = Modifier::new();
    for kind in plan {
        modifier.add(kind, &model).unwrap();
    }
    assert_eq!(modifier.len(), 3);
    let lines = modifier.render(&model);
    assert!(lines.iter().any(|l| l == "M1020 S2 ; Bambu AMS filament change"));
}

#[test]
fn test_toml_plan_entries() {
    #[derive(serde::Deserialize)]
    struct Plan {
        modifications: Vec<ModificationKind>,
    }

    let plan: Plan = toml::from_str(
        r#"
        [[modifications]]
        type = "pause"
        layer = 2
        message = "Insert nuts"
        pause_command = "M600"

        [[modifications]]
        type = "custom"
        layer = "end"
        gcode = "M117 Finished"
        "#,
    )
    .unwrap();
    assert_eq!(plan.modifications.len(), 2);
    assert_eq!(
        plan.modifications[1].splice_target(),
        Some(LayerTarget::End)
    );
}

fn hole(floor: FloorStatus) -> Hole {
    Hole {
        id: "hole_5_0".to_string(),
        layer: 5,
        top_layer: Some(5),
        cells: Vec::new(),
        grid: None,
        area_mm2: 28.0,
        diameter_mm: 6.0,
        shape: HoleShape::Circle,
        width_mm: 6.0,
        height_mm: 6.0,
        fill_ratio: 0.78,
        centroid: Point2D::new(10.0, 10.0),
        bbox: Bounds::from_extents(7.0, 13.0, 7.0, 13.0),
        floor,
        depth_mm: None,
    }
}

fn magnet(height_mm: f64) -> InsertSpec {
    InsertSpec {
        label: Some("magnet".to_string()),
        height_mm,
        diameter_mm: 6.0,
        pause_command: None,
        move_head: false,
    }
}

#[test]
fn test_insert_planning() {
    let model = layered(6);
    let planner = InsertPlanner::new();

    // floor layer 1 sits at 0.4 mm
    assert_eq!(
        planner.plan(&model, &hole(FloorStatus::Floor(1)), 0.6).unwrap(),
        InsertOutcome::Planned { layer: 4 }
    );
    assert_eq!(
        planner.plan(&model, &hole(FloorStatus::ThroughHole), 0.6).unwrap(),
        InsertOutcome::ThroughHole
    );
    assert_eq!(
        planner.plan(&model, &hole(FloorStatus::NotAnalyzed), 0.6).unwrap(),
        InsertOutcome::DepthUnknown
    );
    assert_eq!(
        planner.plan(&model, &hole(FloorStatus::Floor(1)), 5.0).unwrap(),
        InsertOutcome::TallerThanPrint
    );
    assert!(matches!(
        planner.plan(&model, &hole(FloorStatus::Floor(1)), -1.0),
        Err(InsertError::InvalidDimension { field: "height", .. })
    ));
}

#[test]
fn test_insert_apply_queues_pause() {
    let model = layered(6);
    let mut modifier = Modifier::new();
    let mut planner = InsertPlanner::new();
    let holes = [hole(FloorStatus::Floor(1)), hole(FloorStatus::ThroughHole)];

    let outcomes = planner
        .apply_to_holes(&mut modifier, &model, holes.iter(), &magnet(0.6))
        .unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[1].1, InsertOutcome::ThroughHole);
    assert_eq!(modifier.len(), 1);
    assert_eq!(planner.records().len(), 1);
    assert_eq!(planner.records()[0].pause_layer, 4);
    assert_eq!(planner.records()[0].modification_id, modifier.list()[0].id);

    let lines = modifier.render(&model);
    assert!(lines
        .iter()
        .any(|l| l == "; === PAUSE: Insert magnet (6mm dia, 0.6mm tall) at hole #hole_5_0 ==="));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_splice_independent_of_queue_order(order in Just((0u32..6).collect::<Vec<_>>()).prop_shuffle()) {
        let model = layered(6);

        let mut sorted = Modifier::new();
        for layer in 0..6 {
            sorted.add_custom(&model, LayerTarget::Layer(layer), format!("M117 L{}", layer)).unwrap();
        }
        let mut shuffled = Modifier::new();
        for layer in &order {
            shuffled.add_custom(&model, LayerTarget::Layer(*layer), format!("M117 L{}", layer)).unwrap();
        }

        prop_assert_eq!(sorted.render(&model), shuffled.render(&model));
    }
}
