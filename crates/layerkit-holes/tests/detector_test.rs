use layerkit_core::Point2D;
use layerkit_holes::{FloorStatus, HoleDetector, HoleShape, DEFAULT_MIN_DIAMETER};
use layerkit_toolpath::{parse, ToolpathModel};
use proptest::prelude::*;

const PLATE: f64 = 30.0;
const ROW_PITCH: f64 = 0.4;
const LAYER_HEIGHT: f64 = 0.2;

#[derive(Clone, Copy)]
enum Cutout {
    None,
    Circle { radius: f64 },
    Square { half: f64 },
}

impl Cutout {
    /// Open x-interval of the cutout on a scan row, relative to the plate center
    fn gap(&self, dy: f64) -> Option<(f64, f64)> {
        match *self {
            Cutout::None => None,
            Cutout::Circle { radius } if dy.abs() < radius => {
                let half = (radius * radius - dy * dy).sqrt();
                Some((-half, half))
            }
            Cutout::Square { half } if dy.abs() < half => Some((-half, half)),
            _ => None,
        }
    }
}

/// One layer of a square plate with an optional cutout, filled by horizontal
/// scan lines; `hole_fill` covers the cutout with moves of that feature type
fn plate_layer(out: &mut String, number: u32, cutout: Cutout, hole_fill: Option<&str>) {
    let z = (number + 1) as f64 * LAYER_HEIGHT;
    let center = PLATE / 2.0;
    out.push_str(&format!(";LAYER:{}\nM83\nG0 X0 Y0 Z{:.2}\n;TYPE:SKIN\n", number, z));

    let mut fill_rows = Vec::new();
    let rows = (PLATE / ROW_PITCH).round() as usize;
    for row in 0..=rows {
        let y = row as f64 * ROW_PITCH;
        match cutout.gap(y - center) {
            Some((left, right)) => {
                out.push_str(&format!("G0 X0 Y{:.3}\nG1 X{:.3} Y{:.3} E1\n", y, center + left, y));
                out.push_str(&format!(
                    "G0 X{:.3} Y{:.3}\nG1 X{:.3} Y{:.3} E1\n",
                    center + right,
                    y,
                    PLATE,
                    y
                ));
                fill_rows.push((y, center + left, center + right));
            }
            None => out.push_str(&format!("G0 X0 Y{:.3}\nG1 X{:.3} Y{:.3} E1\n", y, PLATE, y)),
        }
    }

    if let Some(feature) = hole_fill {
        out.push_str(&format!(";TYPE:{}\n", feature));
        for (y, left, right) in fill_rows {
            out.push_str(&format!("G0 X{:.3} Y{:.3}\nG1 X{:.3} Y{:.3} E1\n", left, y, right, y));
        }
    }
}

/// `solid` closed layers followed by `holed` layers carrying the cutout
fn plate(solid: u32, holed: u32, cutout: Cutout) -> ToolpathModel {
    let mut text = String::from("G28\nG90\n");
    for n in 0..solid {
        plate_layer(&mut text, n, Cutout::None, None);
    }
    for n in solid..solid + holed {
        plate_layer(&mut text, n, cutout, None);
    }
    parse(&text, "plate.gcode")
}

#[test]
fn test_detects_circular_hole() {
    let model = plate(0, 1, Cutout::Circle { radius: 5.0 });
    let mut detector = HoleDetector::new();
    let holes = detector.detect_holes(&model, 0, DEFAULT_MIN_DIAMETER, true);

    assert_eq!(holes.len(), 1);
    let hole = &holes[0];
    assert_eq!(hole.id, "hole_0_0");
    assert_eq!(hole.shape, HoleShape::Circle);
    assert!((hole.diameter_mm - 10.0).abs() < 1.0, "diameter {}", hole.diameter_mm);
    assert!((hole.centroid.x - 15.0).abs() < 0.5);
    assert!((hole.centroid.y - 15.0).abs() < 0.5);
    assert_eq!(hole.floor, FloorStatus::NotAnalyzed);
}

#[test]
fn test_detects_square_hole() {
    let model = plate(0, 1, Cutout::Square { half: 4.0 });
    let mut detector = HoleDetector::new();
    let holes = detector.detect_holes(&model, 0, DEFAULT_MIN_DIAMETER, true);

    assert_eq!(holes.len(), 1);
    assert_eq!(holes[0].shape, HoleShape::Square);
    assert!((holes[0].width_mm - 8.0).abs() < 1.0, "width {}", holes[0].width_mm);
}

#[test]
fn test_min_diameter_filters_small_holes() {
    let model = plate(0, 1, Cutout::Circle { radius: 3.0 });
    let mut detector = HoleDetector::new();
    assert_eq!(detector.detect_holes(&model, 0, 4.0, true).len(), 1);
    assert!(detector.detect_holes(&model, 0, 9.0, true).is_empty());
}

#[test]
fn test_solid_plate_has_no_holes() {
    let model = plate(1, 0, Cutout::None);
    let mut detector = HoleDetector::new();
    assert!(detector.detect_holes(&model, 0, 1.0, false).is_empty());
}

#[test]
fn test_infill_covered_hole_needs_ignore_infill() {
    let mut text = String::new();
    plate_layer(&mut text, 0, Cutout::Circle { radius: 5.0 }, Some("SPARSE"));
    let model = parse(&text, "infill.gcode");
    let mut detector = HoleDetector::new();

    assert_eq!(detector.detect_holes(&model, 0, DEFAULT_MIN_DIAMETER, true).len(), 1);
    assert!(detector
        .detect_holes(&model, 0, DEFAULT_MIN_DIAMETER, false)
        .is_empty());
}

#[test]
fn test_floor_and_depth() {
    let model = plate(2, 4, Cutout::Circle { radius: 5.0 });
    let mut detector = HoleDetector::new();
    let mut hole = detector
        .detect_holes(&model, 5, DEFAULT_MIN_DIAMETER, true)
        .remove(0);
    detector.analyze_depth(&model, &mut hole);

    assert_eq!(hole.floor, FloorStatus::Floor(1));
    assert_eq!(hole.floor_layer(), Some(1));
    let depth = hole.depth_mm.unwrap();
    assert!((depth - 0.8).abs() < 1e-6, "depth {}", depth);
}

#[test]
fn test_far_stray_move_yields_no_holes() {
    let mut text = String::from("G28\nG90\n");
    plate_layer(&mut text, 0, Cutout::Circle { radius: 5.0 }, None);
    text.push_str("G1 X1000000000000 Y1000000000000 E1\n");
    let model = parse(&text, "stray.gcode");

    let mut detector = HoleDetector::new();
    assert!(detector.rasterize_layer(&model, 0, true).is_none());
    assert!(detector
        .detect_holes(&model, 0, DEFAULT_MIN_DIAMETER, true)
        .is_empty());
    assert!(detector
        .scan_all_layers(&model, DEFAULT_MIN_DIAMETER, true, None)
        .is_empty());
}

#[test]
fn test_through_hole() {
    let model = plate(0, 3, Cutout::Circle { radius: 5.0 });
    let mut detector = HoleDetector::new();
    let mut hole = detector
        .detect_holes(&model, 2, DEFAULT_MIN_DIAMETER, true)
        .remove(0);
    detector.analyze_depth(&model, &mut hole);

    assert!(hole.is_through_hole());
    assert_eq!(hole.depth_mm, None);
}

#[test]
fn test_scan_merges_layers() {
    let model = plate(2, 4, Cutout::Circle { radius: 5.0 });
    let mut detector = HoleDetector::new();
    let mut reported = Vec::new();
    let mut on_progress = |p: f64| reported.push(p);
    let holes =
        detector.scan_all_layers(&model, DEFAULT_MIN_DIAMETER, true, Some(&mut on_progress));

    assert_eq!(holes.len(), 1);
    assert_eq!(holes[0].top_layer, Some(5));
    assert_eq!(holes[0].layer, 5);
    assert_eq!(holes[0].floor, FloorStatus::Floor(1));
    assert_eq!(detector.unique_holes().len(), 1);

    assert_eq!(reported.last(), Some(&1.0));
    assert!(reported.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_find_hole_at_point() {
    let model = plate(0, 1, Cutout::Circle { radius: 5.0 });
    let mut detector = HoleDetector::new();
    detector.detect_holes(&model, 0, DEFAULT_MIN_DIAMETER, true);

    let hit = detector.find_hole_at_point(0, Point2D::new(15.0, 15.0));
    assert_eq!(hit.map(|h| h.id.as_str()), Some("hole_0_0"));
    assert!(detector.find_hole_at_point(0, Point2D::new(2.0, 2.0)).is_none());
    assert!(detector.find_hole_at_point(1, Point2D::new(15.0, 15.0)).is_none());
}

#[test]
fn test_hole_serializes_without_cells() {
    let model = plate(0, 1, Cutout::Circle { radius: 5.0 });
    let mut detector = HoleDetector::new();
    let holes = detector.detect_holes(&model, 0, DEFAULT_MIN_DIAMETER, true);
    let json = serde_json::to_value(&holes[0]).unwrap();

    assert_eq!(json["id"], "hole_0_0");
    assert!(json.get("cells").is_none());
    assert_eq!(json["floor"]["status"], "not_analyzed");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_raising_min_diameter_never_adds_holes(radius in 1.5f64..6.0, a in 0.0f64..12.0, b in 0.0f64..12.0) {
        let model = plate(0, 1, Cutout::Circle { radius });
        let mut detector = HoleDetector::new();
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let loose = detector.detect_holes(&model, 0, low, true).len();
        let strict = detector.detect_holes(&model, 0, high, true).len();
        prop_assert!(strict <= loose);
    }
}
