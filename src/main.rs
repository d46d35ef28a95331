//! LayerKit CLI
//!
//! Usage:
//!   layerkit info <file>
//!   layerkit decode <input.bgcode> -o <output.gcode>
//!   layerkit holes <file> [--layer N] [--min-diameter MM] [--include-infill] [--json]
//!   layerkit apply <file> --plan <plan.toml> -o <output.gcode>

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use layerkit::bgcode::{decode_container, is_container, ContainerReader};
use layerkit::holes::{FloorStatus, Hole};
use layerkit::settings::Config;
use layerkit::{init_logging, EditPlan, Session};
use tracing::{debug, info};

/// Inspect and edit sliced 3D-printer toolpaths
#[derive(Parser, Debug)]
#[command(name = "layerkit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (JSON or TOML); defaults to the user config file when present
    #[arg(short, long, global = true, value_name = "CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show slicer, layers, bounds and container blocks
    Info {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Decode a binary container to plain G-code
    Decode {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(short, long, value_name = "OUTPUT")]
        output: PathBuf,
    },

    /// Detect holes on one layer or across the whole print
    Holes {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Only this layer; scans every layer otherwise
        #[arg(long)]
        layer: Option<u32>,

        /// Smallest diameter reported, in mm
        #[arg(long, value_name = "MM")]
        min_diameter: Option<f64>,

        /// Treat infill as solid when rasterizing
        #[arg(long)]
        include_infill: bool,

        /// Print holes as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply an edit plan and write the modified toolpath
    Apply {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Edit plan (JSON or TOML)
        #[arg(short, long, value_name = "PLAN")]
        plan: PathBuf,

        #[arg(short, long, value_name = "OUTPUT")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;
    debug!(
        "layerkit {} (built {})",
        layerkit::VERSION,
        layerkit::BUILD_DATE
    );

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Info { input } => cmd_info(&input, config),
        Commands::Decode { input, output } => cmd_decode(&input, &output),
        Commands::Holes {
            input,
            layer,
            min_diameter,
            include_infill,
            json,
        } => {
            let mut config = config;
            if let Some(min) = min_diameter {
                config.detection.min_diameter_mm = min;
            }
            if include_infill {
                config.detection.ignore_infill = false;
            }
            config.validate()?;
            cmd_holes(&input, config, layer, json)
        }
        Commands::Apply {
            input,
            plan,
            output,
        } => cmd_apply(&input, &plan, &output, config),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        return Config::load_from_file(path)
            .with_context(|| format!("Failed to load settings {}", path.display()));
    }
    match Config::default_path() {
        Ok(path) => Ok(Config::load_or_default(&path)?),
        Err(e) => {
            debug!("Using default settings: {}", e);
            Ok(Config::default())
        }
    }
}

fn cmd_info(input: &Path, config: Config) -> Result<()> {
    let session = Session::open(input, config)?;
    let model = session.model();

    println!("File:          {}", model.filename);
    println!("Format:        {:?}", session.format());
    println!("Size:          {} bytes", session.file_size());
    println!("Slicer:        {}", model.slicer);
    println!("Lines:         {}", model.lines.len());
    println!("Layers:        {}", model.layer_count());
    if let (Some(first), Some(last)) = (model.layers.first(), model.layers.last()) {
        println!(
            "Layer range:   {}..={} (Z {} .. {})",
            first.number,
            last.number,
            format_z(first.z_height),
            format_z(last.z_height)
        );
    }
    println!("Moves:         {}", model.total_moves());
    if model.bounds.is_empty() {
        println!("Bounds:        (no moves)");
    } else {
        println!(
            "Bounds:        X {:.2}..{:.2}  Y {:.2}..{:.2}",
            model.bounds.min_x, model.bounds.max_x, model.bounds.min_y, model.bounds.max_y
        );
    }
    println!("Skipped lines: {}", model.skipped_lines);

    let bytes = std::fs::read(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    if is_container(&bytes) {
        print_blocks(&bytes)?;
    }
    Ok(())
}

fn format_z(z: Option<f64>) -> String {
    z.map_or_else(|| "?".to_string(), |z| format!("{:.2}", z))
}

fn print_blocks(bytes: &[u8]) -> Result<()> {
    let mut reader = ContainerReader::new(bytes)?;
    let header = reader.header();
    println!();
    println!(
        "Container:     version {}, checksums {}",
        header.version,
        if header.has_crc() { "on" } else { "off" }
    );
    println!(
        "{:>5}  {:<16} {:>11} {:>8} {:>12} {:>12}  CRC",
        "#", "type", "compression", "encoding", "size", "stored"
    );
    while let Some(block) = reader.next_block()? {
        let crc = match reader.verify_crc(&block) {
            Some(true) => "ok",
            Some(false) => "MISMATCH",
            None => "-",
        };
        println!(
            "{:>5}  {:<16} {:>11} {:>8} {:>12} {:>12}  {}",
            block.index,
            format!("{:?}", block.block_type),
            block.compression,
            block.encoding,
            block.uncompressed_size,
            block
                .compressed_size
                .map_or_else(|| "-".to_string(), |s| s.to_string()),
            crc
        );
    }
    Ok(())
}

fn cmd_decode(input: &Path, output: &Path) -> Result<()> {
    let bytes = std::fs::read(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    if !is_container(&bytes) {
        anyhow::bail!("{} is not a binary G-code container", input.display());
    }
    let text = decode_container(&bytes)
        .with_context(|| format!("Failed to decode {}", input.display()))?;
    std::fs::write(output, &text)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!(
        "Decoded {} -> {} ({} bytes)",
        input.display(),
        output.display(),
        text.len()
    );
    Ok(())
}

fn cmd_holes(input: &Path, config: Config, layer: Option<u32>, json: bool) -> Result<()> {
    let mut session = Session::open(input, config)?;
    let holes = match layer {
        Some(number) => {
            if session.model().get_layer(number).is_none() {
                anyhow::bail!("Layer {} does not exist", number);
            }
            session.detect_holes(number)
        }
        None => session.scan_holes(None),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&holes)?);
        return Ok(());
    }

    if holes.is_empty() {
        println!("No holes found");
        return Ok(());
    }
    println!(
        "{:<14} {:>6} {:>9} {:>10} {:>16}  floor",
        "id", "layer", "shape", "diameter", "centroid"
    );
    for hole in &holes {
        println!(
            "{:<14} {:>6} {:>9} {:>8.2}mm {:>16}  {}",
            hole.id,
            hole.top_layer.unwrap_or(hole.layer),
            hole.shape,
            hole.diameter_mm,
            format!("({:.1}, {:.1})", hole.centroid.x, hole.centroid.y),
            describe_floor(hole)
        );
    }
    Ok(())
}

fn describe_floor(hole: &Hole) -> String {
    match hole.floor {
        FloorStatus::Floor(layer) => match hole.depth_mm {
            Some(depth) => format!("layer {} ({:.2}mm deep)", layer, depth),
            None => format!("layer {}", layer),
        },
        FloorStatus::ThroughHole => "through".to_string(),
        FloorStatus::NotAnalyzed => "-".to_string(),
    }
}

fn cmd_apply(input: &Path, plan_path: &Path, output: &Path, config: Config) -> Result<()> {
    let plan = EditPlan::load_from_file(plan_path)?;
    if plan.is_empty() {
        info!("Plan {} is empty; output is unchanged", plan_path.display());
    }

    let mut session = Session::open(input, config)?;
    session.apply_plan(&plan)?;

    for modification in session.modifications() {
        println!("{:<16} {}", modification.kind.type_name(), modification.id);
    }
    for record in session.insert_records() {
        println!(
            "insert {} -> pause at layer {}",
            record.hole_id, record.pause_layer
        );
    }

    session.write_output(output)
}
