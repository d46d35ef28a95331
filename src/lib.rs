//! # LayerKit
//!
//! Toolpath inspection and editing for sliced 3D-printer G-code:
//! - Binary G-code container decoding (deflate, heatshrink, MeatPack)
//! - Layer and move reconstruction from slicer comments
//! - Hole detection with floor and depth tracing
//! - Layer-accurate modification splicing (pauses, filament changes,
//!   Z-offsets, custom blocks, eject sequence, print recovery)
//!
//! ## Architecture
//!
//! LayerKit is organized as a workspace with multiple crates:
//!
//! 1. **layerkit-core** - Error taxonomy, geometry, progress callbacks
//! 2. **layerkit-bgcode** - Binary container decoder
//! 3. **layerkit-toolpath** - G-code parsing into layers and moves
//! 4. **layerkit-holes** - Raster-based hole detection
//! 5. **layerkit-modifier** - Modification queue, firmware profiles, insert planner
//! 6. **layerkit-settings** - Configuration file model
//! 7. **layerkit** - Session, edit plans and the command-line tool

pub mod plan;
pub mod session;

pub use layerkit_bgcode as bgcode;
pub use layerkit_holes as holes;
pub use layerkit_modifier as modifier;
pub use layerkit_settings as settings;
pub use layerkit_toolpath as toolpath;

pub use layerkit_core::{
    Bounds, DecodeError, Error, InsertError, ModificationError, Point2D, Result,
};
pub use plan::{EditPlan, InsertRequest};
pub use session::Session;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Log lines go to stderr so command output on stdout stays clean. The
/// `RUST_LOG` environment variable overrides the default level; `verbose`
/// raises the default from info to debug.
pub fn init_logging(verbose: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_level(true)
        .with_line_number(verbose);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
