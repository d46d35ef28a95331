//! # LayerKit Modifier
//!
//! Queues structural edits against a parsed toolpath and splices them back
//! into the original text.
//!
//! Edits are validated when they are queued and rendered in a fixed order:
//! the recovery rewrite first, then Z-offset adjustment, then point
//! insertions (pauses, filament changes, custom blocks, Z-offset markers)
//! spliced bottom-up, and finally the eject sequence.
//!
//! Firmware profiles translate abstract pause and filament commands into
//! firmware-specific G-code, and the insert planner turns a detected hole plus
//! an insert's dimensions into a pause at the right layer.

pub mod engine;
pub mod firmware;
pub mod insert;
pub mod modification;
pub mod rewrite;
pub mod snippet;

pub use engine::Modifier;
pub use firmware::{Firmware, PauseCommand};
pub use insert::{InsertOutcome, InsertPlanner, InsertRecord, InsertSpec};
pub use modification::{EjectSettings, LayerTarget, Modification, ModificationKind};
pub use snippet::{ParkMove, RenderOptions};

/// Result type for queue operations
pub type Result<T> = std::result::Result<T, layerkit_core::ModificationError>;
