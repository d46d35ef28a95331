//! Callback aliases used across crates.

/// Progress callback receiving a completion fraction in `0.0..=1.0`.
///
/// Fractions are monotonically increasing within one operation; callers must not
/// assume any particular granularity.
pub type ProgressFn<'a> = &'a mut dyn FnMut(f64);
