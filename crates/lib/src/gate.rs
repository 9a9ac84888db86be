//! Artifact gate: idempotency decision for a single target.
//!
//! Targets never share an output path, so no cross-target locking is
//! needed. The worker consults the gate exactly once, immediately before
//! building, which keeps the existence check and the build a single
//! decision point.

use std::path::Path;

use tracing::debug;

/// Whether a target needs to be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
  Build,
  Skip,
}

/// Decide whether the target's output artifact needs to be (re)built.
///
/// Returns `Skip` only when the artifact already exists and `force` is
/// false.
pub fn decide(output: &Path, force: bool) -> GateDecision {
  if force {
    debug!(artifact = %output.display(), "force rebuild requested");
    return GateDecision::Build;
  }
  if output.exists() {
    debug!(artifact = %output.display(), "artifact exists, skipping");
    GateDecision::Skip
  } else {
    GateDecision::Build
  }
}
