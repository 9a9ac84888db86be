//! Build target records and lifecycle states.

use std::path::PathBuf;

/// One named container-image build unit.
///
/// Created by the resolver; identifier and paths never change afterwards.
/// The worker that owns a target during a run tracks its live status and
/// reports it in the per-target [`Outcome`](crate::pipeline::Outcome).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
  /// Target identifier, e.g. an OS/variant tag like `debian12`.
  pub name: String,

  /// Path to the definition file the build backend consumes.
  pub definition: PathBuf,

  /// Path of the image artifact this target produces.
  pub output: PathBuf,
}

impl Target {
  pub fn new(name: impl Into<String>, definition: PathBuf, output: PathBuf) -> Self {
    Self {
      name: name.into(),
      definition,
      output,
    }
  }
}

/// Lifecycle state of a target within a single run.
///
/// Transitions are monotonic: `Pending → Building → Testing → Pushing →
/// Done`, with `Skipped` reachable only from `Pending` (artifact gate) and
/// `Failed` reachable from any active stage. Terminal states are never
/// re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStatus {
  Pending,
  Building,
  Testing,
  Pushing,
  Done,
  Skipped,
  Failed,
}

impl TargetStatus {
  pub fn is_terminal(self) -> bool {
    matches!(self, TargetStatus::Done | TargetStatus::Skipped | TargetStatus::Failed)
  }
}

impl std::fmt::Display for TargetStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      TargetStatus::Pending => "pending",
      TargetStatus::Building => "building",
      TargetStatus::Testing => "testing",
      TargetStatus::Pushing => "pushing",
      TargetStatus::Done => "done",
      TargetStatus::Skipped => "skipped",
      TargetStatus::Failed => "failed",
    };
    write!(f, "{}", s)
  }
}
