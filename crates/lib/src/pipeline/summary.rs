//! Per-target outcomes and the aggregated run summary.

use std::time::Duration;

use crate::target::{Target, TargetStatus};

/// Final result of one target's pipeline. Produced exactly once per
/// target by the worker that owned it.
#[derive(Debug, Clone)]
pub struct Outcome {
  /// Position in resolver order; the summary sorts by this.
  pub index: usize,
  pub name: String,
  pub status: TargetStatus,
  pub duration: Duration,
  /// Error message for a `Failed` target.
  pub error: Option<String>,
  /// Artifact size for a `Done` target.
  pub artifact_size: Option<u64>,
}

impl Outcome {
  pub fn done(index: usize, target: &Target, artifact_size: u64, duration: Duration) -> Self {
    Self {
      index,
      name: target.name.clone(),
      status: TargetStatus::Done,
      duration,
      error: None,
      artifact_size: Some(artifact_size),
    }
  }

  pub fn skipped(index: usize, target: &Target, duration: Duration) -> Self {
    Self {
      index,
      name: target.name.clone(),
      status: TargetStatus::Skipped,
      duration,
      error: None,
      artifact_size: None,
    }
  }

  pub fn failed(index: usize, target: &Target, error: String, duration: Duration) -> Self {
    Self {
      index,
      name: target.name.clone(),
      status: TargetStatus::Failed,
      duration,
      error: Some(error),
      artifact_size: None,
    }
  }
}

/// Aggregate of all outcomes for one run.
///
/// Outcomes are held in resolver order regardless of completion order, so
/// summary output is reproducible across runs. Invariant:
/// `done + failed + skipped == outcomes.len()`.
#[derive(Debug, Default)]
pub struct RunSummary {
  outcomes: Vec<Outcome>,
  pub done: usize,
  pub failed: usize,
  pub skipped: usize,
}

impl RunSummary {
  /// Collect outcomes from the scheduler, restoring resolver order.
  pub fn collect(mut outcomes: Vec<Outcome>) -> Self {
    outcomes.sort_by_key(|o| o.index);

    let mut summary = Self {
      done: 0,
      failed: 0,
      skipped: 0,
      outcomes,
    };
    for outcome in &summary.outcomes {
      match outcome.status {
        TargetStatus::Done => summary.done += 1,
        TargetStatus::Failed => summary.failed += 1,
        TargetStatus::Skipped => summary.skipped += 1,
        other => {
          // Workers only ever emit terminal states.
          debug_assert!(other.is_terminal(), "non-terminal outcome: {}", other);
        }
      }
    }
    summary
  }

  pub fn outcomes(&self) -> &[Outcome] {
    &self.outcomes
  }

  pub fn total(&self) -> usize {
    self.outcomes.len()
  }

  /// True when every non-skipped target reached `Done`.
  pub fn is_success(&self) -> bool {
    self.failed == 0
  }

  /// Failed targets, in resolver order.
  pub fn failures(&self) -> impl Iterator<Item = &Outcome> {
    self.outcomes.iter().filter(|o| o.status == TargetStatus::Failed)
  }

  /// Process-level exit code: 0 all non-skipped targets done, 1 otherwise.
  pub fn exit_code(&self) -> u8 {
    if self.is_success() { 0 } else { 1 }
  }
}
