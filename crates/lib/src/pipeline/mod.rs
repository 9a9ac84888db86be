//! Bounded-parallel pipeline execution.
//!
//! The scheduler admits resolved targets in resolver order to a pool
//! capped by a semaphore: at most `parallelism` targets are in an active
//! stage at once, and each worker drives one target's full state machine
//! to completion before releasing its permit. Execution is fail-slow: one
//! target's failure never cancels another's in-flight work. A cooperative
//! [`StopSignal`] drains the pool between stages instead.

pub mod summary;
pub mod worker;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::backend::Backend;
use crate::config::BuildRequest;
use crate::target::Target;

pub use summary::{Outcome, RunSummary};
pub use worker::run_target;

/// Cooperative global stop flag, shared by every worker.
///
/// Triggering it never kills an in-flight backend call; workers check it
/// between stages and refuse to start new ones.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn trigger(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_triggered(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}

/// Run every resolved target to a terminal state and aggregate outcomes.
///
/// The returned summary always covers every admitted target; panicking
/// workers are logged and surface as missing outcomes only in that
/// pathological case.
pub async fn run(
  targets: Vec<Target>,
  request: Arc<BuildRequest>,
  backend: Arc<dyn Backend>,
  stop: StopSignal,
) -> RunSummary {
  info!(
    targets = targets.len(),
    parallelism = request.parallelism,
    "starting pipeline execution"
  );

  let semaphore = Arc::new(Semaphore::new(request.parallelism));
  let mut join_set = JoinSet::new();

  for (index, target) in targets.into_iter().enumerate() {
    let request = request.clone();
    let backend = backend.clone();
    let semaphore = semaphore.clone();
    let stop = stop.clone();

    join_set.spawn(async move {
      // Acquire the permit inside the task so admission stays in
      // resolver order while the pool is saturated.
      let _permit = semaphore.acquire().await.expect("semaphore closed");
      run_target(index, target, &request, backend.as_ref(), &stop).await
    });
  }

  let mut outcomes = Vec::new();
  while let Some(join_result) = join_set.join_next().await {
    match join_result {
      Ok(outcome) => outcomes.push(outcome),
      Err(err) => {
        error!(error = %err, "pipeline worker panicked");
      }
    }
  }

  let summary = RunSummary::collect(outcomes);
  info!(
    done = summary.done,
    failed = summary.failed,
    skipped = summary.skipped,
    "pipeline execution complete"
  );
  summary
}
