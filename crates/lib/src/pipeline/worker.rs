//! Per-target state machine.
//!
//! Each worker owns exactly one target for its lifetime and drives it
//! `Pending → Building → Testing → Pushing → Done`, short-circuiting to
//! `Skipped` (artifact gate) or `Failed` (first stage error). Failures are
//! recorded in the outcome and never escalate to sibling targets.

use std::time::Instant;

use tracing::{error, info};

use crate::backend::{Backend, BuildOptions, ImageRef};
use crate::config::BuildRequest;
use crate::gate::{self, GateDecision};
use crate::target::{Target, TargetStatus};

use super::{Outcome, StopSignal};

/// Run one target's full pipeline to a terminal state.
///
/// The stop signal is observed between stages only: an in-flight backend
/// call always finishes, but no new stage starts after the signal.
pub async fn run_target(
  index: usize,
  target: Target,
  request: &BuildRequest,
  backend: &dyn Backend,
  stop: &StopSignal,
) -> Outcome {
  let started = Instant::now();

  if gate::decide(&target.output, request.force) == GateDecision::Skip {
    info!(name = %target.name, artifact = %target.output.display(), "artifact up to date, skipping");
    return Outcome::skipped(index, &target, started.elapsed());
  }

  if stop.is_triggered() {
    return interrupted(index, &target, TargetStatus::Building, started);
  }

  // Building. Per-target tmp dirs live under their own namespace so a
  // target name like `cache` can never alias the shared cache dir.
  info!(name = %target.name, definition = %target.definition.display(), "building");
  let tmp_dir = request.tmp_dir.join("targets").join(&target.name);
  if let Err(err) = tokio::fs::create_dir_all(&tmp_dir).await {
    return fail(index, &target, TargetStatus::Building, err.to_string(), started);
  }
  let options = BuildOptions {
    tmp_dir,
    cache_dir: request.cache_dir.clone(),
    privilege: request.privilege,
  };
  let artifact = match backend.build(&target.definition, &target.output, &options).await {
    Ok(artifact) => artifact,
    Err(err) => return fail(index, &target, TargetStatus::Building, err.to_string(), started),
  };

  // Testing
  if request.test {
    if stop.is_triggered() {
      return interrupted(index, &target, TargetStatus::Testing, started);
    }
    info!(name = %target.name, "testing");
    if let Err(err) = backend.test(&artifact.path).await {
      // The artifact stays on disk; the target still counts as failed.
      return fail(index, &target, TargetStatus::Testing, err.to_string(), started);
    }
  }

  // Pushing: decided once, explicitly. A read-only context always wins
  // over the push flag.
  let image = match (&request.registry, request.push, request.read_only) {
    (Some(registry), true, false) => Some(ImageRef {
      registry: registry.clone(),
      repository: target.name.clone(),
      tags: request.tags.clone(),
    }),
    (_, true, true) => {
      info!(name = %target.name, "read-only context, push disabled");
      None
    }
    _ => None,
  };
  if let Some(image) = image {
    if stop.is_triggered() {
      return interrupted(index, &target, TargetStatus::Pushing, started);
    }
    info!(name = %target.name, registry = %image.registry, "pushing");
    if let Err(err) = backend.push(&artifact.path, &image).await {
      return fail(index, &target, TargetStatus::Pushing, err.to_string(), started);
    }
  }

  info!(name = %target.name, elapsed = ?started.elapsed(), "done");
  Outcome::done(index, &target, artifact.size, started.elapsed())
}

fn fail(index: usize, target: &Target, stage: TargetStatus, message: String, started: Instant) -> Outcome {
  let error = format!("{} failed: {}", stage_verb(stage), message);
  error!(name = %target.name, error = %error, "target failed");
  Outcome::failed(index, target, error, started.elapsed())
}

fn interrupted(index: usize, target: &Target, stage: TargetStatus, started: Instant) -> Outcome {
  let error = format!("interrupted before {}", stage_verb(stage));
  info!(name = %target.name, stage = %stage, "stop requested, not starting stage");
  Outcome::failed(index, target, error, started.elapsed())
}

// Only active stages are ever passed in.
fn stage_verb(stage: TargetStatus) -> &'static str {
  match stage {
    TargetStatus::Building => "build",
    TargetStatus::Testing => "test",
    TargetStatus::Pushing => "push",
    _ => "run",
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::mock::{Call, MockBackend};
  use tempfile::TempDir;

  fn fixture(temp: &TempDir, name: &str) -> (Target, BuildRequest) {
    let definition = temp.path().join(format!("{}.def", name));
    std::fs::write(&definition, "Bootstrap: docker\n").unwrap();
    let target = Target::new(name, definition, temp.path().join(format!("{}.sif", name)));
    let request = BuildRequest {
      defs_dir: temp.path().to_path_buf(),
      output_dir: temp.path().to_path_buf(),
      tmp_dir: temp.path().join("tmp"),
      ..Default::default()
    };
    (target, request)
  }

  #[tokio::test]
  async fn build_only_pipeline_reaches_done() {
    let temp = TempDir::new().unwrap();
    let (target, request) = fixture(&temp, "alma9");
    let backend = MockBackend::default();

    let outcome = run_target(0, target, &request, &backend, &StopSignal::new()).await;

    assert_eq!(outcome.status, TargetStatus::Done);
    assert_eq!(backend.calls(), vec![Call::Build("alma9".to_string())]);
    assert!(outcome.artifact_size.is_some());
  }

  #[tokio::test]
  async fn skip_makes_no_backend_calls() {
    let temp = TempDir::new().unwrap();
    let (target, request) = fixture(&temp, "alma9");
    std::fs::write(&target.output, "sif").unwrap();
    let backend = MockBackend::default();

    let outcome = run_target(0, target, &request, &backend, &StopSignal::new()).await;

    assert_eq!(outcome.status, TargetStatus::Skipped);
    assert!(backend.calls().is_empty());
  }

  #[tokio::test]
  async fn force_rebuilds_existing_artifact() {
    let temp = TempDir::new().unwrap();
    let (target, mut request) = fixture(&temp, "alma9");
    std::fs::write(&target.output, "stale").unwrap();
    request.force = true;
    let backend = MockBackend::default();

    let outcome = run_target(0, target, &request, &backend, &StopSignal::new()).await;

    assert_eq!(outcome.status, TargetStatus::Done);
    assert_eq!(backend.calls(), vec![Call::Build("alma9".to_string())]);
  }

  #[tokio::test]
  async fn build_failure_skips_test_and_push() {
    let temp = TempDir::new().unwrap();
    let (target, mut request) = fixture(&temp, "alma9");
    request.test = true;
    request.push = true;
    request.registry = Some("registry.example.org/images".to_string());
    let backend = MockBackend::failing_build(&["alma9"]);

    let outcome = run_target(0, target, &request, &backend, &StopSignal::new()).await;

    assert_eq!(outcome.status, TargetStatus::Failed);
    assert!(outcome.error.as_deref().unwrap().starts_with("build failed"));
    assert_eq!(backend.calls(), vec![Call::Build("alma9".to_string())]);
  }

  #[tokio::test]
  async fn test_failure_leaves_artifact_but_fails() {
    let temp = TempDir::new().unwrap();
    let (target, mut request) = fixture(&temp, "alma9");
    request.test = true;
    let output = target.output.clone();
    let backend = MockBackend::failing_test(&["alma9"]);

    let outcome = run_target(0, target, &request, &backend, &StopSignal::new()).await;

    assert_eq!(outcome.status, TargetStatus::Failed);
    assert!(outcome.error.as_deref().unwrap().starts_with("test failed"));
    // The built artifact is still on disk even though the target failed.
    assert!(output.exists());
  }

  #[tokio::test]
  async fn push_runs_after_successful_test() {
    let temp = TempDir::new().unwrap();
    let (target, mut request) = fixture(&temp, "alma9");
    request.test = true;
    request.push = true;
    request.registry = Some("registry.example.org/images".to_string());
    let backend = MockBackend::default();

    let outcome = run_target(0, target, &request, &backend, &StopSignal::new()).await;

    assert_eq!(outcome.status, TargetStatus::Done);
    assert_eq!(
      backend.calls(),
      vec![
        Call::Build("alma9".to_string()),
        Call::Test("alma9".to_string()),
        Call::Push("alma9".to_string()),
      ]
    );
  }

  #[tokio::test]
  async fn read_only_context_never_pushes() {
    let temp = TempDir::new().unwrap();
    let (target, mut request) = fixture(&temp, "alma9");
    request.test = true;
    request.push = true;
    request.registry = Some("registry.example.org/images".to_string());
    request.read_only = true;
    let backend = MockBackend::default();

    let outcome = run_target(0, target, &request, &backend, &StopSignal::new()).await;

    assert_eq!(outcome.status, TargetStatus::Done);
    assert_eq!(
      backend.calls(),
      vec![Call::Build("alma9".to_string()), Call::Test("alma9".to_string())]
    );
  }

  #[tokio::test]
  async fn push_failure_fails_target() {
    let temp = TempDir::new().unwrap();
    let (target, mut request) = fixture(&temp, "alma9");
    request.push = true;
    request.registry = Some("registry.example.org/images".to_string());
    let backend = MockBackend {
      fail_push: vec!["alma9".to_string()],
      ..Default::default()
    };

    let outcome = run_target(0, target, &request, &backend, &StopSignal::new()).await;

    assert_eq!(outcome.status, TargetStatus::Failed);
    assert!(outcome.error.as_deref().unwrap().starts_with("push failed"));
  }

  #[tokio::test]
  async fn stop_signal_prevents_new_stages() {
    let temp = TempDir::new().unwrap();
    let (target, request) = fixture(&temp, "alma9");
    let backend = MockBackend::default();
    let stop = StopSignal::new();
    stop.trigger();

    let outcome = run_target(0, target, &request, &backend, &stop).await;

    assert_eq!(outcome.status, TargetStatus::Failed);
    assert!(outcome.error.as_deref().unwrap().contains("interrupted"));
    assert!(backend.calls().is_empty());
  }
}
