//! Backend adapter: uniform interface to the external container tool.
//!
//! The orchestrator only ever talks to a [`Backend`]; which concrete tool
//! runs underneath (Apptainer, Singularity, a stub in tests) is hidden
//! behind this trait.

pub mod apptainer;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::config::PrivilegeMode;

pub use apptainer::ApptainerBackend;

/// A produced image artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
  pub path: PathBuf,
  pub size: u64,
}

/// Build-time parameters, threaded explicitly per call.
///
/// `tmp_dir` is already namespaced per target by the caller; `cache_dir`
/// may be shared across targets (the backend tool manages its own cache
/// layout), `None` disables caching.
#[derive(Debug, Clone)]
pub struct BuildOptions {
  pub tmp_dir: PathBuf,
  pub cache_dir: Option<PathBuf>,
  pub privilege: PrivilegeMode,
}

/// Registry coordinates for publishing one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
  /// Registry host/namespace, e.g. `registry.example.org/images`.
  pub registry: String,
  /// Repository within the registry, normally the target name.
  pub repository: String,
  /// Tags to publish, in order.
  pub tags: Vec<String>,
}

/// Errors surfaced by a backend invocation.
#[derive(Debug, Error)]
pub enum BackendError {
  /// The backend command exited with a failure status.
  #[error("command failed with exit code {code:?}: {cmd}")]
  CmdFailed { cmd: String, code: Option<i32> },

  /// I/O error while invoking the backend or inspecting its output.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// The build command succeeded but produced no artifact.
  #[error("artifact missing after build: {0}")]
  ArtifactMissing(PathBuf),
}

/// Adapter over the external build/test/push tool.
///
/// All three operations block the calling worker until the tool finishes;
/// no extra concurrency is introduced inside a single target's pipeline.
#[async_trait]
pub trait Backend: Send + Sync {
  /// Build an image from a definition file into `output`.
  async fn build(&self, definition: &Path, output: &Path, options: &BuildOptions) -> Result<Artifact, BackendError>;

  /// Exercise a built image.
  async fn test(&self, artifact: &Path) -> Result<(), BackendError>;

  /// Publish a built image under every tag in `image`, in order.
  async fn push(&self, artifact: &Path, image: &ImageRef) -> Result<(), BackendError>;
}
