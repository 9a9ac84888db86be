//! Run configuration.
//!
//! A [`BuildRequest`] is constructed once per invocation, validated, and
//! then shared read-only (behind an `Arc`) by every worker. All paths the
//! backend needs are carried here explicitly rather than read from ambient
//! environment variables.

use std::path::PathBuf;

use thiserror::Error;

/// How the build backend gains the privileges it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegeMode {
  /// Run the backend under `sudo`.
  Elevated,
  /// Run unprivileged with user-namespace fakeroot.
  Unprivileged,
}

/// Immutable configuration snapshot for one orchestrator run.
#[derive(Debug, Clone)]
pub struct BuildRequest {
  /// Maximum number of targets concurrently in an active stage.
  pub parallelism: usize,

  /// Rebuild even when the output artifact already exists.
  pub force: bool,

  /// Run the test stage after a successful build.
  pub test: bool,

  /// Push successful artifacts to the registry.
  pub push: bool,

  /// Directory holding `targets.toml` and the definition files.
  pub defs_dir: PathBuf,

  /// Directory where image artifacts are written.
  pub output_dir: PathBuf,

  /// Shared temporary directory; each target gets its own subdirectory.
  pub tmp_dir: PathBuf,

  /// Backend layer cache, or `None` to disable caching.
  pub cache_dir: Option<PathBuf>,

  /// Registry host/namespace, e.g. `registry.example.org/images`.
  pub registry: Option<String>,

  /// Tags applied on push, in order.
  pub tags: Vec<String>,

  pub privilege: PrivilegeMode,

  /// Read-only run context: publishing side effects must never occur,
  /// regardless of the push flag.
  pub read_only: bool,
}

impl Default for BuildRequest {
  fn default() -> Self {
    Self {
      parallelism: 1,
      force: false,
      test: false,
      push: false,
      defs_dir: PathBuf::from("definitions"),
      output_dir: PathBuf::from("images"),
      tmp_dir: std::env::temp_dir().join("sifforge"),
      cache_dir: None,
      registry: None,
      tags: vec!["latest".to_string()],
      privilege: PrivilegeMode::Unprivileged,
      read_only: false,
    }
  }
}

impl BuildRequest {
  /// Validate the request before any scheduling happens.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.parallelism < 1 {
      return Err(ConfigError::InvalidParallelism(self.parallelism));
    }
    if self.push && self.registry.is_none() {
      return Err(ConfigError::PushWithoutRegistry);
    }
    if self.push && self.tags.is_empty() {
      return Err(ConfigError::EmptyTags);
    }
    Ok(())
  }
}

/// Fatal configuration errors, raised before any target is scheduled.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// Parallelism must be at least 1.
  #[error("invalid parallelism {0}: must be at least 1")]
  InvalidParallelism(usize),

  /// Pushing requires registry coordinates.
  #[error("push requested but no registry configured")]
  PushWithoutRegistry,

  /// Pushing requires at least one tag.
  #[error("push requested but tag list is empty")]
  EmptyTags,
}
