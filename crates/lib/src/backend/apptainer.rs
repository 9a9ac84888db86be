//! Apptainer backend implementation.
//!
//! Shells out to the `apptainer` binary (or a compatible one such as
//! `singularity`). Cache and temporary directories are passed explicitly
//! through the tool's environment variables, never inherited from the
//! orchestrator's own environment.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::PrivilegeMode;

use super::{Artifact, Backend, BackendError, BuildOptions, ImageRef};

/// Backend invoking the Apptainer CLI.
#[derive(Debug, Clone)]
pub struct ApptainerBackend {
  program: String,
}

impl Default for ApptainerBackend {
  fn default() -> Self {
    Self::new("apptainer")
  }
}

impl ApptainerBackend {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
    }
  }

  /// Base command for one invocation, honoring the privilege mode.
  fn command(&self, privilege: PrivilegeMode) -> Command {
    match privilege {
      PrivilegeMode::Elevated => {
        let mut cmd = Command::new("sudo");
        cmd.arg(&self.program);
        cmd
      }
      PrivilegeMode::Unprivileged => Command::new(&self.program),
    }
  }

  /// Run a prepared command to completion, mapping failure to `CmdFailed`.
  async fn run(mut cmd: Command, label: String) -> Result<(), BackendError> {
    debug!(cmd = %label, "spawning backend process");

    let output = cmd.stdin(Stdio::null()).output().await?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stdout.is_empty() {
      debug!(stdout = %stdout, "backend stdout");
    }
    if !stderr.is_empty() {
      debug!(stderr = %stderr, "backend stderr");
    }

    if !output.status.success() {
      return Err(BackendError::CmdFailed {
        cmd: label,
        code: output.status.code(),
      });
    }
    Ok(())
  }
}

#[async_trait]
impl Backend for ApptainerBackend {
  async fn build(&self, definition: &Path, output: &Path, options: &BuildOptions) -> Result<Artifact, BackendError> {
    let mut cmd = self.command(options.privilege);
    cmd.arg("build");
    if options.privilege == PrivilegeMode::Unprivileged {
      cmd.arg("--fakeroot");
    }
    // The gate has already decided this target builds; let the tool
    // overwrite any stale artifact without prompting.
    cmd.arg("--force");
    cmd.arg(output).arg(definition);

    cmd.env("APPTAINER_TMPDIR", &options.tmp_dir);
    match &options.cache_dir {
      Some(dir) => {
        cmd.env("APPTAINER_CACHEDIR", dir);
      }
      None => {
        cmd.env("APPTAINER_DISABLE_CACHE", "yes");
      }
    }

    let label = format!("{} build {}", self.program, output.display());
    info!(definition = %definition.display(), artifact = %output.display(), "building image");
    Self::run(cmd, label).await?;

    let metadata = tokio::fs::metadata(output)
      .await
      .map_err(|_| BackendError::ArtifactMissing(output.to_path_buf()))?;
    Ok(Artifact {
      path: output.to_path_buf(),
      size: metadata.len(),
    })
  }

  async fn test(&self, artifact: &Path) -> Result<(), BackendError> {
    let mut cmd = Command::new(&self.program);
    cmd.arg("test").arg(artifact);

    let label = format!("{} test {}", self.program, artifact.display());
    info!(artifact = %artifact.display(), "testing image");
    Self::run(cmd, label).await
  }

  async fn push(&self, artifact: &Path, image: &ImageRef) -> Result<(), BackendError> {
    for tag in &image.tags {
      let reference = format!("oras://{}/{}:{}", image.registry, image.repository, tag);
      let mut cmd = Command::new(&self.program);
      cmd.arg("push").arg(artifact).arg(&reference);

      let label = format!("{} push {} {}", self.program, artifact.display(), reference);
      info!(artifact = %artifact.display(), reference = %reference, "pushing image");
      Self::run(cmd, label).await?;
    }
    Ok(())
  }
}
