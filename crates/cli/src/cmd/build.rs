//! Implementation of the `sifforge build` command.
//!
//! Resolves the requested targets, runs the bounded-parallel
//! build/test/push pipeline, and prints the aggregated summary. Returns
//! the process exit code: 0 when every non-skipped target is done, 1 when
//! any target failed. Resolution and configuration errors bubble up as
//! `Err` and exit 2 before anything is scheduled.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::warn;

use sifforge_lib::backend::ApptainerBackend;
use sifforge_lib::config::{BuildRequest, PrivilegeMode};
use sifforge_lib::pipeline::{self, StopSignal};
use sifforge_lib::resolve::{self, TargetManifest};
use sifforge_lib::target::TargetStatus;

use crate::output::{self, symbols};

#[derive(Debug, Args)]
pub struct BuildArgs {
  /// Target names or group aliases to build (default: all)
  pub targets: Vec<String>,

  /// Directory holding targets.toml and the definition files
  #[arg(long, default_value = "definitions")]
  pub defs_dir: PathBuf,

  /// Directory where image artifacts are written
  #[arg(long, default_value = "images")]
  pub output_dir: PathBuf,

  /// Maximum number of targets built concurrently
  #[arg(short, long, default_value_t = 1)]
  pub parallel: usize,

  /// Rebuild even when the output artifact already exists
  #[arg(long)]
  pub force: bool,

  /// Run the image test stage after each successful build
  #[arg(long)]
  pub test: bool,

  /// Push successful images to the registry
  #[arg(long)]
  pub push: bool,

  /// Registry host/namespace to push to, e.g. registry.example.org/images
  #[arg(long)]
  pub registry: Option<String>,

  /// Tag to publish (repeatable, applied in order)
  #[arg(long = "tag", default_value = "latest")]
  pub tags: Vec<String>,

  /// Backend layer cache directory
  #[arg(long, conflicts_with = "no_cache")]
  pub cache_dir: Option<PathBuf>,

  /// Disable the backend layer cache
  #[arg(long)]
  pub no_cache: bool,

  /// Shared temporary directory (each target gets its own subdirectory)
  #[arg(long)]
  pub tmpdir: Option<PathBuf>,

  /// Build unprivileged with user-namespace fakeroot instead of sudo
  #[arg(long)]
  pub fakeroot: bool,

  /// Read-only run context: never push, regardless of --push
  #[arg(long)]
  pub read_only: bool,

  /// Container tool to invoke (apptainer or singularity)
  #[arg(long, default_value = "apptainer")]
  pub backend_cmd: String,
}

pub fn cmd_build(args: BuildArgs) -> Result<u8> {
  let tmp_dir = args.tmpdir.unwrap_or_else(|| std::env::temp_dir().join("sifforge"));
  let cache_dir = if args.no_cache {
    None
  } else {
    Some(args.cache_dir.unwrap_or_else(|| tmp_dir.join("cache")))
  };

  let request = BuildRequest {
    parallelism: args.parallel,
    force: args.force,
    test: args.test,
    push: args.push,
    defs_dir: args.defs_dir,
    output_dir: args.output_dir,
    tmp_dir,
    cache_dir,
    registry: args.registry,
    tags: args.tags,
    privilege: if args.fakeroot {
      PrivilegeMode::Unprivileged
    } else {
      PrivilegeMode::Elevated
    },
    read_only: args.read_only,
  };
  request.validate()?;

  let manifest = TargetManifest::load(&request.defs_dir)?;
  let targets = resolve::resolve(&args.targets, &manifest, &request)?;

  std::fs::create_dir_all(&request.output_dir)
    .with_context(|| format!("Failed to create output directory: {}", request.output_dir.display()))?;
  std::fs::create_dir_all(&request.tmp_dir)
    .with_context(|| format!("Failed to create temporary directory: {}", request.tmp_dir.display()))?;

  if request.push && request.read_only {
    output::print_warning("read-only context: pushes will be skipped");
  }

  output::print_info(&format!(
    "Building {} target(s), parallelism {}",
    targets.len(),
    request.parallelism
  ));

  let backend = Arc::new(ApptainerBackend::new(args.backend_cmd));
  let request = Arc::new(request);

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let summary = rt.block_on(async {
    let stop = StopSignal::new();
    let watcher = {
      let stop = stop.clone();
      tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
          warn!("interrupt received, finishing in-flight stages");
          stop.trigger();
        }
      })
    };

    let summary = pipeline::run(targets, request, backend, stop).await;
    watcher.abort();
    summary
  });

  println!();
  for outcome in summary.outcomes() {
    let duration = output::format_duration(outcome.duration);
    match outcome.status {
      TargetStatus::Done => {
        let size = outcome.artifact_size.map(output::format_bytes).unwrap_or_default();
        output::print_success(&format!("{} ({}, {})", outcome.name, size, duration));
      }
      TargetStatus::Skipped => {
        println!("{} {} (up to date)", symbols::SKIP, outcome.name);
      }
      _ => {
        let error = outcome.error.as_deref().unwrap_or("unknown error");
        output::print_error(&format!("{} ({}): {}", outcome.name, duration, error));
      }
    }
  }

  println!();
  output::print_stat("Done", &summary.done.to_string());
  output::print_stat("Failed", &summary.failed.to_string());
  output::print_stat("Skipped", &summary.skipped.to_string());

  if !summary.is_success() {
    println!();
    output::print_error(&format!("{} target(s) failed:", summary.failed));
    for outcome in summary.failures() {
      output::print_error(&format!(
        "  {}: {}",
        outcome.name,
        outcome.error.as_deref().unwrap_or("unknown error")
      ));
    }
  }

  Ok(summary.exit_code())
}
