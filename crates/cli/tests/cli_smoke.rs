//! CLI smoke tests for sifforge.
//!
//! These tests verify exit-code semantics (0 success, 1 target failure,
//! 2 resolution/config error) and end-to-end orchestration against a stub
//! backend program standing in for apptainer.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

#[cfg(unix)]
use std::path::{Path, PathBuf};

/// Get a Command for the sifforge binary.
fn sifforge_cmd() -> Command {
  cargo_bin_cmd!("sifforge")
}

const MANIFEST: &str = r#"
targets = ["alma9", "debian12"]

[groups]
rhel-family = ["alma9"]
"#;

/// Create a temp definitions directory with a manifest and def files.
fn temp_defs(manifest: &str, defs: &[&str]) -> TempDir {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("targets.toml"), manifest).unwrap();
  for name in defs {
    std::fs::write(temp.path().join(format!("{}.def", name)), "Bootstrap: docker\n").unwrap();
  }
  temp
}

/// Write an executable stub that mimics the apptainer CLI: records the
/// subcommand to $STUB_LOG if set, creates the output file on build.
#[cfg(unix)]
fn write_stub(dir: &Path, fail_build: bool) -> PathBuf {
  use std::os::unix::fs::PermissionsExt;

  let path = dir.join("stub-backend");
  let script = format!(
    r#"#!/bin/sh
if [ -n "$STUB_LOG" ]; then echo "$1" >> "$STUB_LOG"; fi
case "$1" in
  build)
    {on_build}
    shift
    while [ "${{1#--}}" != "$1" ]; do shift; done
    printf sif > "$1"
    ;;
  test) exit 0 ;;
  push) exit 0 ;;
esac
exit 0
"#,
    on_build = if fail_build { "exit 1" } else { ":" }
  );
  std::fs::write(&path, script).unwrap();
  std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
  path
}

/// Build command against a defs dir and stub backend, with isolated
/// output/tmp dirs inside the same temp tree.
#[cfg(unix)]
fn build_cmd(temp: &TempDir, stub: &Path) -> Command {
  let mut cmd = sifforge_cmd();
  cmd
    .arg("build")
    .arg("--defs-dir")
    .arg(temp.path())
    .arg("--output-dir")
    .arg(temp.path().join("images"))
    .arg("--tmpdir")
    .arg(temp.path().join("tmp"))
    .arg("--no-cache")
    .arg("--fakeroot")
    .arg("--backend-cmd")
    .arg(stub);
  cmd
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  sifforge_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  sifforge_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("sifforge"));
}

#[test]
fn subcommand_help_works() {
  for cmd in &["build", "targets", "info"] {
    sifforge_cmd()
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

// =============================================================================
// targets
// =============================================================================

#[test]
fn targets_lists_declared_names_and_groups() {
  let temp = temp_defs(MANIFEST, &["alma9", "debian12"]);

  sifforge_cmd()
    .arg("targets")
    .arg("--defs-dir")
    .arg(temp.path())
    .assert()
    .success()
    .stdout(predicate::str::contains("alma9"))
    .stdout(predicate::str::contains("debian12"))
    .stdout(predicate::str::contains("rhel-family"))
    .stdout(predicate::str::contains("all"));
}

#[test]
fn targets_without_manifest_fails() {
  let temp = TempDir::new().unwrap();

  sifforge_cmd()
    .arg("targets")
    .arg("--defs-dir")
    .arg(temp.path())
    .assert()
    .failure()
    .code(2)
    .stderr(predicate::str::contains("target manifest not found"));
}

// =============================================================================
// build: resolution and config errors (exit 2)
// =============================================================================

#[test]
fn unknown_target_exits_2() {
  let temp = temp_defs(MANIFEST, &["alma9", "debian12"]);

  sifforge_cmd()
    .arg("build")
    .arg("bogus")
    .arg("--defs-dir")
    .arg(temp.path())
    .assert()
    .failure()
    .code(2)
    .stderr(predicate::str::contains("unknown target: bogus"));
}

#[test]
fn missing_definition_exits_2_naming_path() {
  // debian12 declared, but only alma9.def exists
  let temp = temp_defs(MANIFEST, &["alma9"]);

  sifforge_cmd()
    .arg("build")
    .arg("debian12")
    .arg("--defs-dir")
    .arg(temp.path())
    .assert()
    .failure()
    .code(2)
    .stderr(predicate::str::contains("definition not found"))
    .stderr(predicate::str::contains("debian12.def"));
}

#[test]
fn zero_parallelism_exits_2() {
  let temp = temp_defs(MANIFEST, &["alma9", "debian12"]);

  sifforge_cmd()
    .arg("build")
    .arg("--defs-dir")
    .arg(temp.path())
    .arg("--parallel")
    .arg("0")
    .assert()
    .failure()
    .code(2)
    .stderr(predicate::str::contains("invalid parallelism"));
}

#[test]
fn push_without_registry_exits_2() {
  let temp = temp_defs(MANIFEST, &["alma9", "debian12"]);

  sifforge_cmd()
    .arg("build")
    .arg("--defs-dir")
    .arg(temp.path())
    .arg("--push")
    .assert()
    .failure()
    .code(2)
    .stderr(predicate::str::contains("no registry"));
}

#[test]
fn cache_dir_conflicts_with_no_cache() {
  let temp = temp_defs(MANIFEST, &["alma9", "debian12"]);

  sifforge_cmd()
    .arg("build")
    .arg("--defs-dir")
    .arg(temp.path())
    .arg("--cache-dir")
    .arg(temp.path().join("cache"))
    .arg("--no-cache")
    .assert()
    .failure()
    .code(2);
}

// =============================================================================
// build: end-to-end against the stub backend
// =============================================================================

#[test]
#[cfg(unix)]
fn build_all_succeeds_and_is_idempotent() {
  let temp = temp_defs(MANIFEST, &["alma9", "debian12"]);
  let stub = write_stub(temp.path(), false);

  build_cmd(&temp, &stub)
    .assert()
    .success()
    .stdout(predicate::str::contains("Done: 2"));

  let alma = temp.path().join("images").join("alma9.sif");
  let debian = temp.path().join("images").join("debian12.sif");
  assert!(alma.exists());
  assert!(debian.exists());

  // Second run without --force skips everything and leaves the
  // artifacts untouched.
  build_cmd(&temp, &stub)
    .assert()
    .success()
    .stdout(predicate::str::contains("Skipped: 2"))
    .stdout(predicate::str::contains("up to date"));
}

#[test]
#[cfg(unix)]
fn build_group_builds_only_members() {
  let temp = temp_defs(MANIFEST, &["alma9", "debian12"]);
  let stub = write_stub(temp.path(), false);

  build_cmd(&temp, &stub).arg("rhel-family").assert().success();

  assert!(temp.path().join("images").join("alma9.sif").exists());
  assert!(!temp.path().join("images").join("debian12.sif").exists());
}

#[test]
#[cfg(unix)]
fn failing_build_exits_1_with_summary() {
  let temp = temp_defs(MANIFEST, &["alma9", "debian12"]);
  let stub = write_stub(temp.path(), true);

  build_cmd(&temp, &stub)
    .assert()
    .failure()
    .code(1)
    .stderr(predicate::str::contains("alma9"))
    .stderr(predicate::str::contains("build failed"));
}

#[test]
#[cfg(unix)]
fn read_only_run_never_pushes() {
  let temp = temp_defs(MANIFEST, &["alma9", "debian12"]);
  let stub = write_stub(temp.path(), false);
  let log = temp.path().join("stub.log");

  build_cmd(&temp, &stub)
    .arg("--test")
    .arg("--push")
    .arg("--registry")
    .arg("registry.example.org/images")
    .arg("--read-only")
    .env("STUB_LOG", &log)
    .assert()
    .success()
    .stderr(predicate::str::contains("read-only context"));

  let recorded = std::fs::read_to_string(&log).unwrap();
  assert!(recorded.contains("build"));
  assert!(recorded.contains("test"));
  assert!(!recorded.contains("push"));
}

#[test]
#[cfg(unix)]
fn push_run_publishes_after_test() {
  let temp = temp_defs(MANIFEST, &["alma9", "debian12"]);
  let stub = write_stub(temp.path(), false);
  let log = temp.path().join("stub.log");

  build_cmd(&temp, &stub)
    .arg("--test")
    .arg("--push")
    .arg("--registry")
    .arg("registry.example.org/images")
    .env("STUB_LOG", &log)
    .assert()
    .success();

  let recorded = std::fs::read_to_string(&log).unwrap();
  assert!(recorded.contains("push"));
}

// =============================================================================
// info
// =============================================================================

#[test]
fn info_shows_version() {
  sifforge_cmd()
    .arg("info")
    .assert()
    .success()
    .stdout(predicate::str::contains("sifforge v"));
}
