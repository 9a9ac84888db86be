//! Implementation of the `sifforge targets` command.
//!
//! Lists the targets and group aliases declared in the manifest.

use std::path::Path;

use anyhow::Result;

use sifforge_lib::resolve::{GROUP_ALL, TargetManifest};

use crate::output;

pub fn cmd_targets(defs_dir: &Path) -> Result<()> {
  let manifest = TargetManifest::load(defs_dir)?;

  output::print_info(&format!("Targets ({})", manifest.targets().len()));
  for name in manifest.targets() {
    println!("  {}", name);
  }

  println!();
  output::print_info("Groups");
  println!("  {} ({} targets)", GROUP_ALL, manifest.targets().len());
  for (name, members) in manifest.groups() {
    println!("  {} ({} targets)", name, members.len());
  }

  Ok(())
}
