//! Implementation of the `sifforge info` command.

use anyhow::Result;

use crate::output;

pub fn cmd_info() -> Result<()> {
  output::print_info(&format!("sifforge v{}", env!("CARGO_PKG_VERSION")));
  output::print_stat("OS", std::env::consts::OS);
  output::print_stat("Arch", std::env::consts::ARCH);
  Ok(())
}
