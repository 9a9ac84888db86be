//! sifforge: orchestrates building, testing, and publishing container
//! images from declarative definition files.

mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Exit code for fatal resolution/configuration errors, distinct from
/// per-target build failures (1).
const EXIT_USAGE: u8 = 2;

#[derive(Parser)]
#[command(name = "sifforge")]
#[command(author, version, about = "Container image build orchestrator", long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build, test, and push container images
  Build(cmd::BuildArgs),

  /// List declared targets and groups
  Targets {
    /// Directory holding targets.toml and the definition files
    #[arg(long, default_value = "definitions")]
    defs_dir: PathBuf,
  },

  /// Show version and host information
  Info,
}

fn main() -> ExitCode {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .without_time()
    .init();

  let cli = Cli::parse();

  let result = match cli.command {
    Commands::Build(args) => cmd::cmd_build(args),
    Commands::Targets { defs_dir } => cmd::cmd_targets(&defs_dir).map(|()| 0),
    Commands::Info => cmd::cmd_info().map(|()| 0),
  };

  match result {
    Ok(code) => ExitCode::from(code),
    Err(err) => {
      output::print_error(&format!("{:#}", err));
      ExitCode::from(EXIT_USAGE)
    }
  }
}
