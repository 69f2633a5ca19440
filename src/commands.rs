//! CLI command definitions
//!
//! Running fixtures is the default action; the subcommands cover the
//! companion tooling.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Generate client bindings from a containerized node
    Bindings {
        /// Where to write the generated source (default: bindings.output from config)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}
