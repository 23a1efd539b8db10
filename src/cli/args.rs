use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Vendors pinned snapshots of upstream C/C++ libraries into the monorepo.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct CliArgs {
    #[command(subcommand)]
    pub cmd: Command,
    /// Monorepo root; discovered by walking up from the current directory
    /// when not given.
    #[arg(short, long)]
    pub root: Option<PathBuf>,
    /// Directory under the root holding the per-library recipe toml files.
    #[arg(long, default_value = "upstream_utils")]
    pub recipe_dir: PathBuf,
    /// Scratch-clone cache location.
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Updates the vendored sources for the named libraries, or for every
    /// recipe when no names are given
    Update { names: Vec<String> },
    /// Deletes the scratch-clone cache
    ClearCache,
}
