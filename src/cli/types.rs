//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::models::FileKind;

#[derive(Parser, Debug)]
#[command(name = "buildrelay")]
#[command(about = "Buildrelay - remote firmware compilation orchestrator", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .buildrelay/config.yaml)
    #[arg(short, long, global = true, env = "BUILDRELAY_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List registered compiler agents and whether they are live
    Agents,

    /// Show the current status record of a request
    Status {
        /// Request id returned by `compile`
        request_id: String,
    },

    /// Compile a sketch on a live agent and download the binary
    Compile(CompileArgs),

    /// Download an artifact of a finished build
    Fetch(FetchArgs),
}

#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Source file to compile
    #[arg(short, long)]
    pub file: PathBuf,

    /// Target board (FQBN), e.g. arduino:avr:uno
    #[arg(short, long)]
    pub board: String,

    /// Library to install before compiling (repeatable)
    #[arg(short, long = "lib")]
    pub libraries: Vec<String>,

    /// Where to write the binary (defaults to the artifact's filename)
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Project the job belongs to, recorded with the request
    #[arg(long)]
    pub project: Option<String>,
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Build id reported by the agent
    pub build_id: String,

    /// File kind to download (defaults to the configured preference)
    #[arg(short, long)]
    pub kind: Option<FileKind>,

    /// Output path
    #[arg(short, long)]
    pub out: PathBuf,
}
