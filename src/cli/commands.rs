//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: drive the build-fix loop from the last checkpoint
//! - status: show the stored checkpoint and fingerprint
//! - reset: clear the checkpoint and fingerprint

use clap::{Parser, Subcommand, ValueEnum};
use fixloop::domain::OutputMode;
use std::path::PathBuf;

/// Fixloop - resumable build-fix loop between an AI chat surface and CI
#[derive(Parser, Debug)]
#[command(name = "fixloop")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Override the state directory from the config
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the loop until the build passes, a ceiling is hit, or Ctrl-C
    Run {
        /// Clear the checkpoint and fingerprint before starting
        #[arg(long)]
        reset: bool,

        /// Override how the assistant's output is extracted
        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,
    },

    /// Show the stored checkpoint and failure fingerprint
    Status,

    /// Clear the checkpoint and failure fingerprint
    Reset,
}

/// Output extraction strategy, as spelled on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Inline,
    Download,
    Text,
}

impl From<ModeArg> for OutputMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Inline => OutputMode::InlineBlock,
            ModeArg::Download => OutputMode::DownloadedFile,
            ModeArg::Text => OutputMode::PlainText,
        }
    }
}
