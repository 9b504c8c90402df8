use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(version, about = "Evaluate typed variable specs")]
pub struct Args {
    /// Increase logging verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

impl Args {
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate a spec file and print every bound variable
    Run {
        /// Path to the spec file
        file: PathBuf,
    },

    /// Evaluate a spec file and report errors only
    Check {
        /// Path to the spec file to check
        file: PathBuf,
    },

    /// Start an interactive REPL session
    Repl,
}
