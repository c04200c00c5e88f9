//! CLI configuration management.
//!
//! ```text
//! Cli
//! └── command
//!     ├── info <TABLE>                      # stored table summary
//!     └── plan --input SLOT=DIR ...         # iteration steps of a node
//!         ├── inputs: Vec<SlotSource>
//!         └── batching: BatchingArgs        # mode, columns, merge, missing data
//! ```
//!
//! Batching options can be provided via CLI arguments or `CELLFLOW_*`
//! environment variables. Use `--help` to see all available options.

mod batching;
mod input;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub use self::batching::{BatchingArgs, MatchingStrategy};
pub use self::input::SlotSource;

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "cellflow")]
#[command(about = "Inspect cellflow data tables and batch plans")]
#[command(version)]
pub struct Cli {
    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Prints a summary of a stored table.
    Info(InfoArgs),
    /// Prints the iteration steps a node would execute over stored tables.
    Plan(PlanArgs),
}

/// Arguments of `cellflow info`.
#[derive(Debug, Clone, Args)]
pub struct InfoArgs {
    /// Directory holding the table manifest.
    pub table: PathBuf,
}

/// Arguments of `cellflow plan`.
#[derive(Debug, Clone, Args)]
pub struct PlanArgs {
    /// Input slot and the table directory feeding it, as `SLOT=DIR`.
    ///
    /// Repeat for every input slot of the node. The slot accepts the data
    /// type of its stored table.
    #[arg(short, long = "input", value_name = "SLOT=DIR", required = true)]
    pub inputs: Vec<SlotSource>,

    /// Input slots that are optional.
    #[arg(long, value_name = "SLOT", value_delimiter = ',')]
    pub optional: Vec<String>,

    /// Batching behavior of the node.
    #[clap(flatten)]
    pub batching: BatchingArgs,
}

#[cfg(test)]
mod tests {
    use cellflow_runtime::batch::{AnnotationMergeMode, IterationMode};

    use super::*;

    #[test]
    fn test_parse_plan_command() {
        let cli = Cli::try_parse_from([
            "cellflow",
            "plan",
            "--input",
            "Image=./run/Image",
            "-i",
            "Mask=./run/Mask",
            "--optional",
            "Mask",
            "--mode",
            "merging",
            "--merge",
            "keep_first",
        ])
        .unwrap();

        let Command::Plan(args) = cli.command else {
            panic!("expected plan command");
        };
        assert_eq!(args.inputs.len(), 2);
        assert_eq!(args.inputs[1].slot, "Mask");
        assert_eq!(args.optional, vec!["Mask"]);
        assert_eq!(args.batching.mode, IterationMode::Merging);
        assert_eq!(args.batching.merge, AnnotationMergeMode::KeepFirst);
    }

    #[test]
    fn test_plan_requires_inputs() {
        assert!(Cli::try_parse_from(["cellflow", "plan"]).is_err());
        assert!(Cli::try_parse_from(["cellflow", "plan", "--input", "Image"]).is_err());
    }
}
