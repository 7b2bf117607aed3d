use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::{data_dir::Split, inspect::DEFAULT_STATS_RECORDS};

#[derive(Debug, Parser)]
#[command(
    name = "relik-prep",
    about = "Prepare AnnoCTR entity-linking data for the ReLiK toolkit",
    version
)]
pub struct Cli {
    /// Data directory root (raw/, processed/, windowed/, ...)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Pipeline configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Convert raw annotation splits into ReLiK documents
    Convert(SplitArgs),
    /// Verify that every converted span reproduces its mention
    Check(CheckArgs),
    /// Guess the span layout of raw split files (best effort)
    Inspect(InspectArgs),
    /// Build the technique document catalog from label links
    Catalog,
    /// Run the configured pipeline stages in order
    Run(RunArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

#[derive(Debug, Parser)]
pub struct SplitArgs {
    /// Restrict to these splits (repeatable); defaults to all
    #[arg(short = 's', long = "split")]
    pub splits: Vec<Split>,
}

impl SplitArgs {
    pub fn selected(&self) -> Vec<Split> {
        if self.splits.is_empty() {
            Split::ALL.to_vec()
        } else {
            let mut splits = self.splits.clone();
            splits.sort();
            splits.dedup();
            splits
        }
    }
}

#[derive(Debug, Parser)]
pub struct CheckArgs {
    #[command(flatten)]
    pub splits: SplitArgs,

    /// Check this file instead of the processed splits
    #[arg(long, conflicts_with = "splits")]
    pub input: Option<PathBuf>,

    /// Exit with an error when any record is bad
    #[arg(long)]
    pub strict: bool,
}

#[derive(Debug, Parser)]
pub struct InspectArgs {
    #[command(flatten)]
    pub splits: SplitArgs,

    /// Number of records used for the per-record span statistics
    #[arg(long, default_value_t = DEFAULT_STATS_RECORDS)]
    pub stats_records: usize,
}

#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Skip the conversion stage
    #[arg(long)]
    pub no_convert: bool,

    /// Skip the span check stage
    #[arg(long)]
    pub no_check: bool,

    /// Skip window creation
    #[arg(long)]
    pub no_windows: bool,

    /// Run candidate retrieval
    #[arg(long)]
    pub candidates: bool,

    /// Run reader training
    #[arg(long)]
    pub train_reader: bool,
}

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "relik-prep",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn convert_defaults_to_all_splits() {
        let cli = Cli::parse_from(["relik-prep", "convert"]);
        match cli.command {
            Command::Convert(args) => {
                assert_eq!(args.selected(), Split::ALL.to_vec());
            }
            _ => panic!("expected convert command"),
        }
    }

    #[test]
    fn repeated_splits_are_ordered_and_unique() {
        let cli = Cli::parse_from([
            "relik-prep", "convert", "-s", "test", "--split", "train", "-s",
            "test",
        ]);
        match cli.command {
            Command::Convert(args) => {
                assert_eq!(args.selected(), vec![Split::Train, Split::Test]);
            }
            _ => panic!("expected convert command"),
        }
    }

    #[test]
    fn unknown_split_is_rejected() {
        assert!(
            Cli::try_parse_from(["relik-prep", "convert", "-s", "holdout"])
                .is_err()
        );
    }

    #[test]
    fn check_input_conflicts_with_split() {
        assert!(
            Cli::try_parse_from([
                "relik-prep",
                "check",
                "--input",
                "x.jsonl",
                "-s",
                "train"
            ])
            .is_err()
        );
    }

    #[test]
    fn inspect_defaults() {
        let cli = Cli::parse_from(["relik-prep", "-vv", "inspect"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Inspect(args) => {
                assert_eq!(args.stats_records, DEFAULT_STATS_RECORDS);
            }
            _ => panic!("expected inspect command"),
        }
    }
}
