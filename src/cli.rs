use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "notifier-stack")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Synthesize and check the game price notifier stack", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Load environment variables from this file instead of ./.env
    #[arg(long, global = true, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Packaged function artifact
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        env = "NOTIFIER_ASSET",
        default_value = crate::config::DEFAULT_ASSET
    )]
    pub asset: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the synthesized template
    Synth(SynthArgs),

    /// List resources in synthesis order
    List(ListArgs),

    /// Run the structural checks for the stack
    Check,

    /// Compare the template against a stored snapshot
    Diff(DiffArgs),

    /// Write the current template as the stored snapshot
    Snapshot {
        /// Snapshot file to write
        path: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct SynthArgs {
    /// Write <DIR>/<stack>.template.json instead of printing
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct DiffArgs {
    /// Stored snapshot to compare against
    pub snapshot: PathBuf,

    /// Also print a line diff of the two documents
    #[arg(long)]
    pub text: bool,
}
