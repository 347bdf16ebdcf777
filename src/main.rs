mod cli;
mod commands;
mod config;
mod stack;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use config::StackConfig;
use std::io;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    pub config: StackConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "notifier-stack", &mut io::stdout());
        return Ok(());
    }

    let ctx = Context {
        quiet: cli.quiet,
        config: StackConfig::resolve(cli.env_file.as_deref(), cli.asset)?,
    };

    match cli.command {
        Command::Synth(args) => commands::synth::run(&ctx, args.output.as_deref()),
        Command::List(args) => commands::list::run(&ctx, args.json),
        Command::Check => commands::check::run(&ctx),
        Command::Diff(args) => commands::snapshot::diff(&ctx, &args.snapshot, args.text),
        Command::Snapshot { path } => commands::snapshot::write(&ctx, &path),
        Command::Completions { .. } => Ok(()),
    }
}
