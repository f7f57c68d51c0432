//! `dotbackup` binary: parse arguments, start logging, dispatch.
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use dotbackup_cli::cli::{Cli, Command};
use dotbackup_cli::commands;
use dotbackup_cli::logging::{self, Logger};

/// Install the subscriber and create the logger for `command`.
fn start_logging(verbose: bool, command: &str) -> Arc<Logger> {
    logging::init_subscriber(verbose, command);
    let log = Arc::new(Logger::new(command));
    log.debug(&format!("dotbackup {}", commands::version::version()));
    log
}

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();
    let name = args.command.name();

    match args.command {
        Command::Backup(opts) => {
            let log = start_logging(args.verbose, name);
            commands::backup::run(&args.global, &opts, &commands::home_dir()?, &log)
        }
        Command::Apply(opts) => {
            let log = start_logging(args.verbose, name);
            commands::apply::run(&args.global, &opts, &commands::home_dir()?, &log)
        }
        Command::List => {
            let log = start_logging(args.verbose, name);
            commands::list::run(&args.global, &commands::home_dir()?, &log)
        }
        Command::Completions(opts) => {
            commands::completions::run(opts.shell);
            Ok(())
        }
        Command::Version => {
            commands::version::run();
            Ok(())
        }
    }
}
