//! Command: print a shell completion script.
use std::io::Write;

use clap::CommandFactory as _;
use clap_complete::Shell;

use crate::cli::Cli;

/// Write the completion script for `shell` to `out`.
pub fn write(shell: Shell, out: &mut dyn Write) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, out);
}

/// Print the completion script for `shell` to stdout.
pub fn run(shell: Shell) {
    write(shell, &mut std::io::stdout().lock());
}
