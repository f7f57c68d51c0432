//! Command-line interface definitions.
use clap::{Parser, Subcommand};

/// Top-level CLI entry point for the backup tool.
#[derive(Parser, Debug)]
#[command(
    name = "dotbackup",
    about = "Back up and restore configuration directories over SFTP",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Preview changes without applying
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,

    /// Config file (default: $DOTBACKUP_CONFIG or ~/.config/dotbackup/config.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<std::path::PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Archive components and upload them
    Backup(ComponentOpts),
    /// Download components and restore them in place
    #[command(alias = "restore")]
    Apply(ComponentOpts),
    /// List known components and where they live
    List,
    /// Print a shell completion script
    Completions(CompletionsOpts),
    /// Print version information
    Version,
}

impl Command {
    /// Name used for the log file.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Backup(_) => "backup",
            Self::Apply(_) => "apply",
            Self::List => "list",
            Self::Completions(_) => "completions",
            Self::Version => "version",
        }
    }
}

/// Components to operate on.
#[derive(Parser, Debug, Clone)]
pub struct ComponentOpts {
    /// Component names or aliases (fish, nvim, editor, scoop, ...)
    #[arg(required = true, value_name = "COMPONENT")]
    pub components: Vec<String>,
}

/// Options for the `completions` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct CompletionsOpts {
    /// Target shell
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
