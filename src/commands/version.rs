//! Command: print version information.

/// Version string: the release tag when built by CI, else the crate version.
#[must_use]
pub fn version() -> &'static str {
    option_env!("DOTBACKUP_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Print the dotbackup version to stdout.
pub fn run() {
    println!("dotbackup {}", version());
}
