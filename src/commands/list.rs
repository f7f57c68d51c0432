//! List command: show every registered component and where it lives.
use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;

use super::CommandSetup;
use crate::archive::ArchiveFormat;
use crate::cli::GlobalOpts;
use crate::components::{Dirs, REGISTRY};
use crate::config::Config;
use crate::logging::Logger;
use crate::platform::Platform;
use crate::transport::remote_object_path;

const HEADER: [&str; 5] = ["NAME", "ALIASES", "PLATFORMS", "LOCAL PATH", "REMOTE OBJECT"];

/// Run the list command.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded.
pub fn run(global: &GlobalOpts, home: &Path, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, home, log)?;
    let dirs = Dirs::from_env(&setup.home);
    log.stage("Components");
    print!("{}", render(&setup.platform, &dirs, &setup.config));
    Ok(())
}

/// Registry table for `platform`, with paths resolved against `dirs` and
/// the configuration's overrides.
#[must_use]
pub fn render(platform: &Platform, dirs: &Dirs, config: &Config) -> String {
    let format = ArchiveFormat::for_os(platform.os);
    let rows: Vec<[String; 5]> = REGISTRY
        .iter()
        .map(|c| {
            let aliases = if c.aliases.is_empty() {
                "-".to_string()
            } else {
                c.aliases.join(", ")
            };
            let platforms = if c.platforms.is_empty() {
                "all".to_string()
            } else {
                c.platforms
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            let local = c
                .local_dir(platform, dirs, &config.paths)
                .map_or_else(|| "(package list)".to_string(), |p| p.display().to_string());
            let remote = remote_object_path(&config.remote.base_path, c.name, format);
            [c.name.to_string(), aliases, platforms, local, remote]
        })
        .collect();

    let mut widths = HEADER.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    let header = HEADER.map(str::to_string);
    for row in std::iter::once(&header).chain(&rows) {
        let mut line = String::new();
        for (cell, width) in row.iter().zip(widths) {
            let _ = write!(line, "{cell:<width$}  ");
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::platform::Os;

    #[cfg(unix)]
    #[test]
    fn linux_listing() {
        let out = render(
            &Platform::new(Os::Linux),
            &Dirs::new("/home/u"),
            &Config::default(),
        );
        insta::assert_snapshot!(out, @r"
        NAME   ALIASES          PLATFORMS  LOCAL PATH            REMOTE OBJECT
        fish   -                all        /home/u/.config/fish  /srv/dotbackup/fish_backup.tar.gz
        nvim   editor, neovim   all        /home/u/.config/nvim  /srv/dotbackup/nvim_backup.tar.gz
        scoop  package-manager  windows    (package list)        /srv/dotbackup/scoop_backup.tar.gz
        ");
    }

    #[test]
    fn windows_listing_uses_zip_objects() {
        let out = render(
            &Platform::new(Os::Windows),
            &Dirs::new("/home/u"),
            &Config::default(),
        );
        assert!(out.contains("/srv/dotbackup/scoop_backup.zip"));
        assert!(out.contains("/srv/dotbackup/fish_backup.zip"));
    }

    #[test]
    fn path_overrides_are_shown() {
        let mut config = Config::default();
        config
            .paths
            .insert("fish".to_string(), PathBuf::from("/opt/fish-conf"));
        let out = render(&Platform::new(Os::Linux), &Dirs::new("/home/u"), &config);
        assert!(out.contains("/opt/fish-conf"));
    }
}
