//! Package-manager state (scoop) exported as plain lists plus a restore
//! script.
use std::fs;
use std::path::Path;

use crate::error::StepError;
use crate::exec::Executor;

/// Installed apps, one per line.
pub const APPS_FILE: &str = "apps.txt";
/// Configured buckets, one per line.
pub const BUCKETS_FILE: &str = "buckets.txt";
/// PowerShell script that reinstalls everything.
pub const RESTORE_SCRIPT: &str = "restore.ps1";

const SCRIPT: &str = r"$ErrorActionPreference = 'Continue'

Get-Content -Path (Join-Path $PSScriptRoot 'buckets.txt') | Where-Object { $_ } | ForEach-Object {
    scoop bucket add $_
}

Get-Content -Path (Join-Path $PSScriptRoot 'apps.txt') | Where-Object { $_ } | ForEach-Object {
    scoop install $_
}
";

fn powershell_args(tail: &[&str]) -> Vec<String> {
    ["-NoProfile", "-ExecutionPolicy", "Bypass"]
        .iter()
        .chain(tail)
        .map(ToString::to_string)
        .collect()
}

/// First column of every row below the dashed header rule of a scoop table.
#[must_use]
pub fn parse_table(output: &str) -> Vec<String> {
    output
        .lines()
        .skip_while(|line| !is_rule(line))
        .skip(1)
        .map(str::trim)
        .take_while(|line| !line.is_empty())
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

fn is_rule(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && line.chars().all(|c| c == '-' || c.is_whitespace())
}

fn scoop(executor: &dyn Executor, command: &str) -> Result<String, StepError> {
    executor
        .run("powershell", &powershell_args(&["-Command", command]))
        .map(|r| r.stdout)
        .map_err(|e| StepError::Command(format!("{command}: {e:#}")))
}

fn write_lines(path: &Path, lines: &[String]) -> Result<(), StepError> {
    let mut content = lines.join("\n");
    content.push('\n');
    fs::write(path, content).map_err(|e| StepError::io("write", path, e))
}

/// Export app and bucket lists and the restore script into `dir`.
///
/// Returns the number of apps and buckets written.
///
/// # Errors
///
/// Returns [`StepError::Command`] if scoop fails and [`StepError::Io`] if
/// the files cannot be written.
pub fn export(executor: &dyn Executor, dir: &Path) -> Result<(usize, usize), StepError> {
    if !executor.which("scoop") {
        return Err(StepError::Command("scoop is not installed".to_string()));
    }
    let apps = parse_table(&scoop(executor, "scoop list")?);
    let buckets = parse_table(&scoop(executor, "scoop bucket list")?);

    fs::create_dir_all(dir).map_err(|e| StepError::io("create", dir, e))?;
    write_lines(&dir.join(APPS_FILE), &apps)?;
    write_lines(&dir.join(BUCKETS_FILE), &buckets)?;
    let script = dir.join(RESTORE_SCRIPT);
    fs::write(&script, SCRIPT).map_err(|e| StepError::io("write", &script, e))?;
    Ok((apps.len(), buckets.len()))
}

/// Run the restore script found in `dir`.
///
/// # Errors
///
/// Returns [`StepError::Io`] if the script is missing and
/// [`StepError::Command`] if it fails.
pub fn run_restore(executor: &dyn Executor, dir: &Path) -> Result<(), StepError> {
    let script = dir.join(RESTORE_SCRIPT);
    if !script.is_file() {
        return Err(StepError::io(
            "read",
            script,
            std::io::Error::new(std::io::ErrorKind::NotFound, "restore script missing"),
        ));
    }
    executor
        .run_in(dir, "powershell", &powershell_args(&["-File", RESTORE_SCRIPT]))
        .map(|_| ())
        .map_err(|e| StepError::Command(format!("{RESTORE_SCRIPT}: {e:#}")))
}
