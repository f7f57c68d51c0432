//! Log file location, ANSI stripping, and timestamps.
use std::fs;
use std::path::PathBuf;

/// Header timestamp in the log file.
pub(super) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Per-line timestamp in the log file.
pub(super) const TIME_FORMAT: &str = "%H:%M:%S";

/// Remove terminal escape sequences so the log file stays plain text.
///
/// CSI sequences (`ESC [` up to a final byte in `@`..`~`) are dropped
/// whole; any other escape drops the single character after `ESC`.
pub(super) fn strip_ansi(s: &str) -> String {
    let mut parts = s.split('\x1b');
    let mut out = parts.next().unwrap_or_default().to_string();
    for part in parts {
        let mut rest = part.chars();
        if rest.next() == Some('[') {
            rest.by_ref().find(|c| ('@'..='~').contains(c));
        }
        out.push_str(rest.as_str());
    }
    out
}

/// `<cache>/dotbackup`, where `<cache>` is `XDG_CACHE_HOME` or `~/.cache`.
fn cache_dir_from(env: impl Fn(&str) -> Option<String>) -> PathBuf {
    let cache = env("XDG_CACHE_HOME").map_or_else(
        || {
            env("HOME")
                .or_else(|| env("USERPROFILE"))
                .map_or_else(|| PathBuf::from("."), PathBuf::from)
                .join(".cache")
        },
        PathBuf::from,
    );
    cache.join("dotbackup")
}

/// Path of the log for `command`, creating its directory.
///
/// Returns `None` when the directory cannot be created; logging then stays
/// console-only.
pub(super) fn log_file_path(command: &str) -> Option<PathBuf> {
    let dir = cache_dir_from(|key| std::env::var(key).ok());
    fs::create_dir_all(&dir).ok()?;
    Some(dir.join(format!("{command}.log")))
}

/// Current UTC time rendered with a `chrono` format string.
pub(super) fn utc_now(format: &str) -> String {
    chrono::Utc::now().format(format).to_string()
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use std::path::Path;

    use super::*;

    fn env_of<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_string())
        }
    }

    #[test]
    fn strip_ansi_removes_console_styling() {
        assert_eq!(strip_ansi("\x1b[31mERROR\x1b[0m upload failed"), "ERROR upload failed");
        assert_eq!(
            strip_ansi("\x1b[1;34m==>\x1b[0m \x1b[1mBacking up fish\x1b[0m"),
            "==> Backing up fish"
        );
        assert_eq!(strip_ansi("plain"), "plain");
        assert_eq!(strip_ansi(""), "");
    }

    #[test]
    fn strip_ansi_drops_other_escapes() {
        assert_eq!(strip_ansi("\x1b[2Jcleared"), "cleared");
        assert_eq!(strip_ansi("\x1bMtext"), "text");
        assert_eq!(strip_ansi("trailing\x1b"), "trailing");
    }

    #[test]
    fn cache_dir_prefers_xdg() {
        let dir = cache_dir_from(env_of(&[("XDG_CACHE_HOME", "/xdg"), ("HOME", "/home/u")]));
        assert_eq!(dir, Path::new("/xdg/dotbackup"));
    }

    #[test]
    fn cache_dir_falls_back_to_home_then_userprofile() {
        let dir = cache_dir_from(env_of(&[("HOME", "/home/u")]));
        assert_eq!(dir, Path::new("/home/u/.cache/dotbackup"));
        let dir = cache_dir_from(env_of(&[("USERPROFILE", "/users/u")]));
        assert_eq!(dir, Path::new("/users/u/.cache/dotbackup"));
    }

    #[test]
    fn log_file_is_named_after_the_command() {
        if let Some(path) = log_file_path("apply") {
            assert!(path.ends_with("dotbackup/apply.log"));
        }
    }

    #[test]
    fn timestamps_follow_their_formats() {
        let t = utc_now(TIME_FORMAT);
        assert_eq!(t.len(), 8);
        assert_eq!(&t[2..3], ":");
        let dt = utc_now(DATETIME_FORMAT);
        assert_eq!(dt.len(), 19);
        assert_eq!(&dt[4..5], "-");
        assert_eq!(&dt[10..11], " ");
    }
}
