//! Host platform detection.
use std::fmt;

/// Detected operating system platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    /// Linux and other Unix-likes (tar and gzip are always at hand).
    Linux,
    /// Windows (no bundled gzip, archives are zip).
    Windows,
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => write!(f, "linux"),
            Self::Windows => write!(f, "windows"),
        }
    }
}

/// Platform information for the current system.
#[derive(Debug, Clone)]
pub struct Platform {
    /// Operating system family.
    pub os: Os,
}

impl Platform {
    /// Detect the current platform.
    #[must_use]
    pub fn detect() -> Self {
        Self {
            os: Self::detect_os(),
        }
    }

    /// Create a platform with an explicit OS (for testing).
    #[must_use]
    pub const fn new(os: Os) -> Self {
        Self { os }
    }

    /// Whether a component limited to `supported` may run here.
    /// An empty list means every platform.
    #[must_use]
    pub fn supports(&self, supported: &[Os]) -> bool {
        supported.is_empty() || supported.contains(&self.os)
    }

    const fn detect_os() -> Os {
        if cfg!(target_os = "windows") {
            Os::Windows
        } else {
            // macOS and the BSDs behave like Linux for our purposes
            Os::Linux
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn platform_detect_on_unix_is_linux() {
        assert_eq!(Platform::detect().os, Os::Linux);
    }

    #[cfg(windows)]
    #[test]
    fn platform_detect_on_windows() {
        assert_eq!(Platform::detect().os, Os::Windows);
    }

    #[test]
    fn supports_empty_list_means_everywhere() {
        assert!(Platform::new(Os::Linux).supports(&[]));
        assert!(Platform::new(Os::Windows).supports(&[]));
    }

    #[test]
    fn supports_restricted_list() {
        assert!(!Platform::new(Os::Linux).supports(&[Os::Windows]));
        assert!(Platform::new(Os::Windows).supports(&[Os::Windows]));
    }

    #[test]
    fn os_display() {
        assert_eq!(Os::Linux.to_string(), "linux");
        assert_eq!(Os::Windows.to_string(), "windows");
    }
}
