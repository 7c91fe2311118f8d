use serde::{Deserialize, Serialize};

/// The host operating system family, detected once at startup by the probe
/// runtime and carried through probe results so the registry can render it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Apple macOS.
    MacOs,
    /// Microsoft Windows.
    Windows,
    /// Any Linux distribution.
    Linux,
}

impl Platform {
    /// Detects the current host platform from `cfg!(target_os)`.
    #[must_use]
    pub const fn detect() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Linux
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MacOs => write!(f, "macos"),
            Self::Windows => write!(f, "windows"),
            Self::Linux => write!(f, "linux"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_matches_current_target() {
        let platform = Platform::detect();
        #[cfg(target_os = "linux")]
        assert_eq!(platform, Platform::Linux);
        #[cfg(target_os = "macos")]
        assert_eq!(platform, Platform::MacOs);
        #[cfg(target_os = "windows")]
        assert_eq!(platform, Platform::Windows);
    }

    #[test]
    fn display_matches_serde_rename() {
        assert_eq!(Platform::MacOs.to_string(), "macos");
        assert_eq!(Platform::Windows.to_string(), "windows");
        assert_eq!(Platform::Linux.to_string(), "linux");
    }
}
