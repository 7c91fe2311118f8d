use thiserror::Error;

/// Errors from the probe runtime's dispatch layer.
///
/// Per-probe failures (timeout, permission denial) are *not* represented
/// here: they are reported as a [`diag_types::ProbeResult`] with
/// `success = false`, since the model needs to reason about them. This
/// enum is reserved for failures that mean no result could be produced at
/// all.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// No probe is registered under this name.
    #[error("no such probe: {name}")]
    NotFound {
        /// The requested probe name.
        name: String,
    },

    /// The probe does not support the current host platform.
    #[error("probe '{name}' does not support platform {platform}")]
    UnsupportedPlatform {
        /// The probe name.
        name: String,
        /// The unsupported platform.
        platform: diag_types::Platform,
    },

    /// A required argument was missing or the wrong shape.
    #[error("invalid arguments for '{name}': {message}")]
    ArgumentInvalid {
        /// The probe name.
        name: String,
        /// Description of what was wrong.
        message: String,
    },

    /// Spawning or waiting on the child process failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
