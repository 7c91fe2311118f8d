#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Probe runtime: executes named, platform-specific diagnostic and
//! remediation probes with a hard wall-clock timeout.
//!
//! Detects the host platform once at startup and dispatches each `run`
//! call to the matching implementation. Each probe is a black box from the
//! caller's perspective: it receives typed arguments and returns a
//! [`diag_types::ProbeResult`], never panicking and never blocking past
//! its timeout.

mod error;
mod exec;
mod probes;

use std::path::PathBuf;
use std::time::Duration;

use diag_types::{Platform, ProbeResult};
use serde_json::{Map, Value};

pub use error::ProbeError;
pub use exec::{CommandOutput, DEFAULT_TIMEOUT, run_with_timeout};
pub use probes::Probe;

/// Ambient invocation context passed to every probe.
///
/// Mirrors the `{executable, args, env, cwd}` subprocess contract in §6;
/// most built-in probes only need the default (inherited environment,
/// current working directory). `default_timeout` is overwritten by
/// [`ProbeRuntime::run`] with the runtime's configured value before the
/// probe sees it, so callers constructing a bare `ProbeContext` need not
/// set it themselves.
#[derive(Debug, Clone)]
pub struct ProbeContext {
    /// Extra environment variables to set on any subprocess the probe
    /// spawns, in addition to the inherited environment.
    pub env: Vec<(String, String)>,
    /// Working directory for any subprocess the probe spawns. `None`
    /// inherits the runtime's own working directory.
    pub cwd: Option<PathBuf>,
    /// Wall-clock timeout a probe should use when it has no fixed
    /// override of its own (`probeDefaultTimeoutMs`).
    pub default_timeout: Duration,
    /// Minimum file age, in seconds, the temp-file cleanup probe requires
    /// before a file is even considered for removal (`tempFileMinAgeSeconds`).
    pub temp_file_min_age_seconds: u64,
}

/// Safety-rail floor for `tempFileMinAgeSeconds`: never treat a file as
/// disposable within an hour of modification, regardless of configuration.
const DEFAULT_TEMP_FILE_MIN_AGE_SECONDS: u64 = 3600;

impl Default for ProbeContext {
    fn default() -> Self {
        Self {
            env: Vec::new(),
            cwd: None,
            default_timeout: DEFAULT_TIMEOUT,
            temp_file_min_age_seconds: DEFAULT_TEMP_FILE_MIN_AGE_SECONDS,
        }
    }
}

/// Owns the registered probe table, the detected host platform, and the
/// configured default per-probe timeout (`probeDefaultTimeoutMs`).
pub struct ProbeRuntime {
    platform: Platform,
    probes: std::collections::HashMap<&'static str, Box<dyn Probe>>,
    default_timeout: Duration,
    temp_file_min_age_seconds: u64,
}

impl ProbeRuntime {
    /// Detects the host platform and registers all built-in probes, using
    /// `default_timeout` for any probe that does not declare its own
    /// override and the conservative built-in floor for
    /// `tempFileMinAgeSeconds`.
    #[must_use]
    pub fn new(default_timeout: Duration) -> Self {
        Self::with_temp_file_min_age(default_timeout, DEFAULT_TEMP_FILE_MIN_AGE_SECONDS)
    }

    /// Like [`Self::new`], but also configures the minimum age (in seconds)
    /// the temp-file cleanup probe requires before a file qualifies for
    /// removal (`tempFileMinAgeSeconds`).
    #[must_use]
    pub fn with_temp_file_min_age(default_timeout: Duration, temp_file_min_age_seconds: u64) -> Self {
        let platform = Platform::detect();
        log::info!("probe runtime detected platform: {platform}");
        let mut probes = std::collections::HashMap::new();
        for probe in probes::builtin_probes() {
            probes.insert(probe.name(), probe);
        }
        Self { platform, probes, default_timeout, temp_file_min_age_seconds }
    }

    /// The detected host platform.
    #[must_use]
    pub const fn platform(&self) -> Platform {
        self.platform
    }

    /// Names of every registered probe, in registration order is not
    /// guaranteed (backed by a hash map); callers needing a stable order
    /// should sort.
    #[must_use]
    pub fn probe_names(&self) -> Vec<&'static str> {
        self.probes.keys().copied().collect()
    }

    /// Executes the named probe with the given arguments.
    ///
    /// Timeout and permission-denial are reported *within* the returned
    /// [`ProbeResult`] (`success = false`, `error` set) rather than as an
    /// `Err`, since the model needs to reason about them. `Err` is
    /// reserved for dispatch-level failures: unknown probe name,
    /// unsupported platform, or a malformed argument that prevents any
    /// attempt at all.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::NotFound`] if no probe is registered under
    /// `name`, or [`ProbeError::UnsupportedPlatform`] if the probe does
    /// not support the detected host platform.
    pub async fn run(
        &self,
        name: &str,
        args: &Map<String, Value>,
        ctx: &ProbeContext,
    ) -> Result<ProbeResult, ProbeError> {
        let probe = self.probes.get(name).ok_or_else(|| ProbeError::NotFound {
            name: name.to_string(),
        })?;

        if !probe.supports(self.platform) {
            return Err(ProbeError::UnsupportedPlatform {
                name: name.to_string(),
                platform: self.platform,
            });
        }

        log::debug!("running probe '{name}' on {}", self.platform);
        let effective_ctx = ProbeContext {
            default_timeout: self.default_timeout,
            temp_file_min_age_seconds: self.temp_file_min_age_seconds,
            ..ctx.clone()
        };
        Ok(probe.run(self.platform, args, &effective_ctx).await)
    }
}

impl Default for ProbeRuntime {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_probe_name_is_not_found() {
        let runtime = ProbeRuntime::new(DEFAULT_TIMEOUT);
        let err = runtime
            .run("does_not_exist", &Map::new(), &ProbeContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::NotFound { .. }));
    }

    #[test]
    fn builtin_probes_cover_the_osi_ladder_and_action_set() {
        let runtime = ProbeRuntime::new(DEFAULT_TIMEOUT);
        let names = runtime.probe_names();
        for expected in [
            "check_adapter_status",
            "get_ip_config",
            "ping_gateway",
            "ping_dns",
            "test_dns_resolution",
            "get_vpn_status",
            "enable_wifi",
            "kill_process",
            "cleanup_temp_files",
            "repair_office365",
            "run_dism_sfc",
            "fix_dell_audio",
        ] {
            assert!(names.contains(&expected), "missing probe: {expected}");
        }
    }
}
