mod action;
mod network;

use std::time::Duration;

use diag_types::{Platform, ProbeResult};
use serde_json::{Map, Value};

use crate::ProbeContext;

/// A single registered probe: platform support, timeout, and the async
/// execution body.
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    /// The probe's unique name, matching the tool name the registry
    /// exposes for it.
    fn name(&self) -> &'static str;

    /// Wall-clock timeout for this probe. Defaults to `ctx.default_timeout`
    /// (the configured `probeDefaultTimeoutMs`); ping-style probes and
    /// long-running repairs override this with their own fixed value.
    fn timeout(&self, ctx: &ProbeContext) -> Duration {
        ctx.default_timeout
    }

    /// Whether this probe has an implementation for `platform`.
    fn supports(&self, platform: Platform) -> bool;

    /// Executes the probe and returns its result. Never panics; on
    /// internal failure it returns `ProbeResult::failure(..)` rather than
    /// propagating, since only dispatch-level problems are `Err` at the
    /// runtime layer.
    async fn run(&self, platform: Platform, args: &Map<String, Value>, ctx: &ProbeContext) -> ProbeResult;
}

/// Reads a string argument, falling back to `default` when absent.
pub(crate) fn arg_str<'a>(args: &'a Map<String, Value>, key: &str, default: &'a str) -> String {
    args.get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

/// Reads a u64 argument, falling back to `default` when absent.
pub(crate) fn arg_u64(args: &Map<String, Value>, key: &str, default: u64) -> u64 {
    args.get(key).and_then(Value::as_u64).unwrap_or(default)
}

/// Reads a bool argument, falling back to `default` when absent.
pub(crate) fn arg_bool(args: &Map<String, Value>, key: &str, default: bool) -> bool {
    args.get(key).and_then(Value::as_bool).unwrap_or(default)
}

/// Returns one boxed instance of every built-in probe.
#[must_use]
pub fn builtin_probes() -> Vec<Box<dyn Probe>> {
    vec![
        Box::new(network::AdapterStatusProbe),
        Box::new(network::IpConfigProbe),
        Box::new(network::PingGatewayProbe),
        Box::new(network::PingDnsProbe),
        Box::new(network::DnsResolutionProbe),
        Box::new(network::VpnStatusProbe),
        Box::new(action::EnableWifiProbe),
        Box::new(action::KillProcessProbe),
        Box::new(action::CleanupTempFilesProbe),
        Box::new(action::RepairOffice365Probe),
        Box::new(action::RunDismSfcProbe),
        Box::new(action::FixDellAudioProbe),
    ]
}
