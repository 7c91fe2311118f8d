//! State-changing remediation probes: Wi-Fi toggling, process termination,
//! temp-file cleanup, and Windows-specific repair actions.
//!
//! Every probe here follows the same shape: read current state, apply the
//! change, read state again, and report `previousState`/`currentState`/
//! `changed` so the caller can verify the action actually took effect.

use std::path::Path;
use std::time::Duration;

use diag_types::{Platform, ProbeResult};
use serde_json::{Map, Value};
use sysinfo::System;

use super::{Probe, arg_bool, arg_str, arg_u64};
use crate::ProbeContext;
use crate::exec::{self, DEFAULT_TIMEOUT};

/// Process names a kill request is never allowed to target, regardless of
/// what the model asks for. Includes the display server and session
/// compositor on Linux/macOS alongside the Windows/init-system entries,
/// since killing any of these takes the whole session down with it.
const PROTECTED_PROCESS_NAMES: &[&str] = &[
    "explorer.exe",
    "svchost.exe",
    "csrss.exe",
    "wininit.exe",
    "winlogon.exe",
    "services.exe",
    "lsass.exe",
    "systemd",
    "launchd",
    "kernel_task",
    "init",
    "xorg",
    "xwayland",
    "gdm",
    "gdm3",
    "sddm",
    "lightdm",
    "weston",
    "mutter",
    "windowserver",
];

fn add_state(data: &mut Map<String, Value>, previous: &str, current: &str) {
    data.insert("previousState".to_string(), Value::from(previous));
    data.insert("currentState".to_string(), Value::from(current));
    data.insert("changed".to_string(), Value::from(previous != current));
}

// ---------------------------------------------------------------------------
// enable_wifi
// ---------------------------------------------------------------------------

pub struct EnableWifiProbe;

async fn query_wifi_state(platform: Platform) -> String {
    let output = match platform {
        Platform::Linux => exec::run_with_timeout("nmcli", &["radio".to_string(), "wifi".to_string()], Duration::from_secs(5)).await,
        Platform::MacOs => exec::run_with_timeout(
            "networksetup",
            &["-getairportpower".to_string(), "en0".to_string()],
            Duration::from_secs(5),
        )
        .await,
        Platform::Windows => exec::run_with_timeout(
            "netsh",
            &["interface".to_string(), "show".to_string(), "interface".to_string()],
            Duration::from_secs(5),
        )
        .await,
    };

    let Ok(output) = output else {
        return "unknown".to_string();
    };
    let lower = output.stdout.to_lowercase();
    if lower.contains("enabled") || lower.contains("on") {
        "enabled".to_string()
    } else {
        "disabled".to_string()
    }
}

#[async_trait::async_trait]
impl Probe for EnableWifiProbe {
    fn name(&self) -> &'static str {
        "enable_wifi"
    }

    fn supports(&self, _platform: Platform) -> bool {
        true
    }

    async fn run(&self, platform: Platform, _args: &Map<String, Value>, ctx: &ProbeContext) -> ProbeResult {
        let previous = query_wifi_state(platform).await;

        let enable_result = match platform {
            Platform::Linux => {
                exec::run_with_timeout("nmcli", &["radio".to_string(), "wifi".to_string(), "on".to_string()], self.timeout(ctx)).await
            }
            Platform::MacOs => {
                exec::run_with_timeout(
                    "networksetup",
                    &["-setairportpower".to_string(), "en0".to_string(), "on".to_string()],
                    self.timeout(ctx),
                )
                .await
            }
            Platform::Windows => {
                exec::run_with_timeout(
                    "netsh",
                    &[
                        "interface".to_string(),
                        "set".to_string(),
                        "interface".to_string(),
                        "Wi-Fi".to_string(),
                        "admin=enable".to_string(),
                    ],
                    self.timeout(ctx),
                )
                .await
            }
        };

        if let Err(err) = enable_result {
            return ProbeResult::failure(format!("failed to enable wifi: {err}"), platform);
        }

        let current = query_wifi_state(platform).await;
        let mut data = Map::new();
        add_state(&mut data, &previous, &current);
        ProbeResult::success(data, platform)
    }
}

// ---------------------------------------------------------------------------
// kill_process
// ---------------------------------------------------------------------------

pub struct KillProcessProbe;

#[must_use]
pub fn is_protected_process(name: &str) -> bool {
    let lower = name.to_lowercase();
    PROTECTED_PROCESS_NAMES.iter().any(|p| *p == lower)
}

#[async_trait::async_trait]
impl Probe for KillProcessProbe {
    fn name(&self) -> &'static str {
        "kill_process"
    }

    fn supports(&self, _platform: Platform) -> bool {
        true
    }

    async fn run(&self, platform: Platform, args: &Map<String, Value>, _ctx: &ProbeContext) -> ProbeResult {
        let process_name = arg_str(args, "processName", "");
        if process_name.is_empty() {
            return ProbeResult::failure("processName is required", platform);
        }

        if is_protected_process(&process_name) {
            return ProbeResult::failure(format!("refusing to kill protected process '{process_name}'"), platform);
        }

        let mut system = System::new_all();
        system.refresh_all();

        let matches: Vec<_> = system
            .processes()
            .values()
            .filter(|p| p.name().to_string_lossy().eq_ignore_ascii_case(&process_name))
            .collect();

        if matches.is_empty() {
            let mut data = Map::new();
            data.insert("killedCount".to_string(), Value::from(0));
            return ProbeResult::success(data, platform).with_suggestions(vec![format!("no running process named '{process_name}'")]);
        }

        let killed = matches.iter().filter(|p| p.kill()).count();

        let mut data = Map::new();
        #[allow(clippy::cast_possible_wrap)]
        data.insert("killedCount".to_string(), Value::from(killed as i64));
        data.insert("processName".to_string(), Value::from(process_name));
        ProbeResult::success(data, platform)
    }
}

// ---------------------------------------------------------------------------
// cleanup_temp_files
// ---------------------------------------------------------------------------

pub struct CleanupTempFilesProbe;

/// Hard cap on how many entries a single cleanup run will remove, and
/// separately on how many removal errors get reported, even when more
/// candidates or failures exist.
const MAX_CLEANUP_ENTRIES: usize = 10;

/// Directory roots a cleanup pass refuses to descend into, regardless of
/// age or name, since nothing under them is a disposable temp file.
fn deny_listed_roots(platform: Platform) -> &'static [&'static str] {
    match platform {
        Platform::Linux => &["/proc", "/sys", "/boot", "/etc", "/root"],
        Platform::MacOs => &["/System", "/Library", "/private/etc", "/private/var/root"],
        Platform::Windows => &["C:\\Windows", "C:\\Program Files", "C:\\Program Files (x86)"],
    }
}

fn is_under_denied_root(path: &Path, platform: Platform) -> bool {
    let path_str = path.to_string_lossy();
    deny_listed_roots(platform).iter().any(|root| path_str.starts_with(root))
}

#[must_use]
pub fn is_cleanup_candidate(path: &Path, is_symlink: bool, age_seconds: u64, min_age_seconds: u64, platform: Platform) -> bool {
    if is_symlink {
        return false;
    }
    if is_under_denied_root(path, platform) {
        return false;
    }
    age_seconds >= min_age_seconds
}

#[async_trait::async_trait]
impl Probe for CleanupTempFilesProbe {
    fn name(&self) -> &'static str {
        "cleanup_temp_files"
    }

    fn timeout(&self, _ctx: &ProbeContext) -> Duration {
        Duration::from_secs(30)
    }

    fn supports(&self, _platform: Platform) -> bool {
        true
    }

    async fn run(&self, platform: Platform, args: &Map<String, Value>, ctx: &ProbeContext) -> ProbeResult {
        let dry_run = arg_bool(args, "dryRun", true);
        let max_age_days = arg_u64(args, "maxAgeDays", 7);
        let requested_min_age_seconds = max_age_days.saturating_mul(86_400);
        let min_age_seconds = requested_min_age_seconds.max(ctx.temp_file_min_age_seconds);
        let temp_dir = std::env::temp_dir();

        let now = std::time::SystemTime::now();
        let mut removed = Vec::new();
        let mut errors = Vec::new();
        let mut bytes_reclaimed: u64 = 0;

        for entry in walkdir::WalkDir::new(&temp_dir)
            .max_depth(2)
            .into_iter()
            .filter_map(Result::ok)
        {
            if removed.len() >= MAX_CLEANUP_ENTRIES {
                break;
            }
            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            let age_seconds = metadata.modified().ok().and_then(|m| now.duration_since(m).ok()).map_or(0, |d| d.as_secs());

            let file_name = entry.file_name().to_string_lossy();
            if !is_cleanup_candidate(entry.path(), entry.path_is_symlink(), age_seconds, min_age_seconds, platform) {
                continue;
            }

            if !dry_run
                && let Err(err) = std::fs::remove_file(entry.path())
            {
                if errors.len() < MAX_CLEANUP_ENTRIES {
                    errors.push(format!("{file_name}: {err}"));
                }
                continue;
            }

            bytes_reclaimed += metadata.len();
            removed.push(file_name.to_string());
        }

        let mut data = Map::new();
        #[allow(clippy::cast_possible_wrap)]
        data.insert("filesRemoved".to_string(), Value::from(removed.len() as i64));
        #[allow(clippy::cast_possible_wrap)]
        data.insert("bytesReclaimed".to_string(), Value::from(bytes_reclaimed as i64));
        data.insert("dryRun".to_string(), Value::from(dry_run));
        data.insert("errors".to_string(), Value::from(errors));
        ProbeResult::success(data, platform)
    }
}

// ---------------------------------------------------------------------------
// Windows-only repair actions
// ---------------------------------------------------------------------------

async fn query_service_state(service: &str) -> String {
    let Ok(output) = exec::run_with_timeout("sc", &["query".to_string(), service.to_string()], Duration::from_secs(5)).await else {
        return "unknown".to_string();
    };
    if output.stdout.contains("RUNNING") {
        "running".to_string()
    } else if output.stdout.contains("STOPPED") {
        "stopped".to_string()
    } else {
        "unknown".to_string()
    }
}

pub struct RepairOffice365Probe;

#[async_trait::async_trait]
impl Probe for RepairOffice365Probe {
    fn name(&self) -> &'static str {
        "repair_office365"
    }

    fn timeout(&self, _ctx: &ProbeContext) -> Duration {
        Duration::from_secs(DEFAULT_TIMEOUT.as_secs() * 8)
    }

    fn supports(&self, platform: Platform) -> bool {
        matches!(platform, Platform::Windows)
    }

    async fn run(&self, platform: Platform, _args: &Map<String, Value>, ctx: &ProbeContext) -> ProbeResult {
        let exe = r"C:\Program Files\Common Files\Microsoft Shared\ClickToRun\OfficeClickToRun.exe";
        let result = exec::run_with_timeout(
            exe,
            &[
                "scenario=Repair".to_string(),
                "platform=x64".to_string(),
                "culture=en-us".to_string(),
                "RepairType=QuickRepair".to_string(),
            ],
            self.timeout(ctx),
        )
        .await;

        match result {
            Ok(output) if output.timed_out => ProbeResult::failure("timeout", platform),
            Ok(output) => {
                let mut data = Map::new();
                let current = if output.exit_code == Some(0) { "repaired" } else { "repair failed" };
                add_state(&mut data, "unknown", current);
                ProbeResult::success(data, platform).with_raw_output(output.stdout)
            }
            Err(err) => ProbeResult::failure(format!("could not launch Office repair: {err}"), platform),
        }
    }
}

pub struct RunDismSfcProbe;

#[async_trait::async_trait]
impl Probe for RunDismSfcProbe {
    fn name(&self) -> &'static str {
        "run_dism_sfc"
    }

    fn timeout(&self, _ctx: &ProbeContext) -> Duration {
        Duration::from_secs(DEFAULT_TIMEOUT.as_secs() * 20)
    }

    fn supports(&self, platform: Platform) -> bool {
        matches!(platform, Platform::Windows)
    }

    async fn run(&self, platform: Platform, _args: &Map<String, Value>, ctx: &ProbeContext) -> ProbeResult {
        let dism = exec::run_with_timeout(
            "DISM.exe",
            &[
                "/Online".to_string(),
                "/Cleanup-Image".to_string(),
                "/RestoreHealth".to_string(),
            ],
            self.timeout(ctx),
        )
        .await;

        let Ok(dism_output) = dism else {
            return ProbeResult::failure("DISM invocation failed", platform);
        };
        if dism_output.timed_out {
            return ProbeResult::failure("timeout", platform);
        }

        let sfc = exec::run_with_timeout("sfc", &["/scannow".to_string()], self.timeout(ctx)).await;
        let Ok(sfc_output) = sfc else {
            return ProbeResult::failure("sfc invocation failed", platform);
        };
        if sfc_output.timed_out {
            return ProbeResult::failure("timeout", platform);
        }

        let healthy = dism_output.exit_code == Some(0) && sfc_output.exit_code == Some(0);
        let mut data = Map::new();
        add_state(&mut data, "unknown", if healthy { "healthy" } else { "errors detected" });
        ProbeResult::success(data, platform).with_raw_output(format!("{}\n{}", dism_output.stdout, sfc_output.stdout))
    }
}

pub struct FixDellAudioProbe;

const DELL_AUDIO_SERVICE: &str = "Audiosrv";

#[async_trait::async_trait]
impl Probe for FixDellAudioProbe {
    fn name(&self) -> &'static str {
        "fix_dell_audio"
    }

    fn supports(&self, platform: Platform) -> bool {
        matches!(platform, Platform::Windows)
    }

    async fn run(&self, platform: Platform, _args: &Map<String, Value>, ctx: &ProbeContext) -> ProbeResult {
        let previous = query_service_state(DELL_AUDIO_SERVICE).await;

        if exec::run_with_timeout("net", &["stop".to_string(), DELL_AUDIO_SERVICE.to_string()], self.timeout(ctx))
            .await
            .is_err()
        {
            return ProbeResult::failure("failed to stop audio service", platform);
        }
        if exec::run_with_timeout("net", &["start".to_string(), DELL_AUDIO_SERVICE.to_string()], self.timeout(ctx))
            .await
            .is_err()
        {
            return ProbeResult::failure("failed to restart audio service", platform);
        }

        let current = query_service_state(DELL_AUDIO_SERVICE).await;
        let mut data = Map::new();
        add_state(&mut data, &previous, &current);
        ProbeResult::success(data, platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protected_process_names_are_case_insensitive() {
        assert!(is_protected_process("EXPLORER.EXE"));
        assert!(is_protected_process("systemd"));
        assert!(is_protected_process("Xorg"));
        assert!(is_protected_process("GDM3"));
        assert!(!is_protected_process("notepad.exe"));
    }

    #[test]
    fn cleanup_candidate_respects_denied_roots_and_age() {
        let old_enough = 10 * 86_400;
        let too_fresh = 86_400;
        let min_age = 7 * 86_400;
        assert!(is_cleanup_candidate(Path::new("/tmp/old_cache.tmp"), false, old_enough, min_age, Platform::Linux));
        assert!(!is_cleanup_candidate(Path::new("/tmp/fresh.tmp"), false, too_fresh, min_age, Platform::Linux));
        assert!(!is_cleanup_candidate(Path::new("/etc/old_cache.tmp"), false, old_enough, min_age, Platform::Linux));
        assert!(!is_cleanup_candidate(Path::new("/tmp/old_link.tmp"), true, old_enough, min_age, Platform::Linux));
    }

    #[test]
    fn cleanup_candidate_honors_the_configured_minimum_age_floor() {
        let age_seconds = 5000;
        assert!(is_cleanup_candidate(Path::new("/tmp/f.tmp"), false, age_seconds, 3600, Platform::Linux));
        assert!(!is_cleanup_candidate(Path::new("/tmp/f.tmp"), false, age_seconds, 3600 * 24, Platform::Linux));
    }
}
