//! Read-only OSI-ladder diagnostic probes: adapter status, IP
//! configuration, gateway/DNS reachability, DNS resolution, and VPN state.

use std::time::Duration;

use diag_types::{Platform, ProbeResult};
use serde_json::{Map, Value};

use super::{Probe, arg_str, arg_u64};
use crate::ProbeContext;
use crate::exec::{self, CommandOutput};

/// Ping probes may override the default 15s timeout up to this ceiling.
const PING_MAX_TIMEOUT_MS: u64 = 60_000;

fn ping_timeout(args: &Map<String, Value>) -> Duration {
    let requested = arg_u64(args, "timeoutMs", 15_000).min(PING_MAX_TIMEOUT_MS);
    Duration::from_millis(requested)
}

async fn run_command(platform: Platform, exe: &str, cmd_args: &[&str], timeout: Duration) -> std::io::Result<CommandOutput> {
    let args: Vec<String> = cmd_args.iter().map(ToString::to_string).collect();
    log::debug!("[{platform}] spawning {exe} {args:?}");
    exec::run_with_timeout(exe, &args, timeout).await
}

fn failure_from_io_error(err: &std::io::Error, platform: Platform) -> ProbeResult {
    let kind = if err.kind() == std::io::ErrorKind::PermissionDenied {
        "permission denied"
    } else {
        "command unavailable"
    };
    ProbeResult::failure(format!("{kind}: {err}"), platform)
}

// ---------------------------------------------------------------------------
// check_adapter_status
// ---------------------------------------------------------------------------

pub struct AdapterStatusProbe;

#[must_use]
pub fn parse_adapter_status(platform: Platform, stdout: &str) -> i64 {
    #[allow(clippy::cast_possible_wrap)]
    match platform {
        Platform::Linux => stdout.lines().filter(|l| l.contains("state UP")).count() as i64,
        Platform::MacOs => stdout
            .split("\n\n")
            .filter(|block| block.contains("status: active"))
            .count() as i64,
        Platform::Windows => stdout
            .split("\r\n\r\n")
            .filter(|block| block.contains("Media State") && !block.contains("Media disconnected"))
            .count() as i64,
    }
}

#[async_trait::async_trait]
impl Probe for AdapterStatusProbe {
    fn name(&self) -> &'static str {
        "check_adapter_status"
    }

    fn supports(&self, _platform: Platform) -> bool {
        true
    }

    async fn run(&self, platform: Platform, _args: &Map<String, Value>, ctx: &ProbeContext) -> ProbeResult {
        let result = match platform {
            Platform::Linux => run_command(platform, "ip", &["link", "show"], self.timeout(ctx)).await,
            Platform::MacOs => run_command(platform, "ifconfig", &[], self.timeout(ctx)).await,
            Platform::Windows => run_command(platform, "ipconfig", &["/all"], self.timeout(ctx)).await,
        };

        match result {
            Ok(output) if output.timed_out => ProbeResult::failure("timeout", platform),
            Ok(output) => {
                let count = parse_adapter_status(platform, &output.stdout);
                let mut data = Map::new();
                data.insert("connectedCount".to_string(), Value::from(count));
                ProbeResult::success(data, platform).with_raw_output(output.stdout)
            }
            Err(err) => failure_from_io_error(&err, platform),
        }
    }
}

// ---------------------------------------------------------------------------
// get_ip_config
// ---------------------------------------------------------------------------

pub struct IpConfigProbe;

#[must_use]
pub fn parse_ip_config(stdout: &str) -> (bool, bool, Option<String>) {
    let mut best_ip = None;
    let mut is_apipa = false;

    for token in stdout.split_whitespace() {
        let candidate = token.trim_start_matches("inet").trim_start_matches(':');
        if candidate.split('.').count() == 4 && candidate.chars().next().is_some_and(char::is_numeric) {
            let addr = candidate.split('/').next().unwrap_or(candidate);
            if addr == "127.0.0.1" {
                continue;
            }
            if addr.starts_with("169.254.") {
                is_apipa = true;
            } else if best_ip.is_none() {
                best_ip = Some(addr.to_string());
            }
        }
    }

    let has_valid_ip = best_ip.is_some();
    (has_valid_ip, is_apipa && !has_valid_ip, best_ip)
}

#[async_trait::async_trait]
impl Probe for IpConfigProbe {
    fn name(&self) -> &'static str {
        "get_ip_config"
    }

    fn supports(&self, _platform: Platform) -> bool {
        true
    }

    async fn run(&self, platform: Platform, _args: &Map<String, Value>, ctx: &ProbeContext) -> ProbeResult {
        let result = match platform {
            Platform::Linux => run_command(platform, "ip", &["addr", "show"], self.timeout(ctx)).await,
            Platform::MacOs => run_command(platform, "ifconfig", &[], self.timeout(ctx)).await,
            Platform::Windows => run_command(platform, "ipconfig", &[], self.timeout(ctx)).await,
        };

        match result {
            Ok(output) if output.timed_out => ProbeResult::failure("timeout", platform),
            Ok(output) => {
                let (has_valid_ip, is_apipa, ip) = parse_ip_config(&output.stdout);
                let mut data = Map::new();
                data.insert("hasValidIp".to_string(), Value::from(has_valid_ip));
                data.insert("isApipa".to_string(), Value::from(is_apipa));
                if let Some(ip) = ip {
                    data.insert("ipAddress".to_string(), Value::from(ip));
                }
                ProbeResult::success(data, platform).with_raw_output(output.stdout)
            }
            Err(err) => failure_from_io_error(&err, platform),
        }
    }
}

// ---------------------------------------------------------------------------
// shared ping logic (ping_gateway / ping_dns)
// ---------------------------------------------------------------------------

fn ping_args(platform: Platform, host: &str) -> Vec<String> {
    match platform {
        Platform::Linux | Platform::MacOs => {
            vec!["-c".to_string(), "1".to_string(), "-W".to_string(), "2".to_string(), host.to_string()]
        }
        Platform::Windows => vec!["-n".to_string(), "1".to_string(), "-w".to_string(), "2000".to_string(), host.to_string()],
    }
}

#[must_use]
pub fn parse_ping_reachable(exit_code: Option<i32>, stdout: &str) -> bool {
    exit_code == Some(0)
        && (stdout.contains("bytes from") || stdout.to_lowercase().contains("ttl="))
        && !stdout.contains("100% packet loss")
        && !stdout.contains("Destination host unreachable")
}

async fn run_ping(platform: Platform, host: &str, timeout: Duration) -> std::io::Result<CommandOutput> {
    let exe = if matches!(platform, Platform::Windows) {
        "ping"
    } else {
        "ping"
    };
    exec::run_with_timeout(exe, &ping_args(platform, host), timeout).await
}

async fn discover_default_gateway(platform: Platform) -> Option<String> {
    let output = match platform {
        Platform::Linux => exec::run_with_timeout("ip", &["route".to_string(), "show".to_string(), "default".to_string()], Duration::from_secs(5)).await.ok()?,
        Platform::MacOs => exec::run_with_timeout("route", &["-n".to_string(), "get".to_string(), "default".to_string()], Duration::from_secs(5)).await.ok()?,
        Platform::Windows => exec::run_with_timeout("ipconfig", &[], Duration::from_secs(5)).await.ok()?,
    };
    parse_default_gateway(platform, &output.stdout)
}

#[must_use]
pub fn parse_default_gateway(platform: Platform, stdout: &str) -> Option<String> {
    match platform {
        Platform::Linux => stdout
            .split_whitespace()
            .collect::<Vec<_>>()
            .windows(2)
            .find(|w| w[0] == "via")
            .map(|w| w[1].to_string()),
        Platform::MacOs => stdout
            .lines()
            .find(|l| l.trim_start().starts_with("gateway:"))
            .and_then(|l| l.split(':').nth(1))
            .map(|s| s.trim().to_string()),
        Platform::Windows => stdout
            .lines()
            .find(|l| l.contains("Default Gateway"))
            .and_then(|l| l.split(':').nth(1))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
    }
}

// ---------------------------------------------------------------------------
// ping_gateway
// ---------------------------------------------------------------------------

pub struct PingGatewayProbe;

#[async_trait::async_trait]
impl Probe for PingGatewayProbe {
    fn name(&self) -> &'static str {
        "ping_gateway"
    }

    fn timeout(&self, _ctx: &ProbeContext) -> Duration {
        Duration::from_secs(15)
    }

    fn supports(&self, _platform: Platform) -> bool {
        true
    }

    async fn run(&self, platform: Platform, args: &Map<String, Value>, _ctx: &ProbeContext) -> ProbeResult {
        let explicit_host = args.get("gateway").and_then(Value::as_str).map(str::to_string);
        let gateway = match explicit_host {
            Some(host) => Some(host),
            None => discover_default_gateway(platform).await,
        };

        let Some(gateway) = gateway else {
            return ProbeResult::failure("could not determine default gateway", platform);
        };

        match run_ping(platform, &gateway, ping_timeout(args)).await {
            Ok(output) if output.timed_out => ProbeResult::failure("timeout", platform),
            Ok(output) => {
                let reachable = parse_ping_reachable(output.exit_code, &output.stdout);
                let mut data = Map::new();
                data.insert("reachable".to_string(), Value::from(reachable));
                data.insert("gateway".to_string(), Value::from(gateway));
                ProbeResult::success(data, platform).with_raw_output(output.stdout)
            }
            Err(err) => failure_from_io_error(&err, platform),
        }
    }
}

// ---------------------------------------------------------------------------
// ping_dns (external/internet reachability)
// ---------------------------------------------------------------------------

pub struct PingDnsProbe;

const DEFAULT_PROBE_HOST: &str = "8.8.8.8";

#[async_trait::async_trait]
impl Probe for PingDnsProbe {
    fn name(&self) -> &'static str {
        "ping_dns"
    }

    fn timeout(&self, _ctx: &ProbeContext) -> Duration {
        Duration::from_secs(15)
    }

    fn supports(&self, _platform: Platform) -> bool {
        true
    }

    async fn run(&self, platform: Platform, args: &Map<String, Value>, _ctx: &ProbeContext) -> ProbeResult {
        let host = arg_str(args, "host", DEFAULT_PROBE_HOST);
        match run_ping(platform, &host, ping_timeout(args)).await {
            Ok(output) if output.timed_out => ProbeResult::failure("timeout", platform),
            Ok(output) => {
                let reachable = parse_ping_reachable(output.exit_code, &output.stdout);
                let mut data = Map::new();
                data.insert("internetAccessible".to_string(), Value::from(reachable));
                data.insert("probeHost".to_string(), Value::from(host));
                ProbeResult::success(data, platform).with_raw_output(output.stdout)
            }
            Err(err) => failure_from_io_error(&err, platform),
        }
    }
}

// ---------------------------------------------------------------------------
// test_dns_resolution
// ---------------------------------------------------------------------------

pub struct DnsResolutionProbe;

const DEFAULT_RESOLVE_HOST: &str = "example.com";

#[must_use]
pub fn parse_dns_working(exit_code: Option<i32>, stdout: &str) -> bool {
    let lower = stdout.to_lowercase();
    exit_code == Some(0)
        && !lower.contains("can't find")
        && !lower.contains("nxdomain")
        && !lower.contains("server can't find")
        && lower.contains("address")
}

#[async_trait::async_trait]
impl Probe for DnsResolutionProbe {
    fn name(&self) -> &'static str {
        "test_dns_resolution"
    }

    fn supports(&self, _platform: Platform) -> bool {
        true
    }

    async fn run(&self, platform: Platform, args: &Map<String, Value>, ctx: &ProbeContext) -> ProbeResult {
        let host = arg_str(args, "host", DEFAULT_RESOLVE_HOST);
        match exec::run_with_timeout("nslookup", &[host.clone()], self.timeout(ctx)).await {
            Ok(output) if output.timed_out => ProbeResult::failure("timeout", platform),
            Ok(output) => {
                let working = parse_dns_working(output.exit_code, &output.stdout);
                let mut data = Map::new();
                data.insert("dnsWorking".to_string(), Value::from(working));
                data.insert("host".to_string(), Value::from(host));
                ProbeResult::success(data, platform).with_raw_output(output.stdout)
            }
            Err(err) => failure_from_io_error(&err, platform),
        }
    }
}

// ---------------------------------------------------------------------------
// get_vpn_status
// ---------------------------------------------------------------------------

pub struct VpnStatusProbe;

#[must_use]
pub fn parse_vpn_connected(stdout: &str) -> bool {
    let lower = stdout.to_lowercase();
    ["tun0", "tun1", "utun", "ppp0", "wg0"]
        .iter()
        .any(|needle| lower.contains(needle))
}

#[async_trait::async_trait]
impl Probe for VpnStatusProbe {
    fn name(&self) -> &'static str {
        "get_vpn_status"
    }

    fn supports(&self, _platform: Platform) -> bool {
        true
    }

    async fn run(&self, platform: Platform, _args: &Map<String, Value>, ctx: &ProbeContext) -> ProbeResult {
        let result = match platform {
            Platform::Linux => run_command(platform, "ip", &["link", "show"], self.timeout(ctx)).await,
            Platform::MacOs => run_command(platform, "ifconfig", &[], self.timeout(ctx)).await,
            Platform::Windows => run_command(platform, "ipconfig", &["/all"], self.timeout(ctx)).await,
        };

        match result {
            Ok(output) if output.timed_out => ProbeResult::failure("timeout", platform),
            Ok(output) => {
                let connected = parse_vpn_connected(&output.stdout);
                let mut data = Map::new();
                data.insert("vpnConnected".to_string(), Value::from(connected));
                ProbeResult::success(data, platform).with_raw_output(output.stdout)
            }
            Err(err) => failure_from_io_error(&err, platform),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_count_parses_linux_state_up() {
        let stdout = "1: lo: <LOOPBACK,UP,LOWER_UP> mtu 65536 state UNKNOWN\n\
                       2: eth0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 state UP\n\
                       3: wlan0: <BROADCAST,MULTICAST> mtu 1500 state DOWN\n";
        assert_eq!(parse_adapter_status(Platform::Linux, stdout), 1);
    }

    #[test]
    fn ip_config_detects_apipa_when_no_other_address() {
        let stdout = "inet 169.254.12.3/16 brd 169.254.255.255 scope link";
        let (has_valid, is_apipa, _) = parse_ip_config(stdout);
        assert!(!has_valid);
        assert!(is_apipa);
    }

    #[test]
    fn ip_config_prefers_real_address_over_apipa() {
        let stdout = "inet 169.254.12.3/16\ninet 192.168.1.20/24";
        let (has_valid, is_apipa, ip) = parse_ip_config(stdout);
        assert!(has_valid);
        assert!(!is_apipa);
        assert_eq!(ip.as_deref(), Some("192.168.1.20"));
    }

    #[test]
    fn ping_reachable_requires_success_exit_and_no_packet_loss() {
        assert!(parse_ping_reachable(
            Some(0),
            "64 bytes from 8.8.8.8: icmp_seq=1 ttl=118 time=12 ms"
        ));
        assert!(!parse_ping_reachable(Some(0), "1 packets transmitted, 0 received, 100% packet loss"));
        assert!(!parse_ping_reachable(Some(1), "bytes from 8.8.8.8"));
    }

    #[test]
    fn default_gateway_parses_linux_route_output() {
        let stdout = "default via 192.168.1.1 dev eth0 proto dhcp metric 100";
        assert_eq!(
            parse_default_gateway(Platform::Linux, stdout).as_deref(),
            Some("192.168.1.1")
        );
    }

    #[test]
    fn dns_working_rejects_nxdomain() {
        assert!(!parse_dns_working(Some(1), "** server can't find bogus.invalid: NXDOMAIN"));
        assert!(parse_dns_working(Some(0), "Name:\texample.com\nAddress: 93.184.216.34"));
    }

    #[test]
    fn vpn_detected_from_tunnel_interface_name() {
        assert!(parse_vpn_connected("4: tun0: <POINTOPOINT,UP> mtu 1400"));
        assert!(!parse_vpn_connected("2: eth0: <BROADCAST,UP> mtu 1500"));
    }
}
