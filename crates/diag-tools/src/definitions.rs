//! Static tool definitions for every built-in probe, with descriptions
//! carrying decision-boundary guidance so a weak model can pick the right
//! tool without external documentation.

use diag_types::{ParameterType, ToolDefinition, ToolParameter};

/// Returns the built-in tool catalog in a fixed, stable order: the OSI
/// ladder first, then the action set.
#[must_use]
pub fn builtin_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "check_adapter_status".to_string(),
            description: "CALL WHEN starting a connectivity investigation, to see how many network \
                adapters are up. DO NOT CALL IF you already have a recent adapter count this turn. \
                OUTPUT MEANING: connectedCount of 0 means no adapter is up at all."
                .to_string(),
            parameters: vec![],
        },
        ToolDefinition {
            name: "get_ip_config".to_string(),
            description: "CALL WHEN an adapter is connected and you need to know whether it has a \
                usable address. DO NOT CALL IF no adapter is connected yet; fix that first. \
                OUTPUT MEANING: hasValidIp=false with isApipa=true means DHCP failed over to a \
                self-assigned 169.254.x.x address."
                .to_string(),
            parameters: vec![],
        },
        ToolDefinition {
            name: "ping_gateway".to_string(),
            description: "CALL WHEN the adapter has a valid IP and you need to confirm local network \
                reachability. DO NOT CALL IF hasValidIp was false; there is no gateway to reach yet. \
                OUTPUT MEANING: reachable=false points at a local network or router problem, not an \
                internet problem."
                .to_string(),
            parameters: vec![
                ToolParameter::optional("gateway", ParameterType::String, "override the gateway address instead of auto-discovering it"),
                ToolParameter::optional("timeoutMs", ParameterType::Integer, "ping timeout override, up to 60000ms"),
            ],
        },
        ToolDefinition {
            name: "ping_dns".to_string(),
            description: "CALL WHEN the gateway is reachable and you need to confirm internet \
                reachability. DO NOT CALL IF the gateway itself was unreachable. \
                OUTPUT MEANING: internetAccessible=false with a reachable gateway points at an ISP \
                or upstream routing problem."
                .to_string(),
            parameters: vec![
                ToolParameter::optional("host", ParameterType::String, "override the probe host instead of the default public resolver"),
                ToolParameter::optional("timeoutMs", ParameterType::Integer, "ping timeout override, up to 60000ms"),
            ],
        },
        ToolDefinition {
            name: "test_dns_resolution".to_string(),
            description: "CALL WHEN the internet is reachable by IP but a name-based check is needed. \
                DO NOT CALL IF internetAccessible was false; fix routing first. \
                OUTPUT MEANING: dnsWorking=false with internet reachability otherwise fine points at a \
                DNS resolver configuration problem."
                .to_string(),
            parameters: vec![ToolParameter::optional("host", ParameterType::String, "hostname to resolve instead of the default")],
        },
        ToolDefinition {
            name: "get_vpn_status".to_string(),
            description: "CALL WHEN the user mentions a VPN or when other connectivity checks are \
                inconclusive and a tunnel interface could be masking the real route. \
                OUTPUT MEANING: vpnConnected=true means traffic may be routed through a tunnel \
                interface, which can explain otherwise-unexplained reachability results."
                .to_string(),
            parameters: vec![],
        },
        ToolDefinition {
            name: "enable_wifi".to_string(),
            description: "CALL WHEN check_adapter_status showed connectedCount=0 and the user wants it \
                fixed. DO NOT CALL IF an adapter is already connected. This changes device state; a \
                verification pass follows automatically."
                .to_string(),
            parameters: vec![],
        },
        ToolDefinition {
            name: "kill_process".to_string(),
            description: "CALL WHEN a specific named process is confirmed to be misbehaving and the \
                user has asked for it to be stopped. DO NOT CALL IF the process name is a core OS \
                process; the probe refuses those regardless. This changes device state; a verification \
                pass follows automatically."
                .to_string(),
            parameters: vec![ToolParameter::required("processName", ParameterType::String, "exact process name to terminate")],
        },
        ToolDefinition {
            name: "cleanup_temp_files".to_string(),
            description: "CALL WHEN disk space or stale temp file buildup is suspected. DO NOT CALL IF \
                the user has not reported disk or performance symptoms. Removes at most 10 files per \
                run and never touches a file modified within the configured minimum age floor, \
                regardless of maxAgeDays. This changes device state; a verification pass follows \
                automatically."
                .to_string(),
            parameters: vec![
                ToolParameter::optional("dryRun", ParameterType::Boolean, "report candidates without deleting them")
                    .with_default(serde_json::json!(true)),
                ToolParameter::optional("maxAgeDays", ParameterType::Integer, "minimum file age in days to qualify for removal")
                    .with_default(serde_json::json!(7)),
            ],
        },
        ToolDefinition {
            name: "repair_office365".to_string(),
            description: "CALL WHEN the user reports a broken Office 365 installation on Windows. \
                DO NOT CALL IF the detected platform is not Windows; this probe only supports Windows. \
                This changes device state; a verification pass follows automatically."
                .to_string(),
            parameters: vec![],
        },
        ToolDefinition {
            name: "run_dism_sfc".to_string(),
            description: "CALL WHEN Windows system file corruption is suspected (crashes, missing \
                system DLL errors). DO NOT CALL IF the detected platform is not Windows. Runs a DISM \
                health restore followed by an SFC scan; can take several minutes. This changes device \
                state; a verification pass follows automatically."
                .to_string(),
            parameters: vec![],
        },
        ToolDefinition {
            name: "fix_dell_audio".to_string(),
            description: "CALL WHEN the user reports no audio output on a Windows machine and a \
                service-level restart is a reasonable first attempt. DO NOT CALL IF the detected \
                platform is not Windows. This changes device state; a verification pass follows \
                automatically."
                .to_string(),
            parameters: vec![],
        },
    ]
}
