//! Process lifecycle for an optional local-model sidecar subprocess (§5):
//! started on first use, health-checked, reused across sessions, and
//! terminated with a graceful period on facade shutdown.

use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::Mutex;

const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(500);
const HEALTH_POLL_TIMEOUT: Duration = Duration::from_secs(30);
const GRACEFUL_SHUTDOWN_PERIOD: Duration = Duration::from_secs(5);

/// Launch command for the sidecar, e.g. `ollama serve`. Read from
/// `DIAG_LOCAL_SIDECAR_CMD`; absent when the local provider is expected
/// to point at an already-running, externally managed server.
#[derive(Debug, Clone)]
pub struct SidecarCommand {
    executable: String,
    args: Vec<String>,
}

impl SidecarCommand {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let raw = std::env::var("DIAG_LOCAL_SIDECAR_CMD").ok()?;
        let mut parts = raw.split_whitespace();
        let executable = parts.next()?.to_string();
        let args = parts.map(str::to_string).collect();
        Some(Self { executable, args })
    }
}

/// Manages the sidecar's process, if one is configured. A no-op shell
/// when `command` is `None`.
pub struct LocalSidecar {
    command: Option<SidecarCommand>,
    base_url: String,
    client: reqwest::Client,
    child: Mutex<Option<Child>>,
}

impl LocalSidecar {
    #[must_use]
    pub fn new(command: Option<SidecarCommand>, base_url: String) -> Self {
        Self {
            command,
            base_url,
            client: reqwest::Client::new(),
            child: Mutex::new(None),
        }
    }

    /// Starts the sidecar on first call, then polls its health endpoint
    /// until it responds or the poll window elapses. Subsequent calls
    /// reuse the running process. A no-op if no launch command is
    /// configured.
    ///
    /// # Errors
    ///
    /// Returns a description of the failure if the process could not be
    /// spawned or never became healthy within the poll window.
    pub async fn ensure_started(&self) -> Result<(), String> {
        let Some(command) = &self.command else {
            return Ok(());
        };

        let mut guard = self.child.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        log::info!("starting local model sidecar: {} {:?}", command.executable, command.args);
        let mut spawn = Command::new(&command.executable);
        spawn.args(&command.args);
        spawn.kill_on_drop(true);
        let child = spawn.spawn().map_err(|err| format!("failed to spawn sidecar: {err}"))?;
        *guard = Some(child);
        drop(guard);

        self.wait_until_healthy().await
    }

    async fn wait_until_healthy(&self) -> Result<(), String> {
        let deadline = tokio::time::Instant::now() + HEALTH_POLL_TIMEOUT;
        loop {
            if self.is_healthy().await {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(format!("sidecar did not become healthy within {HEALTH_POLL_TIMEOUT:?}"));
            }
            tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
        }
    }

    async fn is_healthy(&self) -> bool {
        self.client
            .get(format!("{}/v1/models", self.base_url.trim_end_matches('/')))
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .is_ok_and(|resp| resp.status().is_success())
    }

    /// Gives a running sidecar `GRACEFUL_SHUTDOWN_PERIOD` to exit on its
    /// own, then force-kills it. A no-op if no sidecar was started.
    pub async fn shutdown(&self) {
        let mut guard = self.child.lock().await;
        let Some(mut child) = guard.take() else {
            return;
        };

        if tokio::time::timeout(GRACEFUL_SHUTDOWN_PERIOD, child.wait()).await.is_err() {
            log::warn!("local model sidecar did not exit within the grace period, killing");
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_command_parses_executable_and_args() {
        std::env::set_var("DIAG_LOCAL_SIDECAR_CMD", "ollama serve --port 11434");
        let command = SidecarCommand::from_env().unwrap();
        assert_eq!(command.executable, "ollama");
        assert_eq!(command.args, vec!["serve", "--port", "11434"]);
        std::env::remove_var("DIAG_LOCAL_SIDECAR_CMD");
    }

    #[tokio::test]
    async fn ensure_started_is_a_no_op_without_a_configured_command() {
        let sidecar = LocalSidecar::new(None, "http://127.0.0.1:11434".to_string());
        sidecar.ensure_started().await.unwrap();
        sidecar.shutdown().await;
    }
}
