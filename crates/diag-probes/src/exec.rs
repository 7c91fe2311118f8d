//! Subprocess execution with a hard wall-clock timeout.

use std::time::Duration;

use tokio::process::Command;

/// Default per-probe timeout (§4.1). Ping probes may override this up to
/// 60s.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Captured output of a completed (or timed-out) subprocess.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed before exiting.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error. Presence alone does not mark failure; the
    /// probe's parser decides success.
    pub stderr: String,
    /// Wall-clock duration of the invocation.
    pub duration_ms: u64,
    /// `true` if the process was killed because it exceeded its timeout.
    pub timed_out: bool,
}

/// Runs `executable args...` with a hard timeout, capturing stdout/stderr.
///
/// On timeout, the child is terminated and whatever output had been
/// buffered is returned with `timed_out = true`. This never treats stderr
/// output alone as failure; that decision belongs to the probe's parser.
///
/// # Errors
///
/// Returns an I/O error if the process could not be spawned at all.
pub async fn run_with_timeout(
    executable: &str,
    args: &[String],
    timeout: Duration,
) -> std::io::Result<CommandOutput> {
    let mut command = Command::new(executable);
    command.args(args);
    command.kill_on_drop(true);
    command.stdout(std::process::Stdio::piped());
    command.stderr(std::process::Stdio::piped());

    #[cfg(windows)]
    {
        // CREATE_NO_WINDOW: suppress a visible console window.
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        std::os::windows::process::CommandExt::creation_flags(&mut command, CREATE_NO_WINDOW);
    }

    let start = std::time::Instant::now();
    let child = command.spawn()?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            timed_out: false,
        }),
        Ok(Err(err)) => Err(err),
        Err(_elapsed) => {
            log::warn!("probe command '{executable}' timed out after {timeout:?}");
            Ok(CommandOutput {
                exit_code: None,
                stdout: String::new(),
                stderr: String::new(),
                duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                timed_out: true,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_on_success() {
        let output = run_with_timeout("echo", &["hello".to_string()], DEFAULT_TIMEOUT)
            .await
            .unwrap();
        assert!(!output.timed_out);
        assert_eq!(output.exit_code, Some(0));
        assert!(output.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn times_out_long_running_command() {
        let output = run_with_timeout(
            "sleep",
            &["5".to_string()],
            Duration::from_millis(100),
        )
        .await
        .unwrap();
        assert!(output.timed_out);
        assert_eq!(output.exit_code, None);
    }
}
