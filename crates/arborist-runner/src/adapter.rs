//! Subprocess-based Runner Adapter: a single opaque
//! `run(prompt, cwd, timeout, prefix, env) -> RunnerResult` operation, built
//! on plain `tokio::process::Command` stdin/stdout/exit-status rather than a
//! PTY -- this kernel wants a conventional child process, not a terminal.

use crate::error::RunnerError;
use crate::templates::{CommandTemplate, PromptDelivery};
use arborist_core::shutdown::ShutdownSignal;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};

/// Default capture cap: head+tail retained, the rest truncated with a
/// marker, so a runaway process cannot blow up a commit body.
pub const DEFAULT_CAPTURE_CAP: usize = 64 * 1024;

/// How long a cancelled subprocess is given to exit on its own before a
/// terminal signal is sent, per spec §5's grace-timeout cancellation
/// semantics.
pub const CANCEL_GRACE: Duration = Duration::from_secs(15);

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone)]
pub struct RunnerResult {
    pub success: bool,
    pub output: String,
    pub exit_code: Option<i32>,
    pub duration: Duration,
    pub timed_out: bool,
    pub cancelled: bool,
}

#[async_trait]
pub trait RunnerAdapter: Send + Sync {
    async fn run(
        &self,
        prompt_text: &str,
        working_directory: &std::path::Path,
        timeout_seconds: u64,
        command_prefix: &[String],
        environment: &[(String, String)],
        cancel: Option<&ShutdownSignal>,
    ) -> RunnerResult;
}

/// Wait for `child` to exit, racing a hard `timeout` and, independently, a
/// cooperative cancellation signal. The controller stops issuing new runner
/// calls as soon as cancellation is requested, but a call already in flight
/// is allowed `grace` to exit on its own before this sends a kill -- the
/// "additional grace timeout" from spec §5. Production callers pass
/// `CANCEL_GRACE`; tests pass a shorter duration to stay fast.
pub async fn wait_with_cancellation(
    child: &mut Child,
    timeout: Duration,
    cancel: Option<&ShutdownSignal>,
    grace: Duration,
) -> (Option<std::process::ExitStatus>, bool, bool) {
    let deadline = Instant::now() + timeout;
    let mut cancelled_at: Option<Instant> = None;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            let _ = child.kill().await;
            return (child.wait().await.ok(), true, false);
        }

        let poll = remaining.min(CANCEL_POLL_INTERVAL);
        match tokio::time::timeout(poll, child.wait()).await {
            Ok(status) => return (status.ok(), false, false),
            Err(_) => {
                if let Some(signal) = cancel {
                    if signal.is_shutting_down() {
                        let since = *cancelled_at.get_or_insert_with(Instant::now);
                        if since.elapsed() >= grace {
                            let _ = child.kill().await;
                            return (child.wait().await.ok(), false, true);
                        }
                    }
                }
            }
        }
    }
}

pub struct ProcessRunner {
    template: CommandTemplate,
    capture_cap: usize,
}

impl ProcessRunner {
    pub fn new(template: CommandTemplate) -> Self {
        Self {
            template,
            capture_cap: DEFAULT_CAPTURE_CAP,
        }
    }

    pub fn with_capture_cap(mut self, cap: usize) -> Self {
        self.capture_cap = cap;
        self
    }
}

#[async_trait]
impl RunnerAdapter for ProcessRunner {
    async fn run(
        &self,
        prompt_text: &str,
        working_directory: &std::path::Path,
        timeout_seconds: u64,
        command_prefix: &[String],
        environment: &[(String, String)],
        cancel: Option<&ShutdownSignal>,
    ) -> RunnerResult {
        let start = Instant::now();

        let mut program_args: Vec<String> = command_prefix.to_vec();
        program_args.push(self.template.program.clone());
        program_args.extend(self.template.args.iter().cloned());

        if let PromptDelivery::Argv(idx) = self.template.prompt_via {
            if let Some(slot) = program_args.get_mut(command_prefix.len() + idx) {
                *slot = slot.replace("{prompt}", prompt_text);
            }
        }

        let (program, args) = match program_args.split_first() {
            Some((p, rest)) => (p.clone(), rest.to_vec()),
            None => {
                return RunnerResult {
                    success: false,
                    output: "no command configured for runner".to_string(),
                    exit_code: None,
                    duration: start.elapsed(),
                    timed_out: false,
                    cancelled: false,
                };
            }
        };

        let mut command = Command::new(&program);
        command
            .args(&args)
            .current_dir(working_directory)
            .envs(environment.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = match command.spawn() {
            Ok(c) => c,
            Err(e) => {
                return RunnerResult {
                    success: false,
                    output: format!("failed to launch runner: {}", RunnerError::Launch(e)),
                    exit_code: None,
                    duration: start.elapsed(),
                    timed_out: false,
                    cancelled: false,
                };
            }
        };

        if matches!(self.template.prompt_via, PromptDelivery::Stdin) {
            if let Some(mut stdin) = child.stdin.take() {
                let _ = stdin.write_all(prompt_text.as_bytes()).await;
                let _ = stdin.shutdown().await;
            }
        } else {
            drop(child.stdin.take());
        }

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();

        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut s) = stdout.take() {
                let _ = s.read_to_end(&mut buf).await;
            }
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut s) = stderr.take() {
                let _ = s.read_to_end(&mut buf).await;
            }
            buf
        });

        let timeout = Duration::from_secs(timeout_seconds);
        let (status, timed_out, cancelled) =
            wait_with_cancellation(&mut child, timeout, cancel, CANCEL_GRACE).await;

        let out_buf = stdout_task.await.unwrap_or_default();
        let err_buf = stderr_task.await.unwrap_or_default();
        let combined = combine_capped(&out_buf, &err_buf, self.capture_cap);

        RunnerResult {
            success: !timed_out && !cancelled && status.map(|s| s.success()).unwrap_or(false),
            output: if timed_out {
                format!("runner timed out after {timeout_seconds}s\n{combined}")
            } else if cancelled {
                format!("runner cancelled after a {}s grace period\n{combined}", CANCEL_GRACE.as_secs())
            } else {
                combined
            },
            exit_code: status.and_then(|s| s.code()),
            duration: start.elapsed(),
            timed_out,
            cancelled,
        }
    }
}

fn combine_capped(stdout: &[u8], stderr: &[u8], cap: usize) -> String {
    let mut combined = Vec::with_capacity(stdout.len() + stderr.len());
    combined.extend_from_slice(stdout);
    combined.extend_from_slice(stderr);
    let text = String::from_utf8_lossy(&combined).into_owned();
    cap_head_tail(&text, cap)
}

/// Truncate `text` to `cap` bytes, retaining head and tail with a marker in
/// between -- shared by callers that need the same policy applied to a
/// second artifact (e.g. a diff) outside a `RunnerResult`.
pub fn cap_head_tail(text: &str, cap: usize) -> String {
    if text.len() <= cap {
        return text.to_string();
    }
    let half = cap / 2;
    let head_end = floor_char_boundary(text, half);
    let tail_start = ceil_char_boundary(text, text.len() - half);
    format!(
        "{}\n... [truncated {} bytes] ...\n{}",
        &text[..head_end],
        text.len() - cap,
        &text[tail_start..]
    )
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::RunnerRegistry;

    #[tokio::test]
    async fn mock_runner_succeeds() {
        let reg = RunnerRegistry::with_defaults();
        let runner = ProcessRunner::new(reg.get("mock").unwrap().clone());
        let result = runner
            .run("do the thing", std::path::Path::new("."), 5, &[], &[], None)
            .await;
        assert!(result.success);
        assert!(!result.timed_out);
        assert!(!result.cancelled);
    }

    #[test]
    fn caps_output_retaining_head_and_tail() {
        let text = "x".repeat(1000);
        let capped = cap_head_tail(&text, 100);
        assert!(capped.len() < text.len());
        assert!(capped.contains("truncated"));
        assert!(capped.starts_with('x'));
        assert!(capped.ends_with('x'));
    }

    #[test]
    fn short_output_is_not_truncated() {
        assert_eq!(cap_head_tail("short", 100), "short");
    }

    #[tokio::test]
    async fn cancellation_waits_out_the_grace_period_then_kills() {
        let cancel = ShutdownSignal::new();
        cancel.trigger();
        let mut child = Command::new("sleep").arg("5").spawn().unwrap();

        let start = Instant::now();
        let (status, timed_out, cancelled) =
            wait_with_cancellation(&mut child, Duration::from_secs(30), Some(&cancel), Duration::from_millis(80))
                .await;

        assert!(cancelled);
        assert!(!timed_out);
        assert!(status.is_some());
        assert!(start.elapsed() >= Duration::from_millis(80));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn an_unset_cancellation_signal_does_not_interrupt_the_child() {
        let mut child = Command::new("sh").arg("-c").arg("exit 0").spawn().unwrap();
        let (status, timed_out, cancelled) =
            wait_with_cancellation(&mut child, Duration::from_secs(5), None, CANCEL_GRACE).await;

        assert!(!timed_out);
        assert!(!cancelled);
        assert!(status.unwrap().success());
    }
}
