//! Sanitized execution bridge.
//!
//! Turns a validated request into an invocation of an endpoint script:
//!
//! ```text
//! /bin/sh <script_dir>/<script> <arg1> <arg2> ...
//! ```
//!
//! Every argument is passed on its own, never joined into a command line.
//! The child gets the environment from [`environment`] and nothing else,
//! runs in `script_dir` with stdin closed, and leads its own process group.
//! When the deadline expires or the request future is dropped, the whole
//! group is killed, so commands the script started die with it.

pub mod collect;
pub mod environment;

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::process::{Child, Command};
use tracing::{error, info, warn};

use crate::config::ApiConfig;
use crate::error::{AppError, AppResult};
use crate::metrics;

/// Interpreter used for every endpoint script.
pub const SHELL: &str = "/bin/sh";

/// An endpoint script and the prefix of its collection files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptAction {
    pub script: &'static str,
    pub collect_prefix: &'static str,
}

/// `POST /wan/update`: one argument per WAN address.
pub const WAN_UPDATE: ScriptAction = ScriptAction {
    script: "wan-update",
    collect_prefix: "wanips-update",
};

/// Everything needed to launch one script invocation.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub script_path: PathBuf,
    pub arguments: Vec<String>,
    pub environment: environment::ScriptEnvironment,
    pub working_directory: PathBuf,
    pub collect_file: PathBuf,
}

impl ExecutionRequest {
    /// Build the child process command.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(SHELL);
        cmd.arg(&self.script_path)
            .args(&self.arguments)
            .env_clear()
            .envs(&self.environment)
            .current_dir(&self.working_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }

    /// Printable command line for logs.
    pub fn display_command(&self) -> String {
        let mut line = format!("{SHELL} {}", self.script_path.display());
        for arg in &self.arguments {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Captured outcome of a finished script.
#[derive(Debug)]
pub struct ExecutionResult {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ExecutionResult {
    /// Stdout decoded as UTF-8, invalid sequences replaced.
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Launches endpoint scripts with a sanitized environment under a deadline.
///
/// Cheap to clone; shared through `AppState`.
#[derive(Debug, Clone)]
pub struct ExecutionBridge {
    script_dir: PathBuf,
    collect_dir: PathBuf,
    dry_run: bool,
    timeout: Duration,
}

impl ExecutionBridge {
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            script_dir: config.script_dir.clone(),
            collect_dir: PathBuf::from(collect::COLLECT_DIR),
            dry_run: config.dry,
            timeout: config.script_timeout(),
        }
    }

    /// Build the request for one invocation of `action`.
    ///
    /// Each call names a fresh collection file.
    pub fn prepare(&self, action: ScriptAction, arguments: Vec<String>) -> ExecutionRequest {
        let collect_file = collect::collect_file_path(&self.collect_dir, action.collect_prefix);
        let environment =
            environment::invocation_environment(self.dry_run, &self.script_dir, &collect_file);

        ExecutionRequest {
            script_path: self.script_dir.join(action.script),
            arguments,
            environment,
            working_directory: self.script_dir.clone(),
            collect_file,
        }
    }

    /// Spawn the request and wait for it under the deadline.
    ///
    /// A non-zero exit is not an error here; see [`ExecutionBridge::run`].
    ///
    /// # Errors
    ///
    /// `ExecutionFailed` if the process cannot be spawned or waited on,
    /// `ExecutionTimeout` if the deadline expires. In the timeout case the
    /// script's whole process group is killed before returning.
    pub async fn execute(&self, request: &ExecutionRequest) -> AppResult<ExecutionResult> {
        let child = request.command().spawn().map_err(|e| {
            AppError::ExecutionFailed(format!(
                "failed to launch {}: {e}",
                request.script_path.display()
            ))
        })?;
        let group = ProcessGroupGuard::new(&child);

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => {
                group.disarm();
                output.map_err(|e| {
                    AppError::ExecutionFailed(format!("failed to collect output: {e}"))
                })?
            }
            Err(_) => {
                warn!(
                    script = %request.script_path.display(),
                    timeout = ?self.timeout,
                    "Endpoint script exceeded its deadline, killing process group"
                );
                drop(group);
                return Err(AppError::ExecutionTimeout(self.timeout));
            }
        };

        Ok(ExecutionResult {
            status: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    /// Run `action` with `arguments` and return its stdout.
    ///
    /// # Errors
    ///
    /// Launch failures, non-zero exits and deadline expiry all surface as
    /// execution errors. Stderr is logged, never returned.
    pub async fn run(&self, action: ScriptAction, arguments: Vec<String>) -> AppResult<String> {
        let request = self.prepare(action, arguments);
        info!(
            command = %request.display_command(),
            collect_file = %request.collect_file.display(),
            dry_run = self.dry_run,
            "Running endpoint script"
        );

        let start = Instant::now();
        let result = self.execute(&request).await;
        metrics::record_script_duration(action.script, start.elapsed().as_secs_f64());

        let result = match result {
            Ok(result) => result,
            Err(e) => {
                let outcome = match e {
                    AppError::ExecutionTimeout(_) => "timeout",
                    _ => "spawn_error",
                };
                metrics::record_script_run(action.script, outcome);
                return Err(e);
            }
        };

        if !result.status.success() {
            metrics::record_script_run(action.script, "failure");
            error!(
                script = action.script,
                status = %result.status,
                stderr = %String::from_utf8_lossy(&result.stderr),
                "Endpoint script failed"
            );
            return Err(AppError::ExecutionFailed(format!(
                "{} exited with {}",
                action.script, result.status
            )));
        }

        if !result.stderr.is_empty() {
            warn!(
                script = action.script,
                stderr = %String::from_utf8_lossy(&result.stderr),
                "Endpoint script wrote to stderr"
            );
        }

        metrics::record_script_run(action.script, "success");
        Ok(result.stdout_lossy())
    }
}

/// SIGKILLs a child's process group on drop unless disarmed.
///
/// `kill_on_drop` only reaches the shell itself; anything it started runs in
/// the same group, which the child leads (`process_group(0)`).
struct ProcessGroupGuard {
    pgid: Option<i32>,
}

impl ProcessGroupGuard {
    fn new(child: &Child) -> Self {
        Self {
            pgid: child.id().and_then(|pid| i32::try_from(pid).ok()),
        }
    }

    /// Leave the group alone; the script finished on its own.
    fn disarm(mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        let Some(pgid) = self.pgid.take() else {
            return;
        };

        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::{Signal, killpg};
            use nix::unistd::Pid;

            match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
                // Group already gone
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => warn!(pgid, error = %e, "Failed to kill script process group"),
            }
        }
        #[cfg(not(unix))]
        let _ = pgid;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::ffi::OsStr;
    use std::path::Path;

    use super::*;

    fn bridge(dir: &Path, dry: bool, timeout_secs: u64) -> ExecutionBridge {
        let config = ApiConfig {
            script_dir: dir.to_path_buf(),
            dry,
            script_timeout_secs: timeout_secs,
            ..ApiConfig::default()
        };
        ExecutionBridge::new(&config)
    }

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mptcpkit-bridge-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_script(dir: &Path, body: &str) {
        std::fs::write(dir.join("wan-update"), format!("#!/bin/sh\n{body}\n")).unwrap();
    }

    #[test]
    fn test_prepare_layout() {
        let b = bridge(Path::new("/etc/mptcpkit/endpoints"), false, 60);
        let request = b.prepare(WAN_UPDATE, vec!["1.2.3.4".into(), "5.6.7.8".into()]);

        assert_eq!(
            request.script_path,
            PathBuf::from("/etc/mptcpkit/endpoints/wan-update")
        );
        assert_eq!(request.arguments, vec!["1.2.3.4", "5.6.7.8"]);
        assert_eq!(
            request.working_directory,
            PathBuf::from("/etc/mptcpkit/endpoints")
        );
        assert!(request.collect_file.starts_with("/tmp"));
        assert_eq!(
            request.environment[environment::COLLECT_FILE_VAR].as_os_str(),
            request.collect_file.as_os_str()
        );
    }

    #[test]
    fn test_prepare_fresh_collect_file() {
        let b = bridge(Path::new("/s"), false, 60);
        let first = b.prepare(WAN_UPDATE, vec![]);
        let second = b.prepare(WAN_UPDATE, vec![]);
        assert_ne!(first.collect_file, second.collect_file);
    }

    #[test]
    fn test_command_args_are_discrete() {
        let b = bridge(Path::new("/s"), false, 60);
        let request = b.prepare(WAN_UPDATE, vec!["1.2.3.4".into(), "a b".into()]);
        let cmd = request.command();
        let std_cmd = cmd.as_std();

        assert_eq!(std_cmd.get_program(), OsStr::new(SHELL));
        let args: Vec<&OsStr> = std_cmd.get_args().collect();
        assert_eq!(
            args,
            vec![
                OsStr::new("/s/wan-update"),
                OsStr::new("1.2.3.4"),
                OsStr::new("a b")
            ]
        );
        assert_eq!(std_cmd.get_current_dir(), Some(Path::new("/s")));
    }

    #[test]
    fn test_command_environment_only_sanitized() {
        let b = bridge(Path::new("/s"), true, 60);
        let request = b.prepare(WAN_UPDATE, vec![]);
        let cmd = request.command();

        let names: Vec<String> = cmd
            .as_std()
            .get_envs()
            .filter(|(_, v)| v.is_some())
            .map(|(k, _)| k.to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            names,
            vec![
                "COLLECT_FILE",
                "IFS",
                "MPTCPKIT_DRYRUN",
                "PATH",
                "SCRIPT_DIR",
                "TZ"
            ]
        );
    }

    #[test]
    fn test_display_command() {
        let b = bridge(Path::new("/s"), false, 60);
        let request = b.prepare(WAN_UPDATE, vec!["1.2.3.4".into()]);
        assert_eq!(request.display_command(), "/bin/sh /s/wan-update 1.2.3.4");
    }

    #[tokio::test]
    async fn test_run_returns_stdout() {
        let dir = scratch_dir();
        write_script(&dir, r#"echo "$# $1 $2""#);

        let output = bridge(&dir, false, 10)
            .run(WAN_UPDATE, vec!["1.2.3.4".into(), "5.6.7.8".into()])
            .await
            .unwrap();
        assert_eq!(output, "2 1.2.3.4 5.6.7.8\n");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_run_nonzero_exit() {
        let dir = scratch_dir();
        write_script(&dir, "echo partial; echo oops >&2; exit 1");

        let result = bridge(&dir, false, 10).run(WAN_UPDATE, vec![]).await;
        assert!(matches!(result, Err(AppError::ExecutionFailed(_))));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_run_missing_script() {
        let dir = scratch_dir();

        // The shell starts but cannot open the script, exiting non-zero
        let result = bridge(&dir, false, 10).run(WAN_UPDATE, vec![]).await;
        assert!(matches!(result, Err(AppError::ExecutionFailed(_))));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_run_timeout() {
        let dir = scratch_dir();
        write_script(&dir, "exec sleep 30");

        let start = Instant::now();
        let result = bridge(&dir, false, 1).run(WAN_UPDATE, vec![]).await;
        assert!(matches!(result, Err(AppError::ExecutionTimeout(_))));
        assert!(start.elapsed() < Duration::from_secs(10));

        std::fs::remove_dir_all(&dir).ok();
    }

    /// Processes whose command line contains `needle`, from `/proc`.
    #[cfg(target_os = "linux")]
    fn processes_matching(needle: &str) -> Vec<String> {
        std::fs::read_dir("/proc")
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().parse::<u32>().is_ok())
            .filter_map(|entry| std::fs::read(entry.path().join("cmdline")).ok())
            .map(|raw| String::from_utf8_lossy(&raw).replace('\0', " "))
            .filter(|cmdline| cmdline.contains(needle))
            .collect()
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_run_timeout_kills_script_children() {
        let dir = scratch_dir();
        // Not exec'd: sleep is a child of the shell, not the shell itself
        write_script(&dir, "sleep 37.123; echo done");

        let result = bridge(&dir, false, 1).run(WAN_UPDATE, vec![]).await;
        assert!(matches!(result, Err(AppError::ExecutionTimeout(_))));

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut survivors = processes_matching("sleep 37.123");
        while !survivors.is_empty() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
            survivors = processes_matching("sleep 37.123");
        }
        assert!(survivors.is_empty(), "still running: {survivors:?}");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_run_dry_run_marker() {
        let dir = scratch_dir();
        write_script(&dir, r#"echo "dry=${MPTCPKIT_DRYRUN:-0}""#);

        let output = bridge(&dir, true, 10).run(WAN_UPDATE, vec![]).await.unwrap();
        assert_eq!(output, "dry=1\n");

        std::fs::remove_dir_all(&dir).ok();
    }
}
