//! Logged subprocess execution.
//!
//! External tools (configure/make, package managers, setup scripts) are the
//! only long-running operations in a resolution run. Their combined output
//! is captured to a per-dependency log file so a failure can always point
//! the user at the full transcript, and the first log line records the
//! exact argv that ran.

use crate::error::{CairnError, Result};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Result of executing an external command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code (None if killed by signal).
    pub exit_code: Option<i32>,
    /// Whether the command exited successfully.
    pub success: bool,
    /// Execution duration.
    pub duration: Duration,
}

/// Options for command execution.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Working directory.
    pub cwd: Option<PathBuf>,
    /// Environment variables merged over the inherited environment.
    pub env: HashMap<String, String>,
    /// Log file receiving stdout and stderr (appended).
    pub log: Option<PathBuf>,
}

impl ExecOptions {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            cwd: Some(dir.to_path_buf()),
            ..Self::default()
        }
    }

    pub fn with_log(mut self, log: &Path) -> Self {
        self.log = Some(log.to_path_buf());
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }
}

/// Render an argv for logs and error messages.
pub fn render_argv(program: &str, args: &[String]) -> String {
    let mut rendered = program.to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(arg);
    }
    rendered
}

/// Execute a command, capturing stdout and stderr into the log file.
///
/// A nonzero exit is reported in the returned [`CommandResult`], not as an
/// error; failure to spawn is a `Command` error.
pub fn run_logged(program: &str, args: &[String], options: &ExecOptions) -> Result<CommandResult> {
    let start = Instant::now();
    let rendered = render_argv(program, args);

    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }
    for (key, value) in &options.env {
        cmd.env(key, value);
    }

    match &options.log {
        Some(log_path) => {
            if let Some(parent) = log_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut log = OpenOptions::new().create(true).append(true).open(log_path)?;
            writeln!(log, "$ {rendered}")?;
            log.flush()?;
            let stderr_log = log.try_clone()?;
            cmd.stdout(Stdio::from(log));
            cmd.stderr(Stdio::from(stderr_log));
        }
        None => {
            cmd.stdout(Stdio::null());
            cmd.stderr(Stdio::null());
        }
    }

    tracing::debug!(command = %rendered, "running");
    let status = cmd.status().map_err(|_| CairnError::Command {
        command: rendered.clone(),
        code: None,
    })?;

    Ok(CommandResult {
        exit_code: status.code(),
        success: status.success(),
        duration: start.elapsed(),
    })
}

/// Execute a command and collect its stdout as a string (no logging).
pub fn capture_stdout(program: &str, args: &[String], options: &ExecOptions) -> Result<String> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }
    for (key, value) in &options.env {
        cmd.env(key, value);
    }
    cmd.stderr(Stdio::null());

    let output = cmd.output().map_err(|_| CairnError::Command {
        command: render_argv(program, args),
        code: None,
    })?;
    if !output.status.success() {
        return Err(CairnError::Command {
            command: render_argv(program, args),
            code: output.status.code(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Whether the current process already has administrative privileges.
#[cfg(unix)]
pub fn is_admin() -> bool {
    // Safe: geteuid has no failure mode.
    unsafe { libc::geteuid() == 0 }
}

/// Elevation on Windows is handled by the surrounding toolchain.
#[cfg(not(unix))]
pub fn is_admin() -> bool {
    true
}

/// Execute a command with elevated privileges, prefixing `sudo` when the
/// current process is not already root. The elevation mechanism itself is
/// an external collaborator; everything else matches [`run_logged`].
pub fn run_elevated(program: &str, args: &[String], options: &ExecOptions) -> Result<CommandResult> {
    if cfg!(unix) && !is_admin() {
        let mut sudo_args = vec![program.to_string()];
        sudo_args.extend(args.iter().cloned());
        run_logged("sudo", &sudo_args, options)
    } else {
        run_logged(program, args, options)
    }
}

/// Open a log file for appending, creating parent directories.
pub fn open_log(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn run_logged_captures_output_to_log() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("echo.log");
        let options = ExecOptions::default().with_log(&log);

        let result = run_logged("echo", &["hello".to_string()], &options).unwrap();
        assert!(result.success);
        assert_eq!(result.exit_code, Some(0));

        let contents = std::fs::read_to_string(&log).unwrap();
        assert!(contents.starts_with("$ echo hello"));
        assert!(contents.contains("hello"));
    }

    #[test]
    fn run_logged_appends_across_invocations() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("build.log");
        let options = ExecOptions::default().with_log(&log);

        run_logged("echo", &["one".to_string()], &options).unwrap();
        run_logged("echo", &["two".to_string()], &options).unwrap();

        let contents = std::fs::read_to_string(&log).unwrap();
        assert!(contents.contains("one"));
        assert!(contents.contains("two"));
    }

    #[test]
    fn run_logged_reports_nonzero_exit() {
        let result = run_logged("false", &[], &ExecOptions::default()).unwrap();
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(1));
    }

    #[test]
    fn run_logged_spawn_failure_is_command_error() {
        let result = run_logged("definitely-not-a-real-binary-xyz", &[], &ExecOptions::default());
        assert!(matches!(result, Err(CairnError::Command { .. })));
    }

    #[test]
    fn run_logged_honors_cwd() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("pwd.log");
        let options = ExecOptions::in_dir(temp.path()).with_log(&log);

        run_logged("pwd", &[], &options).unwrap();
        let contents = std::fs::read_to_string(&log).unwrap();
        let canonical = temp.path().canonicalize().unwrap();
        assert!(contents.contains(&canonical.to_string_lossy().to_string()));
    }

    #[test]
    fn capture_stdout_returns_trimmed_output() {
        let out = capture_stdout("echo", &["captured".to_string()], &ExecOptions::default())
            .unwrap();
        assert_eq!(out, "captured");
    }

    #[test]
    fn capture_stdout_nonzero_is_error() {
        let result = capture_stdout("false", &[], &ExecOptions::default());
        assert!(matches!(result, Err(CairnError::Command { .. })));
    }

    #[test]
    fn exec_options_env_is_applied() {
        let options = ExecOptions::default().with_env("CAIRN_TEST_VAR", "set-by-test");
        let out = capture_stdout(
            "sh",
            &["-c".to_string(), "echo $CAIRN_TEST_VAR".to_string()],
            &options,
        )
        .unwrap();
        assert_eq!(out, "set-by-test");
    }

    #[test]
    fn render_argv_joins_with_spaces() {
        assert_eq!(
            render_argv("make", &["install".to_string()]),
            "make install"
        );
    }
}
