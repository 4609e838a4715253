//! Subprocess execution.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

use crate::{Error, Result};

/// How the child's standard streams are wired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StdioMode {
    /// Share the parent's stdout/stderr (CI log output).
    #[default]
    Inherit,
    /// Capture stdout/stderr into the returned [`ExecOutput`].
    Capture,
}

/// Options bag for one subprocess invocation.
///
/// The default neither fails on a non-zero exit nor on stderr output: the exit
/// code is handed back to the caller to interpret.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Turn a non-zero exit code into [`Error::Exec`].
    pub fail_on_exit_code: bool,
    /// Turn non-empty stderr into [`Error::Exec`]. With
    /// [`StdioMode::Inherit`] stderr is still forwarded to the parent.
    pub fail_on_stderr: bool,
    /// Stream wiring.
    pub stdio: StdioMode,
    /// Working directory for the child; inherits the parent's when unset.
    pub cwd: Option<PathBuf>,
}

impl ExecOptions {
    /// Create default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail on a non-zero exit code.
    #[must_use]
    pub fn checked(mut self) -> Self {
        self.fail_on_exit_code = true;
        self
    }

    /// Fail when the child writes to stderr.
    #[must_use]
    pub fn fail_on_stderr(mut self) -> Self {
        self.fail_on_stderr = true;
        self
    }

    /// Capture output instead of inheriting it.
    #[must_use]
    pub fn captured(mut self) -> Self {
        self.stdio = StdioMode::Capture;
        self
    }

    /// Run the child in `dir`.
    #[must_use]
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

/// Result of a finished subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exit code; `-1` when the child was terminated by a signal.
    pub code: i32,
    /// Captured stdout (empty unless captured).
    pub stdout: String,
    /// Captured stderr (empty unless captured).
    pub stderr: String,
}

impl ExecOutput {
    /// Whether the child exited with code 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Runs executables by path.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` and wait for it to exit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Exec`] if the program cannot be spawned or the
    /// options' failure conditions are met.
    async fn run(&self, program: &Path, args: &[String], options: &ExecOptions)
    -> Result<ExecOutput>;
}

/// [`CommandRunner`] spawning real processes through tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        options: &ExecOptions,
    ) -> Result<ExecOutput> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(cwd) = &options.cwd {
            cmd.current_dir(cwd);
        }

        debug!(program = %program.display(), ?args, stdio = ?options.stdio, "Executing");

        let output = match options.stdio {
            StdioMode::Inherit if options.fail_on_stderr => {
                let mut child = cmd
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::piped())
                    .spawn()
                    .map_err(|e| Error::exec(program, format!("failed to spawn: {e}")))?;
                let stderr = match child.stderr.take() {
                    Some(pipe) => tee_stderr(pipe)
                        .await
                        .map_err(|e| Error::exec(program, format!("failed to read stderr: {e}")))?,
                    None => String::new(),
                };
                let status = child
                    .wait()
                    .await
                    .map_err(|e| Error::exec(program, format!("failed to wait: {e}")))?;
                ExecOutput {
                    code: status.code().unwrap_or(-1),
                    stderr,
                    ..ExecOutput::default()
                }
            }
            StdioMode::Inherit => {
                let status = cmd
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit())
                    .status()
                    .await
                    .map_err(|e| Error::exec(program, format!("failed to spawn: {e}")))?;
                ExecOutput {
                    code: status.code().unwrap_or(-1),
                    ..ExecOutput::default()
                }
            }
            StdioMode::Capture => {
                let out = cmd
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped())
                    .output()
                    .await
                    .map_err(|e| Error::exec(program, format!("failed to spawn: {e}")))?;
                ExecOutput {
                    code: out.status.code().unwrap_or(-1),
                    stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
                }
            }
        };

        debug!(program = %program.display(), code = output.code, "Process exited");

        if options.fail_on_exit_code && !output.success() {
            return Err(Error::exec(
                program,
                format!("process exited with code {}", output.code),
            ));
        }
        if options.fail_on_stderr && !output.stderr.trim().is_empty() {
            return Err(Error::exec(
                program,
                format!("process wrote to stderr: {}", output.stderr.trim()),
            ));
        }
        Ok(output)
    }
}

/// Copy the child's stderr through to ours, keeping what was written.
async fn tee_stderr<R: AsyncRead + Unpin>(mut pipe: R) -> std::io::Result<String> {
    let mut seen = Vec::new();
    let mut buf = [0u8; 4096];
    let mut parent = tokio::io::stderr();
    loop {
        let n = pipe.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        parent.write_all(&buf[..n]).await?;
        seen.extend_from_slice(&buf[..n]);
    }
    parent.flush().await?;
    Ok(String::from_utf8_lossy(&seen).into_owned())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh() -> PathBuf {
        PathBuf::from("/bin/sh")
    }

    fn script(body: &str) -> Vec<String> {
        vec!["-c".to_string(), body.to_string()]
    }

    #[tokio::test]
    async fn test_exit_code_returned_unmodified() {
        let out = ProcessRunner
            .run(&sh(), &script("exit 3"), &ExecOptions::new())
            .await
            .unwrap();
        assert_eq!(out.code, 3);
        assert!(!out.success());
    }

    #[tokio::test]
    async fn test_checked_fails_on_non_zero() {
        let err = ProcessRunner
            .run(&sh(), &script("exit 1"), &ExecOptions::new().checked())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Exec { .. }));
    }

    #[tokio::test]
    async fn test_capture_output() {
        let out = ProcessRunner
            .run(
                &sh(),
                &script("echo hello; echo oops >&2"),
                &ExecOptions::new().captured(),
            )
            .await
            .unwrap();
        assert_eq!(out.code, 0);
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn test_fail_on_stderr() {
        let err = ProcessRunner
            .run(
                &sh(),
                &script("echo oops >&2"),
                &ExecOptions::new().captured().fail_on_stderr(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("oops"));
    }

    #[tokio::test]
    async fn test_fail_on_stderr_with_inherited_streams() {
        let err = ProcessRunner
            .run(&sh(), &script("echo oops >&2"), &ExecOptions::new().fail_on_stderr())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Exec { .. }));
        assert!(err.to_string().contains("oops"));

        let out = ProcessRunner
            .run(&sh(), &script("echo fine; exit 2"), &ExecOptions::new().fail_on_stderr())
            .await
            .unwrap();
        assert_eq!(out.code, 2);
    }

    #[tokio::test]
    async fn test_cwd_option() {
        let dir = tempfile::TempDir::new().unwrap();
        let expected = dir.path().canonicalize().unwrap();
        let out = ProcessRunner
            .run(
                &sh(),
                &script("pwd -P"),
                &ExecOptions::new().captured().in_dir(dir.path()),
            )
            .await
            .unwrap();
        assert_eq!(PathBuf::from(out.stdout.trim()), expected);
    }

    #[tokio::test]
    async fn test_missing_program_is_exec_error() {
        let err = ProcessRunner
            .run(
                Path::new("/definitely/not/a/program"),
                &[],
                &ExecOptions::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Exec { .. }));
    }
}
