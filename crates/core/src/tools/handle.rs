//! Callable reference to an installed tool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::Result;
use crate::exec::{CommandRunner, ExecOptions, ExecOutput};
use crate::toolchain::toolchain_arg;

/// An installed tool, ready to be invoked.
///
/// Handles are built by [`ToolManager`](super::ToolManager) and never change
/// afterwards. Arguments are assembled as
/// `[+toolchain] [subcommand] args...`.
pub struct ToolHandle {
    path: PathBuf,
    tool_path: PathBuf,
    toolchain_arg: String,
    subcommand: Option<String>,
    runner: Arc<dyn CommandRunner>,
}

impl std::fmt::Debug for ToolHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolHandle")
            .field("path", &self.path)
            .field("tool_path", &self.tool_path)
            .field("toolchain_arg", &self.toolchain_arg)
            .field("subcommand", &self.subcommand)
            .finish_non_exhaustive()
    }
}

impl ToolHandle {
    pub(crate) fn new(
        path: PathBuf,
        toolchain: Option<&str>,
        subcommand: Option<String>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            tool_path: path.clone(),
            path,
            toolchain_arg: toolchain_arg(toolchain),
            subcommand,
            runner,
        }
    }

    /// Use `tool_path` as the tool's own binary while still running `path`.
    #[must_use]
    pub(crate) fn with_tool_path(mut self, tool_path: PathBuf) -> Self {
        self.tool_path = tool_path;
        self
    }

    /// Executable that is run.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The tool's own installed binary.
    ///
    /// Differs from [`path`](Self::path) for cargo sub-commands, which are
    /// run through `cargo`.
    #[must_use]
    pub fn tool_path(&self) -> &Path {
        &self.tool_path
    }

    /// `+toolchain` argument, empty for the default toolchain.
    #[must_use]
    pub fn toolchain_arg(&self) -> &str {
        &self.toolchain_arg
    }

    /// Sub-command inserted before the caller's arguments, if any.
    #[must_use]
    pub fn subcommand(&self) -> Option<&str> {
        self.subcommand.as_deref()
    }

    /// Full argument vector for `args`.
    #[must_use]
    pub fn command_args<I, S>(&self, args: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut full = Vec::new();
        if !self.toolchain_arg.is_empty() {
            full.push(self.toolchain_arg.clone());
        }
        if let Some(sub) = &self.subcommand {
            full.push(sub.clone());
        }
        full.extend(args.into_iter().map(Into::into));
        full
    }

    /// Run the tool and return its exit code as-is.
    ///
    /// A non-zero code is only an error if `options` asks for it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Exec`](crate::Error::Exec) if the tool cannot be
    /// spawned or `options`' failure conditions are met.
    pub async fn call<I, S>(&self, args: I, options: &ExecOptions) -> Result<i32>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(self.output(args, options).await?.code)
    }

    /// Run the tool and return the full [`ExecOutput`].
    ///
    /// # Errors
    ///
    /// Same as [`call`](Self::call).
    pub async fn output<I, S>(&self, args: I, options: &ExecOptions) -> Result<ExecOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args = self.command_args(args);
        self.runner.run(&self.path, &args, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::ProcessRunner;

    fn handle(toolchain: Option<&str>, subcommand: Option<&str>) -> ToolHandle {
        ToolHandle::new(
            PathBuf::from("/bin/cargo"),
            toolchain,
            subcommand.map(String::from),
            Arc::new(ProcessRunner),
        )
    }

    #[test]
    fn test_args_without_toolchain() {
        let h = handle(None, None);
        assert_eq!(h.toolchain_arg(), "");
        assert_eq!(h.command_args(["--version"]), vec!["--version"]);
    }

    #[test]
    fn test_args_with_toolchain() {
        let h = handle(Some("nightly"), None);
        assert_eq!(
            h.command_args(["build", "--target", "aarch64-unknown-linux-gnu"]),
            vec!["+nightly", "build", "--target", "aarch64-unknown-linux-gnu"]
        );
    }

    #[test]
    fn test_tool_path_defaults_to_program() {
        let h = handle(None, None);
        assert_eq!(h.tool_path(), Path::new("/bin/cargo"));

        let h = handle(None, Some("hack")).with_tool_path(PathBuf::from("/bin/cargo-hack"));
        assert_eq!(h.path(), Path::new("/bin/cargo"));
        assert_eq!(h.tool_path(), Path::new("/bin/cargo-hack"));
    }

    #[test]
    fn test_args_with_subcommand() {
        let h = handle(Some("+beta"), Some("hack"));
        assert_eq!(h.subcommand(), Some("hack"));
        assert_eq!(
            h.command_args(["check", "--each-feature"]),
            vec!["+beta", "hack", "check", "--each-feature"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_call_returns_exit_code() {
        let h = ToolHandle::new(PathBuf::from("/bin/sh"), None, None, Arc::new(ProcessRunner));
        let code = h.call(["-c", "exit 7"], &ExecOptions::new()).await.unwrap();
        assert_eq!(code, 7);
    }
}
