//! Generic get / install / get-or-install for one tool.

use std::path::PathBuf;
use tracing::debug;

use super::context::ToolContext;
use super::definition::{Invocation, Lookup, ToolDefinition};
use super::handle::ToolHandle;
use crate::config::InstallOptions;
use crate::installer::InstallRequest;
use crate::{Error, Result};

/// Manages one tool, described by a [`ToolDefinition`].
#[derive(Debug, Clone)]
pub struct ToolManager {
    definition: ToolDefinition,
    context: ToolContext,
}

impl ToolManager {
    /// Create a manager for `definition`.
    #[must_use]
    pub fn new(definition: ToolDefinition, context: ToolContext) -> Self {
        Self {
            definition,
            context,
        }
    }

    /// Manager for `cargo-hack`.
    #[must_use]
    pub fn cargo_hack(context: ToolContext) -> Self {
        Self::new(ToolDefinition::cargo_hack(), context)
    }

    /// Manager for `cross`.
    #[must_use]
    pub fn cross(context: ToolContext) -> Self {
        Self::new(ToolDefinition::cross(), context)
    }

    /// The managed tool.
    #[must_use]
    pub fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    /// Look the tool up on the search path without installing anything.
    #[must_use]
    pub fn locate(&self) -> Lookup {
        self.context.locate(&self.definition.binary_name)
    }

    /// Get the already-installed tool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInstalled`] if the tool is not on the search path.
    pub fn get(&self, toolchain: Option<&str>) -> Result<ToolHandle> {
        match self.locate() {
            Lookup::Found(spec) => self.handle_for(spec.path, toolchain),
            Lookup::NotFound { name } => Err(Error::NotInstalled {
                tool: name,
                hint: Some(format!(
                    "Run `toolcache install {}` to install it",
                    self.definition.name
                )),
            }),
        }
    }

    /// Install the tool, ignoring any copy already on the search path.
    ///
    /// # Errors
    ///
    /// Propagates installer errors; see [`ToolInstaller::install`](crate::ToolInstaller::install).
    pub async fn install(&self, options: &InstallOptions) -> Result<ToolHandle> {
        let installer = self.context.installer()?;
        let path = installer.install(&self.request(options)).await?;
        self.handle_for(path, options.toolchain.as_deref())
    }

    /// Use the installed tool if present, otherwise install it.
    ///
    /// # Errors
    ///
    /// Only install errors propagate; the tool being absent is not an error.
    pub async fn get_or_install(&self, options: &InstallOptions) -> Result<ToolHandle> {
        match self.locate() {
            Lookup::Found(spec) => {
                debug!(tool = %self.definition.name, path = %spec.path.display(), "Reusing installed tool");
                self.handle_for(spec.path, options.toolchain.as_deref())
            }
            Lookup::NotFound { name } => {
                debug!(tool = %name, "Tool not found, installing");
                self.install(options).await
            }
        }
    }

    fn request(&self, options: &InstallOptions) -> InstallRequest {
        InstallRequest {
            tool_name: self.definition.crate_name.clone(),
            binary_name: self.definition.binary_name.clone(),
            version: options.version.clone(),
            primary_key: options.primary_key.clone(),
            restore_keys: options.restore_keys.clone(),
        }
    }

    fn handle_for(&self, tool_path: PathBuf, toolchain: Option<&str>) -> Result<ToolHandle> {
        let runner = self.context.runner();
        match &self.definition.invocation {
            Invocation::Direct => Ok(ToolHandle::new(tool_path, toolchain, None, runner)),
            Invocation::Subcommand(sub) => Ok(ToolHandle::new(
                self.context.cargo()?,
                toolchain,
                Some(sub.clone()),
                runner,
            )
            .with_tool_path(tool_path)),
        }
    }
}
