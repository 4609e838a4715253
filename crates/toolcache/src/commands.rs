//! Command execution for the toolcache CLI.

use tracing::Instrument;
use toolcache_core::{
    Config, Error, ExecOptions, InstallOptions, Result, ToolContext, ToolHandle, ToolManager,
    ToolRegistry,
};

#[derive(Debug, Clone)]
pub enum Command {
    Get {
        tool: String,
        toolchain: Option<String>,
    },
    Install {
        tool: String,
        options: InstallOptions,
    },
    GetOrInstall {
        tool: String,
        options: InstallOptions,
    },
    Run {
        tool: String,
        options: InstallOptions,
        args: Vec<String>,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Get { .. } => "get",
            Self::Install { .. } => "install",
            Self::GetOrInstall { .. } => "get-or-install",
            Self::Run { .. } => "run",
        }
    }

    fn tool(&self) -> &str {
        match self {
            Self::Get { tool, .. }
            | Self::Install { tool, .. }
            | Self::GetOrInstall { tool, .. }
            | Self::Run { tool, .. } => tool,
        }
    }
}

/// Look `tool` up in the built-in registry.
pub fn manager_for(tool: &str, context: ToolContext) -> Result<ToolManager> {
    let registry = ToolRegistry::with_builtin_tools();
    registry
        .get(tool)
        .cloned()
        .map(|definition| ToolManager::new(definition, context))
        .ok_or_else(|| {
            Error::configuration(format!(
                "Unknown tool `{tool}`, expected one of: {}",
                registry.names().join(", ")
            ))
        })
}

/// Execute `command` and return the process exit code.
pub async fn execute(command: Command, config: &Config) -> Result<i32> {
    let span = crate::command_span!(command.name(), tool = command.tool());
    async {
        let context = ToolContext::from_config(config)?;
        let manager = manager_for(command.tool(), context)?;

        match command {
            Command::Get { toolchain, .. } => {
                print_handle(&manager.get(toolchain.as_deref())?);
                Ok(0)
            }
            Command::Install { options, .. } => {
                print_handle(&manager.install(&options).await?);
                Ok(0)
            }
            Command::GetOrInstall { options, .. } => {
                print_handle(&manager.get_or_install(&options).await?);
                Ok(0)
            }
            Command::Run { options, args, .. } => {
                let handle = manager.get_or_install(&options).await?;
                handle.call(args, &ExecOptions::new()).await
            }
        }
    }
    .instrument(span)
    .await
}

#[allow(clippy::print_stdout)]
fn print_handle(handle: &ToolHandle) {
    println!("{}", handle.tool_path().display());
}
