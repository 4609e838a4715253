use crate::commands::Command;
use crate::tracing::{LogLevel, TracingFormat};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use toolcache_core::{Config, InstallOptions};

#[derive(Parser, Debug)]
#[command(name = "toolcache")]
#[command(about = "Install, cache and run cargo-hack and cross in CI")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short = 'l',
        long,
        global = true,
        help = "Set logging level",
        default_value = "info",
        value_enum
    )]
    pub level: LogLevel,

    #[arg(
        long,
        global = true,
        help = "Log output format",
        default_value = "compact",
        value_enum
    )]
    pub format: TracingFormat,

    #[arg(
        long,
        global = true,
        env = "TOOLCACHE_CACHE_DIR",
        help = "Directory holding cached tool archives"
    )]
    pub cache_dir: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        env = "TOOLCACHE_REGISTRY_URL",
        help = "Registry base URL used to resolve `latest`"
    )]
    pub registry: Option<String>,

    #[arg(
        long,
        global = true,
        env = "TOOLCACHE_NAMESPACE",
        help = "Namespace for default cache keys"
    )]
    pub namespace: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Print the path of an installed tool")]
    Get {
        #[arg(help = "Tool name (cargo-hack, cross)")]
        tool: String,
        #[arg(long, help = "Toolchain to invoke the tool with")]
        toolchain: Option<String>,
    },
    #[command(about = "Install a tool, restoring it from the cache when possible")]
    Install {
        #[arg(help = "Tool name (cargo-hack, cross)")]
        tool: String,
        #[command(flatten)]
        options: InstallArgs,
    },
    #[command(about = "Use an installed tool, installing it first if missing")]
    GetOrInstall {
        #[arg(help = "Tool name (cargo-hack, cross)")]
        tool: String,
        #[command(flatten)]
        options: InstallArgs,
    },
    #[command(about = "Run a tool, installing it first if missing")]
    Run {
        #[arg(help = "Tool name (cargo-hack, cross)")]
        tool: String,
        #[command(flatten)]
        options: InstallArgs,
        #[arg(last = true, help = "Arguments passed to the tool")]
        args: Vec<String>,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct InstallArgs {
    #[arg(long, help = "Toolchain to invoke the tool with")]
    pub toolchain: Option<String>,
    #[arg(long = "version", help = "Version to install, or `latest`")]
    pub tool_version: Option<String>,
    #[arg(long, help = "Primary cache key, or `no-cache` to disable caching")]
    pub primary_key: Option<String>,
    #[arg(long = "restore-key", help = "Fallback cache key, may be repeated")]
    pub restore_keys: Vec<String>,
}

impl From<InstallArgs> for InstallOptions {
    fn from(args: InstallArgs) -> Self {
        Self {
            toolchain: args.toolchain,
            version: args.tool_version,
            primary_key: args.primary_key,
            restore_keys: args.restore_keys,
        }
    }
}

impl Cli {
    /// Library configuration from the global flags.
    pub fn config(&self) -> Config {
        Config {
            cache_dir: self.cache_dir.clone(),
            registry_url: self.registry.clone(),
            namespace: self.namespace.clone(),
            search_path: None,
        }
    }
}

impl From<Commands> for Command {
    fn from(cmd: Commands) -> Self {
        match cmd {
            Commands::Get { tool, toolchain } => Self::Get { tool, toolchain },
            Commands::Install { tool, options } => Self::Install {
                tool,
                options: options.into(),
            },
            Commands::GetOrInstall { tool, options } => Self::GetOrInstall {
                tool,
                options: options.into(),
            },
            Commands::Run {
                tool,
                options,
                args,
            } => Self::Run {
                tool,
                options: options.into(),
                args,
            },
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}
