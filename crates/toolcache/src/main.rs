//! `toolcache`: install, cache and run cargo-installed CI tools.

mod cli;
mod commands;
mod tracing;

use crate::commands::Command;
use crate::tracing::{Level, TracingConfig};

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = cli::parse();

    crate::tracing::init_tracing(TracingConfig {
        format: cli.format.clone(),
        level: Level::from(cli.level.clone()),
    })?;

    let config = cli.config();
    let command: Command = cli.command.into();
    let code = commands::execute(command, &config).await?;

    // `run` forwards the tool's own exit code.
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
