//! Managed CI tools.
//!
//! A [`ToolDefinition`] says which crate provides a tool and how it is
//! invoked. A [`ToolManager`] combines one definition with a shared
//! [`ToolContext`] and hands out [`ToolHandle`]s:
//!
//! - `get` returns a handle for an already-installed tool
//! - `install` always runs the cached `cargo install` path
//! - `get_or_install` installs only when the tool is missing
//!
//! # Example
//!
//! ```ignore
//! use toolcache_core::{Config, InstallOptions, ToolContext, ToolManager};
//!
//! let context = ToolContext::from_config(&Config::default())?;
//! let hack = ToolManager::cargo_hack(context);
//! let handle = hack.get_or_install(&InstallOptions::new().with_toolchain("nightly")).await?;
//! handle.call(["check", "--each-feature"], &Default::default()).await?;
//! ```

mod context;
mod definition;
mod handle;
mod manager;
mod registry;

pub use context::{CARGO, ToolContext};
pub use definition::{Invocation, Lookup, ToolDefinition, ToolSpec, locate};
pub use handle::ToolHandle;
pub use manager::ToolManager;
pub use registry::ToolRegistry;
