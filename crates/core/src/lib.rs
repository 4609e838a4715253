//! Acquire, cache and invoke cargo-installed CI tools
//!
//! This crate provides the pieces behind `toolcache`:
//! - Latest-version lookup against the crates.io registry
//! - A keyed archive cache for installed binaries
//! - `cargo install` driven from a neutral working directory
//! - Handles that run a tool under a chosen toolchain
//!
//! # Overview
//!
//! An install resolves the version, tries to restore the binary from the
//! cache, builds it with `cargo install` on a miss and saves the result.
//! Cache problems never fail an install unless the request itself is
//! invalid; `no-cache` as the primary key skips the cache entirely.

pub mod cache;
pub mod config;
mod error;
pub mod exec;
pub mod installer;
pub mod resolver;
pub mod toolchain;
pub mod tools;
pub mod workdir;

// Re-export error types at crate root
pub use error::{Error, Result};

// Re-export main types
pub use cache::{CacheError, CacheKeys, CacheStore, LocalCacheStore, NO_CACHE};
pub use config::{Config, InstallOptions};
pub use exec::{CommandRunner, ExecOptions, ExecOutput, ProcessRunner, StdioMode};
pub use installer::{InstallRequest, LATEST, ToolInstaller};
pub use resolver::{CratesIoResolver, VersionResolver};
pub use toolchain::toolchain_arg;
pub use tools::{
    Invocation, Lookup, ToolContext, ToolDefinition, ToolHandle, ToolManager, ToolRegistry,
    ToolSpec,
};
pub use workdir::WorkdirGuard;
