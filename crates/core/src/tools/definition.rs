//! Tool definitions and search-path lookup.

use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::PathBuf;
use tracing::debug;

/// How a tool's handle invokes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "name", rename_all = "lowercase")]
pub enum Invocation {
    /// Run the tool's own binary.
    Direct,
    /// Run `cargo <name>`; the tool is a cargo extension meant to be
    /// dispatched as a sub-command.
    Subcommand(String),
}

/// Configuration of one managed tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Name users refer to the tool by.
    pub name: String,
    /// Crate passed to `cargo install`.
    pub crate_name: String,
    /// Executable the crate installs.
    pub binary_name: String,
    /// How the installed tool is invoked.
    pub invocation: Invocation,
}

impl ToolDefinition {
    /// Define a directly-invoked tool whose crate and binary share its name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            crate_name: name.clone(),
            binary_name: name.clone(),
            name,
            invocation: Invocation::Direct,
        }
    }

    /// Set the crate to install.
    #[must_use]
    pub fn with_crate_name(mut self, crate_name: impl Into<String>) -> Self {
        self.crate_name = crate_name.into();
        self
    }

    /// Set the executable name.
    #[must_use]
    pub fn with_binary_name(mut self, binary_name: impl Into<String>) -> Self {
        self.binary_name = binary_name.into();
        self
    }

    /// Set the invocation mode.
    #[must_use]
    pub fn with_invocation(mut self, invocation: Invocation) -> Self {
        self.invocation = invocation;
        self
    }

    /// `cargo-hack`, dispatched as `cargo hack`.
    #[must_use]
    pub fn cargo_hack() -> Self {
        Self::new("cargo-hack").with_invocation(Invocation::Subcommand("hack".to_string()))
    }

    /// `cross`, the cross-compilation wrapper.
    #[must_use]
    pub fn cross() -> Self {
        Self::new("cross")
    }
}

/// A located executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    /// Executable name that was looked up.
    pub name: String,
    /// Resolved location.
    pub path: PathBuf,
}

/// Outcome of a search-path lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The executable exists.
    Found(ToolSpec),
    /// The executable is not on the search path.
    NotFound {
        /// Executable name that was looked up.
        name: String,
    },
}

impl Lookup {
    /// The located tool, if found.
    #[must_use]
    pub fn found(self) -> Option<ToolSpec> {
        match self {
            Self::Found(spec) => Some(spec),
            Self::NotFound { .. } => None,
        }
    }
}

/// Look `name` up on `search_path`, or on `PATH` when `None`.
#[must_use]
pub fn locate(name: &str, search_path: Option<&OsStr>) -> Lookup {
    let found = match search_path {
        Some(paths) => match std::env::current_dir() {
            Ok(cwd) => which::which_in(name, Some(paths), cwd).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        },
        None => which::which(name).map_err(|e| e.to_string()),
    };
    match found {
        Ok(path) => {
            debug!(%name, path = %path.display(), "Located executable");
            Lookup::Found(ToolSpec {
                name: name.to_string(),
                path,
            })
        }
        Err(e) => {
            debug!(%name, "Executable not found: {e}");
            Lookup::NotFound {
                name: name.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_definitions() {
        let hack = ToolDefinition::cargo_hack();
        assert_eq!(hack.crate_name, "cargo-hack");
        assert_eq!(hack.binary_name, "cargo-hack");
        assert_eq!(hack.invocation, Invocation::Subcommand("hack".into()));

        let cross = ToolDefinition::cross();
        assert_eq!(cross.crate_name, "cross");
        assert_eq!(cross.invocation, Invocation::Direct);
    }

    #[test]
    fn test_definition_serde() {
        let json = serde_json::to_value(ToolDefinition::cargo_hack()).unwrap();
        assert_eq!(json["invocation"]["type"], "subcommand");
        assert_eq!(json["invocation"]["name"], "hack");

        let back: ToolDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(back, ToolDefinition::cargo_hack());
    }

    #[test]
    fn test_locate_in_empty_search_path() {
        let dir = TempDir::new().unwrap();
        let lookup = locate("cross", Some(dir.path().as_os_str()));
        assert_eq!(
            lookup,
            Lookup::NotFound {
                name: "cross".into()
            }
        );
        assert!(lookup.found().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_locate_finds_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let bin = dir.path().join("cross");
        std::fs::write(&bin, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();

        let spec = locate("cross", Some(dir.path().as_os_str())).found().unwrap();
        assert_eq!(spec.name, "cross");
        assert_eq!(spec.path, bin);
    }

    #[cfg(unix)]
    #[test]
    fn test_locate_skips_non_executable() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("cross"), "not executable").unwrap();
        assert!(locate("cross", Some(dir.path().as_os_str())).found().is_none());
    }
}
