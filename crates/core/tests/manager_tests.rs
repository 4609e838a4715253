//! `ToolManager` get / install / get-or-install for the built-in tools.

#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod support;

use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use support::{CacheBehavior, CountingResolver, FakeCargo, RecordingCache, Sandbox, write_script};
use toolcache_core::{
    Error, ExecOptions, InstallOptions, Lookup, ToolDefinition, ToolManager, ToolRegistry,
};

// Scripts are written and then executed; a concurrent fork holding a
// just-written script open would make exec fail with ETXTBSY.
static SERIAL: Mutex<()> = Mutex::const_new(());

struct Fixture {
    _serial: MutexGuard<'static, ()>,
    sandbox: Sandbox,
    resolver: Arc<CountingResolver>,
    cache: Arc<RecordingCache>,
    cargo: Arc<FakeCargo>,
}

impl Fixture {
    async fn new() -> Self {
        let serial = SERIAL.lock().await;
        let sandbox = Sandbox::new();
        let cargo = FakeCargo::new(&sandbox.cargo(), 0);
        Self {
            _serial: serial,
            resolver: CountingResolver::new("0.2.5"),
            cache: RecordingCache::new(CacheBehavior::Empty),
            cargo,
            sandbox,
        }
    }

    fn manager(&self, definition: ToolDefinition) -> ToolManager {
        let context = self.sandbox.context(
            self.resolver.clone(),
            self.cache.clone(),
            self.cargo.clone(),
        );
        ToolManager::new(definition, context)
    }
}

#[tokio::test]
async fn test_get_missing_tool_is_not_installed() {
    let fx = Fixture::new().await;
    let err = fx.manager(ToolDefinition::cross()).get(None).unwrap_err();
    match err {
        Error::NotInstalled { tool, hint } => {
            assert_eq!(tool, "cross");
            assert!(hint.unwrap().contains("install cross"));
        }
        other => panic!("Expected NotInstalled, got {other:?}"),
    }
}

#[tokio::test]
async fn test_install_then_get_runs_version() {
    let fx = Fixture::new().await;
    let cross = fx.manager(ToolDefinition::cross());

    let installed = cross
        .install(&InstallOptions::new().with_version("0.2.5"))
        .await
        .unwrap();
    assert_eq!(installed.path(), fx.sandbox.tool("cross"));

    let handle = cross.get(None).unwrap();
    assert_eq!(handle.path(), fx.sandbox.tool("cross"));
    let code = handle.call(["--version"], &ExecOptions::new()).await.unwrap();
    assert_eq!(code, 0);
}

#[tokio::test]
async fn test_handle_passes_toolchain_first() {
    let fx = Fixture::new().await;
    write_script(&fx.sandbox.tool("cross"), "echo \"$@\"");

    let handle = fx
        .manager(ToolDefinition::cross())
        .get(Some("nightly"))
        .unwrap();
    assert_eq!(handle.toolchain_arg(), "+nightly");

    let out = handle
        .output(["build", "--release"], &ExecOptions::new().captured())
        .await
        .unwrap();
    assert_eq!(out.stdout.trim(), "+nightly build --release");
}

#[tokio::test]
async fn test_cargo_hack_runs_as_cargo_subcommand() {
    let fx = Fixture::new().await;
    write_script(&fx.sandbox.tool("cargo-hack"), "exit 0");
    write_script(&fx.sandbox.cargo(), "echo \"$@\"");

    let handle = fx
        .manager(ToolDefinition::cargo_hack())
        .get(Some("1.83.0"))
        .unwrap();
    assert_eq!(handle.path(), fx.sandbox.cargo());
    assert_eq!(handle.tool_path(), fx.sandbox.tool("cargo-hack"));
    assert_eq!(handle.subcommand(), Some("hack"));

    let out = handle
        .output(["check", "--each-feature"], &ExecOptions::new().captured())
        .await
        .unwrap();
    assert_eq!(out.stdout.trim(), "+1.83.0 hack check --each-feature");
}

#[tokio::test]
async fn test_get_or_install_present_tool_does_nothing() {
    let fx = Fixture::new().await;
    write_script(&fx.sandbox.tool("cross"), "exit 0");

    let handle = fx
        .manager(ToolDefinition::cross())
        .get_or_install(&InstallOptions::new())
        .await
        .unwrap();

    assert_eq!(handle.path(), fx.sandbox.tool("cross"));
    assert_eq!(fx.cargo.install_count(), 0);
    assert_eq!(fx.resolver.calls(), 0);
    assert_eq!(fx.cache.restore_count(), 0);
}

#[tokio::test]
async fn test_get_or_install_absent_tool_installs_and_saves() {
    let fx = Fixture::new().await;
    let cross = fx.manager(ToolDefinition::cross());
    assert_eq!(
        cross.locate(),
        Lookup::NotFound {
            name: "cross".into()
        }
    );

    let handle = cross
        .get_or_install(&InstallOptions::new().with_toolchain("stable"))
        .await
        .unwrap();

    assert_eq!(handle.toolchain_arg(), "+stable");
    assert_eq!(fx.cargo.install_count(), 1);
    assert_eq!(fx.cache.save_count(), 1);
    assert!(cross.locate().found().is_some());
}

#[tokio::test]
async fn test_get_or_install_without_cache() {
    let fx = Fixture::new().await;
    fx.manager(ToolDefinition::cargo_hack())
        .get_or_install(&InstallOptions::new().without_cache())
        .await
        .unwrap();

    assert_eq!(fx.cargo.install_count(), 1);
    assert_eq!(fx.cache.restore_count(), 0);
    assert_eq!(fx.cache.save_count(), 0);
}

#[tokio::test]
async fn test_install_without_cargo_is_not_installed() {
    let sandbox = Sandbox::without_cargo();
    let cargo = FakeCargo::new(&sandbox.cargo(), 0);
    let resolver = CountingResolver::new("0.2.5");
    let context = sandbox.context(
        resolver.clone(),
        RecordingCache::new(CacheBehavior::Empty),
        cargo.clone(),
    );

    let err = ToolManager::cross(context)
        .get_or_install(&InstallOptions::new())
        .await
        .unwrap_err();

    assert!(err.is_not_installed());
    assert_eq!(resolver.calls(), 0);
    assert_eq!(cargo.install_count(), 0);
}

#[tokio::test]
async fn test_registry_definitions_drive_managers() {
    let fx = Fixture::new().await;
    let registry = ToolRegistry::with_builtin_tools();

    for definition in registry.iter() {
        let handle = fx
            .manager(definition.clone())
            .install(&InstallOptions::new().with_version("1.0.0"))
            .await
            .unwrap();
        assert!(handle.path().exists());
    }

    assert_eq!(fx.cargo.install_count(), 2);
    assert_eq!(
        fx.cache.saved_keys(),
        vec![
            "cargo-hack-1.0.0-toolcache-cargo-hack",
            "cross-1.0.0-toolcache-cross",
        ]
    );
}
