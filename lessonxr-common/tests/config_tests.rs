//! Unit tests for configuration loading and graceful degradation
//!
//! Covers:
//! - Missing TOML files never cause failure (defaults apply)
//! - Parse errors are reported as configuration errors
//! - CLI → ENV → TOML priority for path settings
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.

use lessonxr_common::config::{resolve_path, ConfigResolver, TomlConfig, CONFIG_ENV_VAR};
use lessonxr_common::Error;
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
fn test_missing_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("does-not-exist.toml");

    let config = TomlConfig::load_or_default(Some(&missing)).unwrap();
    assert!(config.content_root.is_none());
    assert_eq!(config.logging.level, "info");
    assert!(config.player.is_empty());
}

#[test]
fn test_no_path_uses_defaults() {
    let config = TomlConfig::load_or_default(None).unwrap();
    assert!(config.content_url.is_none());
    assert!(config.logging.file.is_none());
}

#[test]
fn test_full_file_parses() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("player.toml");
    std::fs::write(
        &path,
        r#"
content_root = "/srv/lessons"
session_cache_path = "/tmp/active.json"

[logging]
level = "debug"

[player]
render_fps = 30
max_asset_size = 2.0
"#,
    )
    .unwrap();

    let config = TomlConfig::load_or_default(Some(&path)).unwrap();
    assert_eq!(config.content_root, Some(PathBuf::from("/srv/lessons")));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(
        config.player.get("render_fps").and_then(|v| v.as_integer()),
        Some(30)
    );
}

#[test]
fn test_invalid_toml_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "content_root = [unterminated").unwrap();

    match TomlConfig::load_or_default(Some(&path)) {
        Err(Error::Config(msg)) => assert!(msg.contains("broken.toml")),
        other => panic!("Expected config error, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_resolver_prefers_cli_argument() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/lessonxr-env.toml");

    let resolver = ConfigResolver::new("player");
    let resolved = resolver.resolve(Some(Path::new("/tmp/lessonxr-cli.toml")));
    assert_eq!(resolved, Some(PathBuf::from("/tmp/lessonxr-cli.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_resolver_uses_env_var() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/lessonxr-env.toml");

    let resolver = ConfigResolver::new("player");
    assert_eq!(
        resolver.resolve(None),
        Some(PathBuf::from("/tmp/lessonxr-env.toml"))
    );

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_resolve_path_priority() {
    let var = "LESSONXR_TEST_CONTENT_ROOT";
    env::remove_var(var);

    // TOML only
    assert_eq!(
        resolve_path(None, var, Some(Path::new("/toml"))),
        Some(PathBuf::from("/toml"))
    );

    // ENV beats TOML
    env::set_var(var, "/env");
    assert_eq!(
        resolve_path(None, var, Some(Path::new("/toml"))),
        Some(PathBuf::from("/env"))
    );

    // CLI beats everything
    assert_eq!(
        resolve_path(Some(Path::new("/cli")), var, Some(Path::new("/toml"))),
        Some(PathBuf::from("/cli"))
    );

    env::remove_var(var);
    assert_eq!(resolve_path(None, var, None), None);
}
