//! Configuration and fixture paths

use std::path::{Path, PathBuf};

/// Name used for the configuration directory
const APP_NAME: &str = "gear-fixtures";

/// Get the configuration directory path
///
/// Uses the directories crate for platform-appropriate locations:
/// - Linux: `~/.config/gear-fixtures/`
/// - macOS: `~/Library/Application Support/gear-fixtures/`
/// - Windows: `%APPDATA%\gear-fixtures\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Resolve a path found inside a fixture file relative to that file's directory
pub fn resolve_relative(base_file: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        base_file.parent().unwrap_or(Path::new(".")).join(path)
    } else {
        path.to_path_buf()
    }
}
