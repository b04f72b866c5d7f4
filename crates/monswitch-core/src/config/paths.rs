//! Standard locations for monswitch configuration files

use std::path::PathBuf;

/// Get the default configuration directory
///
/// Returns: `{config_dir}/monswitch` (e.g. `~/Library/Application Support/monswitch`
/// on macOS, `~/.config/monswitch` on Linux)
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("monswitch")
}

/// Get the default settings file path
///
/// Returns: `{config_dir}/monswitch/settings.yaml`
pub fn default_settings_path() -> PathBuf {
    default_config_dir().join("settings.yaml")
}
