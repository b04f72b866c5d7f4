//! Persisted monswitch settings
//!
//! Stored as YAML. Default location: `{config_dir}/monswitch/settings.yaml`
//!
//! ```yaml
//! selected_device: "0951:1666"
//! screen_off_delay_secs: 10
//! poll_interval_ms: 2000
//! display:
//!   turn_on: ["caffeinate", "-u", "-t", "1"]
//!   turn_off: ["pmset", "displaysleepnow"]
//! ```

use super::io::{load_config, save_config};
use crate::device::StableId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Lower bound of the screen off delay
pub const MIN_SCREEN_OFF_DELAY_SECS: u64 = 1;
/// Upper bound of the screen off delay
pub const MAX_SCREEN_OFF_DELAY_SECS: u64 = 60;

const MIN_POLL_INTERVAL_MS: u64 = 100;
const MAX_POLL_INTERVAL_MS: u64 = 10_000;

/// Root settings structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Device to monitor, as `"vendor:product"`
    ///
    /// Older files may contain `"vendor:product:location"`; the location is
    /// dropped on load.
    pub selected_device: Option<StableId>,
    /// Seconds before the display is turned back on after a disconnect
    pub screen_off_delay_secs: u64,
    /// How often the USB device table is enumerated
    pub poll_interval_ms: u64,
    /// Commands used to switch the display
    pub display: DisplayCommands,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            selected_device: None,
            screen_off_delay_secs: 10,
            poll_interval_ms: 2000,
            display: DisplayCommands::default(),
        }
    }
}

impl Settings {
    /// Screen off delay clamped to the supported range
    pub fn screen_off_delay(&self) -> Duration {
        Duration::from_secs(
            self.screen_off_delay_secs
                .clamp(MIN_SCREEN_OFF_DELAY_SECS, MAX_SCREEN_OFF_DELAY_SECS),
        )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(
            self.poll_interval_ms
                .clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS),
        )
    }
}

/// External commands that switch the display on and off
///
/// Each entry is a program followed by its arguments. An empty list disables
/// that direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayCommands {
    pub turn_on: Vec<String>,
    pub turn_off: Vec<String>,
}

impl Default for DisplayCommands {
    #[cfg(target_os = "macos")]
    fn default() -> Self {
        Self {
            // -u declares user activity, which wakes a sleeping display
            turn_on: args(&["caffeinate", "-u", "-t", "1"]),
            turn_off: args(&["pmset", "displaysleepnow"]),
        }
    }

    #[cfg(not(target_os = "macos"))]
    fn default() -> Self {
        Self {
            turn_on: args(&["xset", "dpms", "force", "on"]),
            turn_off: args(&["xset", "dpms", "force", "off"]),
        }
    }
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Load settings, falling back to defaults on a missing or broken file
pub fn load_settings(path: &Path) -> Settings {
    let settings: Settings = load_config(path);

    if !(MIN_SCREEN_OFF_DELAY_SECS..=MAX_SCREEN_OFF_DELAY_SECS)
        .contains(&settings.screen_off_delay_secs)
    {
        log::warn!(
            "load_settings: screen_off_delay_secs {} out of range, using {:?}",
            settings.screen_off_delay_secs,
            settings.screen_off_delay()
        );
    }

    settings
}

/// Save settings, creating the config directory if needed
pub fn save_settings(settings: &Settings, path: &Path) -> anyhow::Result<()> {
    save_config(settings, path)?;
    log::info!(
        "save_settings: saved (device: {}, delay: {}s)",
        settings
            .selected_device
            .map(|id| id.to_string())
            .unwrap_or_else(|| "none".to_string()),
        settings.screen_off_delay_secs
    );
    Ok(())
}
