//! Settings persistence for monswitch
//!
//! - Generic YAML config loading/saving
//! - Default settings location
//! - The persisted settings schema (selected device, delay, display commands)
//!
//! # Usage
//!
//! ```ignore
//! use monswitch_core::config::{default_settings_path, load_settings, save_settings};
//!
//! let path = default_settings_path();
//! let mut settings = load_settings(&path);
//! settings.selected_device = Some("0951:1666".parse()?);
//! save_settings(&settings, &path)?;
//! ```

mod io;
mod paths;
mod settings;

pub use io::{load_config, save_config};
pub use paths::{default_config_dir, default_settings_path};
pub use settings::{
    load_settings, save_settings, DisplayCommands, Settings, MAX_SCREEN_OFF_DELAY_SECS,
    MIN_SCREEN_OFF_DELAY_SECS,
};
