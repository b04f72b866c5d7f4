//! Monswitch Core - USB-triggered display switching
//!
//! Watches the attached USB devices, and when the selected one disappears
//! (for example a keyboard moved to another machine by a KVM switch) turns
//! the display off, then back on after a delay unless the device returns.

pub mod config;
pub mod coordinator;
pub mod device;
pub mod display;
pub mod enumerator;
pub mod messages;
pub mod reconciler;
pub mod service;
pub mod timer;

pub use coordinator::{Coordinator, MonitorState};
pub use device::{DeviceError, DeviceRecord, StableId};
pub use display::{DisplayController, LogOnlyDisplay};
pub use enumerator::{DeviceEnumerator, EnumerationError};
pub use messages::{MonitorCommand, MonitorEvent, StatusReport};
pub use reconciler::{DeviceEvent, Reconciler};
pub use service::{MonitorHandle, MonitorService};
