//! Message types for the monitor service
//!
//! # Communication Pattern
//!
//! - Callers send `MonitorCommand` to the service thread (non-blocking)
//! - The coordinator publishes `MonitorEvent` to every subscriber
//!
//! Nothing outside the service thread touches the selection or the pending
//! restore; queries go through `MonitorCommand::Status`.

use crate::coordinator::MonitorState;
use crate::device::{DeviceRecord, StableId};
use crossbeam::channel::Sender;
use std::time::Duration;

/// Commands sent TO the monitor service thread
#[derive(Debug, Clone)]
pub enum MonitorCommand {
    /// Select the device to monitor (persisted)
    Select(StableId),

    /// Change the auto-restore delay (persisted, applies to new timers)
    SetDelay(Duration),

    /// Enumerate immediately instead of waiting for the next poll
    Refresh,

    /// Request a status snapshot
    Status { reply: Sender<StatusReport> },

    /// Register an additional event subscriber
    Subscribe(Sender<MonitorEvent>),

    /// Stop the service thread
    Shutdown,
}

/// Events published FROM the coordinator to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    // ─────────────────────────────────────────────────────────────────
    // Device list
    // ─────────────────────────────────────────────────────────────────
    /// The attached device list changed
    DevicesChanged(Vec<DeviceRecord>),

    /// A device appeared (any device, not only the selected one)
    DeviceConnected(DeviceRecord),

    /// A device disappeared
    DeviceDisconnected(DeviceRecord),

    // ─────────────────────────────────────────────────────────────────
    // Monitoring
    // ─────────────────────────────────────────────────────────────────
    /// Selected device changed (by user or restored from settings)
    SelectionChanged(StableId),

    /// Coordinator state transition
    StateChanged(MonitorState),

    /// Human-readable status line
    Status(String),
}

/// Point-in-time view of the coordinator
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub state: MonitorState,
    pub selected: Option<StableId>,
    pub devices: Vec<DeviceRecord>,
    /// Time left before the display is turned back on, if a restore is pending
    pub pending_restore: Option<Duration>,
    pub screen_off_delay: Duration,
}
