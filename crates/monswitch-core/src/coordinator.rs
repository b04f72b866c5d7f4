//! Monitoring coordinator
//!
//! Owns the selected device, the reconciler and the pending auto-restore, and
//! drives the display from connect/disconnect events:
//!
//! ```text
//!            select (attached)            disconnect(selected)
//!   Idle ─────────────────────► Armed ───────────────────────► Dimmed
//!    │                            ▲ ▲                             │
//!    │ select (not attached)      │ └──── reconnect (cancel) ─────┤
//!    ▼                            │                               │
//!  Waiting ── connect(selected) ──┘  ◄──── restore timer fires ───┘
//! ```
//!
//! Time-dependent methods take `now` explicitly; the service thread passes
//! `Instant::now()` and tests pass synthetic instants.

use crate::device::{DeviceRecord, StableId};
use crate::display::DisplayController;
use crate::messages::{MonitorEvent, StatusReport};
use crate::reconciler::{DeviceEvent, Reconciler};
use crate::timer::PendingRestore;
use crossbeam::channel::{Receiver, Sender};
use std::time::{Duration, Instant};

/// Monitoring state of the selected device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitorState {
    /// No device selected
    Idle,
    /// Device selected but not attached; display untouched
    Waiting,
    /// Device selected and attached, display on
    Armed,
    /// Device selected and gone, display off, restore pending
    Dimmed,
}

impl std::fmt::Display for MonitorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MonitorState::Idle => "idle",
            MonitorState::Waiting => "waiting",
            MonitorState::Armed => "armed",
            MonitorState::Dimmed => "dimmed",
        };
        f.write_str(name)
    }
}

/// Single owner of selection state and the auto-restore timer
pub struct Coordinator<D: DisplayController> {
    display: D,
    reconciler: Reconciler,
    /// Devices from the last snapshot
    devices: Vec<DeviceRecord>,
    selected: Option<StableId>,
    /// Selection loaded from settings, resolved against the next snapshot
    saved_selection: Option<StableId>,
    state: MonitorState,
    pending: Option<PendingRestore>,
    next_restore_id: u64,
    screen_off_delay: Duration,
    subscribers: Vec<Sender<MonitorEvent>>,
}

impl<D: DisplayController> Coordinator<D> {
    /// Create an idle coordinator
    ///
    /// `saved_selection` is not applied until a snapshot containing that
    /// device has been seen.
    pub fn new(display: D, screen_off_delay: Duration, saved_selection: Option<StableId>) -> Self {
        Self {
            display,
            reconciler: Reconciler::new(),
            devices: Vec::new(),
            selected: None,
            saved_selection,
            state: MonitorState::Idle,
            pending: None,
            next_restore_id: 1,
            screen_off_delay,
            subscribers: Vec::new(),
        }
    }

    /// Subscribe to coordinator events
    pub fn subscribe(&mut self) -> Receiver<MonitorEvent> {
        let (tx, rx) = crossbeam::channel::unbounded();
        self.add_subscriber(tx);
        rx
    }

    /// Register an existing channel as subscriber
    pub fn add_subscriber(&mut self, tx: Sender<MonitorEvent>) {
        self.subscribers.push(tx);
    }

    // ─────────────────────────────────────────────────────────────────
    // Inputs
    // ─────────────────────────────────────────────────────────────────

    /// Feed one enumeration snapshot
    pub fn apply_snapshot(&mut self, snapshot: &[DeviceRecord], now: Instant) {
        let events = self.reconciler.reconcile(snapshot);

        if self.devices.as_slice() != snapshot {
            self.devices = snapshot.to_vec();
            self.publish(MonitorEvent::DevicesChanged(self.devices.clone()));
        }

        self.resolve_saved_selection();

        for event in events {
            self.handle_event(event, now);
        }
    }

    /// User picked a device to monitor
    ///
    /// Any restore pending for the previous selection is cancelled before
    /// the new device's connectivity is looked at. Leaving `Dimmed` this way
    /// always ends with the display on, since no restore is left to do it.
    pub fn select_device(&mut self, id: StableId) -> MonitorState {
        let was_dimmed = self.state == MonitorState::Dimmed;
        self.cancel_pending("selection changed");
        self.saved_selection = None;
        self.selected = Some(id);
        self.publish(MonitorEvent::SelectionChanged(id));

        match self.find_device(id).map(|d| d.display_name()) {
            Some(name) => {
                self.status(format!("Selected device: {}", name));
                self.arm();
            }
            None => {
                if was_dimmed {
                    self.display.turn_on();
                }
                log::info!("coordinator: {} selected but not attached", id);
                self.status(format!("Selected device: {} (not connected)", id));
                self.set_state(MonitorState::Waiting);
            }
        }

        self.state
    }

    /// React to one reconciler event
    pub fn handle_event(&mut self, event: DeviceEvent, now: Instant) {
        let is_selected = self.selected == Some(event.stable_id());

        match event {
            DeviceEvent::Connected(device) => {
                self.status(format!("Device connected: {}", device.display_name()));
                self.publish(MonitorEvent::DeviceConnected(device));

                if !is_selected {
                    return;
                }

                match self.state {
                    MonitorState::Armed => {
                        log::debug!("coordinator: selected device already armed, ignoring connect");
                    }
                    MonitorState::Dimmed => {
                        self.cancel_pending("device reconnected");
                        self.arm();
                    }
                    MonitorState::Waiting | MonitorState::Idle => self.arm(),
                }
            }
            DeviceEvent::Disconnected(device) => {
                self.status(format!("Device disconnected: {}", device.display_name()));
                self.publish(MonitorEvent::DeviceDisconnected(device));

                if is_selected && self.state == MonitorState::Armed {
                    self.dim(now);
                }
            }
        }
    }

    /// Fire the pending restore if it is due
    ///
    /// Returns true if the display was turned back on.
    pub fn fire_due(&mut self, now: Instant) -> bool {
        let restore = match self.pending.take() {
            Some(restore) if restore.is_due(now) => restore,
            other => {
                self.pending = other;
                return false;
            }
        };

        if !restore.token.try_fire() {
            log::debug!("coordinator: restore #{} was cancelled, not firing", restore.id);
            return false;
        }

        log::info!("coordinator: restore #{} fired", restore.id);
        self.display.turn_on();
        self.set_state(MonitorState::Armed);
        self.status(format!(
            "Display auto turned on after {}s",
            restore.delay.as_secs()
        ));
        true
    }

    /// Change the delay used by restores scheduled from now on
    pub fn set_screen_off_delay(&mut self, delay: Duration) {
        log::info!("coordinator: screen off delay set to {:?}", delay);
        self.screen_off_delay = delay;
    }

    // ─────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn selected(&self) -> Option<StableId> {
        self.selected
    }

    pub fn devices(&self) -> &[DeviceRecord] {
        &self.devices
    }

    /// True while the selected device is attached and being watched
    pub fn is_monitoring(&self) -> bool {
        self.state == MonitorState::Armed
    }

    pub fn pending_restore(&self) -> Option<&PendingRestore> {
        self.pending.as_ref()
    }

    pub fn has_pending_restore(&self) -> bool {
        self.pending.is_some()
    }

    /// Deadline the service loop should wake up at
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    pub fn screen_off_delay(&self) -> Duration {
        self.screen_off_delay
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn status_report(&self, now: Instant) -> StatusReport {
        StatusReport {
            state: self.state,
            selected: self.selected,
            devices: self.devices.clone(),
            pending_restore: self.pending.as_ref().map(|p| p.remaining(now)),
            screen_off_delay: self.screen_off_delay,
        }
    }

    // ─────────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────────

    fn resolve_saved_selection(&mut self) {
        let Some(saved) = self.saved_selection else {
            return;
        };
        if self.selected.is_some() {
            self.saved_selection = None;
            return;
        }

        // First match wins when several identical devices are attached
        if let Some(name) = self.find_device(saved).map(|d| d.display_name()) {
            log::info!("coordinator: restored saved selection {} ({})", saved, name);
            self.select_device(saved);
            self.status(format!("Restored saved device: {}", name));
        }
    }

    fn arm(&mut self) {
        self.cancel_pending("monitoring started");
        self.set_state(MonitorState::Armed);
        self.display.turn_on();
        self.status("Monitoring started".to_string());
    }

    fn dim(&mut self, now: Instant) {
        self.display.turn_off();

        // Starting a restore replaces any earlier one
        self.cancel_pending("restore re-armed");
        let restore = PendingRestore::schedule(self.next_restore_id, now, self.screen_off_delay);
        self.next_restore_id += 1;
        log::info!(
            "coordinator: display off, restore #{} in {:?}",
            restore.id,
            restore.delay
        );
        self.pending = Some(restore);

        self.set_state(MonitorState::Dimmed);
        self.status(format!(
            "Display turned off - will auto turn on in {}s",
            self.screen_off_delay.as_secs()
        ));
    }

    /// Cancel and drop the pending restore, if any
    fn cancel_pending(&mut self, reason: &str) -> bool {
        match self.pending.take() {
            Some(restore) => {
                let cancelled = restore.token.cancel();
                log::debug!(
                    "coordinator: cancel restore #{} ({}): {}",
                    restore.id,
                    reason,
                    if cancelled { "cancelled" } else { "already settled" }
                );
                cancelled
            }
            None => false,
        }
    }

    fn set_state(&mut self, state: MonitorState) {
        if self.state != state {
            log::debug!("coordinator: {} -> {}", self.state, state);
            self.state = state;
            self.publish(MonitorEvent::StateChanged(state));
        }
    }

    fn find_device(&self, id: StableId) -> Option<&DeviceRecord> {
        self.devices.iter().find(|d| d.stable_id() == id)
    }

    fn status(&mut self, message: String) {
        log::info!("{}", message);
        self.publish(MonitorEvent::Status(message));
    }

    fn publish(&mut self, event: MonitorEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        On,
        Off,
    }

    #[derive(Debug, Default)]
    struct RecordingDisplay {
        calls: Vec<Call>,
    }

    impl RecordingDisplay {
        fn ons(&self) -> usize {
            self.calls.iter().filter(|c| **c == Call::On).count()
        }

        fn offs(&self) -> usize {
            self.calls.iter().filter(|c| **c == Call::Off).count()
        }
    }

    impl DisplayController for RecordingDisplay {
        fn turn_on(&mut self) {
            self.calls.push(Call::On);
        }

        fn turn_off(&mut self) {
            self.calls.push(Call::Off);
        }
    }

    const KINGSTON: StableId = StableId {
        vendor_id: 0x0951,
        product_id: 0x1666,
    };
    const LOGITECH: StableId = StableId {
        vendor_id: 0x046d,
        product_id: 0xc52b,
    };

    fn kingston(port: &str) -> DeviceRecord {
        DeviceRecord::new(0x0951, 0x1666, port, "DataTraveler 3.0")
    }

    fn logitech(port: &str) -> DeviceRecord {
        DeviceRecord::new(0x046d, 0xc52b, port, "USB Receiver")
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn coordinator(delay: u64) -> Coordinator<RecordingDisplay> {
        Coordinator::new(RecordingDisplay::default(), secs(delay), None)
    }

    #[test]
    fn test_select_attached_device_arms() {
        let t0 = Instant::now();
        let mut c = coordinator(2);
        c.apply_snapshot(&[kingston("A")], t0);
        assert_eq!(c.state(), MonitorState::Idle);

        assert_eq!(c.select_device(KINGSTON), MonitorState::Armed);
        assert!(c.is_monitoring());
        assert_eq!(c.display().calls, vec![Call::On]);
    }

    #[test]
    fn test_select_missing_device_waits_then_arms() {
        let t0 = Instant::now();
        let mut c = coordinator(2);
        c.apply_snapshot(&[logitech("B")], t0);

        assert_eq!(c.select_device(KINGSTON), MonitorState::Waiting);
        assert!(c.display().calls.is_empty());

        c.apply_snapshot(&[logitech("B"), kingston("A")], t0 + secs(1));
        assert_eq!(c.state(), MonitorState::Armed);
        assert_eq!(c.display().calls, vec![Call::On]);
    }

    #[test]
    fn test_disconnect_turns_off_and_restores_once() {
        let t0 = Instant::now();
        let mut c = coordinator(2);
        c.apply_snapshot(&[kingston("A")], t0);
        c.select_device(KINGSTON);

        c.apply_snapshot(&[], t0);
        assert_eq!(c.state(), MonitorState::Dimmed);
        assert_eq!(c.display().calls, vec![Call::On, Call::Off]);
        assert_eq!(c.next_deadline(), Some(t0 + secs(2)));

        // Not yet
        assert!(!c.fire_due(t0 + Duration::from_millis(1999)));
        assert_eq!(c.display().ons(), 1);

        assert!(c.fire_due(t0 + secs(2)));
        assert_eq!(c.state(), MonitorState::Armed);
        assert_eq!(c.display().calls, vec![Call::On, Call::Off, Call::On]);
        assert!(!c.has_pending_restore());

        // Never twice
        assert!(!c.fire_due(t0 + secs(10)));
        assert_eq!(c.display().ons(), 2);
    }

    #[test]
    fn test_reconnect_before_deadline_cancels_restore() {
        let t0 = Instant::now();
        let mut c = coordinator(2);
        c.apply_snapshot(&[kingston("A")], t0);
        c.select_device(KINGSTON);

        c.apply_snapshot(&[], t0);
        let token = c.pending_restore().unwrap().token.clone();

        c.apply_snapshot(&[kingston("A")], t0 + secs(1));
        assert_eq!(c.state(), MonitorState::Armed);
        assert!(token.is_cancelled());
        assert!(!c.has_pending_restore());

        assert!(!c.fire_due(t0 + secs(5)));
        assert_eq!(c.display().ons(), 2);
        assert_eq!(c.display().offs(), 1);
    }

    #[test]
    fn test_rearm_keeps_single_live_timer() {
        let t0 = Instant::now();
        let mut c = coordinator(2);
        c.apply_snapshot(&[kingston("A")], t0);
        c.select_device(KINGSTON);

        c.apply_snapshot(&[], t0);
        let first = c.pending_restore().unwrap().clone();

        c.apply_snapshot(&[kingston("A")], t0 + Duration::from_millis(500));
        c.apply_snapshot(&[], t0 + secs(1));

        let second = c.pending_restore().unwrap().clone();
        assert_ne!(first.id, second.id);
        assert!(first.token.is_cancelled());
        assert!(second.token.is_pending());
        assert_eq!(second.deadline, t0 + secs(3));

        // The first deadline passes without effect
        assert!(!c.fire_due(t0 + secs(2)));
        assert_eq!(c.state(), MonitorState::Dimmed);

        assert!(c.fire_due(t0 + secs(3)));
        assert_eq!(c.display().ons(), 3);
        assert_eq!(c.display().offs(), 2);
    }

    #[test]
    fn test_unrelated_devices_never_touch_display() {
        let t0 = Instant::now();
        let mut c = coordinator(2);
        c.apply_snapshot(&[kingston("A")], t0);
        c.select_device(KINGSTON);
        let calls_after_select = c.display().calls.len();

        c.apply_snapshot(&[kingston("A"), logitech("B")], t0);
        c.apply_snapshot(&[kingston("A")], t0);
        c.apply_snapshot(&[kingston("A"), logitech("C")], t0);

        assert_eq!(c.display().calls.len(), calls_after_select);
        assert_eq!(c.state(), MonitorState::Armed);
    }

    #[test]
    fn test_port_change_keeps_selection() {
        let t0 = Instant::now();
        let mut c = coordinator(2);
        c.apply_snapshot(&[kingston("portA")], t0);
        c.select_device(KINGSTON);

        c.apply_snapshot(&[], t0);
        c.apply_snapshot(&[kingston("portB")], t0 + secs(1));

        assert_eq!(c.selected(), Some(KINGSTON));
        assert_eq!(c.state(), MonitorState::Armed);
    }

    #[test]
    fn test_scenario_kvm_switch() {
        let t0 = Instant::now();
        let mut c = coordinator(10);

        c.apply_snapshot(&[kingston("portA")], t0);
        c.select_device(KINGSTON);
        assert_eq!(c.display().ons(), 1);

        c.apply_snapshot(&[], t0 + secs(2));
        assert_eq!(c.display().offs(), 1);
        assert!(c.has_pending_restore());

        c.apply_snapshot(&[kingston("portC")], t0 + secs(4));
        assert!(!c.fire_due(t0 + secs(20)));

        assert_eq!(c.display().ons(), 2);
        assert_eq!(c.display().offs(), 1);
    }

    #[test]
    fn test_changing_selection_cancels_old_restore() {
        let t0 = Instant::now();
        let mut c = coordinator(2);
        c.apply_snapshot(&[kingston("A"), logitech("B")], t0);
        c.select_device(KINGSTON);

        c.apply_snapshot(&[logitech("B")], t0);
        let stale = c.pending_restore().unwrap().token.clone();

        assert_eq!(c.select_device(LOGITECH), MonitorState::Armed);
        assert!(stale.is_cancelled());
        assert!(!c.fire_due(t0 + secs(5)));

        // Old device coming back is now noise
        let calls = c.display().calls.len();
        c.apply_snapshot(&[logitech("B"), kingston("A")], t0 + secs(6));
        assert_eq!(c.display().calls.len(), calls);
    }

    #[test]
    fn test_changing_selection_to_missing_device() {
        let t0 = Instant::now();
        let mut c = coordinator(2);
        c.apply_snapshot(&[kingston("A")], t0);
        c.select_device(KINGSTON);
        c.apply_snapshot(&[], t0);

        assert_eq!(c.select_device(LOGITECH), MonitorState::Waiting);
        assert!(!c.has_pending_restore());
        assert!(!c.fire_due(t0 + secs(5)));
        // Display restored right away instead of by the cancelled timer
        assert_eq!(c.display().calls, vec![Call::On, Call::Off, Call::On]);
    }

    #[test]
    fn test_reselecting_while_dimmed_turns_display_on() {
        let t0 = Instant::now();
        let mut c = coordinator(2);
        c.apply_snapshot(&[kingston("A")], t0);
        c.select_device(KINGSTON);
        c.apply_snapshot(&[], t0);
        assert_eq!(c.state(), MonitorState::Dimmed);

        assert_eq!(c.select_device(KINGSTON), MonitorState::Waiting);
        assert!(!c.fire_due(t0 + secs(3600)));
        assert_eq!(c.display().ons(), 2);
        assert_eq!(c.display().offs(), 1);

        // Coming back re-arms normally
        c.apply_snapshot(&[kingston("C")], t0 + secs(5));
        assert_eq!(c.state(), MonitorState::Armed);
    }

    #[test]
    fn test_saved_selection_waits_for_snapshot() {
        let t0 = Instant::now();
        let mut c = Coordinator::new(RecordingDisplay::default(), secs(2), Some(KINGSTON));
        assert_eq!(c.selected(), None);

        c.apply_snapshot(&[logitech("B")], t0);
        assert_eq!(c.selected(), None);
        assert_eq!(c.state(), MonitorState::Idle);

        c.apply_snapshot(&[logitech("B"), kingston("A")], t0 + secs(2));
        assert_eq!(c.selected(), Some(KINGSTON));
        assert_eq!(c.state(), MonitorState::Armed);
        // Restoring and the connect event together turn the display on once
        assert_eq!(c.display().calls, vec![Call::On]);
    }

    #[test]
    fn test_saved_selection_dropped_after_manual_select() {
        let t0 = Instant::now();
        let mut c = Coordinator::new(RecordingDisplay::default(), secs(2), Some(KINGSTON));
        c.apply_snapshot(&[logitech("B")], t0);
        c.select_device(LOGITECH);

        c.apply_snapshot(&[logitech("B"), kingston("A")], t0 + secs(1));
        assert_eq!(c.selected(), Some(LOGITECH));
    }

    #[test]
    fn test_zero_delay_fires_immediately() {
        let t0 = Instant::now();
        let mut c = coordinator(0);
        c.apply_snapshot(&[kingston("A")], t0);
        c.select_device(KINGSTON);
        c.apply_snapshot(&[], t0);

        assert!(c.fire_due(t0));
        assert_eq!(c.state(), MonitorState::Armed);
    }

    #[test]
    fn test_delay_change_applies_to_next_restore() {
        let t0 = Instant::now();
        let mut c = coordinator(10);
        c.apply_snapshot(&[kingston("A")], t0);
        c.select_device(KINGSTON);

        c.set_screen_off_delay(secs(3));
        c.apply_snapshot(&[], t0);
        assert_eq!(c.next_deadline(), Some(t0 + secs(3)));
    }

    #[test]
    fn test_subscribers_see_transitions() {
        let t0 = Instant::now();
        let mut c = coordinator(2);
        let rx = c.subscribe();

        c.apply_snapshot(&[kingston("A")], t0);
        c.select_device(KINGSTON);
        c.apply_snapshot(&[], t0);

        let events: Vec<MonitorEvent> = rx.try_iter().collect();
        assert!(events.contains(&MonitorEvent::DeviceConnected(kingston("A"))));
        assert!(events.contains(&MonitorEvent::SelectionChanged(KINGSTON)));
        assert!(events.contains(&MonitorEvent::StateChanged(MonitorState::Armed)));
        assert!(events.contains(&MonitorEvent::StateChanged(MonitorState::Dimmed)));
        assert!(events.contains(&MonitorEvent::Status(
            "Display turned off - will auto turn on in 2s".to_string()
        )));

        let mut gone = kingston("A");
        gone.is_connected = false;
        assert!(events.contains(&MonitorEvent::DeviceDisconnected(gone)));
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let t0 = Instant::now();
        let mut c = coordinator(2);
        let rx = c.subscribe();
        drop(rx);

        c.apply_snapshot(&[kingston("A")], t0);
        assert!(c.subscribers.is_empty());
    }

    #[test]
    fn test_status_report() {
        let t0 = Instant::now();
        let mut c = coordinator(4);
        c.apply_snapshot(&[kingston("A")], t0);
        c.select_device(KINGSTON);
        c.apply_snapshot(&[], t0);

        let report = c.status_report(t0 + secs(1));
        assert_eq!(report.state, MonitorState::Dimmed);
        assert_eq!(report.selected, Some(KINGSTON));
        assert!(report.devices.is_empty());
        assert_eq!(report.pending_restore, Some(secs(3)));
        assert_eq!(report.screen_off_delay, secs(4));
    }
}
