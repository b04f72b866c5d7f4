//! Monitor service - background thread owning the coordinator
//!
//! All state transitions happen on this one thread: snapshots from the
//! enumerator, commands from the caller and the auto-restore deadline are
//! multiplexed with `crossbeam::select!`.
//!
//! ```text
//! Caller (CLI / UI)
//!     │
//!     │ MonitorCommand (channel)
//!     ▼
//! monitor-service thread
//!     ├── tick(poll_interval) → enumerator.snapshot() → coordinator.apply_snapshot()
//!     ├── at(restore deadline) → coordinator.fire_due()
//!     └── commands (select, delay, refresh, status)
//!            │
//!            │ MonitorEvent (channel per subscriber)
//!            ▼
//!        Subscribers
//! ```

use crate::config::{save_settings, Settings};
use crate::coordinator::Coordinator;
use crate::device::StableId;
use crate::display::DisplayController;
use crate::enumerator::DeviceEnumerator;
use crate::messages::{MonitorCommand, MonitorEvent, StatusReport};
use crossbeam::channel::{Receiver, Sender};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long `MonitorHandle::status` waits for the service thread
const STATUS_TIMEOUT: Duration = Duration::from_secs(1);

/// State owned by the service thread
pub struct MonitorService<E: DeviceEnumerator, D: DisplayController> {
    enumerator: E,
    coordinator: Coordinator<D>,
    command_rx: Receiver<MonitorCommand>,
    settings: Settings,
    /// Where selection/delay changes are persisted (None = don't persist)
    settings_path: Option<PathBuf>,
}

impl<E, D> MonitorService<E, D>
where
    E: DeviceEnumerator + 'static,
    D: DisplayController + 'static,
{
    /// Spawn the service thread
    ///
    /// The saved selection in `settings` is resolved against the first
    /// snapshot, not assumed valid.
    pub fn spawn(
        enumerator: E,
        display: D,
        settings: Settings,
        settings_path: Option<PathBuf>,
    ) -> std::io::Result<MonitorHandle> {
        let (command_tx, command_rx) = crossbeam::channel::unbounded();

        let mut coordinator = Coordinator::new(
            display,
            settings.screen_off_delay(),
            settings.selected_device,
        );
        // Subscribed before the thread starts so the first snapshot is not missed
        let events = coordinator.subscribe();

        let service = MonitorService {
            enumerator,
            coordinator,
            command_rx,
            settings,
            settings_path,
        };

        let thread_handle = thread::Builder::new()
            .name("monitor-service".into())
            .spawn(move || service.run())?;

        Ok(MonitorHandle {
            command_tx,
            events,
            thread_handle: Some(thread_handle),
        })
    }

    /// Main service loop
    fn run(mut self) {
        let poll_interval = self.settings.poll_interval();
        log::info!(
            "monitor: service started (poll every {:?}, restore after {:?})",
            poll_interval,
            self.coordinator.screen_off_delay()
        );

        self.poll();
        let ticker = crossbeam::channel::tick(poll_interval);

        loop {
            let restore_timer = match self.coordinator.next_deadline() {
                Some(deadline) => crossbeam::channel::at(deadline),
                None => crossbeam::channel::never(),
            };

            crossbeam::select! {
                recv(self.command_rx) -> cmd => match cmd {
                    Ok(MonitorCommand::Shutdown) => {
                        log::info!("monitor: shutting down");
                        break;
                    }
                    Ok(cmd) => self.handle_command(cmd),
                    Err(_) => {
                        log::info!("monitor: command channel closed, shutting down");
                        break;
                    }
                },
                recv(ticker) -> _ => self.poll(),
                recv(restore_timer) -> _ => {
                    self.coordinator.fire_due(Instant::now());
                }
            }
        }

        log::info!("monitor: service stopped");
    }

    /// Enumerate once and feed the coordinator
    ///
    /// A failed enumeration skips the cycle so it cannot be mistaken for
    /// every device disconnecting at once.
    fn poll(&mut self) {
        match self.enumerator.snapshot() {
            Ok(devices) => self.coordinator.apply_snapshot(&devices, Instant::now()),
            Err(e) => log::warn!("monitor: {}, skipping this cycle", e),
        }
    }

    fn handle_command(&mut self, cmd: MonitorCommand) {
        match cmd {
            MonitorCommand::Select(id) => {
                self.coordinator.select_device(id);
                self.settings.selected_device = Some(id);
                self.persist();
            }
            MonitorCommand::SetDelay(delay) => {
                // Whole seconds within the settings bounds, so what runs is what reloads
                self.settings.screen_off_delay_secs = delay.as_secs();
                let applied = self.settings.screen_off_delay();
                self.settings.screen_off_delay_secs = applied.as_secs();
                if applied != delay {
                    log::warn!("monitor: delay {:?} out of range, using {:?}", delay, applied);
                }
                self.coordinator.set_screen_off_delay(applied);
                self.persist();
            }
            MonitorCommand::Refresh => self.poll(),
            MonitorCommand::Status { reply } => {
                let _ = reply.send(self.coordinator.status_report(Instant::now()));
            }
            MonitorCommand::Subscribe(tx) => self.coordinator.add_subscriber(tx),
            MonitorCommand::Shutdown => {}
        }
    }

    fn persist(&self) {
        if let Some(path) = &self.settings_path {
            if let Err(e) = save_settings(&self.settings, path) {
                log::error!("monitor: failed to save settings: {:#}", e);
            }
        }
    }
}

/// Owned handle to a running monitor service
///
/// Dropping the handle stops the service thread and waits for it.
pub struct MonitorHandle {
    command_tx: Sender<MonitorCommand>,
    events: Receiver<MonitorEvent>,
    thread_handle: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Send a command to the service (non-blocking)
    pub fn send(&self, cmd: MonitorCommand) -> Result<(), crossbeam::channel::SendError<MonitorCommand>> {
        self.command_tx.send(cmd)
    }

    pub fn select(&self, id: StableId) {
        let _ = self.send(MonitorCommand::Select(id));
    }

    pub fn set_delay(&self, delay: Duration) {
        let _ = self.send(MonitorCommand::SetDelay(delay));
    }

    /// Enumerate now instead of at the next poll
    pub fn refresh(&self) {
        let _ = self.send(MonitorCommand::Refresh);
    }

    /// Ask the service for a status snapshot
    ///
    /// Returns None if the service is gone or does not answer in time.
    pub fn status(&self) -> Option<StatusReport> {
        let (reply, rx) = crossbeam::channel::bounded(1);
        self.send(MonitorCommand::Status { reply }).ok()?;
        rx.recv_timeout(STATUS_TIMEOUT).ok()
    }

    /// Events published since the service started
    pub fn events(&self) -> &Receiver<MonitorEvent> {
        &self.events
    }

    /// Additional subscription (receives events from now on)
    pub fn subscribe(&self) -> Receiver<MonitorEvent> {
        let (tx, rx) = crossbeam::channel::unbounded();
        let _ = self.send(MonitorCommand::Subscribe(tx));
        rx
    }

    /// Check if the service thread is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Stop the service and wait for the thread to exit
    pub fn shutdown(&mut self) {
        let _ = self.command_tx.send(MonitorCommand::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!("monitor: service thread panicked");
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
