//! Display power capability
//!
//! The coordinator only needs two fire-and-forget primitives. Implementations
//! log their own failures; calling `turn_on` on a display that is already on
//! (or `turn_off` on one that is off) must be harmless.

/// Display power control used by the monitoring coordinator
pub trait DisplayController: Send {
    /// Wake the display
    fn turn_on(&mut self);

    /// Put the display to sleep
    fn turn_off(&mut self);
}

impl<D: DisplayController + ?Sized> DisplayController for Box<D> {
    fn turn_on(&mut self) {
        (**self).turn_on()
    }

    fn turn_off(&mut self) {
        (**self).turn_off()
    }
}

/// Display controller that only logs (dry runs, unsupported platforms)
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlyDisplay;

impl DisplayController for LogOnlyDisplay {
    fn turn_on(&mut self) {
        log::info!("display: turn_on (log only)");
    }

    fn turn_off(&mut self) {
        log::info!("display: turn_off (log only)");
    }
}
