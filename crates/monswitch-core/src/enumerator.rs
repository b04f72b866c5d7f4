//! Device enumeration contract
//!
//! The platform backend lives in `monswitch-usb`; the core only needs a
//! complete snapshot on demand. A failed enumeration is reported as an error
//! rather than an empty list so the monitor can skip the cycle instead of
//! reporting every device as gone.

use crate::device::DeviceRecord;

/// Error type for device enumeration
#[derive(Debug, thiserror::Error)]
pub enum EnumerationError {
    #[error("Failed to list USB devices: {0}")]
    Backend(String),

    #[error("USB enumeration is not supported on this platform")]
    Unsupported,
}

/// Source of complete device snapshots
///
/// Must be cheap enough to call every poll interval and must never return a
/// partial snapshot.
pub trait DeviceEnumerator: Send {
    /// List all currently attached devices
    fn snapshot(&mut self) -> Result<Vec<DeviceRecord>, EnumerationError>;

    /// Best-effort listing where a failure just means "no devices"
    fn snapshot_or_empty(&mut self) -> Vec<DeviceRecord> {
        match self.snapshot() {
            Ok(devices) => devices,
            Err(e) => {
                log::warn!("enumerator: {}, treating as no devices", e);
                Vec::new()
            }
        }
    }
}

impl<E: DeviceEnumerator + ?Sized> DeviceEnumerator for Box<E> {
    fn snapshot(&mut self) -> Result<Vec<DeviceRecord>, EnumerationError> {
        (**self).snapshot()
    }
}
