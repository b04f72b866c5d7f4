//! USB enumeration backend built on `nusb`
//!
//! Each call lists the whole device table. Identity only uses vendor and
//! product id; the port location is kept for display and logging.

use monswitch_core::{DeviceEnumerator, DeviceRecord, EnumerationError};

/// Enumerates attached USB devices through the OS device table
#[derive(Debug, Default)]
pub struct UsbEnumerator;

impl UsbEnumerator {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceEnumerator for UsbEnumerator {
    fn snapshot(&mut self) -> Result<Vec<DeviceRecord>, EnumerationError> {
        let devices = nusb::list_devices().map_err(|e| EnumerationError::Backend(e.to_string()))?;

        let mut records: Vec<DeviceRecord> = devices
            .map(|info| {
                DeviceRecord::new(
                    info.vendor_id(),
                    info.product_id(),
                    port_location(&info),
                    device_name(info.product_string(), info.manufacturer_string()),
                )
            })
            .collect();

        sort_records(&mut records);
        log::trace!("usb: enumerated {} devices", records.len());
        Ok(records)
    }
}

/// Platform location of the device, stable while it stays on the same port
#[cfg(target_os = "macos")]
fn port_location(info: &nusb::DeviceInfo) -> String {
    info.location_id().to_string()
}

#[cfg(not(target_os = "macos"))]
fn port_location(info: &nusb::DeviceInfo) -> String {
    bus_address(info.bus_number(), info.device_address())
}

#[cfg_attr(target_os = "macos", allow(dead_code))]
fn bus_address(bus: u8, address: u8) -> String {
    format!("{:03}-{:03}", bus, address)
}

/// Product string, falling back to the manufacturer
///
/// An empty name is left to `DeviceRecord::display_name`.
fn device_name(product: Option<&str>, manufacturer: Option<&str>) -> String {
    fn usable(s: Option<&str>) -> Option<&str> {
        s.map(str::trim).filter(|s| !s.is_empty())
    }

    usable(product)
        .or_else(|| usable(manufacturer))
        .unwrap_or_default()
        .to_string()
}

/// Deterministic order so unchanged buses produce identical snapshots
fn sort_records(records: &mut [DeviceRecord]) {
    records.sort_by(|a, b| {
        (a.vendor_id, a.product_id, &a.port_location).cmp(&(b.vendor_id, b.product_id, &b.port_location))
    });
}
