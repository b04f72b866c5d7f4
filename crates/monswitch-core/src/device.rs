//! USB device records and stable identity
//!
//! A physical attachment is identified by vendor, product and port. Only the
//! vendor/product pair survives a reconnection on another port (KVM switches,
//! hubs), so selection and monitoring always compare [`StableId`]s.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Error type for device identity parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("Invalid device id '{0}': expected vendor:product in hex")]
    InvalidStableId(String),
}

/// Vendor/product pair that identifies a device across port changes
///
/// Renders as `"vvvv:pppp"` (4-digit lower-case hex), which is also the
/// persisted form of the selected device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StableId {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl StableId {
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

impl FromStr for StableId {
    type Err = DeviceError;

    /// Parse `"vvvv:pppp"`
    ///
    /// The older raw form `"vvvv:pppp:location"` is accepted too; anything
    /// after the product segment is dropped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DeviceError::InvalidStableId(s.to_string());

        let mut parts = s.trim().split(':');
        let vendor = parts.next().filter(|p| !p.is_empty()).ok_or_else(invalid)?;
        let product = parts.next().filter(|p| !p.is_empty()).ok_or_else(invalid)?;

        let vendor_id = u16::from_str_radix(vendor, 16).map_err(|_| invalid())?;
        let product_id = u16::from_str_radix(product, 16).map_err(|_| invalid())?;

        Ok(Self::new(vendor_id, product_id))
    }
}

impl Serialize for StableId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StableId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One USB device as seen by a single enumeration pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    /// USB Vendor ID
    pub vendor_id: u16,
    /// USB Product ID
    pub product_id: u16,
    /// Port-dependent location (changes when the device moves ports)
    pub port_location: String,
    /// Product string from the USB descriptor (may be empty)
    pub name: String,
    /// True when discovered, false once the device has disappeared
    pub is_connected: bool,
}

impl DeviceRecord {
    /// Create a connected device record
    pub fn new(
        vendor_id: u16,
        product_id: u16,
        port_location: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            vendor_id,
            product_id,
            port_location: port_location.into(),
            name: name.into(),
            is_connected: true,
        }
    }

    pub fn stable_id(&self) -> StableId {
        StableId::new(self.vendor_id, self.product_id)
    }

    /// Port-dependent identifier: `"vvvv:pppp:location"`
    pub fn raw_id(&self) -> String {
        format!("{}:{}", self.stable_id(), self.port_location)
    }

    /// Name for display, synthesized when the descriptor had none
    pub fn display_name(&self) -> String {
        let name = self.name.trim();
        if name.is_empty() {
            format!("Unknown Device ({})", self.stable_id())
        } else {
            name.to_string()
        }
    }
}
