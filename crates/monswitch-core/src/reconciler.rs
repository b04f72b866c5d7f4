//! Snapshot reconciliation
//!
//! Turns successive device snapshots into connect/disconnect events keyed by
//! [`StableId`]. A device that moves from one port to another inside a single
//! poll interval produces no events at all.
//!
//! Identical devices (same vendor/product) are indistinguishable: membership
//! is tracked per stable id, the first record seen for an id is the one that
//! is reported, and a disconnect is only emitted once the last device with
//! that id is gone.

use crate::device::{DeviceRecord, StableId};
use std::collections::{BTreeMap, HashSet};

/// Connect/disconnect event produced by [`Reconciler::reconcile`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A stable id appeared (record carries the current port)
    Connected(DeviceRecord),
    /// A stable id disappeared (record is the last known one, `is_connected = false`)
    Disconnected(DeviceRecord),
}

impl DeviceEvent {
    pub fn record(&self) -> &DeviceRecord {
        match self {
            DeviceEvent::Connected(record) | DeviceEvent::Disconnected(record) => record,
        }
    }

    pub fn stable_id(&self) -> StableId {
        self.record().stable_id()
    }
}

/// Retained state between two enumeration cycles
#[derive(Debug, Default)]
pub struct Reconciler {
    /// Last known record per stable id (first seen wins on collisions)
    last_known: BTreeMap<StableId, DeviceRecord>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff `snapshot` against the previous one and retain it
    ///
    /// Connect events come first in snapshot order, then disconnect events
    /// in stable id order. Must be called every cycle, even when nothing
    /// changed, so the retained state stays current.
    pub fn reconcile(&mut self, snapshot: &[DeviceRecord]) -> Vec<DeviceEvent> {
        let mut events = Vec::new();
        let mut current: BTreeMap<StableId, DeviceRecord> = BTreeMap::new();
        let mut seen: HashSet<StableId> = HashSet::with_capacity(snapshot.len());

        for device in snapshot {
            let id = device.stable_id();
            if !seen.insert(id) {
                log::debug!(
                    "reconciler: {} also attached at {}, tracking first instance only",
                    id,
                    device.port_location
                );
                continue;
            }

            let mut record = device.clone();
            record.is_connected = true;

            if !self.last_known.contains_key(&id) {
                events.push(DeviceEvent::Connected(record.clone()));
            }
            current.insert(id, record);
        }

        for (id, record) in &self.last_known {
            if !current.contains_key(id) {
                let mut gone = record.clone();
                gone.is_connected = false;
                events.push(DeviceEvent::Disconnected(gone));
            }
        }

        self.last_known = current;
        events
    }

    /// Records retained from the last snapshot, one per stable id
    pub fn known_devices(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.last_known.values()
    }

    pub fn is_present(&self, id: StableId) -> bool {
        self.last_known.contains_key(&id)
    }
}
