//! Capacity-capped store of per-device aggregates

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::DeviceStore;
use crate::error::{Error, Result};

/// Running totals for one device.
///
/// Both fields are independently synchronized, so concurrent batches for the
/// same device may update it in parallel without losing increments.
#[derive(Debug)]
pub struct DeviceAggregate {
    device_id: Uuid,
    total_count: AtomicU64,
    latest_timestamp: Mutex<Option<DateTime<Utc>>>,
}

impl DeviceAggregate {
    pub fn new(device_id: Uuid) -> Self {
        Self {
            device_id,
            total_count: AtomicU64::new(0),
            latest_timestamp: Mutex::new(None),
        }
    }

    pub fn device_id(&self) -> Uuid {
        self.device_id
    }

    /// Atomically add `delta`, saturating at `u64::MAX`
    pub fn increment_count(&self, delta: u64) {
        let _ = self
            .total_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_add(delta))
            });
    }

    /// Move the latest timestamp forward to `candidate` if it is newer.
    /// Returns whether the timestamp changed.
    pub fn advance_timestamp(&self, candidate: DateTime<Utc>) -> bool {
        let mut latest = self.latest_timestamp.lock();
        match *latest {
            Some(current) if candidate <= current => false,
            _ => {
                *latest = Some(candidate);
                true
            }
        }
    }

    pub fn total_count(&self) -> u64 {
        self.total_count.load(Ordering::Acquire)
    }

    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        *self.latest_timestamp.lock()
    }

    /// Copy of the current values; the two fields are read one after the other
    pub fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            device_id: self.device_id,
            total_count: self.total_count(),
            latest_timestamp: self.latest_timestamp(),
        }
    }
}

/// Read-only view of a device aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceSnapshot {
    pub device_id: Uuid,
    pub total_count: u64,
    pub latest_timestamp: Option<DateTime<Utc>>,
}

/// In-memory device store with a hard cap on distinct devices.
///
/// Lookups of known devices go straight to the map. Registration of a new
/// device is serialized by `admission`, which makes the capacity check and
/// the insert one step: the map is never observed above capacity and a
/// rejected device leaves no entry behind.
pub struct InMemoryDeviceStore {
    devices: DashMap<Uuid, Arc<DeviceAggregate>>,
    admission: Mutex<()>,
    capacity: usize,
}

impl InMemoryDeviceStore {
    /// A capacity of zero is treated as one
    pub fn new(capacity: usize) -> Self {
        Self {
            devices: DashMap::new(),
            admission: Mutex::new(()),
            capacity: capacity.max(1),
        }
    }

    fn existing(&self, device_id: &Uuid) -> Option<Arc<DeviceAggregate>> {
        self.devices.get(device_id).map(|entry| entry.value().clone())
    }
}

impl DeviceStore for InMemoryDeviceStore {
    fn get_or_create(&self, device_id: Uuid) -> Result<Arc<DeviceAggregate>> {
        if let Some(aggregate) = self.existing(&device_id) {
            return Ok(aggregate);
        }

        let _admission = self.admission.lock();

        // another writer may have registered it while we waited
        if let Some(aggregate) = self.existing(&device_id) {
            return Ok(aggregate);
        }

        if self.devices.len() >= self.capacity {
            warn!(
                device_id = %device_id,
                capacity = self.capacity,
                "Device store full, rejecting new device"
            );
            return Err(Error::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        let aggregate = Arc::new(DeviceAggregate::new(device_id));
        self.devices.insert(device_id, aggregate.clone());
        debug!(device_id = %device_id, tracked = self.devices.len(), "Registered device");

        Ok(aggregate)
    }

    fn get(&self, device_id: Uuid) -> Option<DeviceSnapshot> {
        self.devices.get(&device_id).map(|entry| entry.value().snapshot())
    }

    fn clear(&self) {
        let _admission = self.admission.lock();
        self.devices.clear();
    }

    fn len(&self) -> usize {
        self.devices.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

impl std::fmt::Debug for InMemoryDeviceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDeviceStore")
            .field("len", &self.devices.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_728_612_703 + secs, 0).unwrap()
    }

    #[test]
    fn test_new_aggregate_is_zeroed() {
        let aggregate = DeviceAggregate::new(Uuid::new_v4());
        assert_eq!(aggregate.total_count(), 0);
        assert_eq!(aggregate.latest_timestamp(), None);
    }

    #[test]
    fn test_increment_count_accumulates() {
        let aggregate = DeviceAggregate::new(Uuid::new_v4());
        aggregate.increment_count(3);
        aggregate.increment_count(2);
        aggregate.increment_count(0);
        assert_eq!(aggregate.total_count(), 5);
    }

    #[test]
    fn test_increment_count_saturates() {
        let aggregate = DeviceAggregate::new(Uuid::new_v4());
        aggregate.increment_count(u64::MAX - 1);
        aggregate.increment_count(10);
        assert_eq!(aggregate.total_count(), u64::MAX);
    }

    #[test]
    fn test_advance_timestamp_never_regresses() {
        let aggregate = DeviceAggregate::new(Uuid::new_v4());

        assert!(aggregate.advance_timestamp(ts(10)));
        assert!(!aggregate.advance_timestamp(ts(0)));
        assert!(!aggregate.advance_timestamp(ts(10)));
        assert_eq!(aggregate.latest_timestamp(), Some(ts(10)));

        assert!(aggregate.advance_timestamp(ts(10) + Duration::milliseconds(1)));
        assert_eq!(
            aggregate.latest_timestamp(),
            Some(ts(10) + Duration::milliseconds(1))
        );
    }

    #[test]
    fn test_concurrent_advance_keeps_maximum() {
        let aggregate = Arc::new(DeviceAggregate::new(Uuid::new_v4()));

        let handles: Vec<_> = (0..50)
            .map(|i| {
                let aggregate = aggregate.clone();
                std::thread::spawn(move || {
                    aggregate.advance_timestamp(ts((i * 37) % 50));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(aggregate.latest_timestamp(), Some(ts(49)));
    }

    #[test]
    fn test_get_or_create_returns_same_aggregate() {
        let store = InMemoryDeviceStore::new(2);
        let device = Uuid::new_v4();

        let first = store.get_or_create(device).unwrap();
        first.increment_count(7);
        let second = store.get_or_create(device).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.total_count(), 7);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_does_not_create() {
        let store = InMemoryDeviceStore::new(2);
        assert!(store.get(Uuid::new_v4()).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_capacity_exceeded_leaves_no_ghost_entry() {
        let store = InMemoryDeviceStore::new(2);
        store.get_or_create(Uuid::new_v4()).unwrap();
        store.get_or_create(Uuid::new_v4()).unwrap();

        let rejected = Uuid::new_v4();
        match store.get_or_create(rejected) {
            Err(Error::CapacityExceeded { capacity }) => assert_eq!(capacity, 2),
            other => panic!("expected CapacityExceeded, got {:?}", other),
        }

        assert_eq!(store.len(), 2);
        assert!(store.get(rejected).is_none());
    }

    #[test]
    fn test_known_device_still_served_when_full() {
        let store = InMemoryDeviceStore::new(1);
        let device = Uuid::new_v4();
        store.get_or_create(device).unwrap();

        assert!(store.get_or_create(device).is_ok());
        assert!(store.get_or_create(Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let store = InMemoryDeviceStore::new(0);
        assert_eq!(store.capacity(), 1);
        assert!(store.get_or_create(Uuid::new_v4()).is_ok());
    }

    #[test]
    fn test_clear_frees_capacity() {
        let store = InMemoryDeviceStore::new(1);
        store.get_or_create(Uuid::new_v4()).unwrap();
        store.clear();

        assert!(store.is_empty());
        assert!(store.get_or_create(Uuid::new_v4()).is_ok());
    }

    #[test]
    fn test_concurrent_get_or_create_registers_once() {
        let store = Arc::new(InMemoryDeviceStore::new(4));
        let device = Uuid::new_v4();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.get_or_create(device).unwrap())
            })
            .collect();
        let aggregates: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(store.len(), 1);
        assert!(aggregates.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_concurrent_registration_respects_capacity() {
        let store = Arc::new(InMemoryDeviceStore::new(5));

        let handles: Vec<_> = (0..40)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.get_or_create(Uuid::new_v4()).is_ok())
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(admitted, 5);
        assert_eq!(store.len(), 5);
    }
}
