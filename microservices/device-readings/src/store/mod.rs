//! Bounded in-memory stores backing reading aggregation
//!
//! Both stores are process-wide and volatile. The timestamp store forgets
//! old entries under pressure; the device store refuses to grow instead.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;

mod device_store;
mod timestamp_store;

pub use device_store::{DeviceAggregate, DeviceSnapshot, InMemoryDeviceStore};
pub use timestamp_store::{DedupKey, InMemoryTimestampStore};

/// Remembers which (device, timestamp) pairs have already been counted
pub trait TimestampStore: Send + Sync {
    /// Record the pair and return `true` if it was not present, `false` if it was.
    /// Check and insert happen as one atomic step.
    fn check_and_add(&self, device_id: Uuid, timestamp: DateTime<Utc>) -> bool;

    /// Forget every recorded pair
    fn clear(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn capacity(&self) -> usize;

    /// Entries dropped to respect capacity since creation
    fn evictions(&self) -> u64;
}

/// Holds the running aggregate of every known device
pub trait DeviceStore: Send + Sync {
    /// Return the device's aggregate, registering a zeroed one if the device is new.
    /// Fails with `CapacityExceeded` instead of growing past capacity.
    fn get_or_create(&self, device_id: Uuid) -> Result<Arc<DeviceAggregate>>;

    /// Pure lookup; never registers the device
    fn get(&self, device_id: Uuid) -> Option<DeviceSnapshot>;

    fn clear(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn capacity(&self) -> usize;
}
