//! Reading aggregation over the device and timestamp stores

use chrono::{DateTime, Utc};
use readings_core::{DependencyStatus, ReadinessStatus, Reading};
use readings_telemetry::{Counter, Histogram};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::ReadingsConfig;
use crate::error::{Error, Result};
use crate::store::{DeviceStore, InMemoryDeviceStore, InMemoryTimestampStore, TimestampStore};

/// Point-in-time view of store occupancy and ingestion counters
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub tracked_devices: usize,
    pub device_capacity: usize,
    pub dedup_entries: usize,
    pub dedup_capacity: usize,
    pub dedup_evictions: u64,
    pub readings_accepted: u64,
    pub readings_duplicate: u64,
    pub batches_rejected: u64,
    pub batch_size_mean: f64,
    pub batch_size_p99: f64,
}

#[derive(Clone)]
struct IngestMetrics {
    readings_accepted: Counter,
    readings_duplicate: Counter,
    batches_rejected: Counter,
    batch_size: Histogram,
}

impl IngestMetrics {
    fn new() -> Self {
        Self {
            readings_accepted: Counter::new("readings_accepted"),
            readings_duplicate: Counter::new("readings_duplicate"),
            batches_rejected: Counter::new("batches_rejected"),
            batch_size: Histogram::new("batch_size"),
        }
    }

    fn reset(&self) {
        self.readings_accepted.reset();
        self.readings_duplicate.reset();
        self.batches_rejected.reset();
        self.batch_size.clear();
    }
}

/// Turns reading batches into store updates and answers aggregate queries
pub struct AggregationService {
    device_store: Arc<dyn DeviceStore>,
    ts_store: Arc<dyn TimestampStore>,
    metrics: IngestMetrics,
}

impl AggregationService {
    pub fn new(device_store: Arc<dyn DeviceStore>, ts_store: Arc<dyn TimestampStore>) -> Self {
        Self {
            device_store,
            ts_store,
            metrics: IngestMetrics::new(),
        }
    }

    /// Service backed by the in-memory stores sized from `config`
    pub fn in_memory(config: &ReadingsConfig) -> Self {
        Self::new(
            Arc::new(InMemoryDeviceStore::new(config.device_store_capacity)),
            Arc::new(InMemoryTimestampStore::new(config.timestamp_store_capacity)),
        )
    }

    /// Apply a batch of readings for one device.
    ///
    /// The device is registered first; if the device store is full the whole
    /// batch is rejected before any reading is looked at. Readings are then
    /// applied strictly in order, and a reading whose (device, timestamp) pair
    /// was already counted is skipped without touching count or timestamp.
    pub fn ingest(&self, device_id: Uuid, readings: &[Reading]) -> Result<()> {
        self.metrics.batch_size.record(readings.len() as f64);

        let aggregate = match self.device_store.get_or_create(device_id) {
            Ok(aggregate) => aggregate,
            Err(e) => {
                self.metrics.batches_rejected.inc();
                warn!(device_id = %device_id, readings = readings.len(), "Rejected batch: {}", e);
                return Err(e);
            }
        };

        let mut accepted = 0u64;
        for reading in readings {
            if self.ts_store.check_and_add(device_id, reading.timestamp) {
                aggregate.increment_count(reading.count);
                aggregate.advance_timestamp(reading.timestamp);
                accepted += 1;
            }
        }

        let duplicates = readings.len() as u64 - accepted;
        self.metrics.readings_accepted.add(accepted);
        self.metrics.readings_duplicate.add(duplicates);

        debug!(device_id = %device_id, accepted, duplicates, "Ingested batch");
        Ok(())
    }

    pub fn cumulative_count(&self, device_id: Uuid) -> Result<u64> {
        self.device_store
            .get(device_id)
            .map(|snapshot| snapshot.total_count)
            .ok_or(Error::DeviceNotFound(device_id))
    }

    /// `Ok(None)` means the device is known but none of its readings were accepted yet
    pub fn latest_timestamp(&self, device_id: Uuid) -> Result<Option<DateTime<Utc>>> {
        self.device_store
            .get(device_id)
            .map(|snapshot| snapshot.latest_timestamp)
            .ok_or(Error::DeviceNotFound(device_id))
    }

    /// Drop all devices, dedup history and counters
    pub fn clear(&self) {
        self.device_store.clear();
        self.ts_store.clear();
        self.metrics.reset();
    }

    /// Ready while the device store can still admit a new device
    pub fn readiness(&self) -> ReadinessStatus {
        let available = self.device_store.len() < self.device_store.capacity();
        ReadinessStatus {
            ready: available,
            dependencies: vec![DependencyStatus {
                name: "device-store".to_string(),
                available,
                latency_ms: None,
            }],
        }
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            tracked_devices: self.device_store.len(),
            device_capacity: self.device_store.capacity(),
            dedup_entries: self.ts_store.len(),
            dedup_capacity: self.ts_store.capacity(),
            dedup_evictions: self.ts_store.evictions(),
            readings_accepted: self.metrics.readings_accepted.get(),
            readings_duplicate: self.metrics.readings_duplicate.get(),
            batches_rejected: self.metrics.batches_rejected.get(),
            batch_size_mean: self.metrics.batch_size.mean(),
            batch_size_p99: self.metrics.batch_size.percentile(99.0),
        }
    }
}
