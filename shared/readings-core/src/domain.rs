//! Core domain types for reading ingestion

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One counter observation reported by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    /// Instant the device took the reading; any RFC 3339 offset is normalized to UTC
    pub timestamp: DateTime<Utc>,
    pub count: u64,
}

impl Reading {
    pub fn new(timestamp: DateTime<Utc>, count: u64) -> Self {
        Self { timestamp, count }
    }
}

/// A batch of readings for a single device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceReadings {
    pub id: Uuid,
    pub readings: Vec<Reading>,
}
