//! Device Readings Service
//!
//! Aggregates per-device counter readings in memory:
//! - Exactly-once counting per (device, timestamp) within a bounded dedup window
//! - Running total and newest timestamp per device
//! - Hard cap on the number of tracked devices
//! - Thin axum adapter over the aggregation core

pub mod aggregation;
pub mod api;
pub mod config;
pub mod error;
pub mod store;

pub use aggregation::{AggregationService, ServiceStats};
pub use config::ReadingsConfig;
pub use error::{Error, Result};
pub use store::{
    DeviceAggregate, DeviceSnapshot, DeviceStore, InMemoryDeviceStore, InMemoryTimestampStore,
    TimestampStore,
};
