//! Readings Core - Shared domain types and service infrastructure
//!
//! This crate provides:
//! - Standard lifecycle trait every microservice implements
//! - Ingestion domain types (Reading, DeviceReadings)
//! - Error handling utilities
//! - Configuration management

pub mod config;
pub mod domain;
pub mod error;
pub mod service;

pub use config::ServiceConfig;
pub use domain::*;
pub use error::{ReadingsError, Result};
pub use service::{DependencyStatus, HealthStatus, Microservice, MicroserviceRuntime, ReadinessStatus};
