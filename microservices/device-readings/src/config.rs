//! Configuration for the Device Readings microservice

use readings_core::config::env_or;
use readings_core::{ReadingsError, Result, ServiceConfig};

pub const DEFAULT_DEVICE_STORE_CAPACITY: usize = 100;
pub const DEFAULT_TIMESTAMP_STORE_CAPACITY: usize = 10_000;

/// Device Readings configuration
#[derive(Debug, Clone)]
pub struct ReadingsConfig {
    /// Shared service settings (name, bind address, log level)
    pub service: ServiceConfig,
    /// Maximum number of distinct devices tracked
    pub device_store_capacity: usize,
    /// Maximum number of (device, timestamp) pairs remembered for deduplication
    pub timestamp_store_capacity: usize,
}

impl Default for ReadingsConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            device_store_capacity: DEFAULT_DEVICE_STORE_CAPACITY,
            timestamp_store_capacity: DEFAULT_TIMESTAMP_STORE_CAPACITY,
        }
    }
}

impl ReadingsConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let config = Self {
            service: ServiceConfig::from_env()?,
            device_store_capacity: env_or("DEVICE_STORE_CAPACITY", DEFAULT_DEVICE_STORE_CAPACITY)?,
            timestamp_store_capacity: env_or(
                "TIMESTAMP_STORE_CAPACITY",
                DEFAULT_TIMESTAMP_STORE_CAPACITY,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_capacities(device_store_capacity: usize, timestamp_store_capacity: usize) -> Self {
        Self {
            device_store_capacity,
            timestamp_store_capacity,
            ..Self::default()
        }
    }

    /// Both capacities must be positive
    pub fn validate(&self) -> Result<()> {
        if self.device_store_capacity == 0 {
            return Err(ReadingsError::Config(
                "DEVICE_STORE_CAPACITY must be a positive integer".to_string(),
            ));
        }
        if self.timestamp_store_capacity == 0 {
            return Err(ReadingsError::Config(
                "TIMESTAMP_STORE_CAPACITY must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReadingsConfig::default();
        assert_eq!(config.device_store_capacity, 100);
        assert_eq!(config.timestamp_store_capacity, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(ReadingsConfig::with_capacities(0, 10).validate().is_err());
        assert!(ReadingsConfig::with_capacities(10, 0).validate().is_err());
    }

    // the only test in this crate that touches DEVICE_STORE_CAPACITY
    #[test]
    fn test_from_env_rejects_bad_device_capacity() {
        std::env::set_var("DEVICE_STORE_CAPACITY", "0");
        let zero = ReadingsConfig::from_env();

        std::env::set_var("DEVICE_STORE_CAPACITY", "lots");
        let garbage = ReadingsConfig::from_env();

        std::env::set_var("DEVICE_STORE_CAPACITY", " 7 ");
        let padded = ReadingsConfig::from_env();

        std::env::remove_var("DEVICE_STORE_CAPACITY");

        assert!(matches!(
            zero,
            Err(ReadingsError::Config(msg)) if msg.contains("DEVICE_STORE_CAPACITY")
        ));
        assert!(matches!(garbage, Err(ReadingsError::Config(_))));
        assert_eq!(padded.unwrap().device_store_capacity, 7);
    }
}
