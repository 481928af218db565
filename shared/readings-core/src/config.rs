//! Configuration management for microservices

use crate::error::{ReadingsError, Result};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub service_name: String,
    pub http_bind: String,
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_name: "device-readings".to_string(),
            http_bind: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            service_name: env::var("SERVICE_NAME").unwrap_or(defaults.service_name),
            http_bind: env::var("HTTP_BIND").unwrap_or(defaults.http_bind),
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }
}

/// Read `key` from the environment, falling back to `default` when unset.
pub fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ReadingsError::Config(format!("Invalid {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_default_when_unset() {
        let value: usize = env_or("READINGS_CORE_TEST_UNSET_KEY", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_env_or_rejects_garbage() {
        env::set_var("READINGS_CORE_TEST_GARBAGE_KEY", "forty-two");
        let result: Result<usize> = env_or("READINGS_CORE_TEST_GARBAGE_KEY", 1);
        env::remove_var("READINGS_CORE_TEST_GARBAGE_KEY");

        match result {
            Err(ReadingsError::Config(msg)) => assert!(msg.contains("READINGS_CORE_TEST_GARBAGE_KEY")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_env_or_parses_value() {
        env::set_var("READINGS_CORE_TEST_PARSE_KEY", " 250 ");
        let value: u64 = env_or("READINGS_CORE_TEST_PARSE_KEY", 1).unwrap();
        env::remove_var("READINGS_CORE_TEST_PARSE_KEY");
        assert_eq!(value, 250);
    }
}
