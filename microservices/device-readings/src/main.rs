//! Device Readings microservice binary

use async_trait::async_trait;
use device_readings::{api, AggregationService, ReadingsConfig};
use readings_core::{HealthStatus, Microservice, MicroserviceRuntime, ReadinessStatus, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    readings_telemetry::init("device-readings")?;

    info!("Starting Device Readings microservice");

    let config = ReadingsConfig::from_env()?;
    let service = Arc::new(DeviceReadingsService::new(config));
    MicroserviceRuntime::run(service).await?;

    Ok(())
}

pub struct DeviceReadingsService {
    config: ReadingsConfig,
    aggregation: Arc<AggregationService>,
    start_time: std::time::Instant,
}

impl DeviceReadingsService {
    pub fn new(config: ReadingsConfig) -> Self {
        let aggregation = Arc::new(AggregationService::in_memory(&config));
        Self {
            config,
            aggregation,
            start_time: std::time::Instant::now(),
        }
    }
}

#[async_trait]
impl Microservice for DeviceReadingsService {
    fn service_id(&self) -> &'static str {
        "device-readings"
    }

    async fn health(&self) -> HealthStatus {
        HealthStatus {
            healthy: true,
            service_id: self.service_id().to_string(),
            version: self.version().to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    async fn ready(&self) -> ReadinessStatus {
        self.aggregation.readiness()
    }

    async fn shutdown(&self) -> Result<()> {
        let stats = self.aggregation.stats();
        info!(
            tracked_devices = stats.tracked_devices,
            readings_accepted = stats.readings_accepted,
            "Shutting down Device Readings; in-memory state is discarded"
        );
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        info!(
            http = %self.config.service.http_bind,
            device_store_capacity = self.config.device_store_capacity,
            timestamp_store_capacity = self.config.timestamp_store_capacity,
            "Starting Device Readings HTTP server"
        );

        let app = api::create_router(self.aggregation.clone());

        let listener = TcpListener::bind(&self.config.service.http_bind).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
