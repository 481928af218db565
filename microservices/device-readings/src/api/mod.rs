//! HTTP adapter for the aggregation service

pub mod rest;

pub use rest::{create_router, AppState};
