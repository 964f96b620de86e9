//! Infrastructure adapters and runtime bootstrap.

pub mod app;
pub mod error;
pub mod http;
pub mod telemetry;
