use thiserror::Error;

use crate::cache::CacheError;
use crate::upstream::UpstreamError;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("upstream client error: {0}")]
    Upstream(#[from] UpstreamError),
    #[error("cache backend error: {0}")]
    Cache(#[from] CacheError),
    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl InfraError {
    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}
