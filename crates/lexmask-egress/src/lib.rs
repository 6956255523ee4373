//! LexMask Egress Detectors
//!
//! This crate provides entity detectors backed by external inference
//! services:
//! - Token-classification NER model endpoint
//! - Linguistic NLP pipeline endpoint

pub mod client;
pub mod linguistic;
pub mod model;
pub mod retry_after;

pub use client::{HttpClientConfig, create_client, with_retry};
pub use linguistic::{LinguisticConfig, LinguisticDetector};
pub use model::{ModelNerConfig, ModelNerDetector};
pub use retry_after::parse_retry_after;

use lexmask_core::DetectorError;
use thiserror::Error;

/// Errors talking to an inference service
#[derive(Debug, Error)]
pub enum EgressError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Detector service returned {status_code}: {message}")]
    ProviderError { status_code: u16, message: String },

    #[error("Detector service busy{}", retry_hint(.retry_after_secs))]
    Busy { retry_after_secs: Option<u64> },

    #[error("Request timeout after {0}s")]
    Timeout(u64),

    #[error("Failed to parse detector response: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, EgressError>;

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    retry_after_secs
        .map(|s| format!(" (retry after {}s)", s))
        .unwrap_or_default()
}

impl From<EgressError> for DetectorError {
    fn from(err: EgressError) -> Self {
        match err {
            EgressError::HttpError(e) => DetectorError::Transport(e.to_string()),
            EgressError::ProviderError {
                status_code,
                message,
            } => DetectorError::Status {
                status_code,
                message,
            },
            EgressError::Busy { .. } => DetectorError::Unavailable(err.to_string()),
            EgressError::Timeout(secs) => DetectorError::Timeout(secs),
            EgressError::ParseError(msg) => DetectorError::InvalidResponse(msg),
            EgressError::ConfigError(msg) => DetectorError::Unavailable(msg),
        }
    }
}
