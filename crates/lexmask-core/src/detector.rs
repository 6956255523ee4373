//! Entity detector trait definitions

use crate::span::{EntityLabel, Span};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The detector variants the masking ladder knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    /// Token-classification NER model
    #[serde(rename = "model_ner")]
    Model,

    /// Alternative linguistic NLP pipeline
    Linguistic,

    /// Regular expression table
    Pattern,
}

impl DetectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorKind::Model => "model_ner",
            DetectorKind::Linguistic => "linguistic",
            DetectorKind::Pattern => "pattern",
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single detector call
///
/// These never reach the end user: the masking pipeline logs them and
/// treats the call as having found nothing.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Detector unavailable: {0}")]
    Unavailable(String),

    #[error("Detector request failed: {0}")]
    Transport(String),

    #[error("Detector returned status {status_code}: {message}")]
    Status { status_code: u16, message: String },

    #[error("Detector response could not be parsed: {0}")]
    InvalidResponse(String),

    #[error("Detector timed out after {0}s")]
    Timeout(u64),
}

/// Trait for detecting entities in text
///
/// Implementations are shared by reference across concurrent requests and
/// must not mutate internal state while detecting.
#[async_trait::async_trait]
pub trait EntityDetector: Send + Sync {
    /// Which ladder rung this detector fills
    fn kind(&self) -> DetectorKind;

    /// Name used in logs and capability reports (model id, endpoint, ...)
    fn name(&self) -> &str;

    /// Detect entities in the given text
    async fn detect(&self, text: &str) -> Result<Vec<Span>, DetectorError>;

    /// Startup probe used to decide the ladder rung
    async fn is_available(&self) -> bool {
        true
    }

    /// Labels the detector can emit, if it knows them up front
    fn supported_labels(&self) -> Vec<EntityLabel> {
        Vec::new()
    }
}
