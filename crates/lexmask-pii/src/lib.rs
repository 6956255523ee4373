//! LexMask Entity Detection and Span Masking
//!
//! This crate provides the masking pipeline around pluggable detectors:
//! - Pattern-based detection of legal identifiers and PII
//! - The detector ladder (model, linguistic, pattern) and its registry
//! - Span filtering and overlap resolution
//! - Offset-preserving redaction with token or character masks

pub mod detector;
pub mod engine;
pub mod error;
pub mod ladder;
pub mod policy;
pub mod redactor;
pub mod resolver;

pub use detector::{
    CustomPattern, DEFAULT_PATTERN_CONFIDENCE, PatternDetector, PatternDetectorConfig,
};
pub use engine::{
    AnalysisReport, Capabilities, DEFAULT_MAX_TEXT_CHARS, DetectionReport, DetectorRun,
    EngineConfig, MaskingEngine, RiskLevel,
};
pub use error::{PiiError, PiiResult};
pub use ladder::{Availability, DetectorCandidates, DetectorLadder, DetectorRegistry, LadderMode};
pub use policy::{
    DEFAULT_MASK_CHARACTER, MaskRepresentation, MaskStyle, MaskingPolicy, default_token,
};
pub use redactor::{Redaction, SpanRedactor, StandardRedactor};
pub use resolver::SpanResolver;
