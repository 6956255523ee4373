//! Request and response bodies of the masking API

use lexmask_core::{DetectorKind, EntityLabel, Span};
use lexmask_pii::{AnalysisReport, Capabilities, DetectionReport, LadderMode, RiskLevel};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/mask` and `POST /api/analyze`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaskRequest {
    /// Text to mask; missing is treated like empty
    #[serde(default)]
    pub text: String,

    /// Labels to mask; defaults to the full vocabulary
    #[serde(default, alias = "mask_types", skip_serializing_if = "Option::is_none")]
    pub allowed_types: Option<Vec<String>>,

    /// `token` or `character`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask_representation: Option<String>,

    /// Glyph for character masking, exactly one character
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask_character: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f32>,
}

/// One entity as reported to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDto {
    pub entity: String,
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub confidence: f32,
    pub source: DetectorKind,
}

impl From<Span> for EntityDto {
    fn from(span: Span) -> Self {
        Self {
            entity: span.label.to_string(),
            text: span.matched_text,
            start: span.start,
            end: span.end,
            confidence: span.confidence,
            source: span.source,
        }
    }
}

/// Body of a successful `POST /api/mask`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskResponse {
    pub masked_text: String,
    pub entities_found: Vec<EntityDto>,
    pub confidence_scores: Vec<f32>,
    pub original_length: usize,
    pub masked_length: usize,
}

impl From<DetectionReport> for MaskResponse {
    fn from(report: DetectionReport) -> Self {
        let confidence_scores = report.confidence_scores();
        Self {
            masked_text: report.masked_text,
            entities_found: report.entities_found.into_iter().map(Into::into).collect(),
            confidence_scores,
            original_length: report.original_length,
            masked_length: report.masked_length,
        }
    }
}

/// Body of a successful `POST /api/analyze`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub text: String,
    pub entities_found: Vec<EntityDto>,
    pub entity_count: usize,
    pub risk_level: RiskLevel,
}

impl From<AnalysisReport> for AnalyzeResponse {
    fn from(report: AnalysisReport) -> Self {
        Self {
            text: report.text,
            entities_found: report.entities_found.into_iter().map(Into::into).collect(),
            entity_count: report.entity_count,
            risk_level: report.risk_level,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportedEntity {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub description: String,
}

/// Body of `GET /api/supported-entities`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportedEntitiesResponse {
    pub entities: Vec<SupportedEntity>,
    pub patterns_available: bool,
    pub model_available: bool,
    pub linguistic_available: bool,
}

impl SupportedEntitiesResponse {
    pub fn new(capabilities: &Capabilities) -> Self {
        Self {
            entities: EntityLabel::VOCABULARY
                .iter()
                .map(|label| SupportedEntity {
                    entity_type: label.to_string(),
                    description: label.description().to_string(),
                })
                .collect(),
            patterns_available: capabilities.patterns_available,
            model_available: capabilities.model_available,
            linguistic_available: capabilities.linguistic_available,
        }
    }
}

/// Body of `GET /api/capabilities` and `POST /api/admin/reload`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitiesResponse {
    pub mode: LadderMode,
    pub primary_detector: DetectorKind,
    pub pattern_supplement: bool,
    pub passthrough: bool,
    pub patterns_available: bool,
    pub model_available: bool,
    pub linguistic_available: bool,
    pub max_text_chars: usize,
}

impl From<Capabilities> for CapabilitiesResponse {
    fn from(c: Capabilities) -> Self {
        Self {
            mode: c.mode,
            primary_detector: c.primary_detector,
            pattern_supplement: c.pattern_supplement,
            passthrough: c.passthrough,
            patterns_available: c.patterns_available,
            model_available: c.model_available,
            linguistic_available: c.linguistic_available,
            max_text_chars: c.max_text_chars,
        }
    }
}
