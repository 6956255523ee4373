//! Masking engine: validate, detect, resolve, redact, report

mod offset_map;

use crate::error::{PiiError, PiiResult};
use crate::ladder::{DetectorRegistry, LadderMode};
use crate::policy::MaskingPolicy;
use crate::redactor::{SpanRedactor, StandardRedactor};
use crate::resolver::SpanResolver;
use lexmask_core::{DetectorKind, EntityDetector, Span};
use offset_map::OffsetMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default cap on input length, in characters
pub const DEFAULT_MAX_TEXT_CHARS: usize = 10_000;

/// Engine limits and switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Inputs longer than this are rejected, never truncated
    pub max_text_chars: usize,

    /// Return input unchanged without running any detector
    pub passthrough: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_text_chars: DEFAULT_MAX_TEXT_CHARS,
            passthrough: false,
        }
    }
}

/// Outcome of one detector call within a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorRun {
    pub detector: DetectorKind,
    pub spans_found: usize,
    pub elapsed: Duration,
    pub failed: bool,
}

/// Result of masking one text
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionReport {
    pub masked_text: String,

    /// Every redacted span, ascending by start then end
    ///
    /// Offsets refer to the input text, including spans found by a later
    /// pass over already-masked text.
    pub entities_found: Vec<Span>,

    /// Input length in characters
    pub original_length: usize,

    /// Output length in characters
    pub masked_length: usize,

    /// Ladder rung used, `None` in pass-through mode
    pub mode: Option<LadderMode>,

    pub runs: Vec<DetectorRun>,
}

impl DetectionReport {
    /// Confidence of each entity, in `entities_found` order
    pub fn confidence_scores(&self) -> Vec<f32> {
        self.entities_found.iter().map(|s| s.confidence).collect()
    }
}

/// Coarse exposure rating derived from the entity count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_count(count: usize) -> Self {
        match count {
            0 => RiskLevel::Low,
            1..=5 => RiskLevel::Medium,
            _ => RiskLevel::High,
        }
    }
}

/// Result of analyzing one text without returning a masked copy
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub text: String,
    pub entities_found: Vec<Span>,
    pub entity_count: usize,
    pub risk_level: RiskLevel,
    pub runs: Vec<DetectorRun>,
}

/// What the engine can currently do
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub mode: LadderMode,
    pub primary_detector: DetectorKind,
    pub pattern_supplement: bool,
    pub passthrough: bool,
    pub model_available: bool,
    pub linguistic_available: bool,
    pub patterns_available: bool,
    pub max_text_chars: usize,
}

/// Orchestrates one request through the active detector ladder
pub struct MaskingEngine {
    registry: Arc<DetectorRegistry>,
    resolver: SpanResolver,
    config: EngineConfig,
}

impl MaskingEngine {
    pub fn new(registry: Arc<DetectorRegistry>, config: EngineConfig) -> Self {
        Self {
            registry,
            resolver: SpanResolver::new(),
            config,
        }
    }

    pub fn registry(&self) -> &Arc<DetectorRegistry> {
        &self.registry
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Reject empty or oversized input; returns the length in characters
    pub fn validate(&self, text: &str) -> PiiResult<usize> {
        if text.trim().is_empty() {
            return Err(PiiError::EmptyText);
        }

        let len = text.chars().count();
        if len > self.config.max_text_chars {
            return Err(PiiError::TextTooLong {
                len,
                max: self.config.max_text_chars,
            });
        }

        Ok(len)
    }

    /// Detect and redact entities in `text` under `policy`
    pub async fn mask(&self, text: &str, policy: &MaskingPolicy) -> PiiResult<DetectionReport> {
        let original_length = self.validate(text)?;
        policy.validate()?;

        if self.config.passthrough {
            debug!("Masking disabled, returning text unchanged");
            return Ok(DetectionReport {
                masked_text: text.to_string(),
                entities_found: Vec::new(),
                original_length,
                masked_length: original_length,
                mode: None,
                runs: Vec::new(),
            });
        }

        let ladder = self.registry.snapshot();
        let redactor = StandardRedactor::new(policy.representation.clone());

        let mut current = text.to_string();
        let mut offsets = OffsetMap::new();
        let mut entities_found = Vec::new();
        let mut runs = Vec::new();

        for detector in ladder.passes() {
            let (mut spans, run) = detect_or_empty(detector.as_ref(), &current).await;
            runs.push(run);

            if !offsets.is_empty() {
                spans.retain(|span| {
                    let keep = offsets.to_original(span.start, span.end).is_some();
                    if !keep {
                        debug!(
                            "Dropping {} span {}..{} inside an earlier replacement",
                            span.label, span.start, span.end
                        );
                    }
                    keep
                });
            }

            let resolved = self.resolver.resolve(spans, policy);
            let redaction = redactor.redact(&current, &resolved)?;
            current = redaction.masked_text;

            let mut replaced = Vec::with_capacity(redaction.entities.len());
            for span in redaction.entities {
                let Some((start, end)) = offsets.to_original(span.start, span.end) else {
                    continue;
                };
                let len = policy.representation.replacement_len(&span.label, span.len());
                replaced.push((start, end, len));
                entities_found.push(Span { start, end, ..span });
            }
            for (start, end, len) in replaced {
                offsets.record(start, end, len);
            }
        }

        entities_found.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.end.cmp(&b.end)));
        let masked_length = current.chars().count();

        debug!(
            "Masked {} entities in text of length {} (mode: {})",
            entities_found.len(),
            original_length,
            ladder.mode()
        );

        Ok(DetectionReport {
            masked_text: current,
            entities_found,
            original_length,
            masked_length,
            mode: Some(ladder.mode()),
            runs,
        })
    }

    /// Run the masking pipeline and report what it found
    pub async fn analyze(&self, text: &str, policy: &MaskingPolicy) -> PiiResult<AnalysisReport> {
        let report = self.mask(text, policy).await?;
        let entity_count = report.entities_found.len();

        Ok(AnalysisReport {
            text: text.to_string(),
            entities_found: report.entities_found,
            entity_count,
            risk_level: RiskLevel::from_count(entity_count),
            runs: report.runs,
        })
    }

    pub fn capabilities(&self) -> Capabilities {
        let ladder = self.registry.snapshot();
        let availability = ladder.availability();

        Capabilities {
            mode: ladder.mode(),
            primary_detector: ladder.primary_kind(),
            pattern_supplement: ladder.supplement().is_some(),
            passthrough: self.config.passthrough,
            model_available: availability.model,
            linguistic_available: availability.linguistic,
            patterns_available: true,
            max_text_chars: self.config.max_text_chars,
        }
    }

    /// Re-negotiate the detector ladder
    pub async fn reload(&self) -> Capabilities {
        self.registry.reload().await;
        self.capabilities()
    }
}

/// Run one detector; failures are logged and count as finding nothing
async fn detect_or_empty(detector: &dyn EntityDetector, text: &str) -> (Vec<Span>, DetectorRun) {
    let started = Instant::now();
    let result = detector.detect(text).await;
    let elapsed = started.elapsed();

    let (spans, failed) = match result {
        Ok(spans) => (spans, false),
        Err(e) => {
            warn!(
                "{} detector ({}) failed, continuing without its spans: {}",
                detector.kind(),
                detector.name(),
                e
            );
            (Vec::new(), true)
        }
    };

    let run = DetectorRun {
        detector: detector.kind(),
        spans_found: spans.len(),
        elapsed,
        failed,
    };
    (spans, run)
}

#[cfg(test)]
mod tests;
