//! Tests for the masking engine

use super::*;
use crate::detector::{CustomPattern, PatternDetector, PatternDetectorConfig};
use crate::ladder::DetectorCandidates;
use crate::policy::{DEFAULT_MASK_CHARACTER, MaskRepresentation};
use lexmask_core::{CharIndex, DetectorError, EntityLabel};
use std::sync::atomic::{AtomicUsize, Ordering};

const CALL_LOG: &str = "John Smith called 555-123-4567 on 01/02/2023";

/// Emits a span for every occurrence of each needle in the text it is given
struct NeedleDetector {
    kind: DetectorKind,
    needles: Vec<(&'static str, &'static str, f32)>,
    calls: AtomicUsize,
}

impl NeedleDetector {
    fn new(kind: DetectorKind, needles: Vec<(&'static str, &'static str, f32)>) -> Arc<Self> {
        Arc::new(Self {
            kind,
            needles,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl EntityDetector for NeedleDetector {
    fn kind(&self) -> DetectorKind {
        self.kind
    }

    fn name(&self) -> &str {
        "needle"
    }

    async fn detect(&self, text: &str) -> Result<Vec<Span>, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let index = CharIndex::new(text);
        let mut spans = Vec::new();
        for (needle, label, confidence) in &self.needles {
            for (byte, found) in text.match_indices(needle) {
                let start = index.char_offset(byte).unwrap();
                let end = start + found.chars().count();
                spans.extend(Span::from_text(
                    &index,
                    start,
                    end,
                    EntityLabel::from(*label),
                    *confidence,
                    self.kind,
                ));
            }
        }
        Ok(spans)
    }
}

struct FailingDetector {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl EntityDetector for FailingDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Model
    }

    fn name(&self) -> &str {
        "failing"
    }

    async fn detect(&self, _text: &str) -> Result<Vec<Span>, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(DetectorError::Status {
            status_code: 503,
            message: "model loading".to_string(),
        })
    }
}

fn pattern() -> Arc<PatternDetector> {
    Arc::new(PatternDetector::builtin().unwrap())
}

async fn engine_with(candidates: DetectorCandidates, config: EngineConfig) -> MaskingEngine {
    let registry = DetectorRegistry::negotiate(candidates).await;
    MaskingEngine::new(Arc::new(registry), config)
}

async fn patterns_engine() -> MaskingEngine {
    engine_with(
        DetectorCandidates::patterns_only(pattern()),
        EngineConfig::default(),
    )
    .await
}

fn character_policy(threshold: f32) -> MaskingPolicy {
    MaskingPolicy::new(threshold, MaskRepresentation::default())
}

fn token_policy(threshold: f32) -> MaskingPolicy {
    MaskingPolicy::new(threshold, MaskRepresentation::token())
}

fn labels(report: &DetectionReport) -> Vec<EntityLabel> {
    report.entities_found.iter().map(|s| s.label.clone()).collect()
}

#[tokio::test]
async fn test_patterns_only_call_log() {
    let engine = patterns_engine().await;
    let report = engine.mask(CALL_LOG, &character_policy(0.85)).await.unwrap();

    assert_eq!(
        report.masked_text,
        "██████████ called ████████████ on ██████████"
    );
    assert_eq!(
        labels(&report),
        vec![EntityLabel::Person, EntityLabel::Phone, EntityLabel::Date]
    );
    assert_eq!(report.original_length, 44);
    assert_eq!(report.masked_length, 44);
    assert_eq!(report.mode, Some(LadderMode::PatternsOnly));
    assert_eq!(report.confidence_scores(), vec![0.9, 0.9, 0.9]);
}

#[tokio::test]
async fn test_text_without_entities_is_unchanged() {
    let engine = patterns_engine().await;
    let text = "the motion was denied without prejudice";
    let report = engine.mask(text, &token_policy(0.85)).await.unwrap();

    assert_eq!(report.masked_text, text);
    assert!(report.entities_found.is_empty());
    assert_eq!(report.original_length, report.masked_length);
}

#[tokio::test]
async fn test_masking_masked_text_is_idempotent() {
    let engine = patterns_engine().await;
    let policy = character_policy(0.85);

    let first = engine.mask(CALL_LOG, &policy).await.unwrap();
    let second = engine.mask(&first.masked_text, &policy).await.unwrap();

    assert_eq!(second.masked_text, first.masked_text);
    assert!(second.entities_found.is_empty());
}

#[tokio::test]
async fn test_confidence_threshold_filters_model_spans() {
    let model = NeedleDetector::new(
        DetectorKind::Model,
        vec![("Alice", "PER", 0.84), ("Bob", "PER", 0.92)],
    );
    let engine = engine_with(
        DetectorCandidates::patterns_only(pattern()).with_model(model),
        EngineConfig::default(),
    )
    .await;

    let report = engine
        .mask("alice met Alice and Bob", &token_policy(0.85))
        .await
        .unwrap();

    assert_eq!(report.masked_text, "alice met Alice and [PERSON_REDACTED]");
    assert!(report.entities_found.iter().all(|s| s.confidence >= 0.85));
}

#[tokio::test]
async fn test_mode_a_patterns_catch_what_model_missed() {
    let model = NeedleDetector::new(DetectorKind::Model, vec![("John Smith", "PER", 0.99)]);
    let engine = engine_with(
        DetectorCandidates::patterns_only(pattern()).with_model(model.clone()),
        EngineConfig::default(),
    )
    .await;

    let report = engine.mask(CALL_LOG, &character_policy(0.85)).await.unwrap();

    assert_eq!(report.mode, Some(LadderMode::ModelWithPatterns));
    assert_eq!(
        report.masked_text,
        "██████████ called ████████████ on ██████████"
    );
    assert_eq!(report.entities_found.len(), 3);
    assert_eq!(report.entities_found[0].source, DetectorKind::Model);
    assert_eq!(report.entities_found[0].label, EntityLabel::Person);
    assert_eq!(report.entities_found[1].source, DetectorKind::Pattern);
    assert_eq!(report.runs.len(), 2);
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_mode_a_token_pattern_pass_sees_model_output() {
    let model = NeedleDetector::new(DetectorKind::Model, vec![("John Smith", "PER", 0.99)]);
    let engine = engine_with(
        DetectorCandidates::patterns_only(pattern()).with_model(model),
        EngineConfig::default(),
    )
    .await;

    let report = engine.mask(CALL_LOG, &token_policy(0.85)).await.unwrap();

    assert_eq!(
        report.masked_text,
        "[PERSON_REDACTED] called [PHONE_REDACTED] on [DATE_REDACTED]"
    );
    let offsets: Vec<(EntityLabel, usize, usize)> = report
        .entities_found
        .iter()
        .map(|s| (s.label.clone(), s.start, s.end))
        .collect();
    assert_eq!(
        offsets,
        vec![
            (EntityLabel::Person, 0, 10),
            (EntityLabel::Phone, 18, 30),
            (EntityLabel::Date, 34, 44),
        ]
    );

    let index = CharIndex::new(CALL_LOG);
    for span in &report.entities_found {
        assert_eq!(index.slice(span.start, span.end), Some(span.matched_text.as_str()));
    }
}

#[tokio::test]
async fn test_mode_a_drops_pattern_spans_inside_replacement_tokens() {
    let model = NeedleDetector::new(DetectorKind::Model, vec![("John Smith", "PER", 0.99)]);
    let config = PatternDetectorConfig {
        include_builtin: false,
        custom_patterns: vec![
            CustomPattern {
                label: "ORG".to_string(),
                pattern: r"PERSON_REDACTED".to_string(),
                confidence: None,
            },
            CustomPattern {
                label: "PHONE".to_string(),
                pattern: r"\d{3}-\d{3}-\d{4}".to_string(),
                confidence: None,
            },
        ],
        ..Default::default()
    };
    let pattern = Arc::new(PatternDetector::new(config).unwrap());
    let engine = engine_with(
        DetectorCandidates::patterns_only(pattern).with_model(model),
        EngineConfig::default(),
    )
    .await;

    let report = engine.mask(CALL_LOG, &token_policy(0.85)).await.unwrap();

    assert_eq!(
        report.masked_text,
        "[PERSON_REDACTED] called [PHONE_REDACTED] on 01/02/2023"
    );
    assert_eq!(labels(&report), vec![EntityLabel::Person, EntityLabel::Phone]);
    assert_eq!(report.entities_found[1].start, 18);
    assert_eq!(report.entities_found[1].matched_text, "555-123-4567");
}

#[tokio::test]
async fn test_mode_b_has_no_pattern_supplement() {
    let linguistic =
        NeedleDetector::new(DetectorKind::Linguistic, vec![("John Smith", "PERSON", 0.9)]);
    let engine = engine_with(
        DetectorCandidates::patterns_only(pattern()).with_linguistic(linguistic),
        EngineConfig::default(),
    )
    .await;

    let report = engine.mask(CALL_LOG, &character_policy(0.85)).await.unwrap();

    assert_eq!(report.mode, Some(LadderMode::Linguistic));
    assert_eq!(
        report.masked_text,
        "██████████ called 555-123-4567 on 01/02/2023"
    );
    assert_eq!(labels(&report), vec![EntityLabel::Person]);
    assert_eq!(report.runs.len(), 1);
}

#[tokio::test]
async fn test_model_failure_still_runs_patterns() {
    let model = Arc::new(FailingDetector {
        calls: AtomicUsize::new(0),
    });
    let engine = engine_with(
        DetectorCandidates::patterns_only(pattern()).with_model(model.clone()),
        EngineConfig::default(),
    )
    .await;

    let report = engine.mask(CALL_LOG, &character_policy(0.85)).await.unwrap();

    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    assert!(report.runs[0].failed);
    assert!(!report.runs[1].failed);
    assert_eq!(report.entities_found.len(), 3);
}

#[tokio::test]
async fn test_allowed_types_limit_masking() {
    let engine = patterns_engine().await;
    let policy = token_policy(0.85).with_allowed_types(vec![EntityLabel::Phone]);

    let report = engine.mask(CALL_LOG, &policy).await.unwrap();
    assert_eq!(
        report.masked_text,
        "John Smith called [PHONE_REDACTED] on 01/02/2023"
    );
}

#[tokio::test]
async fn test_masked_regions_contain_only_mask_character() {
    let engine = patterns_engine().await;
    let text = "Reach jane@firm.com or 555.987.6543 about Case No. 22-1234";
    let report = engine.mask(text, &character_policy(0.85)).await.unwrap();

    let original = CharIndex::new(text);
    let masked = CharIndex::new(&report.masked_text);
    for span in &report.entities_found {
        let region = masked.slice(span.start, span.end).unwrap();
        assert!(region.chars().all(|c| c == DEFAULT_MASK_CHARACTER));
        assert_eq!(original.slice(span.start, span.end).unwrap(), span.matched_text);
    }
    assert_eq!(report.entities_found.len(), 3);
}

#[tokio::test]
async fn test_empty_text_rejected_before_detection() {
    let model = NeedleDetector::new(DetectorKind::Model, vec![]);
    let engine = engine_with(
        DetectorCandidates::patterns_only(pattern()).with_model(model.clone()),
        EngineConfig::default(),
    )
    .await;

    for text in ["", "   ", "\n\t"] {
        let err = engine.mask(text, &character_policy(0.85)).await.unwrap_err();
        assert!(matches!(err, PiiError::EmptyText));
    }
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_oversized_text_rejected_before_detection() {
    let model = NeedleDetector::new(DetectorKind::Model, vec![]);
    let engine = engine_with(
        DetectorCandidates::patterns_only(pattern()).with_model(model.clone()),
        EngineConfig {
            max_text_chars: 10,
            passthrough: false,
        },
    )
    .await;

    // ten multibyte characters fit, eleven do not
    assert!(engine.mask(&"█".repeat(10), &character_policy(0.85)).await.is_ok());

    let err = engine
        .mask(&"█".repeat(11), &character_policy(0.85))
        .await
        .unwrap_err();
    assert!(matches!(err, PiiError::TextTooLong { len: 11, max: 10 }));
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_invalid_threshold_rejected() {
    let engine = patterns_engine().await;
    let err = engine.mask(CALL_LOG, &character_policy(2.0)).await.unwrap_err();
    assert!(matches!(err, PiiError::InvalidPolicy(_)));
}

#[tokio::test]
async fn test_passthrough_skips_detection() {
    let model = NeedleDetector::new(DetectorKind::Model, vec![("John", "PER", 0.99)]);
    let engine = engine_with(
        DetectorCandidates::patterns_only(pattern()).with_model(model.clone()),
        EngineConfig {
            passthrough: true,
            ..Default::default()
        },
    )
    .await;

    let report = engine.mask(CALL_LOG, &character_policy(0.85)).await.unwrap();
    assert_eq!(report.masked_text, CALL_LOG);
    assert!(report.entities_found.is_empty());
    assert_eq!(report.mode, None);

    let analysis = engine.analyze(CALL_LOG, &character_policy(0.7)).await.unwrap();
    assert_eq!(analysis.entity_count, 0);
    assert_eq!(analysis.risk_level, RiskLevel::Low);

    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    assert!(engine.capabilities().passthrough);

    // validation still applies
    assert!(engine.mask(" ", &character_policy(0.85)).await.is_err());
}

#[tokio::test]
async fn test_analyze_reports_risk() {
    let engine = patterns_engine().await;

    let analysis = engine.analyze(CALL_LOG, &token_policy(0.7)).await.unwrap();
    assert_eq!(analysis.text, CALL_LOG);
    assert_eq!(analysis.entity_count, 3);
    assert_eq!(analysis.risk_level, RiskLevel::Medium);

    let busy = "Call 555-111-2222, 555-111-3333, 555-111-4444, 555-111-5555, 555-111-6666 or 555-111-7777";
    let analysis = engine.analyze(busy, &token_policy(0.7)).await.unwrap();
    assert_eq!(analysis.entity_count, 6);
    assert_eq!(analysis.risk_level, RiskLevel::High);

    let analysis = engine
        .analyze("nothing sensitive here", &token_policy(0.7))
        .await
        .unwrap();
    assert_eq!(analysis.risk_level, RiskLevel::Low);
}

#[test]
fn test_risk_level_boundaries() {
    assert_eq!(RiskLevel::from_count(0), RiskLevel::Low);
    assert_eq!(RiskLevel::from_count(1), RiskLevel::Medium);
    assert_eq!(RiskLevel::from_count(5), RiskLevel::Medium);
    assert_eq!(RiskLevel::from_count(6), RiskLevel::High);
    assert_eq!(serde_json::to_string(&RiskLevel::High).unwrap(), "\"high\"");
}

#[tokio::test]
async fn test_capabilities_and_reload() {
    let engine = patterns_engine().await;

    let caps = engine.capabilities();
    assert_eq!(caps.mode, LadderMode::PatternsOnly);
    assert_eq!(caps.primary_detector, DetectorKind::Pattern);
    assert!(!caps.pattern_supplement);
    assert!(caps.patterns_available);
    assert!(!caps.model_available);
    assert_eq!(caps.max_text_chars, DEFAULT_MAX_TEXT_CHARS);

    let reloaded = engine.reload().await;
    assert_eq!(reloaded, caps);
}
