//! Tests for the pattern detector

use super::*;
use lexmask_core::{DetectorKind, EntityDetector, EntityLabel};

fn labels_of(spans: &[lexmask_core::Span]) -> Vec<EntityLabel> {
    spans.iter().map(|s| s.label.clone()).collect()
}

#[test]
fn test_config_default() {
    let config = PatternDetectorConfig::default();
    assert_eq!(config.confidence, 0.9);
    assert!(config.include_builtin);
    assert!(config.custom_patterns.is_empty());
}

#[test]
fn test_config_deserialization_defaults() {
    let config: PatternDetectorConfig = serde_json::from_str(
        r#"{"custom_patterns": [{"label": "BAR_NUMBER", "pattern": "bar no\\. \\d+"}]}"#,
    )
    .unwrap();

    assert_eq!(config.confidence, 0.9);
    assert!(config.include_builtin);
    assert_eq!(config.custom_patterns.len(), 1);
    assert_eq!(config.custom_patterns[0].confidence, None);
}

#[test]
fn test_call_log_sentence() {
    let detector = PatternDetector::builtin().unwrap();
    let spans = detector.find("John Smith called 555-123-4567 on 01/02/2023");

    assert_eq!(
        labels_of(&spans),
        vec![EntityLabel::Person, EntityLabel::Phone, EntityLabel::Date]
    );
    assert_eq!((spans[0].start, spans[0].end), (0, 10));
    assert_eq!(spans[1].matched_text, "555-123-4567");
    assert_eq!((spans[1].start, spans[1].end), (18, 30));
    assert_eq!(spans[2].matched_text, "01/02/2023");
    assert_eq!((spans[2].start, spans[2].end), (34, 44));
    assert!(spans.iter().all(|s| s.confidence == 0.9));
    assert!(spans.iter().all(|s| s.source == DetectorKind::Pattern));
}

#[test]
fn test_legal_identifiers() {
    let detector = PatternDetector::builtin().unwrap();
    let text = "See Case No. 2023-CV-1234 and Docket No. 88-A before filing.";
    let spans = detector.find(text);

    let case = spans
        .iter()
        .find(|s| s.label == EntityLabel::CaseNumber)
        .unwrap();
    assert_eq!(case.matched_text, "Case No. 2023-CV-1234");

    let docket = spans.iter().find(|s| s.label == EntityLabel::Docket).unwrap();
    assert_eq!(docket.matched_text, "Docket No. 88-A");
}

#[test]
fn test_matching_ignores_case() {
    let detector = PatternDetector::builtin().unwrap();
    let spans = detector.find("CASE NO. 22-cv-100 filed by JANE@EXAMPLE.COM");

    assert!(spans.iter().any(|s| s.label == EntityLabel::CaseNumber));
    assert!(
        spans
            .iter()
            .any(|s| s.label == EntityLabel::Email && s.matched_text == "JANE@EXAMPLE.COM")
    );
}

#[test]
fn test_name_rules_keep_capitalization() {
    let detector = PatternDetector::builtin().unwrap();
    let spans = detector.find("the witness called on monday");
    assert!(spans.is_empty());
}

#[test]
fn test_every_alternative_contributes() {
    let detector = PatternDetector::builtin().unwrap();
    let spans = detector.find("Paid $1,500.00 on March 15, 2023 and 300 dollars on 2023-04-01");

    let money: Vec<_> = spans
        .iter()
        .filter(|s| s.label == EntityLabel::Money)
        .map(|s| s.matched_text.as_str())
        .collect();
    assert_eq!(money, vec!["$1,500.00", "300 dollars"]);

    let dates: Vec<_> = spans
        .iter()
        .filter(|s| s.label == EntityLabel::Date)
        .map(|s| s.matched_text.as_str())
        .collect();
    assert_eq!(dates, vec!["March 15, 2023", "2023-04-01"]);
}

#[test]
fn test_people_organizations_places() {
    let detector = PatternDetector::builtin().unwrap();
    let text = "Judge Harris ordered Acme Corp to pay the Police Department in Springfield, IL";
    let spans = detector.find(text);

    assert!(
        spans
            .iter()
            .any(|s| s.label == EntityLabel::Person && s.matched_text == "Judge Harris")
    );
    assert!(
        spans
            .iter()
            .any(|s| s.label == EntityLabel::Org && s.matched_text == "Acme Corp")
    );
    assert!(
        spans
            .iter()
            .any(|s| s.label == EntityLabel::Org && s.matched_text == "Police Department")
    );
    assert!(
        spans
            .iter()
            .any(|s| s.label == EntityLabel::Gpe && s.matched_text == "Springfield, IL")
    );
}

#[test]
fn test_overlapping_rules_are_all_reported() {
    let detector = PatternDetector::builtin().unwrap();
    let spans = detector.find("Served at 123 Main Street yesterday");

    let address = spans.iter().find(|s| s.label == EntityLabel::Address).unwrap();
    assert_eq!(address.matched_text, "123 Main Street");

    // "Main Street" also has the shape of a full name
    assert!(spans.iter().any(|s| s.label == EntityLabel::Person && s.overlaps(address)));
}

#[test]
fn test_character_offsets_with_multibyte_text() {
    let detector = PatternDetector::builtin().unwrap();
    let text = "José █ called 555-123-4567";
    let spans = detector.find(text);

    let phone = spans.iter().find(|s| s.label == EntityLabel::Phone).unwrap();
    assert_eq!((phone.start, phone.end), (14, 26));
    assert_eq!(phone.matched_text, "555-123-4567");
}

#[test]
fn test_masked_text_has_no_matches() {
    let detector = PatternDetector::builtin().unwrap();
    let spans = detector.find("██████████ called ████████████ on ██████████");
    assert!(spans.is_empty());
}

#[test]
fn test_sorted_by_start() {
    let detector = PatternDetector::builtin().unwrap();
    let spans =
        detector.find("Email test@test.com, SSN 123-45-6789, phone 555.987.6543, card 4111 1111 1111 1111");

    assert!(spans.len() >= 4);
    for pair in spans.windows(2) {
        assert!(pair[0].start <= pair[1].start);
    }
}

#[test]
fn test_custom_pattern() {
    let config = PatternDetectorConfig {
        confidence: 0.9,
        custom_patterns: vec![CustomPattern {
            label: "BAR_NUMBER".to_string(),
            pattern: r"\bbar\s+no\.\s*\d+".to_string(),
            confidence: Some(0.95),
        }],
        include_builtin: false,
    };

    let detector = PatternDetector::new(config).unwrap();
    assert_eq!(detector.rule_count(), 1);

    let spans = detector.find("Counsel, Bar No. 123456, appeared");
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].label, EntityLabel::Other("BAR_NUMBER".to_string()));
    assert_eq!(spans[0].matched_text, "Bar No. 123456");
    assert_eq!(spans[0].confidence, 0.95);
}

#[test]
fn test_custom_pattern_extends_vocabulary_label() {
    let config = PatternDetectorConfig {
        custom_patterns: vec![CustomPattern {
            label: "person".to_string(),
            pattern: r"\bdefendant\s+[A-Z]\.".to_string(),
            confidence: None,
        }],
        include_builtin: false,
        ..Default::default()
    };

    let detector = PatternDetector::new(config).unwrap();
    let spans = detector.find("The defendant K. pleaded");
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].label, EntityLabel::Person);
    assert_eq!(spans[0].confidence, 0.9);
}

#[test]
fn test_invalid_custom_pattern() {
    let config = PatternDetectorConfig {
        custom_patterns: vec![CustomPattern {
            label: "BROKEN".to_string(),
            pattern: r"(unclosed".to_string(),
            confidence: None,
        }],
        ..Default::default()
    };

    let err = PatternDetector::new(config).unwrap_err();
    assert!(matches!(err, crate::PiiError::Pattern { ref label, .. } if label == "BROKEN"));
}

#[tokio::test]
async fn test_entity_detector_impl() {
    let detector = PatternDetector::builtin().unwrap();

    assert_eq!(detector.kind(), DetectorKind::Pattern);
    assert!(detector.is_available().await);

    let labels = detector.supported_labels();
    assert_eq!(labels.len(), EntityLabel::VOCABULARY.len());
    for label in EntityLabel::VOCABULARY.iter() {
        assert!(labels.contains(label));
    }

    let spans = detector.detect("Call 555-123-4567").await.unwrap();
    assert_eq!(spans.len(), 1);
}
