//! Regex table detector for legal identifiers and PII

use crate::detector::PatternDetectorConfig;
use crate::error::{PiiError, PiiResult};
use lexmask_core::{CharIndex, DetectorError, DetectorKind, EntityDetector, EntityLabel, Span};
use regex::{Regex, RegexBuilder};
use tracing::debug;

/// Built-in rule table: label and one pattern per alternative
///
/// Name-shaped rules pin their capitalization with `(?-i:...)`; everything
/// else is matched without regard to case.
const BUILTIN_RULES: &[(&str, &str)] = &[
    ("SSN", r"\b\d{3}-\d{2}-\d{4}\b"),
    ("SSN", r"\b\d{9}\b"),
    ("PHONE", r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b"),
    ("EMAIL", r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b"),
    ("DATE", r"\b\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b"),
    ("DATE", r"\b\d{4}[/-]\d{1,2}[/-]\d{1,2}\b"),
    (
        "DATE",
        r"\b(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},?\s+\d{4}\b",
    ),
    ("MONEY", r"\$[0-9,]+\.?\d*"),
    ("MONEY", r"\b\d+\s*dollars?\b"),
    ("CASE_NUMBER", r"\bcase\s+no\.?\s*[A-Za-z0-9\-]+\b"),
    ("DOCKET", r"\bdocket\s+no\.?\s*[A-Za-z0-9\-]+\b"),
    (
        "ADDRESS",
        r"\b\d+\s+[A-Za-z\s]+(?:Street|St|Avenue|Ave|Road|Rd|Drive|Dr|Lane|Ln|Boulevard|Blvd)\b",
    ),
    ("CREDIT_CARD", r"\b\d{4}[\s-]?\d{4}[\s-]?\d{4}[\s-]?\d{4}\b"),
    ("DRIVER_LICENSE", r"\b[A-Z]{1,2}\d{6,8}\b"),
    ("PERSON", r"(?-i:\b[A-Z][a-z]+ [A-Z][a-z]+\b)"),
    (
        "PERSON",
        r"\b(?:Mr|Ms|Mrs|Dr|Judge|Attorney)\.?\s+(?-i:[A-Z][a-z]+)\b",
    ),
    (
        "ORG",
        r"(?-i:\b[A-Z][a-z]+) (?:Corp|Corporation|Inc|LLC|Ltd|Company)\b",
    ),
    (
        "ORG",
        r"\b(?:Police Department|Sheriff's Office|Court|District Attorney)\b",
    ),
    ("GPE", r"(?-i:\b[A-Z][a-z]+,\s+[A-Z]{2}\b)"),
];

/// One compiled rule
#[derive(Debug)]
struct Rule {
    label: EntityLabel,
    regex: Regex,
    confidence: f32,
}

/// Detector over a fixed table of regex rules
///
/// Every rule runs over the whole text, so alternatives for the same label
/// and rules for different labels may produce overlapping spans; the
/// resolver decides between them.
#[derive(Debug)]
pub struct PatternDetector {
    rules: Vec<Rule>,
}

impl PatternDetector {
    /// Compile the configured rule table
    pub fn new(config: PatternDetectorConfig) -> PiiResult<Self> {
        let mut rules = Vec::new();

        if config.include_builtin {
            for (label, pattern) in BUILTIN_RULES {
                rules.push(compile(label, pattern, config.confidence)?);
            }
        }

        for custom in &config.custom_patterns {
            let confidence = custom.confidence.unwrap_or(config.confidence);
            rules.push(compile(&custom.label, &custom.pattern, confidence)?);
        }

        debug!("Compiled {} pattern rules", rules.len());

        Ok(Self { rules })
    }

    /// Detector with the built-in table and default confidence
    pub fn builtin() -> PiiResult<Self> {
        Self::new(PatternDetectorConfig::default())
    }

    /// Run every rule over `text`, spans sorted by start offset
    pub fn find(&self, text: &str) -> Vec<Span> {
        let index = CharIndex::new(text);
        let mut spans = Vec::new();

        for rule in &self.rules {
            for found in rule.regex.find_iter(text) {
                let (Some(start), Some(end)) = (
                    index.char_offset(found.start()),
                    index.char_offset(found.end()),
                ) else {
                    continue;
                };

                if let Some(span) = Span::from_text(
                    &index,
                    start,
                    end,
                    rule.label.clone(),
                    rule.confidence,
                    DetectorKind::Pattern,
                ) {
                    spans.push(span);
                }
            }
        }

        spans.sort_by_key(|s| s.start);
        spans
    }

    /// Number of compiled rules
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

fn compile(label: &str, pattern: &str, confidence: f32) -> PiiResult<Rule> {
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| PiiError::Pattern {
            label: label.to_string(),
            source,
        })?;

    Ok(Rule {
        label: EntityLabel::from(label),
        regex,
        confidence: confidence.clamp(0.0, 1.0),
    })
}

#[async_trait::async_trait]
impl EntityDetector for PatternDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Pattern
    }

    fn name(&self) -> &str {
        "pattern"
    }

    async fn detect(&self, text: &str) -> Result<Vec<Span>, DetectorError> {
        Ok(self.find(text))
    }

    fn supported_labels(&self) -> Vec<EntityLabel> {
        let mut labels: Vec<EntityLabel> = Vec::new();
        for rule in &self.rules {
            if !labels.contains(&rule.label) {
                labels.push(rule.label.clone());
            }
        }
        labels
    }
}
