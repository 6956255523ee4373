//! Detected spans and the entity label vocabulary

mod offsets;

pub use offsets::CharIndex;

use crate::detector::DetectorKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Entity label vocabulary
///
/// Canonical labels serialize as their upper-case names (`PERSON`, `GPE`, ...).
/// Labels a detector emits outside the vocabulary are carried verbatim in
/// [`EntityLabel::Other`] until [`EntityLabel::normalized`] maps them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityLabel {
    /// Person names
    Person,

    /// Organizations
    Org,

    /// Geopolitical entities and locations
    Gpe,

    /// Dates
    Date,

    /// Monetary amounts
    Money,

    /// Social Security Numbers
    Ssn,

    /// Phone numbers
    Phone,

    /// Email addresses
    Email,

    /// Legal case numbers
    CaseNumber,

    /// Court docket numbers
    Docket,

    /// Street addresses
    Address,

    /// Credit card numbers
    CreditCard,

    /// Driver's license numbers
    DriverLicense,

    /// Detector-specific label passed through unmapped
    Other(String),
}

impl EntityLabel {
    /// The full masking vocabulary, in reporting order
    pub const VOCABULARY: [EntityLabel; 13] = [
        EntityLabel::Person,
        EntityLabel::Org,
        EntityLabel::Gpe,
        EntityLabel::Money,
        EntityLabel::Date,
        EntityLabel::Ssn,
        EntityLabel::Phone,
        EntityLabel::Email,
        EntityLabel::CaseNumber,
        EntityLabel::Docket,
        EntityLabel::Address,
        EntityLabel::CreditCard,
        EntityLabel::DriverLicense,
    ];

    /// Canonical name of the label
    pub fn as_str(&self) -> &str {
        match self {
            EntityLabel::Person => "PERSON",
            EntityLabel::Org => "ORG",
            EntityLabel::Gpe => "GPE",
            EntityLabel::Date => "DATE",
            EntityLabel::Money => "MONEY",
            EntityLabel::Ssn => "SSN",
            EntityLabel::Phone => "PHONE",
            EntityLabel::Email => "EMAIL",
            EntityLabel::CaseNumber => "CASE_NUMBER",
            EntityLabel::Docket => "DOCKET",
            EntityLabel::Address => "ADDRESS",
            EntityLabel::CreditCard => "CREDIT_CARD",
            EntityLabel::DriverLicense => "DRIVER_LICENSE",
            EntityLabel::Other(label) => label,
        }
    }

    /// Human readable description
    pub fn description(&self) -> &'static str {
        match self {
            EntityLabel::Person => "Person names",
            EntityLabel::Org => "Organizations",
            EntityLabel::Gpe => "Geopolitical entities (locations)",
            EntityLabel::Date => "Dates",
            EntityLabel::Money => "Monetary amounts",
            EntityLabel::Ssn => "Social Security Numbers",
            EntityLabel::Phone => "Phone numbers",
            EntityLabel::Email => "Email addresses",
            EntityLabel::CaseNumber => "Legal case numbers",
            EntityLabel::Docket => "Court docket numbers",
            EntityLabel::Address => "Street addresses",
            EntityLabel::CreditCard => "Credit card numbers",
            EntityLabel::DriverLicense => "Driver's license numbers",
            EntityLabel::Other(_) => "Detector-specific entity",
        }
    }

    /// Map detector-native aliases onto the policy vocabulary
    ///
    /// `PER` becomes `PERSON`, `LOC`/`LOCATION` become `GPE` and
    /// `ORGANIZATION` becomes `ORG`. BIO prefixes (`B-PER`, `I-LOC`) are
    /// stripped first. Anything else is returned unchanged.
    pub fn normalized(&self) -> EntityLabel {
        let EntityLabel::Other(raw) = self else {
            return self.clone();
        };

        let upper = raw.trim().to_ascii_uppercase();
        let bare = upper
            .strip_prefix("B-")
            .or_else(|| upper.strip_prefix("I-"))
            .unwrap_or(&upper);

        match bare {
            "PER" | "PERSON" => EntityLabel::Person,
            "LOC" | "LOCATION" | "GPE" => EntityLabel::Gpe,
            "ORG" | "ORGANIZATION" => EntityLabel::Org,
            other => match EntityLabel::canonical(other) {
                Some(label) => label,
                None => self.clone(),
            },
        }
    }

    /// Whether this label is part of the fixed vocabulary
    pub fn is_canonical(&self) -> bool {
        !matches!(self, EntityLabel::Other(_))
    }

    fn canonical(name: &str) -> Option<EntityLabel> {
        let label = match name {
            "PERSON" => EntityLabel::Person,
            "ORG" => EntityLabel::Org,
            "GPE" => EntityLabel::Gpe,
            "DATE" => EntityLabel::Date,
            "MONEY" => EntityLabel::Money,
            "SSN" => EntityLabel::Ssn,
            "PHONE" => EntityLabel::Phone,
            "EMAIL" => EntityLabel::Email,
            "CASE_NUMBER" => EntityLabel::CaseNumber,
            "DOCKET" => EntityLabel::Docket,
            "ADDRESS" => EntityLabel::Address,
            "CREDIT_CARD" => EntityLabel::CreditCard,
            "DRIVER_LICENSE" => EntityLabel::DriverLicense,
            _ => return None,
        };
        Some(label)
    }
}

impl From<&str> for EntityLabel {
    fn from(value: &str) -> Self {
        EntityLabel::canonical(&value.trim().to_ascii_uppercase())
            .unwrap_or_else(|| EntityLabel::Other(value.to_string()))
    }
}

impl From<String> for EntityLabel {
    fn from(value: String) -> Self {
        let upper = value.trim().to_ascii_uppercase();
        EntityLabel::canonical(&upper).unwrap_or(EntityLabel::Other(value))
    }
}

impl From<EntityLabel> for String {
    fn from(value: EntityLabel) -> Self {
        match value {
            EntityLabel::Other(label) => label,
            canonical => canonical.as_str().to_string(),
        }
    }
}

impl fmt::Display for EntityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected entity
///
/// `start` and `end` are half-open character offsets into the text the
/// detector was given, and `matched_text` is exactly the text between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// Start offset (characters, inclusive)
    pub start: usize,

    /// End offset (characters, exclusive)
    pub end: usize,

    /// Entity label
    pub label: EntityLabel,

    /// Confidence score (0.0 to 1.0)
    pub confidence: f32,

    /// The detected text
    pub matched_text: String,

    /// Detector that produced the span
    pub source: DetectorKind,
}

impl Span {
    /// Build a span by slicing `text` at the given character offsets
    ///
    /// Returns `None` when the range is empty or out of bounds, so detectors
    /// can drop malformed results from external models instead of failing.
    pub fn from_text(
        index: &CharIndex<'_>,
        start: usize,
        end: usize,
        label: EntityLabel,
        confidence: f32,
        source: DetectorKind,
    ) -> Option<Self> {
        if start >= end {
            return None;
        }
        let matched_text = index.slice(start, end)?.to_string();

        Some(Self {
            start,
            end,
            label,
            confidence: confidence.clamp(0.0, 1.0),
            matched_text,
            source,
        })
    }

    /// Length in characters
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the span covers no characters
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Whether two spans share at least one character
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}
