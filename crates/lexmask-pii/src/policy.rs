//! Masking policy

use crate::error::{PiiError, PiiResult};
use lexmask_core::EntityLabel;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Default glyph for character masking
pub const DEFAULT_MASK_CHARACTER: char = '█';

/// Redaction style as requested by callers and configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MaskStyle {
    /// Replace each span with a tag naming its type
    Token,

    /// Replace each character of a span with the mask glyph
    #[default]
    Character,
}

/// How a span is rendered in the masked text
#[derive(Debug, Clone, PartialEq)]
pub enum MaskRepresentation {
    /// Fixed replacement token per type, e.g. `[PERSON_REDACTED]`
    Token {
        /// Per-type replacement text taking precedence over the default tag
        overrides: HashMap<EntityLabel, String>,
    },

    /// One mask character repeated for the span's length
    Character(char),
}

impl MaskRepresentation {
    /// Token style with the default tags
    pub fn token() -> Self {
        MaskRepresentation::Token {
            overrides: HashMap::new(),
        }
    }

    /// Character style with the given glyph
    pub fn character(mask: char) -> Self {
        MaskRepresentation::Character(mask)
    }

    /// Build from a style and a raw mask character string
    ///
    /// The mask character must be exactly one character; it is only checked
    /// for the character style.
    pub fn from_style(
        style: MaskStyle,
        mask_character: &str,
        overrides: HashMap<EntityLabel, String>,
    ) -> PiiResult<Self> {
        match style {
            MaskStyle::Token => Ok(MaskRepresentation::Token { overrides }),
            MaskStyle::Character => {
                let mut chars = mask_character.chars();
                match (chars.next(), chars.next()) {
                    (Some(mask), None) => Ok(MaskRepresentation::Character(mask)),
                    _ => Err(PiiError::InvalidPolicy(format!(
                        "mask_character must be a single character, got {:?}",
                        mask_character
                    ))),
                }
            }
        }
    }

    pub fn style(&self) -> MaskStyle {
        match self {
            MaskRepresentation::Token { .. } => MaskStyle::Token,
            MaskRepresentation::Character(_) => MaskStyle::Character,
        }
    }

    /// Replacement text for a span of `label` covering `char_len` characters
    pub fn replacement(&self, label: &EntityLabel, char_len: usize) -> String {
        match self {
            MaskRepresentation::Token { overrides } => overrides
                .get(label)
                .cloned()
                .unwrap_or_else(|| default_token(label)),
            MaskRepresentation::Character(mask) => std::iter::repeat_n(*mask, char_len).collect(),
        }
    }

    /// Length in characters of [`MaskRepresentation::replacement`]
    pub fn replacement_len(&self, label: &EntityLabel, char_len: usize) -> usize {
        match self {
            MaskRepresentation::Token { .. } => self.replacement(label, char_len).chars().count(),
            MaskRepresentation::Character(_) => char_len,
        }
    }
}

impl Default for MaskRepresentation {
    fn default() -> Self {
        MaskRepresentation::Character(DEFAULT_MASK_CHARACTER)
    }
}

/// Default tag for a label
pub fn default_token(label: &EntityLabel) -> String {
    format!("[{}_REDACTED]", label.as_str())
}

/// Which spans get masked and how
#[derive(Debug, Clone)]
pub struct MaskingPolicy {
    /// Labels eligible for masking (after label normalization)
    pub allowed_types: HashSet<EntityLabel>,

    /// Minimum confidence a span must meet to be redacted
    pub confidence_threshold: f32,

    /// Replacement style
    pub representation: MaskRepresentation,
}

impl MaskingPolicy {
    /// Policy over the full vocabulary
    pub fn new(confidence_threshold: f32, representation: MaskRepresentation) -> Self {
        Self {
            allowed_types: EntityLabel::VOCABULARY.iter().cloned().collect(),
            confidence_threshold,
            representation,
        }
    }

    /// Restrict the policy to the given labels
    ///
    /// Labels are normalized, so `PER` and `PERSON` select the same type.
    pub fn with_allowed_types<I>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = EntityLabel>,
    {
        self.allowed_types = labels.into_iter().map(|l| l.normalized()).collect();
        self
    }

    pub fn allows(&self, label: &EntityLabel) -> bool {
        self.allowed_types.contains(label)
    }

    /// Reject thresholds outside [0, 1]
    pub fn validate(&self) -> PiiResult<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(PiiError::InvalidPolicy(format!(
                "confidence_threshold must be between 0 and 1, got {}",
                self.confidence_threshold
            )));
        }
        Ok(())
    }
}
