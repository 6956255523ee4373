//! Pattern-based entity detection

mod pattern_detector;

pub use pattern_detector::PatternDetector;

use serde::{Deserialize, Serialize};

/// Default confidence for pattern matches
pub const DEFAULT_PATTERN_CONFIDENCE: f32 = 0.9;

/// Configuration for the pattern detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternDetectorConfig {
    /// Confidence assigned to every built-in match
    #[serde(default = "default_confidence")]
    pub confidence: f32,

    /// Extra rules compiled alongside the built-in table
    #[serde(default)]
    pub custom_patterns: Vec<CustomPattern>,

    /// Compile the built-in legal table
    #[serde(default = "default_include_builtin")]
    pub include_builtin: bool,
}

fn default_confidence() -> f32 {
    DEFAULT_PATTERN_CONFIDENCE
}

fn default_include_builtin() -> bool {
    true
}

impl Default for PatternDetectorConfig {
    fn default() -> Self {
        Self {
            confidence: default_confidence(),
            custom_patterns: Vec::new(),
            include_builtin: true,
        }
    }
}

/// User-supplied detection rule
///
/// `label` may name a vocabulary type (adding an alternative to it) or a new
/// type, which is then reported as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomPattern {
    /// Entity label for matches
    pub label: String,

    /// Regex pattern, evaluated case-insensitively
    pub pattern: String,

    /// Confidence for matches; defaults to the detector confidence
    #[serde(default)]
    pub confidence: Option<f32>,
}

#[cfg(test)]
mod tests;
