//! Detector ladder negotiation and the live registry

use crate::detector::PatternDetector;
use lexmask_core::{DetectorKind, EntityDetector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Which rung of the ladder is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LadderMode {
    /// Model NER pass, then the pattern table over the model-masked text
    ModelWithPatterns,

    /// Linguistic pipeline alone
    Linguistic,

    /// Pattern table alone
    PatternsOnly,
}

impl LadderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LadderMode::ModelWithPatterns => "model_with_patterns",
            LadderMode::Linguistic => "linguistic",
            LadderMode::PatternsOnly => "patterns_only",
        }
    }

    /// Numeric rung for gauges (0 = best)
    pub fn rung(&self) -> i64 {
        match self {
            LadderMode::ModelWithPatterns => 0,
            LadderMode::Linguistic => 1,
            LadderMode::PatternsOnly => 2,
        }
    }
}

impl fmt::Display for LadderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every detector the service was configured with
///
/// Model and linguistic detectors are optional; the pattern detector is
/// always present and is the floor of the ladder.
#[derive(Clone)]
pub struct DetectorCandidates {
    pub model: Option<Arc<dyn EntityDetector>>,
    pub linguistic: Option<Arc<dyn EntityDetector>>,
    pub pattern: Arc<PatternDetector>,
}

impl DetectorCandidates {
    /// Candidates with only the pattern detector
    pub fn patterns_only(pattern: Arc<PatternDetector>) -> Self {
        Self {
            model: None,
            linguistic: None,
            pattern,
        }
    }

    pub fn with_model(mut self, model: Arc<dyn EntityDetector>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_linguistic(mut self, linguistic: Arc<dyn EntityDetector>) -> Self {
        self.linguistic = Some(linguistic);
        self
    }
}

/// Result of probing the optional detectors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub model: bool,
    pub linguistic: bool,
}

/// The negotiated detector configuration
///
/// A ladder is immutable; changing it means building a new one and swapping
/// it into the [`DetectorRegistry`].
#[derive(Clone)]
pub struct DetectorLadder {
    mode: LadderMode,
    primary: Arc<dyn EntityDetector>,
    supplement: Option<Arc<dyn EntityDetector>>,
    availability: Availability,
}

impl DetectorLadder {
    /// Probe the optional detectors and pick the best available rung
    pub async fn negotiate(candidates: &DetectorCandidates) -> Self {
        let model = match &candidates.model {
            Some(detector) => probe(detector.as_ref()).await,
            None => false,
        };
        let linguistic = match &candidates.linguistic {
            Some(detector) => probe(detector.as_ref()).await,
            None => false,
        };

        let ladder = Self::select(candidates, Availability { model, linguistic });
        info!(
            "🪜 Detector ladder: {} (primary: {})",
            ladder.mode,
            ladder.primary.name()
        );
        ladder
    }

    /// Pick the rung for already-known availability
    pub fn select(candidates: &DetectorCandidates, availability: Availability) -> Self {
        let pattern: Arc<dyn EntityDetector> = candidates.pattern.clone();

        if availability.model
            && let Some(model) = &candidates.model
        {
            return Self {
                mode: LadderMode::ModelWithPatterns,
                primary: model.clone(),
                supplement: Some(pattern),
                availability,
            };
        }

        if availability.linguistic
            && let Some(linguistic) = &candidates.linguistic
        {
            return Self {
                mode: LadderMode::Linguistic,
                primary: linguistic.clone(),
                supplement: None,
                availability,
            };
        }

        Self {
            mode: LadderMode::PatternsOnly,
            primary: pattern,
            supplement: None,
            availability,
        }
    }

    pub fn mode(&self) -> LadderMode {
        self.mode
    }

    pub fn primary(&self) -> &Arc<dyn EntityDetector> {
        &self.primary
    }

    pub fn primary_kind(&self) -> DetectorKind {
        self.primary.kind()
    }

    pub fn supplement(&self) -> Option<&Arc<dyn EntityDetector>> {
        self.supplement.as_ref()
    }

    pub fn availability(&self) -> Availability {
        self.availability
    }

    /// Detectors to run, in order; each pass sees the previous pass's output
    pub fn passes(&self) -> Vec<Arc<dyn EntityDetector>> {
        let mut passes = vec![self.primary.clone()];
        if let Some(supplement) = &self.supplement {
            passes.push(supplement.clone());
        }
        passes
    }
}

impl fmt::Debug for DetectorCandidates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectorCandidates")
            .field("model", &self.model.as_ref().map(|d| d.name()))
            .field("linguistic", &self.linguistic.as_ref().map(|d| d.name()))
            .field("pattern_rules", &self.pattern.rule_count())
            .finish()
    }
}

impl fmt::Debug for DetectorLadder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectorLadder")
            .field("mode", &self.mode)
            .field("primary", &self.primary.name())
            .field("supplement", &self.supplement.as_ref().map(|d| d.name()))
            .field("availability", &self.availability)
            .finish()
    }
}

async fn probe(detector: &dyn EntityDetector) -> bool {
    let available = detector.is_available().await;
    if available {
        info!("✓ {} detector available ({})", detector.kind(), detector.name());
    } else {
        warn!(
            "✗ {} detector unavailable ({}), falling back",
            detector.kind(),
            detector.name()
        );
    }
    available
}

/// Holds the active ladder for the lifetime of the service
///
/// Requests take a cheap `Arc` snapshot; reloads negotiate a new ladder
/// without holding the lock and then swap it in, so readers always see a
/// complete ladder.
pub struct DetectorRegistry {
    candidates: DetectorCandidates,
    active: RwLock<Arc<DetectorLadder>>,
    reload_lock: Mutex<()>,
}

impl DetectorRegistry {
    /// Negotiate the initial ladder
    pub async fn negotiate(candidates: DetectorCandidates) -> Self {
        let ladder = DetectorLadder::negotiate(&candidates).await;
        Self::with_ladder(candidates, ladder)
    }

    /// Registry around an already-selected ladder
    pub fn with_ladder(candidates: DetectorCandidates, ladder: DetectorLadder) -> Self {
        Self {
            candidates,
            active: RwLock::new(Arc::new(ladder)),
            reload_lock: Mutex::new(()),
        }
    }

    pub fn candidates(&self) -> &DetectorCandidates {
        &self.candidates
    }

    /// Current ladder
    pub fn snapshot(&self) -> Arc<DetectorLadder> {
        self.active
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Install a new ladder, returning the previous one
    pub fn swap(&self, ladder: DetectorLadder) -> Arc<DetectorLadder> {
        let mut active = self
            .active
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *active, Arc::new(ladder))
    }

    /// Re-probe the detectors and swap in the resulting ladder
    ///
    /// Concurrent reloads are serialized; requests keep using the old ladder
    /// until the swap.
    pub async fn reload(&self) -> Arc<DetectorLadder> {
        let _guard = self.reload_lock.lock().await;

        let ladder = DetectorLadder::negotiate(&self.candidates).await;
        let previous = self.swap(ladder);
        let current = self.snapshot();

        if previous.mode() != current.mode() {
            info!(
                "🔄 Detector ladder changed: {} -> {}",
                previous.mode(),
                current.mode()
            );
        } else {
            info!("🔄 Detector ladder unchanged: {}", current.mode());
        }

        current
    }
}
