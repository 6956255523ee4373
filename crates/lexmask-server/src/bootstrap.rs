//! Detector and engine bootstrap
//!
//! Builds every configured detector once, negotiates the initial ladder and
//! wires the masking engine. Detectors that are configured but unreachable
//! are still kept as candidates so an admin reload can promote them later.

use crate::config::{DetectorsConfig, ServerConfig};
use anyhow::Context;
use lexmask_egress::{LinguisticDetector, ModelNerDetector};
use lexmask_pii::{DetectorCandidates, DetectorRegistry, MaskingEngine, PatternDetector};
use std::sync::Arc;
use tracing::{debug, info};

/// Build the detector candidates from configuration
pub fn build_candidates(config: &DetectorsConfig) -> anyhow::Result<DetectorCandidates> {
    let pattern = PatternDetector::new(config.patterns.clone())
        .context("Failed to compile the pattern table")?;
    info!(
        "🔎 Pattern detector ready ({} rules, {} custom)",
        pattern.rule_count(),
        config.patterns.custom_patterns.len()
    );
    let mut candidates = DetectorCandidates::patterns_only(Arc::new(pattern));

    match &config.model {
        Some(settings) if settings.enabled => {
            let detector = ModelNerDetector::new(settings.to_detector_config())
                .context("Failed to configure the model NER detector")?;
            info!("🧠 Model NER detector configured: {}", settings.endpoint);
            candidates = candidates.with_model(Arc::new(detector));
        }
        Some(_) => info!("🧠 Model NER detector disabled"),
        None => debug!("No model NER detector configured"),
    }

    match &config.linguistic {
        Some(settings) if settings.enabled => {
            let detector = LinguisticDetector::new(settings.to_detector_config())
                .context("Failed to configure the linguistic detector")?;
            info!("📚 Linguistic detector configured: {}", settings.endpoint);
            candidates = candidates.with_linguistic(Arc::new(detector));
        }
        Some(_) => info!("📚 Linguistic detector disabled"),
        None => debug!("No linguistic detector configured"),
    }

    Ok(candidates)
}

/// Negotiate the ladder and build the engine
pub async fn build_engine(config: &ServerConfig) -> anyhow::Result<Arc<MaskingEngine>> {
    let candidates = build_candidates(&config.detectors)?;
    let registry = Arc::new(DetectorRegistry::negotiate(candidates).await);

    let engine_config = config.masking.engine_config();
    if engine_config.passthrough {
        info!("⚠️  Masking disabled: requests are returned unchanged");
    }

    Ok(Arc::new(MaskingEngine::new(registry, engine_config)))
}
