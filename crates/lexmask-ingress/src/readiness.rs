//! Readiness over the detector registry

use lexmask_core::DetectorKind;
use lexmask_observability::{DetectorStatus, ReadinessChecker};
use lexmask_pii::DetectorRegistry;
use std::sync::Arc;

/// Reports detector availability from the active ladder
///
/// The pattern detector is always present, so the service is ready as soon
/// as a ladder has been negotiated.
pub struct RegistryReadiness {
    registry: Arc<DetectorRegistry>,
}

impl RegistryReadiness {
    pub fn new(registry: Arc<DetectorRegistry>) -> Self {
        Self { registry }
    }
}

impl ReadinessChecker for RegistryReadiness {
    fn is_ready(&self) -> bool {
        true
    }

    fn mode(&self) -> Option<String> {
        Some(self.registry.snapshot().mode().to_string())
    }

    fn get_detector_statuses(&self) -> Vec<DetectorStatus> {
        let ladder = self.registry.snapshot();
        let candidates = self.registry.candidates();
        let availability = ladder.availability();

        let in_use: Vec<DetectorKind> = ladder.passes().iter().map(|d| d.kind()).collect();
        let status_of = |kind: DetectorKind, configured: bool, available: bool| {
            if in_use.contains(&kind) {
                "active"
            } else if !configured {
                "not_configured"
            } else if available {
                "standby"
            } else {
                "unavailable"
            }
            .to_string()
        };

        vec![
            DetectorStatus {
                kind: DetectorKind::Model.to_string(),
                status: status_of(
                    DetectorKind::Model,
                    candidates.model.is_some(),
                    availability.model,
                ),
                name: candidates.model.as_ref().map(|d| d.name().to_string()),
            },
            DetectorStatus {
                kind: DetectorKind::Linguistic.to_string(),
                status: status_of(
                    DetectorKind::Linguistic,
                    candidates.linguistic.is_some(),
                    availability.linguistic,
                ),
                name: candidates.linguistic.as_ref().map(|d| d.name().to_string()),
            },
            DetectorStatus {
                kind: DetectorKind::Pattern.to_string(),
                status: status_of(DetectorKind::Pattern, true, true),
                name: None,
            },
        ]
    }
}
