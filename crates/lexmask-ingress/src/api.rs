//! Masking API handlers
//!
//! Routes:
//! - `POST /api/mask`
//! - `POST /api/analyze`
//! - `GET /api/supported-entities`
//! - `GET /api/capabilities`
//! - `POST /api/admin/reload`

use crate::dto::{
    AnalyzeResponse, CapabilitiesResponse, MaskRequest, MaskResponse, SupportedEntitiesResponse,
};
use crate::middleware::request_context_middleware;
use crate::types::{IngressError, IngressResult};
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    middleware,
    routing::{get, post},
};
use lexmask_core::{EntityLabel, Span};
use lexmask_observability::Metrics;
use lexmask_pii::{
    DEFAULT_MASK_CHARACTER, DetectorRun, MaskRepresentation, MaskStyle, MaskingEngine,
    MaskingPolicy,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Default confidence threshold for `/api/mask`
pub const DEFAULT_MASK_THRESHOLD: f32 = 0.85;

/// Default confidence threshold for `/api/analyze`
pub const DEFAULT_ANALYZE_THRESHOLD: f32 = 0.7;

/// Values used when a request leaves a policy field out
#[derive(Debug, Clone)]
pub struct RequestDefaults {
    pub mask_threshold: f32,
    pub analyze_threshold: f32,
    pub representation: MaskStyle,
    pub mask_character: String,
    pub token_overrides: HashMap<EntityLabel, String>,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            mask_threshold: DEFAULT_MASK_THRESHOLD,
            analyze_threshold: DEFAULT_ANALYZE_THRESHOLD,
            representation: MaskStyle::default(),
            mask_character: DEFAULT_MASK_CHARACTER.to_string(),
            token_overrides: HashMap::new(),
        }
    }
}

impl RequestDefaults {
    /// Build the policy for one request
    pub fn policy_for(
        &self,
        req: &MaskRequest,
        default_threshold: f32,
    ) -> IngressResult<MaskingPolicy> {
        let style = match req.mask_representation.as_deref() {
            None => self.representation,
            Some(raw) => parse_style(raw)?,
        };

        let mask_character = req
            .mask_character
            .as_deref()
            .unwrap_or(&self.mask_character);
        let representation =
            MaskRepresentation::from_style(style, mask_character, self.token_overrides.clone())?;

        let threshold = req.confidence_threshold.unwrap_or(default_threshold);
        let mut policy = MaskingPolicy::new(threshold, representation);
        if let Some(types) = &req.allowed_types {
            policy = policy.with_allowed_types(types.iter().map(|t| EntityLabel::from(t.as_str())));
        }

        Ok(policy)
    }
}

fn parse_style(raw: &str) -> IngressResult<MaskStyle> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "token" => Ok(MaskStyle::Token),
        "character" => Ok(MaskStyle::Character),
        _ => Err(IngressError::InvalidRequest(format!(
            "Unknown mask_representation {:?}, expected \"token\" or \"character\"",
            raw
        ))),
    }
}

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MaskingEngine>,
    pub defaults: Arc<RequestDefaults>,
    pub metrics: Option<Arc<Metrics>>,
    /// Log a per-request summary (never the text itself)
    pub log_requests: bool,
}

impl AppState {
    pub fn new(engine: Arc<MaskingEngine>) -> Self {
        Self {
            engine,
            defaults: Arc::new(RequestDefaults::default()),
            metrics: None,
            log_requests: false,
        }
    }

    pub fn with_defaults(mut self, defaults: RequestDefaults) -> Self {
        self.defaults = Arc::new(defaults);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.log_requests = enabled;
        self
    }

    fn record_detection(&self, runs: &[DetectorRun], entities: &[Span]) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        for run in runs {
            metrics.record_detector_run(
                run.detector.as_str(),
                run.elapsed.as_secs_f64(),
                run.failed,
            );
        }
        for entity in entities {
            metrics.record_entity(entity.label.as_str(), entity.source.as_str());
        }
    }

    fn record_outcome<T>(&self, endpoint: &str, started: Instant, result: &IngressResult<T>) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        let elapsed = started.elapsed().as_secs_f64();
        match result {
            Ok(_) => metrics.record_request_success(endpoint, elapsed),
            Err(e) => metrics.record_request_failure(endpoint, e.error_type(), elapsed),
        }
    }
}

fn parse_body(payload: Result<Json<MaskRequest>, JsonRejection>) -> IngressResult<MaskRequest> {
    payload
        .map(|Json(req)| req)
        .map_err(|rejection| IngressError::InvalidRequest(rejection.body_text()))
}

/// Mask handler
pub async fn mask_text(
    State(state): State<AppState>,
    payload: Result<Json<MaskRequest>, JsonRejection>,
) -> IngressResult<Json<MaskResponse>> {
    let started = Instant::now();
    let result = mask_inner(&state, payload).await;
    state.record_outcome("mask", started, &result);
    result.map(Json)
}

async fn mask_inner(
    state: &AppState,
    payload: Result<Json<MaskRequest>, JsonRejection>,
) -> IngressResult<MaskResponse> {
    let req = parse_body(payload)?;
    let policy = state
        .defaults
        .policy_for(&req, state.defaults.mask_threshold)?;

    let report = state.engine.mask(&req.text, &policy).await?;
    state.record_detection(&report.runs, &report.entities_found);

    if state.log_requests {
        info!(
            "Masked {} entities in text of length {} (masked length {})",
            report.entities_found.len(),
            report.original_length,
            report.masked_length
        );
    }

    Ok(report.into())
}

/// Analyze handler
pub async fn analyze_text(
    State(state): State<AppState>,
    payload: Result<Json<MaskRequest>, JsonRejection>,
) -> IngressResult<Json<AnalyzeResponse>> {
    let started = Instant::now();
    let result = analyze_inner(&state, payload).await;
    state.record_outcome("analyze", started, &result);
    result.map(Json)
}

async fn analyze_inner(
    state: &AppState,
    payload: Result<Json<MaskRequest>, JsonRejection>,
) -> IngressResult<AnalyzeResponse> {
    let req = parse_body(payload)?;
    let policy = state
        .defaults
        .policy_for(&req, state.defaults.analyze_threshold)?;

    let report = state.engine.analyze(&req.text, &policy).await?;
    state.record_detection(&report.runs, &report.entities_found);

    if state.log_requests {
        info!(
            "Analyzed text of length {}: {} entities, risk {:?}",
            req.text.chars().count(),
            report.entity_count,
            report.risk_level
        );
    }

    Ok(report.into())
}

/// Supported entities handler
pub async fn supported_entities(State(state): State<AppState>) -> Json<SupportedEntitiesResponse> {
    Json(SupportedEntitiesResponse::new(&state.engine.capabilities()))
}

/// Capabilities handler
pub async fn capabilities(State(state): State<AppState>) -> Json<CapabilitiesResponse> {
    Json(state.engine.capabilities().into())
}

/// Re-negotiate the detector ladder
pub async fn reload(State(state): State<AppState>) -> Json<CapabilitiesResponse> {
    debug!("Detector reload requested");
    let capabilities = state.engine.reload().await;
    if let Some(metrics) = &state.metrics {
        metrics.set_ladder_mode(capabilities.mode.rung());
    }
    Json(capabilities.into())
}

/// Create the masking API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/mask", post(mask_text))
        .route("/api/analyze", post(analyze_text))
        .route("/api/supported-entities", get(supported_entities))
        .route("/api/capabilities", get(capabilities))
        .layer(middleware::from_fn(request_context_middleware))
        .with_state(state)
}

/// Create the administrative router
///
/// Served on its own listener; it is not part of [`router`].
pub fn admin_router(state: AppState) -> Router {
    Router::new()
        .route("/api/admin/reload", post(reload))
        .layer(middleware::from_fn(request_context_middleware))
        .with_state(state)
}
