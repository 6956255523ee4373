//! LexMask Ingress
//!
//! This crate provides the HTTP surface of the masking service:
//! - Mask and analyze endpoints
//! - Capability reporting
//! - Detector reload on a separate admin router
//! - Request context and CORS middleware

pub mod api;
pub mod dto;
pub mod middleware;
pub mod readiness;
pub mod types;

pub use api::{
    AppState, DEFAULT_ANALYZE_THRESHOLD, DEFAULT_MASK_THRESHOLD, RequestDefaults, admin_router,
    router,
};
pub use dto::{
    AnalyzeResponse, CapabilitiesResponse, EntityDto, MaskRequest, MaskResponse,
    SupportedEntitiesResponse, SupportedEntity,
};
pub use middleware::CorsConfig;
pub use readiness::RegistryReadiness;
pub use types::{IngressError, IngressResult, RequestId};
