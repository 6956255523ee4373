//! LexMask Core Types and Traits
//!
//! This crate provides the fundamental types and traits used throughout LexMask:
//! - Detected spans and the entity label vocabulary
//! - The entity detector capability trait and its error type

pub mod detector;
pub mod span;

pub use detector::{DetectorError, DetectorKind, EntityDetector};
pub use span::{CharIndex, EntityLabel, Span};
