//! # stenolens_core
//!
//! Annotation provider for Stenolens.
//!
//! This crate provides:
//! - The `AnnotationProvider` state machine driving cache lookups and fetches
//! - Re-anchoring of cached annotations by literal content
//! - Configuration loading and validation
//! - The capabilities a host editor lends to the provider
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stenolens_client::StenographyClient;
//! use stenolens_core::{AnnotationProvider, LensConfig, LensContext, NoopHost};
//!
//! let config = LensConfig::from_file("stenolens.json")?;
//! let api = Arc::new(StenographyClient::new()?);
//! let provider = AnnotationProvider::new(LensContext::new(config, api, Arc::new(NoopHost)));
//!
//! for annotation in provider.provide_annotations(path, &text).await {
//!     println!("line {}: {:?}", annotation.line + 1, annotation.annotation());
//! }
//! ```

mod anchor;
mod clock;
mod config;
mod error;
mod host;
mod provider;

pub use anchor::{AnchoredAnnotation, AnnotationSlot, LineIndex, anchor_deferred, reanchor};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DEFAULT_PROBE_INTERVAL_SECS, LensConfig, default_languages};
pub use error::{DASHBOARD_URL, LensError};
pub use host::{HostEditor, NoopHost, UserAction};
pub use provider::{
    ANNOTATION_TITLE, ATTRIBUTION_FOOTER, AnnotationProvider, LensContext,
    SHOW_EXPLANATION_COMMAND, build_annotation,
};

pub use stenolens_cache::{Annotation, AnnotationBinding, CacheEntry, FileState};
