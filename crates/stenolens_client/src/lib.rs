//! # stenolens_client
//!
//! Client for the Stenography code explanation service.
//!
//! Two calls are supported:
//!
//! - **Batch** (`POST /autopilot`): analyze a whole document, optionally as a
//!   dry run that only reports regions and doubles as a quota probe.
//! - **Point** (`POST /`): explain a single code fragment.
//!
//! Every call resolves to a value or a typed [`ApiError`]; transport and
//! decoding failures are classified at this boundary and never escape raw.

mod client;
mod error;
pub mod wire;

pub use client::{
    Analysis, AnalysisResult, DEFAULT_BASE_URL, DEFAULT_TIMEOUT, ExplainApi, ExplainedBlock,
    Explanation, StenographyClient, StenographyClientBuilder,
};
pub use error::{ApiError, ApiErrorKind, ClientError, classify};
pub use wire::StenographyOptions;
