//! # stenolens_cache
//!
//! Annotation cache for Stenolens.
//!
//! Maps file paths to the last analysis result and the annotations bound to
//! it, and holds the account-level quota backoff state.
//!
//! ## Cache Strategy
//!
//! 1. **Per-file slots**: raw fragments and materialized bindings are
//!    independently nullable
//! 2. **Fetch reservation**: at most one whole-document fetch per file, claimed
//!    by flipping the bindings slot to the empty sentinel
//! 3. **Quota gate**: one process-wide flag with the time of its last check
//!
//! ## Storage
//!
//! The cache lives in memory. When a store directory is configured, a
//! snapshot is written with `rkyv` after every mutation.

mod entry;
mod error;
mod manager;

pub use entry::{
    Annotation, AnnotationBinding, CacheEntry, CacheSnapshot, EntryUpdate, FileState,
    FragmentRecord, QuotaState,
};
pub use error::CacheError;
pub use manager::{CACHE_FILE_NAME, CacheManager, FetchTicket};
