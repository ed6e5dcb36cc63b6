//! Cache entry types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// UI payload of one explained fragment. Immutable once created.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
pub struct Annotation {
    /// Short label shown inline.
    pub title: String,
    /// Hover text, usually the explanation itself.
    pub tooltip: String,
    /// Command run when the annotation is activated.
    pub action_id: String,
    /// Arguments passed to the command.
    pub action_args: Vec<String>,
}

/// Association between a fragment's literal text and its annotation.
///
/// `bound_text` is a re-anchoring key, not an identifier: every occurrence
/// of the text in the current document receives the annotation.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
pub struct AnnotationBinding {
    pub bound_text: String,
    pub annotation: Annotation,
}

impl AnnotationBinding {
    pub fn new(bound_text: impl Into<String>, annotation: Annotation) -> Self {
        Self {
            bound_text: bound_text.into(),
            annotation,
        }
    }
}

/// A fragment from the last whole-document analysis.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
pub struct FragmentRecord {
    /// 1-indexed row as delivered by the service.
    pub start_row: u32,
    /// 1-indexed column as delivered by the service.
    pub start_col: u32,
    pub source_text: String,
}

/// Cached state for one file.
///
/// Both slots are independently nullable. `None` means known absent or
/// invalidated; `Some(vec![])` means a fetch is in flight or completed with
/// zero results.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
pub struct CacheEntry {
    /// Fragment list of the last analysis.
    pub raw_blocks: Option<Vec<FragmentRecord>>,
    /// Annotations currently considered valid for the file.
    pub bindings: Option<Vec<AnnotationBinding>>,
}

impl CacheEntry {
    /// Returns the raw block recorded at the given 1-indexed row.
    pub fn fragment_at_row(&self, row: u32) -> Option<&FragmentRecord> {
        self.raw_blocks
            .as_ref()?
            .iter()
            .find(|block| block.start_row == row)
    }

    /// Returns true if some binding covers the given source text.
    pub fn is_bound(&self, source_text: &str) -> bool {
        self.bindings
            .as_ref()
            .is_some_and(|bindings| bindings.iter().any(|b| b.bound_text == source_text))
    }
}

/// Partial update for [`CacheEntry`]. Slots left as `None` are not touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryUpdate {
    pub raw_blocks: Option<Vec<FragmentRecord>>,
    pub bindings: Option<Vec<AnnotationBinding>>,
}

impl EntryUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw_blocks(mut self, raw_blocks: Vec<FragmentRecord>) -> Self {
        self.raw_blocks = Some(raw_blocks);
        self
    }

    pub fn bindings(mut self, bindings: Vec<AnnotationBinding>) -> Self {
        self.bindings = Some(bindings);
        self
    }

    pub(crate) fn apply(self, entry: &mut CacheEntry) {
        if let Some(raw_blocks) = self.raw_blocks {
            entry.raw_blocks = Some(raw_blocks);
        }
        if let Some(bindings) = self.bindings {
            entry.bindings = Some(bindings);
        }
    }
}

/// Account-level quota backoff state.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
pub struct QuotaState {
    /// Whether the service reported the monthly limit as reached.
    pub exhausted: bool,
    /// Unix timestamp (seconds) of the last quota observation.
    pub last_checked_at: u64,
}

impl QuotaState {
    /// Returns true once `interval_secs` have passed since the last check.
    pub fn probe_due(&self, now: u64, interval_secs: u64) -> bool {
        now.saturating_sub(self.last_checked_at) >= interval_secs
    }
}

/// Serializable image of the whole cache.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
pub struct CacheSnapshot {
    pub entries: HashMap<String, CacheEntry>,
    pub quota: QuotaState,
    /// Whether a whole-document fetch was in flight when written.
    pub processing: bool,
}

/// Lifecycle state of a file as seen by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    /// No entry yet.
    Unseen,
    /// A whole-document fetch is in flight.
    Fetching,
    /// Bindings are present and trusted.
    Bound,
    /// Both slots were cleared.
    Invalidated,
}
