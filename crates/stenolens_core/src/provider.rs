//! Per-document annotation provider.
//!
//! Every file moves through `Unseen -> Fetching -> Bound <-> Invalidated`.
//! A cache hit re-anchors the stored bindings against the current text; a
//! miss reserves the file, calls the service once and stores the result.
//! While the account quota is exhausted no whole-document call is made,
//! except for one dry-run probe per cooldown interval.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, MutexGuard, RwLock};
use stenolens_cache::{
    Annotation, AnnotationBinding, CacheEntry, CacheManager, EntryUpdate, FetchTicket, FileState,
    FragmentRecord,
};
use stenolens_client::{Analysis, ApiError, ExplainApi, ExplainedBlock};
use tracing::{debug, error, info, warn};

use crate::anchor::{AnchoredAnnotation, AnnotationSlot, LineIndex, anchor_deferred, reanchor};
use crate::clock::{Clock, SystemClock};
use crate::config::LensConfig;
use crate::error::LensError;
use crate::host::HostEditor;

/// Inline label of every annotation.
pub const ANNOTATION_TITLE: &str = "<stenolens explain />";

/// Command run when an annotation is activated.
pub const SHOW_EXPLANATION_COMMAND: &str = "stenolens.showExplanation";

/// Appended to tooltips when attribution is enabled.
pub const ATTRIBUTION_FOOTER: &str = "- generated by stenolens";

/// Snippet sent by manual quota probes.
const PROBE_SOURCE: &str = "def probe(): pass";
const PROBE_LANGUAGE: &str = "python";

const PROGRESS_TITLE: &str = "Stenolens: explaining code";

/// Everything the provider shares for the lifetime of one activation.
pub struct LensContext {
    config: RwLock<LensConfig>,
    cache: Mutex<CacheManager>,
    api: Arc<dyn ExplainApi>,
    host: Arc<dyn HostEditor>,
    clock: Arc<dyn Clock>,
    /// Set once the missing key has been reported for the current key state.
    missing_key_reported: AtomicBool,
}

impl LensContext {
    /// Creates the context at activation.
    ///
    /// The cache starts empty; a snapshot left by a previous session is
    /// discarded.
    pub fn new(config: LensConfig, api: Arc<dyn ExplainApi>, host: Arc<dyn HostEditor>) -> Self {
        let mut cache = match config.resolved_cache_dir() {
            Some(dir) => CacheManager::with_store(dir),
            None => CacheManager::new(),
        };
        cache.clear();

        Self {
            config: RwLock::new(config),
            cache: Mutex::new(cache),
            api,
            host,
            clock: Arc::new(SystemClock),
            missing_key_reported: AtomicBool::new(false),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cache(mut self, cache: CacheManager) -> Self {
        self.cache = Mutex::new(cache);
        self
    }

    /// Returns a copy of the current configuration.
    pub fn config(&self) -> LensConfig {
        self.config.read().clone()
    }

    /// Locks the cache. The guard must not be held across an await.
    pub fn cache(&self) -> MutexGuard<'_, CacheManager> {
        self.cache.lock()
    }

    pub fn host(&self) -> &Arc<dyn HostEditor> {
        &self.host
    }

    fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Reports the missing key the first time it is noticed.
    fn report_missing_key(&self) {
        if !self.missing_key_reported.swap(true, Ordering::SeqCst) {
            self.host
                .report_error(&LensError::auth("No API key configured"));
        } else {
            debug!("No API key configured; already reported");
        }
    }
}

impl std::fmt::Debug for LensContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LensContext")
            .field("config", &*self.config.read())
            .finish_non_exhaustive()
    }
}

/// Entry point the host editor calls for annotations.
#[derive(Debug, Clone)]
pub struct AnnotationProvider {
    ctx: Arc<LensContext>,
}

impl AnnotationProvider {
    pub fn new(ctx: LensContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn context(&self) -> &LensContext {
        &self.ctx
    }

    /// Returns the annotations for a document.
    ///
    /// Never waits on another request's fetch: while the file is reserved
    /// the result is empty and the host is notified once data arrives.
    pub async fn provide_annotations(&self, path: &Path, text: &str) -> Vec<AnchoredAnnotation> {
        let config = self.ctx.config();
        if !config.annotations {
            return Vec::new();
        }
        let Some(language) = config.language_for(path) else {
            debug!("No language mapping for {}", path.display());
            return Vec::new();
        };

        if let Some(cached) = self.cached_annotations(path, text, &config) {
            return cached;
        }

        let Some(api_key) = config.api_key() else {
            self.ctx.report_missing_key();
            return Vec::new();
        };

        if !self.pass_quota_gate(api_key, text, language, &config).await {
            return Vec::new();
        }

        let Some(ticket) = self.ctx.cache().reserve_fetch(path) else {
            return self
                .cached_annotations(path, text, &config)
                .unwrap_or_default();
        };

        debug!("Fetching annotations for {}", ticket.key());
        self.ctx.host.begin_progress(ticket.key(), PROGRESS_TITLE);
        let result = self
            .ctx
            .api
            .analyze(api_key, text, language, config.lazy_resolve)
            .await;
        self.ctx.host.end_progress(ticket.key());

        match result {
            Ok(analysis) => self.store_analysis(&ticket, analysis, text, &config),
            Err(err) => {
                self.fetch_failed(&ticket, err);
                Vec::new()
            }
        }
    }

    /// Served from the cache while the file is bound or being fetched.
    fn cached_annotations(
        &self,
        path: &Path,
        text: &str,
        config: &LensConfig,
    ) -> Option<Vec<AnchoredAnnotation>> {
        let cache = self.ctx.cache();
        match cache.state(path) {
            FileState::Bound => {
                debug!("Cache hit for {}", path.display());
                let entry = cache.get(path)?;
                Some(place(annotate_entry(entry, text), config))
            }
            FileState::Fetching => {
                debug!("Fetch in flight for {}; deferring", path.display());
                Some(Vec::new())
            }
            FileState::Unseen | FileState::Invalidated => None,
        }
    }

    /// Returns true if a whole-document fetch may proceed.
    async fn pass_quota_gate(
        &self,
        api_key: &str,
        text: &str,
        language: &str,
        config: &LensConfig,
    ) -> bool {
        {
            let mut cache = self.ctx.cache();
            if !cache.is_quota_exhausted() {
                return true;
            }
            let now = self.ctx.now();
            if !cache.quota().probe_due(now, config.probe_interval_secs) {
                debug!("Quota exhausted; next probe not due yet");
                return false;
            }
            // Claim the probe so interleaved requests wait for the next window.
            cache.record_quota_check(now);
        }

        info!("Probing quota with a dry run");
        match self.ctx.api.analyze(api_key, text, language, true).await {
            Ok(_) => self.quota_restored(),
            Err(err) => {
                debug!("Quota probe failed: {}", err);
                self.ctx.cache().record_quota_check(self.ctx.now());
            }
        }
        false
    }

    /// Drops everything learned while the quota was exhausted.
    fn quota_restored(&self) {
        info!("Quota available again; resetting annotation cache");
        {
            let mut cache = self.ctx.cache();
            cache.clear();
            cache.clear_quota_exhausted(self.ctx.now());
        }
        self.ctx.host.annotations_changed();
    }

    fn store_analysis(
        &self,
        ticket: &FetchTicket,
        analysis: Analysis,
        text: &str,
        config: &LensConfig,
    ) -> Vec<AnchoredAnnotation> {
        debug!(
            "Received {} fragments for {} (invocations: {})",
            analysis.blocks.len(),
            ticket.key(),
            analysis.invocation_counter
        );

        let raw_blocks: Vec<FragmentRecord> = analysis
            .blocks
            .iter()
            .map(|block| FragmentRecord {
                start_row: block.start_row,
                start_col: block.start_col,
                source_text: block.code.clone(),
            })
            .collect();
        let bindings: Vec<AnnotationBinding> = if config.lazy_resolve {
            Vec::new()
        } else {
            analysis
                .blocks
                .iter()
                .filter_map(|block| {
                    let explanation = block.explanation.as_deref()?;
                    Some(AnnotationBinding::new(
                        block.code.clone(),
                        build_annotation(explanation, &block.code, config),
                    ))
                })
                .collect()
        };

        let stored = self.ctx.cache().complete_fetch(
            ticket,
            EntryUpdate::new()
                .raw_blocks(raw_blocks)
                .bindings(bindings.clone()),
        );
        if !stored {
            debug!("File {} changed during fetch; result dropped", ticket.key());
            return Vec::new();
        }
        self.ctx.host.annotations_changed();

        let fresh = anchor_fresh(&analysis.blocks, &bindings, text);
        place(fresh, config)
    }

    fn fetch_failed(&self, ticket: &FetchTicket, err: ApiError) {
        let error = LensError::from(err);
        {
            let mut cache = self.ctx.cache();
            cache.abort_fetch(ticket);
            match &error {
                LensError::QuotaExceeded(_) => cache.record_quota_exhausted(self.ctx.now()),
                LensError::Transport(message) => {
                    warn!("Fetching annotations for {} failed: {}", ticket.key(), message)
                }
                _ => {}
            }
        }
        self.ctx.host.report_error(&error);
    }

    /// Materializes the deferred annotation recorded at `fragment_row`.
    ///
    /// Returns `None` when no fragment starts on that row, or when the
    /// explanation could not be fetched (the error is reported to the host).
    pub async fn resolve_annotation(&self, path: &Path, fragment_row: u32) -> Option<Annotation> {
        let config = self.ctx.config();
        let language = config.language_for(path)?;

        let fragment = {
            let cache = self.ctx.cache();
            let entry = cache.get(path)?;
            let fragment = entry.fragment_at_row(fragment_row)?.clone();
            if let Some(existing) = find_binding(entry, &fragment.source_text) {
                return Some(existing);
            }
            fragment
        };

        let Some(api_key) = config.api_key() else {
            self.ctx.report_missing_key();
            return None;
        };

        debug!("Resolving fragment at row {} of {}", fragment_row, path.display());
        match self
            .ctx
            .api
            .explain_fragment(api_key, &fragment.source_text, language)
            .await
        {
            Ok(explanation) => {
                let annotation = build_annotation(&explanation.text, &explanation.code, &config);
                let binding = AnnotationBinding::new(fragment.source_text, annotation.clone());
                if !self.ctx.cache().bind(path, binding) {
                    debug!("{} was invalidated while resolving", path.display());
                }
                Some(annotation)
            }
            Err(err) => {
                let error = LensError::from(err);
                if matches!(error, LensError::QuotaExceeded(_)) {
                    self.ctx.cache().record_quota_exhausted(self.ctx.now());
                }
                self.ctx.host.report_error(&error);
                None
            }
        }
    }

    /// Invalidates a saved file and asks the host to re-request annotations.
    pub fn document_saved(&self, path: &Path) {
        debug!("Invalidating {} after save", path.display());
        self.ctx.cache().invalidate(path);
        self.ctx.host.annotations_changed();
    }

    /// Clears every cached file and the quota flag.
    pub fn reset_cache(&self) {
        self.ctx.cache().clear();
        info!("Annotation cache reset");
        self.ctx.host.show_info("Stenolens cache cleared");
        self.ctx.host.annotations_changed();
    }

    /// Flips annotation mode and returns the new setting.
    pub fn toggle_annotations(&self) -> bool {
        let enabled = {
            let mut config = self.ctx.config.write();
            config.annotations = !config.annotations;
            config.annotations
        };
        info!("Annotations {}", if enabled { "enabled" } else { "disabled" });
        self.ctx.host.annotations_changed();
        enabled
    }

    /// Stores a new API key.
    ///
    /// A recorded quota block stays in place, but the next request checks it
    /// right away instead of waiting out the cooldown.
    pub fn set_api_key(&self, key: &str) {
        let key = key.trim();
        self.ctx.config.write().api_key = (!key.is_empty()).then(|| key.to_string());
        self.ctx.missing_key_reported.store(false, Ordering::SeqCst);
        self.ctx.cache().expedite_quota_check();
        self.ctx.host.annotations_changed();
    }

    /// Replaces the configuration.
    pub fn update_config(&self, config: LensConfig) {
        *self.ctx.config.write() = config;
        self.ctx.missing_key_reported.store(false, Ordering::SeqCst);
        self.ctx.host.annotations_changed();
    }

    /// Runs a dry-run probe regardless of the cooldown.
    ///
    /// Returns the account's invocation counter on success.
    pub async fn probe_quota(&self) -> Result<i64, LensError> {
        let config = self.ctx.config();
        let api_key = config
            .api_key()
            .ok_or_else(|| LensError::auth("No API key configured"))?;

        let result = self
            .ctx
            .api
            .analyze(api_key, PROBE_SOURCE, PROBE_LANGUAGE, true)
            .await;
        match result {
            Ok(analysis) => {
                if self.ctx.cache().is_quota_exhausted() {
                    self.quota_restored();
                }
                Ok(analysis.invocation_counter)
            }
            Err(err) => {
                let error = LensError::from(err);
                let now = self.ctx.now();
                let mut cache = self.ctx.cache();
                if matches!(error, LensError::QuotaExceeded(_)) {
                    cache.record_quota_exhausted(now);
                } else if cache.is_quota_exhausted() {
                    cache.record_quota_check(now);
                }
                Err(error)
            }
        }
    }

    /// Tears the cache down at deactivation.
    pub fn deactivate(&self) {
        let mut cache = self.ctx.cache();
        cache.clear();
        if let Err(e) = cache.clear_persisted() {
            error!("Failed to remove persisted cache: {}", e);
        }
        info!("Annotation provider deactivated");
    }
}

fn find_binding(entry: &CacheEntry, source_text: &str) -> Option<Annotation> {
    entry
        .bindings
        .as_ref()?
        .iter()
        .find(|binding| binding.bound_text == source_text)
        .map(|binding| binding.annotation.clone())
}

/// Builds the annotation shown for an explained fragment.
pub fn build_annotation(explanation: &str, code: &str, config: &LensConfig) -> Annotation {
    let tooltip = if config.generated_by {
        format!("{}\n\n{}", explanation.trim_end(), ATTRIBUTION_FOOTER)
    } else {
        explanation.to_string()
    };

    Annotation {
        title: ANNOTATION_TITLE.to_string(),
        action_id: SHOW_EXPLANATION_COMMAND.to_string(),
        action_args: vec![tooltip.clone(), code.to_string()],
        tooltip,
    }
}

/// Re-anchored bindings plus a deferred annotation for every unbound fragment.
fn annotate_entry(entry: &CacheEntry, text: &str) -> Vec<AnchoredAnnotation> {
    let mut annotations = reanchor(entry.bindings.as_deref().unwrap_or_default(), text);
    if let Some(raw_blocks) = &entry.raw_blocks {
        let unbound = raw_blocks
            .iter()
            .filter(|block| !entry.is_bound(&block.source_text));
        annotations.extend(anchor_deferred(unbound, text));
        annotations.sort_by_key(|a| (a.line, a.column));
    }
    annotations
}

/// Anchors a fresh result at the rows the service reported.
fn anchor_fresh(
    blocks: &[ExplainedBlock],
    bindings: &[AnnotationBinding],
    text: &str,
) -> Vec<AnchoredAnnotation> {
    let index = LineIndex::new(text);
    blocks
        .iter()
        .filter_map(|block| {
            let line = block.start_row.checked_sub(1)?;
            if line >= index.line_count() {
                return None;
            }
            let line_end = index.line_len(line);
            let slot = match bindings.iter().find(|b| b.bound_text == block.code) {
                Some(binding) => AnnotationSlot::Ready(binding.annotation.clone()),
                None => AnnotationSlot::Deferred {
                    fragment_row: block.start_row,
                },
            };
            Some(AnchoredAnnotation {
                line,
                column: block.start_col.saturating_sub(1).min(line_end),
                line_end,
                slot,
            })
        })
        .collect()
}

fn place(mut annotations: Vec<AnchoredAnnotation>, config: &LensConfig) -> Vec<AnchoredAnnotation> {
    if config.zero_column {
        for annotation in &mut annotations {
            annotation.column = 0;
        }
    }
    annotations
}
