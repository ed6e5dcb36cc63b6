//! Cache manager for per-file annotation caching.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::{
    AnnotationBinding, CacheEntry, CacheError, CacheSnapshot, EntryUpdate, FileState, QuotaState,
};

/// Fixed name of the persisted blob inside the cache directory.
pub const CACHE_FILE_NAME: &str = "stenolens-cache.rkyv";

/// Proof that the holder owns the in-flight whole-document fetch for a file.
///
/// Invalidating or clearing the file revokes the ticket, so a result that
/// arrives afterwards is recognised as stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    key: String,
    id: u64,
}

impl FetchTicket {
    /// Cache key of the reserved file.
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Manages cached annotations for all files plus the quota state.
pub struct CacheManager {
    /// Per-file entries, keyed by path.
    entries: HashMap<String, CacheEntry>,
    /// Account-level quota backoff state.
    quota: QuotaState,
    /// Files with a reserved fetch, mapped to the owning ticket id.
    in_flight: HashMap<String, u64>,
    next_ticket: u64,
    /// Persisted blob location, if persistence is enabled.
    store: Option<PathBuf>,
}

impl CacheManager {
    /// Creates an in-memory cache manager.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            quota: QuotaState::default(),
            in_flight: HashMap::new(),
            next_ticket: 0,
            store: None,
        }
    }

    /// Creates a cache manager that writes its snapshot to `cache_dir` after
    /// every mutation.
    pub fn with_store(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            store: Some(cache_dir.into().join(CACHE_FILE_NAME)),
            ..Self::new()
        }
    }

    /// Location of the persisted blob, if any.
    pub fn store_path(&self) -> Option<&Path> {
        self.store.as_deref()
    }

    fn key(path: &Path) -> String {
        path.to_string_lossy().to_string()
    }

    /// Gets the cached entry for a file.
    pub fn get(&self, path: &Path) -> Option<&CacheEntry> {
        self.entries.get(&Self::key(path))
    }

    /// Returns the lifecycle state of a file.
    pub fn state(&self, path: &Path) -> FileState {
        let key = Self::key(path);
        match self.entries.get(&key) {
            None => FileState::Unseen,
            Some(_) if self.in_flight.contains_key(&key) => FileState::Fetching,
            Some(entry) if entry.bindings.is_some() => FileState::Bound,
            Some(_) => FileState::Invalidated,
        }
    }

    /// Upserts an entry, replacing only the slots present in `update`.
    pub fn put(&mut self, path: &Path, update: EntryUpdate) {
        let entry = self.entries.entry(Self::key(path)).or_default();
        update.apply(entry);
        self.persist();
    }

    /// Clears both slots of a file's entry.
    ///
    /// The key is kept so an invalidated file stays distinguishable from one
    /// that was never seen. Any in-flight fetch for the file becomes stale.
    pub fn invalidate(&mut self, path: &Path) {
        let key = Self::key(path);
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.raw_blocks = None;
            entry.bindings = None;
            debug!("Invalidated cache entry for {}", key);
        }
        self.in_flight.remove(&key);
        self.persist();
    }

    /// Reserves the whole-document fetch for a file.
    ///
    /// Succeeds only while the file's bindings are absent; the bindings are
    /// then set to the empty sentinel. `None` means a fetch is already in
    /// flight or the bindings are still valid, and the caller must not issue
    /// another request.
    pub fn reserve_fetch(&mut self, path: &Path) -> Option<FetchTicket> {
        let key = Self::key(path);
        let entry = self.entries.entry(key.clone()).or_default();
        if entry.bindings.is_some() {
            debug!("Fetch for {} already reserved or bound", key);
            return None;
        }
        entry.bindings = Some(Vec::new());

        let id = self.next_ticket;
        self.next_ticket += 1;
        self.in_flight.insert(key.clone(), id);
        self.persist();

        Some(FetchTicket { key, id })
    }

    fn owns(&self, ticket: &FetchTicket) -> bool {
        self.in_flight.get(&ticket.key) == Some(&ticket.id)
    }

    /// Stores the result of a reserved fetch.
    ///
    /// Returns false and discards the result if the ticket was revoked.
    pub fn complete_fetch(&mut self, ticket: &FetchTicket, update: EntryUpdate) -> bool {
        if !self.owns(ticket) {
            debug!("Discarding stale fetch result for {}", ticket.key);
            return false;
        }
        self.in_flight.remove(&ticket.key);
        let entry = self.entries.entry(ticket.key.clone()).or_default();
        update.apply(entry);
        self.persist();
        true
    }

    /// Releases a reserved fetch that failed, leaving the file invalidated.
    pub fn abort_fetch(&mut self, ticket: &FetchTicket) -> bool {
        if !self.owns(ticket) {
            return false;
        }
        self.in_flight.remove(&ticket.key);
        if let Some(entry) = self.entries.get_mut(&ticket.key) {
            entry.raw_blocks = None;
            entry.bindings = None;
        }
        self.persist();
        true
    }

    /// Adds a binding to a file whose bindings are trusted.
    ///
    /// A binding for the same text replaces the previous one. Returns false
    /// if the file has no trusted bindings.
    pub fn bind(&mut self, path: &Path, binding: AnnotationBinding) -> bool {
        let key = Self::key(path);
        if self.in_flight.contains_key(&key) {
            return false;
        }
        let Some(bindings) = self
            .entries
            .get_mut(&key)
            .and_then(|entry| entry.bindings.as_mut())
        else {
            return false;
        };

        match bindings
            .iter_mut()
            .find(|existing| existing.bound_text == binding.bound_text)
        {
            Some(existing) => *existing = binding,
            None => bindings.push(binding),
        }
        self.persist();
        true
    }

    /// Returns the quota state.
    pub fn quota(&self) -> QuotaState {
        self.quota
    }

    /// Returns whether new whole-document fetches are gated by the quota.
    pub fn is_quota_exhausted(&self) -> bool {
        self.quota.exhausted
    }

    /// Flags the quota as exhausted as of `now`.
    pub fn record_quota_exhausted(&mut self, now: u64) {
        info!("Invocation quota exhausted; pausing new fetches");
        self.quota = QuotaState {
            exhausted: true,
            last_checked_at: now,
        };
        self.persist();
    }

    /// Records a failed probe, keeping the flag set.
    pub fn record_quota_check(&mut self, now: u64) {
        self.quota.last_checked_at = now;
        self.persist();
    }

    /// Makes the next quota check due immediately, keeping the flag set.
    pub fn expedite_quota_check(&mut self) {
        if self.quota.exhausted {
            self.quota.last_checked_at = 0;
            self.persist();
        }
    }

    /// Clears the quota flag after a successful probe.
    pub fn clear_quota_exhausted(&mut self, now: u64) {
        self.quota = QuotaState {
            exhausted: false,
            last_checked_at: now,
        };
        self.persist();
    }

    /// Returns true while any whole-document fetch is in flight.
    pub fn is_processing(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Clears all entries, reservations and quota state.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.in_flight.clear();
        self.quota = QuotaState::default();
        self.persist();
    }

    /// Returns the number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Captures the current state.
    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            entries: self.entries.clone(),
            quota: self.quota,
            processing: self.is_processing(),
        }
    }

    fn persist(&self) {
        if let Err(e) = self.save() {
            error!("Failed to persist annotation cache: {}", e);
        }
    }

    /// Loads the persisted snapshot, if one exists.
    ///
    /// Reservations do not survive a reload: entries left holding only the
    /// in-flight sentinel are invalidated.
    pub fn load(&mut self) -> Result<(), CacheError> {
        let Some(cache_file) = &self.store else {
            return Ok(());
        };

        if !cache_file.exists() {
            debug!("No cache file found at {}", cache_file.display());
            return Ok(());
        }

        let content = fs::read(cache_file)?;
        let snapshot: CacheSnapshot = rkyv::from_bytes::<_, rkyv::rancor::Error>(&content)
            .map_err(|e| CacheError::corrupted(e.to_string()))?;

        self.entries = snapshot.entries;
        self.quota = snapshot.quota;
        self.in_flight.clear();

        if snapshot.processing {
            for entry in self.entries.values_mut() {
                let reserved_only = entry.raw_blocks.is_none()
                    && entry.bindings.as_ref().is_some_and(Vec::is_empty);
                if reserved_only {
                    entry.bindings = None;
                }
            }
        }

        info!("Loaded {} cache entries", self.entries.len());
        Ok(())
    }

    /// Writes the snapshot to disk. No-op without a store.
    pub fn save(&self) -> Result<(), CacheError> {
        let Some(cache_file) = &self.store else {
            return Ok(());
        };

        if let Some(dir) = cache_file.parent() {
            fs::create_dir_all(dir)?;
        }

        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&self.snapshot())
            .map_err(|e| CacheError::serialization(e.to_string()))?;
        fs::write(cache_file, bytes)?;

        debug!(
            "Saved {} cache entries to {}",
            self.entries.len(),
            cache_file.display()
        );
        Ok(())
    }

    /// Removes the persisted blob.
    pub fn clear_persisted(&self) -> Result<(), CacheError> {
        if let Some(cache_file) = &self.store
            && cache_file.exists()
        {
            fs::remove_file(cache_file)?;
            info!("Removed cache file {}", cache_file.display());
        }
        Ok(())
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new()
    }
}
