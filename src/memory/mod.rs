//! Cross-shift site memory.
//!
//! Tracks, per site, which shifts saw the site with an open or escalated
//! issue. One [`SiteMemory`] instance owns the persisted mapping; concurrent
//! invocations share it behind an async mutex so the read-modify-write cycle
//! never interleaves. Occurrence recording is idempotent per
//! `(site, shift_id)` pair, so retried or cancelled runs can safely repeat it.

pub mod backend;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::AppError;

pub use backend::{MemoryBackend, RecordMap};

/// A site becomes "persistent" once seen in this many distinct shifts.
pub const PERSISTENCE_MIN_SHIFTS: usize = 2;

/// Per-site occurrence history. Created on first sighting, never deleted
/// by normal operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemoryRecord {
    pub site: String,
    /// Distinct shift ids in which the site appeared, in observation order.
    pub shifts: Vec<String>,
    pub last_seen: String,
    pub count: u64,
}

impl MemoryRecord {
    fn first(site: &str, shift_id: &str) -> Self {
        Self {
            site: site.to_string(),
            shifts: vec![shift_id.to_string()],
            last_seen: shift_id.to_string(),
            count: 1,
        }
    }

    /// Recurrence across shifts, not repetition within one.
    pub fn is_persistent(&self) -> bool {
        self.shifts.len() >= PERSISTENCE_MIN_SHIFTS
    }
}

/// Result of one check-and-record sweep.
#[derive(Debug, Clone, Default)]
pub struct MemorySweep {
    /// site -> is_persistent, for every site that was queried.
    pub sites: BTreeMap<String, bool>,
    /// Whether this sweep committed a write to the backend.
    pub wrote: bool,
    /// Set when the persisted store was corrupt and the run degraded to
    /// an empty in-memory mapping.
    pub degraded: Option<String>,
}

struct Inner {
    records: RecordMap,
    loaded: bool,
    /// A corrupt store flips this: the run proceeds in memory but the
    /// persisted file is never overwritten.
    read_only: bool,
    corrupt_detail: Option<String>,
    dirty: bool,
}

/// Durable site-recurrence store. Exclusively owns its backend; no other
/// component holds a live mutable reference to the mapping.
pub struct SiteMemory {
    backend: MemoryBackend,
    inner: Mutex<Inner>,
}

impl SiteMemory {
    pub fn new(backend: MemoryBackend) -> Self {
        Self {
            backend,
            inner: Mutex::new(Inner {
                records: RecordMap::new(),
                loaded: false,
                read_only: false,
                corrupt_detail: None,
                dirty: false,
            }),
        }
    }

    /// Snapshot of the current mapping (loading it first if needed).
    pub async fn load(&self) -> Result<RecordMap, AppError> {
        let mut inner = self.inner.lock().await;
        self.ensure_loaded(&mut inner);
        if let Some(detail) = &inner.corrupt_detail {
            return Err(AppError::MemoryCorrupt(detail.clone()));
        }
        Ok(inner.records.clone())
    }

    /// Record that `site` had a qualifying issue in `shift_id`.
    ///
    /// Idempotent per `(site, shift_id)`: a repeated call returns the record
    /// unchanged, never double-counts.
    pub async fn record_occurrence(
        &self,
        site: &str,
        shift_id: &str,
    ) -> Result<MemoryRecord, AppError> {
        let mut inner = self.inner.lock().await;
        self.ensure_loaded(&mut inner);
        Ok(Self::record_locked(&mut inner, site, shift_id))
    }

    /// Write the mapping back if anything changed. Returns whether a write
    /// happened. Skipped (with a warning) when the store loaded corrupt.
    pub async fn persist(&self) -> Result<bool, AppError> {
        let mut inner = self.inner.lock().await;
        self.persist_locked(&mut inner)
    }

    /// One atomic sweep for a shift: query + record every site, then persist.
    ///
    /// This is the `check_memory` tool's engine. The whole read-modify-write
    /// happens under one lock acquisition so concurrent shifts cannot
    /// interleave.
    pub async fn check_and_record(
        &self,
        sites: &[String],
        shift_id: &str,
    ) -> Result<MemorySweep, AppError> {
        let mut inner = self.inner.lock().await;
        self.ensure_loaded(&mut inner);

        let mut sweep = MemorySweep {
            degraded: inner.corrupt_detail.clone(),
            ..Default::default()
        };

        for site in sites {
            let site = site.trim();
            if site.is_empty() {
                continue;
            }
            let record = Self::record_locked(&mut inner, site, shift_id);
            sweep.sites.insert(site.to_string(), record.is_persistent());
        }

        sweep.wrote = self.persist_locked(&mut inner)?;
        debug!(
            shift_id,
            sites = sweep.sites.len(),
            wrote = sweep.wrote,
            "memory sweep complete"
        );
        Ok(sweep)
    }

    fn record_locked(inner: &mut Inner, site: &str, shift_id: &str) -> MemoryRecord {
        match inner.records.get_mut(site) {
            Some(record) => {
                if !record.shifts.iter().any(|s| s == shift_id) {
                    record.shifts.push(shift_id.to_string());
                    record.last_seen = shift_id.to_string();
                    record.count += 1;
                    inner.dirty = true;
                }
                record.clone()
            }
            None => {
                debug!(site, shift_id, "new site memory record");
                let record = MemoryRecord::first(site, shift_id);
                inner.records.insert(site.to_string(), record.clone());
                inner.dirty = true;
                record
            }
        }
    }

    fn ensure_loaded(&self, inner: &mut Inner) {
        if inner.loaded {
            return;
        }
        inner.loaded = true;
        match self.backend.load() {
            Ok(Some(records)) => inner.records = records,
            Ok(None) => {}
            Err(AppError::MemoryCorrupt(detail)) => {
                warn!(store = %self.backend.describe(), %detail, "memory store corrupt; degrading to empty mapping");
                inner.read_only = true;
                inner.corrupt_detail = Some(detail);
            }
            Err(e) => {
                // Unreadable for non-corruption reasons (permissions etc.) —
                // treat the same way: degrade, never clobber.
                warn!(store = %self.backend.describe(), error = %e, "memory store unreadable; degrading to empty mapping");
                inner.read_only = true;
                inner.corrupt_detail = Some(e.to_string());
            }
        }
    }

    fn persist_locked(&self, inner: &mut Inner) -> Result<bool, AppError> {
        if !inner.dirty {
            return Ok(false);
        }
        if inner.read_only {
            warn!(store = %self.backend.describe(), "skipping persist: store is read-only after corrupt load");
            return Ok(false);
        }
        self.backend.save(&inner.records)?;
        inner.dirty = false;
        Ok(true)
    }
}
