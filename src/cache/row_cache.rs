//! Row cache
//!
//! Process-lifetime, in-memory mirror of the external sheet tabs. Each
//! tab holds its full row list, a last-load timestamp, and a dirty index
//! of locally modified rows awaiting flush. Mutation is safe under
//! concurrent workers; flush and refresh take the tab exclusively so a
//! reload can never race a write-back.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::entities::{FieldPatch, RowId, SheetRow, Tab, base_domain};
use crate::domain::gateways::{SheetStore, StoreError};

/// Cache-level failure.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The sheet could not be read and no cached copy exists.
    #[error("sheet source unavailable: {0}")]
    SourceUnavailable(String),

    /// Some or all dirty rows could not be written; the listed rows
    /// remain dirty and a later flush may retry them.
    #[error("write-back failed for {} row(s)", failed_row_ids.len())]
    WriteFailed { failed_row_ids: Vec<RowId> },

    /// A patch referenced a row the cache does not hold.
    #[error("row '{row_id}' not found in tab '{tab}'")]
    RowNotFound { tab: Tab, row_id: RowId },
}

/// Snapshot of one tab's cache state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatus {
    pub row_count: usize,
    pub last_loaded_at: Option<DateTime<Utc>>,
    pub dirty_count: usize,
}

/// One tab's cached rows plus write-back bookkeeping.
struct CacheEntry {
    rows: Vec<SheetRow>,
    loaded_at: Instant,
    loaded_at_utc: DateTime<Utc>,
    /// Rows modified locally and not yet flushed.
    dirty: HashSet<RowId>,
    /// Subset of dirty rows that do not exist in the external store yet.
    appended: HashSet<RowId>,
}

impl CacheEntry {
    fn from_rows(rows: Vec<SheetRow>) -> Self {
        Self {
            rows,
            loaded_at: Instant::now(),
            loaded_at_utc: Utc::now(),
            dirty: HashSet::new(),
            appended: HashSet::new(),
        }
    }

    fn position(&self, row_id: &RowId) -> Option<usize> {
        self.rows.iter().position(|row| &row.id() == row_id)
    }
}

struct TabSlot {
    entry: Option<CacheEntry>,
}

/// Lock plus an exclusivity telltale per tab. The flag sits outside the
/// mutex so a locking bug between flush and refresh shows up as a
/// non-zero overlap count instead of silent row loss.
struct TabCell {
    slot: Mutex<TabSlot>,
    exclusive: AtomicBool,
}

impl TabCell {
    fn new() -> Self {
        Self {
            slot: Mutex::new(TabSlot { entry: None }),
            exclusive: AtomicBool::new(false),
        }
    }
}

/// In-memory mirror of the sheet tabs with dirty-row tracking.
///
/// Constructed explicitly and shared via `Arc`; lifecycle belongs to the
/// process entry point, not to a module-level singleton.
pub struct RowCache {
    store: Arc<dyn SheetStore>,
    ttl: Option<Duration>,
    sources: TabCell,
    leads: TabCell,
    searches: TabCell,
    overlaps: AtomicUsize,
}

impl RowCache {
    /// Creates a cache over a sheet store. `ttl` of `None` keeps each tab
    /// loaded for the process lifetime unless explicitly refreshed.
    pub fn new(store: Arc<dyn SheetStore>, ttl: Option<Duration>) -> Self {
        Self {
            store,
            ttl,
            sources: TabCell::new(),
            leads: TabCell::new(),
            searches: TabCell::new(),
            overlaps: AtomicUsize::new(0),
        }
    }

    fn cell(&self, tab: Tab) -> &TabCell {
        match tab {
            Tab::Sources => &self.sources,
            Tab::Leads => &self.leads,
            Tab::Searches => &self.searches,
        }
    }

    /// Times two exclusive operations were observed overlapping on one
    /// tab. Stays zero while the per-tab locking holds.
    #[must_use]
    pub fn exclusive_overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    /// Returns the tab's rows, loading them on first access or when the
    /// cached copy is older than the configured TTL.
    ///
    /// A failed reload falls back to the stale copy when one exists
    /// (logged as degraded); with no copy at all the batch cannot run and
    /// `SourceUnavailable` is returned.
    pub async fn get(&self, tab: Tab) -> Result<Vec<SheetRow>, CacheError> {
        let cell = self.cell(tab);
        let mut slot = cell.slot.lock().await;

        if let Some(entry) = &slot.entry {
            if !self.is_stale(entry) {
                return Ok(entry.rows.clone());
            }
            if !entry.dirty.is_empty() {
                // Reloading now would discard unflushed local writes.
                debug!("{} cache stale but dirty, serving cached copy", tab);
                return Ok(entry.rows.clone());
            }
        }

        match self.store.read_tab(tab).await {
            Ok(rows) => {
                info!("Loaded {} row(s) into {} cache", rows.len(), tab);
                slot.entry = Some(CacheEntry::from_rows(rows.clone()));
                Ok(rows)
            }
            Err(store_error) => match &slot.entry {
                Some(entry) => {
                    warn!(
                        "{} reload failed ({}), serving stale cached copy",
                        tab, store_error
                    );
                    Ok(entry.rows.clone())
                }
                None => Err(CacheError::SourceUnavailable(store_error.to_string())),
            },
        }
    }

    /// Forces a reload of one tab, replacing cached rows and clearing the
    /// dirty index. Concurrent readers see either the old or the new
    /// snapshot, never a partial merge.
    pub async fn refresh(&self, tab: Tab) -> Result<(), CacheError> {
        let cell = self.cell(tab);
        let mut slot = cell.slot.lock().await;
        let _guard = ExclusiveGuard::enter(cell, &self.overlaps);

        let rows = self
            .store
            .read_tab(tab)
            .await
            .map_err(|e| CacheError::SourceUnavailable(e.to_string()))?;
        let dropped = slot.entry.as_ref().map_or(0, |entry| entry.dirty.len());
        if dropped > 0 {
            warn!("{} refresh discarded {} unflushed row(s)", tab, dropped);
        }
        info!("Refreshed {} cache: {} row(s)", tab, rows.len());
        slot.entry = Some(CacheEntry::from_rows(rows));
        Ok(())
    }

    /// Refreshes every tab; the first failure aborts.
    pub async fn refresh_all(&self) -> Result<(), CacheError> {
        for tab in Tab::all() {
            self.refresh(tab).await?;
        }
        Ok(())
    }

    /// Applies a patch onto a cached row and records it dirty.
    ///
    /// Idempotent: applying the same patch twice leaves the row in the
    /// same state. Only rows that pass through here (or `append`) are
    /// ever flushed to the external store.
    pub async fn mark_dirty(
        &self,
        tab: Tab,
        row_id: &RowId,
        patch: &FieldPatch,
    ) -> Result<(), CacheError> {
        let cell = self.cell(tab);
        let mut slot = cell.slot.lock().await;
        let entry = self.ensure_loaded(tab, &mut slot).await?;

        let Some(position) = entry.position(row_id) else {
            return Err(CacheError::RowNotFound {
                tab,
                row_id: row_id.clone(),
            });
        };
        entry.rows[position].apply(patch);
        entry.dirty.insert(row_id.clone());
        Ok(())
    }

    /// Inserts a locally discovered row, recording it dirty-new.
    ///
    /// Returns `false` without inserting when a row with the same
    /// identity already exists. Sources and leads also dedupe on base
    /// domain, so two spellings of one site stay one row.
    pub async fn append(&self, tab: Tab, row: SheetRow) -> Result<bool, CacheError> {
        let cell = self.cell(tab);
        let mut slot = cell.slot.lock().await;
        let entry = self.ensure_loaded(tab, &mut slot).await?;

        let row_id = row.id();
        if entry.position(&row_id).is_some() {
            return Ok(false);
        }
        if tab != Tab::Searches {
            let candidate_domain = base_domain(row_id.as_str());
            let duplicate = entry
                .rows
                .iter()
                .any(|existing| base_domain(existing.id().as_str()) == candidate_domain);
            if duplicate {
                debug!("skipping duplicate {} row for domain {}", tab, candidate_domain);
                return Ok(false);
            }
        }

        entry.rows.push(row);
        entry.dirty.insert(row_id.clone());
        entry.appended.insert(row_id);
        Ok(true)
    }

    /// Writes all dirty rows of one tab back to the external store.
    ///
    /// Updated rows go out in one batched overwrite, locally created rows
    /// in one batched append. Rows that fail to write stay dirty for the
    /// next flush; the call is safe to repeat.
    pub async fn flush(&self, tab: Tab) -> Result<usize, CacheError> {
        let cell = self.cell(tab);
        let mut slot = cell.slot.lock().await;
        let _guard = ExclusiveGuard::enter(cell, &self.overlaps);

        let Some(entry) = slot.entry.as_mut() else {
            return Ok(0);
        };
        if entry.dirty.is_empty() {
            return Ok(0);
        }

        let mut updates = Vec::new();
        let mut update_ids = Vec::new();
        let mut appends = Vec::new();
        let mut append_ids = Vec::new();
        for row in &entry.rows {
            let row_id = row.id();
            if !entry.dirty.contains(&row_id) {
                continue;
            }
            if entry.appended.contains(&row_id) {
                appends.push(row.clone());
                append_ids.push(row_id);
            } else {
                updates.push(row.clone());
                update_ids.push(row_id);
            }
        }

        let mut written = 0usize;
        let mut failed: Vec<RowId> = Vec::new();

        if !updates.is_empty() {
            match self.store.write_rows(tab, &updates).await {
                Ok(()) => {
                    for row_id in &update_ids {
                        entry.dirty.remove(row_id);
                    }
                    written += update_ids.len();
                }
                Err(StoreError::PartialWrite { failed: rejected, detail }) => {
                    warn!("{} flush partially failed: {}", tab, detail);
                    for row_id in &update_ids {
                        if rejected.contains(row_id) {
                            failed.push(row_id.clone());
                        } else {
                            entry.dirty.remove(row_id);
                            written += 1;
                        }
                    }
                }
                Err(store_error) => {
                    warn!("{} flush failed: {}", tab, store_error);
                    failed.extend(update_ids.iter().cloned());
                }
            }
        }

        if !appends.is_empty() {
            match self.store.append_rows(tab, &appends).await {
                Ok(()) => {
                    for row_id in &append_ids {
                        entry.dirty.remove(row_id);
                        entry.appended.remove(row_id);
                    }
                    written += append_ids.len();
                }
                Err(store_error) => {
                    warn!("{} append flush failed: {}", tab, store_error);
                    failed.extend(append_ids.iter().cloned());
                }
            }
        }

        if failed.is_empty() {
            info!("Flushed {} row(s) to {}", written, tab);
            Ok(written)
        } else {
            Err(CacheError::WriteFailed {
                failed_row_ids: failed,
            })
        }
    }

    /// Cache state for one tab.
    pub async fn status(&self, tab: Tab) -> CacheStatus {
        let slot = self.cell(tab).slot.lock().await;
        match &slot.entry {
            Some(entry) => CacheStatus {
                row_count: entry.rows.len(),
                last_loaded_at: Some(entry.loaded_at_utc),
                dirty_count: entry.dirty.len(),
            },
            None => CacheStatus {
                row_count: 0,
                last_loaded_at: None,
                dirty_count: 0,
            },
        }
    }

    fn is_stale(&self, entry: &CacheEntry) -> bool {
        self.ttl
            .is_some_and(|max_age| entry.loaded_at.elapsed() > max_age)
    }

    /// Loads the tab into the locked slot when absent.
    async fn ensure_loaded<'slot>(
        &self,
        tab: Tab,
        slot: &'slot mut TabSlot,
    ) -> Result<&'slot mut CacheEntry, CacheError> {
        if slot.entry.is_none() {
            let rows = self
                .store
                .read_tab(tab)
                .await
                .map_err(|e| CacheError::SourceUnavailable(e.to_string()))?;
            info!("Loaded {} row(s) into {} cache", rows.len(), tab);
            slot.entry = Some(CacheEntry::from_rows(rows));
        }
        // The branch above fills the entry; this cannot fail afterwards.
        slot.entry
            .as_mut()
            .ok_or_else(|| CacheError::SourceUnavailable("cache entry vanished".to_string()))
    }
}

/// RAII telltale for the exclusive flush/refresh sections.
struct ExclusiveGuard<'cell> {
    flag: &'cell AtomicBool,
}

impl<'cell> ExclusiveGuard<'cell> {
    fn enter(cell: &'cell TabCell, overlaps: &AtomicUsize) -> Self {
        let was_active = cell.exclusive.swap(true, Ordering::SeqCst);
        if was_active {
            overlaps.fetch_add(1, Ordering::SeqCst);
        }
        Self {
            flag: &cell.exclusive,
        }
    }
}

impl Drop for ExclusiveGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
