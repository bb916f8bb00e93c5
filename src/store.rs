//! Client-side authoritative cell state.
//!
//! Every mutation marks its key dirty and bumps a per-cell revision. The
//! revision lets the sync engine tell whether a cell was edited again while a
//! request carrying an older snapshot was in flight.

use crate::calendar::MonthContext;
use crate::catalog::{ActivityKey, ActivityKind, Catalog};
use crate::errors::StoreError;
use crate::models::{ActivityRecord, CellState};
use chrono::Datelike;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Cell state captured just before an interactive edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub state: CellState,
    /// The cell already held an unsynced edit before this one.
    pub was_dirty: bool,
}

/// An interactive edit as captured in the same critical section that made it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEdit {
    pub previous: Checkpoint,
    pub record: ActivityRecord,
    /// Revision the edit produced; a later edit to the key supersedes it.
    pub revision: u64,
}

/// A dirty cell as captured for submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCell {
    pub state: CellState,
    pub revision: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HydrateReport {
    pub applied: usize,
    /// Records dropped because the local cell holds an unsynced edit.
    pub conflicts: Vec<ActivityKey>,
    /// Records dated outside the active month.
    pub ignored: usize,
}

pub struct LocalActivityStore {
    catalog: Arc<Catalog>,
    month: MonthContext,
    cells: HashMap<ActivityKey, CellState>,
    dirty: HashSet<ActivityKey>,
    revisions: HashMap<ActivityKey, u64>,
    next_revision: u64,
}

impl LocalActivityStore {
    pub fn new(catalog: Arc<Catalog>, month: MonthContext) -> Self {
        Self {
            catalog,
            month,
            cells: HashMap::new(),
            dirty: HashSet::new(),
            revisions: HashMap::new(),
            next_revision: 0,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn month(&self) -> MonthContext {
        self.month
    }

    /// Absent cells read as unchecked.
    pub fn cell(&self, key: &ActivityKey) -> CellState {
        self.cells.get(key).copied().unwrap_or_default()
    }

    pub fn cells(&self) -> BTreeMap<ActivityKey, CellState> {
        self.cells
            .iter()
            .map(|(key, state)| (key.clone(), *state))
            .collect()
    }

    pub fn is_dirty(&self, key: &ActivityKey) -> bool {
        self.dirty.contains(key)
    }

    pub fn dirty_len(&self) -> usize {
        self.dirty.len()
    }

    pub fn dirty_keys(&self) -> Vec<ActivityKey> {
        let mut keys: Vec<ActivityKey> = self.dirty.iter().cloned().collect();
        keys.sort();
        keys
    }

    /// 0 for cells never touched since the store was created.
    pub fn revision(&self, key: &ActivityKey) -> u64 {
        self.revisions.get(key).copied().unwrap_or(0)
    }

    pub fn toggle_boolean(&mut self, key: &ActivityKey) -> Result<CellState, StoreError> {
        if self.catalog.classify(key.name()) != ActivityKind::Boolean {
            return Err(StoreError::InvalidKind {
                name: key.name().to_string(),
                expected: ActivityKind::Boolean,
            });
        }
        self.check_day(key)?;

        let next = CellState::checked(!self.cell(key).completed);
        self.write(key, next);
        Ok(next)
    }

    /// Out-of-range input is clamped, never rejected.
    pub fn set_numeric(&mut self, key: &ActivityKey, raw: &str) -> Result<CellState, StoreError> {
        let Some((min, max)) = self.catalog.bounds(key.name()) else {
            return Err(StoreError::InvalidKind {
                name: key.name().to_string(),
                expected: ActivityKind::Numeric,
            });
        };
        self.check_day(key)?;

        let parsed = parse_int_prefix(raw).unwrap_or(0);
        let value = parsed.clamp(i64::from(min), i64::from(max)) as i32;
        if i64::from(value) != parsed {
            debug!(key = %key, raw, value, "numeric input clamped");
        }

        let next = CellState::count(value);
        self.write(key, next);
        Ok(next)
    }

    /// Replaces clean cells with the server's view of `month`.
    ///
    /// Dirty cells are left untouched and any record aimed at one is dropped.
    /// Switching to another month is refused while anything is dirty.
    pub fn hydrate(
        &mut self,
        records: &[ActivityRecord],
        month: MonthContext,
    ) -> Result<HydrateReport, StoreError> {
        if month != self.month {
            if !self.dirty.is_empty() {
                return Err(StoreError::UnsyncedChanges {
                    count: self.dirty.len(),
                });
            }
            self.month = month;
        }

        let dirty = &self.dirty;
        self.cells.retain(|key, _| dirty.contains(key));
        for definition in self.catalog.definitions() {
            for day in 1..=month.days_in_month() {
                let key = ActivityKey::new(definition.name.clone(), day);
                if !dirty.contains(&key) {
                    self.cells.insert(key, CellState::default());
                }
            }
        }

        let mut report = HydrateReport::default();
        for record in records {
            if !month.contains(record.date) {
                report.ignored += 1;
                continue;
            }
            let key = ActivityKey::new(record.name.clone(), record.date.day());
            if self.dirty.contains(&key) {
                debug!(key = %key, "reload conflict, keeping unsynced local edit");
                report.conflicts.push(key);
                continue;
            }
            let state = self.normalize(record);
            self.cells.insert(key, state);
            report.applied += 1;
        }

        Ok(report)
    }

    /// Snapshot of every dirty cell; `dirty` itself is left as is.
    pub fn drain_dirty(&self) -> BTreeMap<ActivityKey, PendingCell> {
        self.dirty
            .iter()
            .map(|key| {
                let pending = PendingCell {
                    state: self.cell(key),
                    revision: self.revision(key),
                };
                (key.clone(), pending)
            })
            .collect()
    }

    pub fn clear_dirty<'a>(&mut self, keys: impl IntoIterator<Item = &'a ActivityKey>) {
        for key in keys {
            self.dirty.remove(key);
        }
    }

    /// Clears keys whose submitted snapshot is still current. Returns the
    /// keys that were edited again after the snapshot and stay dirty.
    pub fn clear_synced(&mut self, submitted: &BTreeMap<ActivityKey, PendingCell>) -> Vec<ActivityKey> {
        let mut superseded = Vec::new();
        for (key, pending) in submitted {
            if self.revision(key) == pending.revision {
                self.dirty.remove(key);
            } else if self.dirty.contains(key) {
                superseded.push(key.clone());
            }
        }
        superseded
    }

    pub fn checkpoint(&self, key: &ActivityKey) -> Checkpoint {
        Checkpoint {
            state: self.cell(key),
            was_dirty: self.is_dirty(key),
        }
    }

    /// Snapshot of the edit just applied to `key`, taken before the lock is
    /// released so a concurrent edit cannot slip in between.
    pub fn pending_edit(
        &self,
        key: &ActivityKey,
        previous: Checkpoint,
    ) -> Result<PendingEdit, StoreError> {
        let record = self
            .record(key, self.cell(key))
            .ok_or(StoreError::DayOutOfRange {
                day: key.day(),
                month: self.month,
            })?;
        Ok(PendingEdit {
            previous,
            record,
            revision: self.revision(key),
        })
    }

    /// Restores the checkpointed state. The key leaves `dirty` unless it
    /// was already dirty before the reverted edit.
    pub fn rollback(&mut self, key: &ActivityKey, previous: Checkpoint) {
        self.cells.insert(key.clone(), previous.state);
        if !previous.was_dirty {
            self.dirty.remove(key);
        }
        self.bump(key);
    }

    /// Wire record for `key` in the active month.
    pub fn record(&self, key: &ActivityKey, state: CellState) -> Option<ActivityRecord> {
        self.month
            .date_of(key.day())
            .map(|date| ActivityRecord::new(key.name(), date, state))
    }

    fn check_day(&self, key: &ActivityKey) -> Result<(), StoreError> {
        match self.month.date_of(key.day()) {
            Some(_) => Ok(()),
            None => Err(StoreError::DayOutOfRange {
                day: key.day(),
                month: self.month,
            }),
        }
    }

    fn write(&mut self, key: &ActivityKey, state: CellState) {
        self.cells.insert(key.clone(), state);
        self.dirty.insert(key.clone());
        self.bump(key);
    }

    fn bump(&mut self, key: &ActivityKey) {
        self.next_revision += 1;
        self.revisions.insert(key.clone(), self.next_revision);
    }

    fn normalize(&self, record: &ActivityRecord) -> CellState {
        match self.catalog.bounds(&record.name) {
            Some((min, max)) => match record.value {
                Some(value) => CellState::count(value.clamp(min, max)),
                None => CellState::default(),
            },
            None => CellState::checked(record.completed),
        }
    }
}

/// Leading-integer parse: optional whitespace and sign, then digits.
fn parse_int_prefix(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let mut seen = false;
    let mut value: i64 = 0;
    for byte in digits.bytes().take_while(u8::is_ascii_digit) {
        seen = true;
        value = value
            .saturating_mul(10)
            .saturating_add(i64::from(byte - b'0'));
    }

    seen.then(|| if negative { -value } else { value })
}
