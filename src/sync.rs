//! Pushes locally modified cells to the remote API and reconciles responses.
//!
//! The store lock is never held across a remote call. Decisions made after a
//! response (clear, roll back, keep dirty) compare the cell's revision with
//! the one captured when the request was built, so an edit made while the
//! request was in flight always survives.

use crate::calendar::MonthContext;
use crate::catalog::ActivityKey;
use crate::client::ActivityApi;
use crate::config::ClientConfig;
use crate::errors::SyncError;
use crate::models::CellState;
use crate::store::{HydrateReport, LocalActivityStore, PendingEdit};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub submitted: usize,
    /// Keys edited again while the batch was in flight; still dirty.
    pub superseded: Vec<ActivityKey>,
    pub reloaded: bool,
}

pub struct SyncEngine {
    store: Arc<Mutex<LocalActivityStore>>,
    api: Arc<dyn ActivityApi>,
}

impl SyncEngine {
    pub fn new(store: LocalActivityStore, api: Arc<dyn ActivityApi>) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            api,
        }
    }

    pub fn store(&self) -> Arc<Mutex<LocalActivityStore>> {
        Arc::clone(&self.store)
    }

    /// Optimistically toggles a boolean cell and persists it.
    pub async fn toggle(&self, key: &ActivityKey) -> Result<CellState, SyncError> {
        let edit = {
            let mut store = self.store.lock().await;
            let previous = store.checkpoint(key);
            store.toggle_boolean(key)?;
            store.pending_edit(key, previous)?
        };
        self.sync_one(key, edit).await
    }

    /// Optimistically sets a numeric cell and persists it.
    pub async fn set_value(&self, key: &ActivityKey, raw: &str) -> Result<CellState, SyncError> {
        let edit = {
            let mut store = self.store.lock().await;
            let previous = store.checkpoint(key);
            store.set_numeric(key, raw)?;
            store.pending_edit(key, previous)?
        };
        self.sync_one(key, edit).await
    }

    /// Persists a captured edit. The outcome is applied only while the edit
    /// is still the latest one for its key: success clears it, failure
    /// rolls it back. A superseded edit leaves the newer state alone.
    pub async fn sync_one(
        &self,
        key: &ActivityKey,
        edit: PendingEdit,
    ) -> Result<CellState, SyncError> {
        let outcome = self.api.save_activities(vec![edit.record]).await;

        let mut store = self.store.lock().await;
        let unchanged = store.revision(key) == edit.revision;
        match outcome {
            Ok(_) => {
                if unchanged {
                    store.clear_dirty([key]);
                    info!(key = %key, "activity saved");
                } else {
                    debug!(key = %key, "activity saved but edited again in flight, still dirty");
                }
                Ok(store.cell(key))
            }
            Err(err) => {
                if unchanged {
                    store.rollback(key, edit.previous);
                    warn!(key = %key, error = %err, "save failed, edit rolled back");
                } else {
                    warn!(key = %key, error = %err, "save failed, newer edit kept for next sync");
                }
                Err(err)
            }
        }
    }

    /// Submits every dirty cell in one request, then reloads the month.
    ///
    /// On failure nothing is cleared; the same cells go out on the next call.
    pub async fn sync_all(&self) -> Result<SyncReport, SyncError> {
        let (pending, records, month) = {
            let store = self.store.lock().await;
            let pending = store.drain_dirty();
            let records: Vec<_> = pending
                .iter()
                .filter_map(|(key, cell)| store.record(key, cell.state))
                .collect();
            (pending, records, store.month())
        };

        if pending.is_empty() {
            debug!("no modified activities to save");
            return Ok(SyncReport::default());
        }

        let submitted = records.len();
        if let Err(err) = self.api.save_activities(records).await {
            warn!(error = %err, pending = submitted, "batch save failed, cells stay dirty");
            return Err(err);
        }

        let superseded = self.store.lock().await.clear_synced(&pending);
        info!(submitted, superseded = superseded.len(), "batch save complete");

        let reloaded = match self.reload(month).await {
            Ok(_) => true,
            Err(err) => {
                warn!(error = %err, "reload after save failed");
                false
            }
        };

        Ok(SyncReport {
            submitted,
            superseded,
            reloaded,
        })
    }

    /// `sync_all` for timers and lifecycle hooks: failures are logged and
    /// left for the next tick.
    pub async fn auto_sync(&self) -> Result<SyncReport, SyncError> {
        let result = self.sync_all().await;
        match &result {
            Ok(report) if report.submitted > 0 => {
                info!(submitted = report.submitted, "auto-saved activities")
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "auto-save failed, will retry on next tick"),
        }
        result
    }

    /// Fetches `month` from the server and hydrates the store with it.
    pub async fn reload(&self, month: MonthContext) -> Result<HydrateReport, SyncError> {
        let records = self
            .api
            .load_activities(month.first_day(), month.last_day())
            .await?;
        let report = self.store.lock().await.hydrate(&records, month)?;
        debug!(
            month = %month,
            applied = report.applied,
            conflicts = report.conflicts.len(),
            "activities reloaded"
        );
        Ok(report)
    }

    /// Flushes unsynced edits of the current month, then loads `month`.
    /// The month is not switched if the flush fails.
    pub async fn change_month(&self, month: MonthContext) -> Result<HydrateReport, SyncError> {
        let current = self.store.lock().await.month();
        if current != month {
            self.sync_all().await?;
        }
        self.reload(month).await
    }
}

/// Background task calling [`SyncEngine::auto_sync`] on a fixed period.
pub struct AutoSync {
    handle: JoinHandle<()>,
}

impl AutoSync {
    pub fn spawn(engine: Arc<SyncEngine>, period: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let _ = engine.auto_sync().await;
            }
        });
        Self { handle }
    }

    /// Spawns with the configured auto-save period.
    pub fn from_config(engine: Arc<SyncEngine>, config: &ClientConfig) -> Self {
        Self::spawn(engine, config.autosync_interval)
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for AutoSync {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::errors::StoreError;
    use crate::models::{ActivityRecord, DashboardStats};
    use crate::stats::{StatsAggregator, ViewType};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Notify;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Failure {
        None,
        Network,
        Rejected,
    }

    struct FakeApi {
        failure: StdMutex<Failure>,
        saves: StdMutex<Vec<Vec<ActivityRecord>>>,
        log: StdMutex<Vec<ActivityRecord>>,
        gate: Option<(Notify, Notify)>,
    }

    impl FakeApi {
        fn new() -> Self {
            Self {
                failure: StdMutex::new(Failure::None),
                saves: StdMutex::new(Vec::new()),
                log: StdMutex::new(Vec::new()),
                gate: None,
            }
        }

        fn gated() -> Self {
            Self {
                gate: Some((Notify::new(), Notify::new())),
                ..Self::new()
            }
        }

        fn fail_with(&self, failure: Failure) {
            *self.failure.lock().unwrap() = failure;
        }

        fn save_calls(&self) -> Vec<Vec<ActivityRecord>> {
            self.saves.lock().unwrap().clone()
        }

        fn seed(&self, record: ActivityRecord) {
            self.log.lock().unwrap().push(record);
        }

        async fn wait_entered(&self) {
            if let Some((entered, _)) = &self.gate {
                entered.notified().await;
            }
        }

        fn release(&self) {
            if let Some((_, release)) = &self.gate {
                release.notify_one();
            }
        }
    }

    #[async_trait]
    impl ActivityApi for FakeApi {
        async fn load_activities(
            &self,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<ActivityRecord>, SyncError> {
            Ok(self
                .log
                .lock()
                .unwrap()
                .iter()
                .filter(|record| start <= record.date && record.date <= end)
                .cloned()
                .collect())
        }

        async fn save_activities(
            &self,
            activities: Vec<ActivityRecord>,
        ) -> Result<Vec<ActivityRecord>, SyncError> {
            self.saves.lock().unwrap().push(activities.clone());
            if let Some((entered, release)) = &self.gate {
                entered.notify_one();
                release.notified().await;
            }
            match *self.failure.lock().unwrap() {
                Failure::Network => return Err(SyncError::Network("connection refused".into())),
                Failure::Rejected => return Err(SyncError::ServerRejected("database down".into())),
                Failure::None => {}
            }
            let mut log = self.log.lock().unwrap();
            for record in &activities {
                log.retain(|existing| !(existing.name == record.name && existing.date == record.date));
                log.push(record.clone());
            }
            Ok(activities)
        }

        async fn dashboard_stats(
            &self,
            view: ViewType,
            month: MonthContext,
        ) -> Result<DashboardStats, SyncError> {
            let records = self.log.lock().unwrap().clone();
            let stats = StatsAggregator::new(Catalog::standard()).compute_stats(&records, month, view);
            Ok(DashboardStats::from(&stats))
        }
    }

    fn month() -> MonthContext {
        MonthContext::new(3, 2025).unwrap()
    }

    fn engine(api: Arc<FakeApi>) -> SyncEngine {
        SyncEngine::new(LocalActivityStore::new(Catalog::standard(), month()), api)
    }

    fn march(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    #[tokio::test]
    async fn toggle_saves_single_record_and_cleans() {
        let api = Arc::new(FakeApi::new());
        let engine = engine(api.clone());
        let key = ActivityKey::new("Subuh", 2);

        let state = engine.toggle(&key).await.unwrap();

        assert!(state.completed);
        let saves = api.save_calls();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0], vec![ActivityRecord::new("Subuh", march(2), state)]);
        let store = engine.store();
        let store = store.lock().await;
        assert!(!store.is_dirty(&key));
        assert!(store.cell(&key).completed);
    }

    #[tokio::test]
    async fn network_failure_rolls_back_single_edit() {
        let api = Arc::new(FakeApi::new());
        api.fail_with(Failure::Network);
        let engine = engine(api.clone());
        let key = ActivityKey::new("Rowatib", 4);

        let err = engine.set_value(&key, "8").await.unwrap_err();

        assert!(matches!(err, SyncError::Network(_)));
        assert!(err.is_recoverable());
        let store = engine.store();
        let store = store.lock().await;
        assert_eq!(store.cell(&key), CellState::default());
        assert!(!store.is_dirty(&key));
    }

    #[tokio::test]
    async fn invalid_kind_fails_before_any_request() {
        let api = Arc::new(FakeApi::new());
        let engine = engine(api.clone());

        let err = engine.toggle(&ActivityKey::new("Tilawah Qur'an", 1)).await.unwrap_err();

        assert!(matches!(err, SyncError::Store(StoreError::InvalidKind { .. })));
        assert!(!err.is_recoverable());
        assert!(api.save_calls().is_empty());
    }

    #[tokio::test]
    async fn rejected_batch_keeps_every_cell_dirty() {
        let api = Arc::new(FakeApi::new());
        api.fail_with(Failure::Rejected);
        let engine = engine(api.clone());
        let keys = [
            ActivityKey::new("Subuh", 1),
            ActivityKey::new("Dhuha", 1),
            ActivityKey::new("Tilawah Qur'an", 1),
        ];
        let before = {
            let store = engine.store();
            let mut store = store.lock().await;
            store.toggle_boolean(&keys[0]).unwrap();
            store.toggle_boolean(&keys[1]).unwrap();
            store.set_numeric(&keys[2], "3").unwrap();
            store.cells()
        };

        let err = engine.sync_all().await.unwrap_err();

        assert!(matches!(err, SyncError::ServerRejected(_)));
        assert_eq!(api.save_calls().len(), 1);
        assert_eq!(api.save_calls()[0].len(), 3);
        let store = engine.store();
        let store = store.lock().await;
        assert_eq!(store.dirty_keys().len(), 3);
        assert_eq!(store.cells(), before);
    }

    #[tokio::test]
    async fn batch_success_clears_and_reloads() {
        let api = Arc::new(FakeApi::new());
        api.seed(ActivityRecord::new("Isya", march(9), CellState::checked(true)));
        let engine = engine(api.clone());
        {
            let store = engine.store();
            let mut store = store.lock().await;
            store.toggle_boolean(&ActivityKey::new("Subuh", 1)).unwrap();
            store.set_numeric(&ActivityKey::new("Rowatib", 1), "15").unwrap();
        }

        let report = engine.sync_all().await.unwrap();

        assert_eq!(report.submitted, 2);
        assert!(report.reloaded);
        assert!(report.superseded.is_empty());
        let store = engine.store();
        let store = store.lock().await;
        assert_eq!(store.dirty_len(), 0);
        assert!(store.cell(&ActivityKey::new("Isya", 9)).completed);
        assert_eq!(store.cell(&ActivityKey::new("Rowatib", 1)), CellState::count(12));
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let api = Arc::new(FakeApi::new());
        let engine = engine(api.clone());

        let report = engine.sync_all().await.unwrap();

        assert_eq!(report, SyncReport::default());
        assert!(api.save_calls().is_empty());
    }

    #[tokio::test]
    async fn edit_during_flight_survives_success() {
        let api = Arc::new(FakeApi::gated());
        let engine = Arc::new(engine(api.clone()));
        let key = ActivityKey::new("Dhuha", 6);

        let task = {
            let engine = Arc::clone(&engine);
            let key = key.clone();
            tokio::spawn(async move { engine.toggle(&key).await })
        };
        api.wait_entered().await;
        engine.store().lock().await.toggle_boolean(&key).unwrap();
        api.release();
        task.await.unwrap().unwrap();

        let store = engine.store();
        let store = store.lock().await;
        assert!(store.is_dirty(&key));
        assert!(!store.cell(&key).completed);
    }

    #[tokio::test]
    async fn edit_during_flight_is_not_rolled_back() {
        let api = Arc::new(FakeApi::gated());
        api.fail_with(Failure::Network);
        let engine = Arc::new(engine(api.clone()));
        let key = ActivityKey::new("Rowatib", 6);

        let task = {
            let engine = Arc::clone(&engine);
            let key = key.clone();
            tokio::spawn(async move { engine.set_value(&key, "4").await })
        };
        api.wait_entered().await;
        engine.store().lock().await.set_numeric(&key, "10").unwrap();
        api.release();
        assert!(task.await.unwrap().is_err());

        let store = engine.store();
        let store = store.lock().await;
        assert!(store.is_dirty(&key));
        assert_eq!(store.cell(&key), CellState::count(10));
    }

    #[tokio::test]
    async fn stale_failure_does_not_undo_newer_saved_edit() {
        let api = Arc::new(FakeApi::new());
        let engine = engine(api.clone());
        let key = ActivityKey::new("Rowatib", 7);

        let (first, second) = {
            let store = engine.store();
            let mut store = store.lock().await;
            let before_first = store.checkpoint(&key);
            store.set_numeric(&key, "4").unwrap();
            let first = store.pending_edit(&key, before_first).unwrap();
            let before_second = store.checkpoint(&key);
            store.set_numeric(&key, "8").unwrap();
            let second = store.pending_edit(&key, before_second).unwrap();
            (first, second)
        };
        assert_eq!(first.record.value, Some(4));
        assert_eq!(second.record.value, Some(8));

        let saved = engine.sync_one(&key, second).await.unwrap();
        assert_eq!(saved, CellState::count(8));

        api.fail_with(Failure::Network);
        assert!(engine.sync_one(&key, first).await.is_err());

        let stored = api.load_activities(march(7), march(7)).await.unwrap();
        assert_eq!(stored[0].value, Some(8));
        let store = engine.store();
        let store = store.lock().await;
        assert_eq!(store.cell(&key), CellState::count(8));
        assert!(!store.is_dirty(&key));
    }

    #[tokio::test]
    async fn stale_success_keeps_newer_edit_dirty() {
        let api = Arc::new(FakeApi::new());
        let engine = engine(api.clone());
        let key = ActivityKey::new("Subuh", 8);

        let first = {
            let store = engine.store();
            let mut store = store.lock().await;
            let previous = store.checkpoint(&key);
            store.toggle_boolean(&key).unwrap();
            let first = store.pending_edit(&key, previous).unwrap();
            store.toggle_boolean(&key).unwrap();
            first
        };

        engine.sync_one(&key, first).await.unwrap();

        let store = engine.store();
        let store = store.lock().await;
        assert!(store.is_dirty(&key));
        assert!(!store.cell(&key).completed);
    }

    #[tokio::test]
    async fn change_month_flushes_then_switches() {
        let api = Arc::new(FakeApi::new());
        let engine = engine(api.clone());
        engine
            .store()
            .lock()
            .await
            .toggle_boolean(&ActivityKey::new("Puasa", 31))
            .unwrap();

        let april = MonthContext::new(4, 2025).unwrap();
        engine.change_month(april).await.unwrap();

        assert_eq!(api.save_calls().len(), 1);
        let store = engine.store();
        let store = store.lock().await;
        assert_eq!(store.month(), april);
        assert_eq!(store.dirty_len(), 0);
    }

    #[tokio::test]
    async fn change_month_refused_when_flush_fails() {
        let api = Arc::new(FakeApi::new());
        api.fail_with(Failure::Network);
        let engine = engine(api.clone());
        engine
            .store()
            .lock()
            .await
            .toggle_boolean(&ActivityKey::new("Puasa", 31))
            .unwrap();

        let april = MonthContext::new(4, 2025).unwrap();
        assert!(engine.change_month(april).await.is_err());

        let store = engine.store();
        let store = store.lock().await;
        assert_eq!(store.month(), month());
        assert_eq!(store.dirty_len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_sync_runs_on_each_tick() {
        let api = Arc::new(FakeApi::new());
        let engine = Arc::new(engine(api.clone()));
        engine
            .store()
            .lock()
            .await
            .toggle_boolean(&ActivityKey::new("Ashar", 3))
            .unwrap();

        let auto = AutoSync::spawn(Arc::clone(&engine), Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(31)).await;
        auto.stop();

        assert_eq!(api.save_calls().len(), 1);
        assert_eq!(engine.store().lock().await.dirty_len(), 0);
    }
}
