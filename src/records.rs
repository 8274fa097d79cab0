//! Record Store and the refresh protocol.
//!
//! The store holds the last fetched record list and is replaced wholesale on
//! every refresh. Concurrent refreshes are not sequenced: whichever fetch
//! completes last wins.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::FixedOffset;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::error::ClientResult;
use crate::logging::{log, obj, ts_now, v_str, Domain, Level, TimedScope};
use crate::model::{Task, WageRecord};
use crate::mutation::{MutationLedger, MutationStatus, Snapshot};
use crate::names::{TaskNames, WorkerNames};
use crate::remote::RemoteStore;
use crate::view::{self, Table};

/// Locks `m`, recovering the data if a panicking thread poisoned it.
pub fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableState {
    /// Never fetched.
    Loading,
    Loaded,
    /// Held list is known to be behind the Remote Store.
    Stale,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct RecordStore {
    records: Vec<WageRecord>,
    state: TableState,
    refreshed_at: Option<String>,
    refreshes: u64,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            state: TableState::Loading,
            refreshed_at: None,
            refreshes: 0,
        }
    }

    pub fn records(&self) -> &[WageRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn state(&self) -> &TableState {
        &self.state
    }

    pub fn refreshed_at(&self) -> Option<&str> {
        self.refreshed_at.as_deref()
    }

    pub fn refreshes(&self) -> u64 {
        self.refreshes
    }

    pub fn get(&self, id: u64) -> Option<&WageRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Replaces the whole list. No merging.
    pub fn replace(&mut self, records: Vec<WageRecord>) {
        self.records = records;
        self.state = TableState::Loaded;
        self.refreshed_at = Some(ts_now());
        self.refreshes += 1;
    }

    /// Records the failure. The previously held list stays readable.
    pub fn fail(&mut self, reason: &str) {
        self.state = TableState::Failed(reason.to_string());
    }

    pub fn invalidate(&mut self) {
        if self.state == TableState::Loaded {
            self.state = TableState::Stale;
        }
    }

    /// Main table as it should currently be shown.
    pub fn table(&self, offset: FixedOffset) -> Table {
        match self.state {
            TableState::Failed(_) => view::render_load_error(),
            _ => view::render_table_at(&self.records, offset),
        }
    }
}

/// Shared client state: the Record Store, name caches and mutation ledger,
/// plus the read side of the Remote Store they are refreshed from.
#[derive(Clone)]
pub struct Workspace {
    pub remote: Arc<dyn RemoteStore>,
    pub records: Arc<Mutex<RecordStore>>,
    pub workers: Arc<Mutex<WorkerNames>>,
    pub tasks: Arc<Mutex<TaskNames>>,
    pub ledger: Arc<Mutex<MutationLedger>>,
    pub offset: FixedOffset,
}

fn log_settled(changed: &[(u64, MutationStatus)]) {
    for (id, status) in changed {
        let level = match status {
            MutationStatus::Unreflected => Level::Warn,
            _ => Level::Info,
        };
        log(
            level,
            Domain::Store,
            "mutation_reconciled",
            obj(&[("mutation_id", json!(id)), ("status", v_str(status.as_str()))]),
        );
    }
}

impl Workspace {
    pub fn new(remote: Arc<dyn RemoteStore>, workers: WorkerNames, tasks: TaskNames, offset: FixedOffset) -> Self {
        Self {
            remote,
            records: Arc::new(Mutex::new(RecordStore::new())),
            workers: Arc::new(Mutex::new(workers)),
            tasks: Arc::new(Mutex::new(tasks)),
            ledger: Arc::new(Mutex::new(MutationLedger::new())),
            offset,
        }
    }

    /// Fetches the full record list, replaces the store, folds names into the
    /// caches, and settles any sent writes the new list can speak for.
    pub async fn refresh(&self) -> ClientResult<Vec<WageRecord>> {
        let _scope = TimedScope::new(Domain::Store, "refresh");
        match self.remote.fetch_records().await {
            Ok(records) => {
                lock(&self.records).replace(records.clone());
                if let Err(err) = lock(&self.workers).merge_from_records(&records) {
                    log(
                        Level::Warn,
                        Domain::Names,
                        "persist_failed",
                        obj(&[("error", v_str(&err.to_string()))]),
                    );
                }
                lock(&self.tasks).merge_from_records(&records);
                let changed = lock(&self.ledger).reconcile(Snapshot::Records(&records), self.offset);
                log_settled(&changed);
                log(
                    Level::Info,
                    Domain::Store,
                    "refreshed",
                    obj(&[("records", json!(records.len())), ("settled", json!(changed.len()))]),
                );
                Ok(records)
            }
            Err(err) => {
                lock(&self.records).fail(&err.to_string());
                log(
                    Level::Error,
                    Domain::Store,
                    "refresh_failed",
                    obj(&[("error", v_str(&err.to_string()))]),
                );
                Err(err)
            }
        }
    }

    pub fn invalidate(&self) {
        lock(&self.records).invalidate();
    }

    /// Whether the store has held a fetched list at least once.
    pub fn is_loaded(&self) -> bool {
        matches!(lock(&self.records).state(), TableState::Loaded | TableState::Stale)
    }

    /// Copy of the current list.
    pub fn snapshot(&self) -> Vec<WageRecord> {
        lock(&self.records).records().to_vec()
    }

    pub fn table(&self) -> Table {
        lock(&self.records).table(self.offset)
    }

    /// Refresh after `delay`. Fire-and-forget: nothing cancels it.
    pub fn schedule_refresh(&self, delay: Duration, cause: &'static str) -> JoinHandle<ClientResult<Vec<WageRecord>>> {
        self.invalidate();
        log(
            Level::Debug,
            Domain::Store,
            "refresh_scheduled",
            obj(&[("cause", v_str(cause)), ("delay_ms", json!(delay.as_millis() as u64))]),
        );
        let ws = self.clone();
        tokio::spawn(async move {
            sleep(delay).await;
            ws.refresh().await
        })
    }

    /// Task list for the tasks panel. Settles task writes; does not touch the name cache.
    pub async fn load_tasks(&self) -> ClientResult<Vec<Task>> {
        match self.remote.fetch_tasks().await {
            Ok(tasks) => {
                let changed = lock(&self.ledger).reconcile(Snapshot::Tasks(&tasks), self.offset);
                log_settled(&changed);
                Ok(tasks)
            }
            Err(err) => {
                log(
                    Level::Error,
                    Domain::Store,
                    "load_tasks_failed",
                    obj(&[("error", v_str(&err.to_string()))]),
                );
                Err(err)
            }
        }
    }

    pub fn schedule_task_reload(&self, delay: Duration) -> JoinHandle<ClientResult<Vec<Task>>> {
        let ws = self.clone();
        tokio::spawn(async move {
            sleep(delay).await;
            ws.load_tasks().await
        })
    }

    /// Re-reads the worker list into the cache and settles worker writes.
    pub async fn reload_workers(&self) -> ClientResult<usize> {
        let workers = self.remote.fetch_workers().await?;
        let names: Vec<&str> = workers.iter().map(|w| w.name.as_str()).collect();
        let added = match lock(&self.workers).merge(names.iter().copied()) {
            Ok(n) => n,
            Err(err) => {
                log(
                    Level::Warn,
                    Domain::Names,
                    "persist_failed",
                    obj(&[("error", v_str(&err.to_string()))]),
                );
                0
            }
        };
        let changed = lock(&self.ledger).reconcile(Snapshot::Workers(&names), self.offset);
        log_settled(&changed);
        Ok(added)
    }

    pub fn worker_suggestions(&self) -> Vec<String> {
        lock(&self.workers).suggestions().into_iter().map(str::to_string).collect()
    }

    pub fn task_suggestions(&self) -> Vec<String> {
        lock(&self.tasks).suggestions().into_iter().map(str::to_string).collect()
    }

    pub fn mutation_status(&self, id: u64) -> Option<MutationStatus> {
        lock(&self.ledger).status(id)
    }
}
