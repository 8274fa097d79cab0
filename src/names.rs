//! Worker and task name caches used for input suggestions.
//!
//! Worker names persist to local storage under `workerNames` and are never
//! removed. Task names live in memory only; removing one does not touch storage.

use std::collections::BTreeSet;

use anyhow::Result;
use serde_json::json;

use crate::logging::{log, obj, v_str, Domain, Level};
use crate::model::WageRecord;
use crate::remote::RemoteStore;
use crate::storage::LocalStorage;

pub const WORKER_NAMES_KEY: &str = "workerNames";

/// Case-sensitive set of trimmed, non-empty names, iterated in lexical order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NameSet {
    names: BTreeSet<String>,
}

impl NameSet {
    /// Returns true when the trimmed name was not present before.
    pub fn insert(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        self.names.insert(name.to_string())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name.trim())
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.names.remove(name.trim())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in ascending order, ready for a suggestion list.
    pub fn suggestions(&self) -> Vec<&str> {
        self.names.iter().map(String::as_str).collect()
    }

    /// Union; returns how many names were new.
    pub fn extend<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) -> usize {
        names.into_iter().filter(|n| self.insert(n)).count()
    }
}

pub struct WorkerNames {
    set: NameSet,
    storage: LocalStorage,
}

impl WorkerNames {
    /// Seed from local storage. Unreadable stored data is logged and ignored.
    pub fn load(storage: LocalStorage) -> Result<Self> {
        let mut set = NameSet::default();
        if let Some(raw) = storage.get_item(WORKER_NAMES_KEY)? {
            match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(saved) => {
                    set.extend(saved.iter().map(String::as_str));
                }
                Err(err) => log(
                    Level::Warn,
                    Domain::Names,
                    "stored_names_unreadable",
                    obj(&[("key", v_str(WORKER_NAMES_KEY)), ("error", v_str(&err.to_string()))]),
                ),
            }
        }
        Ok(Self { set, storage })
    }

    /// Reads the authoritative list from the Remote Store and unions it in.
    ///
    /// A failed read leaves the stored names in place.
    pub async fn load_and_merge(&mut self, remote: &dyn RemoteStore) -> Result<usize> {
        match remote.fetch_workers().await {
            Ok(workers) => self.merge(workers.iter().map(|w| w.name.as_str())),
            Err(err) => {
                log(
                    Level::Error,
                    Domain::Names,
                    "load_workers_failed",
                    obj(&[("error", v_str(&err.to_string()))]),
                );
                Ok(0)
            }
        }
    }

    /// Adds one name. Returns Ok(false) for blank or already-known names.
    pub fn add(&mut self, name: &str) -> Result<bool> {
        if !self.set.insert(name) {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    /// Union with `names`, persisting the full set.
    pub fn merge<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) -> Result<usize> {
        let added = self.set.extend(names);
        self.persist()?;
        if added > 0 {
            log(
                Level::Debug,
                Domain::Names,
                "workers_merged",
                obj(&[("added", json!(added)), ("total", json!(self.set.len()))]),
            );
        }
        Ok(added)
    }

    pub fn merge_from_records(&mut self, records: &[WageRecord]) -> Result<usize> {
        self.merge(records.iter().map(|r| r.worker_name.as_str()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.set.contains(name)
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn suggestions(&self) -> Vec<&str> {
        self.set.suggestions()
    }

    fn persist(&mut self) -> Result<()> {
        let encoded = serde_json::to_string(&self.set.suggestions())?;
        self.storage.set_item(WORKER_NAMES_KEY, &encoded)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskNames {
    set: NameSet,
}

impl TaskNames {
    pub async fn load_and_merge(&mut self, remote: &dyn RemoteStore) -> usize {
        match remote.fetch_tasks().await {
            Ok(tasks) => self.set.extend(tasks.iter().map(|t| t.name.as_str())),
            Err(err) => {
                log(
                    Level::Error,
                    Domain::Names,
                    "load_tasks_failed",
                    obj(&[("error", v_str(&err.to_string()))]),
                );
                0
            }
        }
    }

    pub fn add(&mut self, name: &str) -> bool {
        self.set.insert(name)
    }

    /// In-memory only. The name comes back on the next load if the store still lists it.
    pub fn remove(&mut self, name: &str) -> bool {
        self.set.remove(name)
    }

    pub fn merge_from_records(&mut self, records: &[WageRecord]) -> usize {
        self.set.extend(records.iter().map(|r| r.task_description.as_str()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.set.contains(name)
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn suggestions(&self) -> Vec<&str> {
        self.set.suggestions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryRemote, WriteChannel, WriteRequest};

    fn storage() -> LocalStorage {
        let mut s = LocalStorage::in_memory().unwrap();
        s.init().unwrap();
        s
    }

    #[test]
    fn test_trimmed_duplicates_do_not_grow_set() {
        let mut set = NameSet::default();
        assert!(set.insert("Asha"));
        assert!(!set.insert("  Asha "));
        assert!(!set.insert("   "));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_case_sensitive_sorted_suggestions() {
        let mut set = NameSet::default();
        set.extend(["ravi", "Asha", "Ravi", "bala"]);
        assert_eq!(set.suggestions(), vec!["Asha", "Ravi", "bala", "ravi"]);
    }

    #[test]
    fn test_worker_names_persist_as_json_list() {
        let mut workers = WorkerNames::load(storage()).unwrap();
        assert!(workers.add(" Ravi ").unwrap());
        assert!(workers.add("Asha").unwrap());
        assert!(!workers.add("Asha").unwrap());
        let raw = workers.storage.get_item(WORKER_NAMES_KEY).unwrap().unwrap();
        assert_eq!(raw, r#"["Asha","Ravi"]"#);
    }

    #[test]
    fn test_worker_names_reload_from_storage() {
        let mut s = storage();
        s.set_item(WORKER_NAMES_KEY, r#"["Meena","Asha"]"#).unwrap();
        let workers = WorkerNames::load(s).unwrap();
        assert_eq!(workers.suggestions(), vec!["Asha", "Meena"]);
    }

    #[test]
    fn test_corrupt_storage_starts_empty() {
        let mut s = storage();
        s.set_item(WORKER_NAMES_KEY, "not json").unwrap();
        let workers = WorkerNames::load(s).unwrap();
        assert!(workers.is_empty());
    }

    #[tokio::test]
    async fn test_load_and_merge_unions_remote_workers() {
        let remote = MemoryRemote::default();
        remote
            .send(&WriteRequest::AddWorker { worker_name: "Ravi".into() })
            .await
            .unwrap();
        let mut s = storage();
        s.set_item(WORKER_NAMES_KEY, r#"["Asha"]"#).unwrap();
        let mut workers = WorkerNames::load(s).unwrap();
        let added = workers.load_and_merge(&remote).await.unwrap();
        assert_eq!(added, 1);
        assert_eq!(workers.suggestions(), vec!["Asha", "Ravi"]);
    }

    #[tokio::test]
    async fn test_load_and_merge_keeps_local_on_failure() {
        let remote = MemoryRemote::default();
        remote.set_unreachable(true);
        let mut s = storage();
        s.set_item(WORKER_NAMES_KEY, r#"["Asha"]"#).unwrap();
        let mut workers = WorkerNames::load(s).unwrap();
        assert_eq!(workers.load_and_merge(&remote).await.unwrap(), 0);
        assert_eq!(workers.len(), 1);
    }

    #[test]
    fn test_task_removal_is_memory_only() {
        let mut tasks = TaskNames::default();
        tasks.add("Weeding");
        tasks.add("Harvest");
        assert!(tasks.remove("Weeding"));
        assert!(!tasks.contains("Weeding"));
        assert_eq!(tasks.len(), 1);
    }
}
