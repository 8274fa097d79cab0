//! In-process Remote Store.
//!
//! Backs the shell's demo mode and the test suite. Applies writes the way
//! the script endpoint does, and can be told to drop writes silently or to fail
//! every call at the transport level.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{ClientError, ClientResult};
use crate::logging::{log_remote_write, params_hash};
use crate::model::{AuthReply, NewWage, Task, WageRecord, WorkerEntry};
use crate::records::lock;
use crate::remote::{AuthRequest, RemoteStore, WriteAck, WriteChannel, WriteRequest};

#[derive(Debug, Clone)]
struct Account {
    password: String,
    full_name: String,
    user_id: u64,
}

#[derive(Debug, Default)]
struct Sheet {
    records: Vec<WageRecord>,
    workers: Vec<String>,
    tasks: Vec<Task>,
    accounts: HashMap<String, Account>,
    next_id: u64,
    next_task_id: u64,
    next_user_id: u64,
}

#[derive(Debug)]
pub struct MemoryRemote {
    sheet: Mutex<Sheet>,
    registration_pin: String,
    drop_writes: AtomicBool,
    unreachable: AtomicBool,
    acknowledging: AtomicBool,
    sent: Mutex<Vec<WriteRequest>>,
    record_reads: AtomicUsize,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new("0000")
    }
}

fn to_record(id: u64, wage: &NewWage) -> WageRecord {
    WageRecord {
        id,
        date: wage.date().to_string(),
        worker_name: wage.worker_name().to_string(),
        task_description: wage.task_description().to_string(),
        hours_worked: wage.hours_worked(),
        wage_rate: wage.wage_rate(),
        total_wage: wage.total_wage(),
    }
}

impl MemoryRemote {
    pub fn new(registration_pin: &str) -> Self {
        Self {
            sheet: Mutex::new(Sheet {
                next_id: 1,
                next_task_id: 1,
                next_user_id: 1,
                ..Sheet::default()
            }),
            registration_pin: registration_pin.to_string(),
            drop_writes: AtomicBool::new(false),
            unreachable: AtomicBool::new(false),
            acknowledging: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            record_reads: AtomicUsize::new(0),
        }
    }

    /// Accept writes but never apply them.
    pub fn set_drop_writes(&self, on: bool) {
        self.drop_writes.store(on, Ordering::SeqCst);
    }

    /// Fail every call with a transport error.
    pub fn set_unreachable(&self, on: bool) {
        self.unreachable.store(on, Ordering::SeqCst);
    }

    /// Answer writes with `WriteAck::Confirmed` instead of an opaque reply.
    pub fn set_acknowledging(&self, on: bool) {
        self.acknowledging.store(on, Ordering::SeqCst);
    }

    pub fn seed_record(&self, wage: &NewWage) -> u64 {
        let mut sheet = self.lock_sheet();
        let id = sheet.next_id;
        sheet.next_id += 1;
        sheet.records.push(to_record(id, wage));
        id
    }

    pub fn seed_task(&self, name: &str) -> u64 {
        let mut sheet = self.lock_sheet();
        let id = sheet.next_task_id;
        sheet.next_task_id += 1;
        sheet.tasks.push(Task {
            id,
            name: name.to_string(),
            times_used: 0.0,
            last_used_date: None,
        });
        id
    }

    pub fn seed_account(&self, username: &str, password: &str, full_name: &str) {
        let mut sheet = self.lock_sheet();
        let user_id = sheet.next_user_id;
        sheet.next_user_id += 1;
        sheet.accounts.insert(
            username.to_string(),
            Account {
                password: password.to_string(),
                full_name: full_name.to_string(),
                user_id,
            },
        );
    }

    /// Writes received so far, applied or not.
    pub fn sent(&self) -> Vec<WriteRequest> {
        lock(&self.sent).clone()
    }

    pub fn record_count(&self) -> usize {
        self.lock_sheet().records.len()
    }

    pub fn record_reads(&self) -> usize {
        self.record_reads.load(Ordering::SeqCst)
    }

    fn lock_sheet(&self) -> MutexGuard<'_, Sheet> {
        lock(&self.sheet)
    }

    fn check_reachable(&self, action: &str) -> ClientResult<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ClientError::transport(action, "endpoint unreachable"));
        }
        Ok(())
    }

    fn apply(&self, req: &WriteRequest) {
        let mut sheet = self.lock_sheet();
        match req {
            WriteRequest::Create(wage) => {
                let id = sheet.next_id;
                sheet.next_id += 1;
                sheet.records.push(to_record(id, wage));
            }
            WriteRequest::Update { id, wage } => {
                if let Some(r) = sheet.records.iter_mut().find(|r| r.id == *id) {
                    *r = to_record(*id, wage);
                }
            }
            WriteRequest::Delete { id } => sheet.records.retain(|r| r.id != *id),
            WriteRequest::AddWorker { worker_name } => {
                if !sheet.workers.contains(worker_name) {
                    sheet.workers.push(worker_name.clone());
                }
            }
            WriteRequest::AddTask { task_name } => {
                if !sheet.tasks.iter().any(|t| &t.name == task_name) {
                    let id = sheet.next_task_id;
                    sheet.next_task_id += 1;
                    sheet.tasks.push(Task {
                        id,
                        name: task_name.clone(),
                        times_used: 0.0,
                        last_used_date: None,
                    });
                }
            }
            WriteRequest::DeleteTask { id } => sheet.tasks.retain(|t| t.id != *id),
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn fetch_records(&self) -> ClientResult<Vec<WageRecord>> {
        self.check_reachable("records")?;
        self.record_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.lock_sheet().records.clone())
    }

    async fn fetch_workers(&self) -> ClientResult<Vec<WorkerEntry>> {
        self.check_reachable("getWorkers")?;
        let sheet = self.lock_sheet();
        let names: BTreeSet<&str> = sheet
            .workers
            .iter()
            .map(String::as_str)
            .chain(sheet.records.iter().map(|r| r.worker_name.as_str()))
            .collect();
        Ok(names
            .into_iter()
            .map(|n| WorkerEntry { name: n.to_string() })
            .collect())
    }

    async fn fetch_tasks(&self) -> ClientResult<Vec<Task>> {
        self.check_reachable("getTasks")?;
        let sheet = self.lock_sheet();
        Ok(sheet
            .tasks
            .iter()
            .map(|t| {
                let used: Vec<&WageRecord> = sheet
                    .records
                    .iter()
                    .filter(|r| r.task_description == t.name)
                    .collect();
                Task {
                    times_used: used.len() as f64,
                    last_used_date: used.iter().map(|r| r.date.clone()).max(),
                    ..t.clone()
                }
            })
            .collect())
    }

    async fn authenticate(&self, req: &AuthRequest) -> ClientResult<AuthReply> {
        self.check_reachable(req.action())?;
        let mut sheet = self.lock_sheet();
        let reply = match req {
            AuthRequest::Login { username, password } => match sheet.accounts.get(username) {
                Some(acct) if &acct.password == password => AuthReply {
                    success: true,
                    message: None,
                    full_name: Some(acct.full_name.clone()),
                    user_id: Some(acct.user_id.to_string()),
                },
                _ => AuthReply {
                    success: false,
                    message: Some("Invalid username or password".to_string()),
                    ..AuthReply::default()
                },
            },
            AuthRequest::Register {
                pin,
                username,
                password,
                full_name,
            } => {
                if pin != &self.registration_pin {
                    AuthReply {
                        success: false,
                        message: Some("Invalid registration PIN".to_string()),
                        ..AuthReply::default()
                    }
                } else if sheet.accounts.contains_key(username) {
                    AuthReply {
                        success: false,
                        message: Some("Username already exists".to_string()),
                        ..AuthReply::default()
                    }
                } else {
                    let user_id = sheet.next_user_id;
                    sheet.next_user_id += 1;
                    sheet.accounts.insert(
                        username.clone(),
                        Account {
                            password: password.clone(),
                            full_name: full_name.clone(),
                            user_id,
                        },
                    );
                    AuthReply {
                        success: true,
                        message: Some("Registration successful".to_string()),
                        ..AuthReply::default()
                    }
                }
            }
        };
        Ok(reply)
    }
}

#[async_trait]
impl WriteChannel for MemoryRemote {
    async fn send(&self, req: &WriteRequest) -> ClientResult<WriteAck> {
        self.check_reachable(req.action())?;
        lock(&self.sent).push(req.clone());
        if !self.drop_writes.load(Ordering::SeqCst) {
            self.apply(req);
        }
        let ack = if self.acknowledging.load(Ordering::SeqCst) {
            WriteAck::Confirmed
        } else {
            WriteAck::Opaque
        };
        log_remote_write(req.action(), &params_hash(&req.body().to_string()), ack.as_str());
        Ok(ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wage(worker: &str, task: &str) -> NewWage {
        NewWage::new("2024-01-10", worker, task, 8.0, 50.0)
    }

    #[tokio::test]
    async fn test_create_appends_with_fresh_id() {
        let remote = MemoryRemote::default();
        remote.seed_record(&wage("Asha", "Weeding"));
        remote.send(&WriteRequest::Create(wage("Ravi", "Harvest"))).await.unwrap();
        let records = remote.fetch_records().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, 2);
        assert_eq!(records[1].worker_name, "Ravi");
    }

    #[tokio::test]
    async fn test_dropped_writes_are_recorded_not_applied() {
        let remote = MemoryRemote::default();
        remote.set_drop_writes(true);
        let ack = remote.send(&WriteRequest::Create(wage("Asha", "Weeding"))).await.unwrap();
        assert_eq!(ack, WriteAck::Opaque);
        assert_eq!(remote.record_count(), 0);
        assert_eq!(remote.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_fails_reads_and_writes() {
        let remote = MemoryRemote::default();
        remote.set_unreachable(true);
        assert!(matches!(remote.fetch_records().await, Err(ClientError::Transport { .. })));
        assert!(matches!(
            remote.send(&WriteRequest::Delete { id: 1 }).await,
            Err(ClientError::Transport { .. })
        ));
        assert!(remote.sent().is_empty());
    }

    #[tokio::test]
    async fn test_task_usage_is_computed_from_records() {
        let remote = MemoryRemote::default();
        remote.seed_task("Weeding");
        remote.seed_record(&wage("Asha", "Weeding"));
        remote.seed_record(&NewWage::new("2024-02-01", "Ravi", "Weeding", 1.0, 1.0));
        let tasks = remote.fetch_tasks().await.unwrap();
        assert_eq!(tasks[0].times_used, 2.0);
        assert_eq!(tasks[0].last_used_date.as_deref(), Some("2024-02-01"));
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let remote = MemoryRemote::new("4321");
        let bad_pin = remote
            .authenticate(&AuthRequest::Register {
                pin: "0000".into(),
                username: "asha".into(),
                password: "secret1".into(),
                full_name: "Asha K".into(),
            })
            .await
            .unwrap();
        assert!(!bad_pin.success);

        let ok = remote
            .authenticate(&AuthRequest::Register {
                pin: "4321".into(),
                username: "asha".into(),
                password: "secret1".into(),
                full_name: "Asha K".into(),
            })
            .await
            .unwrap();
        assert!(ok.success);

        let login = remote
            .authenticate(&AuthRequest::Login {
                username: "asha".into(),
                password: "secret1".into(),
            })
            .await
            .unwrap();
        assert!(login.success);
        assert_eq!(login.full_name.as_deref(), Some("Asha K"));
    }
}
