//! Lifecycle of in-flight writes.
//!
//! A write starts `Pending`, becomes `Sent` once the request left the client
//! (or `Confirmed` if the store acknowledged it), and is settled by the next
//! refresh that shows whether the store applied it.

use std::collections::BTreeMap;

use chrono::FixedOffset;

use crate::model::{Task, WageRecord};
use crate::remote::{WriteAck, WriteRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationStatus {
    Pending,
    Sent,
    Confirmed,
    /// A refresh after the write still shows the old state.
    Unreflected,
    Failed(String),
}

impl MutationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationStatus::Pending => "pending",
            MutationStatus::Sent => "sent",
            MutationStatus::Confirmed => "confirmed",
            MutationStatus::Unreflected => "unreflected",
            MutationStatus::Failed(_) => "failed",
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, MutationStatus::Confirmed | MutationStatus::Failed(_))
    }
}

#[derive(Debug, Clone)]
pub enum MutationEvent {
    Sent(WriteAck),
    TransportFailed(String),
    Reconciled { reflected: bool },
}

#[derive(Debug, Clone)]
pub struct Mutation {
    pub id: u64,
    pub request: WriteRequest,
    pub status: MutationStatus,
    /// Matching records already present when a create was submitted.
    /// `None` when the Record Store could not be read at submit time, in which
    /// case no record count can settle the create.
    pub baseline: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct TransitionError {
    pub msg: String,
}

pub fn apply_event(m: &mut Mutation, event: MutationEvent) -> Result<(), TransitionError> {
    match (&m.status, event) {
        (MutationStatus::Pending, MutationEvent::Sent(WriteAck::Opaque)) => {
            m.status = MutationStatus::Sent;
            Ok(())
        }
        (MutationStatus::Pending, MutationEvent::Sent(WriteAck::Confirmed)) => {
            m.status = MutationStatus::Confirmed;
            Ok(())
        }
        (MutationStatus::Pending, MutationEvent::TransportFailed(reason)) => {
            m.status = MutationStatus::Failed(reason);
            Ok(())
        }
        (MutationStatus::Sent, MutationEvent::Reconciled { reflected })
        | (MutationStatus::Unreflected, MutationEvent::Reconciled { reflected }) => {
            m.status = if reflected {
                MutationStatus::Confirmed
            } else {
                MutationStatus::Unreflected
            };
            Ok(())
        }
        (MutationStatus::Confirmed, _) | (MutationStatus::Failed(_), _) => Ok(()),
        (MutationStatus::Pending, MutationEvent::Reconciled { .. }) => Err(TransitionError {
            msg: "reconciled before the request was sent".to_string(),
        }),
        _ => Err(TransitionError {
            msg: "invalid mutation transition".to_string(),
        }),
    }
}

/// What a refresh brought back, to check writes against.
#[derive(Debug, Clone, Copy)]
pub enum Snapshot<'a> {
    Records(&'a [WageRecord]),
    Tasks(&'a [Task]),
    Workers(&'a [&'a str]),
}

fn matching_creates(records: &[WageRecord], req: &WriteRequest, offset: FixedOffset) -> usize {
    match req {
        WriteRequest::Create(wage) => records.iter().filter(|r| r.carries(wage, offset)).count(),
        _ => 0,
    }
}

/// Whether `snapshot` shows `m` applied. `None` when the snapshot says nothing about it.
pub fn reflected_in(m: &Mutation, snapshot: Snapshot<'_>, offset: FixedOffset) -> Option<bool> {
    match (&m.request, snapshot) {
        (req @ WriteRequest::Create(_), Snapshot::Records(records)) => m
            .baseline
            .map(|baseline| matching_creates(records, req, offset) > baseline),
        (WriteRequest::Update { id, wage }, Snapshot::Records(records)) => {
            Some(records.iter().any(|r| r.id == *id && r.carries(wage, offset)))
        }
        (WriteRequest::Delete { id }, Snapshot::Records(records)) => {
            Some(!records.iter().any(|r| r.id == *id))
        }
        (WriteRequest::AddTask { task_name }, Snapshot::Tasks(tasks)) => {
            Some(tasks.iter().any(|t| &t.name == task_name))
        }
        (WriteRequest::DeleteTask { id }, Snapshot::Tasks(tasks)) => {
            Some(!tasks.iter().any(|t| t.id == *id))
        }
        (WriteRequest::AddWorker { worker_name }, Snapshot::Workers(names)) => {
            Some(names.iter().any(|n| n == worker_name))
        }
        _ => None,
    }
}

/// Settled entries kept for `status` lookups; older ones are pruned.
pub const SETTLED_KEPT: usize = 64;

#[derive(Debug, Clone, Default)]
pub struct MutationLedger {
    next_id: u64,
    entries: BTreeMap<u64, Mutation>,
}

impl MutationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a write about to be sent. `current` is the Record Store's list at submit time.
    pub fn begin(&mut self, request: WriteRequest, current: &[WageRecord], offset: FixedOffset) -> u64 {
        let baseline = matching_creates(current, &request, offset);
        self.insert(request, Some(baseline))
    }

    /// Registers a write with no known Record Store list to count against.
    pub fn begin_unbaselined(&mut self, request: WriteRequest) -> u64 {
        self.insert(request, None)
    }

    fn insert(&mut self, request: WriteRequest, baseline: Option<usize>) -> u64 {
        self.prune();
        self.next_id += 1;
        let id = self.next_id;
        self.entries.insert(
            id,
            Mutation {
                id,
                request,
                status: MutationStatus::Pending,
                baseline,
            },
        );
        id
    }

    /// Drops the oldest settled entries beyond `SETTLED_KEPT`.
    fn prune(&mut self) {
        let settled: Vec<u64> = self
            .entries
            .values()
            .filter(|m| m.status.is_settled())
            .map(|m| m.id)
            .collect();
        let excess = settled.len().saturating_sub(SETTLED_KEPT);
        for id in &settled[..excess] {
            self.entries.remove(id);
        }
    }

    pub fn apply(&mut self, id: u64, event: MutationEvent) -> Result<(MutationStatus, MutationStatus), String> {
        let m = self.entries.get_mut(&id).ok_or_else(|| "unknown mutation".to_string())?;
        let prev = m.status.clone();
        apply_event(m, event).map_err(|e| e.msg)?;
        Ok((prev, m.status.clone()))
    }

    /// Checks every sent-but-unsettled write against `snapshot`.
    /// Returns the ids whose status changed, with the new status.
    pub fn reconcile(&mut self, snapshot: Snapshot<'_>, offset: FixedOffset) -> Vec<(u64, MutationStatus)> {
        let mut changed = Vec::new();
        for m in self.entries.values_mut() {
            if !matches!(m.status, MutationStatus::Sent | MutationStatus::Unreflected) {
                continue;
            }
            let Some(reflected) = reflected_in(m, snapshot, offset) else {
                continue;
            };
            let prev = m.status.clone();
            if apply_event(m, MutationEvent::Reconciled { reflected }).is_ok() && m.status != prev {
                changed.push((m.id, m.status.clone()));
            }
        }
        changed
    }

    pub fn get(&self, id: u64) -> Option<&Mutation> {
        self.entries.get(&id)
    }

    pub fn status(&self, id: u64) -> Option<MutationStatus> {
        self.entries.get(&id).map(|m| m.status.clone())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mutation> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewWage;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn record(id: u64, worker: &str) -> WageRecord {
        WageRecord {
            id,
            date: "2024-01-10".to_string(),
            worker_name: worker.to_string(),
            task_description: "Weeding".to_string(),
            hours_worked: 8.0,
            wage_rate: 50.0,
            total_wage: 400.0,
        }
    }

    fn create(worker: &str) -> WriteRequest {
        WriteRequest::Create(NewWage::new("2024-01-10", worker, "Weeding", 8.0, 50.0))
    }

    #[test]
    fn test_opaque_send_then_reflected() {
        let mut ledger = MutationLedger::new();
        let id = ledger.begin(create("Asha"), &[], utc());
        assert_eq!(ledger.status(id), Some(MutationStatus::Pending));
        ledger.apply(id, MutationEvent::Sent(WriteAck::Opaque)).unwrap();
        assert_eq!(ledger.status(id), Some(MutationStatus::Sent));
        let changed = ledger.reconcile(Snapshot::Records(&[record(1, "Asha")]), utc());
        assert_eq!(changed, vec![(id, MutationStatus::Confirmed)]);
    }

    #[test]
    fn test_duplicate_create_needs_new_row() {
        let existing = vec![record(1, "Asha")];
        let mut ledger = MutationLedger::new();
        let id = ledger.begin(create("Asha"), &existing, utc());
        ledger.apply(id, MutationEvent::Sent(WriteAck::Opaque)).unwrap();
        ledger.reconcile(Snapshot::Records(&existing), utc());
        assert_eq!(ledger.status(id), Some(MutationStatus::Unreflected));
        ledger.reconcile(Snapshot::Records(&[record(1, "Asha"), record(2, "Asha")]), utc());
        assert_eq!(ledger.status(id), Some(MutationStatus::Confirmed));
    }

    #[test]
    fn test_unbaselined_create_is_not_settled_by_count() {
        let mut ledger = MutationLedger::new();
        let id = ledger.begin_unbaselined(create("Asha"));
        ledger.apply(id, MutationEvent::Sent(WriteAck::Opaque)).unwrap();
        assert!(ledger.reconcile(Snapshot::Records(&[record(1, "Asha")]), utc()).is_empty());
        assert_eq!(ledger.status(id), Some(MutationStatus::Sent));
        assert_eq!(ledger.get(id).unwrap().baseline, None);
    }

    #[test]
    fn test_settled_entries_are_pruned() {
        let mut ledger = MutationLedger::new();
        let open = ledger.begin(WriteRequest::Delete { id: 1 }, &[], utc());
        ledger.apply(open, MutationEvent::Sent(WriteAck::Opaque)).unwrap();
        let mut last = 0;
        for n in 0..SETTLED_KEPT as u64 + 10 {
            last = ledger.begin(WriteRequest::Delete { id: n }, &[], utc());
            ledger.apply(last, MutationEvent::Sent(WriteAck::Confirmed)).unwrap();
        }
        // Pruning runs on insert.
        ledger.begin(WriteRequest::Delete { id: 0 }, &[], utc());
        let settled = ledger.iter().filter(|m| m.status.is_settled()).count();
        assert_eq!(settled, SETTLED_KEPT);
        assert_eq!(ledger.status(open), Some(MutationStatus::Sent));
        assert_eq!(ledger.status(last), Some(MutationStatus::Confirmed));
        assert_eq!(ledger.status(2), None);
    }

    #[test]
    fn test_acknowledged_write_skips_reconciliation() {
        let mut ledger = MutationLedger::new();
        let id = ledger.begin(WriteRequest::Delete { id: 4 }, &[], utc());
        ledger.apply(id, MutationEvent::Sent(WriteAck::Confirmed)).unwrap();
        assert!(ledger.reconcile(Snapshot::Records(&[record(4, "Asha")]), utc()).is_empty());
        assert_eq!(ledger.status(id), Some(MutationStatus::Confirmed));
    }

    #[test]
    fn test_transport_failure_is_terminal() {
        let mut ledger = MutationLedger::new();
        let id = ledger.begin(WriteRequest::Delete { id: 4 }, &[], utc());
        ledger.apply(id, MutationEvent::TransportFailed("offline".into())).unwrap();
        ledger.reconcile(Snapshot::Records(&[]), utc());
        assert_eq!(ledger.status(id), Some(MutationStatus::Failed("offline".into())));
    }

    #[test]
    fn test_reconcile_before_send_is_rejected() {
        let mut ledger = MutationLedger::new();
        let id = ledger.begin(WriteRequest::Delete { id: 4 }, &[], utc());
        assert!(ledger.apply(id, MutationEvent::Reconciled { reflected: true }).is_err());
        assert!(ledger.apply(99, MutationEvent::Sent(WriteAck::Opaque)).is_err());
    }

    #[test]
    fn test_snapshot_kind_must_match() {
        let mut ledger = MutationLedger::new();
        let id = ledger.begin(WriteRequest::DeleteTask { id: 2 }, &[], utc());
        ledger.apply(id, MutationEvent::Sent(WriteAck::Opaque)).unwrap();
        assert!(ledger.reconcile(Snapshot::Records(&[]), utc()).is_empty());
        assert_eq!(ledger.status(id), Some(MutationStatus::Sent));
        ledger.reconcile(Snapshot::Tasks(&[]), utc());
        assert_eq!(ledger.status(id), Some(MutationStatus::Confirmed));
    }

    #[test]
    fn test_update_checks_fields_on_id() {
        let mut ledger = MutationLedger::new();
        let wage = NewWage::new("2024-01-10", "Asha", "Weeding", 6.0, 50.0);
        let id = ledger.begin(WriteRequest::Update { id: 1, wage }, &[], utc());
        ledger.apply(id, MutationEvent::Sent(WriteAck::Opaque)).unwrap();
        ledger.reconcile(Snapshot::Records(&[record(1, "Asha")]), utc());
        assert_eq!(ledger.status(id), Some(MutationStatus::Unreflected));
    }
}
