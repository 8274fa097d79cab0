//! Form controllers.
//!
//! Every write goes through the same path: validate, take the form's trigger,
//! register a mutation, send, then schedule the refresh that settles it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{FixedOffset, NaiveDate};
use serde_json::json;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::{ClientError, ClientResult};
use crate::logging::{log, log_validation, obj, v_str, Domain, Level};
use crate::model::{parse_record_date, NewWage, Task, WageRecord, INPUT_DATE_FORMAT};
use crate::mutation::{MutationEvent, MutationStatus};
use crate::records::{lock, Workspace};
use crate::remote::{WriteChannel, WriteRequest};
use crate::session::{self, LoginInput, RegisterInput, SessionStore, SessionUser};
use crate::view::{self, DetailView, Table, TaskList};

// =============================================================================
// Notices
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// Inline message shown next to a form after it is submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Success, text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Error, text: text.into() }
    }

    pub fn is_success(&self) -> bool {
        self.kind == NoticeKind::Success
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            NoticeKind::Success => write!(f, "✓ {}", self.text),
            NoticeKind::Error => write!(f, "✗ {}", self.text),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Form {
    Create,
    Update,
    Delete,
    AddWorker,
    AddTask,
    DeleteTask,
    Login,
    Register,
}

impl Form {
    pub fn name(&self) -> &'static str {
        match self {
            Form::Create => "create",
            Form::Update => "update",
            Form::Delete => "delete",
            Form::AddWorker => "add_worker",
            Form::AddTask => "add_task",
            Form::DeleteTask => "delete_task",
            Form::Login => "login",
            Form::Register => "register",
        }
    }

    /// Shown when the request itself could not be made.
    pub fn failure_text(&self) -> &'static str {
        match self {
            Form::Create => "Error submitting data. Please try again.",
            Form::Update => "Error updating record. Please try again.",
            Form::Delete => "Error deleting record. Please try again.",
            Form::AddWorker => "Error adding worker. Please try again.",
            Form::AddTask => "Error adding task. Please try again.",
            Form::DeleteTask => "Error deleting task. Please try again.",
            Form::Login => "Login failed. Please check your connection and try again.",
            Form::Register => "Registration failed. Please check your connection and try again.",
        }
    }
}

/// Notice for a failed submission of `form`.
pub fn error_notice(form: Form, err: &ClientError) -> Notice {
    match err {
        ClientError::Validation(msg) | ClientError::Rejected(msg) => Notice::error(msg.clone()),
        ClientError::NotLoggedIn => Notice::error("Please login first"),
        ClientError::Busy { .. } => Notice::error("Still submitting, please wait"),
        ClientError::Transport { .. } | ClientError::Decode { .. } => Notice::error(form.failure_text()),
    }
}

// =============================================================================
// Triggers
// =============================================================================

/// Disabled-while-submitting flag for one form's submit button.
#[derive(Debug, Default)]
pub struct Trigger {
    busy: AtomicBool,
}

/// Held while a submission is in flight; re-enables the trigger on drop.
pub struct Pressed<'a> {
    trigger: &'a Trigger,
}

impl Trigger {
    pub fn press(&self, form: Form) -> ClientResult<Pressed<'_>> {
        if self.busy.swap(true, Ordering::AcqRel) {
            return Err(ClientError::Busy { form: form.name() });
        }
        Ok(Pressed { trigger: self })
    }

    pub fn is_disabled(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for Pressed<'_> {
    fn drop(&mut self) {
        self.trigger.busy.store(false, Ordering::Release);
    }
}

#[derive(Debug, Default)]
struct Triggers {
    create: Trigger,
    update: Trigger,
    delete: Trigger,
    add_worker: Trigger,
    add_task: Trigger,
    delete_task: Trigger,
    login: Trigger,
    register: Trigger,
}

impl Triggers {
    fn get(&self, form: Form) -> &Trigger {
        match form {
            Form::Create => &self.create,
            Form::Update => &self.update,
            Form::Delete => &self.delete,
            Form::AddWorker => &self.add_worker,
            Form::AddTask => &self.add_task,
            Form::DeleteTask => &self.delete_task,
            Form::Login => &self.login,
            Form::Register => &self.register,
        }
    }
}

// =============================================================================
// Inputs
// =============================================================================

/// Wage form fields exactly as typed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WageInput {
    pub date: String,
    pub worker_name: String,
    pub task_description: String,
    pub hours: String,
    pub rate: String,
}

fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|x| x.is_finite())
}

impl WageInput {
    pub fn new(date: &str, worker_name: &str, task_description: &str, hours: &str, rate: &str) -> Self {
        Self {
            date: date.to_string(),
            worker_name: worker_name.to_string(),
            task_description: task_description.to_string(),
            hours: hours.to_string(),
            rate: rate.to_string(),
        }
    }

    /// Empty form with the date input set to `day`.
    pub fn dated(day: NaiveDate) -> Self {
        Self {
            date: day.format(INPUT_DATE_FORMAT).to_string(),
            ..Self::default()
        }
    }

    /// Edit-form contents for `r`, with the stored date brought back to `YYYY-MM-DD`.
    pub fn from_record(r: &WageRecord, offset: FixedOffset) -> Self {
        let date = parse_record_date(&r.date, offset)
            .map(|d| d.format(INPUT_DATE_FORMAT).to_string())
            .unwrap_or_else(|| r.date.clone());
        Self {
            date,
            worker_name: r.worker_name.clone(),
            task_description: r.task_description.clone(),
            hours: view::format_hours(r.hours_worked),
            rate: view::format_hours(r.wage_rate),
        }
    }

    pub fn validate(&self, form: Form) -> ClientResult<NewWage> {
        let reject = |msg: &str| {
            log_validation(form.name(), msg);
            ClientError::validation(msg)
        };
        let date = self.date.trim();
        if date.is_empty() {
            return Err(reject("Please enter a date"));
        }
        if NaiveDate::parse_from_str(date, INPUT_DATE_FORMAT).is_err() {
            return Err(reject("Date must be in YYYY-MM-DD format"));
        }
        let worker = self.worker_name.trim();
        if worker.is_empty() {
            return Err(reject("Please enter a worker name"));
        }
        let task = self.task_description.trim();
        if task.is_empty() {
            return Err(reject("Please enter a task description"));
        }
        let hours = parse_number(&self.hours).ok_or_else(|| reject("Hours worked must be a number"))?;
        let rate = parse_number(&self.rate).ok_or_else(|| reject("Wage rate must be a number"))?;
        Ok(NewWage::new(date, worker, task, hours, rate))
    }

    pub fn preview(&self) -> String {
        preview_total(&self.hours, &self.rate)
    }
}

/// Live total shown while typing. Unparseable inputs count as zero.
pub fn preview_total(hours: &str, rate: &str) -> String {
    let h = parse_number(hours).unwrap_or(0.0);
    let r = parse_number(rate).unwrap_or(0.0);
    view::format_currency(h * r)
}

/// The record open in the edit panel.
#[derive(Debug, Clone, PartialEq)]
pub struct EditForm {
    pub record_id: u64,
    pub input: WageInput,
}

impl EditForm {
    /// Question asked before the open record is deleted.
    pub fn delete_prompt(&self) -> String {
        format!(
            "Are you sure you want to delete this record for {}? This action cannot be undone.",
            self.input.worker_name
        )
    }
}

// =============================================================================
// Submission results
// =============================================================================

/// Work scheduled by a successful submission.
pub enum FollowUp {
    None,
    Records(JoinHandle<ClientResult<Vec<WageRecord>>>),
    Tasks(JoinHandle<ClientResult<Vec<Task>>>),
}

impl FollowUp {
    /// Waits for the scheduled reload. Dropping the follow-up instead lets it run detached.
    pub async fn settle(self) -> ClientResult<()> {
        match self {
            FollowUp::None => Ok(()),
            FollowUp::Records(h) => h
                .await
                .map_err(|e| ClientError::transport("refresh", e))?
                .map(|_| ()),
            FollowUp::Tasks(h) => h
                .await
                .map_err(|e| ClientError::transport("getTasks", e))?
                .map(|_| ()),
        }
    }
}

pub struct Submitted {
    pub notice: Notice,
    pub mutation_id: u64,
    pub follow_up: FollowUp,
}

// =============================================================================
// Dashboard
// =============================================================================

/// Everything the logged-in page works with.
pub struct Dashboard {
    cfg: Config,
    ws: Workspace,
    writes: Arc<dyn WriteChannel>,
    session: Mutex<SessionStore>,
    draft: Mutex<WageInput>,
    editing: Mutex<Option<EditForm>>,
    triggers: Triggers,
}

fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

impl Dashboard {
    pub fn new(cfg: Config, ws: Workspace, writes: Arc<dyn WriteChannel>) -> Self {
        let draft = WageInput::dated(cfg.today());
        Self {
            cfg,
            ws,
            writes,
            session: Mutex::new(SessionStore::default()),
            draft: Mutex::new(draft),
            editing: Mutex::new(None),
            triggers: Triggers::default(),
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.ws
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn is_disabled(&self, form: Form) -> bool {
        self.triggers.get(form).is_disabled()
    }

    // ---- session ----------------------------------------------------------

    pub fn user(&self) -> Option<SessionUser> {
        lock(&self.session).user()
    }

    pub fn greeting(&self) -> Option<String> {
        lock(&self.session).greeting()
    }

    pub fn require_login(&self) -> ClientResult<()> {
        lock(&self.session).require_login()
    }

    pub async fn login(&self, input: &LoginInput) -> ClientResult<Notice> {
        if let Some(user) = self.user() {
            return Ok(Notice::success(format!("Already logged in as {}", user.username)));
        }
        let _pressed = self.triggers.get(Form::Login).press(Form::Login)?;
        let mut fresh = SessionStore::default();
        session::login(self.ws.remote.as_ref(), &mut fresh, input).await?;
        let greeting = fresh.greeting().unwrap_or_else(|| "Welcome!".to_string());
        *lock(&self.session) = fresh;
        Ok(Notice::success(greeting))
    }

    pub async fn register(&self, input: &RegisterInput) -> ClientResult<Notice> {
        let _pressed = self.triggers.get(Form::Register).press(Form::Register)?;
        session::register(self.ws.remote.as_ref(), input).await?;
        Ok(Notice::success("Registration successful! Please login."))
    }

    pub fn logout(&self) -> Notice {
        session::logout(&mut lock(&self.session));
        *lock(&self.editing) = None;
        Notice::success("Logged out")
    }

    // ---- views ------------------------------------------------------------

    pub async fn refresh(&self) -> ClientResult<Table> {
        self.require_login()?;
        self.ws.refresh().await?;
        Ok(self.ws.table())
    }

    pub fn table(&self) -> ClientResult<Table> {
        self.require_login()?;
        Ok(self.ws.table())
    }

    /// Edit panel table. Loads the records first when nothing has been fetched yet.
    pub async fn edit_table(&self) -> ClientResult<Table> {
        self.require_login()?;
        let empty = lock(&self.ws.records).is_empty();
        if empty {
            self.ws.refresh().await?;
        }
        Ok(view::render_edit_table(&self.ws.snapshot(), self.ws.offset))
    }

    pub fn worker_select(&self) -> ClientResult<String> {
        self.require_login()?;
        Ok(view::render_worker_select(&self.ws.snapshot()))
    }

    pub fn worker_detail(&self, name: &str) -> ClientResult<DetailView> {
        self.require_login()?;
        Ok(view::render_worker_detail(&self.ws.snapshot(), name, self.ws.offset))
    }

    pub fn task_detail(&self, name: &str) -> ClientResult<DetailView> {
        self.require_login()?;
        Ok(view::render_task_detail(&self.ws.snapshot(), name, self.ws.offset))
    }

    /// Tasks panel. A failed load renders the error placeholder instead of failing.
    pub async fn tasks_panel(&self) -> ClientResult<TaskList> {
        self.require_login()?;
        Ok(match self.ws.load_tasks().await {
            Ok(tasks) => view::render_task_list(&tasks, self.ws.offset),
            Err(_) => view::render_task_list_error(),
        })
    }

    /// Re-reads the worker list so pending worker additions can settle.
    pub async fn reload_workers(&self) -> ClientResult<Vec<String>> {
        self.require_login()?;
        self.ws.reload_workers().await?;
        Ok(self.ws.worker_suggestions())
    }

    pub fn mutation_status(&self, id: u64) -> Option<MutationStatus> {
        self.ws.mutation_status(id)
    }

    // ---- create -----------------------------------------------------------

    pub fn draft(&self) -> WageInput {
        lock(&self.draft).clone()
    }

    pub fn set_draft(&self, input: WageInput) {
        *lock(&self.draft) = input;
    }

    /// Live total for the current draft.
    pub fn preview(&self) -> String {
        lock(&self.draft).preview()
    }

    pub async fn submit_wage(&self, input: WageInput) -> ClientResult<Submitted> {
        self.require_login()?;
        let wage = match input.validate(Form::Create) {
            Ok(w) => w,
            Err(err) => {
                self.set_draft(input);
                return Err(err);
            }
        };
        let _pressed = self.triggers.get(Form::Create).press(Form::Create)?;
        let worker = wage.worker_name().to_string();
        let req = WriteRequest::Create(wage);
        let current = self.create_baseline().await;
        let id = self.begin_against(&req, current.as_deref());
        if let Err(err) = self.dispatch(id, &req).await {
            self.set_draft(input);
            return Err(err);
        }
        self.remember_worker(&worker);
        self.set_draft(WageInput::dated(self.cfg.today()));
        let handle = self.ws.schedule_refresh(millis(self.cfg.create_refresh_ms), "create");
        Ok(Submitted {
            notice: Notice::success("Wage entry submitted successfully!"),
            mutation_id: id,
            follow_up: FollowUp::Records(handle),
        })
    }

    // ---- edit / delete ----------------------------------------------------

    pub fn open_edit(&self, record_id: u64) -> ClientResult<EditForm> {
        self.require_login()?;
        let record = lock(&self.ws.records)
            .get(record_id)
            .cloned()
            .ok_or_else(|| ClientError::validation(format!("Record #{} not found", record_id)))?;
        let form = EditForm {
            record_id,
            input: WageInput::from_record(&record, self.ws.offset),
        };
        *lock(&self.editing) = Some(form.clone());
        Ok(form)
    }

    pub fn editing(&self) -> Option<EditForm> {
        lock(&self.editing).clone()
    }

    pub fn cancel_edit(&self) {
        *lock(&self.editing) = None;
    }

    pub async fn update_record(&self, input: WageInput) -> ClientResult<Submitted> {
        self.require_login()?;
        let record_id = self
            .editing()
            .map(|e| e.record_id)
            .ok_or_else(|| ClientError::validation("No record selected for editing"))?;
        let wage = input.validate(Form::Update)?;
        let _pressed = self.triggers.get(Form::Update).press(Form::Update)?;
        let req = WriteRequest::Update { id: record_id, wage };
        let id = self.begin(&req);
        self.dispatch(id, &req).await?;
        self.cancel_edit();
        let handle = self.ws.schedule_refresh(millis(self.cfg.update_refresh_ms), "update");
        Ok(Submitted {
            notice: Notice::success("Record updated successfully!"),
            mutation_id: id,
            follow_up: FollowUp::Records(handle),
        })
    }

    /// Deletes the open record. Callers confirm with the user first.
    pub async fn delete_record(&self) -> ClientResult<Submitted> {
        self.require_login()?;
        let record_id = self
            .editing()
            .map(|e| e.record_id)
            .ok_or_else(|| ClientError::validation("No record selected for deletion"))?;
        let _pressed = self.triggers.get(Form::Delete).press(Form::Delete)?;
        let req = WriteRequest::Delete { id: record_id };
        let id = self.begin(&req);
        self.dispatch(id, &req).await?;
        self.cancel_edit();
        let handle = self.ws.schedule_refresh(millis(self.cfg.delete_refresh_ms), "delete");
        Ok(Submitted {
            notice: Notice::success("Record deleted successfully!"),
            mutation_id: id,
            follow_up: FollowUp::Records(handle),
        })
    }

    // ---- workers / tasks --------------------------------------------------

    pub async fn add_worker(&self, name: &str) -> ClientResult<Submitted> {
        self.require_login()?;
        let name = name.trim();
        if name.is_empty() {
            log_validation(Form::AddWorker.name(), "empty");
            return Err(ClientError::validation("Please enter a worker name"));
        }
        if lock(&self.ws.workers).contains(name) {
            log_validation(Form::AddWorker.name(), "duplicate");
            return Err(ClientError::validation("Worker already exists in the list"));
        }
        let _pressed = self.triggers.get(Form::AddWorker).press(Form::AddWorker)?;
        let req = WriteRequest::AddWorker { worker_name: name.to_string() };
        let id = self.begin(&req);
        self.dispatch(id, &req).await?;
        self.remember_worker(name);
        Ok(Submitted {
            notice: Notice::success(format!("Worker \"{}\" added successfully!", name)),
            mutation_id: id,
            follow_up: FollowUp::None,
        })
    }

    pub async fn add_task(&self, name: &str) -> ClientResult<Submitted> {
        self.require_login()?;
        let name = name.trim();
        if name.is_empty() {
            log_validation(Form::AddTask.name(), "empty");
            return Err(ClientError::validation("Please enter a task name"));
        }
        if lock(&self.ws.tasks).contains(name) {
            log_validation(Form::AddTask.name(), "duplicate");
            return Err(ClientError::validation("Task already exists"));
        }
        let _pressed = self.triggers.get(Form::AddTask).press(Form::AddTask)?;
        let req = WriteRequest::AddTask { task_name: name.to_string() };
        let id = self.begin(&req);
        self.dispatch(id, &req).await?;
        lock(&self.ws.tasks).add(name);
        let handle = self.ws.schedule_task_reload(millis(self.cfg.task_reload_ms));
        Ok(Submitted {
            notice: Notice::success(format!("Task \"{}\" added successfully!", name)),
            mutation_id: id,
            follow_up: FollowUp::Tasks(handle),
        })
    }

    /// Deletes a task on the store. The cached name is dropped from memory only.
    pub async fn delete_task(&self, task_id: u64, name: &str) -> ClientResult<Submitted> {
        self.require_login()?;
        let _pressed = self.triggers.get(Form::DeleteTask).press(Form::DeleteTask)?;
        let req = WriteRequest::DeleteTask { id: task_id };
        let id = self.begin(&req);
        self.dispatch(id, &req).await?;
        lock(&self.ws.tasks).remove(name);
        let handle = self.ws.schedule_task_reload(millis(self.cfg.task_reload_ms));
        Ok(Submitted {
            notice: Notice::success("Task deleted successfully!"),
            mutation_id: id,
            follow_up: FollowUp::Tasks(handle),
        })
    }

    // ---- plumbing ---------------------------------------------------------

    fn begin(&self, req: &WriteRequest) -> u64 {
        let current = self.ws.snapshot();
        self.begin_against(req, Some(&current))
    }

    /// List a new create is counted against. Fetches once when the store has
    /// never loaded; `None` if that fetch fails.
    async fn create_baseline(&self) -> Option<Vec<WageRecord>> {
        if self.ws.is_loaded() {
            return Some(self.ws.snapshot());
        }
        self.ws.refresh().await.ok()
    }

    fn begin_against(&self, req: &WriteRequest, current: Option<&[WageRecord]>) -> u64 {
        let id = {
            let mut ledger = lock(&self.ws.ledger);
            match current {
                Some(current) => ledger.begin(req.clone(), current, self.ws.offset),
                None => ledger.begin_unbaselined(req.clone()),
            }
        };
        log(
            Level::Debug,
            Domain::Form,
            "mutation_begin",
            obj(&[("mutation_id", json!(id)), ("action", v_str(req.action()))]),
        );
        id
    }

    async fn dispatch(&self, id: u64, req: &WriteRequest) -> ClientResult<()> {
        match self.writes.send(req).await {
            Ok(ack) => {
                self.advance(id, MutationEvent::Sent(ack));
                Ok(())
            }
            Err(err) => {
                self.advance(id, MutationEvent::TransportFailed(err.to_string()));
                log(
                    Level::Error,
                    Domain::Form,
                    "write_failed",
                    obj(&[
                        ("mutation_id", json!(id)),
                        ("action", v_str(req.action())),
                        ("error", v_str(&err.to_string())),
                    ]),
                );
                Err(err)
            }
        }
    }

    fn advance(&self, id: u64, event: MutationEvent) {
        let result = lock(&self.ws.ledger).apply(id, event);
        match result {
            Ok((prev, next)) => log(
                Level::Debug,
                Domain::Form,
                "mutation_transition",
                obj(&[
                    ("mutation_id", json!(id)),
                    ("from", v_str(prev.as_str())),
                    ("to", v_str(next.as_str())),
                ]),
            ),
            Err(msg) => log(
                Level::Warn,
                Domain::Form,
                "mutation_transition_rejected",
                obj(&[("mutation_id", json!(id)), ("error", v_str(&msg))]),
            ),
        }
    }

    fn remember_worker(&self, name: &str) {
        let result = lock(&self.ws.workers).add(name);
        if let Err(err) = result {
            log(
                Level::Warn,
                Domain::Names,
                "persist_failed",
                obj(&[("error", v_str(&err.to_string()))]),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::names::{TaskNames, WorkerNames};
    use crate::remote::{MemoryRemote, WriteAck};
    use crate::storage::LocalStorage;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, INPUT_DATE_FORMAT).unwrap()
    }

    async fn dashboard_with(remote: Arc<MemoryRemote>, writes: Arc<dyn WriteChannel>) -> Dashboard {
        let cfg = Config::immediate();
        let mut storage = LocalStorage::in_memory().unwrap();
        storage.init().unwrap();
        let ws = Workspace::new(
            remote.clone(),
            WorkerNames::load(storage).unwrap(),
            TaskNames::default(),
            cfg.display_offset(),
        );
        remote.seed_account("asha", "secret1", "Asha K");
        let dash = Dashboard::new(cfg, ws, writes);
        dash.login(&LoginInput { username: "asha".into(), password: "secret1".into() })
            .await
            .unwrap();
        dash
    }

    async fn dashboard(remote: Arc<MemoryRemote>) -> Dashboard {
        dashboard_with(remote.clone(), remote).await
    }

    struct SlowChannel;

    #[async_trait]
    impl WriteChannel for SlowChannel {
        async fn send(&self, _req: &WriteRequest) -> ClientResult<WriteAck> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(WriteAck::Opaque)
        }
    }

    #[test]
    fn test_preview_is_lenient() {
        assert_eq!(preview_total("8", "50"), "₹400.00");
        assert_eq!(preview_total("", "50"), "₹0.00");
        assert_eq!(preview_total("7.5", "abc"), "₹0.00");
    }

    #[test]
    fn test_validation_messages() {
        let ok = WageInput::new("2024-01-10", "Asha", "Weeding", "8", "50");
        let wage = ok.validate(Form::Create).unwrap();
        assert_eq!(wage.total_wage(), 400.0);

        let mut bad = ok.clone();
        bad.worker_name = "  ".into();
        assert_eq!(bad.validate(Form::Create).unwrap_err().to_string(), "Please enter a worker name");

        let mut bad = ok.clone();
        bad.hours = "eight".into();
        assert_eq!(bad.validate(Form::Create).unwrap_err().to_string(), "Hours worked must be a number");

        let mut bad = ok;
        bad.date = "10/01/2024".into();
        assert!(bad.validate(Form::Create).unwrap_err().is_validation());
    }

    #[test]
    fn test_delete_prompt_names_worker() {
        let form = EditForm {
            record_id: 3,
            input: WageInput::new("2024-01-10", "Asha", "Weeding", "8", "50"),
        };
        assert_eq!(
            form.delete_prompt(),
            "Are you sure you want to delete this record for Asha? This action cannot be undone."
        );
    }

    #[test]
    fn test_edit_input_converts_display_date() {
        let r = WageRecord {
            id: 3,
            date: "10/01/2024".into(),
            worker_name: "Asha".into(),
            task_description: "Weeding".into(),
            hours_worked: 7.5,
            wage_rate: 50.0,
            total_wage: 375.0,
        };
        let input = WageInput::from_record(&r, Config::default().display_offset());
        assert_eq!(input.date, "2024-01-10");
        assert_eq!(input.hours, "7.5");
        assert_eq!(input.rate, "50");
    }

    #[test]
    fn test_trigger_released_on_drop() {
        let t = Trigger::default();
        {
            let _p = t.press(Form::Create).unwrap();
            assert!(t.is_disabled());
            assert!(matches!(t.press(Form::Create), Err(ClientError::Busy { form: "create" })));
        }
        assert!(!t.is_disabled());
    }

    #[test]
    fn test_error_notice_texts() {
        let n = error_notice(Form::Create, &ClientError::transport("create", "refused"));
        assert_eq!(n.to_string(), "✗ Error submitting data. Please try again.");
        let n = error_notice(Form::AddTask, &ClientError::validation("Task already exists"));
        assert_eq!(n.to_string(), "✗ Task already exists");
    }

    #[tokio::test]
    async fn test_operations_require_login() {
        let remote = Arc::new(MemoryRemote::default());
        let dash = dashboard(remote.clone()).await;
        dash.logout();
        let err = dash
            .submit_wage(WageInput::new("2024-01-10", "Asha", "Weeding", "8", "50"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ClientError::NotLoggedIn));
        assert!(remote.sent().is_empty());
    }

    #[tokio::test]
    async fn test_second_submission_while_busy_is_rejected() {
        let remote = Arc::new(MemoryRemote::default());
        let dash = dashboard_with(remote, Arc::new(SlowChannel)).await;
        let a = WageInput::new("2024-01-10", "Asha", "Weeding", "8", "50");
        let b = WageInput::new("2024-01-11", "Ravi", "Harvest", "4", "60");
        let (first, second) = tokio::join!(dash.submit_wage(a), dash.submit_wage(b));
        assert!(first.is_ok());
        assert!(matches!(second.err(), Some(ClientError::Busy { form: "create" })));
        assert!(!dash.is_disabled(Form::Create));
    }

    #[tokio::test]
    async fn test_success_resets_draft_and_failure_keeps_it() {
        let remote = Arc::new(MemoryRemote::default());
        let dash = dashboard(remote.clone()).await;
        let input = WageInput::new("2024-01-10", "Asha", "Weeding", "8", "50");

        remote.set_unreachable(true);
        assert!(dash.submit_wage(input.clone()).await.is_err());
        assert_eq!(dash.draft(), input);

        remote.set_unreachable(false);
        let done = dash.submit_wage(input).await.unwrap();
        done.follow_up.settle().await.unwrap();
        assert_eq!(dash.draft(), WageInput::dated(dash.config().today()));
    }

    #[tokio::test]
    async fn test_update_and_delete_need_open_record() {
        let remote = Arc::new(MemoryRemote::default());
        let dash = dashboard(remote).await;
        let input = WageInput::new("2024-01-10", "Asha", "Weeding", "8", "50");
        let err = dash.update_record(input).await.err().unwrap();
        assert_eq!(err.to_string(), "No record selected for editing");
        let err = dash.delete_record().await.err().unwrap();
        assert_eq!(err.to_string(), "No record selected for deletion");
    }

    #[tokio::test]
    async fn test_update_settles_against_refresh() {
        let remote = Arc::new(MemoryRemote::default());
        let id = remote.seed_record(&NewWage::new("2024-01-10", "Asha", "Weeding", 8.0, 50.0));
        let dash = dashboard(remote.clone()).await;
        dash.refresh().await.unwrap();

        let form = dash.open_edit(id).unwrap();
        let mut input = form.input;
        input.hours = "6".into();
        let done = dash.update_record(input).await.unwrap();
        assert!(dash.editing().is_none());
        done.follow_up.settle().await.unwrap();
        assert_eq!(dash.mutation_status(done.mutation_id), Some(MutationStatus::Confirmed));
        assert_eq!(dash.workspace().snapshot()[0].total_wage, 300.0);
    }

    #[tokio::test]
    async fn test_add_worker_rejects_cached_name() {
        let remote = Arc::new(MemoryRemote::default());
        let dash = dashboard(remote.clone()).await;
        let done = dash.add_worker(" Meena ").await.unwrap();
        assert_eq!(done.notice.to_string(), "✓ Worker \"Meena\" added successfully!");
        let err = dash.add_worker("Meena").await.err().unwrap();
        assert_eq!(err.to_string(), "Worker already exists in the list");
        assert_eq!(remote.sent().len(), 1);

        assert_eq!(dash.mutation_status(done.mutation_id), Some(MutationStatus::Sent));
        dash.reload_workers().await.unwrap();
        assert_eq!(dash.mutation_status(done.mutation_id), Some(MutationStatus::Confirmed));
    }

    #[tokio::test]
    async fn test_add_and_delete_task() {
        let remote = Arc::new(MemoryRemote::default());
        let dash = dashboard(remote.clone()).await;
        assert_eq!(dash.add_task("  ").await.err().unwrap().to_string(), "Please enter a task name");

        let done = dash.add_task("Weeding").await.unwrap();
        done.follow_up.settle().await.unwrap();
        assert_eq!(dash.mutation_status(done.mutation_id), Some(MutationStatus::Confirmed));
        assert_eq!(dash.add_task("Weeding").await.err().unwrap().to_string(), "Task already exists");

        let panel = dash.tasks_panel().await.unwrap();
        let (task_id, _, _) = panel.items[0].clone();
        let done = dash.delete_task(task_id, "Weeding").await.unwrap();
        assert_eq!(done.notice.to_string(), "✓ Task deleted successfully!");
        done.follow_up.settle().await.unwrap();
        assert_eq!(dash.mutation_status(done.mutation_id), Some(MutationStatus::Confirmed));
        assert!(dash.workspace().task_suggestions().is_empty());
        assert_eq!(dash.tasks_panel().await.unwrap().placeholder, Some(view::NO_TASKS));
    }

    #[tokio::test]
    async fn test_login_twice_reports_already_logged_in() {
        let remote = Arc::new(MemoryRemote::default());
        let dash = dashboard(remote).await;
        let notice = dash
            .login(&LoginInput { username: "x".into(), password: "y".into() })
            .await
            .unwrap();
        assert_eq!(notice.text, "Already logged in as asha");
        assert_eq!(dash.greeting().as_deref(), Some("Welcome, Asha K!"));
    }

    #[test]
    fn test_dated_input() {
        assert_eq!(WageInput::dated(day("2024-03-05")).date, "2024-03-05");
    }
}
