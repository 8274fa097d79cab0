use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ClientResult;
use crate::model::{AuthReply, NewWage, Task, WageRecord, WorkerEntry};

pub mod http;
pub mod memory;

pub use http::ScriptEndpoint;
pub use memory::MemoryRemote;

/// Read side of the Remote Store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Full wage record list (`GET` with no action).
    async fn fetch_records(&self) -> ClientResult<Vec<WageRecord>>;
    /// `GET ?action=getWorkers`
    async fn fetch_workers(&self) -> ClientResult<Vec<WorkerEntry>>;
    /// `GET ?action=getTasks`
    async fn fetch_tasks(&self) -> ClientResult<Vec<Task>>;
    /// `POST {action: "login" | "register", ...}`; the only write whose reply is read.
    async fn authenticate(&self, req: &AuthRequest) -> ClientResult<AuthReply>;
}

/// Write side of the Remote Store.
///
/// Every data mutation goes through here. The script endpoint answers with an
/// opaque response, so the only failure visible at this point is transport.
#[async_trait]
pub trait WriteChannel: Send + Sync {
    async fn send(&self, req: &WriteRequest) -> ClientResult<WriteAck>;
}

/// What a write call can tell us about the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAck {
    /// Request left the client; whether the store applied it is unknown.
    Opaque,
    /// The store reported the write as applied.
    Confirmed,
}

impl WriteAck {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteAck::Opaque => "opaque",
            WriteAck::Confirmed => "confirmed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    Create(NewWage),
    Update { id: u64, wage: NewWage },
    Delete { id: u64 },
    AddWorker { worker_name: String },
    AddTask { task_name: String },
    DeleteTask { id: u64 },
}

fn wage_fields(wage: &NewWage) -> serde_json::Map<String, Value> {
    let mut m = serde_json::Map::new();
    m.insert("date".to_string(), json!(wage.date()));
    m.insert("workerName".to_string(), json!(wage.worker_name()));
    m.insert("taskDescription".to_string(), json!(wage.task_description()));
    m.insert("hoursWorked".to_string(), json!(wage.hours_worked()));
    m.insert("wageRate".to_string(), json!(wage.wage_rate()));
    m.insert("totalWage".to_string(), json!(wage.total_wage()));
    m
}

impl WriteRequest {
    /// Action name as logged. Creates carry no action on the wire.
    pub fn action(&self) -> &'static str {
        match self {
            WriteRequest::Create(_) => "create",
            WriteRequest::Update { .. } => "update",
            WriteRequest::Delete { .. } => "delete",
            WriteRequest::AddWorker { .. } => "addWorker",
            WriteRequest::AddTask { .. } => "addTask",
            WriteRequest::DeleteTask { .. } => "deleteTask",
        }
    }

    /// JSON body posted to the endpoint.
    pub fn body(&self) -> Value {
        match self {
            WriteRequest::Create(wage) => Value::Object(wage_fields(wage)),
            WriteRequest::Update { id, wage } => {
                let mut m = serde_json::Map::new();
                m.insert("action".to_string(), json!("update"));
                m.insert("id".to_string(), json!(id));
                m.extend(wage_fields(wage));
                Value::Object(m)
            }
            WriteRequest::Delete { id } => json!({"action": "delete", "id": id}),
            WriteRequest::AddWorker { worker_name } => {
                json!({"action": "addWorker", "workerName": worker_name})
            }
            WriteRequest::AddTask { task_name } => json!({"action": "addTask", "taskName": task_name}),
            WriteRequest::DeleteTask { id } => json!({"action": "deleteTask", "id": id}),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthRequest {
    Login {
        username: String,
        password: String,
    },
    Register {
        pin: String,
        username: String,
        password: String,
        full_name: String,
    },
}

impl AuthRequest {
    pub fn action(&self) -> &'static str {
        match self {
            AuthRequest::Login { .. } => "login",
            AuthRequest::Register { .. } => "register",
        }
    }

    pub fn body(&self) -> Value {
        match self {
            AuthRequest::Login { username, password } => json!({
                "action": "login",
                "username": username,
                "password": password,
            }),
            AuthRequest::Register {
                pin,
                username,
                password,
                full_name,
            } => json!({
                "action": "register",
                "pin": pin,
                "username": username,
                "password": password,
                "fullName": full_name,
            }),
        }
    }
}
