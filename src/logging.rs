//! Structured logging for the wage client.
//!
//! Every record is one JSON object per line:
//! 1. Level filtering via `LOG_LEVEL` (trace → error)
//! 2. Domain filtering via `LOG_DOMAINS` (comma-separated list or "all")
//! 3. One run directory per process under `LOG_DIR` with `events.jsonl` and `trace.jsonl`
//!
//! Warnings and errors are echoed to stderr. Stdout belongs to the shell.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

// =============================================================================
// Log Domains
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Remote,  // Endpoint reads and writes
    Store,   // Record Store refresh and reconciliation
    Names,   // Worker/task name caches
    Form,    // Form submissions and validation
    View,    // Rendering
    Session, // Login, registration, logout
    System,  // Startup, shutdown, storage
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Remote => "remote",
            Domain::Store => "store",
            Domain::Names => "names",
            Domain::Form => "form",
            Domain::View => "view",
            Domain::Session => "session",
            Domain::System => "system",
        }
    }

    pub fn is_enabled(&self) -> bool {
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    events: Option<Mutex<BufWriter<File>>>,
    trace: Option<Mutex<BufWriter<File>>>,
}

fn open_log(path: PathBuf) -> Option<Mutex<BufWriter<File>>> {
    match File::create(&path) {
        Ok(f) => Some(Mutex::new(BufWriter::new(f))),
        Err(err) => {
            eprintln!("[log] failed to create {}: {}", path.display(), err);
            None
        }
    }
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let base = std::env::var("LOG_DIR").unwrap_or_else(|_| "out/runs".to_string());
        let mut run_dir = PathBuf::from(base);
        run_dir.push(&run_id);
        if let Err(err) = create_dir_all(&run_dir) {
            eprintln!("[log] failed to create run dir: {}", err);
        }

        let _ = std::fs::write(
            run_dir.join("manifest.json"),
            json!({
                "run_id": run_id,
                "ts": ts_now(),
                "pid": process::id(),
                "log_dir": run_dir.to_string_lossy(),
            })
            .to_string(),
        );

        RunContext {
            events: open_log(run_dir.join("events.jsonl")),
            trace: open_log(run_dir.join("trace.jsonl")),
            run_id,
        }
    })
}

fn sanitize_fields(mut fields: Map<String, Value>) -> Map<String, Value> {
    let redacted = Value::String("[REDACTED]".to_string());
    for key in ["password", "confirm_password", "pin"] {
        if fields.contains_key(key) {
            fields.insert(key.to_string(), redacted.clone());
        }
    }
    fields
}

fn split_fields(mut fields: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut top = Map::new();
    for key in ["action", "mutation_id", "record_id", "msg"] {
        if let Some(value) = fields.remove(key) {
            top.insert(key.to_string(), value);
        }
    }
    (top, fields)
}

fn write_line(writer: &Option<Mutex<BufWriter<File>>>, line: &str) {
    if let Some(writer) = writer {
        if let Ok(mut w) = writer.lock() {
            let _ = writeln!(w, "{}", line);
            let _ = w.flush();
        }
    }
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    let min_level = Level::from_env();
    if level < min_level || !domain.is_enabled() {
        return;
    }

    emit_record(level, domain.as_str(), event, fields);
}

/// Info-level entry keyed by module name.
pub fn json_log(module: &str, fields: Map<String, Value>) {
    emit_record(Level::Info, module, module, fields);
}

fn emit_record(level: Level, component: &str, event: &str, fields: Map<String, Value>) {
    let ctx = ensure_run_context();
    let fields = sanitize_fields(fields);
    let (mut top, data) = split_fields(fields);

    let msg = top.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(ctx.run_id.clone()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(component));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    for (k, v) in top {
        entry.insert(k, v);
    }
    entry.insert("data".to_string(), Value::Object(data));

    let line = Value::Object(entry).to_string();
    match level {
        Level::Trace | Level::Debug => write_line(&ctx.trace, &line),
        _ => write_line(&ctx.events, &line),
    }
    if level >= Level::Warn {
        eprintln!("{}", line);
    }
}

// =============================================================================
// Domain-Specific Logging Helpers
// =============================================================================

pub fn log_remote_read(action: &str, status: u16, items: usize, elapsed_ms: f64) {
    log(
        Level::Debug,
        Domain::Remote,
        "read",
        obj(&[
            ("action", v_str(action)),
            ("status", json!(status)),
            ("items", json!(items)),
            ("elapsed_ms", v_num(elapsed_ms)),
        ]),
    );
}

pub fn log_remote_write(action: &str, body_hash: &str, ack: &str) {
    log(
        Level::Info,
        Domain::Remote,
        "write",
        obj(&[
            ("action", v_str(action)),
            ("body_hash", v_str(body_hash)),
            ("ack", v_str(ack)),
        ]),
    );
}

pub fn log_validation(form: &str, reason: &str) {
    log(
        Level::Debug,
        Domain::Form,
        "validation_failed",
        obj(&[("form", v_str(form)), ("reason", v_str(reason))]),
    );
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Short sha256 fingerprint of a request body, for correlating writes with refreshes.
pub fn params_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..8])
}

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

// =============================================================================
// Timing Scope
// =============================================================================

/// Emits a debug record with the elapsed time when dropped.
pub struct TimedScope {
    domain: Domain,
    label: &'static str,
    started: Instant,
}

impl TimedScope {
    pub fn new(domain: Domain, label: &'static str) -> Self {
        Self {
            domain,
            label,
            started: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for TimedScope {
    fn drop(&mut self) {
        log(
            Level::Trace,
            self.domain,
            "timing",
            obj(&[
                ("label", v_str(self.label)),
                ("elapsed_ms", v_num(self.elapsed_ms())),
            ]),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_redacts_credentials() {
        let fields = obj(&[
            ("username", v_str("asha")),
            ("password", v_str("hunter22")),
            ("pin", v_str("1234")),
        ]);
        let clean = sanitize_fields(fields);
        assert_eq!(clean["username"], v_str("asha"));
        assert_eq!(clean["password"], v_str("[REDACTED]"));
        assert_eq!(clean["pin"], v_str("[REDACTED]"));
    }

    #[test]
    fn test_split_lifts_correlation_keys() {
        let fields = obj(&[
            ("action", v_str("update")),
            ("record_id", json!(7)),
            ("hours", v_num(8.0)),
        ]);
        let (top, data) = split_fields(fields);
        assert!(top.contains_key("action"));
        assert!(top.contains_key("record_id"));
        assert!(data.contains_key("hours"));
        assert!(!data.contains_key("action"));
    }

    #[test]
    fn test_params_hash_is_stable() {
        let a = params_hash(r#"{"action":"delete","id":3}"#);
        let b = params_hash(r#"{"action":"delete","id":3}"#);
        let c = params_hash(r#"{"action":"delete","id":4}"#);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }
}
