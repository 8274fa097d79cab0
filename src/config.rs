use std::time::Duration;

use chrono::{FixedOffset, NaiveDate, Offset, Utc};

/// Offset used for "today" and for displaying timestamps (India, UTC+05:30).
pub const DEFAULT_DISPLAY_OFFSET_MINUTES: i32 = 330;

#[derive(Clone, Debug)]
pub struct Config {
    /// Remote Store endpoint. `None` means no HTTP store was configured.
    pub script_url: Option<String>,
    /// Use the in-process store instead of HTTP. Nothing it holds survives the process.
    pub memory_store: bool,
    pub sqlite_path: String,
    pub create_refresh_ms: u64,
    pub update_refresh_ms: u64,
    pub delete_refresh_ms: u64,
    pub task_reload_ms: u64,
    pub http_timeout_secs: u64,
    pub display_offset_minutes: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            script_url: None,
            memory_store: false,
            sqlite_path: "./wagebook.sqlite".to_string(),
            create_refresh_ms: 1500,
            update_refresh_ms: 1500,
            delete_refresh_ms: 2000,
            task_reload_ms: 1000,
            http_timeout_secs: 30,
            display_offset_minutes: DEFAULT_DISPLAY_OFFSET_MINUTES,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            script_url: std::env::var("SCRIPT_URL").ok().filter(|v| !v.trim().is_empty()),
            memory_store: std::env::var("WAGEBOOK_MEMORY_STORE").map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes")).unwrap_or(false),
            sqlite_path: std::env::var("SQLITE_PATH").unwrap_or(d.sqlite_path),
            create_refresh_ms: std::env::var("CREATE_REFRESH_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.create_refresh_ms),
            update_refresh_ms: std::env::var("UPDATE_REFRESH_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.update_refresh_ms),
            delete_refresh_ms: std::env::var("DELETE_REFRESH_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.delete_refresh_ms),
            task_reload_ms: std::env::var("TASK_RELOAD_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.task_reload_ms),
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.http_timeout_secs),
            display_offset_minutes: std::env::var("DISPLAY_UTC_OFFSET_MINUTES").ok().and_then(|v| v.parse().ok()).unwrap_or(d.display_offset_minutes),
        }
    }

    /// Config with zero refresh delays, for tests and scripted runs.
    pub fn immediate() -> Self {
        Self {
            create_refresh_ms: 0,
            update_refresh_ms: 0,
            delete_refresh_ms: 0,
            task_reload_ms: 0,
            ..Self::default()
        }
    }

    pub fn display_offset(&self) -> FixedOffset {
        // Out-of-range offsets fall back to UTC.
        FixedOffset::east_opt(self.display_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.display_offset()).date_naive()
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
