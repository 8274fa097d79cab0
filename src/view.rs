//! Projections of the Record Store into tables, summaries and detail views.
//!
//! Everything here is pure. Each view renders as an HTML fragment (`to_html`)
//! and as pipe-separated text for the terminal (`to_text`). Values are echoed
//! into markup unescaped.

use chrono::{FixedOffset, Offset};

use crate::config::DEFAULT_DISPLAY_OFFSET_MINUTES;
use crate::model::{parse_record_date, Task, WageRecord, DISPLAY_DATE_FORMAT};

pub const CURRENCY: &str = "₹";
pub const NO_RECORDS: &str = "No wage records found. Add your first entry above!";
pub const LOAD_ERROR: &str = "Error loading data. Please check your configuration.";
pub const NO_EDIT_RECORDS: &str = "No records found";
pub const NO_WORKER_RECORDS: &str = "No records found for this worker";
pub const NO_TASK_RECORDS: &str = "No work records found for this task";
pub const NO_TASKS: &str = "No tasks found. Add your first task above!";
pub const TASKS_LOAD_ERROR: &str = "Error loading tasks";
pub const SELECT_WORKER: &str = "-- Select a worker --";

const TEXT_SEP: &str = " | ";

// =============================================================================
// Formatting
// =============================================================================

fn default_offset() -> FixedOffset {
    FixedOffset::east_opt(DEFAULT_DISPLAY_OFFSET_MINUTES * 60).unwrap_or_else(|| chrono::Utc.fix())
}

/// `YYYY-MM-DD` (or a stored timestamp) as `DD/MM/YYYY`, in India time.
pub fn format_date_indian(s: &str) -> String {
    format_date_at(s, default_offset())
}

/// Like [`format_date_indian`] with an explicit offset for timestamps.
/// Unrecognised input is returned unchanged.
pub fn format_date_at(s: &str, offset: FixedOffset) -> String {
    match parse_record_date(s, offset) {
        Some(d) => d.format(DISPLAY_DATE_FORMAT).to_string(),
        None => s.to_string(),
    }
}

pub fn format_currency(x: f64) -> String {
    format!("{}{:.2}", CURRENCY, x)
}

/// Shortest form: `8`, `7.5`.
pub fn format_hours(x: f64) -> String {
    format!("{}", x)
}

fn format_total_hours(x: f64) -> String {
    format!("{:.1}", x)
}

// =============================================================================
// Tables
// =============================================================================

/// Data carried by an edit affordance, enough to open the edit form.
#[derive(Debug, Clone, PartialEq)]
pub struct EditAction {
    pub id: u64,
    pub date: String,
    pub worker_name: String,
    pub task_description: String,
    pub hours_worked: f64,
    pub wage_rate: f64,
}

impl EditAction {
    fn from_record(r: &WageRecord) -> Self {
        Self {
            id: r.id,
            date: r.date.clone(),
            worker_name: r.worker_name.clone(),
            task_description: r.task_description.clone(),
            hours_worked: r.hours_worked,
            wage_rate: r.wage_rate,
        }
    }

    fn to_html(&self) -> String {
        format!(
            r#"<button class="btn-edit" data-id="{}" data-date="{}" data-worker="{}" data-task="{}" data-hours="{}" data-rate="{}">✏️ Edit</button>"#,
            self.id,
            self.date,
            self.worker_name,
            self.task_description,
            format_hours(self.hours_worked),
            self.wage_rate
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub cells: Vec<String>,
    pub action: Option<EditAction>,
}

impl Row {
    pub fn to_text(&self) -> String {
        let mut line = self.cells.join(TEXT_SEP);
        if let Some(action) = &self.action {
            line.push_str(TEXT_SEP);
            line.push_str(&format!("#{}", action.id));
        }
        line
    }

    fn to_html(&self) -> String {
        let mut out = String::from("<tr>");
        for cell in &self.cells {
            out.push_str(&format!("<td>{}</td>", cell));
        }
        if let Some(action) = &self.action {
            out.push_str(&format!("<td>{}</td>", action.to_html()));
        }
        out.push_str("</tr>");
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<&'static str>,
    pub rows: Vec<Row>,
    /// Shown instead of rows when set.
    pub placeholder: Option<String>,
}

impl Table {
    fn with_placeholder(columns: Vec<&'static str>, text: &str) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            placeholder: Some(text.to_string()),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder.is_some()
    }

    pub fn to_html(&self) -> String {
        if let Some(text) = &self.placeholder {
            return format!(
                r#"<tr><td colspan="{}" class="no-data">{}</td></tr>"#,
                self.columns.len(),
                text
            );
        }
        self.rows.iter().map(Row::to_html).collect()
    }

    pub fn to_text(&self) -> String {
        let mut lines = vec![self.columns.join(TEXT_SEP)];
        match &self.placeholder {
            Some(text) => lines.push(text.clone()),
            None => lines.extend(self.rows.iter().map(Row::to_text)),
        }
        lines.join("\n")
    }
}

const MAIN_COLUMNS: [&str; 6] = ["Date", "Worker", "Task", "Hours", "Rate", "Total"];
const EDIT_COLUMNS: [&str; 7] = ["Date", "Worker", "Task", "Hours", "Rate", "Total", "Edit"];

fn main_cells(r: &WageRecord, offset: FixedOffset) -> Vec<String> {
    vec![
        format_date_at(&r.date, offset),
        r.worker_name.clone(),
        r.task_description.clone(),
        format_hours(r.hours_worked),
        format_currency(r.wage_rate),
        format_currency(r.total_wage),
    ]
}

pub fn render_table(records: &[WageRecord]) -> Table {
    render_table_at(records, default_offset())
}

pub fn render_table_at(records: &[WageRecord], offset: FixedOffset) -> Table {
    if records.is_empty() {
        return Table::with_placeholder(MAIN_COLUMNS.to_vec(), NO_RECORDS);
    }
    Table {
        columns: MAIN_COLUMNS.to_vec(),
        rows: records
            .iter()
            .map(|r| Row {
                cells: main_cells(r, offset),
                action: None,
            })
            .collect(),
        placeholder: None,
    }
}

/// Main table after a failed refresh.
pub fn render_load_error() -> Table {
    Table::with_placeholder(MAIN_COLUMNS.to_vec(), LOAD_ERROR)
}

pub fn render_edit_table(records: &[WageRecord], offset: FixedOffset) -> Table {
    if records.is_empty() {
        return Table::with_placeholder(EDIT_COLUMNS.to_vec(), NO_EDIT_RECORDS);
    }
    Table {
        columns: EDIT_COLUMNS.to_vec(),
        rows: records
            .iter()
            .map(|r| Row {
                cells: main_cells(r, offset),
                action: Some(EditAction::from_record(r)),
            })
            .collect(),
        placeholder: None,
    }
}

// =============================================================================
// Aggregates
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSummary<'a> {
    pub name: String,
    pub total_earnings: f64,
    pub total_hours: f64,
    pub days: usize,
    /// Earnings per hour. `None` when total hours is zero or not a number.
    pub avg_rate: Option<f64>,
    pub records: Vec<&'a WageRecord>,
}

pub fn worker_summary<'a>(records: &'a [WageRecord], name: &str) -> WorkerSummary<'a> {
    let mine: Vec<&WageRecord> = records.iter().filter(|r| r.worker_name == name).collect();
    let total_earnings: f64 = mine.iter().map(|r| r.total_wage).sum();
    let total_hours: f64 = mine.iter().map(|r| r.hours_worked).sum();
    let avg_rate = if total_hours.is_finite() && total_hours != 0.0 {
        Some(total_earnings / total_hours)
    } else {
        None
    };
    WorkerSummary {
        name: name.to_string(),
        total_earnings,
        total_hours,
        days: mine.len(),
        avg_rate,
        records: mine,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerBreakdown {
    pub worker_name: String,
    pub entries: usize,
    pub hours: f64,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskSummary<'a> {
    pub name: String,
    pub total_cost: f64,
    pub total_hours: f64,
    pub entries: usize,
    /// Per worker, in order of first appearance.
    pub workers: Vec<WorkerBreakdown>,
    pub records: Vec<&'a WageRecord>,
}

pub fn task_summary<'a>(records: &'a [WageRecord], name: &str) -> TaskSummary<'a> {
    let mine: Vec<&WageRecord> = records.iter().filter(|r| r.task_description == name).collect();
    let mut workers: Vec<WorkerBreakdown> = Vec::new();
    for r in &mine {
        match workers.iter_mut().find(|w| w.worker_name == r.worker_name) {
            Some(w) => {
                w.entries += 1;
                w.hours += r.hours_worked;
                w.cost += r.total_wage;
            }
            None => workers.push(WorkerBreakdown {
                worker_name: r.worker_name.clone(),
                entries: 1,
                hours: r.hours_worked,
                cost: r.total_wage,
            }),
        }
    }
    TaskSummary {
        name: name.to_string(),
        total_cost: mine.iter().map(|r| r.total_wage).sum(),
        total_hours: mine.iter().map(|r| r.hours_worked).sum(),
        entries: mine.len(),
        workers,
        records: mine,
    }
}

// =============================================================================
// Detail views
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct StatCard {
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailView {
    pub title: String,
    pub stats: Vec<StatCard>,
    pub history: Table,
    /// Per-worker lines (task detail only).
    pub breakdown: Vec<(String, String)>,
}

impl DetailView {
    pub fn is_empty(&self) -> bool {
        self.history.is_placeholder()
    }

    pub fn stat(&self, label: &str) -> Option<&str> {
        self.stats.iter().find(|s| s.label == label).map(|s| s.value.as_str())
    }

    pub fn to_html(&self) -> String {
        let mut out = format!(r#"<div class="detail"><h2>{}</h2><div class="detail-stats">"#, self.title);
        for s in &self.stats {
            out.push_str(&format!(
                r#"<div class="detail-stat-card"><div class="detail-stat-label">{}</div><div class="detail-stat-value">{}</div></div>"#,
                s.label, s.value
            ));
        }
        out.push_str("</div><table><thead><tr>");
        for c in &self.history.columns {
            out.push_str(&format!("<th>{}</th>", c));
        }
        out.push_str("</tr></thead><tbody>");
        out.push_str(&self.history.to_html());
        out.push_str("</tbody></table>");
        if !self.breakdown.is_empty() {
            out.push_str(r#"<h3>Worker Breakdown</h3><div class="worker-breakdown">"#);
            for (name, stats) in &self.breakdown {
                out.push_str(&format!(
                    r#"<div class="worker-breakdown-item"><div class="worker-breakdown-name">{}</div><div class="worker-breakdown-stats">{}</div></div>"#,
                    name, stats
                ));
            }
            out.push_str("</div>");
        }
        out.push_str("</div>");
        out
    }

    pub fn to_text(&self) -> String {
        let mut lines = vec![self.title.clone()];
        for s in &self.stats {
            lines.push(format!("  {}: {}", s.label, s.value));
        }
        lines.push(self.history.to_text());
        if !self.breakdown.is_empty() {
            lines.push("Worker Breakdown".to_string());
            for (name, stats) in &self.breakdown {
                lines.push(format!("  {}: {}", name, stats));
            }
        }
        lines.join("\n")
    }
}

const WORKER_HISTORY_COLUMNS: [&str; 5] = ["Date", "Task", "Hours", "Rate", "Total"];
const TASK_HISTORY_COLUMNS: [&str; 5] = ["Date", "Worker", "Hours", "Rate (₹)", "Cost (₹)"];

pub fn render_worker_detail(records: &[WageRecord], name: &str, offset: FixedOffset) -> DetailView {
    let s = worker_summary(records, name);
    if s.records.is_empty() {
        return DetailView {
            title: name.to_string(),
            stats: Vec::new(),
            history: Table::with_placeholder(WORKER_HISTORY_COLUMNS.to_vec(), NO_WORKER_RECORDS),
            breakdown: Vec::new(),
        };
    }
    let rows = s
        .records
        .iter()
        .map(|r| Row {
            cells: vec![
                format_date_at(&r.date, offset),
                r.task_description.clone(),
                format_hours(r.hours_worked),
                format_currency(r.wage_rate),
                format_currency(r.total_wage),
            ],
            action: None,
        })
        .collect();
    DetailView {
        title: name.to_string(),
        stats: vec![
            StatCard { label: "Total Earnings", value: format_currency(s.total_earnings) },
            StatCard { label: "Total Hours", value: format_total_hours(s.total_hours) },
            StatCard { label: "Total Days", value: s.days.to_string() },
            StatCard {
                label: "Avg Rate",
                value: s.avg_rate.map(format_currency).unwrap_or_else(|| "n/a".to_string()),
            },
        ],
        history: Table {
            columns: WORKER_HISTORY_COLUMNS.to_vec(),
            rows,
            placeholder: None,
        },
        breakdown: Vec::new(),
    }
}

pub fn render_task_detail(records: &[WageRecord], name: &str, offset: FixedOffset) -> DetailView {
    let s = task_summary(records, name);
    let title = format!("📋 {}", name);
    if s.records.is_empty() {
        return DetailView {
            title,
            stats: Vec::new(),
            history: Table::with_placeholder(TASK_HISTORY_COLUMNS.to_vec(), NO_TASK_RECORDS),
            breakdown: Vec::new(),
        };
    }
    let rows = s
        .records
        .iter()
        .map(|r| Row {
            cells: vec![
                format_date_at(&r.date, offset),
                r.worker_name.clone(),
                format_hours(r.hours_worked),
                format_currency(r.wage_rate),
                format_currency(r.total_wage),
            ],
            action: None,
        })
        .collect();
    DetailView {
        title,
        stats: vec![
            StatCard { label: "Total Cost", value: format_currency(s.total_cost) },
            StatCard { label: "Total Hours", value: format_total_hours(s.total_hours) },
            StatCard { label: "Total Entries", value: s.entries.to_string() },
            StatCard { label: "Workers", value: s.workers.len().to_string() },
        ],
        history: Table {
            columns: TASK_HISTORY_COLUMNS.to_vec(),
            rows,
            placeholder: None,
        },
        breakdown: s
            .workers
            .iter()
            .map(|w| {
                (
                    w.worker_name.clone(),
                    format!(
                        "{} entries • {} hours • {}",
                        w.entries,
                        format_total_hours(w.hours),
                        format_currency(w.cost)
                    ),
                )
            })
            .collect(),
    }
}

// =============================================================================
// Lists
// =============================================================================

fn task_stats(t: &Task, offset: FixedOffset) -> String {
    let mut stats = format!("Used {} times", t.times_used);
    if let Some(last) = &t.last_used_date {
        stats.push_str(&format!(" • Last: {}", format_date_at(last, offset)));
    }
    stats
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskList {
    pub items: Vec<(u64, String, String)>,
    pub placeholder: Option<&'static str>,
}

impl TaskList {
    pub fn to_html(&self) -> String {
        if let Some(text) = self.placeholder {
            return format!(r#"<p class="no-data">{}</p>"#, text);
        }
        self.items
            .iter()
            .map(|(id, name, stats)| {
                format!(
                    r#"<div class="task-item"><div class="task-info"><div class="task-name">{name}</div><div class="task-stats">{stats}</div></div><div class="task-actions"><button class="btn-view-task" data-name="{name}" title="View Details">👁️</button><button class="btn-delete-task" data-id="{id}" data-name="{name}" title="Delete">🗑️</button></div></div>"#
                )
            })
            .collect()
    }

    pub fn to_text(&self) -> String {
        if let Some(text) = self.placeholder {
            return text.to_string();
        }
        self.items
            .iter()
            .map(|(id, name, stats)| format!("#{}{}{}{}{}", id, TEXT_SEP, name, TEXT_SEP, stats))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn render_task_list(tasks: &[Task], offset: FixedOffset) -> TaskList {
    if tasks.is_empty() {
        return TaskList {
            items: Vec::new(),
            placeholder: Some(NO_TASKS),
        };
    }
    TaskList {
        items: tasks
            .iter()
            .map(|t| (t.id, t.name.clone(), task_stats(t, offset)))
            .collect(),
        placeholder: None,
    }
}

pub fn render_task_list_error() -> TaskList {
    TaskList {
        items: Vec::new(),
        placeholder: Some(TASKS_LOAD_ERROR),
    }
}

/// `<option>` list for a name input.
pub fn render_suggestions(names: &[&str]) -> String {
    names
        .iter()
        .map(|n| format!(r#"<option value="{}"></option>"#, n))
        .collect()
}

/// Distinct worker names in the records, sorted.
pub fn distinct_workers(records: &[WageRecord]) -> Vec<String> {
    let mut names: Vec<String> = records.iter().map(|r| r.worker_name.clone()).collect();
    names.sort();
    names.dedup();
    names
}

pub fn render_worker_select(records: &[WageRecord]) -> String {
    let mut out = format!(r#"<option value="">{}</option>"#, SELECT_WORKER);
    for w in distinct_workers(records) {
        out.push_str(&format!(r#"<option value="{0}">{0}</option>"#, w));
    }
    out
}
