use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Date format of the form's date input and of create/update bodies.
pub const INPUT_DATE_FORMAT: &str = "%Y-%m-%d";
pub const DISPLAY_DATE_FORMAT: &str = "%d/%m/%Y";

/// One wage entry as held by the Remote Store.
///
/// `total_wage` is whatever the store echoes back; it is never recomputed on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WageRecord {
    #[serde(deserialize_with = "lenient_id")]
    pub id: u64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub worker_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub task_description: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub hours_worked: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub wage_rate: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_wage: f64,
}

/// A wage entry before it has been persisted. Has no id.
///
/// The total is derived here and nowhere else; there is no way to supply it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWage {
    date: String,
    worker_name: String,
    task_description: String,
    hours_worked: f64,
    wage_rate: f64,
    total_wage: f64,
}

impl NewWage {
    pub fn new(date: &str, worker_name: &str, task_description: &str, hours_worked: f64, wage_rate: f64) -> Self {
        Self {
            date: date.to_string(),
            worker_name: worker_name.to_string(),
            task_description: task_description.to_string(),
            hours_worked,
            wage_rate,
            total_wage: hours_worked * wage_rate,
        }
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn worker_name(&self) -> &str {
        &self.worker_name
    }

    pub fn task_description(&self) -> &str {
        &self.task_description
    }

    pub fn hours_worked(&self) -> f64 {
        self.hours_worked
    }

    pub fn wage_rate(&self) -> f64 {
        self.wage_rate
    }

    pub fn total_wage(&self) -> f64 {
        self.total_wage
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(deserialize_with = "lenient_id")]
    pub id: u64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub times_used: f64,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub last_used_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorkerEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
}

/// Reply to `login` and `register`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub user_id: Option<String>,
}

impl WageRecord {
    /// Whether this record carries the fields of `wage` (used to reconcile writes).
    pub fn carries(&self, wage: &NewWage, offset: FixedOffset) -> bool {
        same_day(&self.date, &wage.date, offset)
            && self.worker_name == wage.worker_name
            && self.task_description == wage.task_description
            && approx_eq(self.hours_worked, wage.hours_worked)
            && approx_eq(self.wage_rate, wage.wage_rate)
            && approx_eq(self.total_wage, wage.total_wage)
    }
}

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

fn same_day(a: &str, b: &str, offset: FixedOffset) -> bool {
    match (parse_record_date(a, offset), parse_record_date(b, offset)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Calendar date of a stored date string.
///
/// Accepts `YYYY-MM-DD`, `DD/MM/YYYY`, and RFC 3339 timestamps (which the
/// spreadsheet emits for date cells), the latter shifted into `offset`.
pub fn parse_record_date(s: &str, offset: FixedOffset) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, INPUT_DATE_FORMAT) {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, DISPLAY_DATE_FORMAT) {
        return Some(d);
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&offset).date_naive())
}

// =============================================================================
// Lenient decoding: spreadsheet cells arrive as numbers or strings
// =============================================================================

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        Value::Null => 0.0,
        _ => f64::NAN,
    })
}

fn lenient_id<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    use serde::de::Error;
    match Value::deserialize(d)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .ok_or_else(|| D::Error::custom(format!("invalid id {}", n))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("invalid id {:?}", s))),
        other => Err(D::Error::custom(format!("invalid id {}", other))),
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(330 * 60).unwrap()
    }

    #[test]
    fn test_total_is_exact_product() {
        let w = NewWage::new("2024-01-10", "Asha", "Weeding", 7.3, 41.7);
        assert_eq!(w.total_wage(), 7.3 * 41.7);
    }

    #[test]
    fn test_new_wage_serializes_camel_case_without_id() {
        let w = NewWage::new("2024-01-10", "Asha", "Weeding", 8.0, 50.0);
        let v = serde_json::to_value(&w).unwrap();
        assert_eq!(v["workerName"], "Asha");
        assert_eq!(v["totalWage"], 400.0);
        assert!(v.get("id").is_none());
    }

    #[test]
    fn test_record_accepts_string_cells() {
        let r: WageRecord = serde_json::from_str(
            r#"{"id":"4","date":"2024-01-10","workerName":"Asha","taskDescription":"Weeding",
                "hoursWorked":"8","wageRate":50,"totalWage":"400"}"#,
        )
        .unwrap();
        assert_eq!(r.id, 4);
        assert_eq!(r.hours_worked, 8.0);
        assert_eq!(r.total_wage, 400.0);
    }

    #[test]
    fn test_blank_cells_decode_as_zero() {
        let r: WageRecord = serde_json::from_str(
            r#"{"id":5,"date":"2024-01-10","workerName":"Asha","taskDescription":"Weeding",
                "hoursWorked":"","wageRate":"  ","totalWage":"400"}"#,
        )
        .unwrap();
        assert_eq!(r.hours_worked, 0.0);
        assert_eq!(r.wage_rate, 0.0);
        assert_eq!(r.total_wage, 400.0);
    }

    #[test]
    fn test_record_total_is_not_recomputed() {
        let r: WageRecord = serde_json::from_str(
            r#"{"id":1,"date":"2024-01-10","workerName":"A","taskDescription":"T",
                "hoursWorked":2,"wageRate":10,"totalWage":25}"#,
        )
        .unwrap();
        assert_eq!(r.total_wage, 25.0);
    }

    #[test]
    fn test_task_without_last_used() {
        let t: Task = serde_json::from_str(r#"{"id":2,"name":"Pruning","timesUsed":0,"lastUsedDate":""}"#).unwrap();
        assert_eq!(t.last_used_date, None);
        let t: Task = serde_json::from_str(r#"{"id":2,"name":"Pruning","timesUsed":3}"#).unwrap();
        assert_eq!(t.times_used, 3.0);
        assert_eq!(t.last_used_date, None);
    }

    #[test]
    fn test_auth_reply_numeric_user_id() {
        let r: AuthReply = serde_json::from_str(r#"{"success":true,"fullName":"Asha K","userId":17}"#).unwrap();
        assert!(r.success);
        assert_eq!(r.user_id.as_deref(), Some("17"));
    }

    #[test]
    fn test_parse_record_date_forms() {
        let want = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        assert_eq!(parse_record_date("2024-01-10", ist()), Some(want));
        assert_eq!(parse_record_date("10/01/2024", ist()), Some(want));
        // Midnight IST stored by the sheet as the previous evening in UTC.
        assert_eq!(parse_record_date("2024-01-09T18:30:00.000Z", ist()), Some(want));
        assert_eq!(parse_record_date("someday", ist()), None);
    }

    #[test]
    fn test_record_carries_submitted_fields() {
        let w = NewWage::new("2024-01-10", "Asha", "Weeding", 8.0, 50.0);
        let r = WageRecord {
            id: 9,
            date: "2024-01-09T18:30:00.000Z".to_string(),
            worker_name: "Asha".to_string(),
            task_description: "Weeding".to_string(),
            hours_worked: 8.0,
            wage_rate: 50.0,
            total_wage: 400.0,
        };
        assert!(r.carries(&w, ist()));
        let other = WageRecord { worker_name: "asha".to_string(), ..r };
        assert!(!other.carries(&w, ist()));
    }
}
