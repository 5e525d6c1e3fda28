//! Domain models for workspaces, KPIs, metrics and the day planner.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Date format used for storage and on the wire.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|_| Error::Validation(format!("invalid date '{s}', expected YYYY-MM-DD")))
}

/// Format a calendar date as `YYYY-MM-DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// A tenant scope under which tasks, wins, KPIs and integrations are grouped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
}

/// How raw metric rows combine into a period total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// Add every value in the period (counters).
    #[default]
    Sum,
    /// Take the most recent value in the period (gauges).
    Last,
}

impl std::fmt::Display for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Aggregation::Sum => write!(f, "sum"),
            Aggregation::Last => write!(f, "last"),
        }
    }
}

impl FromStr for Aggregation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sum" => Ok(Aggregation::Sum),
            "last" => Ok(Aggregation::Last),
            other => Err(Error::Validation(format!(
                "unknown aggregation '{other}', expected 'sum' or 'last'"
            ))),
        }
    }
}

/// A named metric definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpi {
    pub id: String,
    pub name: String,
    pub channel: String,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default)]
    pub aggregation: Aggregation,
}

fn default_unit() -> String {
    "count".to_string()
}

/// A target value for a KPI in a period, optionally scoped to a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub kpi_id: String,
    pub period: crate::Period,
    pub target_value: f64,
    pub workspace_id: Option<String>,
}

impl Goal {
    /// Deterministic goal id for (workspace, kpi, period).
    ///
    /// Global goals read `g_2025_09_k_ig_reach`; workspace goals append the
    /// workspace after `@`, e.g. `g_2025_09_k_ig_reach@w_001`. `%` and `@` in
    /// the KPI id are percent-escaped so distinct scopes never share an id.
    pub fn make_id(workspace_id: Option<&str>, kpi_id: &str, period: crate::Period) -> String {
        let kpi = kpi_id.replace('%', "%25").replace('@', "%40");
        let mut id = format!("g_{:04}_{:02}_{kpi}", period.year(), period.month());
        if let Some(workspace_id) = workspace_id {
            id.push('@');
            id.push_str(workspace_id);
        }
        id
    }
}

/// One observed data point for a KPI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub kpi_id: String,
    pub date: NaiveDate,
    pub value: f64,
    pub source: Option<String>,
    pub workspace_id: Option<String>,
}

/// A single (date, value) sample from the metric series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Marks a (workspace, date) as initialized; its existence means carry-over ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    pub id: Uuid,
    pub workspace_id: String,
    pub date: NaiveDate,
    pub initialized_at: DateTime<Utc>,
}

/// A to-do item scoped to a workspace and a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayTask {
    pub id: Uuid,
    pub workspace_id: String,
    pub date: NaiveDate,
    pub text: String,
    pub done: bool,
    pub carried_from: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl DayTask {
    /// A fresh, not-done task. The text is trimmed and must not be empty.
    pub fn new(workspace_id: &str, date: NaiveDate, text: &str) -> Result<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            workspace_id: workspace_id.to_string(),
            date,
            text: normalize_task_text(text)?,
            done: false,
            carried_from: None,
            created_at: Utc::now(),
        })
    }

    /// A not-done copy of this task on `date`, tagged with the date it came from.
    pub fn carried_to(&self, date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            workspace_id: self.workspace_id.clone(),
            date,
            text: self.text.clone(),
            done: false,
            carried_from: Some(self.date),
            created_at: Utc::now(),
        }
    }
}

/// Trim task text, rejecting empty results.
pub fn normalize_task_text(text: &str) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation("task text must not be empty".to_string()));
    }
    Ok(trimmed.to_string())
}

/// A recorded accomplishment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Win {
    pub id: Uuid,
    pub workspace_id: String,
    pub date: NaiveDate,
    pub title: String,
    pub description: Option<String>,
    /// Comma-separated.
    pub tags: Option<String>,
    pub effort_mins: i64,
}

/// A curated link with detected platform and user tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub id: Uuid,
    pub workspace_id: String,
    pub url: String,
    pub note: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub platform: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored third-party credentials for a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Integration {
    pub id: Uuid,
    pub workspace_id: String,
    pub provider: String,
    pub external_account_id: Option<String>,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Pending OAuth flow context, addressed by an opaque state token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthState {
    pub token: String,
    pub provider: String,
    pub workspace_id: String,
    pub payload: serde_json::Value,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;
