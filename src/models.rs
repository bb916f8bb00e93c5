use crate::stats::HeatmapPoint;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Visible state of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CellState {
    pub completed: bool,
    pub value: Option<i32>,
}

impl CellState {
    pub fn checked(completed: bool) -> Self {
        Self {
            completed,
            value: None,
        }
    }

    pub fn count(value: i32) -> Self {
        Self {
            completed: value > 0,
            value: Some(value),
        }
    }
}

/// Unit of persistence and of aggregation input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub name: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub value: Option<i32>,
}

impl ActivityRecord {
    pub fn new(name: impl Into<String>, date: NaiveDate, state: CellState) -> Self {
        Self {
            name: name.into(),
            date,
            completed: state.completed,
            value: state.value,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadResponse {
    pub success: bool,
    #[serde(default)]
    pub activities: Vec<ActivityRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveRequest {
    pub activities: Vec<ActivityRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, rename = "activities", alias = "saved_activities")]
    pub saved_activities: Vec<ActivityRecord>,
}

/// Dashboard payload, computed client-side or trusted as-is from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub completion_rate: f64,
    pub best_streak: u32,
    pub activities_count: String,
    pub top_activity: String,
    pub period_label: String,
    pub activity_completion: BTreeMap<String, f64>,
    pub activity_streaks: BTreeMap<String, u32>,
    pub heatmap_data: Vec<HeatmapPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<DashboardStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// Server-side shapes below.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredActivity {
    pub completed: bool,
    pub value: Option<i32>,
    pub created_at: String,
    pub updated_at: String,
}

/// Persisted activity log, keyed by date then activity name.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppData {
    pub activities: BTreeMap<String, BTreeMap<String, StoredActivity>>,
}

#[derive(Debug, Serialize)]
pub struct ActivityEntry {
    #[serde(flatten)]
    pub record: ActivityRecord,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct ActivityListResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub activities: Vec<ActivityEntry>,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub view_type: Option<String>,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub month: Option<u32>,
    pub year: Option<i32>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub student_number: String,
    #[serde(default)]
    pub class_name: String,
}
