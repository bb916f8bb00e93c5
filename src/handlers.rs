use crate::calendar::{parse_date, MonthContext};
use crate::errors::AppError;
use crate::models::{
    ActivityListResponse, ActivityRecord, DashboardQuery, DashboardResponse, DashboardStats,
    RangeQuery, ReportQuery,
};
use crate::report::{format_report, StudentInfo};
use crate::state::AppState;
use crate::stats::{StatsAggregator, ViewType};
use crate::storage::persist_data;
use crate::store::LocalActivityStore;
use crate::ui::render_report;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    response::Html,
    Json,
};
use chrono::{Datelike, Local, NaiveDate};
use serde_json::Value;
use tracing::{debug, info};

pub async fn list_activities(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<ActivityListResponse>, AppError> {
    let (Some(start), Some(end)) = (query.start, query.end) else {
        return Err(AppError::bad_request("Start and end dates are required"));
    };
    let (Some(start), Some(end)) = (parse_date(&start), parse_date(&end)) else {
        return Err(AppError::bad_request("Invalid date format. Use YYYY-MM-DD"));
    };

    let data = state.data.lock().await;
    Ok(Json(ActivityListResponse {
        success: true,
        message: None,
        activities: data.entries_between(start, end),
    }))
}

pub async fn save_activities(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ActivityListResponse>, AppError> {
    let Json(payload) = payload.map_err(|rejection| {
        debug!(error = %rejection, "save body rejected");
        AppError::bad_request("Request must be JSON")
    })?;
    let records = validate_activities(&payload)?;

    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let mut data = state.data.lock().await;
    let mut updated = data.clone();
    let saved: Vec<_> = records
        .iter()
        .map(|record| updated.upsert(record, &now))
        .collect();

    persist_data(&state.data_path, &updated).await?;
    *data = updated;
    info!(count = records.len(), "activities saved");

    Ok(Json(ActivityListResponse {
        success: true,
        message: Some("Activities saved successfully".to_string()),
        activities: saved,
    }))
}

pub async fn dashboard_stats(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardResponse>, AppError> {
    let today = Local::now().date_naive();
    let view = match query.view_type.as_deref() {
        None => ViewType::default(),
        Some(raw) => ViewType::parse(raw)
            .ok_or_else(|| AppError::bad_request(format!("Unknown view type: {raw}")))?,
    };
    let month = month_or_today(query.month, query.year, today)?;

    let range = view.range(today, month);
    let records = state.data.lock().await.records_between(range.start, range.end);
    let stats = StatsAggregator::new(state.catalog.clone()).compute_stats_at(today, &records, month, view);
    debug!(view = view.as_str(), month = %month, records = records.len(), "dashboard stats computed");

    Ok(Json(DashboardResponse {
        success: true,
        stats: Some(DashboardStats::from(&stats)),
        message: None,
    }))
}

pub async fn report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Html<String>, AppError> {
    let month = month_or_today(query.month, query.year, Local::now().date_naive())?;
    let records = state
        .data
        .lock()
        .await
        .records_between(month.first_day(), month.last_day());

    let mut store = LocalActivityStore::new(state.catalog.clone(), month);
    store.hydrate(&records, month).map_err(AppError::internal)?;
    let report = format_report(
        &store,
        StudentInfo {
            name: query.name,
            student_number: query.student_number,
            class_name: query.class_name,
        },
    );

    Ok(Html(render_report(&report)))
}

/// Rejects the whole batch on the first malformed entry.
fn validate_activities(payload: &Value) -> Result<Vec<ActivityRecord>, AppError> {
    let activities = match payload.get("activities") {
        None | Some(Value::Null) => {
            return Err(AppError::bad_request("No activities data provided"));
        }
        Some(Value::Array(items)) if !items.is_empty() => items,
        Some(_) => return Err(AppError::bad_request("Activities must be a non-empty array")),
    };

    activities.iter().map(validate_activity).collect()
}

fn validate_activity(raw: &Value) -> Result<ActivityRecord, AppError> {
    let name = raw.get("name").and_then(Value::as_str).filter(|name| !name.is_empty());
    let date = raw.get("date").and_then(Value::as_str).filter(|date| !date.is_empty());
    let (Some(name), Some(date)) = (name, date) else {
        return Err(AppError::bad_request("Each activity must have name and date"));
    };
    let parsed: NaiveDate = parse_date(date).ok_or_else(|| {
        AppError::bad_request(format!(
            "Invalid date format for {name}: {date}. Use YYYY-MM-DD"
        ))
    })?;

    let completed = match raw.get("completed") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(completed)) => *completed,
        Some(other) => {
            return Err(AppError::bad_request(format!(
                "Invalid completed flag for {name}: {other}. Use true or false"
            )));
        }
    };
    let value = match raw.get("value") {
        None | Some(Value::Null) => None,
        Some(other) => Some(
            other
                .as_i64()
                .and_then(|value| i32::try_from(value).ok())
                .ok_or_else(|| {
                    AppError::bad_request(format!(
                        "Invalid value for {name}: {other}. Use a whole number"
                    ))
                })?,
        ),
    };

    Ok(ActivityRecord {
        name: name.to_string(),
        date: parsed,
        completed,
        value,
    })
}

fn month_or_today(
    month: Option<u32>,
    year: Option<i32>,
    today: NaiveDate,
) -> Result<MonthContext, AppError> {
    let month_number = month.unwrap_or_else(|| today.month());
    let year = year.unwrap_or_else(|| today.year());
    MonthContext::new(month_number, year)
        .ok_or_else(|| AppError::bad_request(format!("Invalid month: {month_number}/{year}")))
}
