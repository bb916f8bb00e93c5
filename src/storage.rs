use crate::calendar::{date_key, parse_date};
use crate::errors::AppError;
use crate::models::{ActivityEntry, ActivityRecord, AppData, StoredActivity};
use chrono::NaiveDate;
use std::path::Path;
use tokio::fs;
use tracing::error;

pub async fn load_data(path: &Path) -> AppData {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(data) => data,
            Err(err) => {
                error!("failed to parse data file: {err}");
                AppData::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => AppData::default(),
        Err(err) => {
            error!("failed to read data file: {err}");
            AppData::default()
        }
    }
}

pub async fn persist_data(path: &Path, data: &AppData) -> Result<(), AppError> {
    let payload = serde_json::to_vec_pretty(data).map_err(AppError::internal)?;
    fs::write(path, payload).await.map_err(AppError::internal)?;
    Ok(())
}

impl AppData {
    /// Inclusive date range, ordered by date then name.
    pub fn entries_between(&self, start: NaiveDate, end: NaiveDate) -> Vec<ActivityEntry> {
        if end < start {
            return Vec::new();
        }
        self.activities
            .range(date_key(start)..=date_key(end))
            .filter_map(|(day, by_name)| parse_date(day).map(|date| (date, by_name)))
            .flat_map(|(date, by_name)| {
                by_name.iter().map(move |(name, stored)| ActivityEntry {
                    record: ActivityRecord {
                        name: name.clone(),
                        date,
                        completed: stored.completed,
                        value: stored.value,
                    },
                    created_at: stored.created_at.clone(),
                    updated_at: stored.updated_at.clone(),
                })
            })
            .collect()
    }

    pub fn records_between(&self, start: NaiveDate, end: NaiveDate) -> Vec<ActivityRecord> {
        self.entries_between(start, end)
            .into_iter()
            .map(|entry| entry.record)
            .collect()
    }

    /// Inserts or updates by (name, date); `now` stamps the change.
    pub fn upsert(&mut self, record: &ActivityRecord, now: &str) -> ActivityEntry {
        let by_name = self.activities.entry(date_key(record.date)).or_default();
        let stored = by_name
            .entry(record.name.clone())
            .and_modify(|stored| {
                stored.completed = record.completed;
                stored.value = record.value;
                stored.updated_at = now.to_string();
            })
            .or_insert_with(|| StoredActivity {
                completed: record.completed,
                value: record.value,
                created_at: now.to_string(),
                updated_at: now.to_string(),
            });

        ActivityEntry {
            record: record.clone(),
            created_at: stored.created_at.clone(),
            updated_at: stored.updated_at.clone(),
        }
    }
}
