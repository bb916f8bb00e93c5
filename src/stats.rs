use crate::calendar::{days_between, week_start, MonthContext};
use crate::catalog::Catalog;
use crate::client::ActivityApi;
use crate::errors::SyncError;
use crate::models::{ActivityRecord, DashboardStats};
use chrono::{Datelike, Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewType {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl ViewType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "yearly" => Some(Self::Yearly),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    pub fn range(&self, today: NaiveDate, month: MonthContext) -> DateRange {
        match self {
            Self::Daily => DateRange::new(today, today),
            Self::Weekly => {
                let start = week_start(today);
                DateRange::new(start, start + Duration::days(6))
            }
            Self::Monthly => DateRange::new(month.first_day(), month.last_day()),
            Self::Yearly => {
                let first = MonthContext::new(1, month.year()).unwrap_or(month);
                let last = MonthContext::new(12, month.year()).unwrap_or(month);
                DateRange::new(first.first_day(), last.last_day())
            }
        }
    }

    pub fn period_label(&self, month: MonthContext) -> String {
        match self {
            Self::Daily => "Today's".to_string(),
            Self::Weekly => "This Week's".to_string(),
            Self::Monthly => format!("{}'s", month.first_day().format("%B")),
            Self::Yearly => format!("{}'s", month.year()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn len(&self) -> u32 {
        if self.end < self.start {
            0
        } else {
            (self.end - self.start).num_days() as u32 + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Coarse colour bucket for the calendar heatmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeatLevel {
    NoData,
    Empty,
    Low,
    Medium,
    High,
    Full,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapPoint {
    pub date: NaiveDate,
    /// `None` when no record exists for the day; `Some(0.0)` when none were completed.
    #[serde(rename = "value")]
    pub intensity_percent: Option<f64>,
}

impl HeatmapPoint {
    pub fn level(&self) -> HeatLevel {
        match self.intensity_percent {
            None => HeatLevel::NoData,
            Some(value) if value <= 0.0 => HeatLevel::Empty,
            Some(value) if value < 25.0 => HeatLevel::Low,
            Some(value) if value < 50.0 => HeatLevel::Medium,
            Some(value) if value < 75.0 => HeatLevel::High,
            Some(_) => HeatLevel::Full,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityStats {
    pub name: String,
    pub completed_days: u32,
    pub recorded_days: u32,
    pub completion_rate: f64,
    /// Completed run ending on the last day of the range.
    pub streak: u32,
    /// Longest completed run anywhere in the range.
    pub longest: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateStats {
    /// Range after clamping to today; rates and streaks use this.
    pub range: DateRange,
    pub period_label: String,
    pub activities: Vec<ActivityStats>,
    pub heatmap: Vec<HeatmapPoint>,
    pub total_records: u32,
    pub total_completed: u32,
}

impl AggregateStats {
    pub fn get(&self, name: &str) -> Option<&ActivityStats> {
        self.activities.iter().find(|stats| stats.name == name)
    }

    /// Highest rate wins; ties go to the earliest activity in catalog order.
    pub fn top_activity(&self) -> Option<&ActivityStats> {
        self.activities.iter().fold(None, |best, stats| match best {
            Some(current) if stats.completion_rate <= current.completion_rate => Some(current),
            _ => Some(stats),
        })
    }

    pub fn best_streak(&self) -> u32 {
        self.activities
            .iter()
            .map(|stats| stats.longest)
            .max()
            .unwrap_or(0)
    }

    pub fn completion_rate(&self) -> f64 {
        percent(self.total_completed, self.total_records)
    }

    pub fn activities_count(&self) -> String {
        format!("{}/{}", self.total_completed, self.total_records)
    }
}

impl From<&AggregateStats> for DashboardStats {
    fn from(stats: &AggregateStats) -> Self {
        DashboardStats {
            completion_rate: stats.completion_rate(),
            best_streak: stats.best_streak(),
            activities_count: stats.activities_count(),
            top_activity: stats
                .top_activity()
                .map(|top| top.name.clone())
                .unwrap_or_else(|| "-".to_string()),
            period_label: stats.period_label.clone(),
            activity_completion: stats
                .activities
                .iter()
                .map(|activity| (activity.name.clone(), activity.completion_rate))
                .collect(),
            activity_streaks: stats
                .activities
                .iter()
                .map(|activity| (activity.name.clone(), activity.streak))
                .collect(),
            heatmap_data: stats.heatmap.clone(),
        }
    }
}

/// Stateless: every call recomputes from the records it is given.
#[derive(Debug, Clone)]
pub struct StatsAggregator {
    catalog: Arc<Catalog>,
}

impl StatsAggregator {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub fn compute_stats(
        &self,
        records: &[ActivityRecord],
        month: MonthContext,
        view: ViewType,
    ) -> AggregateStats {
        self.compute_stats_at(Local::now().date_naive(), records, month, view)
    }

    pub fn compute_stats_at(
        &self,
        today: NaiveDate,
        records: &[ActivityRecord],
        month: MonthContext,
        view: ViewType,
    ) -> AggregateStats {
        let full = view.range(today, month);
        let active = DateRange::new(full.start, full.end.min(today));

        // Last record wins when the same (name, date) appears twice.
        let mut latest: BTreeMap<(&str, NaiveDate), bool> = BTreeMap::new();
        for record in records.iter().filter(|record| full.contains(record.date)) {
            latest.insert((record.name.as_str(), record.date), record.completed);
        }

        let mut per_day: HashMap<NaiveDate, (u32, u32)> = HashMap::new();
        let mut per_name: HashMap<&str, BTreeMap<NaiveDate, bool>> = HashMap::new();
        for (&(name, date), &completed) in &latest {
            let tally = per_day.entry(date).or_default();
            tally.0 += 1;
            tally.1 += u32::from(completed);
            if active.contains(date) {
                per_name.entry(name).or_default().insert(date, completed);
            }
        }

        let mut names: Vec<&str> = per_name.keys().copied().collect();
        names.sort_by_key(|name| (self.catalog.position(name).unwrap_or(usize::MAX), *name));

        let days_in_range = active.len();
        let mut total_records = 0;
        let mut total_completed = 0;
        let activities: Vec<ActivityStats> = names
            .into_iter()
            .map(|name| {
                let days = &per_name[name];
                let recorded_days = days.len() as u32;
                let completed_days = days.values().filter(|done| **done).count() as u32;
                total_records += recorded_days;
                total_completed += completed_days;
                ActivityStats {
                    name: name.to_string(),
                    completed_days,
                    recorded_days,
                    completion_rate: percent(completed_days, days_in_range),
                    streak: current_streak(days, active),
                    longest: longest_run(days, active),
                }
            })
            .collect();

        // Days after today report no data even if something was recorded.
        let heatmap = days_between(full.start, full.end)
            .map(|date| HeatmapPoint {
                date,
                intensity_percent: per_day
                    .get(&date)
                    .filter(|_| date <= today)
                    .map(|(total, completed)| percent(*completed, *total)),
            })
            .collect();

        AggregateStats {
            range: active,
            period_label: view.period_label(month),
            activities,
            heatmap,
            total_records,
            total_completed,
        }
    }

    /// Pulls a fresh snapshot of the view's range and aggregates it.
    pub async fn fetch_stats(
        &self,
        api: &dyn ActivityApi,
        month: MonthContext,
        view: ViewType,
    ) -> Result<AggregateStats, SyncError> {
        let today = Local::now().date_naive();
        let range = view.range(today, month);
        let records = api.load_activities(range.start, range.end).await?;
        Ok(self.compute_stats_at(today, &records, month, view))
    }
}

fn current_streak(days: &BTreeMap<NaiveDate, bool>, range: DateRange) -> u32 {
    if range.is_empty() {
        return 0;
    }
    let mut streak = 0;
    let mut date = range.end;
    while date >= range.start && days.get(&date).copied().unwrap_or(false) {
        streak += 1;
        date -= Duration::days(1);
    }
    streak
}

fn longest_run(days: &BTreeMap<NaiveDate, bool>, range: DateRange) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    for date in days_between(range.start, range.end) {
        if days.get(&date).copied().unwrap_or(false) {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    longest
}

fn percent(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (f64::from(part) * 1000.0 / f64::from(whole)).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn march(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn record(name: &str, day: u32, completed: bool) -> ActivityRecord {
        ActivityRecord {
            name: name.to_string(),
            date: march(day),
            completed,
            value: None,
        }
    }

    fn aggregator() -> StatsAggregator {
        StatsAggregator::new(Catalog::standard())
    }

    fn month() -> MonthContext {
        MonthContext::new(3, 2025).unwrap()
    }

    #[test]
    fn gap_breaks_the_streak() {
        let records = vec![
            record("Subuh", 1, true),
            record("Subuh", 2, true),
            record("Subuh", 3, true),
            record("Subuh", 5, true),
        ];
        let stats = aggregator().compute_stats_at(march(5), &records, month(), ViewType::Monthly);
        let subuh = stats.get("Subuh").unwrap();
        assert_eq!(subuh.streak, 1);
        assert_eq!(subuh.longest, 3);
        assert_eq!(stats.best_streak(), 3);
    }

    #[test]
    fn streak_is_zero_when_last_day_missed() {
        let records = vec![record("Isya", 4, true), record("Isya", 5, false)];
        let stats = aggregator().compute_stats_at(march(5), &records, month(), ViewType::Monthly);
        assert_eq!(stats.get("Isya").unwrap().streak, 0);
    }

    #[test]
    fn completion_rate_uses_days_in_range() {
        let mut records = Vec::new();
        for day in 1..=7 {
            records.push(record("Dhuha", day, day <= 4));
        }
        let stats = aggregator().compute_stats_at(march(10), &records, month(), ViewType::Monthly);
        let dhuha = stats.get("Dhuha").unwrap();
        assert_eq!(stats.range.len(), 10);
        assert_eq!(dhuha.recorded_days, 7);
        assert_eq!(dhuha.completion_rate, 40.0);
        assert_eq!(stats.completion_rate(), 57.1);
        assert_eq!(stats.activities_count(), "4/7");
    }

    #[test]
    fn future_range_yields_zero_rates() {
        let records = vec![record("Subuh", 1, true)];
        let today = NaiveDate::from_ymd_opt(2025, 2, 20).unwrap();
        let stats = aggregator().compute_stats_at(today, &records, month(), ViewType::Monthly);
        assert!(stats.range.is_empty());
        assert!(stats.activities.is_empty());
        assert_eq!(stats.heatmap.len(), 31);
        assert!(stats.heatmap.iter().all(|point| point.intensity_percent.is_none()));
        assert_eq!(stats.heatmap[0].level(), HeatLevel::NoData);
    }

    #[test]
    fn heatmap_hides_days_after_today() {
        let records = vec![record("Subuh", 4, true), record("Subuh", 5, true)];
        let stats = aggregator().compute_stats_at(march(4), &records, month(), ViewType::Monthly);

        assert_eq!(stats.heatmap[3].intensity_percent, Some(100.0));
        assert_eq!(stats.heatmap[4].intensity_percent, None);
        assert_eq!(stats.range.len(), 4);
    }

    #[test]
    fn heatmap_distinguishes_no_data_from_zero() {
        let records = vec![
            record("Subuh", 1, true),
            record("Dzuhur", 1, false),
            record("Subuh", 2, false),
        ];
        let stats = aggregator().compute_stats_at(march(31), &records, month(), ViewType::Monthly);

        assert_eq!(stats.heatmap.len(), 31);
        assert_eq!(stats.heatmap[0].intensity_percent, Some(50.0));
        assert_eq!(stats.heatmap[0].level(), HeatLevel::High);
        assert_eq!(stats.heatmap[1].intensity_percent, Some(0.0));
        assert_eq!(stats.heatmap[1].level(), HeatLevel::Empty);
        assert_eq!(stats.heatmap[2].intensity_percent, None);
        assert_eq!(stats.heatmap[2].level(), HeatLevel::NoData);
    }

    #[test]
    fn top_activity_ties_follow_catalog_order() {
        let records = vec![
            record("Olahraga", 1, true),
            record("Dhuha", 1, true),
            record("Subuh", 1, false),
        ];
        let stats = aggregator().compute_stats_at(march(1), &records, month(), ViewType::Monthly);
        let names: Vec<&str> = stats.activities.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Subuh", "Dhuha", "Olahraga"]);
        assert_eq!(stats.top_activity().unwrap().name, "Dhuha");
    }

    #[test]
    fn duplicate_records_count_once() {
        let records = vec![record("Subuh", 1, false), record("Subuh", 1, true)];
        let stats = aggregator().compute_stats_at(march(1), &records, month(), ViewType::Daily);
        let subuh = stats.get("Subuh").unwrap();
        assert_eq!(subuh.recorded_days, 1);
        assert_eq!(subuh.completion_rate, 100.0);
    }

    #[test]
    fn weekly_range_starts_on_monday() {
        // 2025-03-05 is a Wednesday.
        let range = ViewType::Weekly.range(march(5), month());
        assert_eq!(range.start, march(3));
        assert_eq!(range.end, march(9));
        let yearly = ViewType::Yearly.range(march(5), month());
        assert_eq!(yearly.len(), 365);
    }

    #[test]
    fn dashboard_payload_reflects_aggregate() {
        let records = vec![record("Subuh", 1, true), record("Subuh", 2, true)];
        let stats = aggregator().compute_stats_at(march(2), &records, month(), ViewType::Monthly);
        let payload = DashboardStats::from(&stats);
        assert_eq!(payload.top_activity, "Subuh");
        assert_eq!(payload.activity_streaks["Subuh"], 2);
        assert_eq!(payload.activity_completion["Subuh"], 100.0);
        assert_eq!(payload.period_label, "March's");
        assert_eq!(payload.best_streak, 2);

        let empty = DashboardStats::from(&aggregator().compute_stats_at(
            march(2),
            &[],
            month(),
            ViewType::Monthly,
        ));
        assert_eq!(empty.top_activity, "-");
        assert_eq!(empty.completion_rate, 0.0);
    }
}
