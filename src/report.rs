use crate::catalog::{ActivityKey, ActivityKind};
use crate::store::LocalActivityStore;

/// Day columns printed regardless of month length.
pub const REPORT_COLUMNS: u32 = 31;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentInfo {
    pub name: String,
    pub student_number: String,
    pub class_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportCell {
    Empty,
    Checked,
    Count(i32),
    /// Column past the end of the month.
    Hidden,
}

impl ReportCell {
    pub fn is_marked(&self) -> bool {
        match self {
            ReportCell::Checked => true,
            ReportCell::Count(value) => *value > 0,
            ReportCell::Empty | ReportCell::Hidden => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub activity: String,
    pub label: String,
    pub cells: Vec<ReportCell>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSection {
    pub category: String,
    pub rows: Vec<ReportRow>,
}

impl ReportSection {
    /// A category holding only itself is printed as one spanning row.
    pub fn is_standalone(&self) -> bool {
        self.rows.len() == 1 && self.rows[0].activity == self.category
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub student: StudentInfo,
    pub month_name: String,
    pub year: i32,
    pub days_in_month: u32,
    pub sections: Vec<ReportSection>,
}

/// Tabulates the store's visible state for printing.
pub fn format_report(store: &LocalActivityStore, student: StudentInfo) -> Report {
    let month = store.month();
    let days_in_month = month.days_in_month();

    let sections = store
        .catalog()
        .categories()
        .into_iter()
        .map(|(category, definitions)| ReportSection {
            category: category.to_string(),
            rows: definitions
                .into_iter()
                .map(|definition| ReportRow {
                    activity: definition.name.clone(),
                    label: definition.label.clone(),
                    cells: (1..=REPORT_COLUMNS)
                        .map(|day| {
                            if day > days_in_month {
                                return ReportCell::Hidden;
                            }
                            let state = store.cell(&ActivityKey::new(definition.name.clone(), day));
                            match definition.kind {
                                ActivityKind::Numeric => ReportCell::Count(state.value.unwrap_or(0)),
                                ActivityKind::Boolean if state.completed => ReportCell::Checked,
                                ActivityKind::Boolean => ReportCell::Empty,
                            }
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();

    Report {
        student,
        month_name: month.name().to_string(),
        year: month.year(),
        days_in_month,
        sections,
    }
}
