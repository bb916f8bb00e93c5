use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

/// Upper bound for the rak'ah-counted activity.
pub const RAKAAT_MAX: i32 = 12;
/// Upper bound for every other numeric activity.
pub const DEFAULT_NUMERIC_MAX: i32 = 999;

pub const ROWATIB: &str = "Rowatib";
pub const TILAWAH: &str = "Tilawah Qur'an";

/// One (activity, day-of-month) cell of the tracking grid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActivityKey {
    name: String,
    day: u32,
}

impl ActivityKey {
    pub fn new(name: impl Into<String>, day: u32) -> Self {
        Self {
            name: name.into(),
            day,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn day(&self) -> u32 {
        self.day
    }
}

impl fmt::Display for ActivityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.name, self.day)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Boolean,
    Numeric,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityDefinition {
    pub name: String,
    /// Row label inside its category; equals `name` unless the category prefix is dropped.
    pub label: String,
    pub category: String,
    pub kind: ActivityKind,
    /// Only meaningful for numeric activities.
    pub max_value: i32,
}

impl ActivityDefinition {
    pub fn boolean(category: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            label: name.to_string(),
            category: category.to_string(),
            kind: ActivityKind::Boolean,
            max_value: 0,
        }
    }

    pub fn numeric(category: &str, name: &str, max_value: i32) -> Self {
        Self {
            kind: ActivityKind::Numeric,
            max_value,
            ..Self::boolean(category, name)
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn bounds(&self) -> Option<(i32, i32)> {
        match self.kind {
            ActivityKind::Numeric => Some((0, self.max_value)),
            ActivityKind::Boolean => None,
        }
    }
}

/// The static, read-only set of trackable activities, in display order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    definitions: Vec<ActivityDefinition>,
}

static STANDARD: Lazy<Arc<Catalog>> = Lazy::new(|| Arc::new(Catalog::mutabaah()));

impl Catalog {
    pub fn new(definitions: Vec<ActivityDefinition>) -> Self {
        Self { definitions }
    }

    /// Shared instance of the built-in catalog.
    pub fn standard() -> Arc<Catalog> {
        Arc::clone(&STANDARD)
    }

    fn mutabaah() -> Self {
        let mut definitions = Vec::new();
        for name in ["Subuh", "Dzuhur", "Ashar", "Maghrib", "Isya"] {
            definitions.push(ActivityDefinition::boolean("Sholat Wajib", name));
        }
        definitions.push(ActivityDefinition::numeric("Sholat Sunnah", ROWATIB, RAKAAT_MAX));
        definitions.push(ActivityDefinition::boolean("Sholat Sunnah", "Qiyamulail"));
        definitions.push(ActivityDefinition::boolean("Sholat Sunnah", "Dhuha"));
        definitions.push(ActivityDefinition::numeric(TILAWAH, TILAWAH, DEFAULT_NUMERIC_MAX));
        definitions.push(ActivityDefinition::boolean("Puasa", "Puasa"));
        definitions.push(
            ActivityDefinition::boolean("Al-Ma'tsurat", "Al-Ma'tsurat Pagi").with_label("Pagi"),
        );
        definitions.push(
            ActivityDefinition::boolean("Al-Ma'tsurat", "Al-Ma'tsurat Sore").with_label("Sore"),
        );
        for name in [
            "Ar Rahman",
            "Al Waqiah",
            "Ad Dukhan",
            "As Sajadah",
            "Al Mulk",
            "Yaasin",
            "Al Kahfi",
        ] {
            definitions.push(ActivityDefinition::boolean("Wirid Qur'an", name));
        }
        definitions.push(ActivityDefinition::boolean("Olahraga", "Olahraga"));
        Self::new(definitions)
    }

    pub fn definitions(&self) -> &[ActivityDefinition] {
        &self.definitions
    }

    pub fn get(&self, name: &str) -> Option<&ActivityDefinition> {
        self.definitions.iter().find(|definition| definition.name == name)
    }

    /// Definition-order index, used for stable tie-breaking.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.definitions
            .iter()
            .position(|definition| definition.name == name)
    }

    /// Unknown names are treated as boolean activities.
    pub fn classify(&self, name: &str) -> ActivityKind {
        self.get(name)
            .map(|definition| definition.kind)
            .unwrap_or(ActivityKind::Boolean)
    }

    pub fn bounds(&self, name: &str) -> Option<(i32, i32)> {
        self.get(name).and_then(ActivityDefinition::bounds)
    }

    /// Categories in first-appearance order with their activities.
    pub fn categories(&self) -> Vec<(&str, Vec<&ActivityDefinition>)> {
        let mut grouped: Vec<(&str, Vec<&ActivityDefinition>)> = Vec::new();
        for definition in &self.definitions {
            match grouped
                .iter_mut()
                .find(|(category, _)| *category == definition.category)
            {
                Some((_, members)) => members.push(definition),
                None => grouped.push((definition.category.as_str(), vec![definition])),
            }
        }
        grouped
    }
}

pub fn classify(name: &str) -> ActivityKind {
    STANDARD.classify(name)
}

pub fn bounds(name: &str) -> Option<(i32, i32)> {
    STANDARD.bounds(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_activities_are_classified() {
        assert_eq!(classify(ROWATIB), ActivityKind::Numeric);
        assert_eq!(classify(TILAWAH), ActivityKind::Numeric);
        assert_eq!(classify("Subuh"), ActivityKind::Boolean);
        assert_eq!(classify("Unknown Activity"), ActivityKind::Boolean);
    }

    #[test]
    fn bounds_follow_activity_kind() {
        assert_eq!(bounds(ROWATIB), Some((0, 12)));
        assert_eq!(bounds(TILAWAH), Some((0, 999)));
        assert_eq!(bounds("Dhuha"), None);
        assert_eq!(bounds("Unknown Activity"), None);
    }

    #[test]
    fn categories_keep_definition_order() {
        let catalog = Catalog::standard();
        let categories = catalog.categories();
        let names: Vec<&str> = categories.iter().map(|(name, _)| *name).collect();
        assert_eq!(
            names,
            vec![
                "Sholat Wajib",
                "Sholat Sunnah",
                TILAWAH,
                "Puasa",
                "Al-Ma'tsurat",
                "Wirid Qur'an",
                "Olahraga"
            ]
        );
        assert_eq!(categories[0].1.len(), 5);
        assert_eq!(categories[4].1[0].label, "Pagi");
        assert_eq!(catalog.position("Subuh"), Some(0));
    }

    #[test]
    fn keys_compare_by_value() {
        let a = ActivityKey::new("Subuh", 3);
        let b = ActivityKey::new(String::from("Subuh"), 3);
        assert_eq!(a, b);
        assert_ne!(a, ActivityKey::new("Subuh", 4));
        assert_eq!(a.to_string(), "Subuh_3");
    }
}
