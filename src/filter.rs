use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::key::normalize;
use crate::models::CalouroStatus;
use crate::pagination::PageState;
use crate::view::StudentViewModel;

/// User-selected criteria. An empty set leaves its dimension unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterState {
    pub q: String,
    pub courses: BTreeSet<String>,
    pub universities: BTreeSet<String>,
    pub units: BTreeSet<String>,
    pub call_numbers: BTreeSet<u32>,
    pub statuses: BTreeSet<CalouroStatus>,
}

/// One value in one dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Course(String),
    University(String),
    Unit(String),
    CallNumber(u32),
    Status(CalouroStatus),
}

impl FilterValue {
    pub fn label(&self) -> String {
        match self {
            FilterValue::Course(course) => format!("Curso: {course}"),
            FilterValue::University(university) => format!("Universidade: {university}"),
            FilterValue::Unit(unit) => format!("Unidade: {unit}"),
            FilterValue::CallNumber(call) => format!("{call}ª chamada"),
            FilterValue::Status(status) => format!("Status: {}", status.label()),
        }
    }
}

impl FilterState {
    pub fn is_empty(&self) -> bool {
        self.q.trim().is_empty()
            && self.courses.is_empty()
            && self.universities.is_empty()
            && self.units.is_empty()
            && self.call_numbers.is_empty()
            && self.statuses.is_empty()
    }

    pub fn contains(&self, value: &FilterValue) -> bool {
        match value {
            FilterValue::Course(v) => self.courses.contains(v),
            FilterValue::University(v) => self.universities.contains(v),
            FilterValue::Unit(v) => self.units.contains(v),
            FilterValue::CallNumber(v) => self.call_numbers.contains(v),
            FilterValue::Status(v) => self.statuses.contains(v),
        }
    }

    pub fn insert(&mut self, value: FilterValue) -> bool {
        match value {
            FilterValue::Course(v) => self.courses.insert(v),
            FilterValue::University(v) => self.universities.insert(v),
            FilterValue::Unit(v) => self.units.insert(v),
            FilterValue::CallNumber(v) => self.call_numbers.insert(v),
            FilterValue::Status(v) => self.statuses.insert(v),
        }
    }

    pub fn remove(&mut self, value: &FilterValue) -> bool {
        match value {
            FilterValue::Course(v) => self.courses.remove(v),
            FilterValue::University(v) => self.universities.remove(v),
            FilterValue::Unit(v) => self.units.remove(v),
            FilterValue::CallNumber(v) => self.call_numbers.remove(v),
            FilterValue::Status(v) => self.statuses.remove(v),
        }
    }

    /// Every selected value, in dimension order.
    pub fn values(&self) -> Vec<FilterValue> {
        let mut values = Vec::new();
        values.extend(self.courses.iter().cloned().map(FilterValue::Course));
        values.extend(self.universities.iter().cloned().map(FilterValue::University));
        values.extend(self.units.iter().cloned().map(FilterValue::Unit));
        values.extend(self.call_numbers.iter().copied().map(FilterValue::CallNumber));
        values.extend(self.statuses.iter().copied().map(FilterValue::Status));
        values
    }

    pub fn matches(&self, row: &StudentViewModel) -> bool {
        fn allows<T: Ord>(set: &BTreeSet<T>, value: &T) -> bool {
            set.is_empty() || set.contains(value)
        }

        allows(&self.courses, &row.course)
            && allows(&self.universities, &row.university)
            && allows(&self.units, &row.campus)
            && allows(&self.call_numbers, &row.chamada)
            && allows(&self.statuses, &row.status)
            && self.matches_query(row)
    }

    fn matches_query(&self, row: &StudentViewModel) -> bool {
        let query = normalize(&self.q);
        if query.is_empty() {
            return true;
        }

        [&row.name, &row.course, &row.university]
            .into_iter()
            .any(|field| normalize(field).contains(&query))
    }
}

/// Keeps the rows that pass every dimension.
pub fn apply_filters(rows: &[StudentViewModel], filters: &FilterState) -> Vec<StudentViewModel> {
    rows.iter().filter(|row| filters.matches(row)).cloned().collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterChip {
    pub label: String,
    /// `None` for informational chips the user cannot remove.
    pub value: Option<FilterValue>,
}

/// Live filter selection together with the page it is showing. Every change
/// to the selection sends the view back to page 1.
#[derive(Debug, Clone)]
pub struct FilterController {
    filters: FilterState,
    page: PageState,
}

impl FilterController {
    pub fn new(items_per_page: u32) -> Self {
        Self {
            filters: FilterState::default(),
            page: PageState::new(items_per_page),
        }
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn page(&self) -> &PageState {
        &self.page
    }

    /// Adds the value if absent, removes it otherwise.
    pub fn toggle(&mut self, value: FilterValue) {
        if !self.filters.remove(&value) {
            self.filters.insert(value);
        }
        self.page.reset();
    }

    pub fn remove(&mut self, value: &FilterValue) {
        self.filters.remove(value);
        self.page.reset();
    }

    pub fn set_query(&mut self, q: impl Into<String>) {
        self.filters.q = q.into();
        self.page.reset();
    }

    /// Drops every criterion in a single step.
    pub fn clear(&mut self) {
        self.replace(FilterState::default());
    }

    /// Swaps the whole selection, e.g. when a saved filter is loaded.
    pub fn replace(&mut self, filters: FilterState) {
        self.filters = filters;
        self.page.reset();
    }

    pub fn go_to_page(&mut self, page: u32) {
        self.page.go_to(page);
    }

    pub fn set_items_per_page(&mut self, items_per_page: u32) {
        self.page.set_items_per_page(items_per_page);
    }

    /// Filters `rows` and records the resulting count for paging.
    pub fn apply(&mut self, rows: &[StudentViewModel]) -> Vec<StudentViewModel> {
        let filtered = apply_filters(rows, &self.filters);
        self.page.set_total_items(filtered.len() as u64);
        filtered
    }

    pub fn chips(&self, auto_tag: Option<&str>) -> Vec<FilterChip> {
        let mut chips: Vec<FilterChip> = auto_tag
            .into_iter()
            .map(|tag| FilterChip {
                label: tag.to_string(),
                value: None,
            })
            .collect();

        if !self.filters.q.trim().is_empty() {
            chips.push(FilterChip {
                label: format!("Busca: {}", self.filters.q.trim()),
                value: None,
            });
        }

        chips.extend(self.filters.values().into_iter().map(|value| FilterChip {
            label: value.label(),
            value: Some(value),
        }));
        chips
    }
}
