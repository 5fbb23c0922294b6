//! Grouped-series reshaping.
//!
//! Turns a multi-level count aggregation (outer category, sub-keys, count)
//! into a fixed number of parallel series for a grouped (dodged) bar chart.
//!
//! Slots are positional: the i-th row seen for an outer category lands in
//! series i, whatever its sub-keys are. Two categories can therefore put
//! different sub-combinations in the same series. Callers that need series
//! keyed by sub-combination must order their rows so that every category
//! lists the same sub-combinations in the same order.

use crate::data::AggregationRow;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

/// Rows that cannot be laid out into the requested number of series.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReshapeError {
    #[error("category '{category}' has {found} sub-combinations but only {max_slots} series slots are available")]
    SlotOverflow {
        category: String,
        found: usize,
        max_slots: usize,
    },
    #[error("row {index} has no sub-key to label its bar")]
    MissingSubKey { index: usize },
}

/// One bar: its hover label, its height, and the category it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesPoint {
    pub category: String,
    pub label: String,
    pub value: u64,
}

/// All bars sharing a slot position, in category order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Series {
    pub slot: usize,
    pub points: Vec<SeriesPoint>,
}

impl Series {
    pub fn labels(&self) -> Vec<&str> {
        self.points.iter().map(|p| p.label.as_str()).collect()
    }

    pub fn values(&self) -> Vec<u64> {
        self.points.iter().map(|p| p.value).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupedSeries {
    /// Outer categories in first-seen order (the x axis).
    pub categories: Vec<String>,
    /// Exactly `max_slots` series, indexed by slot.
    pub series: Vec<Series>,
}

impl GroupedSeries {
    /// Sum of every bar belonging to `category`.
    pub fn category_total(&self, category: &str) -> u64 {
        self.series
            .iter()
            .flat_map(|s| s.points.iter())
            .filter(|p| p.category == category)
            .map(|p| p.value)
            .sum()
    }

    /// Number of sub-combinations a category occupies.
    pub fn slots_used(&self, category: &str) -> usize {
        self.series
            .iter()
            .filter(|s| s.points.iter().any(|p| p.category == category))
            .count()
    }

    /// True when categories fill different numbers of slots.
    pub fn is_ragged(&self) -> bool {
        let mut used = self.categories.iter().map(|c| self.slots_used(c));
        match used.next() {
            Some(first) => used.any(|n| n != first),
            None => false,
        }
    }

    pub fn max_value(&self) -> u64 {
        self.series
            .iter()
            .flat_map(|s| s.points.iter())
            .map(|p| p.value)
            .max()
            .unwrap_or(0)
    }
}

/// Lay `rows` out into `max_slots` positional series.
///
/// Input order is trusted and never re-sorted: it decides both the category
/// order and which slot each row takes. Rows of a category that reappears
/// later continue that category's slot numbering.
pub fn reshape(rows: &[AggregationRow], max_slots: usize) -> Result<GroupedSeries, ReshapeError> {
    let mut categories: Vec<String> = Vec::new();
    let mut runs: Vec<Vec<&AggregationRow>> = Vec::new();
    let mut run_index: HashMap<&str, usize> = HashMap::new();

    for (index, row) in rows.iter().enumerate() {
        let outer = match row.outer_key() {
            Some(outer) if !row.sub_keys().is_empty() => outer,
            _ => return Err(ReshapeError::MissingSubKey { index }),
        };

        let idx = *run_index.entry(outer).or_insert_with(|| {
            categories.push(outer.to_string());
            runs.push(Vec::new());
            runs.len() - 1
        });
        runs[idx].push(row);
    }

    let mut series: Vec<Series> = (0..max_slots)
        .map(|slot| Series { slot, points: Vec::new() })
        .collect();

    for (category, run) in categories.iter().zip(&runs) {
        if run.len() > max_slots {
            return Err(ReshapeError::SlotOverflow {
                category: category.clone(),
                found: run.len(),
                max_slots,
            });
        }

        for (slot, row) in run.iter().enumerate() {
            series[slot].points.push(SeriesPoint {
                category: category.clone(),
                label: row.sub_keys().join(" "),
                value: row.count,
            });
        }
    }

    Ok(GroupedSeries { categories, series })
}
