// Aggregation sources: where dashboard rows come from

use crate::data::{AggregationRow, CharacterRecord};
use crate::parser::ast::{AggregationSpec, Column, Direction, OrderKey};
use anyhow::{anyhow, Result};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

/// Executes count-by-group queries.
///
/// Implementations must return rows in the order the query asks for; the
/// reshaper assigns series slots from that order.
pub trait AggregationSource {
    fn aggregate(&self, spec: &AggregationSpec) -> Result<Vec<AggregationRow>>;
}

/// Counts over records held in memory, typically loaded from CSV.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: Vec<CharacterRecord>,
}

impl MemorySource {
    pub fn new(records: Vec<CharacterRecord>) -> Self {
        Self { records }
    }
}

fn column_value(record: &CharacterRecord, column: Column) -> Option<&str> {
    match column {
        Column::FirstName => Some(record.first_name.as_str()),
        Column::LastName => Some(record.last_name.as_str()),
        Column::Race => Some(record.race.as_str()),
        Column::Clan => Some(record.clan.as_str()),
        Column::Gender => Some(record.gender.as_str()),
        // Untitled characters have no row to join against
        Column::Title => record.title.as_deref().filter(|t| !t.is_empty()),
    }
}

impl AggregationSource for MemorySource {
    fn aggregate(&self, spec: &AggregationSpec) -> Result<Vec<AggregationRow>> {
        spec.validate().map_err(|msg| anyhow!("Invalid query '{}': {}", spec, msg))?;

        let mut counts: HashMap<Vec<&str>, u64> = HashMap::new();
        'records: for record in &self.records {
            let mut key = Vec::with_capacity(spec.group_by.len());
            for col in &spec.group_by {
                match column_value(record, *col) {
                    Some(v) => key.push(v),
                    None => continue 'records,
                }
            }
            *counts.entry(key).or_default() += 1;
        }

        let mut rows: Vec<AggregationRow> = counts
            .into_iter()
            .map(|(key, count)| AggregationRow::new(key, count))
            .collect();
        rows.sort_by(|a, b| compare_rows(spec, a, b));

        if let Some(limit) = spec.limit {
            rows.truncate(limit);
        }

        debug!(query = %spec, rows = rows.len(), "aggregated in memory");
        Ok(rows)
    }
}

/// Order two rows by the query's order terms, then by key ascending.
fn compare_rows(spec: &AggregationSpec, a: &AggregationRow, b: &AggregationRow) -> Ordering {
    for term in &spec.order_by {
        let ord = match term.key {
            OrderKey::Count => a.count.cmp(&b.count),
            OrderKey::Column(col) => match spec.key_position(col) {
                Some(pos) => a.keys[pos].cmp(&b.keys[pos]),
                None => Ordering::Equal,
            },
        };
        let ord = match term.direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.keys.cmp(&b.keys)
}
