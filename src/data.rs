use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};

/// One character as stored upstream. Only the fields the dashboard groups by.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CharacterRecord {
    pub first_name: String,
    pub last_name: String,
    pub race: String,
    pub clan: String,
    pub gender: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// A single output row of a count-by-group query.
///
/// `keys[0]` is the outer category, `keys[1..]` are the sub-keys.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AggregationRow {
    pub keys: Vec<String>,
    pub count: u64,
}

impl AggregationRow {
    pub fn new<K, S>(keys: K, count: u64) -> Self
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            count,
        }
    }

    pub fn outer_key(&self) -> Option<&str> {
        self.keys.first().map(String::as_str)
    }

    pub fn sub_keys(&self) -> &[String] {
        self.keys.get(1..).unwrap_or(&[])
    }
}

/// Aggregation rows together with the names of their key columns.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationTable {
    pub headers: Vec<String>,
    pub rows: Vec<AggregationRow>,
}

impl AggregationTable {
    /// Build a table from string cells, the last column being the count.
    pub fn from_cells(headers: Vec<String>, cells: Vec<Vec<String>>) -> Result<Self> {
        if headers.len() < 2 {
            bail!("Aggregation table needs at least one key column and a count column");
        }
        let key_width = headers.len() - 1;

        let mut rows = Vec::with_capacity(cells.len());
        for (line, record) in cells.into_iter().enumerate() {
            if record.len() != headers.len() {
                bail!(
                    "Row {} has {} fields, expected {}",
                    line + 1,
                    record.len(),
                    headers.len()
                );
            }
            let count = record[key_width].trim().parse::<u64>().map_err(|_| {
                anyhow!("Row {}: count '{}' is not a non-negative integer", line + 1, record[key_width])
            })?;
            rows.push(AggregationRow::new(record.into_iter().take(key_width), count));
        }

        Ok(Self {
            headers: headers[..key_width].to_vec(),
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_accessors() {
        let row = AggregationRow::new(["Hyur", "Midlander", "Male"], 5);
        assert_eq!(row.outer_key(), Some("Hyur"));
        assert_eq!(row.sub_keys(), &["Midlander".to_string(), "Male".to_string()]);

        let empty = AggregationRow::new(Vec::<String>::new(), 0);
        assert_eq!(empty.outer_key(), None);
        assert!(empty.sub_keys().is_empty());
    }

    #[test]
    fn test_from_cells_splits_count_column() {
        let table = AggregationTable::from_cells(
            vec!["race".into(), "clan".into(), "count".into()],
            vec![vec!["Hyur".into(), "Midlander".into(), "12".into()]],
        )
        .unwrap();
        assert_eq!(table.headers, vec!["race", "clan"]);
        assert_eq!(table.rows[0], AggregationRow::new(["Hyur", "Midlander"], 12));
    }

    #[test]
    fn test_from_cells_rejects_bad_count() {
        let err = AggregationTable::from_cells(
            vec!["race".into(), "count".into()],
            vec![vec!["Hyur".into(), "-3".into()]],
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_rows_from_json() {
        let value = json!([
            {"keys": ["Hyur", "Midlander", "Male"], "count": 5},
            {"keys": ["Elezen", "Wildwood", "Female"], "count": 3}
        ]);
        let rows: Vec<AggregationRow> = serde_json::from_value(value).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].outer_key(), Some("Elezen"));
        assert_eq!(rows[1].count, 3);
    }

    #[test]
    fn test_rows_from_json_reject_negative_count() {
        let value = json!([{"keys": ["Hyur"], "count": -1}]);
        assert!(serde_json::from_value::<Vec<AggregationRow>>(value).is_err());
    }
}
