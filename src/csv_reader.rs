// CSV input for character records and pre-aggregated tables

use crate::data::{AggregationTable, CharacterRecord};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Read character records from any reader. The first row must be a header
/// naming the `CharacterRecord` fields; extra columns are ignored.
pub fn read_characters<R: Read>(reader: R) -> Result<Vec<CharacterRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for (idx, result) in csv_reader.deserialize::<CharacterRecord>().enumerate() {
        let mut record = result.with_context(|| format!("Failed to parse character on line {}", idx + 2))?;
        if record.title.as_deref().is_some_and(str::is_empty) {
            record.title = None;
        }
        records.push(record);
    }

    Ok(records)
}

pub fn read_characters_from_path(path: &Path) -> Result<Vec<CharacterRecord>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open character CSV '{}'", path.display()))?;
    read_characters(file)
}

/// Read an aggregation table: key columns followed by a count column.
pub fn read_aggregation_table<R: Read>(reader: R) -> Result<AggregationTable> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .context("Failed to read CSV headers")?
        .iter()
        .map(|s| s.to_string())
        .collect();

    let mut cells = Vec::new();
    for result in csv_reader.records() {
        let record = result.context("Failed to read CSV record")?;
        cells.push(record.iter().map(|s| s.to_string()).collect());
    }

    AggregationTable::from_cells(headers, cells)
}

/// Read an aggregation table from stdin
pub fn read_aggregation_table_from_stdin() -> Result<AggregationTable> {
    read_aggregation_table(io::stdin().lock())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_characters() {
        let data = "first_name,last_name,race,clan,gender,title\n\
                    Alphinaud,Leveilleur,Elezen,Wildwood,Male,Scion\n\
                    Y'shtola,Rhul,Miqote,SunSeeker,Female,\n";
        let records = read_characters(data.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].race, "Elezen");
        assert_eq!(records[0].title.as_deref(), Some("Scion"));
        assert_eq!(records[1].title, None);
    }

    #[test]
    fn test_read_characters_without_title_column() {
        let data = "first_name,last_name,race,clan,gender\nMinfilia,Warde,Hyur,Midlander,Female\n";
        let records = read_characters(data.as_bytes()).unwrap();
        assert_eq!(records[0].title, None);
    }

    #[test]
    fn test_read_characters_missing_column() {
        let data = "first_name,last_name,race\nThancred,Waters,Hyur\n";
        assert!(read_characters(data.as_bytes()).is_err());
    }

    #[test]
    fn test_read_aggregation_table() {
        let data = "race,clan,gender,count\nHyur,Midlander,Male,5\nHyur,Midlander,Female,7\n";
        let table = read_aggregation_table(data.as_bytes()).unwrap();
        assert_eq!(table.headers, vec!["race", "clan", "gender"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1].count, 7);
    }
}
