// SQLite-backed aggregation source and character import

use crate::data::{AggregationRow, CharacterRecord};
use crate::parser::ast::{AggregationSpec, Column, Direction, OrderKey};
use crate::source::AggregationSource;
use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::Path;
use tracing::{debug, info};

/// Tables read by `SqliteSource` and written by `import_characters`.
/// Existing tables are left untouched.
pub const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS character_titles (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL UNIQUE
    );
    CREATE TABLE IF NOT EXISTS characters (
        id INTEGER PRIMARY KEY,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        race TEXT NOT NULL,
        clan TEXT NOT NULL,
        gender TEXT NOT NULL,
        title_id INTEGER REFERENCES character_titles(id)
    );
";

/// Reads an existing character database.
///
/// Expects `characters(first_name, last_name, race, clan, gender, title_id)`
/// and `character_titles(id, title)`. Counts match `MemorySource` over the
/// same characters: NULL and empty keys group together as `""`, and titles
/// that are empty strings are skipped like untitled characters.
pub struct SqliteSource {
    conn: Connection,
}

impl SqliteSource {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("Failed to open database '{}'", path.display()))?;
        Ok(Self { conn })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }
}

fn column_expr(column: Column) -> &'static str {
    match column {
        Column::FirstName => "COALESCE(characters.first_name, '')",
        Column::LastName => "COALESCE(characters.last_name, '')",
        Column::Race => "COALESCE(characters.race, '')",
        Column::Clan => "COALESCE(characters.clan, '')",
        Column::Gender => "COALESCE(characters.gender, '')",
        Column::Title => "character_titles.title",
    }
}

/// Build the SQL for a validated spec. Only whitelisted column expressions
/// are interpolated.
pub fn build_sql(spec: &AggregationSpec) -> String {
    let cols: Vec<&str> = spec.group_by.iter().map(|c| column_expr(*c)).collect();

    let mut sql = format!("SELECT {}, COUNT(*) AS count FROM characters", cols.join(", "));
    if spec.uses_title() {
        sql.push_str(" INNER JOIN character_titles ON characters.title_id = character_titles.id");
        sql.push_str(" WHERE character_titles.title <> ''");
    }
    sql.push_str(&format!(" GROUP BY {}", cols.join(", ")));

    let mut terms: Vec<String> = spec
        .order_by
        .iter()
        .map(|t| {
            let key = match t.key {
                OrderKey::Column(c) => column_expr(c),
                OrderKey::Count => "count",
            };
            match t.direction {
                Direction::Asc => key.to_string(),
                Direction::Desc => format!("{} DESC", key),
            }
        })
        .collect();
    // Ties fall back to the group key ascending, same as the in-memory source
    for col in &spec.group_by {
        if !spec.order_by.iter().any(|t| t.key == OrderKey::Column(*col)) {
            terms.push(column_expr(*col).to_string());
        }
    }
    sql.push_str(&format!(" ORDER BY {}", terms.join(", ")));

    if let Some(limit) = spec.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    sql
}

impl AggregationSource for SqliteSource {
    fn aggregate(&self, spec: &AggregationSpec) -> Result<Vec<AggregationRow>> {
        spec.validate().map_err(|msg| anyhow!("Invalid query '{}': {}", spec, msg))?;

        let sql = build_sql(spec);
        debug!(%sql, "running aggregation");

        let width = spec.group_by.len();
        let mut stmt = self
            .conn
            .prepare(&sql)
            .with_context(|| format!("Failed to prepare query for '{}'", spec))?;

        let rows = stmt
            .query_map([], |row| {
                let mut keys = Vec::with_capacity(width);
                for idx in 0..width {
                    keys.push(row.get::<_, String>(idx)?);
                }
                let count: i64 = row.get(width)?;
                Ok(AggregationRow {
                    keys,
                    count: u64::try_from(count).unwrap_or(0),
                })
            })
            .with_context(|| format!("Failed to run query for '{}'", spec))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("Failed to read rows for '{}'", spec))?;

        debug!(query = %spec, rows = rows.len(), "aggregated in sqlite");
        Ok(rows)
    }
}

/// Outcome of one `import_characters` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    pub characters: usize,
    pub titles_created: usize,
}

/// Open (or create) a database for writing and make sure the tables exist.
pub fn open_for_import(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database '{}' for writing", path.display()))?;
    create_schema(&conn)?;
    Ok(conn)
}

pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA).context("Failed to create character tables")
}

/// Return the id of `title`, inserting it first when it is new.
fn title_id(conn: &Connection, title: &str, summary: &mut ImportSummary) -> Result<i64> {
    let existing: Option<i64> = conn
        .query_row("SELECT id FROM character_titles WHERE title = ?1", [title], |row| row.get(0))
        .optional()
        .with_context(|| format!("Failed to look up title '{}'", title))?;
    if let Some(id) = existing {
        return Ok(id);
    }

    conn.execute("INSERT INTO character_titles (title) VALUES (?1)", [title])
        .with_context(|| format!("Failed to insert title '{}'", title))?;
    summary.titles_created += 1;
    Ok(conn.last_insert_rowid())
}

/// Append `records` to `characters` in one transaction, reusing title rows
/// that already exist. Nothing is written if any insert fails.
pub fn import_characters(conn: &mut Connection, records: &[CharacterRecord]) -> Result<ImportSummary> {
    let tx = conn.transaction().context("Failed to start import transaction")?;
    let mut summary = ImportSummary::default();
    {
        let mut insert = tx
            .prepare(
                "INSERT INTO characters (first_name, last_name, race, clan, gender, title_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .context("Failed to prepare character insert")?;

        for record in records {
            let title = match record.title.as_deref().filter(|t| !t.is_empty()) {
                Some(title) => Some(title_id(&tx, title, &mut summary)?),
                None => None,
            };
            insert
                .execute(params![
                    record.first_name,
                    record.last_name,
                    record.race,
                    record.clan,
                    record.gender,
                    title,
                ])
                .with_context(|| {
                    format!("Failed to insert character '{} {}'", record.first_name, record.last_name)
                })?;
            summary.characters += 1;
        }
    }
    tx.commit().context("Failed to commit import")?;

    info!(
        characters = summary.characters,
        titles_created = summary.titles_created,
        "imported characters"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_aggregation;
    use crate::source::MemorySource;

    const CHARACTERS: [(&str, &str, &str, &str, &str, Option<&str>); 6] = [
        ("Alphinaud", "Leveilleur", "Elezen", "Wildwood", "Male", Some("Scion")),
        ("Alisaie", "Leveilleur", "Elezen", "Wildwood", "Female", Some("Scion")),
        ("Thancred", "Waters", "Hyur", "Midlander", "Male", None),
        ("Minfilia", "Warde", "Hyur", "Midlander", "Female", Some("Antecedent")),
        ("Urianger", "Augurelt", "Elezen", "Duskwight", "Male", None),
        ("Papalymo", "Totolymo", "Lalafell", "Plainsfolk", "Male", Some("Scion")),
    ];

    fn records() -> Vec<CharacterRecord> {
        CHARACTERS
            .iter()
            .map(|(first, last, race, clan, gender, title)| CharacterRecord {
                first_name: first.to_string(),
                last_name: last.to_string(),
                race: race.to_string(),
                clan: clan.to_string(),
                gender: gender.to_string(),
                title: title.map(str::to_string),
            })
            .collect()
    }

    fn empty_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        conn
    }

    fn sqlite_source() -> SqliteSource {
        let mut conn = empty_db();
        import_characters(&mut conn, &records()).unwrap();
        SqliteSource::from_connection(conn)
    }

    fn count(source: &SqliteSource, query: &str) -> Vec<AggregationRow> {
        source.aggregate(&parse_aggregation(query).unwrap()).unwrap()
    }

    #[test]
    fn test_build_sql_breakdown() {
        let spec = parse_aggregation("count(race, clan, gender) | order(race, clan, gender desc)").unwrap();
        assert_eq!(
            build_sql(&spec),
            "SELECT COALESCE(characters.race, ''), COALESCE(characters.clan, ''), COALESCE(characters.gender, ''), \
             COUNT(*) AS count FROM characters \
             GROUP BY COALESCE(characters.race, ''), COALESCE(characters.clan, ''), COALESCE(characters.gender, '') \
             ORDER BY COALESCE(characters.race, ''), COALESCE(characters.clan, ''), COALESCE(characters.gender, '') DESC"
        );
    }

    #[test]
    fn test_build_sql_title_join() {
        let spec = parse_aggregation("count(title) | order(count desc) | limit(10)").unwrap();
        let sql = build_sql(&spec);
        assert!(sql.contains("INNER JOIN character_titles ON characters.title_id = character_titles.id"));
        assert!(sql.contains("WHERE character_titles.title <> ''"));
        assert!(sql.ends_with("ORDER BY count DESC, character_titles.title LIMIT 10"));
    }

    #[test]
    fn test_build_sql_unordered_uses_key_order() {
        let spec = parse_aggregation("count(race, gender)").unwrap();
        assert!(build_sql(&spec).ends_with("ORDER BY COALESCE(characters.race, ''), COALESCE(characters.gender, '')"));
    }

    #[test]
    fn test_sqlite_matches_memory_source() {
        let sqlite = sqlite_source();
        let memory = MemorySource::new(records());
        for query in [
            "count(gender) | order(gender desc)",
            "count(race) | order(race desc)",
            "count(race, clan, gender) | order(race, clan, gender desc)",
            "count(title) | order(count desc) | limit(10)",
            "count(last_name) | order(count desc) | limit(3)",
        ] {
            let spec = parse_aggregation(query).unwrap();
            assert_eq!(
                sqlite.aggregate(&spec).unwrap(),
                memory.aggregate(&spec).unwrap(),
                "query: {}",
                query
            );
        }
    }

    #[test]
    fn test_null_and_empty_keys_group_together() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE character_titles (id INTEGER PRIMARY KEY, title TEXT);
             CREATE TABLE characters (
                 id INTEGER PRIMARY KEY,
                 first_name TEXT, last_name TEXT, race TEXT, clan TEXT, gender TEXT,
                 title_id INTEGER
             );
             INSERT INTO character_titles (id, title) VALUES (1, ''), (2, 'Scion');
             INSERT INTO characters (first_name, last_name, race, clan, gender, title_id) VALUES
                 ('Ardbert', 'Hyllfyr', NULL, 'Midlander', 'Male', 1),
                 ('Feo', 'Ul', '', 'Wildwood', 'Male', NULL),
                 ('Ryne', 'Waters', 'Hyur', 'Midlander', 'Female', 2);",
        )
        .unwrap();
        let source = SqliteSource::from_connection(conn);

        assert_eq!(
            count(&source, "count(race)"),
            vec![AggregationRow::new([""], 2), AggregationRow::new(["Hyur"], 1)]
        );
        assert_eq!(count(&source, "count(title)"), vec![AggregationRow::new(["Scion"], 1)]);
    }

    #[test]
    fn test_import_reuses_titles() {
        let mut conn = empty_db();
        let first = import_characters(&mut conn, &records()).unwrap();
        assert_eq!(first, ImportSummary { characters: 6, titles_created: 2 });

        let second = import_characters(&mut conn, &records()[..2]).unwrap();
        assert_eq!(second, ImportSummary { characters: 2, titles_created: 0 });

        let titles: i64 = conn
            .query_row("SELECT COUNT(*) FROM character_titles", [], |row| row.get(0))
            .unwrap();
        assert_eq!(titles, 2);

        let source = SqliteSource::from_connection(conn);
        assert_eq!(
            count(&source, "count(title) | order(count desc)"),
            vec![AggregationRow::new(["Scion"], 5), AggregationRow::new(["Antecedent"], 1)]
        );
    }

    #[test]
    fn test_import_skips_empty_title() {
        let mut conn = empty_db();
        let mut record = records().remove(0);
        record.title = Some(String::new());
        let summary = import_characters(&mut conn, &[record]).unwrap();
        assert_eq!(summary.titles_created, 0);

        let title_id: Option<i64> = conn
            .query_row("SELECT title_id FROM characters", [], |row| row.get(0))
            .unwrap();
        assert_eq!(title_id, None);
    }

    #[test]
    fn test_open_missing_database_fails() {
        assert!(SqliteSource::open(Path::new("/nonexistent/gubal.db")).is_err());
    }
}
