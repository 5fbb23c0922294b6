//! The fixed set of dashboard panels.
//!
//! Every panel is computed once, up front, from a single aggregation source.

use crate::config::DashboardConfig;
use crate::data::AggregationRow;
use crate::graph::{Chart, DonutChart, DonutStyle, GroupedBarChart};
use crate::parser::{parse_aggregation, AggregationSpec};
use crate::reshape::reshape;
use crate::source::AggregationSource;
use anyhow::{Context, Result};
use tracing::{debug, info, warn};

pub const GENDER_QUERY: &str = "count(gender) | order(gender desc)";
pub const RACE_QUERY: &str = "count(race) | order(race desc)";
pub const BREAKDOWN_QUERY: &str = "count(race, clan, gender) | order(race, clan, gender desc)";

/// Slice colours of the gender donut
pub const GENDER_COLORS: [&str; 2] = ["#00CCFF", "#FF0099"];

/// Selects one chart panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ChartKind {
    Gender,
    Race,
    Breakdown,
}

/// A ranked count table such as "Top 10 Titles"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopTable {
    pub heading: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TopTable {
    pub fn from_rows(heading: impl Into<String>, spec: &AggregationSpec, rows: &[AggregationRow]) -> Self {
        Self {
            heading: heading.into(),
            columns: spec.headers(),
            rows: rows
                .iter()
                .map(|r| {
                    let mut cells = r.keys.clone();
                    cells.push(r.count.to_string());
                    cells
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    pub gender: Chart,
    pub race: Chart,
    pub breakdown: Chart,
    pub tables: Vec<TopTable>,
}

impl Dashboard {
    pub fn chart(&self, kind: ChartKind) -> &Chart {
        match kind {
            ChartKind::Gender => &self.gender,
            ChartKind::Race => &self.race,
            ChartKind::Breakdown => &self.breakdown,
        }
    }
}

fn run(source: &dyn AggregationSource, query: &str) -> Result<(AggregationSpec, Vec<AggregationRow>)> {
    let spec = parse_aggregation(query)?;
    let rows = source
        .aggregate(&spec)
        .with_context(|| format!("Query '{}' failed", query))?;
    debug!(query, rows = rows.len(), "query complete");
    Ok((spec, rows))
}

fn donut(title: &str, rows: Vec<AggregationRow>, colors: &[&str]) -> Chart {
    Chart::Donut(DonutChart {
        title: title.to_string(),
        slices: rows
            .into_iter()
            .map(|r| (r.keys.join(" "), r.count))
            .collect(),
        style: DonutStyle {
            colors: colors.iter().map(|c| c.to_string()).collect(),
            ..DonutStyle::default()
        },
    })
}

pub fn build_gender_chart(source: &dyn AggregationSource) -> Result<Chart> {
    let (_, rows) = run(source, GENDER_QUERY)?;
    Ok(donut("Gender", rows, &GENDER_COLORS))
}

pub fn build_race_chart(source: &dyn AggregationSource) -> Result<Chart> {
    let (_, rows) = run(source, RACE_QUERY)?;
    Ok(donut("Race", rows, &[]))
}

pub fn build_breakdown_chart(source: &dyn AggregationSource, config: &DashboardConfig) -> Result<Chart> {
    let (_, rows) = run(source, BREAKDOWN_QUERY)?;
    let data = reshape(&rows, config.breakdown_slots).context("Failed to lay out breakdown chart")?;

    if data.is_ragged() {
        warn!(
            categories = data.categories.len(),
            "breakdown categories have differing sub-combinations; series mix clans and genders"
        );
    }

    Ok(Chart::GroupedBar(GroupedBarChart {
        title: "Breakdown".to_string(),
        data,
        show_labels: true,
    }))
}

/// Top-N query for one column, most frequent first
pub fn top_query(column: &str, limit: usize) -> String {
    format!("count({}) | order(count desc) | limit({})", column, limit)
}

pub fn build_top_table(source: &dyn AggregationSource, heading: &str, column: &str, limit: usize) -> Result<TopTable> {
    let query = top_query(column, limit);
    let (spec, rows) = run(source, &query)?;
    Ok(TopTable::from_rows(heading, &spec, &rows))
}

/// Build one chart panel without running the other queries.
pub fn build_chart(source: &dyn AggregationSource, kind: ChartKind, config: &DashboardConfig) -> Result<Chart> {
    match kind {
        ChartKind::Gender => build_gender_chart(source),
        ChartKind::Race => build_race_chart(source),
        ChartKind::Breakdown => build_breakdown_chart(source, config),
    }
}

/// Run every dashboard query and lay out the results.
pub fn build_dashboard(source: &dyn AggregationSource, config: &DashboardConfig) -> Result<Dashboard> {
    let limit = config.top_limit;

    let dashboard = Dashboard {
        gender: build_gender_chart(source)?,
        race: build_race_chart(source)?,
        breakdown: build_breakdown_chart(source, config)?,
        tables: vec![
            build_top_table(source, &format!("Top {} Titles", limit), "title", limit)?,
            build_top_table(source, &format!("Top {} First Names", limit), "first_name", limit)?,
            build_top_table(source, &format!("Top {} Last Names", limit), "last_name", limit)?,
        ],
    };

    info!(tables = dashboard.tables.len(), "dashboard built");
    Ok(dashboard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CharacterRecord;
    use crate::reshape::ReshapeError;
    use crate::source::MemorySource;

    fn character(first: &str, last: &str, race: &str, clan: &str, gender: &str, title: Option<&str>) -> CharacterRecord {
        CharacterRecord {
            first_name: first.to_string(),
            last_name: last.to_string(),
            race: race.to_string(),
            clan: clan.to_string(),
            gender: gender.to_string(),
            title: title.map(str::to_string),
        }
    }

    fn source() -> MemorySource {
        MemorySource::new(vec![
            character("Alphinaud", "Leveilleur", "Elezen", "Wildwood", "Male", Some("Scion")),
            character("Alisaie", "Leveilleur", "Elezen", "Wildwood", "Female", Some("Scion")),
            character("Thancred", "Waters", "Hyur", "Midlander", "Male", None),
            character("Minfilia", "Warde", "Hyur", "Midlander", "Female", Some("Antecedent")),
            character("Urianger", "Augurelt", "Elezen", "Duskwight", "Male", None),
        ])
    }

    #[test]
    fn test_gender_chart() {
        let chart = build_gender_chart(&source()).unwrap();
        match chart {
            Chart::Donut(d) => {
                assert_eq!(d.title, "Gender");
                assert_eq!(d.slices, vec![("Male".to_string(), 3), ("Female".to_string(), 2)]);
                assert_eq!(d.style.colors, vec!["#00CCFF", "#FF0099"]);
            }
            _ => panic!("Expected donut chart"),
        }
    }

    #[test]
    fn test_breakdown_chart_uses_positional_slots() {
        let chart = build_breakdown_chart(&source(), &DashboardConfig::default()).unwrap();
        let Chart::GroupedBar(bars) = chart else {
            panic!("Expected grouped bar chart");
        };
        assert_eq!(bars.data.categories, vec!["Elezen", "Hyur"]);
        assert_eq!(bars.data.series.len(), 4);
        assert_eq!(bars.data.series[0].labels(), vec!["Duskwight Male", "Midlander Male"]);
        assert_eq!(bars.data.series[1].labels(), vec!["Wildwood Male", "Midlander Female"]);
        assert_eq!(bars.data.series[2].labels(), vec!["Wildwood Female"]);
        assert_eq!(bars.data.category_total("Elezen"), 3);
    }

    #[test]
    fn test_breakdown_overflow_propagates() {
        let config = DashboardConfig {
            breakdown_slots: 2,
            ..DashboardConfig::default()
        };
        let err = build_breakdown_chart(&source(), &config).unwrap_err();
        let reshape_err = err.downcast_ref::<ReshapeError>().unwrap();
        assert!(matches!(reshape_err, ReshapeError::SlotOverflow { found: 3, max_slots: 2, .. }));
    }

    #[test]
    fn test_top_table() {
        let table = build_top_table(&source(), "Top 2 Last Names", "last_name", 2).unwrap();
        assert_eq!(table.columns, vec!["last_name", "count"]);
        assert_eq!(
            table.rows,
            vec![
                vec!["Leveilleur".to_string(), "2".to_string()],
                vec!["Augurelt".to_string(), "1".to_string()],
            ]
        );
    }

    #[test]
    fn test_build_dashboard() {
        let dashboard = build_dashboard(&source(), &DashboardConfig::default()).unwrap();
        assert_eq!(dashboard.chart(ChartKind::Race).title(), "Race");
        let headings: Vec<&str> = dashboard.tables.iter().map(|t| t.heading.as_str()).collect();
        assert_eq!(headings, vec!["Top 10 Titles", "Top 10 First Names", "Top 10 Last Names"]);
        assert_eq!(dashboard.tables[0].rows.len(), 2);
    }

    #[test]
    fn test_build_single_chart() {
        let chart = build_chart(&source(), ChartKind::Breakdown, &DashboardConfig::default()).unwrap();
        assert_eq!(chart.title(), "Breakdown");
    }

    #[test]
    fn test_top_query_text() {
        assert_eq!(top_query("title", 10), "count(title) | order(count desc) | limit(10)");
    }
}
