use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gubal_dash::config::DashboardConfig;
use gubal_dash::dashboard::{build_chart, build_dashboard, ChartKind};
use gubal_dash::data::AggregationRow;
use gubal_dash::source::{AggregationSource, MemorySource};
use gubal_dash::sqlite::{self, SqliteSource};
use gubal_dash::{csv_reader, graph, html, parser, reshape, OutputFormat};
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gubal-dash")]
#[command(about = "Character statistics dashboard: aggregate, reshape and chart", long_about = None)]
struct Args {
    /// JSON config file; every field is optional
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database with the character tables (overrides the config file)
    #[arg(long, global = true, conflicts_with = "csv")]
    db: Option<PathBuf>,

    /// Character records as CSV instead of a database
    #[arg(long, global = true)]
    csv: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build every panel and write the HTML page
    Dashboard {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write a single chart to stdout
    Chart {
        kind: ChartKind,
        /// Image format (defaults to the config's chart type)
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
    },
    /// Run an aggregation query, e.g. 'count(race) | order(count desc)', and print CSV
    Query { dsl: String },
    /// Read aggregation rows from stdin and print grouped series as JSON
    Reshape {
        /// Series slots (defaults to the config's breakdown_slots)
        #[arg(long)]
        slots: Option<usize>,
        /// Input is a JSON array of {"keys": [...], "count": n} instead of CSV
        #[arg(long)]
        json: bool,
    },
    /// Load character records from CSV into the database (created if missing)
    Import {
        /// Character CSV with a first_name,last_name,race,clan,gender[,title] header
        input: PathBuf,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config(args: &Args) -> Result<DashboardConfig> {
    let mut config = match &args.config {
        Some(path) => DashboardConfig::load(path)?,
        None => DashboardConfig::default(),
    };
    if let Some(db) = &args.db {
        config.database = Some(db.clone());
    }
    Ok(config)
}

fn open_source(args: &Args, config: &DashboardConfig) -> Result<Box<dyn AggregationSource>> {
    if let Some(path) = &args.csv {
        let records = csv_reader::read_characters_from_path(path)?;
        info!(records = records.len(), path = %path.display(), "loaded characters from CSV");
        return Ok(Box::new(MemorySource::new(records)));
    }
    match &config.database {
        Some(path) => {
            info!(path = %path.display(), "opening database");
            Ok(Box::new(SqliteSource::open(path)?))
        }
        None => bail!("No data source: pass --db, --csv, or set \"database\" in the config file"),
    }
}

fn write_stdout(bytes: &[u8]) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle.write_all(bytes).context("Failed to write to stdout")?;
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}

fn read_rows_from_stdin(json: bool) -> Result<Vec<AggregationRow>> {
    if json {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read JSON from stdin")?;
        serde_json::from_str(&text).context("Failed to parse aggregation rows")
    } else {
        Ok(csv_reader::read_aggregation_table_from_stdin()
            .context("Failed to read CSV from stdin")?
            .rows)
    }
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();
    let mut config = load_config(&args)?;

    match &args.command {
        Command::Dashboard { output } => {
            let source = open_source(&args, &config)?;
            let dashboard = build_dashboard(source.as_ref(), &config)?;
            let page = html::render_page(&dashboard, &config)?;
            match output {
                Some(path) => {
                    fs::write(path, page)
                        .with_context(|| format!("Failed to write '{}'", path.display()))?;
                    info!(path = %path.display(), "dashboard written");
                }
                None => write_stdout(page.as_bytes())?,
            }
        }
        Command::Chart { kind, format } => {
            if let Some(format) = format {
                config.chart.format = *format;
            }
            let source = open_source(&args, &config)?;
            let chart = build_chart(source.as_ref(), *kind, &config)?;
            let rendered = graph::render(&chart, &config.chart)
                .context("Failed to render chart")?;
            write_stdout(rendered.as_bytes())?;
        }
        Command::Query { dsl } => {
            let spec = parser::parse_aggregation(dsl)?;
            let source = open_source(&args, &config)?;
            let rows = source.aggregate(&spec)?;

            let mut writer = csv::Writer::from_writer(io::stdout().lock());
            writer.write_record(spec.headers()).context("Failed to write CSV header")?;
            for row in &rows {
                let mut record = row.keys.clone();
                record.push(row.count.to_string());
                writer.write_record(&record).context("Failed to write CSV row")?;
            }
            writer.flush().context("Failed to flush stdout")?;
        }
        Command::Reshape { slots, json } => {
            let rows = read_rows_from_stdin(*json)?;
            let slots = slots.unwrap_or(config.breakdown_slots);
            let grouped = reshape::reshape(&rows, slots)?;

            let mut out = serde_json::to_vec_pretty(&grouped).context("Failed to encode series")?;
            out.push(b'\n');
            write_stdout(&out)?;
        }
        Command::Import { input } => {
            let Some(path) = &config.database else {
                bail!("No database to import into: pass --db or set \"database\" in the config file");
            };
            let records = csv_reader::read_characters_from_path(input)?;
            let mut conn = sqlite::open_for_import(path)?;
            let summary = sqlite::import_characters(&mut conn, &records)?;
            eprintln!(
                "Imported {} characters ({} new titles) into '{}'",
                summary.characters,
                summary.titles_created,
                path.display()
            );
        }
    }

    Ok(())
}
