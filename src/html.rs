// Static HTML page for a built dashboard

use crate::config::DashboardConfig;
use crate::dashboard::{Dashboard, TopTable};
use crate::graph::{render_svg, Chart};
use anyhow::{Context, Result};
use askama::Template;

pub const PAGE_TITLE: &str = "Character Statistics";

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardPage<'a> {
    title: &'a str,
    stylesheets: &'a [String],
    scripts: &'a [String],
    table_classes: &'a str,
    gender_svg: String,
    race_svg: String,
    breakdown_svg: String,
    tables: &'a [TopTable],
}

fn chart_svg(chart: &Chart, config: &DashboardConfig) -> Result<String> {
    render_svg(chart, config.chart.width, config.chart.height)
        .with_context(|| format!("Failed to render chart '{}'", chart.title()))
}

/// Render the whole dashboard as one HTML document with inline SVG charts.
pub fn render_page(dashboard: &Dashboard, config: &DashboardConfig) -> Result<String> {
    let page = DashboardPage {
        title: PAGE_TITLE,
        stylesheets: &config.stylesheets,
        scripts: &config.scripts,
        table_classes: &config.table_classes,
        gender_svg: chart_svg(&dashboard.gender, config)?,
        race_svg: chart_svg(&dashboard.race, config)?,
        breakdown_svg: chart_svg(&dashboard.breakdown, config)?,
        tables: &dashboard.tables,
    };

    page.render().context("Failed to render dashboard page")
}
