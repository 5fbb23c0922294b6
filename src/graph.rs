use crate::reshape::GroupedSeries;
use crate::{OutputFormat, RenderOptions};
use anyhow::{Context, Result};
use image::ImageEncoder;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::f64::consts::PI;

/// Default qualitative palette for slices and series slots
pub const CATEGORY10: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd",
    "#8c564b", "#e377c2", "#7f7f7f", "#bcbd22", "#17becf",
];

/// Style configuration for donut (hollow pie) charts
#[derive(Debug, Clone)]
pub struct DonutStyle {
    /// Hole radius as a fraction of the outer radius
    pub hole: f64,
    /// Fixed slice colours; the palette is used past the end of this list
    pub colors: Vec<String>,
    pub line_color: String,
    pub line_width: u32,
}

impl Default for DonutStyle {
    fn default() -> Self {
        Self {
            hole: 0.5,
            colors: Vec::new(),
            line_color: "#FFF".to_string(),
            line_width: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DonutChart {
    pub title: String,
    pub slices: Vec<(String, u64)>,
    pub style: DonutStyle,
}

#[derive(Debug, Clone)]
pub struct GroupedBarChart {
    pub title: String,
    pub data: GroupedSeries,
    /// Print each bar's label above it
    pub show_labels: bool,
}

#[derive(Debug, Clone)]
pub enum Chart {
    Donut(DonutChart),
    GroupedBar(GroupedBarChart),
}

impl Chart {
    pub fn title(&self) -> &str {
        match self {
            Chart::Donut(c) => &c.title,
            Chart::GroupedBar(c) => &c.title,
        }
    }

    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> Result<()>
    where
        DB::ErrorType: 'static,
    {
        match self {
            Chart::Donut(c) => draw_donut(root, c),
            Chart::GroupedBar(c) => draw_grouped_bars(root, c),
        }
    }
}

/// Encoded chart output
#[derive(Debug, Clone)]
pub enum RenderedChart {
    Png(Vec<u8>),
    Svg(String),
}

impl RenderedChart {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            RenderedChart::Png(bytes) => bytes,
            RenderedChart::Svg(svg) => svg.as_bytes(),
        }
    }
}

/// Render a chart in the format the options ask for
pub fn render(chart: &Chart, options: &RenderOptions) -> Result<RenderedChart> {
    match options.format {
        OutputFormat::Png => render_png(chart, options.width, options.height).map(RenderedChart::Png),
        OutputFormat::Svg => render_svg(chart, options.width, options.height).map(RenderedChart::Svg),
    }
}

pub fn render_svg(chart: &Chart, width: u32, height: u32) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        root.fill(&WHITE).context("Failed to fill background")?;
        chart.draw(&root)?;
        root.present().context("Failed to present drawing")?;
    }
    Ok(svg)
}

/// Render into an RGB buffer and encode it as PNG
pub fn render_png(chart: &Chart, width: u32, height: u32) -> Result<Vec<u8>> {
    let size = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(3))
        .with_context(|| format!("Chart size {}x{} is too large", width, height))?;
    let mut buffer = vec![0u8; size];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        root.fill(&WHITE).context("Failed to fill background")?;
        chart.draw(&root)?;
        root.present().context("Failed to present drawing")?;
    }

    let mut png_bytes = Vec::new();
    {
        let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
        encoder
            .write_image(&buffer, width, height, image::ColorType::Rgb8)
            .context("Failed to encode PNG")?;
    }

    Ok(png_bytes)
}

fn draw_donut<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, chart: &DonutChart) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let area = root
        .titled(&chart.title, ("sans-serif", 20))
        .context("Failed to draw title")?;

    let total: u64 = chart.slices.iter().map(|(_, v)| v).sum();
    if total == 0 {
        return draw_no_data(&area);
    }

    let (w, h) = area.dim_in_pixel();
    let center = ((w / 2) as i32, (h / 2) as i32);
    let radius = w.min(h) as f64 * 0.35;

    let line_color = parse_color(&chart.style.line_color).unwrap_or(WHITE);
    let label_font = ("sans-serif", 14).into_font().color(&BLACK);

    // Clockwise from twelve o'clock
    let mut start = -PI / 2.0;
    for (idx, (label, value)) in chart.slices.iter().enumerate() {
        let fraction = *value as f64 / total as f64;
        let sweep = fraction * 2.0 * PI;
        if sweep <= 0.0 {
            continue;
        }

        let color = slice_color(&chart.style, idx);
        let mut points = wedge_points(center, radius, start, sweep);
        area.draw(&Polygon::new(points.clone(), color.filled()))
            .context("Failed to draw slice")?;

        points.push(points[0]);
        area.draw(&PathElement::new(points, line_color.stroke_width(chart.style.line_width)))
            .context("Failed to draw slice outline")?;

        let mid = start + sweep / 2.0;
        let anchor = if mid.cos() < 0.0 { HPos::Right } else { HPos::Left };
        let label_pos = (
            center.0 + (radius * 1.08 * mid.cos()) as i32,
            center.1 + (radius * 1.08 * mid.sin()) as i32,
        );
        area.draw(&Text::new(
            format!("{} {:.1}%", label, fraction * 100.0),
            label_pos,
            label_font.pos(Pos::new(anchor, VPos::Center)),
        ))
        .context("Failed to draw slice label")?;

        start += sweep;
    }

    let hole = (radius * chart.style.hole.clamp(0.0, 0.95)) as i32;
    if hole > 0 {
        area.draw(&Circle::new(center, hole, WHITE.filled()))
            .context("Failed to draw donut hole")?;
    }

    Ok(())
}

/// Placeholder for a panel whose query returned nothing
fn draw_no_data<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let (w, h) = area.dim_in_pixel();
    let style = ("sans-serif", 16)
        .into_font()
        .color(&RGBColor(128, 128, 128))
        .pos(Pos::new(HPos::Center, VPos::Center));
    area.draw(&Text::new("No data", ((w / 2) as i32, (h / 2) as i32), style))
        .context("Failed to draw placeholder")?;
    Ok(())
}

/// Polygon approximating a pie wedge, one vertex per degree of arc
fn wedge_points(center: (i32, i32), radius: f64, start: f64, sweep: f64) -> Vec<(i32, i32)> {
    let steps = ((sweep.to_degrees()).ceil() as usize).max(2);
    let mut points = Vec::with_capacity(steps + 2);
    points.push(center);
    for i in 0..=steps {
        let angle = start + sweep * i as f64 / steps as f64;
        points.push((
            center.0 + (radius * angle.cos()).round() as i32,
            center.1 + (radius * angle.sin()).round() as i32,
        ));
    }
    points
}

fn draw_grouped_bars<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, chart: &GroupedBarChart) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let data = &chart.data;
    if data.categories.is_empty() || data.series.is_empty() {
        let area = root
            .titled(&chart.title, ("sans-serif", 20))
            .context("Failed to draw title")?;
        return draw_no_data(&area);
    }

    let num_categories = data.categories.len();
    let num_series = data.series.len();
    let y_max = (data.max_value() as f64 * 1.1).max(1.0);

    // Category i is centred on x = i
    let x_range = -0.5..(num_categories as f64 - 0.5);

    let mut cc = ChartBuilder::on(root)
        .margin(10)
        .caption(&chart.title, ("sans-serif", 20))
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(x_range, 0.0..y_max)
        .context("Failed to build chart")?;

    let categories = &data.categories;
    cc.configure_mesh()
        .disable_x_mesh()
        .x_labels(num_categories + 1)
        .x_label_formatter(&|x| category_label(categories, *x))
        .draw()
        .context("Failed to draw mesh")?;

    let bar_width = 0.8 / num_series as f64;
    let label_style = ("sans-serif", 11)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Bottom));

    for (series_idx, series) in data.series.iter().enumerate() {
        let color = slot_color(series_idx);
        let x_offset = (series_idx as f64 - (num_series as f64 - 1.0) / 2.0) * bar_width;

        for point in &series.points {
            let Some(cat_idx) = categories.iter().position(|c| *c == point.category) else {
                continue;
            };
            let x_center = cat_idx as f64 + x_offset;
            let y_val = point.value as f64;

            cc.draw_series(std::iter::once(Rectangle::new(
                [
                    (x_center - bar_width / 2.0, 0.0),
                    (x_center + bar_width / 2.0, y_val),
                ],
                color.filled(),
            )))
            .context("Failed to draw bar")?;

            if chart.show_labels {
                cc.draw_series(std::iter::once(Text::new(
                    point.label.clone(),
                    (x_center, y_val),
                    label_style.clone(),
                )))
                .context("Failed to draw bar label")?;
            }
        }
    }

    Ok(())
}

/// Axis label for a tick: the category name on whole-number ticks only
fn category_label(categories: &[String], x: f64) -> String {
    let rounded = x.round();
    if (x - rounded).abs() > 1e-6 || rounded < 0.0 {
        return String::new();
    }
    categories.get(rounded as usize).cloned().unwrap_or_default()
}

fn slice_color(style: &DonutStyle, idx: usize) -> RGBColor {
    style
        .colors
        .get(idx)
        .and_then(|c| parse_color(c))
        .unwrap_or_else(|| slot_color(idx))
}

fn slot_color(idx: usize) -> RGBColor {
    parse_color(CATEGORY10[idx % CATEGORY10.len()]).unwrap_or(BLUE)
}

/// Parse a color string into RGBColor, supporting hex (#RRGGBB, #RGB) and named colors
pub fn parse_color(color_str: &str) -> Option<RGBColor> {
    let color_str = color_str.trim();

    if color_str.starts_with('#') {
        return parse_hex_color(color_str);
    }

    match color_str.to_lowercase().as_str() {
        "white" => Some(RGBColor(255, 255, 255)),
        "black" => Some(RGBColor(0, 0, 0)),
        "red" => Some(RGBColor(255, 0, 0)),
        "green" => Some(RGBColor(0, 128, 0)),
        "blue" => Some(RGBColor(0, 0, 255)),
        "gray" | "grey" => Some(RGBColor(128, 128, 128)),
        _ => None,
    }
}

/// Parse hex color (#RRGGBB or #RGB)
fn parse_hex_color(hex: &str) -> Option<RGBColor> {
    let hex = hex.trim_start_matches('#');
    match hex.len() {
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some(RGBColor(r, g, b))
        }
        3 => {
            let r = u8::from_str_radix(&hex[0..1], 16).ok()? * 17;
            let g = u8::from_str_radix(&hex[1..2], 16).ok()? * 17;
            let b = u8::from_str_radix(&hex[2..3], 16).ok()? * 17;
            Some(RGBColor(r, g, b))
        }
        _ => None,
    }
}
