// Start-up configuration, built once and passed by reference

use crate::RenderOptions;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_TABLE_CLASSES: &str = "table table-hover table-sm";

/// Everything the dashboard needs besides the data itself.
///
/// Every field has a default, so a config file only lists what it changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DashboardConfig {
    /// SQLite database holding the character tables
    #[serde(default)]
    pub database: Option<PathBuf>,
    #[serde(default = "default_stylesheets")]
    pub stylesheets: Vec<String>,
    #[serde(default = "default_scripts")]
    pub scripts: Vec<String>,
    #[serde(default = "default_table_classes")]
    pub table_classes: String,
    /// Series slots in the race/clan/gender breakdown
    #[serde(default = "default_breakdown_slots")]
    pub breakdown_slots: usize,
    /// Rows in each "top" table
    #[serde(default = "default_top_limit")]
    pub top_limit: usize,
    #[serde(default)]
    pub chart: RenderOptions,
}

fn default_stylesheets() -> Vec<String> {
    vec!["https://maxcdn.bootstrapcdn.com/bootstrap/4.0.0/css/bootstrap.min.css".to_string()]
}

fn default_scripts() -> Vec<String> {
    vec![
        "https://code.jquery.com/jquery-3.2.1.slim.min.js".to_string(),
        "https://cdnjs.cloudflare.com/ajax/libs/popper.js/1.12.9/umd/popper.min.js".to_string(),
        "https://maxcdn.bootstrapcdn.com/bootstrap/4.0.0/js/bootstrap.min.js".to_string(),
    ]
}

fn default_table_classes() -> String { DEFAULT_TABLE_CLASSES.to_string() }
fn default_breakdown_slots() -> usize { 4 }
fn default_top_limit() -> usize { 10 }

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            database: None,
            stylesheets: default_stylesheets(),
            scripts: default_scripts(),
            table_classes: default_table_classes(),
            breakdown_slots: default_breakdown_slots(),
            top_limit: default_top_limit(),
            chart: RenderOptions::default(),
        }
    }
}

impl DashboardConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).context("Failed to parse dashboard config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Invalid config file '{}'", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.breakdown_slots == 0 {
            bail!("breakdown_slots must be at least 1");
        }
        if self.chart.width == 0 || self.chart.height == 0 {
            bail!("chart size must be non-zero, got {}x{}", self.chart.width, self.chart.height);
        }
        Ok(())
    }
}
