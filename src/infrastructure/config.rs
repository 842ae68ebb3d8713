use crate::application::widget::WidgetSettings;
use crate::domain::chart::{ChartSpec, ScaleMode, SeriesSpec};
use crate::domain::metric::MetricKey;
use crate::domain::series::DEFAULT_CAPACITY;
use anyhow::Context;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub source: SourceSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceSettings {
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WidgetsConfig {
    #[serde(default)]
    pub panels: Vec<PanelConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PanelConfig {
    pub id: String,
    pub title: String,
    pub endpoint: String,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default)]
    pub charts: Vec<ChartConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChartConfig {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub unit: String,
    pub scale: ScaleConfig,
    pub floor: Option<f64>,
    #[serde(default = "default_fill")]
    pub fill: bool,
    #[serde(default)]
    pub series: Vec<SeriesConfig>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub enum ScaleConfig {
    #[serde(rename = "fixed-0-100")]
    Fixed0To100,
    #[serde(rename = "auto-max")]
    AutoMax,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SeriesConfig {
    pub metric: String,
    pub name: Option<String>,
    pub color: Option<String>,
}

const PALETTE: [&str; 6] = ["#6366f1", "#22c55e", "#f59e0b", "#3b82f6", "#ec4899", "#0ea5e9"];

fn default_timeout_secs() -> u64 {
    4
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_interval_secs() -> u64 {
    5
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_fill() -> bool {
    true
}

impl SourceSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl From<ScaleConfig> for ScaleMode {
    fn from(scale: ScaleConfig) -> Self {
        match scale {
            ScaleConfig::Fixed0To100 => ScaleMode::Fixed0To100,
            ScaleConfig::AutoMax => ScaleMode::AutoMax,
        }
    }
}

impl PanelConfig {
    pub fn to_settings(&self) -> anyhow::Result<WidgetSettings> {
        if self.charts.is_empty() {
            anyhow::bail!("panel {} has no charts", self.id);
        }

        let charts = self
            .charts
            .iter()
            .map(|c| c.to_spec().with_context(|| format!("panel {}", self.id)))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(WidgetSettings {
            id: self.id.clone(),
            title: self.title.clone(),
            capacity: self.capacity.max(1),
            interval: Duration::from_secs(self.interval_secs.max(1)),
            charts,
        })
    }
}

impl ChartConfig {
    fn to_spec(&self) -> anyhow::Result<ChartSpec> {
        if self.series.is_empty() {
            anyhow::bail!("chart {} has no series", self.id);
        }

        let series = self
            .series
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let metric: MetricKey = s
                    .metric
                    .parse()
                    .with_context(|| format!("chart {}", self.id))?;
                let label = s.name.clone().unwrap_or_else(|| metric.label());
                let color = s
                    .color
                    .clone()
                    .unwrap_or_else(|| PALETTE[i % PALETTE.len()].to_string());
                Ok(SeriesSpec::new(metric, label, color))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(ChartSpec::new(
            self.id.clone(),
            self.title.clone(),
            self.unit.clone(),
            self.scale.into(),
            self.floor,
            self.fill,
            series,
        ))
    }
}

pub fn load_source_config() -> anyhow::Result<SourceConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/source"))
        .add_source(config::Environment::with_prefix("TELEMETRY").separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

pub fn load_widgets_config() -> anyhow::Result<WidgetsConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/widgets"))
        .build()?;

    Ok(settings.try_deserialize()?)
}
