// Text summaries kept in sync with the series buffers
use crate::domain::metric::{MetricKey, Unit};
use crate::domain::series::SeriesBuffer;
use serde::Serialize;

const BYTE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
const NO_DATA: &str = "-";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub metric: String,
    pub label: String,
    pub current: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub count: usize,
    pub capacity: usize,
    pub current_text: String,
    pub min_text: String,
    pub max_text: String,
    pub window_text: String,
    pub color: Option<&'static str>,
}

impl MetricSummary {
    pub fn from_buffer(key: &MetricKey, buffer: &SeriesBuffer) -> Self {
        let unit = key.unit();
        let current = buffer.latest().map(|s| s.value);
        let min = buffer.min();
        let max = buffer.max();

        Self {
            metric: key.to_string(),
            label: key.label(),
            current,
            min,
            max,
            count: buffer.len(),
            capacity: buffer.capacity(),
            current_text: format_optional(current, unit),
            min_text: format_optional(min, unit),
            max_text: format_optional(max, unit),
            window_text: format!("{} / {}", buffer.len(), buffer.capacity()),
            color: match unit {
                Unit::Percent => current.map(severity_color),
                Unit::BytesPerSecond => None,
            },
        }
    }
}

pub fn format_value(value: f64, unit: Unit) -> String {
    match unit {
        Unit::Percent => format!("{:.1}%", value),
        Unit::BytesPerSecond => format!("{}/s", format_bytes(value)),
    }
}

fn format_optional(value: Option<f64>, unit: Unit) -> String {
    value
        .map(|v| format_value(v, unit))
        .unwrap_or_else(|| NO_DATA.to_string())
}

/// Human-readable size with 1024 steps, e.g. `1.50 KB`.
pub fn format_bytes(bytes: f64) -> String {
    if !bytes.is_finite() || bytes <= 0.0 {
        return "0 B".to_string();
    }

    let mut scaled = bytes;
    let mut unit = 0;
    while scaled >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        scaled /= 1024.0;
        unit += 1;
    }

    format!("{:.2} {}", scaled, BYTE_UNITS[unit])
}

pub fn format_uptime(seconds: u64) -> String {
    if seconds == 0 {
        return "0s".to_string();
    }

    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// "1.20 KB/s ↓ · 300.00 B/s ↑"
pub fn format_throughput(rx: Option<f64>, tx: Option<f64>) -> String {
    let side = |v: Option<f64>| format_optional(v, Unit::BytesPerSecond);
    format!("{} ↓ · {} ↑", side(rx), side(tx))
}

pub fn severity_color(percent: f64) -> &'static str {
    if percent >= 90.0 {
        "#ef4444"
    } else if percent >= 75.0 {
        "#f59e0b"
    } else if percent >= 50.0 {
        "#3b82f6"
    } else {
        "#22c55e"
    }
}
