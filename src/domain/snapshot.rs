// Health snapshot as reported by the router, plus normalization
use crate::domain::metric::MetricKey;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;

pub const UNKNOWN_STATUS: &str = "unknown";
const DEFAULT_CORE_COUNT: f64 = 4.0;

/// Raw snapshot. Every field is optional and a field of the wrong JSON type
/// is read as absent, so decoding only fails on non-JSON input.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Snapshot {
    #[serde(default, deserialize_with = "lenient::integer")]
    pub timestamp: Option<i64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub hostname: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub uptime: Option<f64>,
    #[serde(default, deserialize_with = "lenient::load")]
    pub load: Option<f64>,
    #[serde(default, deserialize_with = "lenient::section")]
    pub cpu: Option<CpuSection>,
    #[serde(default, deserialize_with = "lenient::section")]
    pub memory: Option<UsageSection>,
    #[serde(default, deserialize_with = "lenient::section")]
    pub disk: Option<UsageSection>,
    #[serde(default, deserialize_with = "lenient::section")]
    pub network: Option<NetworkSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CpuSection {
    #[serde(default, deserialize_with = "lenient::number")]
    pub percent: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub usage_percent: Option<f64>,
    #[serde(default, deserialize_with = "lenient::load")]
    pub load: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub count: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageSection {
    #[serde(default, deserialize_with = "lenient::number")]
    pub percent: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub usage_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkSection {
    #[serde(default, deserialize_with = "lenient::number")]
    pub rx_bytes: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub tx_bytes: Option<f64>,
    #[serde(default, deserialize_with = "lenient::devices")]
    pub devices: Option<HashMap<String, DeviceCounters>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceCounters {
    #[serde(default, deserialize_with = "lenient::number")]
    pub rx_bytes: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub tx_bytes: Option<f64>,
}

impl UsageSection {
    fn usage(&self) -> Option<f64> {
        self.usage_percent.or(self.percent)
    }
}

/// Snapshot with every default applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// Local arrival time; samples and rates are timed by this.
    pub time_ms: i64,
    /// Timestamp carried by the payload, in whatever unit the router uses.
    pub reported_at: Option<i64>,
    pub status: String,
    pub uptime_secs: u64,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub load_1m: f64,
    pub load_percent: f64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    devices: HashMap<String, (u64, u64)>,
}

/// Value of one metric in a reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Gauge(f64),
    Counter(u64),
}

impl Snapshot {
    pub fn from_json(body: &str) -> serde_json::Result<Self> {
        serde_json::from_str(body)
    }

    /// Apply default rules and stamp the reading with `now_ms`.
    pub fn normalize(&self, now_ms: i64) -> Reading {
        let cpu = self.cpu.clone().unwrap_or_default();
        let load_1m = non_negative(cpu.load.or(self.load));
        let cores = cpu
            .count
            .filter(|c| c.is_finite() && *c >= 1.0)
            .unwrap_or(DEFAULT_CORE_COUNT);

        let network = self.network.clone().unwrap_or_default();
        let devices = network
            .devices
            .unwrap_or_default()
            .into_iter()
            .map(|(name, c)| (name, (counter(c.rx_bytes), counter(c.tx_bytes))))
            .collect();

        Reading {
            time_ms: now_ms,
            reported_at: self.timestamp,
            status: self
                .status
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_STATUS.to_string()),
            uptime_secs: non_negative(self.uptime) as u64,
            cpu_percent: non_negative(cpu.usage_percent.or(cpu.percent)),
            memory_percent: non_negative(self.memory.as_ref().and_then(UsageSection::usage)),
            disk_percent: non_negative(self.disk.as_ref().and_then(UsageSection::usage)),
            load_1m,
            load_percent: (load_1m / cores * 100.0).min(100.0),
            rx_bytes: counter(network.rx_bytes),
            tx_bytes: counter(network.tx_bytes),
            devices,
        }
    }
}

impl Reading {
    pub fn value(&self, key: &MetricKey) -> MetricValue {
        match key {
            MetricKey::Cpu => MetricValue::Gauge(self.cpu_percent),
            MetricKey::Memory => MetricValue::Gauge(self.memory_percent),
            MetricKey::Disk => MetricValue::Gauge(self.disk_percent),
            MetricKey::Load => MetricValue::Gauge(self.load_percent),
            MetricKey::NetRx => MetricValue::Counter(self.rx_bytes),
            MetricKey::NetTx => MetricValue::Counter(self.tx_bytes),
            MetricKey::DeviceRx(dev) => {
                MetricValue::Counter(self.devices.get(dev).map(|c| c.0).unwrap_or(0))
            }
            MetricKey::DeviceTx(dev) => {
                MetricValue::Counter(self.devices.get(dev).map(|c| c.1).unwrap_or(0))
            }
        }
    }
}

fn non_negative(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite() && *v > 0.0).unwrap_or(0.0)
}

fn counter(value: Option<f64>) -> u64 {
    non_negative(value).floor() as u64
}

mod lenient {
    use super::*;
    use serde::de::DeserializeOwned;

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(as_number(&Value::deserialize(d)?))
    }

    pub fn integer<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Ok(as_number(&Value::deserialize(d)?).map(|v| v as i64))
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => Some(s),
            _ => None,
        })
    }

    /// Load may be `1.5`, `[1.5, 1.2, 0.9]` or `"1.50 1.20 0.90"`.
    pub fn load<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items.first().and_then(as_number),
            Value::String(s) => s
                .split_whitespace()
                .next()
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|v| v.is_finite()),
            other => as_number(&other),
        })
    }

    /// Devices are read one by one; a malformed entry is skipped without
    /// affecting its neighbours.
    pub fn devices<'de, D>(d: D) -> Result<Option<HashMap<String, DeviceCounters>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(d)? {
            Value::Object(entries) => Some(
                entries
                    .into_iter()
                    .filter_map(|(name, entry)| match entry {
                        Value::Object(_) => serde_json::from_value(entry)
                            .ok()
                            .map(|counters| (name, counters)),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => None,
        })
    }

    pub fn section<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(serde_json::from_value(Value::deserialize(d)?).ok())
    }

    fn as_number(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
        .filter(|v: &f64| v.is_finite())
    }
}
