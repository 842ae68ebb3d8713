// Metric identifiers tracked by a widget
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MetricKey {
    Cpu,
    Memory,
    Disk,
    Load,
    NetRx,
    NetTx,
    DeviceRx(String),
    DeviceTx(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Pushed as observed.
    Gauge,
    /// Cumulative counter; the derived rate is pushed.
    Counter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Percent,
    BytesPerSecond,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MetricKeyError {
    #[error("unknown metric id '{0}'")]
    Unknown(String),
    #[error("metric id '{0}' has an empty device name")]
    EmptyDevice(String),
}

impl MetricKey {
    pub fn kind(&self) -> MetricKind {
        match self {
            Self::Cpu | Self::Memory | Self::Disk | Self::Load => MetricKind::Gauge,
            Self::NetRx | Self::NetTx | Self::DeviceRx(_) | Self::DeviceTx(_) => MetricKind::Counter,
        }
    }

    pub fn unit(&self) -> Unit {
        match self.kind() {
            MetricKind::Gauge => Unit::Percent,
            MetricKind::Counter => Unit::BytesPerSecond,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Cpu => "CPU Usage".to_string(),
            Self::Memory => "Memory Usage".to_string(),
            Self::Disk => "Disk Usage".to_string(),
            Self::Load => "System Load".to_string(),
            Self::NetRx => "Download".to_string(),
            Self::NetTx => "Upload".to_string(),
            Self::DeviceRx(dev) => format!("{} RX", dev),
            Self::DeviceTx(dev) => format!("{} TX", dev),
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Memory => f.write_str("memory"),
            Self::Disk => f.write_str("disk"),
            Self::Load => f.write_str("load"),
            Self::NetRx => f.write_str("net.rx"),
            Self::NetTx => f.write_str("net.tx"),
            Self::DeviceRx(dev) => write!(f, "net.{}.rx", dev),
            Self::DeviceTx(dev) => write!(f, "net.{}.tx", dev),
        }
    }
}

impl FromStr for MetricKey {
    type Err = MetricKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu" => return Ok(Self::Cpu),
            "memory" => return Ok(Self::Memory),
            "disk" => return Ok(Self::Disk),
            "load" => return Ok(Self::Load),
            "net.rx" => return Ok(Self::NetRx),
            "net.tx" => return Ok(Self::NetTx),
            _ => {}
        }

        // Per-device counters: "net.<device>.rx" / "net.<device>.tx"
        let device = s
            .strip_prefix("net.")
            .and_then(|rest| rest.rsplit_once('.'))
            .ok_or_else(|| MetricKeyError::Unknown(s.to_string()))?;

        match device {
            ("", _) => Err(MetricKeyError::EmptyDevice(s.to_string())),
            (dev, "rx") => Ok(Self::DeviceRx(dev.to_string())),
            (dev, "tx") => Ok(Self::DeviceTx(dev.to_string())),
            _ => Err(MetricKeyError::Unknown(s.to_string())),
        }
    }
}
