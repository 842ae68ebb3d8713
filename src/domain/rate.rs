// Rate derivation from cumulative counters
use std::collections::HashMap;

/// Last observation of a cumulative counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterState {
    pub last_raw: u64,
    pub last_time_ms: i64,
}

impl CounterState {
    pub fn new(last_raw: u64, last_time_ms: i64) -> Self {
        Self {
            last_raw,
            last_time_ms,
        }
    }
}

/// Which branch produced a rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateKind {
    /// First observation of the counter.
    Baseline,
    /// Counter went backwards; the new value is the baseline.
    Reset,
    /// No time elapsed since the previous observation; state kept.
    Stale,
    Measured,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateStep {
    pub rate: f64,
    pub state: CounterState,
    pub kind: RateKind,
}

impl RateStep {
    fn zero(state: CounterState, kind: RateKind) -> Self {
        Self {
            rate: 0.0,
            state,
            kind,
        }
    }
}

/// Compute the per-second rate between `previous` and a new observation.
///
/// Returns the rate together with the state to keep for the next call. A
/// missing baseline, a counter that went backwards (reset or wrap) and a
/// non-positive elapsed time all yield a rate of zero. Only the last case
/// keeps the previous state, so timestamps never move backwards.
pub fn derive_rate(previous: Option<CounterState>, raw: u64, time_ms: i64) -> RateStep {
    let current = CounterState::new(raw, time_ms);

    let Some(prev) = previous else {
        return RateStep::zero(current, RateKind::Baseline);
    };

    let elapsed_secs = (time_ms - prev.last_time_ms) as f64 / 1000.0;
    if elapsed_secs <= 0.0 {
        return RateStep::zero(prev, RateKind::Stale);
    }

    match raw.checked_sub(prev.last_raw) {
        Some(delta) => RateStep {
            rate: delta as f64 / elapsed_secs,
            state: current,
            kind: RateKind::Measured,
        },
        None => RateStep::zero(current, RateKind::Reset),
    }
}

/// Keyed counter baselines, one per counter metric.
#[derive(Debug, Clone, Default)]
pub struct RateDeriver {
    counters: HashMap<String, CounterState>,
}

impl RateDeriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, counter_id: &str, raw: u64, time_ms: i64) -> f64 {
        let previous = self.counters.get(counter_id).copied();
        let step = derive_rate(previous, raw, time_ms);
        match step.kind {
            RateKind::Baseline => {
                tracing::debug!("New counter baseline for {}: {}", counter_id, raw)
            }
            RateKind::Reset => {
                tracing::debug!("Counter {} reset, re-baselining at {}", counter_id, raw)
            }
            RateKind::Stale => {
                tracing::debug!("Counter {} observed with no elapsed time", counter_id)
            }
            RateKind::Measured => {}
        }
        self.counters.insert(counter_id.to_string(), step.state);
        step.rate
    }

    pub fn state(&self, counter_id: &str) -> Option<CounterState> {
        self.counters.get(counter_id).copied()
    }

    pub fn clear(&mut self) {
        self.counters.clear();
    }
}
