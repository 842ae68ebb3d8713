// Telemetry widget - Polls a metrics source and keeps charts and summaries live
use crate::application::metrics_source::{MetricsSource, SourceError};
use crate::application::scheduler::{ScheduleHandle, Scheduler};
use crate::domain::chart::{ChartRenderer, ChartSpec, Picture};
use crate::domain::metric::MetricKey;
use crate::domain::rate::RateDeriver;
use crate::domain::series::{Sample, SeriesBuffer};
use crate::domain::snapshot::{MetricValue, Reading, UNKNOWN_STATUS};
use crate::domain::summary::{format_throughput, format_uptime, MetricSummary};
use crate::infrastructure::svg::picture_to_svg;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;

pub type ErrorCallback = Box<dyn Fn(&str, &SourceError) + Send + Sync>;

/// Milliseconds since the Unix epoch, read when a snapshot arrives.
pub type Clock = Box<dyn Fn() -> i64 + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetPhase {
    Idle,
    Sampling,
    Rendering,
    Unmounted,
}

impl WidgetPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Sampling => "sampling",
            Self::Rendering => "rendering",
            Self::Unmounted => "unmounted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InFlight,
    Unmounted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Applied,
    Skipped(SkipReason),
    Failed,
    /// The fetch resolved after teardown; nothing was written.
    Discarded,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum WidgetError {
    #[error("widget {0} has been torn down")]
    TornDown(String),
    #[error("widget {0} is already scheduled")]
    AlreadyScheduled(String),
}

#[derive(Debug, Clone)]
pub struct WidgetSettings {
    pub id: String,
    pub title: String,
    pub capacity: usize,
    pub interval: Duration,
    pub charts: Vec<ChartSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedChart {
    pub id: String,
    pub title: String,
    pub unit: String,
    pub max_value: f64,
    pub svg: String,
}

/// Everything a host needs to display the widget, rebuilt on every applied tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetView {
    pub widget: String,
    pub title: String,
    pub revision: u64,
    pub updated_at_ms: Option<i64>,
    pub reported_at: Option<i64>,
    pub status: String,
    pub uptime: String,
    pub throughput: String,
    pub summaries: Vec<MetricSummary>,
    pub charts: Vec<RenderedChart>,
}

struct WidgetState {
    series: Vec<(MetricKey, SeriesBuffer)>,
    rates: RateDeriver,
    pictures: Vec<Picture>,
    status: String,
    uptime_secs: u64,
    updated_at_ms: Option<i64>,
    reported_at: Option<i64>,
    revision: u64,
}

impl WidgetState {
    fn new(settings: &WidgetSettings) -> Self {
        let mut series: Vec<(MetricKey, SeriesBuffer)> = Vec::new();
        for spec in &settings.charts {
            for s in &spec.series {
                if !series.iter().any(|(key, _)| key == &s.metric) {
                    series.push((s.metric.clone(), SeriesBuffer::new(settings.capacity)));
                }
            }
        }

        Self {
            series,
            rates: RateDeriver::new(),
            pictures: Vec::new(),
            status: UNKNOWN_STATUS.to_string(),
            uptime_secs: 0,
            updated_at_ms: None,
            reported_at: None,
            revision: 0,
        }
    }

    fn buffer(&self, key: &MetricKey) -> Option<&SeriesBuffer> {
        self.series
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, buffer)| buffer)
    }

    fn push(&mut self, reading: &Reading) {
        for (key, buffer) in self.series.iter_mut() {
            let value = match reading.value(key) {
                MetricValue::Gauge(v) => v,
                MetricValue::Counter(raw) => {
                    self.rates.observe(&key.to_string(), raw, reading.time_ms)
                }
            };
            buffer.push(Sample::new(reading.time_ms, value));
        }

        self.status = reading.status.clone();
        self.uptime_secs = reading.uptime_secs;
        self.updated_at_ms = Some(reading.time_ms);
        self.reported_at = reading.reported_at;
        self.revision += 1;
    }

    fn redraw(&mut self, renderer: &ChartRenderer, charts: &[ChartSpec]) {
        let pictures: Vec<Picture> = charts
            .iter()
            .map(|spec| {
                let buffers: Vec<&SeriesBuffer> = spec
                    .series
                    .iter()
                    .filter_map(|s| self.buffer(&s.metric))
                    .collect();
                renderer.render(spec, &buffers)
            })
            .collect();
        self.pictures = pictures;
    }

    fn summaries(&self) -> Vec<MetricSummary> {
        self.series
            .iter()
            .map(|(key, buffer)| MetricSummary::from_buffer(key, buffer))
            .collect()
    }

    fn latest(&self, key: &MetricKey) -> Option<f64> {
        self.buffer(key).and_then(|b| b.latest()).map(|s| s.value)
    }
}

pub struct TelemetryWidget {
    settings: WidgetSettings,
    source: Arc<dyn MetricsSource>,
    renderer: ChartRenderer,
    on_error: Option<ErrorCallback>,
    clock: Clock,
    state: Mutex<Option<WidgetState>>,
    phase: Mutex<WidgetPhase>,
    alive: AtomicBool,
    in_flight: AtomicBool,
    schedule: Mutex<Option<(Arc<dyn Scheduler>, ScheduleHandle)>>,
    view_tx: watch::Sender<Arc<WidgetView>>,
}

/// Clears the in-flight flag when a tick ends, including when its task is
/// cancelled mid-fetch.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl TelemetryWidget {
    pub fn new(settings: WidgetSettings, source: Arc<dyn MetricsSource>) -> Self {
        let renderer = ChartRenderer::default();
        let mut state = WidgetState::new(&settings);
        state.redraw(&renderer, &settings.charts);

        let (view_tx, _) = watch::channel(Arc::new(Self::build_view(&settings, &state)));

        Self {
            settings,
            source,
            renderer,
            on_error: None,
            clock: Box::new(|| chrono::Utc::now().timestamp_millis()),
            state: Mutex::new(Some(state)),
            phase: Mutex::new(WidgetPhase::Idle),
            alive: AtomicBool::new(true),
            in_flight: AtomicBool::new(false),
            schedule: Mutex::new(None),
            view_tx,
        }
    }

    pub fn with_renderer(mut self, renderer: ChartRenderer) -> Self {
        self.renderer = renderer;
        if let Some(state) = lock(&self.state).as_mut() {
            state.redraw(&renderer, &self.settings.charts);
            self.view_tx
                .send_replace(Arc::new(Self::build_view(&self.settings, state)));
        }
        self
    }

    pub fn with_error_callback(mut self, callback: ErrorCallback) -> Self {
        self.on_error = Some(callback);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn id(&self) -> &str {
        &self.settings.id
    }

    pub fn title(&self) -> &str {
        &self.settings.title
    }

    pub fn charts(&self) -> &[ChartSpec] {
        &self.settings.charts
    }

    pub fn phase(&self) -> WidgetPhase {
        *lock(&self.phase)
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Register the periodic tick with `scheduler`.
    pub fn start(self: &Arc<Self>, scheduler: Arc<dyn Scheduler>) -> Result<ScheduleHandle, WidgetError> {
        let mut schedule = lock(&self.schedule);
        if !self.is_alive() {
            return Err(WidgetError::TornDown(self.settings.id.clone()));
        }
        if schedule.is_some() {
            return Err(WidgetError::AlreadyScheduled(self.settings.id.clone()));
        }

        let weak = Arc::downgrade(self);
        let handle = scheduler.every(
            self.settings.interval,
            Box::new(move || {
                if let Some(widget) = weak.upgrade() {
                    tokio::spawn(async move {
                        widget.tick().await;
                    });
                }
            }),
        );
        *schedule = Some((scheduler, handle));

        tracing::info!(
            "Widget {} polling every {:?} ({} samples)",
            self.settings.id,
            self.settings.interval,
            self.settings.capacity
        );
        Ok(handle)
    }

    /// Run one poll cycle: fetch, push samples, redraw, publish.
    pub async fn tick(&self) -> TickOutcome {
        if !self.is_alive() {
            return TickOutcome::Skipped(SkipReason::Unmounted);
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(
                "Skipping tick for {}: previous fetch still outstanding",
                self.settings.id
            );
            return TickOutcome::Skipped(SkipReason::InFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        self.set_phase(WidgetPhase::Sampling);
        let result = self.source.fetch().await;

        if !self.is_alive() {
            tracing::debug!("Discarding snapshot for torn down widget {}", self.settings.id);
            return TickOutcome::Discarded;
        }

        match result {
            Ok(snapshot) => {
                let reading = snapshot.normalize((self.clock)());
                self.apply(&reading)
            }
            Err(e) => {
                tracing::warn!("Error fetching snapshot for {}: {}", self.settings.id, e);
                if let Some(callback) = &self.on_error {
                    callback(self.settings.id.as_str(), &e);
                }
                self.set_phase(WidgetPhase::Idle);
                TickOutcome::Failed
            }
        }
    }

    fn apply(&self, reading: &Reading) -> TickOutcome {
        let mut guard = lock(&self.state);
        let Some(state) = guard.as_mut() else {
            return TickOutcome::Discarded;
        };

        self.set_phase(WidgetPhase::Rendering);
        state.push(reading);
        state.redraw(&self.renderer, &self.settings.charts);
        self.view_tx
            .send_replace(Arc::new(Self::build_view(&self.settings, state)));
        self.set_phase(WidgetPhase::Idle);

        tracing::debug!(
            "Widget {} applied revision {}",
            self.settings.id,
            state.revision
        );
        TickOutcome::Applied
    }

    /// Stop polling and release buffers. Safe to call more than once.
    pub fn teardown(&self) {
        if !self.alive.swap(false, Ordering::AcqRel) {
            return;
        }

        let schedule = lock(&self.schedule).take();
        if let Some((scheduler, handle)) = schedule {
            scheduler.cancel(handle);
        }
        lock(&self.state).take();
        *lock(&self.phase) = WidgetPhase::Unmounted;
        // Wake subscribers so they observe the unmount
        self.view_tx.send_modify(|_| {});

        tracing::info!("Widget {} torn down", self.settings.id);
    }

    pub fn values(&self, key: &MetricKey) -> Option<Vec<f64>> {
        lock(&self.state)
            .as_ref()
            .and_then(|state| state.buffer(key))
            .map(SeriesBuffer::values)
    }

    pub fn summary(&self, key: &MetricKey) -> Option<MetricSummary> {
        lock(&self.state)
            .as_ref()
            .and_then(|state| state.buffer(key).map(|b| MetricSummary::from_buffer(key, b)))
    }

    pub fn picture(&self, chart_id: &str) -> Option<Picture> {
        let index = self.settings.charts.iter().position(|c| c.id == chart_id)?;
        lock(&self.state)
            .as_ref()
            .and_then(|state| state.pictures.get(index).cloned())
    }

    /// Latest published view.
    pub fn view(&self) -> Arc<WidgetView> {
        self.view_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<WidgetView>> {
        self.view_tx.subscribe()
    }

    fn set_phase(&self, phase: WidgetPhase) {
        let mut current = lock(&self.phase);
        if *current != WidgetPhase::Unmounted {
            *current = phase;
        }
    }

    fn build_view(settings: &WidgetSettings, state: &WidgetState) -> WidgetView {
        let charts = settings
            .charts
            .iter()
            .zip(&state.pictures)
            .map(|(spec, picture)| RenderedChart {
                id: spec.id.clone(),
                title: spec.title.clone(),
                unit: spec.unit_label.clone(),
                max_value: picture.max_value,
                svg: picture_to_svg(picture),
            })
            .collect();

        WidgetView {
            widget: settings.id.clone(),
            title: settings.title.clone(),
            revision: state.revision,
            updated_at_ms: state.updated_at_ms,
            reported_at: state.reported_at,
            status: state.status.clone(),
            uptime: format_uptime(state.uptime_secs),
            throughput: format_throughput(
                state.latest(&MetricKey::NetRx),
                state.latest(&MetricKey::NetTx),
            ),
            summaries: state.summaries(),
            charts,
        }
    }
}

impl Drop for TelemetryWidget {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::scheduler::TickCallback;
    use crate::domain::chart::{ScaleMode, SeriesSpec};
    use crate::domain::snapshot::Snapshot;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    fn snapshot(body: &str) -> Snapshot {
        Snapshot::from_json(body).unwrap()
    }

    /// Yields `times` in order, then keeps returning the last one.
    fn scripted_clock(times: Vec<i64>) -> Clock {
        let times = Mutex::new(VecDeque::from(times));
        let last = Mutex::new(0);
        Box::new(move || {
            let mut last = lock(&last);
            if let Some(next) = lock(&times).pop_front() {
                *last = next;
            }
            *last
        })
    }

    /// Replays queued results; an exhausted queue yields empty snapshots.
    #[derive(Default)]
    struct ScriptedSource {
        results: Mutex<VecDeque<Result<Snapshot, SourceError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(results: Vec<Result<Snapshot, SourceError>>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results.into()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MetricsSource for ScriptedSource {
        async fn fetch(&self) -> Result<Snapshot, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            lock(&self.results)
                .pop_front()
                .unwrap_or_else(|| Ok(Snapshot::default()))
        }
    }

    /// Blocks every fetch until `release` is called.
    #[derive(Default)]
    struct GatedSource {
        gate: Notify,
        calls: AtomicUsize,
    }

    impl GatedSource {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn release(&self) {
            self.gate.notify_one();
        }
    }

    #[async_trait]
    impl MetricsSource for GatedSource {
        async fn fetch(&self) -> Result<Snapshot, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            Ok(snapshot(r#"{"timestamp": 1000, "cpu": {"percent": 42}}"#))
        }
    }

    #[derive(Default)]
    struct ManualScheduler {
        callbacks: Mutex<Vec<(ScheduleHandle, TickCallback)>>,
        cancelled: Mutex<Vec<ScheduleHandle>>,
    }

    impl ManualScheduler {
        fn fire(&self) {
            for (_, callback) in lock(&self.callbacks).iter() {
                callback();
            }
        }

        fn cancel_count(&self) -> usize {
            lock(&self.cancelled).len()
        }
    }

    impl Scheduler for ManualScheduler {
        fn every(&self, _interval: Duration, callback: TickCallback) -> ScheduleHandle {
            let mut callbacks = lock(&self.callbacks);
            let handle = ScheduleHandle(callbacks.len() as u64 + 1);
            callbacks.push((handle, callback));
            handle
        }

        fn cancel(&self, handle: ScheduleHandle) {
            lock(&self.callbacks).retain(|(h, _)| *h != handle);
            lock(&self.cancelled).push(handle);
        }
    }

    fn settings(capacity: usize) -> WidgetSettings {
        let series = |metric: MetricKey, color: &str| {
            SeriesSpec::new(metric.clone(), metric.label(), color.to_string())
        };

        WidgetSettings {
            id: "monitoring".to_string(),
            title: "System Monitoring".to_string(),
            capacity,
            interval: Duration::from_secs(5),
            charts: vec![
                ChartSpec::new(
                    "cpu".to_string(),
                    "CPU Usage".to_string(),
                    "%".to_string(),
                    ScaleMode::Fixed0To100,
                    None,
                    true,
                    vec![series(MetricKey::Cpu, "#6366f1")],
                ),
                ChartSpec::new(
                    "memory".to_string(),
                    "Memory Usage".to_string(),
                    "%".to_string(),
                    ScaleMode::Fixed0To100,
                    None,
                    true,
                    vec![series(MetricKey::Memory, "#22c55e")],
                ),
                ChartSpec::new(
                    "network".to_string(),
                    "Network Throughput".to_string(),
                    "B/s".to_string(),
                    ScaleMode::AutoMax,
                    None,
                    false,
                    vec![
                        series(MetricKey::NetRx, "#22c55e"),
                        series(MetricKey::NetTx, "#3b82f6"),
                    ],
                ),
            ],
        }
    }

    async fn wait_for_calls(source: &GatedSource, calls: usize) {
        while source.calls() < calls {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_tick_pushes_gauges_and_rates() {
        let source = ScriptedSource::new(vec![
            Ok(snapshot(
                r#"{"timestamp": 0, "cpu": {"percent": 10}, "memory": {"percent": 40},
                    "network": {"rx_bytes": 100, "tx_bytes": 1000}}"#,
            )),
            Ok(snapshot(
                r#"{"timestamp": 1000, "cpu": {"percent": 20}, "memory": {"percent": 41},
                    "network": {"rx_bytes": 150, "tx_bytes": 3048}}"#,
            )),
        ]);
        let widget = TelemetryWidget::new(settings(60), source.clone())
            .with_clock(scripted_clock(vec![0, 1000]));

        assert_eq!(widget.tick().await, TickOutcome::Applied);
        assert_eq!(widget.tick().await, TickOutcome::Applied);

        assert_eq!(widget.values(&MetricKey::Cpu), Some(vec![10.0, 20.0]));
        assert_eq!(widget.values(&MetricKey::NetRx), Some(vec![0.0, 50.0]));
        assert_eq!(widget.values(&MetricKey::NetTx), Some(vec![0.0, 2048.0]));
        assert_eq!(widget.phase(), WidgetPhase::Idle);

        let view = widget.view();
        assert_eq!(view.revision, 2);
        assert_eq!(view.updated_at_ms, Some(1000));
        assert_eq!(view.throughput, "50.00 B/s ↓ · 2.00 KB/s ↑");
        assert_eq!(view.charts.len(), 3);
        assert!(view.charts[0].svg.contains("<polyline"));
    }

    #[tokio::test]
    async fn test_buffers_stay_bounded() {
        let source = ScriptedSource::new(
            (0..8)
                .map(|i| {
                    Ok(snapshot(&format!(
                        r#"{{"timestamp": {}, "cpu": {{"percent": {}}}}}"#,
                        i * 1000,
                        i
                    )))
                })
                .collect(),
        );
        let widget = TelemetryWidget::new(settings(3), source);

        for _ in 0..8 {
            widget.tick().await;
        }

        assert_eq!(widget.values(&MetricKey::Cpu), Some(vec![5.0, 6.0, 7.0]));
        assert_eq!(
            widget.summary(&MetricKey::Cpu).map(|s| s.window_text),
            Some("3 / 3".to_string())
        );
    }

    #[tokio::test]
    async fn test_counter_reset_in_widget() {
        let source = ScriptedSource::new(vec![
            Ok(snapshot(r#"{"timestamp": 0, "network": {"rx_bytes": 1000}}"#)),
            Ok(snapshot(r#"{"timestamp": 1000, "network": {"rx_bytes": 200}}"#)),
            Ok(snapshot(r#"{"timestamp": 3000, "network": {"rx_bytes": 600}}"#)),
        ]);
        let widget = TelemetryWidget::new(settings(60), source)
            .with_clock(scripted_clock(vec![0, 1000, 3000]));

        for _ in 0..3 {
            widget.tick().await;
        }

        assert_eq!(widget.values(&MetricKey::NetRx), Some(vec![0.0, 0.0, 200.0]));
    }

    #[tokio::test]
    async fn test_rates_use_arrival_clock_with_second_timestamps() {
        let source = ScriptedSource::new(vec![
            Ok(snapshot(r#"{"timestamp": 1700000000, "network": {"rx_bytes": 0}}"#)),
            Ok(snapshot(r#"{"timestamp": 1700000005, "network": {"rx_bytes": 5000}}"#)),
        ]);
        let widget = TelemetryWidget::new(settings(60), source)
            .with_clock(scripted_clock(vec![10_000, 15_000]));

        widget.tick().await;
        widget.tick().await;

        assert_eq!(widget.values(&MetricKey::NetRx), Some(vec![0.0, 1000.0]));
        let view = widget.view();
        assert_eq!(view.updated_at_ms, Some(15_000));
        assert_eq!(view.reported_at, Some(1_700_000_005));
    }

    #[tokio::test]
    async fn test_repeated_payload_timestamp_still_yields_rates() {
        let source = ScriptedSource::new(
            [0, 5000, 10000]
                .iter()
                .map(|rx| {
                    Ok(snapshot(&format!(
                        r#"{{"timestamp": 1700000000, "network": {{"rx_bytes": {}}}}}"#,
                        rx
                    )))
                })
                .collect(),
        );
        let widget = TelemetryWidget::new(settings(60), source)
            .with_clock(scripted_clock(vec![0, 5000, 10_000]));

        for _ in 0..3 {
            widget.tick().await;
        }

        assert_eq!(
            widget.values(&MetricKey::NetRx),
            Some(vec![0.0, 1000.0, 1000.0])
        );
    }

    #[tokio::test]
    async fn test_partial_snapshot_pushes_zero() {
        let source = ScriptedSource::new(vec![Ok(snapshot(
            r#"{"timestamp": 5, "cpu": {"percent": 12}}"#,
        ))]);
        let widget = TelemetryWidget::new(settings(60), source);

        assert_eq!(widget.tick().await, TickOutcome::Applied);
        assert_eq!(widget.values(&MetricKey::Memory), Some(vec![0.0]));
        assert_eq!(widget.view().status, UNKNOWN_STATUS);
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_buffers_untouched() {
        let source = ScriptedSource::new(vec![
            Ok(snapshot(r#"{"timestamp": 0, "cpu": {"percent": 30}}"#)),
            Err(SourceError::Status {
                url: "http://router/health".to_string(),
                status: 502,
            }),
            Ok(snapshot(r#"{"timestamp": 2000, "cpu": {"percent": 35}}"#)),
        ]);
        let errors = Arc::new(Mutex::new(Vec::new()));
        let seen = errors.clone();
        let widget = TelemetryWidget::new(settings(60), source)
            .with_clock(scripted_clock(vec![0, 2000]))
            .with_error_callback(Box::new(move |id: &str, e: &SourceError| {
                lock(&seen).push(format!("{}: {}", id, e))
            }));

        assert_eq!(widget.tick().await, TickOutcome::Applied);
        assert_eq!(widget.tick().await, TickOutcome::Failed);
        assert_eq!(widget.values(&MetricKey::Cpu), Some(vec![30.0]));
        assert_eq!(widget.view().revision, 1);

        assert_eq!(widget.tick().await, TickOutcome::Applied);
        assert_eq!(widget.values(&MetricKey::Cpu), Some(vec![30.0, 35.0]));
        assert_eq!(
            *lock(&errors),
            vec!["monitoring: http://router/health answered with status 502".to_string()]
        );
    }

    #[tokio::test]
    async fn test_overlapping_ticks_fetch_once() {
        let source = Arc::new(GatedSource::default());
        let widget = Arc::new(TelemetryWidget::new(settings(60), source.clone()));

        let first = tokio::spawn({
            let widget = widget.clone();
            async move { widget.tick().await }
        });
        wait_for_calls(&source, 1).await;
        assert_eq!(widget.phase(), WidgetPhase::Sampling);

        assert_eq!(
            widget.tick().await,
            TickOutcome::Skipped(SkipReason::InFlight)
        );

        source.release();
        assert_eq!(first.await.unwrap(), TickOutcome::Applied);
        assert_eq!(source.calls(), 1);
        assert_eq!(widget.values(&MetricKey::Cpu), Some(vec![42.0]));
    }

    #[tokio::test]
    async fn test_fetch_resolving_after_teardown_is_discarded() {
        let source = Arc::new(GatedSource::default());
        let widget = Arc::new(TelemetryWidget::new(settings(60), source.clone()));
        let mut views = widget.subscribe();

        let pending = tokio::spawn({
            let widget = widget.clone();
            async move { widget.tick().await }
        });
        wait_for_calls(&source, 1).await;

        widget.teardown();
        source.release();

        assert_eq!(pending.await.unwrap(), TickOutcome::Discarded);
        assert_eq!(widget.values(&MetricKey::Cpu), None);
        assert_eq!(widget.phase(), WidgetPhase::Unmounted);
        // Subscribers are woken by the unmount but see no new data
        assert!(views.has_changed().unwrap_or(false));
        assert_eq!(views.borrow_and_update().revision, 0);
    }

    #[tokio::test]
    async fn test_teardown_cancels_once() {
        let scheduler = Arc::new(ManualScheduler::default());
        let widget = Arc::new(TelemetryWidget::new(
            settings(60),
            ScriptedSource::new(Vec::new()),
        ));

        widget.start(scheduler.clone()).unwrap();
        assert_eq!(
            widget.start(scheduler.clone()),
            Err(WidgetError::AlreadyScheduled("monitoring".to_string()))
        );

        widget.teardown();
        widget.teardown();

        assert_eq!(scheduler.cancel_count(), 1);
        assert_eq!(
            widget.start(scheduler.clone()),
            Err(WidgetError::TornDown("monitoring".to_string()))
        );
        assert_eq!(
            widget.tick().await,
            TickOutcome::Skipped(SkipReason::Unmounted)
        );
    }

    #[tokio::test]
    async fn test_scheduler_fires_ticks() {
        let scheduler = Arc::new(ManualScheduler::default());
        let source = ScriptedSource::new(vec![Ok(snapshot(
            r#"{"timestamp": 10, "cpu": {"percent": 64}}"#,
        ))]);
        let widget = Arc::new(TelemetryWidget::new(settings(60), source.clone()));
        let mut views = widget.subscribe();

        widget.start(scheduler.clone()).unwrap();
        scheduler.fire();
        views.changed().await.unwrap();

        assert_eq!(views.borrow().revision, 1);
        assert_eq!(widget.values(&MetricKey::Cpu), Some(vec![64.0]));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dropping_widget_cancels_schedule() {
        let scheduler = Arc::new(ManualScheduler::default());
        let widget = Arc::new(TelemetryWidget::new(
            settings(60),
            ScriptedSource::new(Vec::new()),
        ));

        widget.start(scheduler.clone()).unwrap();
        drop(widget);

        assert_eq!(scheduler.cancel_count(), 1);
    }

    #[test]
    fn test_initial_view_is_empty() {
        let widget = TelemetryWidget::new(settings(30), ScriptedSource::new(Vec::new()));
        let view = widget.view();

        assert_eq!(view.revision, 0);
        assert_eq!(view.uptime, "0s");
        assert_eq!(view.summaries.len(), 4);
        assert!(view.summaries.iter().all(|s| s.window_text == "0 / 30"));
        assert!(widget.picture("cpu").map(|p| p.is_empty()).unwrap_or(false));
        assert!(widget.picture("missing").is_none());
    }
}
