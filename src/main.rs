// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use axum::{routing::get, Router};
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::metrics_source::SourceError;
use crate::application::scheduler::Scheduler;
use crate::application::widget::TelemetryWidget;
use crate::infrastructure::config::{load_source_config, load_widgets_config};
use crate::infrastructure::http_source::HttpMetricsSource;
use crate::infrastructure::tokio_scheduler::TokioScheduler;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    chart_svg, health_check, list_widgets, widget_events, widget_view,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let source_config = load_source_config()?;
    let widgets_config = load_widgets_config()?;

    let scheduler: Arc<dyn Scheduler> = Arc::new(TokioScheduler::new());

    // One source and one widget per configured panel
    let mut widgets = Vec::with_capacity(widgets_config.panels.len());
    for panel in &widgets_config.panels {
        let settings = panel.to_settings()?;
        let source = HttpMetricsSource::new(
            &source_config.source.base_url,
            &panel.endpoint,
            source_config.source.token.clone(),
            source_config.source.timeout(),
        )?;
        tracing::info!("Mounting widget {} polling {}", settings.id, source.url());

        let widget = Arc::new(
            TelemetryWidget::new(settings, Arc::new(source)).with_error_callback(Box::new(
                |id: &str, e: &SourceError| {
                    tracing::error!("Widget {} could not refresh: {}", id, e);
                },
            )),
        );
        widget.start(scheduler.clone())?;
        widgets.push(widget);
    }

    let state = Arc::new(AppState::new(widgets));

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/widgets", get(list_widgets))
        .route("/widgets/:id", get(widget_view))
        .route("/widgets/:id/charts/:chart", get(chart_svg))
        .route("/widgets/:id/events", get(widget_events))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    // Start server
    let addr: SocketAddr = source_config.server.listen.parse()?;
    tracing::info!("Starting router-telemetry service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    Ok(())
}

/// Unmounting the widgets also ends open event streams.
async fn shutdown_signal(state: Arc<AppState>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    state.teardown();
    tracing::info!("All widgets unmounted");
}
