// HTTP request handlers
use crate::application::widget::WidgetView;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json,
    },
};
use futures::Stream;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;

#[derive(Debug, Serialize, PartialEq)]
pub struct WidgetEntry {
    pub id: String,
    pub title: String,
    pub phase: String,
    pub charts: Vec<String>,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// List mounted widgets
pub async fn list_widgets(State(state): State<Arc<AppState>>) -> Json<Vec<WidgetEntry>> {
    let entries = state
        .widgets
        .iter()
        .map(|w| WidgetEntry {
            id: w.id().to_string(),
            title: w.title().to_string(),
            phase: w.phase().as_str().to_string(),
            charts: w.charts().iter().map(|c| c.id.clone()).collect(),
        })
        .collect();

    Json(entries)
}

/// Latest view of a single widget
pub async fn widget_view(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<WidgetView>, StatusCode> {
    let widget = state.widget(&id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(widget.view().as_ref().clone()))
}

/// One chart rendered as SVG
pub async fn chart_svg(
    Path((id, chart)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, StatusCode> {
    let widget = state.widget(&id).ok_or(StatusCode::NOT_FOUND)?;
    let view = widget.view();
    let rendered = view
        .charts
        .iter()
        .find(|c| c.id == chart)
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/svg+xml"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        rendered.svg.clone(),
    ))
}

/// Push a new view to the client every time the widget redraws
pub async fn widget_events(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, StatusCode> {
    let widget = state.widget(&id).ok_or(StatusCode::NOT_FOUND)?;
    tracing::debug!("SSE subscriber attached to {}", id);

    let widget = widget.clone();
    let stream = WatchStream::new(widget.subscribe())
        .take_while(move |_| widget.is_alive())
        .map(|view| {
            let ev = Event::default()
                .event("view")
                .id(view.revision.to_string())
                .json_data(&*view)
                .unwrap_or_else(|e| {
                    tracing::warn!("Failed to encode view for SSE: {}", e);
                    Event::default().comment("encode error")
                });
            Ok(ev)
        });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
