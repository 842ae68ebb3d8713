// Application state for HTTP handlers
use crate::application::widget::TelemetryWidget;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct AppState {
    pub widgets: Vec<Arc<TelemetryWidget>>,
}

impl AppState {
    pub fn new(widgets: Vec<Arc<TelemetryWidget>>) -> Self {
        Self { widgets }
    }

    pub fn widget(&self, id: &str) -> Option<&Arc<TelemetryWidget>> {
        self.widgets.iter().find(|w| w.id() == id)
    }

    /// Unmount every widget; pending ticks are discarded.
    pub fn teardown(&self) {
        for widget in &self.widgets {
            widget.teardown();
        }
    }
}
