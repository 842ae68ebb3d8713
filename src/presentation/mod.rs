// Presentation layer - HTTP surface for hosting widgets
pub mod app_state;
pub mod handlers;
