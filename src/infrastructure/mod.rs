// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod http_source;
pub mod svg;
pub mod tokio_scheduler;
