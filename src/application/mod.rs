// Application layer - Widget orchestration and collaborator contracts
pub mod metrics_source;
pub mod scheduler;
pub mod widget;
