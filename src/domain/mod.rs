// Domain layer - Samples, buffers, rates and chart geometry
pub mod chart;
pub mod metric;
pub mod rate;
pub mod series;
pub mod snapshot;
pub mod summary;
