pub mod memory;
pub mod prometheus_metrics;
