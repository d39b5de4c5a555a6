//! Observability: compile telemetry (metrics) and sink abstractions.
//!
//! Compiler code never touches `metrics` directly; every counter update
//! flows through `sink::record`.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{EntityCounters, EntitySummary, EventOps, EventReport, EventState};
pub use sink::{MetricsEvent, MetricsSink, metrics_report, metrics_reset_all, with_metrics_sink};
