//! Metrics sink boundary.
//!
//! Compiler logic MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.
use crate::{error::ErrorClass, obs::metrics, sql::StatementKind};
use std::{cell::RefCell, time::Instant};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<*const dyn MetricsSink>> = RefCell::new(None);
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug)]
pub enum MetricsEvent {
    CompileStart {
        kind: StatementKind,
        entity_path: &'static str,
    },
    CompileFinish {
        kind: StatementKind,
        entity_path: &'static str,
        parameters: u64,
        sql_len: u64,
        micros: u64,
    },
    CompileFailed {
        entity_path: &'static str,
        class: ErrorClass,
    },
    ShapeResolved {
        entity_path: &'static str,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

/// GlobalMetricsSink
/// Default sink that writes into the thread-local metrics state.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent) {
        match event {
            MetricsEvent::CompileStart { kind, entity_path } => {
                metrics::with_state_mut(|m| {
                    metrics::count_compile(&mut m.ops, kind);

                    let entry = m.entities.entry(entity_path.to_string()).or_default();
                    if kind.is_command() {
                        entry.commands = entry.commands.saturating_add(1);
                    }
                    entry.compiles = entry.compiles.saturating_add(1);
                });
            }

            MetricsEvent::CompileFinish {
                kind: _,
                entity_path,
                parameters,
                sql_len,
                micros,
            } => {
                metrics::with_state_mut(|m| {
                    m.ops.parameters_bound = m.ops.parameters_bound.saturating_add(parameters);
                    m.ops.sql_bytes = m.ops.sql_bytes.saturating_add(sql_len);
                    metrics::add_micros(
                        &mut m.ops.compile_micros_total,
                        &mut m.ops.compile_micros_max,
                        micros,
                    );

                    let entry = m.entities.entry(entity_path.to_string()).or_default();
                    entry.parameters_bound = entry.parameters_bound.saturating_add(parameters);
                    entry.sql_bytes = entry.sql_bytes.saturating_add(sql_len);
                });
            }

            MetricsEvent::CompileFailed {
                entity_path,
                class: _,
            } => {
                metrics::with_state_mut(|m| {
                    m.ops.failed_compiles = m.ops.failed_compiles.saturating_add(1);
                    let entry = m.entities.entry(entity_path.to_string()).or_default();
                    entry.failures = entry.failures.saturating_add(1);
                });
            }

            MetricsEvent::ShapeResolved { entity_path: _ } => {
                metrics::with_state_mut(|m| {
                    m.ops.shapes_resolved = m.ops.shapes_resolved.saturating_add(1);
                });
            }
        }
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent) {
    let override_ptr = SINK_OVERRIDE.with(|cell| *cell.borrow());
    if let Some(ptr) = override_ptr {
        // SAFETY:
        // Preconditions:
        // - `ptr` was produced from a valid `&dyn MetricsSink` in `with_metrics_sink`.
        // - `with_metrics_sink` always restores the previous pointer before returning,
        //   including unwind paths via `Guard::drop`.
        // - `record` is synchronous and never stores `ptr` beyond this call.
        //
        // Aliasing:
        // - Only a shared reference is materialized, matching the shared borrow
        //   used to install the override.
        //
        // What would break this:
        // - If `with_metrics_sink` failed to restore on all exits (normal + panic),
        //   `ptr` could outlive the borrowed sink and become dangling.
        unsafe { (&*ptr).record(event) };
    } else {
        GLOBAL_METRICS_SINK.record(event);
    }
}

/// Snapshot the current thread's metrics.
///
/// `since_ms` filters by window start (`EventState::since_ms`), not by
/// per-event timestamps.
#[must_use]
pub fn metrics_report(since_ms: Option<u64>) -> metrics::EventReport {
    metrics::report(since_ms)
}

/// Reset all metrics state for the current thread.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override on this thread.
pub fn with_metrics_sink<T>(sink: &dyn MetricsSink, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<*const dyn MetricsSink>);

    impl Drop for Guard {
        fn drop(&mut self) {
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = self.0;
            });
        }
    }

    // SAFETY:
    // Preconditions:
    // - `sink_ptr` is installed only for this dynamic scope.
    // - `Guard` always restores the previous slot on all exits, including panic.
    // - `record` only dereferences synchronously and never persists `sink_ptr`.
    //
    // What would break this:
    // - Any deferred use of `sink_ptr` beyond this scope.
    // - Any path that bypasses Guard restoration.
    let sink_ptr = unsafe { std::mem::transmute::<&dyn MetricsSink, *const dyn MetricsSink>(sink) };
    let prev = SINK_OVERRIDE.with(|cell| cell.borrow_mut().replace(sink_ptr));
    let _guard = Guard(prev);

    f()
}

///
/// Span
/// RAII guard that emits start/finish metrics events for one compile.
/// Finish (or failure) accounting happens on drop, including unwind.
///

pub(crate) struct Span {
    kind: StatementKind,
    entity_path: &'static str,
    started: Instant,
    parameters: u64,
    sql_len: u64,
    failed: Option<ErrorClass>,
}

impl Span {
    /// Start a metrics span for one compile of `entity_path`.
    #[must_use]
    pub(crate) fn new(kind: StatementKind, entity_path: &'static str) -> Self {
        record(MetricsEvent::CompileStart { kind, entity_path });

        Self {
            kind,
            entity_path,
            started: Instant::now(),
            parameters: 0,
            sql_len: 0,
            failed: None,
        }
    }

    pub(crate) fn set_output(&mut self, parameters: usize, sql_len: usize) {
        self.parameters = u64::try_from(parameters).unwrap_or(u64::MAX);
        self.sql_len = u64::try_from(sql_len).unwrap_or(u64::MAX);
    }

    pub(crate) const fn set_failed(&mut self, class: ErrorClass) {
        self.failed = Some(class);
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        let event = match self.failed {
            Some(class) => MetricsEvent::CompileFailed {
                entity_path: self.entity_path,
                class,
            },
            None => MetricsEvent::CompileFinish {
                kind: self.kind,
                entity_path: self.entity_path,
                parameters: self.parameters,
                sql_len: self.sql_len,
                micros: u64::try_from(self.started.elapsed().as_micros()).unwrap_or(u64::MAX),
            },
        };

        record(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink<'a> {
        calls: &'a AtomicUsize,
    }

    impl MetricsSink for CountingSink<'_> {
        fn record(&self, _: MetricsEvent) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    const SHAPE: MetricsEvent = MetricsEvent::ShapeResolved {
        entity_path: "obs::tests::Entity",
    };

    #[test]
    fn with_metrics_sink_routes_and_restores_nested_overrides() {
        SINK_OVERRIDE.with(|cell| {
            *cell.borrow_mut() = None;
        });

        let outer_calls = AtomicUsize::new(0);
        let inner_calls = AtomicUsize::new(0);
        let outer = CountingSink {
            calls: &outer_calls,
        };
        let inner = CountingSink {
            calls: &inner_calls,
        };

        record(SHAPE);
        assert_eq!(outer_calls.load(Ordering::SeqCst), 0);

        with_metrics_sink(&outer, || {
            record(SHAPE);
            assert_eq!(outer_calls.load(Ordering::SeqCst), 1);

            with_metrics_sink(&inner, || record(SHAPE));

            // inner override was restored to outer
            record(SHAPE);
        });

        assert_eq!(outer_calls.load(Ordering::SeqCst), 2);
        assert_eq!(inner_calls.load(Ordering::SeqCst), 1);
        SINK_OVERRIDE.with(|cell| assert!(cell.borrow().is_none()));
    }

    #[test]
    fn with_metrics_sink_restores_override_on_panic() {
        SINK_OVERRIDE.with(|cell| {
            *cell.borrow_mut() = None;
        });

        let calls = AtomicUsize::new(0);
        let sink = CountingSink { calls: &calls };

        let panicked = catch_unwind(AssertUnwindSafe(|| {
            with_metrics_sink(&sink, || {
                record(SHAPE);
                panic!("intentional panic for guard test");
            });
        }))
        .is_err();
        assert!(panicked);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        SINK_OVERRIDE.with(|cell| assert!(cell.borrow().is_none()));
    }

    #[test]
    fn span_records_finish_on_drop() {
        metrics_reset_all();
        {
            let mut span = Span::new(StatementKind::Select, "obs::tests::Entity");
            span.set_output(3, 40);
        }

        let report = metrics_report(None);
        let counters = report.counters.expect("counters present");
        assert_eq!(counters.ops.select_compiles, 1);
        assert_eq!(counters.ops.parameters_bound, 3);
        assert_eq!(counters.ops.sql_bytes, 40);
        assert_eq!(report.entity_counters[0].compiles, 1);
    }

    #[test]
    fn failed_span_counts_failure_without_output() {
        metrics_reset_all();
        {
            let mut span = Span::new(StatementKind::Delete, "obs::tests::Entity");
            span.set_failed(ErrorClass::Syntax);
        }

        let counters = metrics_report(None).counters.expect("counters present");
        assert_eq!(counters.ops.delete_compiles, 1);
        assert_eq!(counters.ops.failed_compiles, 1);
        assert_eq!(counters.ops.sql_bytes, 0);
        let entity = counters
            .entities
            .get("obs::tests::Entity")
            .expect("entity counters present");
        assert_eq!(entity.commands, 1);
        assert_eq!(entity.failures, 1);
    }
}
