use crate::sql::StatementKind;
use serde::{Deserialize, Serialize};
use std::{
    cell::RefCell,
    cmp::Ordering,
    collections::BTreeMap,
    time::{SystemTime, UNIX_EPOCH},
};

///
/// EventState
/// Ephemeral, in-memory compile counters for the current thread.
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EventState {
    pub ops: EventOps,
    pub entities: BTreeMap<String, EntityCounters>,
    pub since_ms: u64,
}

impl Default for EventState {
    fn default() -> Self {
        Self {
            ops: EventOps::default(),
            entities: BTreeMap::new(),
            since_ms: now_millis(),
        }
    }
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventOps {
    // Compile entrypoints
    pub select_compiles: u64,
    pub scalar_compiles: u64,
    pub insert_compiles: u64,
    pub update_compiles: u64,
    pub delete_compiles: u64,
    pub failed_compiles: u64,

    // Output volume
    pub parameters_bound: u64,
    pub sql_bytes: u64,

    // Timing (microseconds)
    pub compile_micros_total: u128,
    pub compile_micros_max: u64,

    // Shape cache population
    pub shapes_resolved: u64,
}

///
/// EntityCounters
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EntityCounters {
    pub compiles: u64,
    pub commands: u64,
    pub failures: u64,
    pub parameters_bound: u64,
    pub sql_bytes: u64,
}

thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Reset all counters.
pub(crate) fn reset_all() {
    with_state_mut(|m| *m = EventState::default());
}

/// Accumulate a timing sample and track the max.
pub(crate) fn add_micros(total: &mut u128, max: &mut u64, delta: u64) {
    *total = total.saturating_add(u128::from(delta));
    if delta > *max {
        *max = delta;
    }
}

/// Bump the per-kind compile counter.
pub(crate) fn count_compile(ops: &mut EventOps, kind: StatementKind) {
    let slot = match kind {
        StatementKind::Select => &mut ops.select_compiles,
        StatementKind::Scalar => &mut ops.scalar_compiles,
        StatementKind::Insert => &mut ops.insert_compiles,
        StatementKind::Update => &mut ops.update_compiles,
        StatementKind::Delete => &mut ops.delete_compiles,
    };
    *slot = slot.saturating_add(1);
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
        })
}

///
/// EventReport
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventReport {
    /// Ephemeral counters since `since_ms`.
    pub counters: Option<EventState>,
    /// Per-entity counters and averages.
    pub entity_counters: Vec<EntitySummary>,
}

///
/// EntitySummary
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EntitySummary {
    pub path: String,
    pub compiles: u64,
    pub commands: u64,
    pub failures: u64,
    pub parameters_bound: u64,
    pub avg_parameters_per_compile: f64,
    pub avg_sql_bytes_per_compile: f64,
}

/// Build a report from the in-memory counters.
///
/// `since_ms` filters by window start: a window that opened before
/// `since_ms` yields an empty report.
#[must_use]
#[expect(clippy::cast_precision_loss)]
pub(crate) fn report(since_ms: Option<u64>) -> EventReport {
    let snap = with_state(Clone::clone);
    if since_ms.is_some_and(|since| snap.since_ms < since) {
        return EventReport::default();
    }

    let mut entity_counters: Vec<EntitySummary> = snap
        .entities
        .iter()
        .map(|(path, counters)| {
            let per_compile = |total: u64| {
                if counters.compiles > 0 {
                    total as f64 / counters.compiles as f64
                } else {
                    0.0
                }
            };

            EntitySummary {
                path: path.clone(),
                compiles: counters.compiles,
                commands: counters.commands,
                failures: counters.failures,
                parameters_bound: counters.parameters_bound,
                avg_parameters_per_compile: per_compile(counters.parameters_bound),
                avg_sql_bytes_per_compile: per_compile(counters.sql_bytes),
            }
        })
        .collect();

    // busiest entities first, then path for a stable order
    entity_counters.sort_by(|a, b| match b.compiles.cmp(&a.compiles) {
        Ordering::Equal => a.path.cmp(&b.path),
        other => other,
    });

    EventReport {
        counters: Some(snap),
        entity_counters,
    }
}

///
/// TESTS
///
