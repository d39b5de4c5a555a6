use crate::{
    error::CompileError,
    model::EntityRef,
    obs::sink::{self, MetricsEvent},
    shape::TableShape,
};
use parking_lot::RwLock;
use std::{
    any::TypeId,
    collections::HashMap,
    sync::{Arc, LazyLock},
};

///
/// SHAPES
///
/// Process-wide read-through cache keyed by entity type identity.
/// Entries are pure derived data and are never evicted.
///

static SHAPES: LazyLock<RwLock<HashMap<TypeId, Arc<TableShape>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Resolve (and memoize) the shape for one entity type.
///
/// Population happens under the write lock with a re-check, so each type is
/// computed at most once even when compiles race.
pub fn shape_for(entity: EntityRef) -> Result<Arc<TableShape>, CompileError> {
    if let Some(shape) = SHAPES.read().get(&entity.type_id()) {
        return Ok(Arc::clone(shape));
    }

    let mut shapes = SHAPES.write();
    if let Some(shape) = shapes.get(&entity.type_id()) {
        return Ok(Arc::clone(shape));
    }

    let shape = Arc::new(TableShape::from_model(entity.model())?);
    shapes.insert(entity.type_id(), Arc::clone(&shape));
    drop(shapes);

    tracing::debug!(
        entity = entity.path(),
        table = %shape.table,
        columns = shape.columns.len(),
        "table shape resolved"
    );
    sink::record(MetricsEvent::ShapeResolved {
        entity_path: entity.path(),
    });

    Ok(shape)
}

/// Number of entity types currently cached.
#[must_use]
pub fn cached_shape_count() -> usize {
    SHAPES.read().len()
}
