use crate::{
    compile::scope::{ScopeArena, ScopeId, SourceBinding},
    config::CompilerConfig,
    dialect::Dialect,
    error::CompileError,
    model::EntityRef,
    shape::{ShapeProvider, TableShape},
    sql::{NameRegistry, ParamNames, SqlBuffer},
};
use std::{
    any::TypeId,
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::Rc,
    sync::Arc,
};

const WINDOW_ALIAS: &str = "__page";

///
/// CompileContext
///
/// Everything one compile shares across its nested compilers: the dialect,
/// shape provider and config, the parameter-name registry, the scope arena,
/// and a per-compile shape memo in front of the provider.
///

pub(crate) struct CompileContext<'a> {
    dialect: Arc<dyn Dialect>,
    shapes: &'a dyn ShapeProvider,
    pub(crate) config: &'a CompilerConfig,
    names: ParamNames,
    scopes: RefCell<ScopeArena>,
    memo: RefCell<HashMap<TypeId, Arc<TableShape>>>,
    branches: Cell<usize>,
    windows: Cell<usize>,
}

impl<'a> CompileContext<'a> {
    pub(crate) fn new(
        dialect: Arc<dyn Dialect>,
        shapes: &'a dyn ShapeProvider,
        config: &'a CompilerConfig,
    ) -> Self {
        Self {
            dialect,
            shapes,
            config,
            names: NameRegistry::shared(config.parameter_prefix.as_str()),
            scopes: RefCell::new(ScopeArena::default()),
            memo: RefCell::new(HashMap::new()),
            branches: Cell::new(0),
            windows: Cell::new(0),
        }
    }

    pub(crate) fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Empty buffer wired to this compile's dialect and parameter names.
    pub(crate) fn buffer(&self) -> SqlBuffer {
        SqlBuffer::new(Arc::clone(&self.dialect), Rc::clone(&self.names))
    }

    /// Shape for `entity`, resolved at most once per compile.
    pub(crate) fn shape(&self, entity: EntityRef) -> Result<Arc<TableShape>, CompileError> {
        if let Some(shape) = self.memo.borrow().get(&entity.type_id()) {
            return Ok(Arc::clone(shape));
        }

        let shape = self.shapes.resolve(entity)?;
        self.memo
            .borrow_mut()
            .insert(entity.type_id(), Arc::clone(&shape));

        Ok(shape)
    }

    // ------------------------------------------------------------------
    // scopes
    // ------------------------------------------------------------------

    pub(crate) fn push_scope(&self, parent: Option<ScopeId>) -> ScopeId {
        self.scopes.borrow_mut().push(parent)
    }

    pub(crate) fn bind_alias(&self, scope: ScopeId, hint: &str) -> String {
        self.scopes.borrow_mut().bind_alias(scope, hint)
    }

    pub(crate) fn bind_param(&self, scope: ScopeId, name: &str, binding: SourceBinding) {
        self.scopes.borrow_mut().bind_param(scope, name, binding);
    }

    pub(crate) fn lookup_param(&self, scope: ScopeId, name: &str) -> Option<SourceBinding> {
        self.scopes.borrow().lookup_param(scope, name)
    }

    /// Alias for a paged set-operation branch wrapper (`UNION_ALIAS_1`, ...).
    pub(crate) fn branch_alias(&self) -> String {
        let next = self.branches.get() + 1;
        self.branches.set(next);

        format!("{}_{next}", self.config.union_alias)
    }

    /// Alias for a derived table wrapped around a paged select (`__page_1`, ...).
    pub(crate) fn window_alias(&self) -> String {
        let next = self.windows.get() + 1;
        self.windows.set(next);

        format!("{WINDOW_ALIAS}_{next}")
    }
}
