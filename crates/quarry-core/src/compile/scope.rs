use crate::{shape::TableShape, sql::SqlBuffer, value::Value};
use std::{collections::HashMap, rc::Rc, sync::Arc};

///
/// ScopeId
/// Index of a scope in the arena.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct ScopeId(usize);

///
/// SourceBinding
///
/// What a lambda parameter stands for while its body compiles.
/// An empty table alias means columns are written unqualified.
///

#[derive(Clone, Debug)]
pub(crate) enum SourceBinding {
    /// A row of an entity table.
    Table {
        shape: Arc<TableShape>,
        alias: String,
    },
    /// A row of a derived table (set operations); columns by logical name.
    Derived { alias: String, columns: Rc<Vec<String>> },
    /// A row of a projection (`Select`, join result selectors).
    Projection(Rc<Vec<ProjectedMember>>),
    /// A single projected value (`Select(x => x.Age)`).
    Scalar { name: String, sql: SqlBuffer },
    /// A compile-time value (in-memory `Any` / `All` enumeration).
    Constant(Value),
}

///
/// ProjectedMember
///

#[derive(Clone, Debug)]
pub(crate) struct ProjectedMember {
    pub(crate) name: String,
    pub(crate) kind: MemberKind,
}

#[derive(Clone, Debug)]
pub(crate) enum MemberKind {
    /// A compiled column expression.
    Column(SqlBuffer),
    /// A whole source carried through the projection (`new { u, o }`).
    Source(SourceBinding),
}

///
/// Scope
///

#[derive(Debug, Default)]
struct Scope {
    parent: Option<ScopeId>,
    aliases: Vec<String>,
    params: HashMap<String, SourceBinding>,
}

///
/// ScopeArena
///
/// Alias scopes with parent indices. Nested compilers push a child of the
/// scope they were spawned from; lookups walk towards the root. Aliases are
/// never rebound and never collide with an alias of any ancestor.
///

#[derive(Debug, Default)]
pub(crate) struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    pub(crate) fn push(&mut self, parent: Option<ScopeId>) -> ScopeId {
        self.scopes.push(Scope {
            parent,
            ..Scope::default()
        });

        ScopeId(self.scopes.len() - 1)
    }

    /// Bind a fresh alias derived from `hint` (`hint`, `hint1`, `hint2`, ...).
    pub(crate) fn bind_alias(&mut self, scope: ScopeId, hint: &str) -> String {
        let alias = (0..)
            .map(|n| {
                if n == 0 {
                    hint.to_string()
                } else {
                    format!("{hint}{n}")
                }
            })
            .find(|candidate| !self.alias_taken(scope, candidate))
            .unwrap_or_default();
        self.scopes[scope.0].aliases.push(alias.clone());

        alias
    }

    pub(crate) fn bind_param(&mut self, scope: ScopeId, name: &str, binding: SourceBinding) {
        self.scopes[scope.0]
            .params
            .insert(name.to_string(), binding);
    }

    /// Resolve a lambda parameter, innermost scope first.
    pub(crate) fn lookup_param(&self, scope: ScopeId, name: &str) -> Option<SourceBinding> {
        self.chain(scope)
            .find_map(|scope| scope.params.get(name))
            .cloned()
    }

    fn alias_taken(&self, scope: ScopeId, alias: &str) -> bool {
        self.chain(scope)
            .any(|scope| scope.aliases.iter().any(|taken| taken == alias))
    }

    fn chain(&self, scope: ScopeId) -> impl Iterator<Item = &Scope> {
        std::iter::successors(Some(&self.scopes[scope.0]), |scope| {
            scope.parent.map(|parent| &self.scopes[parent.0])
        })
    }
}
