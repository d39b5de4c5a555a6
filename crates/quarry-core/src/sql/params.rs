use crate::value::{TypeRef, Value};
use derive_more::{Deref, IntoIterator};
use indexmap::IndexMap;
use std::{cell::RefCell, collections::HashSet, rc::Rc};

///
/// BoundParameter
/// A parameter value with its declared static type.
///

#[derive(Clone, Debug, PartialEq)]
pub struct BoundParameter {
    pub value: Value,
    pub ty: TypeRef,
}

impl BoundParameter {
    #[must_use]
    pub const fn new(value: Value, ty: TypeRef) -> Self {
        Self { value, ty }
    }
}

///
/// ParameterMap
///
/// Ordered name -> parameter map of a compiled statement. Order follows the
/// placeholders' positions in the final SQL text.
///

#[derive(Clone, Debug, Default, Deref, IntoIterator, PartialEq)]
pub struct ParameterMap(#[into_iterator(owned, ref)] IndexMap<String, BoundParameter>);

impl ParameterMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, name: String, param: BoundParameter) {
        self.0.insert(name, param);
    }

    /// Value bound to `name`, if any.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.0.get(name).map(|param| &param.value)
    }

    /// Parameter names in placeholder order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

///
/// NameRegistry
///
/// Allocates unique parameter names for one compile. Generated names are
/// `<prefix><n>`; explicit names are deduplicated with a `_<n>` suffix.
/// Names stay claimed even when their placeholder is rolled back.
///

#[derive(Debug)]
pub(crate) struct NameRegistry {
    prefix: String,
    next: usize,
    claimed: HashSet<String>,
}

pub(crate) type ParamNames = Rc<RefCell<NameRegistry>>;

impl NameRegistry {
    pub(crate) fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 0,
            claimed: HashSet::new(),
        }
    }

    pub(crate) fn shared(prefix: impl Into<String>) -> ParamNames {
        Rc::new(RefCell::new(Self::new(prefix)))
    }

    /// Next free generated name.
    pub(crate) fn generate(&mut self) -> String {
        loop {
            self.next += 1;
            let name = format!("{}{}", self.prefix, self.next);
            if self.claimed.insert(name.clone()) {
                return name;
            }
        }
    }

    /// Claim `name`, or the first free `name_<n>` when it is taken.
    pub(crate) fn claim(&mut self, name: &str) -> String {
        if self.claimed.insert(name.to_string()) {
            return name.to_string();
        }

        (1..)
            .map(|n| format!("{name}_{n}"))
            .find(|candidate| !self.claimed.contains(candidate))
            .map(|candidate| {
                self.claimed.insert(candidate.clone());
                candidate
            })
            .unwrap_or_default()
    }
}
