use crate::{
    dialect::Dialect,
    expr::BinaryOp,
    sql::params::{BoundParameter, NameRegistry, ParamNames, ParameterMap},
    value::{TypeRef, Value},
};
use std::{fmt, rc::Rc, sync::Arc};

///
/// PlacedParameter
/// A registered parameter and the byte offset of its placeholder.
///

#[derive(Clone, Debug)]
struct PlacedParameter {
    offset: usize,
    name: String,
    param: BoundParameter,
}

///
/// SqlBuffer
///
/// Append-oriented SQL text with registered parameters.
///
/// While the append cursor is set, writes are inserted at the cursor and the
/// cursor advances past them; this is how already-emitted text gets wrapped
/// (parentheses around a fused condition, `EXISTS(` around a subquery).
/// `remove` discards speculative output together with the parameters whose
/// placeholders fell inside the removed range.
///
/// The `negated` flag is the NOT polarity: connective and comparison helpers
/// emit their inverse while it is set, so NOT never needs to be written.
///

#[derive(Clone)]
pub struct SqlBuffer {
    text: String,
    cursor: Option<usize>,
    params: Vec<PlacedParameter>,
    dialect: Arc<dyn Dialect>,
    names: ParamNames,
    negated: bool,
}

impl SqlBuffer {
    #[must_use]
    pub(crate) fn new(dialect: Arc<dyn Dialect>, names: ParamNames) -> Self {
        Self {
            text: String::new(),
            cursor: None,
            params: Vec::new(),
            dialect,
            names,
            negated: false,
        }
    }

    /// Standalone buffer with its own name registry.
    #[must_use]
    pub fn standalone(dialect: Arc<dyn Dialect>, prefix: &str) -> Self {
        Self::new(dialect, NameRegistry::shared(prefix))
    }

    /// Empty sibling buffer sharing the dialect and parameter names.
    #[must_use]
    pub fn fork(&self) -> Self {
        Self::new(Arc::clone(&self.dialect), Rc::clone(&self.names))
    }

    #[must_use]
    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.text.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Current write position: the cursor when set, else the end.
    #[must_use]
    pub fn position(&self) -> usize {
        self.cursor.unwrap_or(self.text.len())
    }

    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.params.len()
    }

    // ------------------------------------------------------------------
    // cursor
    // ------------------------------------------------------------------

    #[must_use]
    pub const fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Redirect subsequent writes to `pos` (clamped to the text length).
    pub fn set_cursor(&mut self, pos: usize) {
        self.cursor = Some(pos.min(self.text.len()));
    }

    /// Resume appending at the end.
    pub const fn clear_cursor(&mut self) {
        self.cursor = None;
    }

    /// Insert `prefix` at `start` and `suffix` at the current end.
    pub fn wrap(&mut self, start: usize, prefix: &str, suffix: &str) {
        let saved = self.cursor.take();
        self.set_cursor(start);
        self.write(prefix);
        self.cursor = saved.map(|pos| if pos >= start { pos + prefix.len() } else { pos });

        let end = self.text.len();
        self.insert_text(end, suffix);
    }

    // ------------------------------------------------------------------
    // text
    // ------------------------------------------------------------------

    pub fn write(&mut self, text: &str) -> &mut Self {
        let pos = self.position();
        self.insert_text(pos, text);
        if let Some(cursor) = self.cursor.as_mut() {
            *cursor += text.len();
        }

        self
    }

    pub fn write_identifier(&mut self, name: &str) -> &mut Self {
        let quoted = self.dialect.quote_identifier(name);
        self.write(&quoted)
    }

    /// `alias.column`, or the bare column when `alias` is empty.
    pub fn write_column(&mut self, alias: &str, column: &str) -> &mut Self {
        if !alias.is_empty() {
            self.write_identifier(alias);
            self.write(".");
        }
        self.write_identifier(column)
    }

    pub fn open_brace(&mut self) -> &mut Self {
        self.write("(")
    }

    pub fn close_brace(&mut self) -> &mut Self {
        self.write(")")
    }

    pub fn delimiter(&mut self) -> &mut Self {
        self.write(", ")
    }

    pub fn white_space(&mut self) -> &mut Self {
        self.write(" ")
    }

    /// Remove `len` bytes at `start`, dropping parameters placed inside.
    pub fn remove(&mut self, start: usize, len: usize) {
        let start = start.min(self.text.len());
        let end = start.saturating_add(len).min(self.text.len());
        if start == end {
            return;
        }
        let removed = end - start;

        self.text.replace_range(start..end, "");
        self.params
            .retain(|placed| placed.offset < start || placed.offset >= end);
        for placed in &mut self.params {
            if placed.offset >= end {
                placed.offset -= removed;
            }
        }
        if let Some(cursor) = self.cursor.as_mut() {
            if *cursor >= end {
                *cursor -= removed;
            } else if *cursor > start {
                *cursor = start;
            }
        }
    }

    /// Remove everything from `pos` to the end.
    pub fn truncate(&mut self, pos: usize) {
        let len = self.text.len().saturating_sub(pos);
        self.remove(pos, len);
    }

    /// Merge a sibling fragment at the current position.
    pub fn append(&mut self, other: Self) -> &mut Self {
        let pos = self.position();
        self.insert_text(pos, &other.text);
        self.params
            .extend(other.params.into_iter().map(|placed| PlacedParameter {
                offset: placed.offset + pos,
                ..placed
            }));
        if let Some(cursor) = self.cursor.as_mut() {
            *cursor += other.text.len();
        }

        self
    }

    /// Merge a copy of a fragment (projected columns referenced twice).
    pub fn append_ref(&mut self, other: &Self) -> &mut Self {
        self.append(other.clone())
    }

    fn insert_text(&mut self, pos: usize, text: &str) {
        if text.is_empty() {
            return;
        }
        for placed in &mut self.params {
            if placed.offset >= pos {
                placed.offset += text.len();
            }
        }
        self.text.insert_str(pos, text);
    }

    // ------------------------------------------------------------------
    // parameters
    // ------------------------------------------------------------------

    /// Register a parameter under a generated name and write its placeholder.
    pub fn parameter(&mut self, value: Value, ty: TypeRef) -> &mut Self {
        let name = self.names.borrow_mut().generate();
        self.place(name, value, ty)
    }

    /// Register a parameter under a caller-chosen (deduplicated) name.
    pub fn parameter_named(&mut self, name: &str, value: Value, ty: TypeRef) -> &mut Self {
        let name = self.names.borrow_mut().claim(name);
        self.place(name, value, ty)
    }

    fn place(&mut self, name: String, value: Value, ty: TypeRef) -> &mut Self {
        let placeholder = self.dialect.format_parameter(&name);
        let offset = self.position();
        self.write(&placeholder);
        self.params.push(PlacedParameter {
            offset,
            name,
            param: BoundParameter::new(value, ty),
        });

        self
    }

    // ------------------------------------------------------------------
    // polarity-aware helpers
    // ------------------------------------------------------------------

    #[must_use]
    pub const fn is_negated(&self) -> bool {
        self.negated
    }

    pub const fn toggle_not(&mut self) {
        self.negated = !self.negated;
    }

    /// Set the polarity, returning the previous one.
    pub const fn set_negated(&mut self, negated: bool) -> bool {
        let previous = self.negated;
        self.negated = negated;
        previous
    }

    pub fn and(&mut self) -> &mut Self {
        self.write(if self.negated { " OR " } else { " AND " })
    }

    pub fn or(&mut self) -> &mut Self {
        self.write(if self.negated { " AND " } else { " OR " })
    }

    pub fn equal(&mut self) -> &mut Self {
        self.comparison(BinaryOp::Eq)
    }

    /// Comparison operator; inverted under NOT polarity.
    pub fn comparison(&mut self, op: BinaryOp) -> &mut Self {
        let op = if self.negated { invert(op) } else { op };
        let text = match op {
            BinaryOp::Ne => " <> ",
            BinaryOp::Lt => " < ",
            BinaryOp::Le => " <= ",
            BinaryOp::Gt => " > ",
            BinaryOp::Ge => " >= ",
            _ => " = ",
        };
        self.write(text)
    }

    pub fn is_null(&mut self) -> &mut Self {
        self.write(if self.negated {
            " IS NOT NULL"
        } else {
            " IS NULL"
        })
    }

    pub fn is_not_null(&mut self) -> &mut Self {
        self.write(if self.negated {
            " IS NULL"
        } else {
            " IS NOT NULL"
        })
    }

    pub fn like(&mut self) -> &mut Self {
        self.write(if self.negated { " NOT LIKE " } else { " LIKE " })
    }

    pub fn in_list(&mut self) -> &mut Self {
        self.write(if self.negated { " NOT IN " } else { " IN " })
    }

    pub fn exists(&mut self) -> &mut Self {
        self.write(if self.negated { "NOT EXISTS" } else { "EXISTS" })
    }

    /// Always-true / always-false condition literal.
    pub fn condition_literal(&mut self, value: bool) -> &mut Self {
        let text = self.dialect.condition_literal(value);
        self.write(text)
    }

    // ------------------------------------------------------------------
    // finish
    // ------------------------------------------------------------------

    /// SQL text and parameters in placeholder order.
    #[must_use]
    pub fn into_parts(self) -> (String, ParameterMap) {
        let mut params = self.params;
        params.sort_by_key(|placed| placed.offset);

        let mut map = ParameterMap::new();
        for placed in params {
            map.insert(placed.name, placed.param);
        }

        (self.text, map)
    }
}

impl fmt::Debug for SqlBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlBuffer")
            .field("text", &self.text)
            .field("cursor", &self.cursor)
            .field("params", &self.params.len())
            .field("negated", &self.negated)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for SqlBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

const fn invert(op: BinaryOp) -> BinaryOp {
    match op {
        BinaryOp::Eq => BinaryOp::Ne,
        BinaryOp::Ne => BinaryOp::Eq,
        BinaryOp::Lt => BinaryOp::Ge,
        BinaryOp::Le => BinaryOp::Gt,
        BinaryOp::Gt => BinaryOp::Le,
        BinaryOp::Ge => BinaryOp::Lt,
        other => other,
    }
}
