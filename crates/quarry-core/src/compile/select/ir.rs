use crate::{compile::visitor::SourceColumn, sql::SqlBuffer};

///
/// Source
/// The FROM target of a SELECT.
///

#[derive(Debug)]
pub(crate) enum Source {
    Table { table: String, alias: String },
    /// A parenthesised set operation.
    Derived { sql: SqlBuffer, alias: String },
}

impl Source {
    pub(crate) fn write(self, out: &mut SqlBuffer) {
        match self {
            Self::Table { table, alias } => {
                out.write_identifier(&table);
                if !alias.is_empty() {
                    out.white_space().write_identifier(&alias);
                }
            }
            Self::Derived { sql, alias } => {
                out.open_brace()
                    .append(sql)
                    .close_brace()
                    .white_space()
                    .write_identifier(&alias);
            }
        }
    }
}

///
/// OrderKey
///

#[derive(Debug)]
pub(crate) struct OrderKey {
    pub(crate) sql: SqlBuffer,
    pub(crate) descending: bool,
}

///
/// Column
/// One select-list entry; `aliased` writes `AS [name]`.
///

#[derive(Debug)]
pub(crate) struct Column {
    pub(crate) sql: SqlBuffer,
    pub(crate) name: String,
    pub(crate) aliased: bool,
}

impl From<SourceColumn> for Column {
    fn from(column: SourceColumn) -> Self {
        let aliased = column.plain.as_deref() != Some(column.name.as_str());

        Self {
            sql: column.sql,
            name: column.name,
            aliased,
        }
    }
}

/// Write a select list, returning the output names in order.
pub(crate) fn write_columns(out: &mut SqlBuffer, columns: Vec<Column>) -> Vec<String> {
    let mut names = Vec::with_capacity(columns.len());
    for (i, column) in columns.into_iter().enumerate() {
        if i > 0 {
            out.delimiter();
        }
        out.append(column.sql);
        if column.aliased {
            out.write(" AS ").write_identifier(&column.name);
        }
        names.push(column.name);
    }

    names
}
