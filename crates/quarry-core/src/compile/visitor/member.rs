use crate::{
    compile::{
        scope::{MemberKind, SourceBinding},
        visitor::ExprCompiler,
    },
    error::{CompileError, ErrorOrigin},
    expr::{Expr, member_of},
    sql::SqlBuffer,
    value::Value,
};

///
/// Resolved
/// What a member read off a bound source turns into.
///

enum Resolved {
    Column { alias: String, column: String },
    Fragment(SqlBuffer),
    Source(SourceBinding),
    Constant(Value),
}

///
/// SourceColumn
///
/// One output column of an expanded row source. `plain` is the physical
/// column name when the column is a bare column reference.
///

#[derive(Debug)]
pub(crate) struct SourceColumn {
    pub(crate) sql: SqlBuffer,
    pub(crate) name: String,
    pub(crate) plain: Option<String>,
}

impl ExprCompiler<'_, '_> {
    /// The row source a parameter or member chain stands for, if any.
    pub(crate) fn resolve_source(&self, expr: &Expr) -> Result<Option<SourceBinding>, CompileError> {
        match expr {
            Expr::Parameter(param) => Ok(match self.ctx.lookup_param(self.scope, &param.name) {
                Some(SourceBinding::Constant(_)) | None => None,
                source => source,
            }),
            Expr::Member { target, name, .. } => {
                let Some(source) = self.resolve_source(target)? else {
                    return Ok(None);
                };
                match resolve_member(&source, name)? {
                    Resolved::Source(source) => Ok(Some(source)),
                    _ => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }

    /// Physical column name when `expr` reads a bare column.
    pub(crate) fn plain_column(&self, expr: &Expr) -> Result<Option<String>, CompileError> {
        let Expr::Member { target, name, .. } = expr else {
            return Ok(None);
        };
        let Some(source) = self.resolve_source(target)? else {
            return Ok(None);
        };

        // resolution errors surface when the value itself is compiled
        Ok(match resolve_member(&source, name) {
            Ok(Resolved::Column { column, .. }) => Some(column),
            _ => None,
        })
    }

    /// Every readable column of a row source, in declaration order.
    pub(crate) fn expand_source(
        &self,
        source: &SourceBinding,
    ) -> Result<Vec<SourceColumn>, CompileError> {
        match source {
            SourceBinding::Table { shape, alias } => Ok(shape
                .read_columns()
                .map(|column| {
                    let mut sql = self.ctx.buffer();
                    sql.write_column(alias, &column.column);
                    SourceColumn {
                        sql,
                        name: column.field.clone(),
                        plain: Some(column.column.clone()),
                    }
                })
                .collect()),
            SourceBinding::Derived { alias, columns } => Ok(columns
                .iter()
                .map(|name| {
                    let mut sql = self.ctx.buffer();
                    sql.write_column(alias, name);
                    SourceColumn {
                        sql,
                        name: name.clone(),
                        plain: Some(name.clone()),
                    }
                })
                .collect()),
            SourceBinding::Projection(members) => {
                let mut columns = Vec::new();
                for member in members.iter() {
                    match &member.kind {
                        MemberKind::Column(sql) => columns.push(SourceColumn {
                            sql: sql.clone(),
                            name: member.name.clone(),
                            plain: None,
                        }),
                        MemberKind::Source(source) => columns.extend(self.expand_source(source)?),
                    }
                }
                Ok(columns)
            }
            SourceBinding::Scalar { name, sql } => Ok(vec![SourceColumn {
                sql: sql.clone(),
                name: name.clone(),
                plain: None,
            }]),
            SourceBinding::Constant(_) => Err(CompileError::visitor_syntax(
                "a constant cannot be expanded into columns",
            )),
        }
    }

    pub(super) fn member_value(
        &self,
        buf: &mut SqlBuffer,
        expr: &Expr,
        target: &Expr,
        name: &str,
    ) -> Result<(), CompileError> {
        let target_ty = target.ty();
        if name == "Value" && target_ty.is_nullable() && target_ty.scalar_kind().is_some() {
            return self.value(buf, target);
        }
        if name == "Length" && target_ty.is_text() {
            buf.write(self.ctx.dialect().length_function()).open_brace();
            self.value(buf, target)?;
            buf.close_brace();
            return Ok(());
        }

        let source = self.resolve_source(target)?.ok_or_else(|| {
            CompileError::visitor_syntax(format!("member '{name}' cannot be resolved to a column"))
        })?;

        match resolve_member(&source, name)? {
            Resolved::Column { alias, column } => {
                buf.write_column(&alias, &column);
            }
            Resolved::Fragment(sql) => {
                buf.append(sql);
            }
            Resolved::Constant(value) => {
                buf.parameter(value, expr.ty());
            }
            Resolved::Source(_) => {
                return Err(CompileError::visitor_syntax(format!(
                    "member '{name}' is a row, not a column"
                )));
            }
        }

        Ok(())
    }
}

fn resolve_member(source: &SourceBinding, name: &str) -> Result<Resolved, CompileError> {
    match source {
        SourceBinding::Table { shape, alias } => {
            let column = shape.readable(name)?;
            Ok(Resolved::Column {
                alias: alias.clone(),
                column: column.column.clone(),
            })
        }
        SourceBinding::Derived { alias, columns } => {
            if columns.iter().any(|column| column == name) {
                Ok(Resolved::Column {
                    alias: alias.clone(),
                    column: name.to_string(),
                })
            } else {
                Err(CompileError::unsupported(
                    ErrorOrigin::Visitor,
                    format!("column '{name}' is not produced by the set operation"),
                ))
            }
        }
        SourceBinding::Projection(members) => members
            .iter()
            .find(|member| member.name == name)
            .map(|member| match &member.kind {
                MemberKind::Column(sql) => Resolved::Fragment(sql.clone()),
                MemberKind::Source(source) => Resolved::Source(source.clone()),
            })
            .ok_or_else(|| {
                CompileError::unsupported(
                    ErrorOrigin::Visitor,
                    format!("member '{name}' is not part of the projection"),
                )
            }),
        SourceBinding::Scalar { name: scalar, .. } => Err(CompileError::visitor_syntax(format!(
            "member '{name}' cannot be read off the projected value '{scalar}'"
        ))),
        SourceBinding::Constant(value) => member_of(value, name).map(Resolved::Constant),
    }
}
