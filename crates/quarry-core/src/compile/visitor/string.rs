use crate::{
    compile::visitor::{ExprCompiler, Truth, operator::concat},
    error::{CompileError, ErrorOrigin},
    expr::{Expr, Method, MethodCall},
    sql::SqlBuffer,
    value::{TypeRef, Value},
};

impl ExprCompiler<'_, '_> {
    /// `StartsWith` / `EndsWith` / text `Contains` as `LIKE`.
    ///
    /// Constant patterns are decorated client-side into a single parameter;
    /// column patterns are concatenated with `'%'` in SQL. Wildcards inside
    /// the pattern are not escaped.
    pub(super) fn like(&self, buf: &mut SqlBuffer, call: &MethodCall) -> Result<Truth, CompileError> {
        let (target, pattern) = text_operands(call)?;
        let (prefix, suffix) = match call.method {
            Method::StartsWith => ("", "%"),
            Method::EndsWith => ("%", ""),
            _ => ("%", "%"),
        };

        let folded = self.fold(pattern)?;
        if matches!(folded, Some(Value::Null)) {
            return Err(CompileError::domain(
                ErrorOrigin::Visitor,
                format!("'{}' pattern must not be null", call.method),
            ));
        }

        self.value(buf, target)?;
        buf.like();

        if let Some(value) = folded {
            let text = match value {
                Value::Text(text) => text,
                other => other.to_string(),
            };
            let decorated = Value::Text(format!("{prefix}{text}{suffix}"));
            match pattern {
                Expr::Member { name, .. } if pattern.is_captured() => {
                    buf.parameter_named(name, decorated, TypeRef::text());
                }
                _ => {
                    buf.parameter(decorated, TypeRef::text());
                }
            }
            return Ok(Truth::Sql);
        }

        let mut decorated = buf.fork();
        self.value(&mut decorated, pattern)?;
        if !prefix.is_empty() {
            decorated = wildcard_concat(buf, true, decorated);
        }
        if !suffix.is_empty() {
            decorated = wildcard_concat(buf, false, decorated);
        }
        buf.append(decorated);

        Ok(Truth::Sql)
    }

    /// `(x IS NULL OR x = '')`.
    pub(super) fn is_null_or_empty(
        &self,
        buf: &mut SqlBuffer,
        call: &MethodCall,
    ) -> Result<Truth, CompileError> {
        let operand = call
            .args
            .first()
            .or(call.target.as_ref())
            .ok_or_else(|| CompileError::visitor_syntax("'IsNullOrEmpty' requires an operand"))?;

        let mut text = buf.fork();
        self.value(&mut text, operand)?;

        buf.open_brace()
            .append_ref(&text)
            .is_null()
            .or()
            .append(text)
            .equal()
            .write("''")
            .close_brace();

        Ok(Truth::Sql)
    }

    /// Value-context text methods.
    pub(super) fn text_value(&self, buf: &mut SqlBuffer, call: &MethodCall) -> Result<(), CompileError> {
        let target = call.target.as_ref().ok_or_else(|| {
            CompileError::visitor_syntax(format!("'{}' requires a text receiver", call.method))
        })?;
        let dialect = self.ctx.dialect();

        match call.method {
            Method::Substring => self.substring(buf, target, call),
            Method::Trim | Method::TrimStart | Method::TrimEnd => {
                let (open, close) = match call.method {
                    Method::Trim => ("LTRIM(RTRIM(", "))"),
                    Method::TrimStart => ("LTRIM(", ")"),
                    _ => ("RTRIM(", ")"),
                };
                buf.write(open);
                self.value(buf, target)?;
                buf.write(close);
                Ok(())
            }
            Method::ToUpper | Method::ToLower => {
                let function = if matches!(call.method, Method::ToUpper) {
                    dialect.upper_function()
                } else {
                    dialect.lower_function()
                };
                buf.write(function).open_brace();
                self.value(buf, target)?;
                buf.close_brace();
                Ok(())
            }
            Method::IndexOf => self.index_of(buf, target, call),
            method => Err(CompileError::visitor_syntax(format!(
                "'{method}' is not a text method"
            ))),
        }
    }

    /// Zero-based `Substring(start[, length])`; past-the-end starts yield `''`.
    fn substring(
        &self,
        buf: &mut SqlBuffer,
        target: &Expr,
        call: &MethodCall,
    ) -> Result<(), CompileError> {
        let start = call
            .args
            .first()
            .ok_or_else(|| CompileError::visitor_syntax("'Substring' requires a start index"))?;
        let dialect = self.ctx.dialect();
        let length_fn = dialect.length_function();

        let mut text = buf.fork();
        self.value(&mut text, target)?;
        let mut from = buf.fork();
        self.value(&mut from, start)?;

        buf.write("CASE WHEN ")
            .write(length_fn)
            .open_brace()
            .append_ref(&text)
            .close_brace()
            .write(" <= ")
            .append_ref(&from)
            .write(" THEN '' ELSE ")
            .write(dialect.substring_function())
            .open_brace()
            .append_ref(&text)
            .delimiter()
            .open_brace()
            .append(from)
            .write(" + 1")
            .close_brace();

        match call.args.get(1) {
            Some(length) => {
                buf.delimiter();
                self.value(buf, length)?;
            }
            None if dialect.substring_requires_length() => {
                buf.delimiter()
                    .write(length_fn)
                    .open_brace()
                    .append(text)
                    .close_brace();
            }
            None => {}
        }
        buf.close_brace().write(" END");

        Ok(())
    }

    /// Zero-based `IndexOf(needle[, start[, count]])`; `-1` when the
    /// receiver is null or the needle is absent.
    fn index_of(
        &self,
        buf: &mut SqlBuffer,
        target: &Expr,
        call: &MethodCall,
    ) -> Result<(), CompileError> {
        let needle = call
            .args
            .first()
            .ok_or_else(|| CompileError::visitor_syntax("'IndexOf' requires a search value"))?;
        let dialect = self.ctx.dialect();

        let mut text = buf.fork();
        self.value(&mut text, target)?;

        let start = match call.args.get(1) {
            Some(start) => {
                let mut out = buf.fork();
                self.value(&mut out, start)?;
                Some(out)
            }
            None => None,
        };

        let mut haystack = buf.fork();
        match (&start, call.args.get(2)) {
            (Some(start), Some(count)) => {
                haystack
                    .write(dialect.substring_function())
                    .open_brace()
                    .append_ref(&text)
                    .write(", 1, ")
                    .open_brace()
                    .append_ref(start)
                    .write(" + ");
                self.value(&mut haystack, count)?;
                haystack.close_brace().close_brace();
            }
            _ => {
                haystack.append_ref(&text);
            }
        }

        let mut search = buf.fork();
        self.value(&mut search, needle)?;

        let mut operands = if dialect.index_of_operands_swapped() {
            vec![search, haystack]
        } else {
            vec![haystack, search]
        };
        if let Some(start) = start {
            let mut position = buf.fork();
            position.open_brace().append(start).write(" + 1").close_brace();
            if dialect.index_of_start_first() {
                operands.insert(0, position);
            } else {
                operands.push(position);
            }
        }

        buf.write("CASE WHEN ")
            .append(text)
            .is_null()
            .write(" THEN -1 ELSE ")
            .write(dialect.index_of_function())
            .open_brace();
        for (i, operand) in operands.into_iter().enumerate() {
            if i > 0 {
                buf.delimiter();
            }
            buf.append(operand);
        }
        buf.close_brace().write(" - 1 END");

        Ok(())
    }
}

fn text_operands(call: &MethodCall) -> Result<(&Expr, &Expr), CompileError> {
    match (call.target.as_ref(), call.args.first()) {
        (Some(target), Some(pattern)) => Ok((target, pattern)),
        _ => Err(CompileError::visitor_syntax(format!(
            "'{}' requires a receiver and a pattern",
            call.method
        ))),
    }
}

/// `'%'` concatenated before (`leading`) or after `pattern`.
fn wildcard_concat(buf: &SqlBuffer, leading: bool, pattern: SqlBuffer) -> SqlBuffer {
    let mut wildcard = buf.fork();
    wildcard.write("'%'");
    let mut out = buf.fork();
    if leading {
        concat(&mut out, wildcard, pattern);
    } else {
        concat(&mut out, pattern, wildcard);
    }

    out
}
