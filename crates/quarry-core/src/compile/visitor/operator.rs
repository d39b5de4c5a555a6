use crate::{
    compile::visitor::{ExprCompiler, Truth},
    dialect::ConcatStyle,
    error::CompileError,
    expr::{BinaryOp, Expr, SwitchCase, evaluate},
    sql::SqlBuffer,
    value::{TypeRef, Value},
};

impl ExprCompiler<'_, '_> {
    pub(super) fn compare(
        &self,
        buf: &mut SqlBuffer,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
    ) -> Result<Truth, CompileError> {
        match (self.fold(left)?, self.fold(right)?) {
            (Some(lhs), Some(rhs)) => {
                let folded = evaluate(&Expr::Binary {
                    op,
                    left: Box::new(Expr::constant(lhs)),
                    right: Box::new(Expr::constant(rhs)),
                    ty: TypeRef::bool(),
                })?;
                match folded {
                    Value::Bool(value) => Ok(Truth::Always(value != buf.is_negated())),
                    other => Err(CompileError::visitor_syntax(format!(
                        "comparison folded to a non-boolean value: {other}"
                    ))),
                }
            }
            (Some(Value::Null), None) => self.null_compare(buf, op, (left, right), right, left),
            (None, Some(Value::Null)) => self.null_compare(buf, op, (left, right), left, right),
            _ => self.plain_compare(buf, op, left, right),
        }
    }

    /// Comparison against null: `IS [NOT] NULL` for equality, dropped
    /// entirely for a null captured variable when configured.
    fn null_compare(
        &self,
        buf: &mut SqlBuffer,
        op: BinaryOp,
        (left, right): (&Expr, &Expr),
        operand: &Expr,
        null: &Expr,
    ) -> Result<Truth, CompileError> {
        if null.is_captured() && self.ctx.config.drop_null_variable_comparisons {
            return Ok(Truth::Omitted);
        }

        match op {
            BinaryOp::Eq => {
                self.value(buf, operand)?;
                buf.is_null();
                Ok(Truth::Sql)
            }
            BinaryOp::Ne => {
                self.value(buf, operand)?;
                buf.is_not_null();
                Ok(Truth::Sql)
            }
            _ => self.plain_compare(buf, op, left, right),
        }
    }

    fn plain_compare(
        &self,
        buf: &mut SqlBuffer,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
    ) -> Result<Truth, CompileError> {
        self.value(buf, left)?;
        buf.comparison(op);
        self.value(buf, right)?;

        Ok(Truth::Sql)
    }

    pub(super) fn arithmetic(
        &self,
        buf: &mut SqlBuffer,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        ty: &TypeRef,
    ) -> Result<(), CompileError> {
        if op == BinaryOp::Add && ty.is_text() {
            let mut lhs = buf.fork();
            self.value(&mut lhs, left)?;
            let mut rhs = buf.fork();
            self.value(&mut rhs, right)?;
            concat(buf, lhs, rhs);
            return Ok(());
        }

        let symbol = match op {
            BinaryOp::Add => " + ",
            BinaryOp::Sub => " - ",
            BinaryOp::Mul => " * ",
            BinaryOp::Div => " / ",
            BinaryOp::Rem => " % ",
            other => {
                return Err(CompileError::visitor_syntax(format!(
                    "{other:?} is not an arithmetic operator"
                )));
            }
        };

        buf.open_brace();
        self.value(buf, left)?;
        buf.write(symbol);
        self.value(buf, right)?;
        buf.close_brace();

        Ok(())
    }

    pub(super) fn conditional(
        &self,
        buf: &mut SqlBuffer,
        test: &Expr,
        if_true: &Expr,
        if_false: &Expr,
    ) -> Result<(), CompileError> {
        let mut cond = buf.fork();
        match self.condition(&mut cond, test)? {
            Truth::Always(true) | Truth::Omitted => self.value(buf, if_true),
            Truth::Always(false) => self.value(buf, if_false),
            Truth::Sql => {
                buf.write("CASE WHEN ").append(cond).write(" THEN ");
                self.value(buf, if_true)?;
                buf.write(" ELSE ");
                self.value(buf, if_false)?;
                buf.write(" END");
                Ok(())
            }
        }
    }

    /// `left ?? right`; `left` is compiled once and referenced twice.
    pub(super) fn coalesce(
        &self,
        buf: &mut SqlBuffer,
        left: &Expr,
        right: &Expr,
    ) -> Result<(), CompileError> {
        let mut lhs = buf.fork();
        self.value(&mut lhs, left)?;

        buf.write("CASE WHEN ").append_ref(&lhs).is_null().write(" THEN ");
        self.value(buf, right)?;
        buf.write(" ELSE ").append(lhs).write(" END");

        Ok(())
    }

    pub(super) fn switch(
        &self,
        buf: &mut SqlBuffer,
        value: &Expr,
        cases: &[SwitchCase],
        default: Option<&Expr>,
    ) -> Result<(), CompileError> {
        if cases.is_empty() {
            match default {
                Some(default) => return self.value(buf, default),
                None => {
                    buf.write("NULL");
                    return Ok(());
                }
            }
        }

        buf.write("CASE ");
        self.value(buf, value)?;
        for case in cases {
            let mut body = buf.fork();
            self.value(&mut body, &case.body)?;
            for test in &case.tests {
                buf.write(" WHEN ");
                self.value(buf, test)?;
                buf.write(" THEN ").append_ref(&body);
            }
        }
        if let Some(default) = default {
            buf.write(" ELSE ");
            self.value(buf, default)?;
        }
        buf.write(" END");

        Ok(())
    }
}

/// Text concatenation in the dialect's style.
pub(super) fn concat(buf: &mut SqlBuffer, left: SqlBuffer, right: SqlBuffer) {
    match buf.dialect().concat_style() {
        ConcatStyle::Function => {
            buf.write("CONCAT(")
                .append(left)
                .delimiter()
                .append(right)
                .close_brace();
        }
        ConcatStyle::Operator(op) => {
            buf.open_brace()
                .append(left)
                .write(&format!(" {op} "))
                .append(right)
                .close_brace();
        }
    }
}
