//! Client-side evaluation of constant subtrees.
//!
//! A subtree is evaluable when it reads no lambda parameter and no table.
//! Evaluation failures surface as a single syntax error kind.

use crate::{
    error::CompileError,
    expr::{BinaryOp, Expr, Method, MethodCall, UnaryOp},
    value::{ScalarKind, TypeRef, Value},
};
use std::cmp::Ordering;

/// True when `expr` can be folded to a `Value` at compile time.
#[must_use]
pub(crate) fn is_evaluable(expr: &Expr) -> bool {
    match expr {
        Expr::Constant { .. } => true,
        Expr::Member { target, .. } => is_evaluable(target),
        Expr::Binary { left, right, .. } | Expr::Coalesce { left, right, .. } => {
            is_evaluable(left) && is_evaluable(right)
        }
        Expr::Unary { operand, .. } => is_evaluable(operand),
        Expr::Conditional {
            test,
            if_true,
            if_false,
            ..
        } => is_evaluable(test) && is_evaluable(if_true) && is_evaluable(if_false),
        Expr::New { fields, .. } => fields.iter().all(|(_, e)| is_evaluable(e)),
        Expr::MemberInit { bindings, .. } => bindings.iter().all(|(_, e)| is_evaluable(e)),
        Expr::Switch {
            value,
            cases,
            default,
            ..
        } => {
            is_evaluable(value)
                && cases
                    .iter()
                    .all(|case| case.tests.iter().all(is_evaluable) && is_evaluable(&case.body))
                && default.as_deref().is_none_or(is_evaluable)
        }
        Expr::Call(call) => is_client_method(call) && call.operands().all(is_evaluable),
        Expr::Table { .. } | Expr::Lambda(_) | Expr::Parameter(_) | Expr::Unsupported(_) => false,
    }
}

fn is_client_method(call: &MethodCall) -> bool {
    match call.method {
        Method::Custom(custom) => custom.eval.is_some(),
        Method::Contains | Method::Count | Method::LongCount | Method::Any => {
            call.args.iter().all(|arg| !matches!(arg, Expr::Lambda(_)))
        }
        method => method.is_text(),
    }
}

/// Evaluate a constant subtree.
pub(crate) fn evaluate(expr: &Expr) -> Result<Value, CompileError> {
    match expr {
        Expr::Constant { value, .. } => Ok(value.clone()),
        Expr::Member { target, name, .. } => member_of(&evaluate(target)?, name),
        Expr::Binary {
            op, left, right, ..
        } => binary(*op, left, right),
        Expr::Unary {
            op, operand, ty, ..
        } => unary(*op, evaluate(operand)?, ty),
        Expr::Conditional {
            test,
            if_true,
            if_false,
            ..
        } => match evaluate(test)? {
            Value::Bool(true) => evaluate(if_true),
            Value::Bool(false) => evaluate(if_false),
            other => Err(CompileError::evaluation(format!(
                "conditional test is not a bool: {other}"
            ))),
        },
        Expr::Coalesce { left, right, .. } => match evaluate(left)? {
            Value::Null => evaluate(right),
            value => Ok(value),
        },
        Expr::New { fields, .. } | Expr::MemberInit {
            bindings: fields, ..
        } => fields
            .iter()
            .map(|(name, e)| Ok((name.clone(), evaluate(e)?)))
            .collect::<Result<Vec<_>, CompileError>>()
            .map(Value::Record),
        Expr::Switch {
            value,
            cases,
            default,
            ..
        } => {
            let value = evaluate(value)?;
            for case in cases {
                for test in &case.tests {
                    if evaluate(test)? == value {
                        return evaluate(&case.body);
                    }
                }
            }
            default
                .as_deref()
                .map_or(Ok(Value::Null), evaluate)
        }
        Expr::Call(call) => method(call),
        Expr::Table { .. } | Expr::Lambda(_) | Expr::Parameter(_) | Expr::Unsupported(_) => Err(
            CompileError::evaluation("expression depends on query data"),
        ),
    }
}

/// Read a named member off a constant value.
pub(crate) fn member_of(target: &Value, name: &str) -> Result<Value, CompileError> {
    match (target, name) {
        (Value::Record(_), _) => target
            .field(name)
            .cloned()
            .ok_or_else(|| CompileError::evaluation(format!("member '{name}' not found"))),
        (Value::Null, "HasValue") => Ok(Value::Bool(false)),
        (_, "HasValue") => Ok(Value::Bool(true)),
        (Value::Null, "Value") => Err(CompileError::evaluation(
            "nullable object must have a value",
        )),
        (_, "Value") => Ok(target.clone()),
        (Value::Text(s), "Length") => Ok(Value::Int(char_len(s))),
        (Value::List(items), "Count") => Ok(Value::Int(len_i64(items.len()))),
        _ => Err(CompileError::evaluation(format!(
            "member '{name}' is not available on {target}"
        ))),
    }
}

fn binary(op: BinaryOp, left: &Expr, right: &Expr) -> Result<Value, CompileError> {
    // short-circuit before touching the right side
    if op.is_logical() {
        let lhs = evaluate(left)?
            .as_bool()
            .ok_or_else(|| CompileError::evaluation("logical operand is not a bool"))?;
        return match (op, lhs) {
            (BinaryOp::And, false) => Ok(Value::Bool(false)),
            (BinaryOp::Or, true) => Ok(Value::Bool(true)),
            _ => evaluate(right)?
                .as_bool()
                .map(Value::Bool)
                .ok_or_else(|| CompileError::evaluation("logical operand is not a bool")),
        };
    }

    let lhs = evaluate(left)?;
    let rhs = evaluate(right)?;

    if op.is_comparison() {
        return compare(op, &lhs, &rhs).map(Value::Bool);
    }

    arithmetic(op, lhs, rhs)
}

fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<bool, CompileError> {
    let ordering = lhs.compare(rhs);
    let equal = ordering.map_or_else(|| lhs == rhs, Ordering::is_eq);

    match op {
        BinaryOp::Eq => Ok(equal),
        BinaryOp::Ne => Ok(!equal),
        _ => {
            let ordering = ordering.ok_or_else(|| {
                CompileError::evaluation(format!("cannot order {lhs} and {rhs}"))
            })?;
            Ok(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            })
        }
    }
}

#[expect(clippy::cast_precision_loss)]
fn arithmetic(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, CompileError> {
    match (lhs, rhs) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Text(a), Value::Text(b)) if op == BinaryOp::Add => Ok(Value::Text(a + &b)),
        (Value::Text(a), other) if op == BinaryOp::Add => {
            Ok(Value::Text(format!("{a}{}", plain(&other))))
        }
        (other, Value::Text(b)) if op == BinaryOp::Add => {
            Ok(Value::Text(format!("{}{b}", plain(&other))))
        }
        (Value::Int(a), Value::Int(b)) => int_op(op, a, b).map(Value::Int),
        (Value::Int(a), Value::Float(b)) => Ok(Value::Float(float_op(op, a as f64, b))),
        (Value::Float(a), Value::Int(b)) => Ok(Value::Float(float_op(op, a, b as f64))),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(float_op(op, a, b))),
        (a, b) => Err(CompileError::evaluation(format!(
            "unsupported operands for {op:?}: {a} and {b}"
        ))),
    }
}

fn int_op(op: BinaryOp, a: i64, b: i64) -> Result<i64, CompileError> {
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => a.checked_div(b),
        BinaryOp::Rem => a.checked_rem(b),
        _ => None,
    };

    result.ok_or_else(|| {
        CompileError::evaluation(format!("integer overflow or division by zero in {op:?}"))
    })
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        _ => a % b,
    }
}

#[expect(clippy::cast_precision_loss)]
fn unary(op: UnaryOp, value: Value, ty: &TypeRef) -> Result<Value, CompileError> {
    match (op, value) {
        (_, Value::Null) => Ok(Value::Null),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Negate, Value::Int(i)) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| CompileError::evaluation("integer overflow in negation")),
        (UnaryOp::Negate, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Convert, Value::Int(i)) if ty.scalar_kind() == Some(ScalarKind::Float) => {
            Ok(Value::Float(i as f64))
        }
        (UnaryOp::Convert, value) => Ok(value),
        (op, value) => Err(CompileError::evaluation(format!(
            "unsupported operand for {op:?}: {value}"
        ))),
    }
}

fn method(call: &MethodCall) -> Result<Value, CompileError> {
    let operands = call
        .operands()
        .map(evaluate)
        .collect::<Result<Vec<_>, _>>()?;

    match call.method {
        Method::Custom(custom) => {
            let eval = custom.eval.ok_or_else(|| {
                CompileError::evaluation(format!("'{}' has no client evaluator", custom.name))
            })?;
            eval(&operands).map_err(CompileError::evaluation)
        }
        Method::Count | Method::LongCount => list(&operands, 0)
            .map(|items| Value::Int(len_i64(items.len()))),
        Method::Any => list(&operands, 0).map(|items| Value::Bool(!items.is_empty())),
        Method::Contains => match operands.first() {
            Some(Value::Text(s)) => {
                let needle = text(&operands, 1)?;
                Ok(Value::Bool(s.contains(needle)))
            }
            _ => {
                let items = list(&operands, 0)?;
                let needle = operands.get(1).unwrap_or(&Value::Null);
                Ok(Value::Bool(items.contains(needle)))
            }
        },
        method if method.is_text() => text_method(method, &operands),
        method => Err(CompileError::evaluation(format!(
            "'{method}' cannot be evaluated client-side"
        ))),
    }
}

fn text_method(method: Method, operands: &[Value]) -> Result<Value, CompileError> {
    if matches!(method, Method::IsNullOrEmpty) {
        return Ok(Value::Bool(match operands.first() {
            Some(Value::Text(s)) => s.is_empty(),
            _ => true,
        }));
    }

    // null receivers throw client-side; mirror that as an evaluation error
    let s = text(operands, 0)?;
    let value = match method {
        Method::StartsWith => Value::Bool(s.starts_with(text(operands, 1)?)),
        Method::EndsWith => Value::Bool(s.ends_with(text(operands, 1)?)),
        Method::Trim => Value::Text(s.trim().to_string()),
        Method::TrimStart => Value::Text(s.trim_start().to_string()),
        Method::TrimEnd => Value::Text(s.trim_end().to_string()),
        Method::ToUpper => Value::Text(s.to_uppercase()),
        Method::ToLower => Value::Text(s.to_lowercase()),
        Method::Substring => {
            let start = index(operands, 1)?;
            let chars: Vec<char> = s.chars().collect();
            let end = match operands.get(2) {
                Some(_) => start.saturating_add(index(operands, 2)?),
                None => chars.len(),
            };
            if start > chars.len() || end > chars.len() {
                return Err(CompileError::evaluation("substring range out of bounds"));
            }
            Value::Text(chars[start..end].iter().collect())
        }
        Method::IndexOf => {
            let needle = text(operands, 1)?;
            let start = match operands.get(2) {
                Some(_) => index(operands, 2)?,
                None => 0,
            };
            let haystack: String = s.chars().skip(start).collect();
            let found = haystack
                .find(needle)
                .map_or(-1, |byte| char_len(&haystack[..byte]) + len_i64(start));
            Value::Int(found)
        }
        _ => {
            return Err(CompileError::evaluation(format!(
                "'{method}' cannot be evaluated client-side"
            )));
        }
    };

    Ok(value)
}

fn text(operands: &[Value], at: usize) -> Result<&str, CompileError> {
    operands
        .get(at)
        .and_then(Value::as_text)
        .ok_or_else(|| CompileError::evaluation("expected a non-null text operand"))
}

fn list(operands: &[Value], at: usize) -> Result<&[Value], CompileError> {
    operands
        .get(at)
        .and_then(Value::as_list)
        .ok_or_else(|| CompileError::evaluation("expected an in-memory sequence"))
}

fn index(operands: &[Value], at: usize) -> Result<usize, CompileError> {
    operands
        .get(at)
        .and_then(Value::as_int)
        .and_then(|i| usize::try_from(i).ok())
        .ok_or_else(|| CompileError::evaluation("expected a non-negative integer operand"))
}

fn plain(value: &Value) -> String {
    match value {
        Value::Text(s) => s.clone(),
        other => other.to_string(),
    }
}

fn char_len(s: &str) -> i64 {
    len_i64(s.chars().count())
}

fn len_i64(len: usize) -> i64 {
    i64::try_from(len).unwrap_or(i64::MAX)
}
