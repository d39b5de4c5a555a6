use super::*;
use crate::{
    dialect::{Dialect, Oracle, SqlServer},
    error::ErrorClass,
    value::{TypeRef, Value},
};
use std::sync::Arc;

fn sqlserver_buffer() -> SqlBuffer {
    SqlBuffer::standalone(Arc::new(SqlServer::new()), "p")
}

fn oracle_buffer() -> SqlBuffer {
    let dialect: Arc<dyn Dialect> = Arc::new(Oracle::new());
    SqlBuffer::standalone(dialect, "p")
}

fn compiled(sql: &str, required: bool) -> CompiledSql {
    CompiledSql {
        sql: sql.to_string(),
        parameters: ParameterMap::new(),
        kind: StatementKind::Select,
        required,
        default_value: None,
        timeout: None,
    }
}

// ----------------------------------------------------------------------------
// buffer
// ----------------------------------------------------------------------------

#[test]
fn placeholders_follow_the_dialect() {
    let mut buf = sqlserver_buffer();
    buf.write_column("u", "Age")
        .equal()
        .parameter(Value::Int(3), TypeRef::int());
    assert_eq!(buf.as_str(), "[u].[Age] = @p1");

    let mut buf = oracle_buffer();
    buf.write_column("", "Age")
        .equal()
        .parameter(Value::Int(3), TypeRef::int());
    assert_eq!(buf.as_str(), "\"Age\" = :p1");
}

#[test]
fn negation_inverts_helpers() {
    let mut buf = sqlserver_buffer();
    buf.toggle_not();
    buf.write("a")
        .comparison(crate::expr::BinaryOp::Lt)
        .write("b")
        .and()
        .write("c")
        .is_null()
        .white_space()
        .exists();

    assert_eq!(buf.as_str(), "a >= b OR c IS NOT NULL NOT EXISTS");
    assert!(buf.is_negated());
    assert!(buf.set_negated(false));
    assert!(!buf.is_negated());
}

#[test]
fn wrap_inserts_around_existing_text() {
    let mut buf = sqlserver_buffer();
    buf.write("SELECT ");
    let start = buf.len();
    buf.write("x = ").parameter(Value::Int(1), TypeRef::int());
    buf.wrap(start, "(", ")");

    assert_eq!(buf.as_str(), "SELECT (x = @p1)");

    let (sql, params) = buf.into_parts();
    assert_eq!(sql, "SELECT (x = @p1)");
    assert_eq!(params.value("p1"), Some(&Value::Int(1)));
}

#[test]
fn cursor_writes_shift_later_parameters() {
    let mut buf = sqlserver_buffer();
    buf.write("WHERE ").parameter(Value::Int(1), TypeRef::int());
    buf.set_cursor(0);
    buf.parameter(Value::Int(0), TypeRef::int()).write(" ");
    buf.clear_cursor();

    assert_eq!(buf.as_str(), "@p2 WHERE @p1");
    assert_eq!(buf.cursor(), None);

    let (_, params) = buf.into_parts();
    assert_eq!(params.names().collect::<Vec<_>>(), ["p2", "p1"]);
}

#[test]
fn remove_drops_parameters_inside_the_range() {
    let mut buf = sqlserver_buffer();
    buf.write("a = ").parameter(Value::Int(1), TypeRef::int());
    let start = buf.len();
    buf.write(" AND b = ").parameter(Value::Int(2), TypeRef::int());
    buf.write(" AND c = ").parameter(Value::Int(3), TypeRef::int());

    let removed = " AND b = @p2".len();
    buf.remove(start, removed);

    assert_eq!(buf.as_str(), "a = @p1 AND c = @p3");
    assert_eq!(buf.parameter_count(), 2);

    let (_, params) = buf.into_parts();
    assert_eq!(params.names().collect::<Vec<_>>(), ["p1", "p3"]);
}

#[test]
fn truncate_rolls_back_speculative_output() {
    let mut buf = sqlserver_buffer();
    buf.write("x");
    let mark = buf.len();
    buf.write(" AND y = ").parameter(Value::Int(9), TypeRef::int());
    buf.truncate(mark);

    assert_eq!(buf.as_str(), "x");
    assert_eq!(buf.parameter_count(), 0);

    // rolled-back names stay claimed
    buf.write(" = ").parameter(Value::Int(1), TypeRef::int());
    assert_eq!(buf.as_str(), "x = @p2");
}

#[test]
fn forks_share_names_and_append_with_offsets() {
    let mut buf = sqlserver_buffer();
    let mut operand = buf.fork();
    operand.parameter(Value::Text("a".to_string()), TypeRef::text());

    buf.write("f(").append_ref(&operand).delimiter().append(operand).close_brace();

    assert_eq!(buf.as_str(), "f(@p1, @p1)");
    let (_, params) = buf.into_parts();
    assert_eq!(params.len(), 1);
}

#[test]
fn explicit_names_are_deduplicated() {
    let mut buf = sqlserver_buffer();
    buf.parameter_named("minAge", Value::Int(1), TypeRef::int())
        .delimiter()
        .parameter_named("minAge", Value::Int(2), TypeRef::int())
        .delimiter()
        .parameter(Value::Int(3), TypeRef::int());

    assert_eq!(buf.as_str(), "@minAge, @minAge_1, @p1");
}

#[test]
fn registry_skips_claimed_generated_names() {
    let mut names = NameRegistry::new("p");

    assert_eq!(names.claim("p1"), "p1");
    assert_eq!(names.generate(), "p2");
    assert_eq!(names.claim("p2"), "p2_1");
    assert_eq!(names.claim("p2"), "p2_2");
}

// ----------------------------------------------------------------------------
// compiled statement
// ----------------------------------------------------------------------------

#[test]
fn fingerprint_is_stable_hex() {
    let a = compiled("SELECT 1", false);
    let b = compiled("SELECT 1", true);
    let c = compiled("SELECT 2", false);

    assert_eq!(a.fingerprint().len(), 64);
    assert!(a.fingerprint().chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(a.fingerprint(), b.fingerprint());
    assert_ne!(a.fingerprint(), c.fingerprint());
}

#[test]
fn required_statements_reject_empty_results() {
    assert!(compiled("SELECT 1", false).check_required(0).is_ok());
    assert!(compiled("SELECT 1", true).check_required(1).is_ok());

    let err = compiled("SELECT 1", true).check_required(0).unwrap_err();
    assert_eq!(err.class, ErrorClass::NotFound);
    assert!(err.is_not_found());
}

#[test]
fn statement_kinds() {
    assert!(StatementKind::Delete.is_command());
    assert!(!StatementKind::Scalar.is_command());
    assert_eq!(StatementKind::Insert.to_string(), "insert");
}
