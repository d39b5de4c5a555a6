use super::*;
use crate::value::{TypeRef, Value};
use std::sync::Arc;

fn parts(dialect: &Arc<dyn Dialect>, distinct: bool, ordered: bool) -> (SqlBuffer, SelectParts) {
    let out = SqlBuffer::standalone(Arc::clone(dialect), "p");
    let mut columns = out.fork();
    columns.write_identifier("uid").write(" AS ").write_identifier("Id");
    let mut body = out.fork();
    body.write("FROM ").write_identifier("users");
    let order_by = ordered.then(|| {
        let mut keys = out.fork();
        keys.write_identifier("uid");
        keys
    });

    let parts = SelectParts {
        distinct,
        columns,
        body,
        order_by,
        column_names: vec!["Id".to_string()],
        row_number_alias: "__Row_number_".to_string(),
        window_alias: "__page_1".to_string(),
        nested: false,
    };

    (out, parts)
}

fn render(
    dialect: impl Dialect + 'static,
    distinct: bool,
    ordered: bool,
    paging: Paging,
) -> String {
    let dialect: Arc<dyn Dialect> = Arc::new(dialect);
    let (mut out, parts) = parts(&dialect, distinct, ordered);
    dialect
        .page(&mut out, parts, paging)
        .expect("paging should render");

    out.as_str().to_string()
}

const fn paging(take: Option<u64>, skip: u64) -> Paging {
    Paging { take, skip }
}

#[test]
fn sqlserver_take_renders_top() {
    let sql = render(SqlServer::new(), false, true, paging(Some(10), 0));
    assert_eq!(sql, "SELECT TOP 10 [uid] AS [Id] FROM [users] ORDER BY [uid]");
}

#[test]
fn sqlserver_skip_renders_row_number_window() {
    let sql = render(SqlServer::new(), false, true, paging(Some(10), 20));
    assert_eq!(
        sql,
        "SELECT [Id] FROM (SELECT [uid] AS [Id], ROW_NUMBER() OVER(ORDER BY [uid]) AS \
         [__Row_number_] FROM [users]) [__page_1] WHERE [__Row_number_] > 20 \
         AND [__Row_number_] <= 30 ORDER BY [__Row_number_]"
    );
}

#[test]
fn sqlserver_nested_window_has_no_trailing_order() {
    let dialect: Arc<dyn Dialect> = Arc::new(SqlServer::new());
    let (mut out, mut parts) = parts(&dialect, false, true);
    parts.nested = true;
    dialect
        .page(&mut out, parts, paging(None, 1))
        .expect("paging should render");

    assert!(out.as_str().starts_with("SELECT [Id] FROM (SELECT [uid] AS [Id], ROW_NUMBER()"));
    assert!(out.as_str().ends_with("[__page_1] WHERE [__Row_number_] > 1"));
}

#[test]
fn per_row_guid_functions() {
    assert_eq!(SqlServer::new().guid_function(), Some("NEWID()"));
    assert_eq!(MySql::new().guid_function(), Some("UUID()"));
    assert_eq!(Oracle::new().guid_function(), Some("SYS_GUID()"));
    assert_eq!(Access::new().guid_function(), None);
    assert!(!MySql::new().supports_limit_in_subquery());
    assert!(SqlServer::new().supports_limit_in_subquery());
}

#[test]
fn sqlserver_skip_without_order_uses_constant_window() {
    let sql = render(SqlServer::new(), false, false, paging(None, 5));
    assert!(sql.contains("ROW_NUMBER() OVER(ORDER BY (SELECT 1))"));
    assert!(sql.ends_with("WHERE [__Row_number_] > 5 ORDER BY [__Row_number_]"));
}

#[test]
fn sqlserver_distinct_skip_uses_offset_fetch() {
    let sql = render(SqlServer::new(), true, true, paging(Some(3), 6));
    assert_eq!(
        sql,
        "SELECT DISTINCT [uid] AS [Id] FROM [users] ORDER BY [uid] OFFSET 6 ROWS FETCH NEXT 3 ROWS ONLY"
    );
}

#[test]
fn mysql_renders_limit_forms() {
    assert_eq!(
        render(MySql::new(), false, false, paging(Some(10), 0)),
        "SELECT `uid` AS `Id` FROM `users` LIMIT 10"
    );
    assert_eq!(
        render(MySql::new(), false, true, paging(Some(10), 5)),
        "SELECT `uid` AS `Id` FROM `users` ORDER BY `uid` LIMIT 5, 10"
    );
    assert!(
        render(MySql::new(), false, false, paging(None, 5))
            .ends_with("LIMIT 5, 18446744073709551615")
    );
}

#[test]
fn oracle_renders_offset_fetch() {
    assert_eq!(
        render(Oracle::new(), false, true, paging(Some(10), 0)),
        "SELECT \"uid\" AS \"Id\" FROM \"users\" ORDER BY \"uid\" FETCH NEXT 10 ROWS ONLY"
    );
    assert_eq!(
        render(Oracle::new(), false, true, paging(Some(10), 2)),
        "SELECT \"uid\" AS \"Id\" FROM \"users\" ORDER BY \"uid\" OFFSET 2 ROWS FETCH NEXT 10 ROWS ONLY"
    );
}

#[test]
fn access_rejects_skip() {
    let dialect: Arc<dyn Dialect> = Arc::new(Access::new());
    let (mut out, parts) = parts(&dialect, false, true);
    let err = dialect
        .page(&mut out, parts, paging(Some(1), 1))
        .expect_err("skip should be rejected");

    assert!(err.is_unsupported());
}

#[test]
fn access_rejects_intersect_and_oracle_spells_except_minus() {
    assert!(Access::new().set_operator(SetOp::Intersect).is_err());
    assert_eq!(Oracle::new().set_operator(SetOp::Except), Ok("MINUS"));
    assert_eq!(MySql::new().set_operator(SetOp::UnionAll), Ok("UNION ALL"));
}

#[test]
fn quoting_escapes_closing_delimiters() {
    assert_eq!(SqlServer::new().quote_identifier("a]b"), "[a]]b]");
    assert_eq!(MySql::new().quote_identifier("a`b"), "`a``b`");
    assert_eq!(Oracle::new().quote_identifier("a\"b"), "\"a\"\"b\"");
}

#[test]
fn template_rewriter_substitutes_operands() {
    let dialect: Arc<dyn Dialect> = Arc::new(SqlServer::new());
    let mut out = SqlBuffer::standalone(Arc::clone(&dialect), "p");
    let mut date = out.fork();
    date.write_identifier("created");
    let mut days = out.fork();
    days.parameter(Value::Int(3), TypeRef::int());

    let rewriter = dialect.rewriter("AddDays").expect("AddDays registered");
    rewriter
        .rewrite(&mut out, vec![date, days])
        .expect("template should render");

    assert_eq!(out.as_str(), "DATEADD(day, @p1, [created])");
    let (_, params) = out.into_parts();
    assert_eq!(params.len(), 1);
}

#[test]
fn template_rewriter_reports_missing_operand() {
    let dialect: Arc<dyn Dialect> = Arc::new(MySql::new());
    let mut out = SqlBuffer::standalone(Arc::clone(&dialect), "p");
    let only = out.fork();
    let err = TemplateRewriter::new("Pair", "F({0}, {1})")
        .rewrite(&mut out, vec![only])
        .expect_err("operand 1 is missing");

    assert!(err.is_syntax());
}

#[test]
fn later_rewriters_override_defaults() {
    let dialect = SqlServer::new().with_rewriter(Arc::new(TemplateRewriter::new(
        "Now",
        "SYSUTCDATETIME()",
    )));
    let dialect: Arc<dyn Dialect> = Arc::new(dialect);
    let mut out = SqlBuffer::standalone(Arc::clone(&dialect), "p");

    dialect
        .rewriter("Now")
        .expect("Now registered")
        .rewrite(&mut out, Vec::new())
        .expect("template should render");

    assert_eq!(out.as_str(), "SYSUTCDATETIME()");
}

#[test]
fn scalar_select_uses_dual_on_oracle() {
    let dialect: Arc<dyn Dialect> = Arc::new(Oracle::new());
    let mut out = SqlBuffer::standalone(Arc::clone(&dialect), "p");
    let mut expr = out.fork();
    expr.write("1");
    dialect.select_scalar(&mut out, expr);

    assert_eq!(out.as_str(), "SELECT 1 FROM DUAL");
}
