use crate::{
    expr::{Expr, Query},
    sql::StatementKind,
    test_fixtures::{
        Narrow, Order, Unrelated, User, mysql, oracle, query, query_err, sqlserver,
    },
    value::Value,
};

const USER_COLUMNS: &str = "[uid] AS [Id], [Name], [Age], [is_active] AS [IsActive], [Email]";

fn users() -> Query {
    Query::table::<User>()
}

fn adults() -> Query {
    users().filter("u", |u| u.field("Age").ge(18))
}

// ----------------------------------------------------------------------------
// projection
// ----------------------------------------------------------------------------

#[test]
fn bare_table_selects_every_readable_column_unqualified() {
    let compiled = query(&sqlserver(), users());

    assert_eq!(compiled.sql, format!("SELECT {USER_COLUMNS} FROM [users]"));
    assert_eq!(compiled.kind, StatementKind::Select);
    assert!(compiled.parameters.is_empty());
    assert!(!compiled.required);
}

#[test]
fn construction_aliases_only_renamed_or_computed_columns() {
    let q = users().select("u", |u| {
        Expr::new_record([
            ("Name", u.field("Name")),
            ("Years", u.field("Age")),
            ("Next", u.field("Age").add(1)),
        ])
    });
    let compiled = query(&sqlserver(), q);

    assert_eq!(
        compiled.sql,
        "SELECT [Name], [Age] AS [Years], ([Age] + @p1) AS [Next] FROM [users]"
    );
    assert_eq!(compiled.parameters.value("p1"), Some(&Value::Int(1)));
}

#[test]
fn scalar_projection_keeps_its_member_name() {
    let compiled = query(&sqlserver(), users().select("u", |u| u.field("Name")));

    assert_eq!(compiled.sql, "SELECT [Name] FROM [users]");
}

#[test]
fn empty_construction_is_rejected() {
    let err = query_err(
        &sqlserver(),
        users().select("u", |_| Expr::new_record(Vec::<(String, Expr)>::new())),
    );

    assert!(err.is_syntax());
    assert_eq!(err.message, "no fields selected");
}

#[test]
fn duplicate_projected_names_are_rejected() {
    let err = query_err(
        &sqlserver(),
        users().select("u", |u| {
            Expr::new_record([("Name", u.field("Name")), ("Name", u.field("Email"))])
        }),
    );

    assert!(err.message.contains("duplicate column 'Name'"));
}

#[test]
fn lambda_operators_after_select_are_rejected() {
    let err = query_err(
        &sqlserver(),
        users()
            .select("u", |u| u.field("Name"))
            .filter("n", |n| n.clone().eq("x")),
    );

    assert!(err.is_syntax());
    assert!(err.message.contains("'Where' cannot follow Select"));
}

#[test]
fn distinct_projection() {
    let compiled = query(&sqlserver(), users().select("u", |u| u.field("Name")).distinct());

    assert_eq!(compiled.sql, "SELECT DISTINCT [Name] FROM [users]");
}

// ----------------------------------------------------------------------------
// filtering and ordering
// ----------------------------------------------------------------------------

#[test]
fn successive_filters_are_and_fused() {
    let q = adults().filter("u", |u| u.field("IsActive"));
    let compiled = query(&sqlserver(), q);

    assert_eq!(
        compiled.sql,
        format!("SELECT {USER_COLUMNS} FROM [users] WHERE ([Age] >= @p1) AND ([is_active] = 1)")
    );
}

#[test]
fn successive_filters_match_a_single_conjunction() {
    let fused = users()
        .filter("u", |u| u.field("Age").ge(18))
        .filter("u", |u| u.field("Name").eq("Ada"));
    let single = users().filter("u", |u| u.field("Age").ge(18).and(u.field("Name").eq("Ada")));

    let fused = query(&sqlserver(), fused);
    let single = query(&sqlserver(), single);

    assert_eq!(fused.sql, single.sql);
    assert_eq!(fused.parameters, single.parameters);
}

#[test]
fn skip_while_fuses_the_negated_predicate() {
    let q = users().skip_while("u", |u| u.field("Age").lt(18));
    let compiled = query(&sqlserver(), q);

    assert_eq!(
        compiled.sql,
        format!("SELECT {USER_COLUMNS} FROM [users] WHERE [Age] >= @p1")
    );
}

#[test]
fn always_false_filter_short_circuits_the_where_clause() {
    let q = users()
        .filter("u", |u| u.field("Age").gt(30))
        .filter("u", |_| Expr::constant(false));
    let compiled = query(&sqlserver(), q);

    assert_eq!(compiled.sql, format!("SELECT {USER_COLUMNS} FROM [users] WHERE 1=0"));
    assert!(compiled.parameters.is_empty());
}

#[test]
fn order_by_then_by_and_reverse() {
    let q = users()
        .order_by("u", |u| u.field("Name"))
        .then_by_desc("u", |u| u.field("Age"))
        .reverse()
        .select("u", |u| u.field("Id"));
    let compiled = query(&sqlserver(), q);

    assert_eq!(
        compiled.sql,
        "SELECT [uid] AS [Id] FROM [users] ORDER BY [Name] DESC, [Age]"
    );
}

#[test]
fn order_by_resets_previous_keys() {
    let q = users()
        .order_by("u", |u| u.field("Name"))
        .order_by_desc("u", |u| u.field("Age"))
        .select("u", |u| u.field("Age"));

    assert_eq!(
        query(&sqlserver(), q).sql,
        "SELECT [Age] FROM [users] ORDER BY [Age] DESC"
    );
}

#[test]
fn reverse_without_ordering_is_rejected() {
    let err = query_err(&sqlserver(), users().reverse());

    assert!(err.is_syntax());
}

#[test]
fn then_by_without_order_by_is_rejected() {
    let err = query_err(&sqlserver(), users().then_by("u", |u| u.field("Age")));

    assert!(err.is_syntax());
}

// ----------------------------------------------------------------------------
// paging
// ----------------------------------------------------------------------------

#[test]
fn take_renders_top_on_sqlserver() {
    let q = adults().order_by("u", |u| u.field("Name")).take(10);

    assert_eq!(
        query(&sqlserver(), q).sql,
        format!("SELECT TOP 10 {USER_COLUMNS} FROM [users] WHERE [Age] >= @p1 ORDER BY [Name]")
    );
}

#[test]
fn skip_and_take_render_limit_on_mysql() {
    let q = users()
        .order_by("u", |u| u.field("Name"))
        .skip(20)
        .take(10)
        .select("u", |u| u.field("Name"));

    assert_eq!(
        query(&mysql(), q).sql,
        "SELECT `Name` FROM `users` ORDER BY `Name` LIMIT 20, 10"
    );
}

#[test]
fn skip_and_take_render_offset_fetch_on_oracle() {
    let q = users()
        .order_by("u", |u| u.field("Name"))
        .skip(20)
        .take(10)
        .select("u", |u| u.field("Name"));

    assert_eq!(
        query(&oracle(), q).sql,
        "SELECT \"Name\" FROM \"users\" ORDER BY \"Name\" OFFSET 20 ROWS FETCH NEXT 10 ROWS ONLY"
    );
}

#[test]
fn skip_on_sqlserver_uses_a_row_number_window() {
    let q = users()
        .order_by("u", |u| u.field("Name"))
        .skip(5)
        .select("u", |u| u.field("Name"));
    let sql = query(&sqlserver(), q).sql;

    assert_eq!(
        sql,
        "SELECT [Name] FROM (SELECT [Name], ROW_NUMBER() OVER(ORDER BY [Name]) AS [__Row_number_] \
         FROM [users]) [__page_1] WHERE [__Row_number_] > 5 ORDER BY [__Row_number_]"
    );
}

#[test]
fn skip_inside_an_exists_uses_a_derived_window() {
    let q = users()
        .filter("u", |u| {
            Query::table::<Order>()
                .filter("o", |o| o.field("UserId").eq(u.field("Id")))
                .order_by("o", |o| o.field("Id"))
                .skip(1)
                .any()
        })
        .select("u", |u| u.field("Name"));
    let sql = query(&sqlserver(), q).sql;

    assert!(!sql.contains("WITH "));
    assert!(sql.contains(
        "EXISTS(SELECT 1 FROM (SELECT ROW_NUMBER() OVER(ORDER BY [o].[Id]) AS [__Row_number_] \
         FROM [orders] [o] WHERE [o].[user_id] = [u].[uid]) [__page_1] WHERE [__Row_number_] > 1)"
    ));
}

#[test]
fn sibling_windows_get_distinct_aliases() {
    let paged = |u: &Expr| {
        Query::table::<Order>()
            .filter("o", |o| o.field("UserId").eq(u.field("Id")))
            .order_by("o", |o| o.field("Id"))
            .skip(2)
            .any()
    };
    let q = users()
        .filter("u", |u| paged(u).and(paged(u).not()))
        .select("u", |u| u.field("Name"));
    let sql = query(&sqlserver(), q).sql;

    assert!(sql.contains("[__page_1] WHERE [__Row_number_] > 2)"));
    assert!(sql.contains("[__page_2] WHERE [__Row_number_] > 2)"));
    assert!(!sql.contains("ORDER BY [__Row_number_]"));
}

#[test]
fn skip_inside_a_union_branch_uses_a_derived_window() {
    let q = users()
        .order_by("u", |u| u.field("Age"))
        .skip(2)
        .select("u", |u| u.field("Name"))
        .union(users().select("u", |u| u.field("Name")));
    let sql = query(&sqlserver(), q).sql;

    assert_eq!(
        sql,
        "SELECT * FROM (SELECT * FROM (SELECT [Name] FROM (SELECT [Name], ROW_NUMBER() \
         OVER(ORDER BY [Age]) AS [__Row_number_] FROM [users]) [__page_1] \
         WHERE [__Row_number_] > 2) [UNION_ALIAS_1] UNION SELECT [Name] FROM [users]) [UNION_ALIAS]"
    );
}

#[test]
fn skips_accumulate_and_takes_keep_the_smaller_window() {
    let q = users()
        .order_by("u", |u| u.field("Name"))
        .skip(2)
        .skip(3)
        .take(4)
        .take(10)
        .select("u", |u| u.field("Name"));

    assert_eq!(
        query(&mysql(), q).sql,
        "SELECT `Name` FROM `users` ORDER BY `Name` LIMIT 5, 4"
    );
}

#[test]
fn shrinking_take_is_out_of_range() {
    let err = query_err(&sqlserver(), users().take(10).take(3));

    assert!(err.is_syntax());
    assert!(err.message.contains("index out of range"));
}

#[test]
fn negative_take_is_rejected() {
    let err = query_err(&sqlserver(), users().take(-1));

    assert!(err.message.contains("must not be negative"));
}

#[test]
fn take_last_flips_the_order() {
    let q = users()
        .order_by("u", |u| u.field("Age"))
        .take_last(3)
        .select("u", |u| u.field("Age"));

    assert_eq!(
        query(&sqlserver(), q).sql,
        "SELECT TOP 3 [Age] FROM [users] ORDER BY [Age] DESC"
    );
}

#[test]
fn take_last_without_ordering_is_rejected() {
    let err = query_err(&sqlserver(), users().take_last(3));

    assert!(err.is_syntax());
}

// ----------------------------------------------------------------------------
// aggregates
// ----------------------------------------------------------------------------

#[test]
fn count_uses_the_single_key_column() {
    let compiled = query(&sqlserver(), users().count());

    assert_eq!(compiled.sql, "SELECT COUNT([uid]) FROM [users]");
    assert_eq!(compiled.kind, StatementKind::Scalar);
    assert!(!compiled.required);
}

#[test]
fn count_with_predicate_filters_first() {
    let compiled = query(&sqlserver(), users().count_where("u", |u| u.field("IsActive")));

    assert_eq!(
        compiled.sql,
        "SELECT COUNT([uid]) FROM [users] WHERE [is_active] = 1"
    );
}

#[test]
fn distinct_count_wraps_the_distinct_select() {
    let compiled = query(
        &sqlserver(),
        users().select("u", |u| u.field("Name")).distinct().count(),
    );

    assert_eq!(
        compiled.sql,
        "SELECT COUNT(*) FROM (SELECT DISTINCT [Name] FROM [users]) [t]"
    );
}

#[test]
fn sum_defaults_to_zero_and_is_not_required() {
    let compiled = query(
        &sqlserver(),
        Query::table::<Order>().sum_by("o", |o| o.field("Amount")),
    );

    assert_eq!(compiled.sql, "SELECT SUM([Amount]) FROM [orders]");
    assert_eq!(compiled.default_value, Some(Value::Float(0.0)));
    assert!(!compiled.required);
}

#[test]
fn max_over_a_scalar_projection() {
    let compiled = query(&sqlserver(), users().select("u", |u| u.field("Age")).max());

    assert_eq!(compiled.sql, "SELECT MAX([Age]) FROM [users]");
    assert!(compiled.required);
}

#[test]
fn average_drops_ordering() {
    let compiled = query(
        &sqlserver(),
        users()
            .order_by("u", |u| u.field("Name"))
            .average_by("u", |u| u.field("Age")),
    );

    assert_eq!(compiled.sql, "SELECT AVG([Age]) FROM [users]");
}

#[test]
fn aggregate_after_paging_is_rejected() {
    let err = query_err(&sqlserver(), users().take(5).count());

    assert!(err.is_syntax());
    assert!(err.message.contains("'Count' cannot be combined with Take or Skip"));
}

#[test]
fn aggregate_over_a_wide_projection_needs_a_selector() {
    let err = query_err(
        &sqlserver(),
        users()
            .select("u", |u| {
                Expr::new_record([("Name", u.field("Name")), ("Age", u.field("Age"))])
            })
            .max(),
    );

    assert!(err.message.contains("needs a selector"));
}

// ----------------------------------------------------------------------------
// element operators
// ----------------------------------------------------------------------------

#[test]
fn first_takes_one_row_and_is_required() {
    let compiled = query(&sqlserver(), adults().select("u", |u| u.field("Name")).first());

    assert_eq!(
        compiled.sql,
        "SELECT TOP 1 [Name] FROM [users] WHERE [Age] >= @p1"
    );
    assert!(compiled.required);
    assert_eq!(compiled.kind, StatementKind::Select);
}

#[test]
fn first_with_predicate_fuses_it() {
    let compiled = query(
        &sqlserver(),
        adults().first_where("u", |u| u.field("IsActive")),
    );

    assert_eq!(
        compiled.sql,
        format!(
            "SELECT TOP 1 {USER_COLUMNS} FROM [users] WHERE ([Age] >= @p1) AND ([is_active] = 1)"
        )
    );
}

#[test]
fn single_takes_two_rows() {
    let compiled = query(&sqlserver(), users().select("u", |u| u.field("Name")).single());

    assert_eq!(compiled.sql, "SELECT TOP 2 [Name] FROM [users]");
    assert!(compiled.required);
}

#[test]
fn or_default_forms_carry_the_fallback_and_are_optional() {
    let compiled = query(
        &sqlserver(),
        users().select("u", |u| u.field("Name")).first_or("nobody"),
    );

    assert!(!compiled.required);
    assert_eq!(compiled.default_value, Some(Value::Text("nobody".to_string())));
}

#[test]
fn default_if_empty_sets_the_fallback() {
    let compiled = query(
        &sqlserver(),
        users().select("u", |u| u.field("Age")).default_if_empty(0),
    );

    assert_eq!(compiled.default_value, Some(Value::Int(0)));
}

#[test]
fn last_reverses_the_order() {
    let compiled = query(
        &sqlserver(),
        users()
            .order_by("u", |u| u.field("Age"))
            .select("u", |u| u.field("Age"))
            .last(),
    );

    assert_eq!(
        compiled.sql,
        "SELECT TOP 1 [Age] FROM [users] ORDER BY [Age] DESC"
    );
}

#[test]
fn last_without_ordering_is_rejected() {
    let err = query_err(&sqlserver(), users().last());

    assert!(err.is_syntax());
}

#[test]
fn element_at_skips_then_takes_one() {
    let compiled = query(
        &mysql(),
        users()
            .order_by("u", |u| u.field("Age"))
            .select("u", |u| u.field("Age"))
            .element_at(3),
    );

    assert_eq!(
        compiled.sql,
        "SELECT `Age` FROM `users` ORDER BY `Age` LIMIT 3, 1"
    );
    assert!(compiled.required);
}

// ----------------------------------------------------------------------------
// joins
// ----------------------------------------------------------------------------

fn user_orders() -> Query {
    users().join(
        Query::table::<Order>().filter("o", |o| o.field("Amount").gt(100.0)),
        ("u", |u: &Expr| u.field("Id")),
        ("o", |o: &Expr| o.field("UserId")),
        |u, o| Expr::new_record([("Name", u.field("Name")), ("Amount", o.field("Amount"))]),
    )
}

#[test]
fn join_qualifies_both_sides_and_pulls_inner_filters() {
    let compiled = query(&sqlserver(), user_orders());

    assert_eq!(
        compiled.sql,
        "SELECT [u].[Name], [o].[Amount] FROM [users] [u] \
         INNER JOIN [orders] [o] ON [u].[uid] = [o].[user_id] \
         WHERE [o].[Amount] > @p1"
    );
    assert_eq!(compiled.parameters.value("p1"), Some(&Value::Float(100.0)));
}

#[test]
fn where_after_join_filters_the_result() {
    let q = user_orders().filter("r", |r| r.field("Amount").lt(500.0));
    let compiled = query(&sqlserver(), q);

    assert!(compiled.sql.ends_with("WHERE ([o].[Amount] > @p1) AND ([o].[Amount] < @p2)"));
}

#[test]
fn composite_join_keys_pair_up() {
    let q = users().join(
        Query::table::<Order>(),
        ("u", |u: &Expr| {
            Expr::new_record([("A", u.field("Id")), ("B", u.field("Age"))])
        }),
        ("o", |o: &Expr| {
            Expr::new_record([("A", o.field("UserId")), ("B", o.field("Id"))])
        }),
        |u, _| u.field("Name"),
    );

    assert_eq!(
        query(&sqlserver(), q).sql,
        "SELECT [u].[Name] FROM [users] [u] INNER JOIN [orders] [o] \
         ON [u].[uid] = [o].[user_id] AND [u].[Age] = [o].[Id]"
    );
}

#[test]
fn join_inner_source_may_only_filter() {
    let err = query_err(
        &sqlserver(),
        users().join(
            Query::table::<Order>().take(3),
            ("u", |u: &Expr| u.field("Id")),
            ("o", |o: &Expr| o.field("UserId")),
            |u, _| u.field("Name"),
        ),
    );

    assert!(err.is_unsupported());
}

// ----------------------------------------------------------------------------
// set operations
// ----------------------------------------------------------------------------

#[test]
fn union_becomes_a_derived_source() {
    let q = users()
        .filter("u", |u| u.field("Age").gt(60))
        .select("u", |u| u.field("Name"))
        .union(
            users()
                .filter("u", |u| u.field("Age").lt(20))
                .select("u", |u| u.field("Name")),
        );
    let compiled = query(&sqlserver(), q);

    assert_eq!(
        compiled.sql,
        "SELECT * FROM (SELECT [Name] FROM [users] WHERE [Age] > @p1 \
         UNION SELECT [Name] FROM [users] WHERE [Age] < @p2) [UNION_ALIAS]"
    );
    assert_eq!(compiled.parameters.names().collect::<Vec<_>>(), ["p1", "p2"]);
}

#[test]
fn operators_after_a_union_apply_to_the_wrapper() {
    let q = users()
        .select("u", |u| u.field("Name"))
        .concat(Query::table::<Narrow>().select("n", |n| n.field("Name")))
        .order_by("x", |x| x.field("Name"))
        .take(5);

    assert_eq!(
        query(&sqlserver(), q).sql,
        "SELECT TOP 5 * FROM (SELECT [Name] FROM [users] UNION ALL SELECT [Name] FROM [users]) \
         [UNION_ALIAS] ORDER BY [UNION_ALIAS].[Name]"
    );
}

#[test]
fn paged_union_branches_are_wrapped() {
    let q = users()
        .order_by("u", |u| u.field("Age"))
        .take(3)
        .select("u", |u| u.field("Name"))
        .except(users().select("u", |u| u.field("Name")));
    let sql = query(&sqlserver(), q).sql;

    assert!(sql.starts_with(
        "SELECT * FROM (SELECT * FROM (SELECT TOP 3 [Name] FROM [users] ORDER BY [Age]) [UNION_ALIAS_1] EXCEPT"
    ));
}

#[test]
fn unpaged_union_branches_drop_their_ordering() {
    let q = users()
        .order_by("u", |u| u.field("Age"))
        .select("u", |u| u.field("Name"))
        .intersect(users().select("u", |u| u.field("Name")));
    let sql = query(&sqlserver(), q).sql;

    assert!(!sql.contains("ORDER BY"));
    assert!(sql.contains(" INTERSECT "));
}

#[test]
fn oracle_spells_except_as_minus() {
    let q = users()
        .select("u", |u| u.field("Name"))
        .except(users().select("u", |u| u.field("Name")));

    assert!(query(&oracle(), q).sql.contains(" MINUS "));
}

// ----------------------------------------------------------------------------
// cast
// ----------------------------------------------------------------------------

#[test]
fn cast_narrows_to_shared_fields() {
    let compiled = query(&sqlserver(), users().cast::<Narrow>());

    assert_eq!(compiled.sql, "SELECT [uid] AS [Id], [Name] FROM [users]");
}

#[test]
fn cast_then_select_keeps_the_column_list() {
    let id = |u: &Expr| Expr::new_record([("Id", u.field("Id"))]);
    let plain = query(&sqlserver(), users().select("u", id));
    let cast = query(&sqlserver(), users().cast::<Narrow>().select("u", id));

    assert_eq!(plain.sql, "SELECT [uid] AS [Id] FROM [users]");
    assert_eq!(cast.sql, plain.sql);
}

#[test]
fn cast_without_shared_fields_is_unsupported() {
    let err = query_err(&sqlserver(), users().cast::<Unrelated>());

    assert!(err.is_unsupported());
}

// ----------------------------------------------------------------------------
// subqueries
// ----------------------------------------------------------------------------

#[test]
fn correlated_any_qualifies_the_outer_query() {
    let q = users().filter("u", |u| {
        Query::table::<Order>().any_where("o", |o| o.field("UserId").eq(u.field("Id")))
    });
    let compiled = query(&sqlserver(), q);

    assert_eq!(
        compiled.sql,
        "SELECT [u].[uid] AS [Id], [u].[Name], [u].[Age], [u].[is_active] AS [IsActive], \
         [u].[Email] FROM [users] [u] WHERE EXISTS(SELECT 1 FROM [orders] [o] \
         WHERE [o].[user_id] = [u].[uid])"
    );
}

#[test]
fn negated_any_becomes_not_exists() {
    let q = users()
        .filter("u", |u| {
            Query::table::<Order>()
                .any_where("o", |o| o.field("UserId").eq(u.field("Id")))
                .not()
        })
        .select("u", |u| u.field("Name"));

    assert_eq!(
        query(&sqlserver(), q).sql,
        "SELECT [u].[Name] FROM [users] [u] WHERE NOT EXISTS(SELECT 1 FROM [orders] [o] \
         WHERE [o].[user_id] = [u].[uid])"
    );
}

#[test]
fn all_over_a_subquery_uses_the_de_morgan_pair() {
    let q = users()
        .filter("u", |u| {
            Query::table::<Order>()
                .filter("o", |o| o.field("UserId").eq(u.field("Id")))
                .all("o", |o| o.field("Amount").gt(10.0))
        })
        .select("u", |u| u.field("Name"));
    let sql = query(&sqlserver(), q).sql;

    assert!(sql.contains(
        "(EXISTS(SELECT 1 FROM [orders] [o] WHERE ([o].[user_id] = [u].[uid]) AND ([o].[Amount] > @p1))"
    ));
    assert!(sql.contains(
        "AND NOT EXISTS(SELECT 1 FROM [orders] [o] WHERE ([o].[user_id] = [u].[uid]) AND ([o].[Amount] <= @p2)))"
    ));
}

#[test]
fn contains_over_a_subquery_becomes_in() {
    let q = users()
        .filter("u", |u| {
            Query::table::<Order>()
                .select("o", |o| o.field("UserId"))
                .contains(u.field("Id"))
        })
        .select("u", |u| u.field("Name"));

    assert_eq!(
        query(&sqlserver(), q).sql,
        "SELECT [u].[Name] FROM [users] [u] WHERE [u].[uid] IN (SELECT [o].[user_id] AS [UserId] FROM [orders] [o])"
    );
}

#[test]
fn limited_contains_subquery_is_wrapped_on_mysql() {
    let q = users()
        .filter("u", |u| {
            Query::table::<Order>()
                .order_by("o", |o| o.field("Id"))
                .take(5)
                .select("o", |o| o.field("UserId"))
                .contains(u.field("Id"))
        })
        .select("u", |u| u.field("Name"));

    assert_eq!(
        query(&mysql(), q.clone()).sql,
        "SELECT `u`.`Name` FROM `users` `u` WHERE `u`.`uid` IN (SELECT * FROM \
         (SELECT `o`.`user_id` AS `UserId` FROM `orders` `o` ORDER BY `o`.`Id` LIMIT 5) `__page_1`)"
    );
    assert!(query(&sqlserver(), q).sql.contains("IN (SELECT TOP 5 [o].[user_id] AS [UserId]"));
}

#[test]
fn scalar_subquery_in_a_projection() {
    let q = users().select("u", |u| {
        Expr::new_record([
            ("Name", u.field("Name")),
            (
                "Orders",
                Query::table::<Order>().count_where("o", |o| o.field("UserId").eq(u.field("Id"))),
            ),
        ])
    });

    assert_eq!(
        query(&sqlserver(), q).sql,
        "SELECT [u].[Name], (SELECT COUNT([o].[Id]) FROM [orders] [o] WHERE [o].[user_id] = [u].[uid]) \
         AS [Orders] FROM [users] [u]"
    );
}

#[test]
fn root_any_is_a_scalar_exists() {
    let compiled = query(&sqlserver(), users().any());

    assert_eq!(
        compiled.sql,
        "SELECT CASE WHEN EXISTS(SELECT 1 FROM [users] [t]) THEN 1 ELSE 0 END"
    );
    assert_eq!(compiled.kind, StatementKind::Scalar);
}

#[test]
fn root_any_on_oracle_selects_from_dual() {
    let sql = query(&oracle(), adults().any()).sql;

    assert!(sql.starts_with("SELECT CASE WHEN EXISTS(SELECT 1 FROM \"users\" \"u\""));
    assert!(sql.ends_with(" FROM DUAL"));
}

#[test]
fn table_root_is_required() {
    let err = query_err(&sqlserver(), Expr::constant(1));

    assert!(err.is_unsupported());
}
