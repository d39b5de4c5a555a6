use crate::{
    expr::{Command, Expr, Method, Query},
    sql::StatementKind,
    test_fixtures::{
        Account, Archive, Ledger, Profile, Ticket, User, UserRow, access, command, command_err,
        command_unfiltered, mysql, sqlserver,
    },
    value::{TypeRef, Value},
};

fn user_by_id(id: i64) -> Command {
    Command::table::<User>().filter("u", |u| u.field("Id").eq(id))
}

// ----------------------------------------------------------------------------
// delete
// ----------------------------------------------------------------------------

#[test]
fn delete_is_aliased_on_sqlserver() {
    let compiled = command(&sqlserver(), user_by_id(7).delete());

    assert_eq!(
        compiled.sql,
        "DELETE [u] FROM [users] [u] WHERE [u].[uid] = @p1"
    );
    assert_eq!(compiled.kind, StatementKind::Delete);
    assert_eq!(compiled.parameters.value("p1"), Some(&Value::Int(7)));
}

#[test]
fn delete_is_plain_on_mysql() {
    let compiled = command(&mysql(), user_by_id(7).delete());

    assert_eq!(compiled.sql, "DELETE FROM `users` WHERE `uid` = @p1");
}

#[test]
fn unfiltered_delete_is_rejected_by_default() {
    let err = command_err(&sqlserver(), Command::table::<User>().delete());

    assert!(err.is_syntax());
    assert!(err.message.contains("'Delete' requires a Where filter"));
}

#[test]
fn always_true_filter_does_not_narrow() {
    let err = command_err(
        &sqlserver(),
        Command::table::<User>()
            .filter("u", |_| Expr::constant(true))
            .delete(),
    );

    assert!(err.message.contains("allow_unfiltered"));
}

#[test]
fn unfiltered_delete_with_the_option() {
    let compiled = command_unfiltered(&sqlserver(), Command::table::<User>().delete());

    assert_eq!(compiled.sql, "DELETE [t] FROM [users] [t]");
}

#[test]
fn always_false_filter_matches_nothing() {
    let compiled = command(
        &sqlserver(),
        Command::table::<User>()
            .filter("u", |_| Expr::constant(false))
            .delete(),
    );

    assert_eq!(compiled.sql, "DELETE [u] FROM [users] [u] WHERE 1=0");
}

#[test]
fn multiple_filters_are_and_fused() {
    let compiled = command(
        &mysql(),
        user_by_id(7)
            .filter("u", |u| u.field("IsActive").not())
            .delete(),
    );

    assert_eq!(
        compiled.sql,
        "DELETE FROM `users` WHERE (`uid` = @p1) AND (`is_active` <> 1)"
    );
}

#[test]
fn table_name_override_replaces_the_mapped_table() {
    let compiled = command(
        &sqlserver(),
        Command::table::<User>()
            .table_name("users_2024")
            .filter("u", |u| u.field("Id").eq(1))
            .delete(),
    );

    assert_eq!(
        compiled.sql,
        "DELETE [u] FROM [users_2024] [u] WHERE [u].[uid] = @p1"
    );
}

#[test]
fn blank_table_name_is_rejected() {
    let err = command_err(
        &sqlserver(),
        Command::table::<User>().table_name("  ").delete(),
    );

    assert_eq!(err.message, "table name must not be empty");
}

#[test]
fn timeout_is_carried_through() {
    let compiled = command(&sqlserver(), user_by_id(1).delete().timeout(30));

    assert_eq!(compiled.timeout, Some(30));
}

// ----------------------------------------------------------------------------
// update
// ----------------------------------------------------------------------------

#[test]
fn update_on_sqlserver_uses_from_alias() {
    let compiled = command(
        &sqlserver(),
        user_by_id(7).update("u", |u| Expr::new_record([("Age", u.field("Age").add(1))])),
    );

    assert_eq!(
        compiled.sql,
        "UPDATE [u] SET [Age] = ([u].[Age] + @p1) FROM [users] [u] WHERE [u].[uid] = @p2"
    );
    assert_eq!(compiled.kind, StatementKind::Update);
    assert_eq!(compiled.parameters.names().collect::<Vec<_>>(), ["p1", "p2"]);
}

#[test]
fn update_maps_renamed_columns() {
    let compiled = command(
        &mysql(),
        user_by_id(7).update("u", |_| Expr::new_record([("IsActive", Expr::constant(false))])),
    );

    assert_eq!(
        compiled.sql,
        "UPDATE `users` SET `is_active` = @p1 WHERE `uid` = @p2"
    );
}

#[test]
fn unbound_tokens_are_populated_on_update() {
    let compiled = command(
        &mysql(),
        Command::table::<Ledger>()
            .filter("l", |l| l.field("Id").eq(3))
            .update("l", |_| Expr::new_record([("Name", Expr::constant("renamed"))])),
    );

    assert_eq!(
        compiled.sql,
        "UPDATE `ledger` SET `Name` = @p1, `row_version` = `row_version` + 1, \
         `Stamp` = @Stamp, `Code` = @Code WHERE `Id` = @p2"
    );
    assert_eq!(
        compiled.parameters.value("Code"),
        Some(&Value::Text("LEDGER".to_string()))
    );
    assert!(matches!(
        compiled.parameters.value("Stamp"),
        Some(Value::Timestamp(_))
    ));
}

#[test]
fn version_increment_is_qualified_on_sqlserver() {
    let compiled = command(
        &sqlserver(),
        Command::table::<Ledger>()
            .filter("l", |l| l.field("Id").eq(3))
            .update("l", |_| {
                Expr::new_record([
                    ("Name", Expr::constant("renamed")),
                    ("Stamp", Expr::null()),
                    ("Code", Expr::constant("X")),
                ])
            }),
    );

    assert!(compiled.sql.contains("[row_version] = [l].[row_version] + 1"));
    assert!(!compiled.sql.contains("@Stamp"));
}

#[test]
fn update_leaves_a_guid_key_alone() {
    let compiled = command(
        &mysql(),
        Command::table::<Account>()
            .filter("a", |a| a.field("Name").eq("x"))
            .update("a", |_| Expr::new_record([("Name", Expr::constant("y"))])),
    );

    assert_eq!(
        compiled.sql,
        "UPDATE `accounts` SET `Name` = @p1 WHERE `Name` = @p2"
    );
    assert_eq!(compiled.parameters.value("Key"), None);
}

#[test]
fn update_without_filter_is_rejected() {
    let err = command_err(
        &sqlserver(),
        Command::table::<User>().update("u", |_| Expr::new_record([("Age", Expr::constant(1))])),
    );

    assert!(err.message.contains("'Update' requires a Where filter"));
}

#[test]
fn update_requires_a_construction() {
    let err = command_err(&sqlserver(), user_by_id(1).update("u", |u| u.field("Age")));

    assert!(err.is_syntax());
}

#[test]
fn read_only_columns_cannot_be_set() {
    let err = command_err(
        &sqlserver(),
        Command::table::<Profile>()
            .filter("p", |p| p.field("Id").eq(1))
            .update("p", |_| Expr::new_record([("CreatedAt", Expr::now())])),
    );

    assert!(err.is_unsupported());
    assert!(err.message.contains("'CreatedAt'"));
}

#[test]
fn write_only_columns_can_be_set() {
    let compiled = command(
        &mysql(),
        Command::table::<Profile>()
            .filter("p", |p| p.field("Id").eq(1))
            .update("p", |_| Expr::new_record([("Secret", Expr::constant("hunter2"))])),
    );

    assert_eq!(
        compiled.sql,
        "UPDATE `profiles` SET `Secret` = @p1 WHERE `Id` = @p2"
    );
}

#[test]
fn update_entity_binds_captured_field_names() {
    let row = UserRow {
        id: 7,
        name: Some("Ada".to_string()),
        age: 36,
        is_active: true,
        email: None,
    };
    let compiled = command(&sqlserver(), Command::update_entity(&row, &["Id"]));

    assert_eq!(
        compiled.sql,
        "UPDATE [x] SET [Name] = @Name, [Age] = @Age, [is_active] = @IsActive, \
         [Email] = @Email FROM [users] [x] WHERE [x].[uid] = @Id"
    );
    assert_eq!(compiled.parameters.value("Email"), Some(&Value::Null));
    assert_eq!(compiled.parameters.value("Id"), Some(&Value::Int(7)));
}

// ----------------------------------------------------------------------------
// insert
// ----------------------------------------------------------------------------

#[test]
fn insert_values_with_generated_tokens() {
    let compiled = command(
        &mysql(),
        Command::table::<Ledger>().insert(|| Expr::new_record([("Name", Expr::constant("first"))])),
    );

    assert_eq!(
        compiled.sql,
        "INSERT INTO `ledger` (`Name`, `row_version`, `Stamp`, `Code`) \
         VALUES (@p1, @Version, @Stamp, @Code)"
    );
    assert_eq!(compiled.kind, StatementKind::Insert);
    assert_eq!(compiled.parameters.value("Version"), Some(&Value::Int(1)));
}

#[test]
fn guid_key_token_is_generated_on_insert() {
    let compiled = command(
        &sqlserver(),
        Command::table::<Account>().insert(|| Expr::new_record([("Name", Expr::constant("ops"))])),
    );

    assert_eq!(
        compiled.sql,
        "INSERT INTO [accounts] ([Name], [Key]) VALUES (@p1, @Key)"
    );
    assert!(matches!(
        compiled.parameters.value("Key"),
        Some(Value::Guid(_))
    ));
}

#[test]
fn insert_entity_writes_every_writable_field() {
    let row = UserRow {
        id: 1,
        name: None,
        age: 20,
        is_active: false,
        email: Some("a@b.c".to_string()),
    };
    let compiled = command(&sqlserver(), Command::insert_entity(&row));

    assert_eq!(
        compiled.sql,
        "INSERT INTO [users] ([uid], [Name], [Age], [is_active], [Email]) \
         VALUES (@Id, @Name, @Age, @IsActive, @Email)"
    );
}

#[test]
fn insert_from_a_source_query() {
    let source = Query::table::<User>()
        .filter("u", |u| u.field("Age").gt(65))
        .select("u", |u| {
            Expr::new_record([("Id", u.field("Id")), ("Name", u.field("Name"))])
        });
    let compiled = command(&sqlserver(), Command::table::<Archive>().insert_from(source));

    assert_eq!(
        compiled.sql,
        "INSERT INTO [archive] ([Id], [Name]) SELECT [u].[uid] AS [Id], [u].[Name] \
         FROM [users] [u] WHERE [u].[Age] > @p1"
    );
}

fn names_of_users() -> Query {
    Query::table::<User>().select("u", |u| Expr::new_record([("Name", u.field("Name"))]))
}

#[test]
fn insert_from_generates_guid_keys_per_row() {
    let compiled = command(&sqlserver(), Command::table::<Account>().insert_from(names_of_users()));

    assert_eq!(
        compiled.sql,
        "INSERT INTO [accounts] ([Name], [Key]) SELECT [u].[Name], NEWID() FROM [users] [u]"
    );
    assert!(compiled.parameters.is_empty());

    let compiled = command(&mysql(), Command::table::<Account>().insert_from(names_of_users()));
    assert_eq!(
        compiled.sql,
        "INSERT INTO `accounts` (`Name`, `Key`) SELECT `u`.`Name`, UUID() FROM `users` `u`"
    );
}

#[test]
fn insert_from_without_a_guid_function_is_unsupported() {
    let err = command_err(&access(), Command::table::<Account>().insert_from(names_of_users()));

    assert!(err.is_unsupported());
    assert!(err.message.contains("no per-row guid function for token 'Key'"));
}

#[test]
fn insert_from_rejects_custom_key_tokens() {
    let err = command_err(&sqlserver(), Command::table::<Ticket>().insert_from(names_of_users()));

    assert!(err.is_syntax());
    assert!(err.message.contains("key token 'Code'"));
}

#[test]
fn insert_from_binds_other_tokens_once() {
    let compiled = command(&mysql(), Command::table::<Ledger>().insert_from(names_of_users()));

    assert_eq!(
        compiled.sql,
        "INSERT INTO `ledger` (`Name`, `row_version`, `Stamp`, `Code`) \
         SELECT `u`.`Name`, @Version, @Stamp, @Code FROM `users` `u`"
    );
}

#[test]
fn insert_source_must_project() {
    let err = command_err(
        &sqlserver(),
        Command::table::<Archive>().insert_from(Query::table::<User>()),
    );

    assert!(err.message.contains("must end in a Select projection"));
}

#[test]
fn insert_rejects_direct_filters() {
    let err = command_err(
        &sqlserver(),
        Command::table::<Archive>()
            .filter("a", |a| a.field("Id").eq(1))
            .insert(|| Expr::new_record([("Id", Expr::constant(1))])),
    );

    assert!(err.message.starts_with("insert does not support filtering directly"));
}

// ----------------------------------------------------------------------------
// chain shape
// ----------------------------------------------------------------------------

#[test]
fn command_without_an_action_is_rejected() {
    let err = command_err(&sqlserver(), user_by_id(1));

    assert_eq!(err.message, "command requires Insert, Update or Delete");
}

#[test]
fn only_one_action_is_allowed() {
    let err = command_err(&sqlserver(), user_by_id(1).delete().delete());

    assert!(err.message.contains("only one of Insert, Update or Delete"));
}

#[test]
fn query_operators_are_not_command_operations() {
    let expr = Expr::call(
        Method::Take,
        Some(user_by_id(1).delete().into_expr()),
        vec![Expr::constant(1)],
        TypeRef::Object,
    );
    let err = command_err(&sqlserver(), expr);

    assert_eq!(err.message, "'Take' is not a command operation");
}

#[test]
fn command_root_must_be_a_table() {
    let err = command_err(&sqlserver(), Expr::constant(1));

    assert!(err.is_unsupported());
}
