//! Shared entities and compile helpers for unit tests.

use crate::{
    compile::{CommandOptions, Compiler},
    dialect::{Access, MySql, Oracle, SqlServer},
    error::CompileError,
    expr::Expr,
    model::{EntityModel, FieldModel, TokenKind},
    sql::CompiledSql,
    traits::{EntityKind, FieldValues},
    value::{ScalarKind, Value},
};

entity_model! {
    /// `users`: renamed key and flag columns, two nullable text fields.
    pub struct User => "users" {
        FieldModel::new("Id", ScalarKind::Int).column("uid").key(),
        FieldModel::new("Name", ScalarKind::Text).nullable(),
        FieldModel::new("Age", ScalarKind::Int),
        FieldModel::new("IsActive", ScalarKind::Bool).column("is_active"),
        FieldModel::new("Email", ScalarKind::Text).nullable(),
    }
}

entity_model! {
    pub struct Order => "orders" {
        FieldModel::new("Id", ScalarKind::Int).key(),
        FieldModel::new("UserId", ScalarKind::Int).column("user_id"),
        FieldModel::new("Amount", ScalarKind::Float),
        FieldModel::new("Note", ScalarKind::Text).nullable(),
    }
}

entity_model! {
    /// Cast target sharing `Id` and `Name` with `User`.
    pub struct Narrow => "users" {
        FieldModel::new("Id", ScalarKind::Int).column("uid").key(),
        FieldModel::new("Name", ScalarKind::Text).nullable(),
    }
}

entity_model! {
    /// Shares no field names with `User`.
    pub struct Unrelated => "unrelated" {
        FieldModel::new("Code", ScalarKind::Text).key(),
    }
}

entity_model! {
    pub struct Archive => "archive" {
        FieldModel::new("Id", ScalarKind::Int).key(),
        FieldModel::new("Name", ScalarKind::Text).nullable(),
    }
}

entity_model! {
    pub struct Account => "accounts" {
        FieldModel::new("Key", ScalarKind::Guid).key().token(TokenKind::Guid),
        FieldModel::new("Name", ScalarKind::Text),
    }
}

entity_model! {
    /// Key generated by a custom token.
    pub struct Ticket => "tickets" {
        FieldModel::new("Code", ScalarKind::Text).key().token(TokenKind::Custom(ticket_code)),
        FieldModel::new("Name", ScalarKind::Text),
    }
}

entity_model! {
    /// One column per token kind.
    pub struct Ledger => "ledger" {
        FieldModel::new("Id", ScalarKind::Int).key().token(TokenKind::Identity),
        FieldModel::new("Name", ScalarKind::Text),
        FieldModel::new("Version", ScalarKind::Int).column("row_version").token(TokenKind::Version),
        FieldModel::new("Stamp", ScalarKind::Timestamp).token(TokenKind::Timestamp),
        FieldModel::new("Code", ScalarKind::Text).token(TokenKind::Custom(ledger_code)),
    }
}

entity_model! {
    /// Write-only and read-only columns.
    pub struct Profile => "profiles" {
        FieldModel::new("Id", ScalarKind::Int).key(),
        FieldModel::new("Secret", ScalarKind::Text).write_only(),
        FieldModel::new("CreatedAt", ScalarKind::Timestamp).column("created_at").read_only(),
    }
}

entity_model! {
    /// Composite key.
    pub struct Membership => "memberships" {
        FieldModel::new("UserId", ScalarKind::Int).column("user_id").key(),
        FieldModel::new("GroupId", ScalarKind::Int).column("group_id").key(),
        FieldModel::new("Role", ScalarKind::Text),
    }
}

fn ledger_code() -> Value {
    Value::Text("LEDGER".to_string())
}

fn ticket_code() -> Value {
    Value::Text("T-1".to_string())
}

///
/// UserRow
/// A `User` snapshot for the entity command helpers.
///

pub struct UserRow {
    pub id: i64,
    pub name: Option<String>,
    pub age: i64,
    pub is_active: bool,
    pub email: Option<String>,
}

impl EntityKind for UserRow {
    const MODEL: &'static EntityModel = User::MODEL;
}

impl FieldValues for UserRow {
    fn get_value(&self, field: &str) -> Option<Value> {
        match field {
            "Id" => Some(Value::Int(self.id)),
            "Name" => Some(self.name.clone().map_or(Value::Null, Value::Text)),
            "Age" => Some(Value::Int(self.age)),
            "IsActive" => Some(Value::Bool(self.is_active)),
            "Email" => Some(self.email.clone().map_or(Value::Null, Value::Text)),
            _ => None,
        }
    }
}

// ----------------------------------------------------------------------------
// compile helpers
// ----------------------------------------------------------------------------

pub fn sqlserver() -> Compiler {
    Compiler::new(SqlServer::new())
}

pub fn mysql() -> Compiler {
    Compiler::new(MySql::new())
}

pub fn oracle() -> Compiler {
    Compiler::new(Oracle::new())
}

pub fn access() -> Compiler {
    Compiler::new(Access::new())
}

/// Compile a query that is expected to succeed.
pub fn query(compiler: &Compiler, expr: impl Into<Expr>) -> CompiledSql {
    let expr = expr.into();
    compiler
        .compile_query(&expr)
        .unwrap_or_else(|err| panic!("query should compile: {err}"))
}

pub fn query_err(compiler: &Compiler, expr: impl Into<Expr>) -> CompileError {
    compiler
        .compile_query(&expr.into())
        .expect_err("query should fail to compile")
}

pub fn command(compiler: &Compiler, expr: impl Into<Expr>) -> CompiledSql {
    let expr = expr.into();
    compiler
        .compile_command(&expr)
        .unwrap_or_else(|err| panic!("command should compile: {err}"))
}

pub fn command_unfiltered(compiler: &Compiler, expr: impl Into<Expr>) -> CompiledSql {
    let options = CommandOptions {
        allow_unfiltered: true,
    };
    compiler
        .compile_command_with(&expr.into(), options)
        .unwrap_or_else(|err| panic!("command should compile: {err}"))
}

pub fn command_err(compiler: &Compiler, expr: impl Into<Expr>) -> CompileError {
    compiler
        .compile_command(&expr.into())
        .expect_err("command should fail to compile")
}
