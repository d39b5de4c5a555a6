use super::*;
use std::cmp::Ordering;

#[test]
fn option_none_converts_to_null() {
    let none: Option<i64> = None;

    assert_eq!(Value::from(none), Value::Null);
    assert_eq!(Value::from(Some("bob")), Value::Text("bob".to_string()));
}

#[test]
fn record_field_lookup_by_name() {
    let record = Value::record([("Id", Value::Int(7)), ("Name", Value::from("ann"))]);

    assert_eq!(record.field("Id"), Some(&Value::Int(7)));
    assert_eq!(record.field("Missing"), None);
}

#[test]
fn mixed_numeric_compare_is_numeric() {
    assert_eq!(Value::Int(2).compare(&Value::Float(2.5)), Some(Ordering::Less));
    assert_eq!(Value::Text("a".into()).compare(&Value::Int(1)), None);
}

#[test]
fn list_type_uses_first_non_null_element() {
    let list = Value::List(vec![Value::Null, Value::Int(1)]);

    assert_eq!(list.type_ref(), TypeRef::sequence(TypeRef::int()));
}

#[test]
fn nullable_scalar_members_resolve() {
    let ty = TypeRef::nullable(ScalarKind::Int);

    assert_eq!(ty.member("Value"), TypeRef::int());
    assert_eq!(ty.member("HasValue"), TypeRef::bool());
    assert_eq!(TypeRef::int().member("Value"), TypeRef::Object);
}
