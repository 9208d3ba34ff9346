mod common;

use common::{user_row, users_schema};
use datamapper_core::{FieldKind, ModelError, RawRow, Record, RecordSchema, TempIdentity, Value};

#[test]
fn loaded_record_reads_coerced_values_and_is_clean() {
    let record = Record::from_row(users_schema(), user_row(123, "Marcus", 40));

    assert_eq!(record.get("name").unwrap(), &Value::from("Marcus"));
    assert_eq!(record.get_i64("age").unwrap(), Some(40));
    assert_eq!(record.id().unwrap(), &Value::Integer(123));
    assert!(!record.is_dirty());
    assert!(!record.is_temp());
}

#[test]
fn fields_materialize_on_first_access() {
    let record = Record::from_row(users_schema(), user_row(1, "Marcus", 40));

    assert!(!record.is_materialized("name").unwrap());
    assert!(record.raw_data().contains_key("name"));

    record.get("name").unwrap();
    assert!(record.is_materialized("name").unwrap());
    assert!(!record.raw_data().contains_key("name"));
    assert!(record.raw_data().contains_key("age"));
}

#[test]
fn defaults_and_initial_values_apply_to_blank_records() {
    let record = Record::new(users_schema());

    assert!(record.is_temp());
    assert_eq!(record.get("age").unwrap(), &Value::Integer(18));
    assert_eq!(record.get("handsome").unwrap(), &Value::Bool(false));
    assert_eq!(record.get("height").unwrap(), &Value::Double(0.0));
    assert_eq!(record.get("name").unwrap(), &Value::Null);
}

#[test]
fn setting_the_same_value_does_not_dirty() {
    let mut record = Record::from_row(users_schema(), user_row(1, "Marcus", 40));

    record.set("name", "Marcus").unwrap();
    assert!(!record.is_dirty());

    record.set("age", "40").unwrap();
    assert!(!record.is_dirty());
}

#[test]
fn set_then_revert_is_clean_again() {
    let mut record = Record::from_row(users_schema(), user_row(1, "Marcus", 40));

    record.set("name", "Donald").unwrap();
    record.set("name", "Mickey").unwrap();
    assert!(record.is_dirty());
    assert_eq!(
        record.original_values().get("name"),
        Some(&Value::from("Marcus"))
    );

    record.set("name", "Marcus").unwrap();
    assert!(!record.is_dirty());
    assert!(record.original_values().is_empty());
}

#[test]
fn changed_sql_values_hold_only_edited_fields() {
    let mut record = Record::from_row(users_schema(), user_row(1, "Marcus", 40));

    record.set("handsome", true).unwrap();
    record.set("age", 41).unwrap();

    assert_eq!(
        record.changed_sql_values().unwrap(),
        vec![
            ("age".to_string(), Value::Integer(41)),
            ("handsome".to_string(), Value::from("y")),
        ]
    );
}

#[test]
fn rejected_input_keeps_previous_value() {
    let mut record = Record::from_row(users_schema(), user_row(1, "Marcus", 40));

    let err = record.set("age", "forty").unwrap_err();
    match err {
        ModelError::ValidationInput { field, value, .. } => {
            assert_eq!(field, "age");
            assert_eq!(value, Value::from("forty"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(record.get_i64("age").unwrap(), Some(40));
    assert!(!record.is_dirty());
}

#[test]
fn unknown_field_is_a_config_error() {
    let mut record = Record::new(users_schema());

    assert!(matches!(record.get("email"), Err(ModelError::Config(_))));
    assert!(matches!(
        record.set("email", "a@b.c"),
        Err(ModelError::Config(_))
    ));
}

#[test]
fn validation_reports_messages_per_field() {
    let mut record = Record::new(users_schema());
    assert!(matches!(
        record.validation_errors(),
        Err(ModelError::State(_))
    ));

    record.set("name", "2").unwrap();
    record.set("age", 17).unwrap();
    assert!(!record.is_valid().unwrap());

    let errors = record.validation_errors().unwrap();
    assert_eq!(
        errors.get("name").unwrap(),
        &vec![
            "The input is less than 2 characters long".to_string(),
            "The input does not match against pattern '[^0-9]'".to_string(),
        ]
    );
    assert_eq!(
        errors.get("age").unwrap(),
        &vec!["The input is not greater than or equal to '18'".to_string()]
    );

    record.set("name", "Donald").unwrap();
    assert!(matches!(
        record.validation_errors(),
        Err(ModelError::State(_))
    ));
    record.set("age", 18).unwrap();
    assert!(record.is_valid().unwrap());
    assert!(record.validation_errors().unwrap().is_empty());
}

#[test]
fn json_round_trip_keeps_declaration_order() {
    let mut record = Record::from_row(users_schema(), user_row(123, "Marcus", 40));
    record.set("height", 1.85).unwrap();

    let json = record.to_json().unwrap();
    assert_eq!(
        json,
        r#"{"id":123,"name":"Marcus","age":40,"height":1.85,"handsome":false,"petCount":null}"#
    );
    assert_eq!(record.to_string(), json);

    let restored = Record::from_json(users_schema(), &json).unwrap();
    assert_eq!(restored.values().unwrap(), record.values().unwrap());
    assert!(!restored.is_dirty());

    assert!(matches!(
        Record::from_json(users_schema(), "{not json"),
        Err(ModelError::ValidationInput { .. })
    ));
}

#[test]
fn json_round_trip_keeps_string_and_number_like_json_values() {
    let schema = RecordSchema::builder("Note")
        .field("id", FieldKind::Integer)
        .field("meta", FieldKind::Json)
        .build()
        .unwrap();

    for stored in [r#""hello""#, r#""42""#, r#"{"tags":["a"]}"#] {
        let mut row = RawRow::new();
        row.insert("id".to_string(), Value::Integer(1));
        row.insert("meta".to_string(), Value::from(stored));
        let record = Record::from_row(schema.clone(), row);

        let json = record.to_json().unwrap();
        let restored = Record::from_json(schema.clone(), &json).unwrap();
        assert_eq!(restored.get("meta").unwrap(), record.get("meta").unwrap());
        assert_eq!(
            restored.sql_values().unwrap(),
            record.sql_values().unwrap()
        );
    }

    let mut row = RawRow::new();
    row.insert("meta".to_string(), Value::from(r#""hello""#));
    let record = Record::from_row(schema.clone(), row);
    assert_eq!(record.to_json().unwrap(), r#"{"id":null,"meta":"hello"}"#);
    assert_eq!(
        Record::from_json(schema, r#"{"id":null,"meta":"hello"}"#)
            .unwrap()
            .get("meta")
            .unwrap(),
        &Value::Json(serde_json::json!("hello"))
    );
}

#[test]
fn zero_identity_follows_the_schema_policy() {
    let falsy = users_schema();
    let record = Record::from_row(falsy, user_row(0, "Marcus", 40));
    assert!(record.is_temp());

    let null_only = RecordSchema::builder("Counter")
        .field("id", FieldKind::Integer)
        .temp_identity(TempIdentity::NullOnly)
        .build()
        .unwrap();
    let mut record = Record::new(null_only);
    assert!(record.is_temp());
    record.assign_identity(0).unwrap();
    assert!(!record.is_temp());
}

#[test]
fn nulling_a_loaded_identity_makes_the_record_temp() {
    let mut record = Record::from_row(users_schema(), user_row(5, "Marcus", 40));
    record.set("id", Value::Null).unwrap();
    assert!(record.is_temp());
}

#[test]
fn deletion_flag_round_trips() {
    let mut record = Record::from_row(users_schema(), user_row(5, "Marcus", 40));
    assert!(!record.is_marked_for_deletion());
    record.mark_for_deletion(true);
    assert!(record.is_marked_for_deletion());
    record.mark_for_deletion(false);
    assert!(!record.is_marked_for_deletion());
}
