use serde_json::{json, Value};
use varmeta_core::db::open_db_in_memory;
use varmeta_core::entity::{category_set, variable};
use varmeta_core::store::{DataMap, FieldValue, RecordMapper, StoreError};

fn data(value: Value) -> DataMap {
    match value {
        Value::Object(map) => map,
        _ => panic!("payload literals must be objects"),
    }
}

#[test]
fn create_then_get_returns_equal_declared_columns() {
    let conn = open_db_in_memory().unwrap();
    let mapper = RecordMapper::new(&conn, &variable::DESCRIPTOR);

    let created = mapper
        .create(&data(json!({
            "name": "age",
            "data_type": "continuous",
            "description": "Age in years"
        })))
        .unwrap();
    let id = created.id().unwrap();

    let loaded = mapper.get(id).unwrap().unwrap();
    assert_eq!(loaded.get("name"), Some(&FieldValue::from("age")));
    assert_eq!(loaded.get("data_type"), Some(&FieldValue::from("continuous")));
    assert_eq!(
        loaded.get("description"),
        Some(&FieldValue::from("Age in years"))
    );
    assert_eq!(loaded.get("reference"), Some(&FieldValue::Null));
    assert_eq!(loaded.get("category_set_id"), Some(&FieldValue::Null));
    assert_eq!(loaded, created);
}

#[test]
fn to_map_create_to_map_is_idempotent_except_id() {
    let first_conn = open_db_in_memory().unwrap();
    let first = RecordMapper::new(&first_conn, &variable::DESCRIPTOR)
        .create(&data(json!({
            "name": "income",
            "data_type": "continuous",
            "description": "Monthly income",
            "reference": "survey q7"
        })))
        .unwrap();
    let exported = first.to_map();

    let second_conn = open_db_in_memory().unwrap();
    let second = RecordMapper::new(&second_conn, &variable::DESCRIPTOR)
        .create(&exported)
        .unwrap();
    let reexported = second.to_map();

    for (key, value) in &exported {
        if key == "id" {
            continue;
        }
        assert_eq!(reexported.get(key), Some(value), "field `{key}` changed");
    }
}

#[test]
fn get_and_get_by_return_none_for_missing_rows() {
    let conn = open_db_in_memory().unwrap();
    let mapper = RecordMapper::new(&conn, &variable::DESCRIPTOR);

    assert!(mapper.get(42).unwrap().is_none());
    assert!(mapper
        .get_by("name", &FieldValue::from("ghost"))
        .unwrap()
        .is_none());
}

#[test]
fn get_by_rejects_undeclared_columns() {
    let conn = open_db_in_memory().unwrap();
    let mapper = RecordMapper::new(&conn, &variable::DESCRIPTOR);

    let err = mapper
        .get_by("created_at", &FieldValue::from("x"))
        .unwrap_err();
    assert!(matches!(err, StoreError::Usage(_)));
}

#[test]
fn filter_is_an_exact_match_conjunction() {
    let conn = open_db_in_memory().unwrap();
    let mapper = RecordMapper::new(&conn, &variable::DESCRIPTOR);

    for (name, data_type) in [
        ("age", "continuous"),
        ("income", "continuous"),
        ("notes", "text"),
    ] {
        mapper
            .create(&data(json!({"name": name, "data_type": data_type})))
            .unwrap();
    }

    let continuous = mapper
        .filter(&[("data_type", FieldValue::from("continuous"))])
        .unwrap();
    assert_eq!(continuous.len(), 2);

    let narrowed = mapper
        .filter(&[
            ("data_type", FieldValue::from("continuous")),
            ("name", FieldValue::from("income")),
        ])
        .unwrap();
    assert_eq!(narrowed.len(), 1);
    assert_eq!(narrowed[0].get("name"), Some(&FieldValue::from("income")));

    assert_eq!(mapper.get_all().unwrap().len(), 3);
    assert_eq!(mapper.count(&[]).unwrap(), 3);
}

#[test]
fn unknown_payload_keys_are_silently_dropped() {
    let conn = open_db_in_memory().unwrap();
    let mapper = RecordMapper::new(&conn, &variable::DESCRIPTOR);

    let record = mapper
        .create(&data(json!({
            "name": "age",
            "data_type": "discrete",
            "bogus": "ignored",
            "labels": [{"text": "Age", "language_code": "en"}]
        })))
        .unwrap();

    assert_eq!(record.get("bogus"), None);
    assert_eq!(record.get("labels"), None);
    let map = record.to_map();
    assert!(!map.contains_key("bogus"));
}

#[test]
fn update_overwrites_only_supplied_columns_and_never_the_id() {
    let conn = open_db_in_memory().unwrap();
    let mapper = RecordMapper::new(&conn, &variable::DESCRIPTOR);

    let created = mapper
        .create(&data(json!({
            "name": "age",
            "data_type": "continuous",
            "description": "before"
        })))
        .unwrap();
    let id = created.id().unwrap();

    let updated = mapper
        .update(id, &data(json!({"description": "after", "id": 999, "bogus": 1})))
        .unwrap();
    assert_eq!(updated.id(), Some(id));
    assert_eq!(updated.get("name"), Some(&FieldValue::from("age")));
    assert_eq!(updated.get("description"), Some(&FieldValue::from("after")));

    // A payload with no declared columns is a no-op returning current state.
    let untouched = mapper.update(id, &data(json!({"bogus": 1}))).unwrap();
    assert_eq!(untouched, updated);
}

#[test]
fn update_validates_the_merged_view() {
    let conn = open_db_in_memory().unwrap();
    let mapper = RecordMapper::new(&conn, &variable::DESCRIPTOR);

    let created = mapper
        .create(&data(json!({"name": "age", "data_type": "continuous"})))
        .unwrap();
    let id = created.id().unwrap();

    let err = mapper.update(id, &data(json!({"name": "Age"}))).unwrap_err();
    match err {
        StoreError::Validation(result) => {
            assert_eq!(result.errors()[0].field, "name");
        }
        other => panic!("unexpected error: {other}"),
    }

    // Partial updates that keep the merged view valid go through.
    let set = category_set::create_with_categories(
        &conn,
        "levels",
        &["low".to_string(), "high".to_string()],
    )
    .unwrap();
    let nominal = mapper
        .create(&data(json!({
            "name": "level",
            "data_type": "nominal",
            "category_set_id": set.id
        })))
        .unwrap();
    let updated = mapper
        .update(
            nominal.id().unwrap(),
            &data(json!({"description": "ordered levels"})),
        )
        .unwrap();
    assert_eq!(
        updated.get("description"),
        Some(&FieldValue::from("ordered levels"))
    );
}

#[test]
fn update_and_delete_of_missing_rows_report_not_found() {
    let conn = open_db_in_memory().unwrap();
    let mapper = RecordMapper::new(&conn, &variable::DESCRIPTOR);

    let err = mapper
        .update(4242, &data(json!({"description": "x"})))
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { id: 4242, .. }));

    let created = mapper
        .create(&data(json!({"name": "age", "data_type": "discrete"})))
        .unwrap();
    let id = created.id().unwrap();
    mapper.delete(id).unwrap();
    assert!(mapper.get(id).unwrap().is_none());

    let err = mapper.delete(id).unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[test]
fn store_level_rejections_surface_as_constraint_errors() {
    let conn = open_db_in_memory().unwrap();
    let mapper = RecordMapper::new(&conn, &variable::DESCRIPTOR);

    mapper
        .create(&data(json!({"name": "age", "data_type": "discrete"})))
        .unwrap();
    let duplicate = mapper
        .create(&data(json!({"name": "age", "data_type": "text"})))
        .unwrap_err();
    assert!(matches!(duplicate, StoreError::Constraint(_)));

    // The validator only warns about a stray category set, but the schema
    // CHECK rejects it.
    let check = mapper
        .create(&data(json!({
            "name": "height",
            "data_type": "continuous",
            "category_set_id": 12345
        })))
        .unwrap_err();
    assert!(matches!(check, StoreError::Constraint(_)));

    let invalid = mapper
        .create(&data(json!({"name": "", "data_type": "discrete"})))
        .unwrap_err();
    assert!(matches!(invalid, StoreError::Validation(_)));
}
