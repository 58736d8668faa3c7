use serde_json::{json, Value};
use varmeta_core::constraint::{MinValueConstraint, RegexConstraint};
use varmeta_core::db::open_db_in_memory;
use varmeta_core::entity::{category, category_set, variable};
use varmeta_core::{
    CategoricalVariableRequest, DataMap, DataType, LabelRequest, StoreError,
};

fn data(value: Value) -> DataMap {
    match value {
        Value::Object(map) => map,
        _ => panic!("payload literals must be objects"),
    }
}

#[test]
fn nominal_variables_require_a_category_set() {
    let conn = open_db_in_memory().unwrap();

    let err = variable::create(&conn, &data(json!({"name": "gender", "data_type": "nominal"})))
        .unwrap_err();
    match err {
        StoreError::Validation(result) => {
            assert_eq!(result.errors()[0].field, "category_set");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn create_categorical_builds_the_set_and_its_members() {
    let conn = open_db_in_memory().unwrap();

    let created = variable::create_categorical(
        &conn,
        &CategoricalVariableRequest {
            name: "gender".to_string(),
            data_type: DataType::Nominal,
            category_names: vec![
                "male".to_string(),
                "female".to_string(),
                "other".to_string(),
            ],
            description: Some("Gender of respondent".to_string()),
            reference: None,
        },
    )
    .unwrap();

    let set = category_set::get_by_name(&conn, "gender").unwrap().unwrap();
    assert_eq!(created.category_set_id, Some(set.id));
    assert_eq!(created.description.as_deref(), Some("Gender of respondent"));

    let members = category_set::categories(&conn, set.id).unwrap();
    let names: Vec<&str> = members.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["male", "female", "other"]);

    let err = variable::create_categorical(
        &conn,
        &CategoricalVariableRequest {
            name: "weight".to_string(),
            data_type: DataType::Continuous,
            category_names: vec!["light".to_string()],
            description: None,
            reference: None,
        },
    )
    .unwrap_err();
    assert!(matches!(err, StoreError::Usage(_)));
}

#[test]
fn variable_labels_attach_detach_and_guard_ownership() {
    let conn = open_db_in_memory().unwrap();
    let created =
        variable::create(&conn, &data(json!({"name": "age", "data_type": "continuous"})))
            .unwrap();

    let english = variable::add_label(
        &conn,
        created.id,
        &LabelRequest {
            text: "Age".to_string(),
            language_code: Some("en".to_string()),
            ..LabelRequest::default()
        },
    )
    .unwrap();
    variable::add_label(
        &conn,
        created.id,
        &LabelRequest {
            text: "Alter".to_string(),
            language_code: Some("de".to_string()),
            purpose: Some("short".to_string()),
            ..LabelRequest::default()
        },
    )
    .unwrap();

    let labels = variable::labels(&conn, created.id).unwrap();
    assert_eq!(labels.len(), 2);
    assert_eq!(labels[0].text, "Age");

    // A label needs some language information.
    let err = variable::add_label(
        &conn,
        created.id,
        &LabelRequest {
            text: "Anonymous".to_string(),
            ..LabelRequest::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, StoreError::Usage(_)));

    // Labels of another owner are refused.
    let other =
        variable::create(&conn, &data(json!({"name": "income", "data_type": "continuous"})))
            .unwrap();
    let err = variable::remove_label(&conn, other.id, english.id).unwrap_err();
    assert!(matches!(err, StoreError::Usage(_)));

    variable::remove_label(&conn, created.id, english.id).unwrap();
    assert_eq!(variable::labels(&conn, created.id).unwrap().len(), 1);

    // Removing an already-gone label is a no-op.
    variable::remove_label(&conn, created.id, english.id).unwrap();
}

#[test]
fn duplicate_labels_are_rejected_by_the_store() {
    let conn = open_db_in_memory().unwrap();
    let created =
        variable::create(&conn, &data(json!({"name": "age", "data_type": "continuous"})))
            .unwrap();

    let request = LabelRequest {
        text: "Age".to_string(),
        language_code: Some("en".to_string()),
        ..LabelRequest::default()
    };
    variable::add_label(&conn, created.id, &request).unwrap();
    let err = variable::add_label(&conn, created.id, &request).unwrap_err();
    assert!(matches!(err, StoreError::Constraint(_)));
}

#[test]
fn constraint_rows_round_trip_through_the_registry() {
    let conn = open_db_in_memory().unwrap();
    let created =
        variable::create(&conn, &data(json!({"name": "age", "data_type": "discrete"})))
            .unwrap();

    variable::add_constraint(&conn, created.id, &MinValueConstraint::new(10)).unwrap();
    variable::add_constraint(
        &conn,
        created.id,
        &RegexConstraint::new("[0-9]+").unwrap(),
    )
    .unwrap();

    let constraints = variable::constraints(&conn, created.id).unwrap();
    assert_eq!(constraints.len(), 2);
    assert!(constraints[0].validate(&json!(10)));
    assert!(constraints[0].validate(&json!("10")));
    assert!(!constraints[0].validate(&json!(9)));
    assert!(!constraints[0].validate(&json!("abc")));

    let removed = variable::remove_constraints(&conn, created.id, "min_value").unwrap();
    assert_eq!(removed, 1);
    let remaining = variable::constraints(&conn, created.id).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(
        remaining[0].to_representation().get("type"),
        Some(&json!("regex"))
    );

    assert_eq!(
        variable::remove_constraints(&conn, created.id, "min_value").unwrap(),
        0
    );
}

#[test]
fn to_map_nests_labels_constraints_and_the_category_set() {
    let conn = open_db_in_memory().unwrap();
    let created = variable::create_categorical(
        &conn,
        &CategoricalVariableRequest {
            name: "gender".to_string(),
            data_type: DataType::Nominal,
            category_names: vec!["male".to_string(), "female".to_string()],
            description: None,
            reference: None,
        },
    )
    .unwrap();

    variable::add_label(
        &conn,
        created.id,
        &LabelRequest {
            text: "Gender".to_string(),
            language_code: Some("en".to_string()),
            ..LabelRequest::default()
        },
    )
    .unwrap();

    let set_id = created.category_set_id.unwrap();
    let male = category_set::category_by_name(&conn, set_id, "male")
        .unwrap()
        .unwrap();
    category::add_label(
        &conn,
        male.id,
        &LabelRequest {
            text: "Male".to_string(),
            language_code: Some("en".to_string()),
            ..LabelRequest::default()
        },
    )
    .unwrap();

    let map = variable::to_map(&conn, &created).unwrap();
    assert_eq!(map.get("name"), Some(&json!("gender")));
    assert_eq!(map["labels"].as_array().unwrap().len(), 1);
    assert_eq!(map["constraints"].as_array().unwrap().len(), 0);

    let set_map = map["category_set"].as_object().unwrap();
    assert_eq!(set_map.get("name"), Some(&json!("gender")));
    let categories = set_map["categories"].as_array().unwrap();
    assert_eq!(categories.len(), 2);
    assert_eq!(categories[0]["labels"].as_array().unwrap().len(), 1);
}

#[test]
fn create_from_map_rebuilds_a_whole_variable() {
    let source_conn = open_db_in_memory().unwrap();
    let source = variable::create_categorical(
        &source_conn,
        &CategoricalVariableRequest {
            name: "gender".to_string(),
            data_type: DataType::Nominal,
            category_names: vec!["male".to_string(), "female".to_string()],
            description: Some("Gender of respondent".to_string()),
            reference: None,
        },
    )
    .unwrap();
    variable::add_label(
        &source_conn,
        source.id,
        &LabelRequest {
            text: "Gender".to_string(),
            language_code: Some("en".to_string()),
            ..LabelRequest::default()
        },
    )
    .unwrap();
    variable::add_constraint(&source_conn, source.id, &MinValueConstraint::new(0)).unwrap();
    let exported = variable::to_map(&source_conn, &source).unwrap();

    let target_conn = open_db_in_memory().unwrap();
    let imported = variable::create_from_map(&target_conn, &exported).unwrap();
    assert_eq!(imported.name, "gender");
    assert_eq!(imported.data_type, DataType::Nominal);
    assert_eq!(
        imported.description.as_deref(),
        Some("Gender of respondent")
    );

    let set = category_set::get_by_name(&target_conn, "gender")
        .unwrap()
        .unwrap();
    assert_eq!(imported.category_set_id, Some(set.id));
    assert_eq!(
        category_set::categories(&target_conn, set.id).unwrap().len(),
        2
    );
    assert_eq!(variable::labels(&target_conn, imported.id).unwrap().len(), 1);
    let constraints = variable::constraints(&target_conn, imported.id).unwrap();
    assert_eq!(constraints.len(), 1);
    assert_eq!(
        constraints[0].to_representation().get("type"),
        Some(&json!("min_value"))
    );
}

#[test]
fn create_from_map_reuses_an_existing_category_set() {
    let conn = open_db_in_memory().unwrap();
    let existing = category_set::create_with_categories(
        &conn,
        "gender",
        &["male".to_string(), "female".to_string()],
    )
    .unwrap();

    let imported = variable::create_from_map(
        &conn,
        &data(json!({
            "name": "respondent_gender",
            "data_type": "nominal",
            "category_set": {
                "name": "gender",
                "categories": [{"name": "male"}, {"name": "female"}]
            }
        })),
    )
    .unwrap();

    assert_eq!(imported.category_set_id, Some(existing.id));
    assert_eq!(category_set::list_all(&conn).unwrap().len(), 1);
}

#[test]
fn create_from_map_rejects_invalid_nested_payloads() {
    let conn = open_db_in_memory().unwrap();

    let err = variable::create_from_map(
        &conn,
        &data(json!({
            "name": "gender",
            "data_type": "nominal",
            "category_set": {
                "name": "gender",
                "categories": [{"name": "Male"}]
            }
        })),
    )
    .unwrap_err();
    match err {
        StoreError::Validation(result) => {
            assert_eq!(
                result.errors()[0].field,
                "category_set.categories[0].name"
            );
        }
        other => panic!("unexpected error: {other}"),
    }

    // Nothing was created for the invalid payload.
    assert!(category_set::list_all(&conn).unwrap().is_empty());
    assert!(variable::list_all(&conn).unwrap().is_empty());
}

#[test]
fn category_set_membership_is_managed_and_guarded() {
    let conn = open_db_in_memory().unwrap();
    let set = category_set::create_with_categories(
        &conn,
        "colors",
        &["red".to_string(), "blue".to_string()],
    )
    .unwrap();

    let green = category_set::add_category(&conn, set.id, "green").unwrap();
    assert_eq!(category_set::categories(&conn, set.id).unwrap().len(), 3);

    // Duplicate member names within one set are rejected by the store.
    let err = category_set::add_category(&conn, set.id, "green").unwrap_err();
    assert!(matches!(err, StoreError::Constraint(_)));

    let other = category_set::create(&conn, &data(json!({"name": "shapes"}))).unwrap();
    let err = category_set::remove_category(&conn, other.id, green.id).unwrap_err();
    assert!(matches!(err, StoreError::Usage(_)));

    category_set::remove_category(&conn, set.id, green.id).unwrap();
    assert_eq!(category_set::categories(&conn, set.id).unwrap().len(), 2);
    // Removing a missing category is a no-op.
    category_set::remove_category(&conn, set.id, green.id).unwrap();
}

#[test]
fn deleting_a_set_cascades_to_categories_but_respects_variables() {
    let conn = open_db_in_memory().unwrap();

    let unused = category_set::create_with_categories(
        &conn,
        "scratch",
        &["a".to_string(), "b".to_string()],
    )
    .unwrap();
    let members = category_set::categories(&conn, unused.id).unwrap();
    category_set::delete(&conn, unused.id).unwrap();
    assert!(category::get(&conn, members[0].id).unwrap().is_none());

    // A set referenced by a nominal variable cannot be deleted: the
    // SET NULL cascade would violate the variables CHECK.
    let used = variable::create_categorical(
        &conn,
        &CategoricalVariableRequest {
            name: "gender".to_string(),
            data_type: DataType::Nominal,
            category_names: vec!["male".to_string()],
            description: None,
            reference: None,
        },
    )
    .unwrap();
    let err = category_set::delete(&conn, used.category_set_id.unwrap()).unwrap_err();
    assert!(matches!(err, StoreError::Constraint(_)));
}

#[test]
fn category_names_are_validated_like_other_identifiers() {
    let conn = open_db_in_memory().unwrap();
    let set = category_set::create(&conn, &data(json!({"name": "colors"}))).unwrap();

    let err = category::create(
        &conn,
        &data(json!({"name": "Bright Red", "category_set_id": set.id})),
    )
    .unwrap_err();
    match err {
        StoreError::Validation(result) => assert_eq!(result.errors()[0].field, "name"),
        other => panic!("unexpected error: {other}"),
    }

    let err = category::create(&conn, &data(json!({"name": "red"}))).unwrap_err();
    match err {
        StoreError::Validation(result) => {
            assert_eq!(result.errors()[0].field, "category_set_id");
        }
        other => panic!("unexpected error: {other}"),
    }
}
