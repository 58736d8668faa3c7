//! Categories: the member values of one category set.
//!
//! # Responsibility
//! - Describe the `categories` table and its typed read model.
//! - Provide category CRUD, label attachment and paginated listing.
//!
//! # Invariants
//! - Category names are unique within their set (schema UNIQUE).
//! - Deleting a category set cascades to its categories.

use crate::entity::label::{self, Label, LabelOwner, LabelRequest};
use crate::entity::{check_labels_value, check_name_field, is_present};
use crate::store::bulk::{BulkExecutor, BulkOutcome};
use crate::store::descriptor::EntityDescriptor;
use crate::store::mapper::RecordMapper;
use crate::store::paginate::PageQuery;
use crate::store::record::Record;
use crate::store::value::{DataMap, FieldValue};
use crate::store::{Store, StoreError, StoreResult};
use crate::validate::ValidationResult;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;

pub static DESCRIPTOR: EntityDescriptor = EntityDescriptor {
    table: "categories",
    id_column: "id",
    columns: &["name", "category_set_id"],
    validator: Some(validate),
    search_columns: &["name"],
};

/// Structural validator for category payloads.
pub fn validate(data: &DataMap) -> ValidationResult {
    let mut result = ValidationResult::new();

    check_name_field(&mut result, data, "name", "Name");

    if !is_present(data.get("category_set_id")) {
        result.add_error("category_set_id", "Category set ID is required");
    }

    if let Some(labels) = data.get("labels") {
        if is_present(Some(labels)) {
            check_labels_value(&mut result, "labels", labels);
        }
    }

    result
}

/// One persisted category row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub category_set_id: i64,
}

impl Category {
    pub fn from_record(record: &Record) -> StoreResult<Self> {
        let id = record
            .id()
            .ok_or_else(|| StoreError::InvalidData("category record has no id".to_string()))?;
        let name = record
            .get("name")
            .and_then(FieldValue::as_str)
            .ok_or_else(|| {
                StoreError::InvalidData("missing name in categories.name".to_string())
            })?
            .to_string();
        let category_set_id = record
            .get("category_set_id")
            .and_then(FieldValue::as_i64)
            .ok_or_else(|| {
                StoreError::InvalidData(
                    "missing set id in categories.category_set_id".to_string(),
                )
            })?;
        Ok(Self {
            id,
            name,
            category_set_id,
        })
    }
}

/// Validates and creates one category.
pub fn create(conn: &Connection, data: &DataMap) -> StoreResult<Category> {
    let record = RecordMapper::new(conn, &DESCRIPTOR).create(data)?;
    Category::from_record(&record)
}

pub fn get(conn: &Connection, id: i64) -> StoreResult<Option<Category>> {
    match RecordMapper::new(conn, &DESCRIPTOR).get(id)? {
        Some(record) => Ok(Some(Category::from_record(&record)?)),
        None => Ok(None),
    }
}

/// All categories of one set, in insertion order.
pub fn for_set(conn: &Connection, category_set_id: i64) -> StoreResult<Vec<Category>> {
    let records = RecordMapper::new(conn, &DESCRIPTOR)
        .filter(&[("category_set_id", FieldValue::from(category_set_id))])?;
    records.iter().map(Category::from_record).collect()
}

/// Looks one category up by name within its set.
pub fn get_by_name(
    conn: &Connection,
    category_set_id: i64,
    name: &str,
) -> StoreResult<Option<Category>> {
    let records = RecordMapper::new(conn, &DESCRIPTOR).filter(&[
        ("name", FieldValue::from(name)),
        ("category_set_id", FieldValue::from(category_set_id)),
    ])?;
    match records.first() {
        Some(record) => Ok(Some(Category::from_record(record)?)),
        None => Ok(None),
    }
}

pub fn update(conn: &Connection, id: i64, data: &DataMap) -> StoreResult<Category> {
    let record = RecordMapper::new(conn, &DESCRIPTOR).update(id, data)?;
    Category::from_record(&record)
}

pub fn delete(conn: &Connection, id: i64) -> StoreResult<()> {
    RecordMapper::new(conn, &DESCRIPTOR).delete(id)
}

pub fn labels(conn: &Connection, category_id: i64) -> StoreResult<Vec<Label>> {
    label::for_entity(conn, LabelOwner::Category, category_id)
}

pub fn add_label(
    conn: &Connection,
    category_id: i64,
    request: &LabelRequest,
) -> StoreResult<Label> {
    label::create_for_entity(conn, LabelOwner::Category, category_id, request)
}

/// Detaches one label. A missing label is a no-op; a label owned by another
/// entity is a usage error.
pub fn remove_label(conn: &Connection, category_id: i64, label_id: i64) -> StoreResult<()> {
    let Some(found) = label::get(conn, label_id)? else {
        return Ok(());
    };
    if found.owner != LabelOwner::Category || found.entity_id != category_id {
        return Err(StoreError::Usage(
            "label does not belong to this category".to_string(),
        ));
    }
    label::delete(conn, label_id)
}

/// Category plus its labels, for export collaborators.
pub fn to_map(conn: &Connection, category: &Category) -> StoreResult<DataMap> {
    let mut map = DataMap::new();
    map.insert("id".to_string(), Value::from(category.id));
    map.insert("name".to_string(), Value::from(category.name.as_str()));
    map.insert(
        "category_set_id".to_string(),
        Value::from(category.category_set_id),
    );
    let labels = labels(conn, category.id)?
        .iter()
        .map(|item| Value::Object(item.to_map()))
        .collect();
    map.insert("labels".to_string(), Value::Array(labels));
    Ok(map)
}

/// Paginated category listing.
pub fn paginate(conn: &Connection, query: &PageQuery) -> StoreResult<(Vec<Category>, u64)> {
    let (records, total) = RecordMapper::new(conn, &DESCRIPTOR).paginate(query)?;
    let categories = records
        .iter()
        .map(Category::from_record)
        .collect::<StoreResult<Vec<_>>>()?;
    Ok((categories, total))
}

/// Bulk-creates categories, each with its optional inline labels, on a
/// fresh connection.
pub fn bulk_create(
    store: &Store,
    items: &[DataMap],
    stop_on_error: bool,
) -> StoreResult<BulkOutcome<Category>> {
    let conn = store.fresh_connection()?;
    BulkExecutor::new(&conn, &DESCRIPTOR).bulk_apply(items, stop_on_error, |conn, item| {
        let category = create(conn, item)?;
        if let Some(Value::Array(entries)) = item.get("labels") {
            for entry in entries {
                let request = LabelRequest::from_value(entry).ok_or_else(|| {
                    StoreError::Usage("label entries must be objects".to_string())
                })?;
                label::create_for_entity(conn, LabelOwner::Category, category.id, &request)?;
            }
        }
        Ok(category)
    })
}
