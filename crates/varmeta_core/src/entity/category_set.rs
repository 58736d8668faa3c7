//! Category sets: named collections of categorical values.
//!
//! # Responsibility
//! - Describe the `category_sets` table and its typed read model.
//! - Provide set CRUD, member-category management and paginated listing.
//!
//! # Invariants
//! - Set names are unique store-wide (schema UNIQUE).
//! - Removing a set cascades to its categories.

use crate::entity::category::{self, Category};
use crate::entity::{check_categories_value, check_name_field, is_present};
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
    table: "category_sets",
    id_column: "id",
    columns: &["name"],
    validator: Some(validate),
    search_columns: &["name"],
};

/// Structural validator for category set payloads, including inline
/// category lists.
pub fn validate(data: &DataMap) -> ValidationResult {
    let mut result = ValidationResult::new();

    check_name_field(&mut result, data, "name", "Name");

    if let Some(categories) = data.get("categories") {
        if is_present(Some(categories)) {
            check_categories_value(&mut result, "categories", categories);
        }
    }

    result
}

/// One persisted category set row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySet {
    pub id: i64,
    pub name: String,
}

impl CategorySet {
    pub fn from_record(record: &Record) -> StoreResult<Self> {
        let id = record.id().ok_or_else(|| {
            StoreError::InvalidData("category set record has no id".to_string())
        })?;
        let name = record
            .get("name")
            .and_then(FieldValue::as_str)
            .ok_or_else(|| {
                StoreError::InvalidData("missing name in category_sets.name".to_string())
            })?
            .to_string();
        Ok(Self { id, name })
    }
}

/// Validates and creates one category set.
pub fn create(conn: &Connection, data: &DataMap) -> StoreResult<CategorySet> {
    let record = RecordMapper::new(conn, &DESCRIPTOR).create(data)?;
    CategorySet::from_record(&record)
}

/// Creates a set and one category per name, in input order.
pub fn create_with_categories(
    conn: &Connection,
    name: &str,
    category_names: &[String],
) -> StoreResult<CategorySet> {
    let mut data = DataMap::new();
    data.insert("name".to_string(), Value::from(name));
    let set = create(conn, &data)?;

    for category_name in category_names {
        let mut category_data = DataMap::new();
        category_data.insert("name".to_string(), Value::from(category_name.as_str()));
        category_data.insert("category_set_id".to_string(), Value::from(set.id));
        category::create(conn, &category_data)?;
    }

    Ok(set)
}

pub fn get(conn: &Connection, id: i64) -> StoreResult<Option<CategorySet>> {
    match RecordMapper::new(conn, &DESCRIPTOR).get(id)? {
        Some(record) => Ok(Some(CategorySet::from_record(&record)?)),
        None => Ok(None),
    }
}

pub fn get_by_name(conn: &Connection, name: &str) -> StoreResult<Option<CategorySet>> {
    match RecordMapper::new(conn, &DESCRIPTOR).get_by("name", &FieldValue::from(name))? {
        Some(record) => Ok(Some(CategorySet::from_record(&record)?)),
        None => Ok(None),
    }
}

pub fn list_all(conn: &Connection) -> StoreResult<Vec<CategorySet>> {
    let records = RecordMapper::new(conn, &DESCRIPTOR).get_all()?;
    records.iter().map(CategorySet::from_record).collect()
}

pub fn update(conn: &Connection, id: i64, data: &DataMap) -> StoreResult<CategorySet> {
    let record = RecordMapper::new(conn, &DESCRIPTOR).update(id, data)?;
    CategorySet::from_record(&record)
}

pub fn delete(conn: &Connection, id: i64) -> StoreResult<()> {
    RecordMapper::new(conn, &DESCRIPTOR).delete(id)
}

/// Member categories of one set, in insertion order.
pub fn categories(conn: &Connection, set_id: i64) -> StoreResult<Vec<Category>> {
    category::for_set(conn, set_id)
}

pub fn add_category(conn: &Connection, set_id: i64, name: &str) -> StoreResult<Category> {
    let mut data = DataMap::new();
    data.insert("name".to_string(), Value::from(name));
    data.insert("category_set_id".to_string(), Value::from(set_id));
    category::create(conn, &data)
}

/// Removes one member category. A missing category is a no-op; a category
/// of another set is a usage error.
pub fn remove_category(conn: &Connection, set_id: i64, category_id: i64) -> StoreResult<()> {
    let Some(found) = category::get(conn, category_id)? else {
        return Ok(());
    };
    if found.category_set_id != set_id {
        return Err(StoreError::Usage(
            "category does not belong to this category set".to_string(),
        ));
    }
    category::delete(conn, category_id)
}

pub fn category_by_name(
    conn: &Connection,
    set_id: i64,
    name: &str,
) -> StoreResult<Option<Category>> {
    category::get_by_name(conn, set_id, name)
}

/// Set plus its categories (each with labels), for export collaborators.
pub fn to_map(conn: &Connection, set: &CategorySet) -> StoreResult<DataMap> {
    let mut map = DataMap::new();
    map.insert("id".to_string(), Value::from(set.id));
    map.insert("name".to_string(), Value::from(set.name.as_str()));
    let mut entries = Vec::new();
    for member in categories(conn, set.id)? {
        entries.push(Value::Object(category::to_map(conn, &member)?));
    }
    map.insert("categories".to_string(), Value::Array(entries));
    Ok(map)
}

/// Paginated category set listing.
pub fn paginate(conn: &Connection, query: &PageQuery) -> StoreResult<(Vec<CategorySet>, u64)> {
    let (records, total) = RecordMapper::new(conn, &DESCRIPTOR).paginate(query)?;
    let sets = records
        .iter()
        .map(CategorySet::from_record)
        .collect::<StoreResult<Vec<_>>>()?;
    Ok((sets, total))
}

/// Bulk-creates category sets from `{name, category_names}` payloads on a
/// fresh connection.
pub fn bulk_create(
    store: &Store,
    items: &[DataMap],
    stop_on_error: bool,
) -> StoreResult<BulkOutcome<CategorySet>> {
    let conn = store.fresh_connection()?;
    BulkExecutor::new(&conn, &DESCRIPTOR).bulk_apply(items, stop_on_error, |conn, item| {
        let name = item.get("name").and_then(Value::as_str).unwrap_or_default();
        let category_names = string_list(item.get("category_names"));
        create_with_categories(conn, name, &category_names)
    })
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
