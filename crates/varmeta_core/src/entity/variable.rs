//! Variables: column metadata for tabular datasets.
//!
//! # Responsibility
//! - Describe the `variables` table and its typed read model.
//! - Provide variable CRUD, categorical creation, label and constraint
//!   attachment, nested export maps and paginated listing.
//!
//! # Invariants
//! - Variable names are unique store-wide (schema UNIQUE).
//! - Categorical kinds (nominal, ordinal) always reference a category set;
//!   other kinds never do (schema CHECK mirrors the validator).
//! - Constraint rows hold registry representations as JSON text.

use crate::constraint::{constraint_from_representation, Constraint};
use crate::entity::label::{self, Label, LabelOwner, LabelRequest};
use crate::entity::{
    check_categories_value, check_labels_value, check_name_field, is_present,
};
use crate::entity::category_set::{self, CategorySet};
use crate::store::bulk::{BulkExecutor, BulkOutcome};
use crate::store::descriptor::EntityDescriptor;
use crate::store::mapper::RecordMapper;
use crate::store::paginate::PageQuery;
use crate::store::record::Record;
use crate::store::value::{DataMap, FieldValue};
use crate::store::{Store, StoreError, StoreResult};
use crate::validate::ValidationResult;
use rusqlite::{params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub static DESCRIPTOR: EntityDescriptor = EntityDescriptor {
    table: "variables",
    id_column: "id",
    columns: &[
        "name",
        "data_type",
        "category_set_id",
        "description",
        "reference",
    ],
    validator: Some(validate),
    search_columns: &["name", "description"],
};

/// The valid data type tags, in canonical order.
pub const DATA_TYPES: &[&str] = &["discrete", "continuous", "nominal", "ordinal", "text"];

/// Measurement kind of one variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Discrete,
    Continuous,
    Nominal,
    Ordinal,
    Text,
}

impl DataType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discrete => "discrete",
            Self::Continuous => "continuous",
            Self::Nominal => "nominal",
            Self::Ordinal => "ordinal",
            Self::Text => "text",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "discrete" => Some(Self::Discrete),
            "continuous" => Some(Self::Continuous),
            "nominal" => Some(Self::Nominal),
            "ordinal" => Some(Self::Ordinal),
            "text" => Some(Self::Text),
            _ => None,
        }
    }

    /// Whether values of this kind come from a category set.
    pub fn is_categorical(self) -> bool {
        matches!(self, Self::Nominal | Self::Ordinal)
    }
}

/// Structural validator for variable payloads, including inline category
/// sets, labels and constraint declarations.
pub fn validate(data: &DataMap) -> ValidationResult {
    let mut result = ValidationResult::new();

    check_name_field(&mut result, data, "name", "Name");

    let data_type_value = data.get("data_type");
    if !is_present(data_type_value) {
        result.add_error("data_type", "Data type is required");
    } else if data_type_value
        .and_then(Value::as_str)
        .and_then(DataType::parse)
        .is_none()
    {
        result.add_error(
            "data_type",
            format!("Data type must be one of {}", DATA_TYPES.join(", ")),
        );
    }

    if let Some(tag) = data_type_value.and_then(Value::as_str).filter(|s| !s.is_empty()) {
        let categorical = DataType::parse(tag).is_some_and(DataType::is_categorical);
        let has_set_id = is_present(data.get("category_set_id"));
        let has_inline_set = is_present(data.get("category_set"));
        if categorical && !has_set_id && !has_inline_set {
            result.add_error(
                "category_set",
                format!("Category set is required for {tag} variables"),
            );
        } else if !categorical && (has_set_id || has_inline_set) {
            result.add_warning(
                "category_set",
                format!("Category set is not needed for {tag} variables"),
            );
        }
    }

    if let Some(inline_set) = data.get("category_set") {
        if is_present(Some(inline_set)) {
            check_inline_category_set(&mut result, inline_set);
        }
    }

    if let Some(labels) = data.get("labels") {
        if is_present(Some(labels)) {
            check_labels_value(&mut result, "labels", labels);
        }
    }

    if let Some(constraints) = data.get("constraints") {
        if is_present(Some(constraints)) {
            check_constraint_declarations(&mut result, constraints);
        }
    }

    result
}

fn check_inline_category_set(result: &mut ValidationResult, value: &Value) {
    let Value::Object(set) = value else {
        result.add_error("category_set", "Category set must be an object");
        return;
    };

    check_name_field(result, set, "category_set.name", "Category set name");

    let categories = set.get("categories");
    if !is_present(categories) {
        result.add_error(
            "category_set.categories",
            "Categories are required for a category set",
        );
    } else if let Some(categories) = categories {
        check_categories_value(result, "category_set.categories", categories);
    }
}

fn check_constraint_declarations(result: &mut ValidationResult, value: &Value) {
    let Value::Array(items) = value else {
        result.add_error("constraints", "Constraints must be a list");
        return;
    };

    for (index, item) in items.iter().enumerate() {
        let Value::Object(declaration) = item else {
            result.add_error(format!("constraints[{index}]"), "Constraint must be an object");
            continue;
        };

        if !is_present(declaration.get("type")) {
            result.add_error(
                format!("constraints[{index}].type"),
                "Constraint type is required",
            );
        }

        match declaration.get("type").and_then(Value::as_str) {
            Some("range") => {
                if !declaration.contains_key("min") && !declaration.contains_key("max") {
                    result.add_error(
                        format!("constraints[{index}]"),
                        "Range constraint must have at least one of `min` or `max`",
                    );
                }
            }
            Some("regex") => {
                if !is_present(declaration.get("pattern")) {
                    result.add_error(
                        format!("constraints[{index}].pattern"),
                        "Regex constraint must have a pattern",
                    );
                }
            }
            Some("enum") => {
                let values = declaration.get("values");
                if !is_present(values) {
                    result.add_error(
                        format!("constraints[{index}].values"),
                        "Enum constraint must have values",
                    );
                } else if !matches!(values, Some(Value::Array(_))) {
                    result.add_error(
                        format!("constraints[{index}].values"),
                        "Enum constraint values must be a list",
                    );
                }
            }
            Some(other) if !other.is_empty() => {
                result.add_warning(
                    format!("constraints[{index}].type"),
                    format!("Unknown constraint type: {other}"),
                );
            }
            _ => {}
        }
    }
}

/// One persisted variable row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variable {
    pub id: i64,
    pub name: String,
    pub data_type: DataType,
    pub category_set_id: Option<i64>,
    pub description: Option<String>,
    pub reference: Option<String>,
}

impl Variable {
    pub fn from_record(record: &Record) -> StoreResult<Self> {
        let id = record
            .id()
            .ok_or_else(|| StoreError::InvalidData("variable record has no id".to_string()))?;
        let name = record
            .get("name")
            .and_then(FieldValue::as_str)
            .ok_or_else(|| StoreError::InvalidData("missing name in variables.name".to_string()))?
            .to_string();
        let tag = record
            .get("data_type")
            .and_then(FieldValue::as_str)
            .unwrap_or_default();
        let data_type = DataType::parse(tag).ok_or_else(|| {
            StoreError::InvalidData(format!(
                "invalid data type `{tag}` in variables.data_type"
            ))
        })?;

        Ok(Self {
            id,
            name,
            data_type,
            category_set_id: record.get("category_set_id").and_then(FieldValue::as_i64),
            description: field_text(record, "description"),
            reference: field_text(record, "reference"),
        })
    }
}

/// Validates and creates one variable.
pub fn create(conn: &Connection, data: &DataMap) -> StoreResult<Variable> {
    let record = RecordMapper::new(conn, &DESCRIPTOR).create(data)?;
    Variable::from_record(&record)
}

pub fn get(conn: &Connection, id: i64) -> StoreResult<Option<Variable>> {
    match RecordMapper::new(conn, &DESCRIPTOR).get(id)? {
        Some(record) => Ok(Some(Variable::from_record(&record)?)),
        None => Ok(None),
    }
}

pub fn get_by_name(conn: &Connection, name: &str) -> StoreResult<Option<Variable>> {
    match RecordMapper::new(conn, &DESCRIPTOR).get_by("name", &FieldValue::from(name))? {
        Some(record) => Ok(Some(Variable::from_record(&record)?)),
        None => Ok(None),
    }
}

pub fn list_all(conn: &Connection) -> StoreResult<Vec<Variable>> {
    let records = RecordMapper::new(conn, &DESCRIPTOR).get_all()?;
    records.iter().map(Variable::from_record).collect()
}

/// Overwrites the supplied columns; the merged view must stay valid.
pub fn update(conn: &Connection, id: i64, data: &DataMap) -> StoreResult<Variable> {
    let record = RecordMapper::new(conn, &DESCRIPTOR).update(id, data)?;
    Variable::from_record(&record)
}

pub fn delete(conn: &Connection, id: i64) -> StoreResult<()> {
    RecordMapper::new(conn, &DESCRIPTOR).delete(id)
}

/// Request model for creating a categorical variable together with its
/// category set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoricalVariableRequest {
    pub name: String,
    pub data_type: DataType,
    pub category_names: Vec<String>,
    pub description: Option<String>,
    pub reference: Option<String>,
}

/// Creates a category set named after the variable plus the variable
/// itself.
///
/// The data type must be categorical.
pub fn create_categorical(
    conn: &Connection,
    request: &CategoricalVariableRequest,
) -> StoreResult<Variable> {
    if !request.data_type.is_categorical() {
        return Err(StoreError::Usage(format!(
            "data type must be nominal or ordinal for categorical variables, got {}",
            request.data_type.as_str()
        )));
    }

    let set = category_set::create_with_categories(conn, &request.name, &request.category_names)?;

    let mut data = DataMap::new();
    data.insert("name".to_string(), Value::from(request.name.as_str()));
    data.insert(
        "data_type".to_string(),
        Value::from(request.data_type.as_str()),
    );
    data.insert("category_set_id".to_string(), Value::from(set.id));
    data.insert("description".to_string(), optional(&request.description));
    data.insert("reference".to_string(), optional(&request.reference));
    create(conn, &data)
}

/// Creates one variable from a nested payload map (the shape produced by
/// [`to_map`]): resolves or creates the inline category set, then attaches
/// inline labels and constraints.
///
/// Used by import collaborators handing whole-entity maps back to the core.
pub fn create_from_map(conn: &Connection, data: &DataMap) -> StoreResult<Variable> {
    let result = validate(data);
    if !result.is_valid() {
        return Err(StoreError::Validation(result));
    }

    let mut payload = DataMap::new();
    for key in ["name", "data_type", "description", "reference"] {
        if let Some(value) = data.get(key) {
            payload.insert(key.to_string(), value.clone());
        }
    }
    if let Some(id) = data.get("category_set_id").and_then(Value::as_i64) {
        payload.insert("category_set_id".to_string(), Value::from(id));
    }

    if let Some(Value::Object(inline_set)) = data.get("category_set") {
        let set = resolve_inline_category_set(conn, inline_set)?;
        payload.insert("category_set_id".to_string(), Value::from(set.id));
    }

    let variable = create(conn, &payload)?;

    if let Some(Value::Array(entries)) = data.get("labels") {
        for entry in entries {
            let request = LabelRequest::from_value(entry)
                .ok_or_else(|| StoreError::Usage("label entries must be objects".to_string()))?;
            add_label(conn, variable.id, &request)?;
        }
    }

    if let Some(Value::Array(entries)) = data.get("constraints") {
        for entry in entries {
            let Value::Object(rep) = entry else {
                return Err(StoreError::Usage(
                    "constraint entries must be objects".to_string(),
                ));
            };
            let constraint = constraint_from_representation(rep)?;
            add_constraint(conn, variable.id, constraint.as_ref())?;
        }
    }

    Ok(variable)
}

fn resolve_inline_category_set(
    conn: &Connection,
    inline_set: &DataMap,
) -> StoreResult<CategorySet> {
    let name = inline_set
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if let Some(existing) = category_set::get_by_name(conn, name)? {
        return Ok(existing);
    }

    let entries = match inline_set.get("categories") {
        Some(Value::Array(entries)) => entries.as_slice(),
        _ => &[],
    };
    let names: Vec<String> = entries
        .iter()
        .filter_map(|entry| entry.get("name"))
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    let set = category_set::create_with_categories(conn, name, &names)?;

    for entry in entries {
        let Some(category_name) = entry.get("name").and_then(Value::as_str) else {
            continue;
        };
        let Some(member) = category_set::category_by_name(conn, set.id, category_name)? else {
            continue;
        };
        if let Some(Value::Array(label_entries)) = entry.get("labels") {
            for label_entry in label_entries {
                let request = LabelRequest::from_value(label_entry).ok_or_else(|| {
                    StoreError::Usage("label entries must be objects".to_string())
                })?;
                label::create_for_entity(conn, LabelOwner::Category, member.id, &request)?;
            }
        }
    }

    Ok(set)
}

pub fn labels(conn: &Connection, variable_id: i64) -> StoreResult<Vec<Label>> {
    label::for_entity(conn, LabelOwner::Variable, variable_id)
}

pub fn add_label(
    conn: &Connection,
    variable_id: i64,
    request: &LabelRequest,
) -> StoreResult<Label> {
    label::create_for_entity(conn, LabelOwner::Variable, variable_id, request)
}

/// Detaches one label. A missing label is a no-op; a label owned by another
/// entity is a usage error.
pub fn remove_label(conn: &Connection, variable_id: i64, label_id: i64) -> StoreResult<()> {
    let Some(found) = label::get(conn, label_id)? else {
        return Ok(());
    };
    if found.owner != LabelOwner::Variable || found.entity_id != variable_id {
        return Err(StoreError::Usage(
            "label does not belong to this variable".to_string(),
        ));
    }
    label::delete(conn, label_id)
}

/// Loads the variable's constraints from their serialized rows.
pub fn constraints(conn: &Connection, variable_id: i64) -> StoreResult<Vec<Box<dyn Constraint>>> {
    let mut stmt = conn.prepare(
        "SELECT constraint_data FROM variable_constraints WHERE variable_id = ?1 ORDER BY id;",
    )?;
    let mut rows = stmt.query([variable_id])?;
    let mut constraints = Vec::new();
    while let Some(row) = rows.next()? {
        let raw: String = row.get(0)?;
        let value: Value = serde_json::from_str(&raw).map_err(|err| {
            StoreError::InvalidData(format!(
                "constraint row for variable {variable_id} is not valid JSON: {err}"
            ))
        })?;
        let Value::Object(rep) = value else {
            return Err(StoreError::InvalidData(format!(
                "constraint row for variable {variable_id} is not an object"
            )));
        };
        constraints.push(constraint_from_representation(&rep)?);
    }
    Ok(constraints)
}

/// Attaches one constraint as a serialized row.
pub fn add_constraint(
    conn: &Connection,
    variable_id: i64,
    constraint: &dyn Constraint,
) -> StoreResult<()> {
    let payload = serde_json::to_string(&constraint.to_representation()).map_err(|err| {
        StoreError::InvalidData(format!("constraint cannot be serialized: {err}"))
    })?;
    conn.execute(
        "INSERT INTO variable_constraints (variable_id, constraint_data) VALUES (?1, ?2);",
        params![variable_id, payload],
    )?;
    Ok(())
}

/// Removes every constraint of one type tag; returns how many were removed.
pub fn remove_constraints(
    conn: &Connection,
    variable_id: i64,
    constraint_type: &str,
) -> StoreResult<usize> {
    let mut stmt = conn.prepare(
        "SELECT id, constraint_data FROM variable_constraints WHERE variable_id = ?1;",
    )?;
    let mut rows = stmt.query([variable_id])?;
    let mut matching_ids: Vec<i64> = Vec::new();
    while let Some(row) = rows.next()? {
        let id: i64 = row.get(0)?;
        let raw: String = row.get(1)?;
        let tag = serde_json::from_str::<Value>(&raw)
            .ok()
            .and_then(|value| {
                value
                    .get("type")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            });
        if tag.as_deref() == Some(constraint_type) {
            matching_ids.push(id);
        }
    }

    if matching_ids.is_empty() {
        return Ok(0);
    }

    let placeholders = (1..=matching_ids.len())
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ");
    conn.execute(
        &format!("DELETE FROM variable_constraints WHERE id IN ({placeholders});"),
        params_from_iter(matching_ids.iter()),
    )?;
    Ok(matching_ids.len())
}

/// Variable plus labels, constraints and its category set, for export
/// collaborators.
pub fn to_map(conn: &Connection, variable: &Variable) -> StoreResult<DataMap> {
    let mut map = DataMap::new();
    map.insert("id".to_string(), Value::from(variable.id));
    map.insert("name".to_string(), Value::from(variable.name.as_str()));
    map.insert(
        "data_type".to_string(),
        Value::from(variable.data_type.as_str()),
    );
    map.insert(
        "category_set_id".to_string(),
        variable.category_set_id.map_or(Value::Null, Value::from),
    );
    map.insert("description".to_string(), optional(&variable.description));
    map.insert("reference".to_string(), optional(&variable.reference));

    let label_entries = labels(conn, variable.id)?
        .iter()
        .map(|item| Value::Object(item.to_map()))
        .collect();
    map.insert("labels".to_string(), Value::Array(label_entries));

    let constraint_entries = constraints(conn, variable.id)?
        .iter()
        .map(|item| Value::Object(item.to_representation()))
        .collect();
    map.insert("constraints".to_string(), Value::Array(constraint_entries));

    if let Some(set_id) = variable.category_set_id {
        if let Some(set) = category_set::get(conn, set_id)? {
            map.insert(
                "category_set".to_string(),
                Value::Object(category_set::to_map(conn, &set)?),
            );
        }
    }

    Ok(map)
}

/// Paginated variable listing.
pub fn paginate(conn: &Connection, query: &PageQuery) -> StoreResult<(Vec<Variable>, u64)> {
    let (records, total) = RecordMapper::new(conn, &DESCRIPTOR).paginate(query)?;
    let variables = records
        .iter()
        .map(Variable::from_record)
        .collect::<StoreResult<Vec<_>>>()?;
    Ok((variables, total))
}

/// Bulk-creates plain variables on a fresh connection.
pub fn bulk_create(
    store: &Store,
    items: &[DataMap],
    stop_on_error: bool,
) -> StoreResult<BulkOutcome<Variable>> {
    let conn = store.fresh_connection()?;
    BulkExecutor::new(&conn, &DESCRIPTOR).bulk_apply(items, stop_on_error, |conn, item| {
        create(conn, item)
    })
}

/// Bulk-creates categorical variables from `{name, data_type,
/// category_names, ...}` payloads, one category set per item.
pub fn bulk_create_categorical(
    store: &Store,
    items: &[DataMap],
    stop_on_error: bool,
) -> StoreResult<BulkOutcome<Variable>> {
    let conn = store.fresh_connection()?;
    BulkExecutor::new(&conn, &DESCRIPTOR).bulk_apply(items, stop_on_error, |conn, item| {
        let data_type = item
            .get("data_type")
            .and_then(Value::as_str)
            .and_then(DataType::parse)
            .filter(|data_type| data_type.is_categorical())
            .ok_or_else(|| {
                StoreError::Usage(
                    "data type must be nominal or ordinal for categorical variables"
                        .to_string(),
                )
            })?;

        let request = CategoricalVariableRequest {
            name: item
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            data_type,
            category_names: match item.get("category_names") {
                Some(Value::Array(entries)) => entries
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
                _ => Vec::new(),
            },
            description: text_key(item, "description"),
            reference: text_key(item, "reference"),
        };
        create_categorical(conn, &request)
    })
}

/// Bulk-updates variables located by the `id` key of each payload, on a
/// fresh connection.
pub fn bulk_update(
    store: &Store,
    items: &[DataMap],
    stop_on_error: bool,
) -> StoreResult<BulkOutcome<Variable>> {
    let conn = store.fresh_connection()?;
    let id_column = DESCRIPTOR.id_column;
    BulkExecutor::new(&conn, &DESCRIPTOR).bulk_apply(items, stop_on_error, |conn, item| {
        let id = item.get(id_column).and_then(Value::as_i64).ok_or_else(|| {
            StoreError::Usage(format!(
                "update item is missing identifier column `{id_column}`"
            ))
        })?;
        update(conn, id, item)
    })
}

/// Bulk-deletes variables by id on a fresh connection; successes are the
/// removed identifiers.
pub fn bulk_delete(
    store: &Store,
    ids: &[i64],
    stop_on_error: bool,
) -> StoreResult<BulkOutcome<i64>> {
    let conn = store.fresh_connection()?;
    BulkExecutor::new(&conn, &DESCRIPTOR).bulk_delete(ids, stop_on_error)
}

fn field_text(record: &Record, column: &str) -> Option<String> {
    record
        .get(column)
        .and_then(FieldValue::as_str)
        .map(str::to_string)
}

fn text_key(map: &DataMap, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

fn optional(value: &Option<String>) -> Value {
    value
        .as_deref()
        .map_or(Value::Null, |text| Value::from(text))
}
