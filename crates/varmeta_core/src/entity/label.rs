//! Multilingual labels attached to variables and categories.
//!
//! # Responsibility
//! - Describe the polymorphic `labels` table (owner type + owner id).
//! - Provide label creation and per-owner lookup.
//!
//! # Invariants
//! - Every label names its text and at least one of language code or
//!   language name; the schema enforces the same rule with a CHECK.
//! - Uniqueness over (owner, language_code, language, purpose) is enforced
//!   by the store.

use crate::entity::is_present;
use crate::store::descriptor::EntityDescriptor;
use crate::store::mapper::RecordMapper;
use crate::store::record::Record;
use crate::store::value::{DataMap, FieldValue};
use crate::store::{StoreError, StoreResult};
use crate::validate::ValidationResult;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub static DESCRIPTOR: EntityDescriptor = EntityDescriptor {
    table: "labels",
    id_column: "id",
    columns: &[
        "entity_type",
        "entity_id",
        "language_code",
        "language",
        "text",
        "purpose",
    ],
    validator: Some(validate),
    search_columns: &["text"],
};

/// Which kind of entity a label belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelOwner {
    Variable,
    Category,
}

impl LabelOwner {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Variable => "variable",
            Self::Category => "category",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "variable" => Some(Self::Variable),
            "category" => Some(Self::Category),
            _ => None,
        }
    }
}

/// Structural validator for label payloads.
pub fn validate(data: &DataMap) -> ValidationResult {
    let mut result = ValidationResult::new();

    if !is_present(data.get("entity_type")) {
        result.add_error("entity_type", "Entity type is required");
    } else if data
        .get("entity_type")
        .and_then(Value::as_str)
        .and_then(LabelOwner::parse)
        .is_none()
    {
        result.add_error("entity_type", "Entity type must be `variable` or `category`");
    }

    if !is_present(data.get("entity_id")) {
        result.add_error("entity_id", "Entity ID is required");
    }

    if !is_present(data.get("text")) {
        result.add_error("text", "Label text is required");
    }

    if !data.contains_key("language_code") && !data.contains_key("language") {
        result.add_error("language", "Either language_code or language is required");
    }

    result
}

/// One persisted label row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Label {
    pub id: i64,
    pub owner: LabelOwner,
    pub entity_id: i64,
    pub language_code: Option<String>,
    pub language: Option<String>,
    pub text: String,
    pub purpose: Option<String>,
}

impl Label {
    pub fn from_record(record: &Record) -> StoreResult<Self> {
        let id = record
            .id()
            .ok_or_else(|| StoreError::InvalidData("label record has no id".to_string()))?;
        let owner_text = record
            .get("entity_type")
            .and_then(FieldValue::as_str)
            .unwrap_or_default();
        let owner = LabelOwner::parse(owner_text).ok_or_else(|| {
            StoreError::InvalidData(format!(
                "invalid owner `{owner_text}` in labels.entity_type"
            ))
        })?;
        let entity_id = record
            .get("entity_id")
            .and_then(FieldValue::as_i64)
            .ok_or_else(|| {
                StoreError::InvalidData("missing owner id in labels.entity_id".to_string())
            })?;
        let text = record
            .get("text")
            .and_then(FieldValue::as_str)
            .ok_or_else(|| StoreError::InvalidData("missing text in labels.text".to_string()))?
            .to_string();

        Ok(Self {
            id,
            owner,
            entity_id,
            language_code: field_text(record, "language_code"),
            language: field_text(record, "language"),
            text,
            purpose: field_text(record, "purpose"),
        })
    }

    /// Plain key-value view for export collaborators.
    pub fn to_map(&self) -> DataMap {
        let mut map = DataMap::new();
        map.insert("id".to_string(), Value::from(self.id));
        map.insert(
            "entity_type".to_string(),
            Value::from(self.owner.as_str()),
        );
        map.insert("entity_id".to_string(), Value::from(self.entity_id));
        map.insert("language_code".to_string(), optional(&self.language_code));
        map.insert("language".to_string(), optional(&self.language));
        map.insert("text".to_string(), Value::from(self.text.as_str()));
        map.insert("purpose".to_string(), optional(&self.purpose));
        map
    }
}

/// Request model for attaching one label to an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelRequest {
    pub text: String,
    pub language_code: Option<String>,
    pub language: Option<String>,
    pub purpose: Option<String>,
}

impl LabelRequest {
    /// Builds a request from an inline label payload object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        Some(Self {
            text: map
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            language_code: text_key(map, "language_code"),
            language: text_key(map, "language"),
            purpose: text_key(map, "purpose"),
        })
    }
}

/// Creates one label for the given owner.
///
/// At least one of `language_code`/`language` must be set in the request.
pub fn create_for_entity(
    conn: &Connection,
    owner: LabelOwner,
    entity_id: i64,
    request: &LabelRequest,
) -> StoreResult<Label> {
    if request.language_code.is_none() && request.language.is_none() {
        return Err(StoreError::Usage(
            "either language_code or language must be provided".to_string(),
        ));
    }

    let mut data = DataMap::new();
    data.insert("entity_type".to_string(), Value::from(owner.as_str()));
    data.insert("entity_id".to_string(), Value::from(entity_id));
    data.insert("language_code".to_string(), optional(&request.language_code));
    data.insert("language".to_string(), optional(&request.language));
    data.insert("text".to_string(), Value::from(request.text.as_str()));
    data.insert("purpose".to_string(), optional(&request.purpose));

    let record = RecordMapper::new(conn, &DESCRIPTOR).create(&data)?;
    Label::from_record(&record)
}

pub fn get(conn: &Connection, id: i64) -> StoreResult<Option<Label>> {
    match RecordMapper::new(conn, &DESCRIPTOR).get(id)? {
        Some(record) => Ok(Some(Label::from_record(&record)?)),
        None => Ok(None),
    }
}

/// All labels attached to one owner, in insertion order.
pub fn for_entity(conn: &Connection, owner: LabelOwner, entity_id: i64) -> StoreResult<Vec<Label>> {
    let records = RecordMapper::new(conn, &DESCRIPTOR).filter(&[
        ("entity_type", FieldValue::from(owner.as_str())),
        ("entity_id", FieldValue::from(entity_id)),
    ])?;
    records.iter().map(Label::from_record).collect()
}

pub fn delete(conn: &Connection, id: i64) -> StoreResult<()> {
    RecordMapper::new(conn, &DESCRIPTOR).delete(id)
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
