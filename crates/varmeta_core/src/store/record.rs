//! Persisted row representation.
//!
//! # Responsibility
//! - Pair an optional store-assigned identifier with the declared column
//!   values of one row.
//! - Convert whole rows to plain key-value maps for collaborators.
//!
//! # Invariants
//! - A record's column set is always exactly its descriptor's declared
//!   columns.
//! - The identifier is assigned by the store and never mutated here.

use crate::store::descriptor::EntityDescriptor;
use crate::store::value::{DataMap, FieldValue};
use serde_json::Value;
use std::collections::BTreeMap;

/// One row of an entity's table.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    descriptor: &'static EntityDescriptor,
    id: Option<i64>,
    values: BTreeMap<&'static str, FieldValue>,
}

impl Record {
    pub(crate) fn from_parts(
        descriptor: &'static EntityDescriptor,
        id: Option<i64>,
        mut values: BTreeMap<&'static str, FieldValue>,
    ) -> Self {
        for column in descriptor.columns {
            values.entry(*column).or_insert(FieldValue::Null);
        }
        values.retain(|column, _| descriptor.has_column(column));
        Self {
            descriptor,
            id,
            values,
        }
    }

    pub fn descriptor(&self) -> &'static EntityDescriptor {
        self.descriptor
    }

    /// Store-assigned identifier; `None` before the row is persisted.
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    /// Returns one declared column value, or `None` for undeclared columns.
    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.values.get(column)
    }

    /// Converts to a plain key-value map: the identifier column plus every
    /// declared column, in declaration order.
    pub fn to_map(&self) -> DataMap {
        let mut map = DataMap::new();
        map.insert(
            self.descriptor.id_column.to_string(),
            self.id.map_or(Value::Null, Value::from),
        );
        for column in self.descriptor.columns {
            let value = self
                .values
                .get(column)
                .map_or(Value::Null, FieldValue::to_json);
            map.insert((*column).to_string(), value);
        }
        map
    }
}
