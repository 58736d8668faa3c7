//! Static entity metadata consumed by the generic persistence engine.
//!
//! # Responsibility
//! - Describe one kind of persisted record: table, identifier column,
//!   declared mutable columns, validator hook, searchable text columns.
//!
//! # Invariants
//! - Declared columns never include the identifier column.
//! - The engine only ever sees column names and scalar values; domain
//!   semantics stay inside the owning entity module.

use crate::store::value::DataMap;
use crate::validate::ValidationResult;

/// Structural validator hook run before any write for this entity kind.
pub type ValidatorFn = fn(&DataMap) -> ValidationResult;

/// Static metadata describing one persisted entity kind.
///
/// Each entity module exposes one `static` descriptor; the record mapper,
/// bulk executor and pagination engine are generic over it.
#[derive(Debug, PartialEq)]
pub struct EntityDescriptor {
    /// Table backing this entity.
    pub table: &'static str,
    /// Identifier column, assigned by the store on insert.
    pub id_column: &'static str,
    /// Ordered declared mutable columns.
    pub columns: &'static [&'static str],
    /// Optional structural validator run before create/update.
    pub validator: Option<ValidatorFn>,
    /// Text columns covered by the pagination engine's substring search.
    /// Empty when the entity does not support search.
    pub search_columns: &'static [&'static str],
}

impl EntityDescriptor {
    /// Returns whether `column` is one of the declared mutable columns.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(&column)
    }

    /// Returns whether `column` may be used for sorting: any declared column
    /// or the identifier column.
    pub fn is_sortable(&self, column: &str) -> bool {
        column == self.id_column || self.has_column(column)
    }

    /// Runs the validator hook; entities without one validate vacuously.
    pub fn validate(&self, data: &DataMap) -> ValidationResult {
        match self.validator {
            Some(validator) => validator(data),
            None => ValidationResult::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::EntityDescriptor;

    static PLAIN: EntityDescriptor = EntityDescriptor {
        table: "things",
        id_column: "id",
        columns: &["name", "kind"],
        validator: None,
        search_columns: &[],
    };

    #[test]
    fn sortable_covers_declared_columns_and_id() {
        assert!(PLAIN.is_sortable("id"));
        assert!(PLAIN.is_sortable("name"));
        assert!(!PLAIN.is_sortable("created_at"));
        assert!(!PLAIN.has_column("id"));
    }

    #[test]
    fn missing_validator_validates_vacuously() {
        let result = PLAIN.validate(&serde_json::Map::new());
        assert!(result.is_valid());
        assert!(result.warnings().is_empty());
    }
}
