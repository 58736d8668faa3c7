//! Column metadata management for tabular datasets.
//!
//! Variables describe dataset columns: their data type, categorical value
//! sets, multilingual labels and value constraints, persisted in SQLite.
//! The crate is organized around a generic persistence engine —
//! descriptor-driven record mapping, dual-policy bulk transactions and
//! filtered/sorted/paginated queries — that every entity module reuses.
//!
//! The crate is a library: it never prints, prompts or exits. CLI and
//! import/export front-ends consume the returned data and structured
//! errors.

pub mod config;
pub mod constraint;
pub mod db;
pub mod entity;
pub mod logging;
pub mod store;
pub mod validate;

pub use config::{Config, ConfigError, ConfigResult};
pub use constraint::{
    constraint_from_representation, create_constraint, register_constraint_type,
    registered_constraint_types, Constraint, ConstraintError, ConstraintResult,
    EmailConstraint, MaxValueConstraint, MinValueConstraint, RegexConstraint, Representation,
    UrlConstraint,
};
pub use entity::category::Category;
pub use entity::category_set::CategorySet;
pub use entity::label::{Label, LabelOwner, LabelRequest};
pub use entity::variable::{CategoricalVariableRequest, DataType, Variable};
pub use logging::{default_log_level, init_logging, logging_status};
pub use store::{
    BulkError, BulkExecutor, BulkFailure, BulkInput, BulkOutcome, DataMap, EntityDescriptor,
    FieldValue, PageQuery, Record, RecordMapper, Store, StoreError, StoreResult,
};
pub use validate::{ValidationIssue, ValidationResult};
