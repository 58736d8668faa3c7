//! Descriptor-driven single-record CRUD.
//!
//! # Responsibility
//! - Map create/get/filter/update/delete calls onto one entity table using
//!   only its descriptor's declared columns.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Write paths run the descriptor validator before any SQL mutation; on
//!   update the validator sees the merged view of existing row + changes.
//! - Unknown payload keys and non-scalar values are silently dropped on
//!   write, never persisted.
//! - The identifier column is never written by `update`.
//! - No implicit caching: every call reflects the store's current state.

use crate::store::descriptor::EntityDescriptor;
use crate::store::record::Record;
use crate::store::value::{DataMap, FieldValue};
use crate::store::{StoreError, StoreResult};
use log::debug;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, Row};
use std::collections::BTreeMap;

/// Generic single-record mapper over one entity table.
pub struct RecordMapper<'conn> {
    conn: &'conn Connection,
    descriptor: &'static EntityDescriptor,
}

impl<'conn> RecordMapper<'conn> {
    pub fn new(conn: &'conn Connection, descriptor: &'static EntityDescriptor) -> Self {
        Self { conn, descriptor }
    }

    pub fn descriptor(&self) -> &'static EntityDescriptor {
        self.descriptor
    }

    pub(crate) fn conn(&self) -> &Connection {
        self.conn
    }

    /// Validates and inserts one payload, returning the stored record with
    /// its assigned identifier.
    pub fn create(&self, data: &DataMap) -> StoreResult<Record> {
        self.check_payload(data)?;

        let fields = declared_scalars(self.descriptor, data);
        let sql = if fields.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES;", self.descriptor.table)
        } else {
            let columns = fields
                .iter()
                .map(|(column, _)| *column)
                .collect::<Vec<_>>()
                .join(", ");
            let placeholders = (1..=fields.len())
                .map(|index| format!("?{index}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "INSERT INTO {} ({columns}) VALUES ({placeholders});",
                self.descriptor.table
            )
        };

        self.conn
            .execute(&sql, params_from_iter(fields.iter().map(|(_, value)| value)))?;
        let id = self.conn.last_insert_rowid();
        debug!(
            "event=record_create module=store table={} id={id}",
            self.descriptor.table
        );

        self.get(id)?.ok_or_else(|| {
            StoreError::InvalidData(format!(
                "row {id} missing from {} directly after insert",
                self.descriptor.table
            ))
        })
    }

    /// Single-row lookup by identifier; absence is `None`, never an error.
    pub fn get(&self, id: i64) -> StoreResult<Option<Record>> {
        let sql = format!(
            "{} WHERE {} = ?1;",
            self.select_sql(),
            self.descriptor.id_column
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(self.parse_row(row)?));
        }
        Ok(None)
    }

    /// Single-row lookup by one declared column value.
    pub fn get_by(&self, column: &str, value: &FieldValue) -> StoreResult<Option<Record>> {
        self.ensure_known_column(column)?;

        let sql = format!("{} WHERE {column} = ?1;", self.select_sql());
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([value])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(self.parse_row(row)?));
        }
        Ok(None)
    }

    pub fn get_all(&self) -> StoreResult<Vec<Record>> {
        let sql = format!("{};", self.select_sql());
        self.query_records(&sql, Vec::new())
    }

    /// Exact-match AND-conjunction over declared columns.
    pub fn filter(&self, conditions: &[(&str, FieldValue)]) -> StoreResult<Vec<Record>> {
        if conditions.is_empty() {
            return self.get_all();
        }

        let (where_clause, params) = self.build_conditions(conditions)?;
        let sql = format!("{} WHERE {where_clause};", self.select_sql());
        self.query_records(&sql, params)
    }

    /// Counts rows matching an exact-match conjunction.
    pub fn count(&self, conditions: &[(&str, FieldValue)]) -> StoreResult<u64> {
        let sql = if conditions.is_empty() {
            format!("SELECT COUNT(*) FROM {};", self.descriptor.table)
        } else {
            let (where_clause, _) = self.build_conditions(conditions)?;
            format!(
                "SELECT COUNT(*) FROM {} WHERE {where_clause};",
                self.descriptor.table
            )
        };
        let params: Vec<SqlValue> = conditions.iter().map(|(_, value)| value.into()).collect();
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(params), |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// Overwrites the supplied declared columns of one existing row.
    ///
    /// The merged view (existing values overlaid with `data`) must pass the
    /// descriptor validator. The identifier is never changed.
    pub fn update(&self, id: i64, data: &DataMap) -> StoreResult<Record> {
        let existing = self.get(id)?.ok_or(StoreError::NotFound {
            table: self.descriptor.table,
            id,
        })?;

        if let Some(validator) = self.descriptor.validator {
            let mut merged = existing.to_map();
            for (key, value) in data {
                merged.insert(key.clone(), value.clone());
            }
            let result = validator(&merged);
            if !result.is_valid() {
                return Err(StoreError::Validation(result));
            }
        }

        let fields = declared_scalars(self.descriptor, data);
        if fields.is_empty() {
            return Ok(existing);
        }

        let assignments = fields
            .iter()
            .enumerate()
            .map(|(index, (column, _))| format!("{column} = ?{}", index + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {assignments} WHERE {} = ?{};",
            self.descriptor.table,
            self.descriptor.id_column,
            fields.len() + 1
        );

        let mut params: Vec<SqlValue> = fields.iter().map(|(_, value)| value.into()).collect();
        params.push(SqlValue::Integer(id));
        let changed = self.conn.execute(&sql, params_from_iter(params))?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                table: self.descriptor.table,
                id,
            });
        }
        debug!(
            "event=record_update module=store table={} id={id} columns={}",
            self.descriptor.table,
            fields.len()
        );

        self.get(id)?.ok_or_else(|| {
            StoreError::InvalidData(format!(
                "row {id} missing from {} directly after update",
                self.descriptor.table
            ))
        })
    }

    /// Removes one row; a missing row is reported as `NotFound`.
    pub fn delete(&self, id: i64) -> StoreResult<()> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1;",
            self.descriptor.table, self.descriptor.id_column
        );
        let changed = self.conn.execute(&sql, [id])?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                table: self.descriptor.table,
                id,
            });
        }
        debug!(
            "event=record_delete module=store table={} id={id}",
            self.descriptor.table
        );
        Ok(())
    }

    pub(crate) fn select_sql(&self) -> String {
        format!(
            "SELECT {}, {} FROM {}",
            self.descriptor.id_column,
            self.descriptor.columns.join(", "),
            self.descriptor.table
        )
    }

    pub(crate) fn parse_row(&self, row: &Row<'_>) -> StoreResult<Record> {
        let id: i64 = row.get(0)?;
        let mut values = BTreeMap::new();
        for (index, column) in self.descriptor.columns.iter().enumerate() {
            let value: SqlValue = row.get(index + 1)?;
            values.insert(*column, FieldValue::from(value));
        }
        Ok(Record::from_parts(self.descriptor, Some(id), values))
    }

    pub(crate) fn query_records(
        &self,
        sql: &str,
        params: Vec<SqlValue>,
    ) -> StoreResult<Vec<Record>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(params))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(self.parse_row(row)?);
        }
        Ok(records)
    }

    fn check_payload(&self, data: &DataMap) -> StoreResult<()> {
        if let Some(validator) = self.descriptor.validator {
            let result = validator(data);
            if !result.is_valid() {
                return Err(StoreError::Validation(result));
            }
            for warning in result.warnings() {
                debug!(
                    "event=validation_warning module=store table={} field={} message={}",
                    self.descriptor.table, warning.field, warning.message
                );
            }
        }
        Ok(())
    }

    fn build_conditions(
        &self,
        conditions: &[(&str, FieldValue)],
    ) -> StoreResult<(String, Vec<SqlValue>)> {
        let mut clauses = Vec::with_capacity(conditions.len());
        let mut params = Vec::with_capacity(conditions.len());
        for (index, (column, value)) in conditions.iter().enumerate() {
            self.ensure_known_column(column)?;
            clauses.push(format!("{column} = ?{}", index + 1));
            params.push(SqlValue::from(value));
        }
        Ok((clauses.join(" AND "), params))
    }

    fn ensure_known_column(&self, column: &str) -> StoreResult<()> {
        if self.descriptor.is_sortable(column) {
            return Ok(());
        }
        Err(StoreError::Usage(format!(
            "unknown column `{column}` for table {}",
            self.descriptor.table
        )))
    }
}

fn declared_scalars(
    descriptor: &'static EntityDescriptor,
    data: &DataMap,
) -> Vec<(&'static str, FieldValue)> {
    descriptor
        .columns
        .iter()
        .filter_map(|column| {
            data.get(*column)
                .and_then(FieldValue::from_json)
                .map(|value| (*column, value))
        })
        .collect()
}
