//! Multi-record operations under one transaction with dual failure policies.
//!
//! # Responsibility
//! - Apply create/update/delete to many records as one batch, collecting a
//!   per-item error report.
//! - Implement both failure policies: abort-and-rollback (`stop_on_error`)
//!   and collect-and-continue.
//!
//! # Invariants
//! - One IMMEDIATE transaction spans the whole batch; items are processed
//!   strictly in input order, never reordered or parallelized.
//! - Per-item failures are captured as outcome entries; only setup failures
//!   (the transaction itself) escape as errors.
//! - With `stop_on_error` the first failing item ends processing and the
//!   whole batch is rolled back; if the rollback itself fails, the items
//!   applied before the abort may survive and the outcome says so.
//! - An empty input commits an empty transaction and yields an empty
//!   outcome.

use crate::store::descriptor::EntityDescriptor;
use crate::store::mapper::RecordMapper;
use crate::store::record::Record;
use crate::store::value::DataMap;
use crate::store::{StoreError, StoreResult};
use crate::validate::ValidationIssue;
use log::{info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde_json::Value;

/// The original input of one failed batch item.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkInput {
    Data(DataMap),
    Id(i64),
}

/// Why one batch item failed.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkFailure {
    /// Structural validation rejected the item; the store was not touched.
    Invalid(Vec<ValidationIssue>),
    /// Applying the item failed (missing record, constraint violation,
    /// transport error).
    Failed(String),
}

/// One failed batch item: its position, its original input and the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkError {
    pub index: usize,
    pub input: BulkInput,
    pub failure: BulkFailure,
}

/// Result of one bulk operation.
///
/// Every input item lands in `successful` or `errors`, except items after
/// the first failure when the batch was aborted under `stop_on_error`.
#[derive(Debug)]
pub struct BulkOutcome<T> {
    /// Items applied and committed. Cleared when an aborted batch rolled
    /// back cleanly, since those writes did not survive.
    pub successful: Vec<T>,
    pub errors: Vec<BulkError>,
    /// True when a `stop_on_error` abort could not roll the batch back; in
    /// that case `successful` keeps the items that were applied before the
    /// abort and up to that many rows may have persisted.
    pub rollback_failed: bool,
}

impl<T> BulkOutcome<T> {
    fn empty() -> Self {
        Self {
            successful: Vec::new(),
            errors: Vec::new(),
            rollback_failed: false,
        }
    }
}

/// Executes batches of mapper operations for one entity kind.
pub struct BulkExecutor<'conn> {
    conn: &'conn Connection,
    descriptor: &'static EntityDescriptor,
}

impl<'conn> BulkExecutor<'conn> {
    /// Binds the executor to a connection dedicated to this batch.
    ///
    /// The connection must not be shared with concurrent callers for the
    /// duration of the batch; [`crate::store::Store::fresh_connection`]
    /// provides one.
    pub fn new(conn: &'conn Connection, descriptor: &'static EntityDescriptor) -> Self {
        Self { conn, descriptor }
    }

    /// Validates and inserts each payload in input order.
    pub fn bulk_create(
        &self,
        items: &[DataMap],
        stop_on_error: bool,
    ) -> StoreResult<BulkOutcome<Record>> {
        self.run(
            items.len(),
            stop_on_error,
            |index| BulkInput::Data(items[index].clone()),
            |conn, index| RecordMapper::new(conn, self.descriptor).create(&items[index]),
        )
    }

    /// Updates each payload's record, located by the identifier column
    /// inside the payload. The merged view of existing row + changes must
    /// pass validation; a missing identifier or missing record is a
    /// per-item error.
    pub fn bulk_update(
        &self,
        items: &[DataMap],
        stop_on_error: bool,
    ) -> StoreResult<BulkOutcome<Record>> {
        let id_column = self.descriptor.id_column;
        self.run(
            items.len(),
            stop_on_error,
            |index| BulkInput::Data(items[index].clone()),
            |conn, index| {
                let item = &items[index];
                let id = item.get(id_column).and_then(Value::as_i64).ok_or_else(|| {
                    StoreError::Usage(format!(
                        "update item is missing identifier column `{id_column}`"
                    ))
                })?;
                RecordMapper::new(conn, self.descriptor).update(id, item)
            },
        )
    }

    /// Deletes each identifier in input order; missing rows are per-item
    /// errors and successful entries are the deleted identifiers.
    pub fn bulk_delete(&self, ids: &[i64], stop_on_error: bool) -> StoreResult<BulkOutcome<i64>> {
        self.run(
            ids.len(),
            stop_on_error,
            |index| BulkInput::Id(ids[index]),
            |conn, index| {
                RecordMapper::new(conn, self.descriptor)
                    .delete(ids[index])
                    .map(|()| ids[index])
            },
        )
    }

    /// Runs a caller-supplied per-item operation under the same transaction
    /// and failure-policy loop.
    ///
    /// For compound items that touch more than one table per input (e.g.
    /// create a parent row, then the record referencing it). The closure
    /// runs on the batch transaction's connection and must not open its own
    /// transaction.
    pub fn bulk_apply<T>(
        &self,
        items: &[DataMap],
        stop_on_error: bool,
        mut apply: impl FnMut(&Connection, &DataMap) -> StoreResult<T>,
    ) -> StoreResult<BulkOutcome<T>> {
        self.run(
            items.len(),
            stop_on_error,
            |index| BulkInput::Data(items[index].clone()),
            |conn, index| apply(conn, &items[index]),
        )
    }

    fn run<T>(
        &self,
        len: usize,
        stop_on_error: bool,
        input_of: impl Fn(usize) -> BulkInput,
        mut apply: impl FnMut(&Connection, usize) -> StoreResult<T>,
    ) -> StoreResult<BulkOutcome<T>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let tx_conn: &Connection = &tx;

        let mut outcome = BulkOutcome::empty();
        let mut aborted = false;
        for index in 0..len {
            match apply(tx_conn, index) {
                Ok(value) => outcome.successful.push(value),
                Err(err) => {
                    let failure = match err {
                        StoreError::Validation(result) => {
                            BulkFailure::Invalid(result.into_errors())
                        }
                        other => BulkFailure::Failed(other.to_string()),
                    };
                    outcome.errors.push(BulkError {
                        index,
                        input: input_of(index),
                        failure,
                    });
                    if stop_on_error {
                        aborted = true;
                        break;
                    }
                }
            }
        }

        if aborted {
            match tx.rollback() {
                Ok(()) => outcome.successful.clear(),
                Err(err) => {
                    warn!(
                        "event=bulk_rollback module=store table={} status=error error={err}",
                        self.descriptor.table
                    );
                    outcome.rollback_failed = true;
                }
            }
            info!(
                "event=bulk module=store table={} status=aborted items={len} errors={} rollback_failed={}",
                self.descriptor.table,
                outcome.errors.len(),
                outcome.rollback_failed
            );
        } else {
            tx.commit()?;
            info!(
                "event=bulk module=store table={} status=ok items={len} successes={} errors={}",
                self.descriptor.table,
                outcome.successful.len(),
                outcome.errors.len()
            );
        }

        Ok(outcome)
    }
}
