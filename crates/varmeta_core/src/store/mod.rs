//! Generic record persistence engine.
//!
//! # Responsibility
//! - Own the store context (connection lifecycle) and the error taxonomy
//!   shared by the mapper, bulk executor and pagination engine.
//!
//! # Invariants
//! - Validation failures are data (`StoreError::Validation`), produced
//!   before any write reaches SQL.
//! - Store-level rejections (UNIQUE/FK/CHECK) surface as
//!   `StoreError::Constraint`, never as panics.
//! - Every bulk operation runs on a fresh physical connection so it cannot
//!   block, or be blocked by, unrelated single-record calls sharing a
//!   connection.

use crate::config::Config;
use crate::db::{self, DbError, DbResult};
use crate::validate::ValidationResult;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

pub mod bulk;
pub mod descriptor;
pub mod mapper;
pub mod paginate;
pub mod record;
pub mod value;

pub use bulk::{BulkError, BulkExecutor, BulkFailure, BulkInput, BulkOutcome};
pub use descriptor::{EntityDescriptor, ValidatorFn};
pub use mapper::RecordMapper;
pub use paginate::{PageQuery, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use record::Record;
pub use value::{DataMap, FieldValue};

pub type StoreResult<T> = Result<T, StoreError>;

/// Error taxonomy for the persistence engine.
#[derive(Debug)]
pub enum StoreError {
    /// Structural validation rejected the payload before any write.
    Validation(ValidationResult),
    /// A lookup the caller expected to succeed found no row.
    NotFound { table: &'static str, id: i64 },
    /// The store rejected a write (uniqueness, foreign key, CHECK).
    Constraint(String),
    /// The caller misused the API (missing identifier, bad pagination
    /// parameters, undeclared column).
    Usage(String),
    /// A persisted row could not be decoded into its entity shape.
    InvalidData(String),
    /// Transport-level database failure.
    Db(DbError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(result) => {
                let summary = result
                    .errors()
                    .iter()
                    .map(|issue| format!("{}: {}", issue.field, issue.message))
                    .collect::<Vec<_>>()
                    .join("; ");
                write!(f, "validation failed: {summary}")
            }
            Self::NotFound { table, id } => write!(f, "record not found in {table}: id {id}"),
            Self::Constraint(message) => write!(f, "constraint violation: {message}"),
            Self::Usage(message) => write!(f, "{message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<crate::constraint::ConstraintError> for StoreError {
    fn from(value: crate::constraint::ConstraintError) -> Self {
        Self::Usage(value.to_string())
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        match &value {
            rusqlite::Error::SqliteFailure(code, message)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Constraint(message.clone().unwrap_or_else(|| value.to_string()))
            }
            _ => Self::Db(DbError::Sqlite(value)),
        }
    }
}

static MEMORY_STORE_SEQ: AtomicU64 = AtomicU64::new(0);

enum StoreLocation {
    File(PathBuf),
    Memory(String),
}

/// Store context: owns where the database lives and the primary connection
/// used for single-record operations.
///
/// Constructed once at the composition root and passed down; tests build
/// their own instance instead of sharing process state.
pub struct Store {
    location: StoreLocation,
    primary: Connection,
}

impl Store {
    /// Opens (creating if needed) a file-backed store.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let primary = db::open_db(&path)?;
        Ok(Self {
            location: StoreLocation::File(path),
            primary,
        })
    }

    /// Opens an in-memory store.
    ///
    /// Backed by a uniquely named shared-cache database so
    /// [`Store::fresh_connection`] observes the same data as the primary
    /// connection.
    pub fn open_in_memory() -> DbResult<Self> {
        let name = format!(
            "varmeta_mem_{}_{}",
            std::process::id(),
            MEMORY_STORE_SEQ.fetch_add(1, Ordering::Relaxed)
        );
        let primary = db::open_db_shared_memory(&name)?;
        Ok(Self {
            location: StoreLocation::Memory(name),
            primary,
        })
    }

    /// Opens the store named by the configuration, creating its parent
    /// directory when missing.
    pub fn from_config(config: &Config) -> DbResult<Self> {
        let path = &config.database.path;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::Io)?;
        }
        Self::open(path)
    }

    /// Primary connection for single-record operations.
    pub fn connection(&self) -> &Connection {
        &self.primary
    }

    /// Opens a new physical connection to the same database.
    ///
    /// Bulk operations call this for every batch so their write transaction
    /// never shares a connection with unrelated callers.
    pub fn fresh_connection(&self) -> DbResult<Connection> {
        match &self.location {
            StoreLocation::File(path) => db::open_db(path),
            StoreLocation::Memory(name) => db::open_db_shared_memory(name),
        }
    }
}
