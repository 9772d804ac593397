//! Data source layer: posts queries exposed as live streams.
//!
//! # Responsibility
//! - Translate CRUD operations into SQL against the `posts` table.
//! - Expose reads as live queries that re-emit after committed writes.
//!
//! # Invariants
//! - Every stream is cold; no SQL runs before the first poll.
//! - Writes commit immediately, then notify live queries.
//! - A stream ends after emitting its first error.

use crate::db::DbError;
use crate::model::post::PostId;
use futures::stream::BoxStream;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod live;
mod post_source;
mod record;

pub use live::TableChange;
pub use post_source::SqlitePostDataSource;
pub use record::PostRecord;

pub type SourceResult<T> = Result<T, SourceError>;

/// Stream returned by every data source operation.
pub type LiveQuery<T> = BoxStream<'static, SourceResult<T>>;

/// Failure surfaced inside a data source stream.
#[derive(Debug)]
pub enum SourceError {
    Db(DbError),
    NotFound(PostId),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// A previous holder of the connection lock panicked.
    ConnectionPoisoned,
    /// The blocking task running a query was cancelled or panicked.
    Task(String),
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "post not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted post data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "required table `{table}` is missing"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column `{table}.{column}` is missing")
            }
            Self::ConnectionPoisoned => write!(f, "database connection lock is poisoned"),
            Self::Task(message) => write!(f, "database task failed: {message}"),
        }
    }
}

impl Error for SourceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for SourceError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SourceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Storage-facing operations over post rows.
///
/// Implementations must be cheap to call: work starts when the returned
/// stream is first polled.
pub trait PostDataSource: Send + Sync {
    /// Live snapshot of every row.
    fn get_all(&self) -> LiveQuery<Vec<PostRecord>>;
    /// Live view of one row; emits `NotFound` and ends if it is absent.
    fn get_by_id(&self, id: PostId) -> LiveQuery<PostRecord>;
    /// Inserts a row and emits it once with storage-assigned fields.
    fn put(&self, record: PostRecord) -> LiveQuery<PostRecord>;
    /// Replaces every mutable field of a row and emits it once.
    fn update(&self, record: PostRecord) -> LiveQuery<PostRecord>;
    /// Deletes a row and emits a single completion signal.
    fn delete(&self, record: PostRecord) -> LiveQuery<()>;
}
