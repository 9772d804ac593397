//! Post repository contract and data-source-backed implementation.
//!
//! # Responsibility
//! - Expose `fetch_all`/`fetch_by_id`/`create`/`update`/`delete` as streams
//!   of `DataResult`.
//! - Validate caller-provided posts before they reach storage.
//!
//! # Invariants
//! - Each successful upstream emission maps to exactly one `Ok`, in order.
//! - The first upstream failure maps to one `Err` and ends the stream.

use crate::model::post::{Post, PostId, PostValidationError};
use crate::source::{LiveQuery, PostDataSource, PostRecord, SourceError, SqlitePostDataSource};
use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type DataResult<T> = Result<T, DataError>;

/// Stream returned by every repository operation.
pub type DataStream<T> = BoxStream<'static, DataResult<T>>;

/// Domain-visible failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataError {
    /// Any storage, query or input failure.
    Unknown,
    /// The addressed post does not exist.
    DataNotFound,
}

impl Display for DataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown data error"),
            Self::DataNotFound => write!(f, "data not found"),
        }
    }
}

impl Error for DataError {}

impl From<&SourceError> for DataError {
    fn from(value: &SourceError) -> Self {
        match value {
            SourceError::NotFound(_) => Self::DataNotFound,
            _ => Self::Unknown,
        }
    }
}

/// Repository interface for post CRUD operations.
pub trait PostRepository: Send + Sync {
    fn fetch_all(&self) -> DataStream<Vec<Post>>;
    fn fetch_by_id(&self, id: PostId) -> DataStream<Post>;
    fn create(&self, post: &Post) -> DataStream<Post>;
    fn update(&self, post: &Post) -> DataStream<Post>;
    /// Yields `Ok(true)` once the row is gone.
    fn delete(&self, post: &Post) -> DataStream<bool>;
}

/// Repository over any [`PostDataSource`], SQLite by default.
pub struct SqlitePostRepository<D: PostDataSource = SqlitePostDataSource> {
    source: D,
}

impl<D: PostDataSource> SqlitePostRepository<D> {
    pub fn new(source: D) -> Self {
        Self { source }
    }
}

impl<D: PostDataSource> PostRepository for SqlitePostRepository<D> {
    fn fetch_all(&self) -> DataStream<Vec<Post>> {
        guard("fetch_all", self.source.get_all(), |records| {
            records.into_iter().map(Post::from).collect()
        })
    }

    fn fetch_by_id(&self, id: PostId) -> DataStream<Post> {
        guard("fetch_by_id", self.source.get_by_id(id), Post::from)
    }

    fn create(&self, post: &Post) -> DataStream<Post> {
        if let Err(err) = post.validate() {
            return rejected("create", err);
        }
        guard(
            "create",
            self.source.put(PostRecord::from(post.clone())),
            Post::from,
        )
    }

    fn update(&self, post: &Post) -> DataStream<Post> {
        if let Err(err) = post.validate() {
            return rejected("update", err);
        }
        guard(
            "update",
            self.source.update(PostRecord::from(post.clone())),
            Post::from,
        )
    }

    fn delete(&self, post: &Post) -> DataStream<bool> {
        guard(
            "delete",
            self.source.delete(PostRecord::from(post.clone())),
            |()| true,
        )
    }
}

/// Maps upstream items through `map` and turns the first failure into a
/// terminal `DataError`.
fn guard<T, U, F>(operation: &'static str, upstream: LiveQuery<T>, map: F) -> DataStream<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T) -> U + Copy + Send + 'static,
{
    stream::unfold(Some(upstream), move |state| async move {
        let Some(mut upstream) = state else {
            return None;
        };
        let Some(item) = upstream.next().await else {
            return None;
        };
        match item {
            Ok(value) => Some((Ok(map(value)), Some(upstream))),
            Err(err) => {
                let kind = DataError::from(&err);
                warn!(
                    "event=repo_{} module=repo status=error kind={:?} error={}",
                    operation, kind, err
                );
                Some((Err(kind), None))
            }
        }
    })
    .boxed()
}

fn rejected<T>(operation: &'static str, err: PostValidationError) -> DataStream<T>
where
    T: Send + 'static,
{
    warn!(
        "event=repo_{} module=repo status=error kind=Unknown error_code=validation_failed error={}",
        operation, err
    );
    stream::once(future::ready(Err(DataError::Unknown))).boxed()
}
