//! SQLite-backed post data source.
//!
//! # Responsibility
//! - Own the shared connection and the change channel for `posts`.
//! - Keep SQL details inside the storage boundary.
//!
//! # Invariants
//! - Insert and `last_insert_rowid` run under one connection lock.
//! - `modified_at` never moves backwards on update, so it stays at or
//!   above `created_at`.
//! - A committed write publishes its `TableChange` even if the caller
//!   dropped the write stream.
//! - `get_all` orders rows by `id ASC`; callers must not depend on it.

use super::live::{
    live_query, publish, run_blocking, SharedConnection, TableChange, CHANGE_CHANNEL_CAPACITY,
};
use super::{LiveQuery, PostDataSource, PostRecord, SourceError, SourceResult};
use crate::db::migrations::{current_version, latest_version};
use crate::db::ConnectionFactory;
use crate::model::post::PostId;
use futures::stream::{self, StreamExt};
use log::{error, info};
use rusqlite::{params, Connection, Row};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

const POSTS_TABLE: &str = "posts";

const POST_SELECT_SQL: &str = "SELECT
    id,
    name,
    title,
    body,
    created_at,
    modified_at,
    view_count
FROM posts";

const REQUIRED_POST_COLUMNS: &[&str] = &[
    "id",
    "name",
    "title",
    "body",
    "created_at",
    "modified_at",
    "view_count",
];

/// Current time as epoch milliseconds, evaluated once per statement.
const NOW_EPOCH_MS_SQL: &str = "CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER)";

/// Post data source over a single shared SQLite connection.
///
/// Clones share the connection and change channel.
#[derive(Clone)]
pub struct SqlitePostDataSource {
    conn: SharedConnection,
    changes: broadcast::Sender<TableChange>,
}

impl SqlitePostDataSource {
    /// Wraps a migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when the schema version is not current.
    /// - `MissingRequiredTable` / `MissingRequiredColumn` when the `posts`
    ///   table does not have the expected shape.
    pub fn try_new(conn: Connection) -> SourceResult<Self> {
        ensure_schema(&conn)?;
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            changes,
        })
    }

    /// Opens a connection through `factory` and wraps it.
    pub fn open<F>(factory: &F) -> SourceResult<Self>
    where
        F: ConnectionFactory + ?Sized,
    {
        let conn = factory.create_connection()?;
        Self::try_new(conn)
    }

    /// Subscribes to committed changes made through this data source.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<TableChange> {
        self.changes.subscribe()
    }

    fn write_once<T, W>(&self, event: &'static str, work: W) -> LiveQuery<T>
    where
        T: Send + 'static,
        W: FnOnce(&Connection) -> SourceResult<(T, TableChange)> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let changes = self.changes.clone();
        stream::once(logged_write(event, conn, changes, work)).boxed()
    }
}

impl PostDataSource for SqlitePostDataSource {
    fn get_all(&self) -> LiveQuery<Vec<PostRecord>> {
        live_query(
            Arc::clone(&self.conn),
            self.changes.clone(),
            |_| true,
            select_all_posts,
        )
    }

    fn get_by_id(&self, id: PostId) -> LiveQuery<PostRecord> {
        live_query(
            Arc::clone(&self.conn),
            self.changes.clone(),
            move |change| change.post_id() == id,
            move |db| select_post(db, id),
        )
    }

    fn put(&self, record: PostRecord) -> LiveQuery<PostRecord> {
        self.write_once("post_put", move |db| {
            let created = insert_post(db, &record)?;
            let change = TableChange::Inserted(created.id);
            Ok((created, change))
        })
    }

    fn update(&self, record: PostRecord) -> LiveQuery<PostRecord> {
        self.write_once("post_update", move |db| {
            let updated = update_post(db, &record)?;
            let change = TableChange::Updated(updated.id);
            Ok((updated, change))
        })
    }

    fn delete(&self, record: PostRecord) -> LiveQuery<()> {
        self.write_once("post_delete", move |db| {
            delete_post(db, record.id)?;
            Ok(((), TableChange::Deleted(record.id)))
        })
    }
}

fn logged_write<T, W>(
    event: &'static str,
    conn: SharedConnection,
    changes: broadcast::Sender<TableChange>,
    work: W,
) -> impl Future<Output = SourceResult<T>> + Send
where
    T: Send + 'static,
    W: FnOnce(&Connection) -> SourceResult<(T, TableChange)> + Send + 'static,
{
    async move {
        // Publish inside the blocking task; it outlives a dropped caller.
        let committed = run_blocking(conn, move |db| {
            let (value, change) = work(db)?;
            info!(
                "event={} module=source status=ok post_id={}",
                event,
                change.post_id()
            );
            publish(&changes, change);
            Ok(value)
        });

        committed.await.map_err(|err| {
            error!("event={} module=source status=error error={}", event, err);
            err
        })
    }
}

fn ensure_schema(conn: &Connection) -> SourceResult<()> {
    let expected_version = latest_version();
    let actual_version = current_version(conn)?;
    if actual_version != expected_version {
        return Err(SourceError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let table_exists: bool = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1
        );",
        [POSTS_TABLE],
        |row| row.get(0),
    )?;
    if !table_exists {
        return Err(SourceError::MissingRequiredTable(POSTS_TABLE));
    }

    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1);")?;
    let columns = stmt
        .query_map([POSTS_TABLE], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    for &column in REQUIRED_POST_COLUMNS {
        if !columns.iter().any(|existing| existing.as_str() == column) {
            return Err(SourceError::MissingRequiredColumn {
                table: POSTS_TABLE,
                column,
            });
        }
    }

    Ok(())
}

fn select_all_posts(conn: &Connection) -> SourceResult<Vec<PostRecord>> {
    let mut stmt = conn.prepare(&format!("{POST_SELECT_SQL} ORDER BY id ASC;"))?;
    let mut rows = stmt.query([])?;
    let mut posts = Vec::new();
    while let Some(row) = rows.next()? {
        posts.push(parse_post_row(row)?);
    }
    Ok(posts)
}

fn select_post(conn: &Connection, id: PostId) -> SourceResult<PostRecord> {
    let mut stmt = conn.prepare(&format!("{POST_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id])?;
    if let Some(row) = rows.next()? {
        return parse_post_row(row);
    }

    Err(SourceError::NotFound(id))
}

fn insert_post(conn: &Connection, record: &PostRecord) -> SourceResult<PostRecord> {
    conn.execute(
        "INSERT INTO posts (name, title, body, view_count) VALUES (?1, ?2, ?3, ?4);",
        params![
            record.name.as_str(),
            record.title.as_str(),
            record.body.as_str(),
            record.view_count,
        ],
    )?;
    let id = conn.last_insert_rowid();
    select_post(conn, id)
}

fn update_post(conn: &Connection, record: &PostRecord) -> SourceResult<PostRecord> {
    let changed = conn.execute(
        &format!(
            "UPDATE posts
             SET
                name = ?1,
                title = ?2,
                body = ?3,
                view_count = ?4,
                modified_at = MAX(modified_at, {NOW_EPOCH_MS_SQL})
             WHERE id = ?5;"
        ),
        params![
            record.name.as_str(),
            record.title.as_str(),
            record.body.as_str(),
            record.view_count,
            record.id,
        ],
    )?;

    if changed == 0 {
        return Err(SourceError::NotFound(record.id));
    }

    select_post(conn, record.id)
}

fn delete_post(conn: &Connection, id: PostId) -> SourceResult<()> {
    let changed = conn.execute("DELETE FROM posts WHERE id = ?1;", [id])?;
    if changed == 0 {
        return Err(SourceError::NotFound(id));
    }
    Ok(())
}

fn parse_post_row(row: &Row<'_>) -> SourceResult<PostRecord> {
    let record = PostRecord {
        id: row.get("id")?,
        name: row.get("name")?,
        title: row.get("title")?,
        body: row.get("body")?,
        created_at: row.get("created_at")?,
        modified_at: row.get("modified_at")?,
        view_count: row.get("view_count")?,
    };

    if record.view_count < 0 {
        return Err(SourceError::InvalidData(format!(
            "negative view_count `{}` in posts.view_count",
            record.view_count
        )));
    }
    if record.modified_at < record.created_at {
        return Err(SourceError::InvalidData(format!(
            "modified_at `{}` precedes created_at `{}` for post {}",
            record.modified_at, record.created_at, record.id
        )));
    }

    Ok(record)
}
