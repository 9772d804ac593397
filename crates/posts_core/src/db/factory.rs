//! Platform-specific construction of migrated SQLite connections.
//!
//! # Responsibility
//! - Resolve where each deployment target keeps its database file.
//! - Hand out connections that already passed `open_db` bootstrap.
//!
//! # Invariants
//! - Every factory returns a connection at the latest schema version.
//! - Parent directories are created before the file is opened.

use super::migrations::{current_version, latest_version};
use super::{open_db, open_db_in_memory, DbError, DbResult};
use log::info;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};

/// Default database file name shared by every target.
pub const DB_NAME: &str = "posts.db";

const DESKTOP_APP_DIR: &str = "PostsDemo";
const APP_DATABASES_DIR: &str = "databases";

/// Produces a usable, migrated connection for one deployment target.
pub trait ConnectionFactory {
    fn create_connection(&self) -> DbResult<Connection>;
}

impl<F: ConnectionFactory + ?Sized> ConnectionFactory for Box<F> {
    fn create_connection(&self) -> DbResult<Connection> {
        (**self).create_connection()
    }
}

/// Mobile target: a file bound to the application's private files directory.
#[derive(Debug, Clone)]
pub struct AppContextConnectionFactory {
    files_dir: PathBuf,
    db_name: String,
}

impl AppContextConnectionFactory {
    pub fn new(files_dir: impl Into<PathBuf>) -> Self {
        Self::with_name(files_dir, DB_NAME)
    }

    pub fn with_name(files_dir: impl Into<PathBuf>, db_name: impl Into<String>) -> Self {
        Self {
            files_dir: files_dir.into(),
            db_name: db_name.into(),
        }
    }

    /// `<files_dir>/databases/<db_name>`
    pub fn database_path(&self) -> PathBuf {
        self.files_dir.join(APP_DATABASES_DIR).join(&self.db_name)
    }
}

impl ConnectionFactory for AppContextConnectionFactory {
    fn create_connection(&self) -> DbResult<Connection> {
        open_in_dir(&self.database_path())
    }
}

/// Desktop target: a file under the per-user data directory.
///
/// Before opening, the stored `user_version` is probed on a separate
/// read-only handle so the forward migration can be reported.
#[derive(Debug, Clone)]
pub struct DesktopConnectionFactory {
    base_dir: Option<PathBuf>,
    debug: bool,
    db_name: String,
}

impl DesktopConnectionFactory {
    /// Uses `<data_dir>/PostsDemo/posts.db`.
    pub fn new() -> Self {
        Self {
            base_dir: None,
            debug: false,
            db_name: DB_NAME.to_string(),
        }
    }

    /// Uses the system temp directory instead of the per-user data directory.
    pub fn debug() -> Self {
        Self {
            debug: true,
            ..Self::new()
        }
    }

    /// Uses `<base_dir>/posts.db` with no app folder appended.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
            ..Self::new()
        }
    }

    pub fn db_name(mut self, db_name: impl Into<String>) -> Self {
        self.db_name = db_name.into();
        self
    }

    /// Resolves the database file path for this factory.
    pub fn database_path(&self) -> DbResult<PathBuf> {
        if let Some(base_dir) = &self.base_dir {
            return Ok(base_dir.join(&self.db_name));
        }

        let parent = if self.debug {
            std::env::temp_dir()
        } else {
            dirs::data_dir()
                .or_else(dirs::home_dir)
                .ok_or(DbError::NoDataDirectory)?
        };
        Ok(parent.join(DESKTOP_APP_DIR).join(&self.db_name))
    }
}

impl Default for DesktopConnectionFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionFactory for DesktopConnectionFactory {
    fn create_connection(&self) -> DbResult<Connection> {
        let path = self.database_path()?;
        let stored = stored_schema_version(&path)?;
        info!(
            "event=db_schema_check module=db status=ok stored_version={} latest_version={}",
            stored,
            latest_version()
        );
        open_in_dir(&path)
    }
}

/// Embedded/native target: a named store inside a sandbox root.
#[derive(Debug, Clone)]
pub struct SandboxConnectionFactory {
    root: PathBuf,
    name: String,
}

impl SandboxConnectionFactory {
    pub fn new(root: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            name: name.into(),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(&self.name)
    }
}

impl ConnectionFactory for SandboxConnectionFactory {
    fn create_connection(&self) -> DbResult<Connection> {
        open_in_dir(&self.database_path())
    }
}

/// Ephemeral target; every call yields a fresh, empty database.
#[derive(Debug, Clone, Copy, Default)]
pub struct InMemoryConnectionFactory;

impl ConnectionFactory for InMemoryConnectionFactory {
    fn create_connection(&self) -> DbResult<Connection> {
        open_db_in_memory()
    }
}

fn open_in_dir(path: &Path) -> DbResult<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    open_db(path)
}

/// Returns 0 for a database file that does not exist yet.
fn stored_schema_version(path: &Path) -> DbResult<u32> {
    if !path.exists() {
        return Ok(0);
    }
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    current_version(&conn)
}

#[cfg(test)]
mod tests {
    use super::{AppContextConnectionFactory, DesktopConnectionFactory, SandboxConnectionFactory};
    use std::path::Path;

    #[test]
    fn app_context_path_lives_under_databases_dir() {
        let factory = AppContextConnectionFactory::new("/data/app/files");
        assert_eq!(
            factory.database_path(),
            Path::new("/data/app/files/databases/posts.db")
        );
    }

    #[test]
    fn desktop_debug_path_uses_temp_dir() {
        let path = DesktopConnectionFactory::debug()
            .db_name("debug.db")
            .database_path()
            .unwrap();
        assert!(path.starts_with(std::env::temp_dir()));
        assert!(path.ends_with("PostsDemo/debug.db"));
    }

    #[test]
    fn sandbox_path_joins_store_name() {
        let factory = SandboxConnectionFactory::new("/sandbox", "posts.sqlite3");
        assert_eq!(factory.database_path(), Path::new("/sandbox/posts.sqlite3"));
    }
}
