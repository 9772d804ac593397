//! Core storage and data access for the posts application.
//! This crate owns the schema, the live-query data source and the
//! repository contract consumed by UI layers.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod source;

pub use config::{ConfigError, DbTarget, PostsConfig};
pub use db::{
    AppContextConnectionFactory, ConnectionFactory, DbError, DbResult, DesktopConnectionFactory,
    InMemoryConnectionFactory, SandboxConnectionFactory,
};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use model::post::{Post, PostId, PostValidationError, UNSAVED_POST_ID};
pub use repo::post_repo::{DataError, DataResult, DataStream, PostRepository, SqlitePostRepository};
pub use service::post_service::PostService;
pub use source::{
    LiveQuery, PostDataSource, PostRecord, SourceError, SourceResult, SqlitePostDataSource,
    TableChange,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
