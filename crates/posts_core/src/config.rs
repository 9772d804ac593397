//! Startup configuration resolved from environment variables.
//!
//! # Responsibility
//! - Pick the deployment target that produces the database connection.
//! - Carry logging settings for `init_logging`.
//!
//! # Invariants
//! - Blank variables are treated as unset.
//! - `app` and `sandbox` targets require `POSTS_DB_DIR`.

use crate::db::{
    AppContextConnectionFactory, ConnectionFactory, DesktopConnectionFactory,
    InMemoryConnectionFactory, SandboxConnectionFactory, DB_NAME,
};
use crate::logging::default_log_level;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_DB_TARGET: &str = "POSTS_DB_TARGET";
pub const ENV_DB_DIR: &str = "POSTS_DB_DIR";
pub const ENV_DB_NAME: &str = "POSTS_DB_NAME";
pub const ENV_LOG_LEVEL: &str = "POSTS_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "POSTS_LOG_DIR";

/// Where the database connection comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbTarget {
    Desktop {
        base_dir: Option<PathBuf>,
        debug: bool,
    },
    AppContext {
        files_dir: PathBuf,
    },
    Sandbox {
        root: PathBuf,
    },
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    UnknownTarget(String),
    MissingDbDir { target: &'static str },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownTarget(value) => write!(
                f,
                "unsupported {ENV_DB_TARGET} `{value}`; expected desktop|desktop-debug|app|sandbox|memory"
            ),
            Self::MissingDbDir { target } => {
                write!(f, "{ENV_DB_DIR} is required for target `{target}`")
            }
        }
    }
}

impl Error for ConfigError {}

/// Resolved startup configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostsConfig {
    pub target: DbTarget,
    pub db_name: String,
    pub log_level: String,
    /// Absolute directory for rolling log files; logging stays off when unset.
    pub log_dir: Option<String>,
}

impl PostsConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, keyed by `POSTS_*` names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let db_dir = read(ENV_DB_DIR).map(PathBuf::from);
        let target_name = read(ENV_DB_TARGET).unwrap_or_else(|| "desktop".to_string());
        let target = match target_name.to_ascii_lowercase().as_str() {
            "desktop" => DbTarget::Desktop {
                base_dir: db_dir,
                debug: false,
            },
            "desktop-debug" => DbTarget::Desktop {
                base_dir: db_dir,
                debug: true,
            },
            "app" => DbTarget::AppContext {
                files_dir: db_dir.ok_or(ConfigError::MissingDbDir { target: "app" })?,
            },
            "sandbox" => DbTarget::Sandbox {
                root: db_dir.ok_or(ConfigError::MissingDbDir { target: "sandbox" })?,
            },
            "memory" => DbTarget::Memory,
            _ => return Err(ConfigError::UnknownTarget(target_name)),
        };

        Ok(Self {
            target,
            db_name: read(ENV_DB_NAME).unwrap_or_else(|| DB_NAME.to_string()),
            log_level: read(ENV_LOG_LEVEL).unwrap_or_else(|| default_log_level().to_string()),
            log_dir: read(ENV_LOG_DIR),
        })
    }

    /// Builds the connection factory for the configured target.
    pub fn connection_factory(&self) -> Box<dyn ConnectionFactory + Send + Sync> {
        match &self.target {
            DbTarget::Desktop {
                base_dir: Some(base_dir),
                ..
            } => Box::new(
                DesktopConnectionFactory::with_base_dir(base_dir.clone()).db_name(self.db_name.as_str()),
            ),
            DbTarget::Desktop {
                base_dir: None,
                debug: true,
            } => Box::new(DesktopConnectionFactory::debug().db_name(self.db_name.as_str())),
            DbTarget::Desktop {
                base_dir: None,
                debug: false,
            } => Box::new(DesktopConnectionFactory::new().db_name(self.db_name.as_str())),
            DbTarget::AppContext { files_dir } => Box::new(AppContextConnectionFactory::with_name(
                files_dir.clone(),
                self.db_name.as_str(),
            )),
            DbTarget::Sandbox { root } => {
                Box::new(SandboxConnectionFactory::new(root.clone(), self.db_name.as_str()))
            }
            DbTarget::Memory => Box::new(InMemoryConnectionFactory),
        }
    }
}
