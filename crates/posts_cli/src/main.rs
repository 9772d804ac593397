//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `posts_core` linkage and the configured database end to end.
//! - Keep output deterministic for quick local sanity checks.

use futures::StreamExt;
use posts_core::{
    init_logging_from_config, PostRepository, PostsConfig, SqlitePostDataSource,
    SqlitePostRepository,
};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    println!("posts_core ping={}", posts_core::ping());
    println!("posts_core version={}", posts_core::core_version());

    match run().await {
        Ok(count) => {
            println!("posts count={count}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("posts_cli failed: {message}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<usize, String> {
    let config = PostsConfig::from_env().map_err(|err| err.to_string())?;
    init_logging_from_config(&config).map_err(|err| err.to_string())?;

    let factory = config.connection_factory();
    let source = SqlitePostDataSource::open(&*factory).map_err(|err| err.to_string())?;
    let repo = SqlitePostRepository::new(source);

    match repo.fetch_all().next().await {
        Some(Ok(posts)) => Ok(posts.len()),
        Some(Err(err)) => Err(err.to_string()),
        None => Err("post list ended without a snapshot".to_string()),
    }
}
