//! Repository layer: domain-facing post access with explicit results.
//!
//! # Responsibility
//! - Convert storage records to domain posts.
//! - Stop every data source failure at this boundary as a `DataError`.
//!
//! # Invariants
//! - Repository streams never panic on data source failure.
//! - All operations share one error mapping: `NotFound` becomes
//!   `DataNotFound`, everything else becomes `Unknown`.

pub mod post_repo;
