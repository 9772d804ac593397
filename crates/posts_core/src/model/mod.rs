//! Domain model for the posts store.
//!
//! # Invariants
//! - A post identifier is assigned by storage and never changes afterwards.
//! - `modified_at >= created_at` for every stored post.

pub mod post;
