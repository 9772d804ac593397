//! Post domain model.
//!
//! # Responsibility
//! - Define the canonical post record consumed by repository callers.
//! - Validate caller-provided fields before they reach storage.
//!
//! # Invariants
//! - `id == UNSAVED_POST_ID` only for drafts that were never persisted.
//! - `view_count` is never negative.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Storage-assigned row identifier.
pub type PostId = i64;

/// Identifier carried by drafts before insertion.
pub const UNSAVED_POST_ID: PostId = 0;

/// Canonical post record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    /// Author display name.
    pub name: String,
    pub title: String,
    pub body: String,
    /// Unix epoch milliseconds, assigned on insert.
    pub created_at: i64,
    /// Unix epoch milliseconds, refreshed on every update.
    pub modified_at: i64,
    pub view_count: i64,
}

/// Validation failures for caller-provided posts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostValidationError {
    NegativeViewCount(i64),
    ModifiedBeforeCreated { created_at: i64, modified_at: i64 },
}

impl Display for PostValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NegativeViewCount(value) => {
                write!(f, "view_count ({value}) must be >= 0")
            }
            Self::ModifiedBeforeCreated {
                created_at,
                modified_at,
            } => write!(
                f,
                "modified_at ({modified_at}) must be >= created_at ({created_at})"
            ),
        }
    }
}

impl Error for PostValidationError {}

impl Post {
    /// Creates an unsaved post; storage fills in id and timestamps.
    pub fn draft(
        name: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: UNSAVED_POST_ID,
            name: name.into(),
            title: title.into(),
            body: body.into(),
            created_at: 0,
            modified_at: 0,
            view_count: 0,
        }
    }

    /// Returns whether storage has assigned this post an identifier.
    pub fn is_saved(&self) -> bool {
        self.id != UNSAVED_POST_ID
    }

    /// Checks field invariants.
    ///
    /// Timestamp ordering is only checked for saved posts; drafts carry
    /// placeholder timestamps.
    pub fn validate(&self) -> Result<(), PostValidationError> {
        if self.view_count < 0 {
            return Err(PostValidationError::NegativeViewCount(self.view_count));
        }
        if self.is_saved() && self.modified_at < self.created_at {
            return Err(PostValidationError::ModifiedBeforeCreated {
                created_at: self.created_at,
                modified_at: self.modified_at,
            });
        }
        Ok(())
    }
}
