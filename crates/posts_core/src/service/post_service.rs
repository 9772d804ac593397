//! Post use-case service.
//!
//! # Invariants
//! - Service APIs never bypass repository validation or error mapping.
//! - `record_view` persists through a full update, never a partial patch.

use crate::model::post::{Post, PostId};
use crate::repo::post_repo::{DataStream, PostRepository};

/// Use-case facade over a post repository.
pub struct PostService<R: PostRepository> {
    repo: R,
}

impl<R: PostRepository> PostService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Live list backing the posts screen.
    pub fn all_posts(&self) -> DataStream<Vec<Post>> {
        self.repo.fetch_all()
    }

    /// Live detail view of one post.
    pub fn post(&self, id: PostId) -> DataStream<Post> {
        self.repo.fetch_by_id(id)
    }

    /// Creates a post from user input with zero views.
    pub fn publish(
        &self,
        name: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> DataStream<Post> {
        self.repo.create(&Post::draft(name, title, body))
    }

    /// Persists every field of an edited post.
    pub fn revise(&self, post: &Post) -> DataStream<Post> {
        self.repo.update(post)
    }

    /// Deletes `post`; yields `Ok(true)` once it is gone.
    pub fn remove(&self, post: &Post) -> DataStream<bool> {
        self.repo.delete(post)
    }

    /// Increments the view counter of `post` and stores the result.
    pub fn record_view(&self, post: &Post) -> DataStream<Post> {
        let mut viewed = post.clone();
        viewed.view_count = viewed.view_count.saturating_add(1);
        self.repo.update(&viewed)
    }
}
