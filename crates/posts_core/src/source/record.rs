//! Storage-native post row.

use crate::model::post::{Post, PostId};

/// Row shape of the `posts` table.
///
/// Field-for-field isomorphic to [`Post`]; conversions never fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    pub id: PostId,
    pub name: String,
    pub title: String,
    pub body: String,
    pub created_at: i64,
    pub modified_at: i64,
    pub view_count: i64,
}

impl From<PostRecord> for Post {
    fn from(record: PostRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            title: record.title,
            body: record.body,
            created_at: record.created_at,
            modified_at: record.modified_at,
            view_count: record.view_count,
        }
    }
}

impl From<Post> for PostRecord {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            name: post.name,
            title: post.title,
            body: post.body,
            created_at: post.created_at,
            modified_at: post.modified_at,
            view_count: post.view_count,
        }
    }
}
