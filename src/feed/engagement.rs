//! Comments and likes
//!
//! Likes are keyed by nickname + post. Callers decide between `like` and
//! `unlike` from the state they last read, so concurrent users can race;
//! the client does not try to prevent it.

use std::sync::Arc;

use crate::backend::{self, BackendResult, DataStore, Filter, Select};
use crate::models::{Comment, Like, NewComment, NewLike, COMMENTS, LIKES};

#[derive(Clone)]
pub struct CommentRepository {
    store: Arc<dyn DataStore>,
}

impl CommentRepository {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    /// Comments on a post, oldest first
    pub async fn list(&self, post_id: &str) -> BackendResult<Vec<Comment>> {
        let query = Select::all()
            .eq("post_id", post_id)
            .order_by("created_at", true);
        backend::fetch_rows(self.store.as_ref(), COMMENTS, &query).await
    }

    pub async fn add(&self, post_id: &str, text: &str, nickname: &str) -> BackendResult<Comment> {
        let comment = NewComment {
            post_id: post_id.to_string(),
            comment: text.to_string(),
            nickname: nickname.to_string(),
        };
        backend::insert_row(self.store.as_ref(), COMMENTS, &comment).await
    }
}

/// Like count of a post and whether the current nickname is among them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LikeSummary {
    pub count: usize,
    pub liked: bool,
}

#[derive(Clone)]
pub struct LikeRepository {
    store: Arc<dyn DataStore>,
}

impl LikeRepository {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, post_id: &str) -> BackendResult<Vec<Like>> {
        let query = Select::all().eq("post_id", post_id);
        backend::fetch_rows(self.store.as_ref(), LIKES, &query).await
    }

    pub async fn summary(&self, post_id: &str, nickname: &str) -> BackendResult<LikeSummary> {
        let likes = self.list(post_id).await?;
        Ok(LikeSummary {
            count: likes.len(),
            liked: likes.iter().any(|like| like.nickname == nickname),
        })
    }

    pub async fn like(&self, post_id: &str, nickname: &str) -> BackendResult<()> {
        let like = NewLike {
            post_id: post_id.to_string(),
            nickname: nickname.to_string(),
        };
        self.store
            .insert(LIKES, serde_json::to_value(&like)?)
            .await?;
        Ok(())
    }

    /// Remove every like `nickname` left on the post
    pub async fn unlike(&self, post_id: &str, nickname: &str) -> BackendResult<usize> {
        self.store
            .delete(
                LIKES,
                &[Filter::eq("post_id", post_id), Filter::eq("nickname", nickname)],
            )
            .await
    }
}
