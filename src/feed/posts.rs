//! Typed access to the `posts` table

use std::sync::Arc;

use super::{FeedError, FeedResult};
use crate::backend::{self, BackendResult, DataStore, Filter, Select};
use crate::models::{AnswerPatch, NewPost, Post, POSTS};

#[derive(Clone)]
pub struct PostRepository {
    store: Arc<dyn DataStore>,
}

impl PostRepository {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    /// Every post, newest first
    pub async fn list_all(&self) -> BackendResult<Vec<Post>> {
        let query = Select::all().order_by("created_at", false);
        backend::fetch_rows(self.store.as_ref(), POSTS, &query).await
    }

    /// Posts that have an answer, newest first
    pub async fn list_answered(&self) -> BackendResult<Vec<Post>> {
        let query = Select::all()
            .not_null("answer")
            .order_by("created_at", false);
        backend::fetch_rows(self.store.as_ref(), POSTS, &query).await
    }

    pub async fn get(&self, id: &str) -> BackendResult<Option<Post>> {
        backend::fetch_one(self.store.as_ref(), POSTS, Select::all().eq("id", id)).await
    }

    /// An answered post by slug, falling back to the raw id for links made
    /// before slugs existed
    pub async fn find_article(&self, slug_or_id: &str) -> FeedResult<Post> {
        let by_slug = Select::all().eq("slug", slug_or_id).not_null("answer");
        match backend::fetch_one(self.store.as_ref(), POSTS, by_slug).await {
            Ok(Some(post)) => return Ok(post),
            Ok(None) => {}
            Err(e) => tracing::debug!(slug = slug_or_id, "slug lookup failed: {}", e),
        }

        let by_id = Select::all().eq("id", slug_or_id).not_null("answer");
        match backend::fetch_one(self.store.as_ref(), POSTS, by_id).await {
            Ok(Some(post)) => Ok(post),
            Ok(None) => Err(FeedError::NotFound(format!("Article {}", slug_or_id))),
            Err(e) => {
                tracing::debug!(id = slug_or_id, "id lookup failed: {}", e);
                Err(FeedError::NotFound(format!("Article {}", slug_or_id)))
            }
        }
    }

    pub async fn insert(&self, post: &NewPost) -> BackendResult<Post> {
        backend::insert_row(self.store.as_ref(), POSTS, post).await
    }

    /// Set the post's slug. Returns how many rows the backend reports as
    /// updated; row-level security can make that zero without an error.
    pub async fn assign_slug(&self, id: &str, slug: &str) -> BackendResult<usize> {
        let rows = self
            .store
            .update(
                POSTS,
                &[Filter::eq("id", id)],
                serde_json::json!({ "slug": slug }),
            )
            .await?;
        Ok(rows.len())
    }

    /// Attach an answer (and media) to an open question
    pub async fn attach_answer(&self, id: &str, patch: &AnswerPatch) -> BackendResult<Vec<Post>> {
        let rows = self
            .store
            .update(POSTS, &[Filter::eq("id", id)], serde_json::to_value(patch)?)
            .await?;
        backend::decode_rows(rows)
    }
}
