//! Asking a question or publishing a question with its answer
//!
//! A post is inserted with a temporary slug (built from the current time)
//! and then re-slugged from the identifier the backend assigned. The two
//! writes are independent: if the second fails the post keeps its
//! temporary slug, and [`Submission::slug`] says so.

use chrono::Utc;
use std::sync::Arc;

use super::{FeedError, FeedResult, PostRepository};
use crate::backend::DataStore;
use crate::identity::display_name;
use crate::media::{MediaFile, MediaKind, MediaMode, MediaUploader};
use crate::models::{NewPost, Post};
use crate::slug::unique_slug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PostType {
    #[default]
    QuestionOnly,
    QuestionAnswer,
}

/// Everything typed or picked in the ask form
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub post_type: PostType,
    pub question: String,
    pub description: String,
    pub answer: String,
    pub image: Option<MediaFile>,
    pub audio: Option<MediaFile>,
}

impl PostDraft {
    pub fn question(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }

    pub fn article(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            post_type: PostType::QuestionAnswer,
            question: question.into(),
            answer: answer.into(),
            ..Default::default()
        }
    }

    /// Why the draft cannot be submitted, if anything
    pub fn validate(&self) -> Result<(), FeedError> {
        if self.question.trim().is_empty() {
            return Err(FeedError::Validation("Please enter a question".to_string()));
        }
        if self.post_type == PostType::QuestionAnswer && self.answer.trim().is_empty() {
            return Err(FeedError::Validation(
                "Please provide an answer for your question".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of re-slugging a freshly inserted post
#[derive(Debug, Clone, PartialEq)]
pub enum SlugBackfill {
    Assigned(String),
    /// The post is live under its temporary slug. That slug's suffix is
    /// the first 8 digits of the unix-millis clock, which only changes every
    /// ~27 hours, so identical questions in that window can collide.
    Failed { temporary: String, error: String },
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub post: Post,
    pub slug: SlugBackfill,
}

/// State behind the ask form
pub struct Composer {
    posts: PostRepository,
    uploader: MediaUploader,
    storage_ready: Option<bool>,
    error: Option<String>,
}

impl Composer {
    pub fn new(store: Arc<dyn DataStore>, uploader: MediaUploader) -> Self {
        Self {
            posts: PostRepository::new(store),
            uploader,
            storage_ready: None,
            error: None,
        }
    }

    /// Probe storage; also the manual "retry" behind a failed check
    pub async fn check_storage(&mut self) -> bool {
        let ready = self.uploader.probe().await;
        self.storage_ready = Some(ready);
        ready
    }

    /// `None` until the first probe completes
    pub fn storage_ready(&self) -> Option<bool> {
        self.storage_ready
    }

    /// Media is disabled while the probe is outstanding
    pub fn media_mode(&self) -> MediaMode {
        match self.storage_ready {
            Some(ready) => self.uploader.mode(ready),
            None => MediaMode::Disabled,
        }
    }

    /// Accept a picked file into the draft, rejecting oversize files and
    /// picks made while media is disabled
    pub fn select_media(
        &self,
        draft: &mut PostDraft,
        file: MediaFile,
        kind: MediaKind,
    ) -> FeedResult<()> {
        if self.media_mode() == MediaMode::Disabled {
            return Err(crate::media::MediaError::Disabled.into());
        }
        self.uploader.validate(&file, kind)?;
        match kind {
            MediaKind::Image => draft.image = Some(file),
            MediaKind::Audio => draft.audio = Some(file),
        }
        Ok(())
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    async fn resolve_media(
        &self,
        file: Option<&MediaFile>,
        kind: MediaKind,
    ) -> FeedResult<Option<String>> {
        let Some(file) = file else {
            return Ok(None);
        };
        match self.uploader.attach(file, kind, self.media_mode()).await {
            Ok(url) => Ok(url),
            Err(crate::media::MediaError::Disabled) => {
                tracing::warn!("Dropping {} attachment: media is disabled", kind);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Validate, upload media, insert, then backfill the final slug
    pub async fn submit(&mut self, draft: &PostDraft, nickname: &str) -> FeedResult<Submission> {
        if let Err(e) = draft.validate() {
            self.error = Some(e.to_string());
            return Err(e);
        }
        self.error = None;

        let picks = [(&draft.image, MediaKind::Image), (&draft.audio, MediaKind::Audio)];
        for (file, kind) in picks {
            if let Some(file) = file {
                if let Err(e) = self.uploader.validate(file, kind) {
                    self.error = Some(e.to_string());
                    return Err(e.into());
                }
            }
        }

        let image_url = self.resolve_media(draft.image.as_ref(), MediaKind::Image).await;
        let audio_url = self.resolve_media(draft.audio.as_ref(), MediaKind::Audio).await;
        let (image_url, audio_url) = match (image_url, audio_url) {
            (Ok(image), Ok(audio)) => (image, audio),
            (Err(e), _) | (_, Err(e)) => {
                self.error = Some(e.to_string());
                return Err(e);
            }
        };

        let question = draft.question.trim();
        let temporary = unique_slug(question, &Utc::now().timestamp_millis().to_string());
        let description = draft.description.trim();
        let new_post = NewPost {
            question: question.to_string(),
            description: (!description.is_empty()).then(|| description.to_string()),
            nickname: display_name(nickname),
            slug: temporary.clone(),
            answer: match draft.post_type {
                PostType::QuestionAnswer => Some(draft.answer.trim().to_string()),
                PostType::QuestionOnly => None,
            },
            image_url,
            audio_url,
        };

        let mut post = match self.posts.insert(&new_post).await {
            Ok(post) => post,
            Err(e) => {
                tracing::error!("Insert error: {}", e);
                self.error = Some(format!("Failed to submit post: {}", e));
                return Err(e.into());
            }
        };

        let final_slug = unique_slug(question, &post.id);
        let backfill = match self.posts.assign_slug(&post.id, &final_slug).await {
            Ok(0) => Err("no post row was updated".to_string()),
            Ok(_) => Ok(()),
            Err(e) => Err(e.to_string()),
        };
        let slug = match backfill {
            Ok(()) => {
                post.slug = Some(final_slug.clone());
                SlugBackfill::Assigned(final_slug)
            }
            Err(error) => {
                tracing::warn!(
                    post_id = %post.id,
                    slug = %temporary,
                    "Slug backfill failed, post keeps its temporary slug: {}",
                    error
                );
                SlugBackfill::Failed { temporary, error }
            }
        };

        tracing::info!(post_id = %post.id, answered = post.is_answered(), "Post submitted");
        Ok(Submission { post, slug })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendResult, Filter, MemoryBackend, Operation, Select};
    use crate::config::MediaConfig;
    use crate::models::POSTS;
    use serde_json::Value;

    async fn composer(buckets: &[&str]) -> (Arc<MemoryBackend>, Composer) {
        let backend = Arc::new(MemoryBackend::with_buckets(buckets).await);
        let uploader = MediaUploader::new(backend.clone(), MediaConfig::default());
        let composer = Composer::new(backend.clone(), uploader);
        (backend, composer)
    }

    #[tokio::test]
    async fn test_validation_blocks_before_network() {
        let (backend, mut composer) = composer(&["media"]).await;

        let err = composer.submit(&PostDraft::question("   "), "a").await.unwrap_err();
        assert!(matches!(err, FeedError::Validation(_)));
        assert_eq!(composer.error(), Some("Please enter a question"));

        let err = composer
            .submit(&PostDraft::article("Why?", " "), "a")
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::Validation(_)));
        assert_eq!(backend.calls(), 0);

        composer.dismiss_error();
        assert_eq!(composer.error(), None);
    }

    #[tokio::test]
    async fn test_question_gets_final_slug() {
        let (backend, mut composer) = composer(&["media"]).await;

        let mut draft = PostDraft::question("  Hello, World!  ");
        draft.description = "   ".to_string();
        let submission = composer.submit(&draft, "").await.unwrap();

        let post = &submission.post;
        let expected = format!("hello-world-{}", &post.id[..8]);
        assert_eq!(submission.slug, SlugBackfill::Assigned(expected.clone()));
        assert_eq!(post.slug.as_deref(), Some(expected.as_str()));
        assert_eq!(post.question, "Hello, World!");
        assert_eq!(post.nickname, "Anonymous");
        assert_eq!(post.description, None);
        assert!(!post.is_answered());

        let stored = &backend.rows(POSTS).await[0];
        assert_eq!(stored["slug"], expected);
    }

    #[tokio::test]
    async fn test_article_with_uploaded_image() {
        let (backend, mut composer) = composer(&["media"]).await;
        assert!(composer.check_storage().await);
        assert_eq!(composer.media_mode(), MediaMode::Upload);

        let mut draft = PostDraft::article("Best chai?", "Masala, always.");
        composer
            .select_media(&mut draft, MediaFile::new("chai.png", vec![7; 16]), MediaKind::Image)
            .unwrap();

        let submission = composer.submit(&draft, "Kiran").await.unwrap();
        assert_eq!(submission.post.answer.as_deref(), Some("Masala, always."));
        let image_url = submission.post.image_url.unwrap();
        assert!(image_url.contains("/media/images/"));
        assert_eq!(backend.object_count("media").await, 1);
    }

    #[tokio::test]
    async fn test_storage_down_still_allows_text_posts() {
        let (backend, mut composer) = composer(&["media"]).await;
        backend.fail_storage().await;

        assert!(!composer.check_storage().await);
        assert_eq!(composer.media_mode(), MediaMode::Disabled);

        let mut draft = PostDraft::question("Text only?");
        let err = composer
            .select_media(&mut draft, MediaFile::new("a.png", vec![1]), MediaKind::Image)
            .unwrap_err();
        assert!(matches!(err, FeedError::Media(_)));
        assert!(draft.image.is_none());

        let submission = composer.submit(&draft, "Dev").await.unwrap();
        assert_eq!(submission.post.image_url, None);
        assert_eq!(backend.rows(POSTS).await.len(), 1);
    }

    #[tokio::test]
    async fn test_oversize_pick_is_rejected() {
        let (backend, mut composer) = composer(&["media"]).await;
        composer.check_storage().await;
        let calls = backend.calls();

        let mut draft = PostDraft::question("Big?");
        let big = MediaFile::new("big.jpg", vec![0; 5 * 1024 * 1024 + 1]);
        let err = composer
            .select_media(&mut draft, big.clone(), MediaKind::Image)
            .unwrap_err();
        assert!(matches!(err, FeedError::Media(_)));

        // A file that slipped into the draft is still stopped before any call
        draft.image = Some(big);
        assert!(composer.submit(&draft, "x").await.is_err());
        assert_eq!(backend.calls(), calls);
    }

    #[tokio::test]
    async fn test_slug_backfill_failure_is_reported() {
        let (backend, mut composer) = composer(&[]).await;
        backend.fail(POSTS, Operation::Update).await;

        let submission = composer
            .submit(&PostDraft::question("Partial?"), "a")
            .await
            .unwrap();

        match submission.slug {
            SlugBackfill::Failed { temporary, .. } => {
                assert!(temporary.starts_with("partial-"));
                assert_eq!(submission.post.slug.as_deref(), Some(temporary.as_str()));
            }
            other => panic!("expected failed backfill, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_insert_failure_surfaces_message() {
        let (backend, mut composer) = composer(&[]).await;
        backend.fail(POSTS, Operation::Insert).await;

        let err = composer
            .submit(&PostDraft::question("Will it fail?"), "a")
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::Backend(_)));
        assert!(composer
            .error()
            .unwrap()
            .starts_with("Failed to submit post:"));
    }

    /// Accepts updates but reports no rows touched, like a PATCH filtered
    /// out by row-level security
    struct SilentUpdates(Arc<MemoryBackend>);

    #[async_trait::async_trait]
    impl DataStore for SilentUpdates {
        async fn select(&self, table: &str, query: &Select) -> BackendResult<Vec<Value>> {
            self.0.select(table, query).await
        }

        async fn insert(&self, table: &str, row: Value) -> BackendResult<Value> {
            self.0.insert(table, row).await
        }

        async fn update(&self, _: &str, _: &[Filter], _: Value) -> BackendResult<Vec<Value>> {
            Ok(Vec::new())
        }

        async fn delete(&self, table: &str, filters: &[Filter]) -> BackendResult<usize> {
            self.0.delete(table, filters).await
        }
    }

    #[tokio::test]
    async fn test_slug_backfill_touching_no_rows_is_reported() {
        let backend = Arc::new(MemoryBackend::new());
        let uploader = MediaUploader::new(backend.clone(), MediaConfig::default());
        let mut composer = Composer::new(Arc::new(SilentUpdates(backend.clone())), uploader);

        let submission = composer
            .submit(&PostDraft::article("Hello world", "yes"), "a")
            .await
            .unwrap();

        let stored = backend.rows(POSTS).await[0]["slug"]
            .as_str()
            .unwrap()
            .to_string();
        match &submission.slug {
            SlugBackfill::Failed { temporary, error } => {
                assert_eq!(temporary, &stored);
                assert!(error.contains("no post row"));
            }
            other => panic!("expected failed backfill, got {:?}", other),
        }
        assert_eq!(submission.post.slug.as_deref(), Some(stored.as_str()));

        // The link handed back resolves
        let posts = PostRepository::new(backend.clone());
        assert!(posts.find_article(&stored).await.is_ok());
    }
}
