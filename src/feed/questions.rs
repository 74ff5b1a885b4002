//! Questions tab: every post, with an inline form to answer open ones

use std::sync::Arc;

use super::{AudioPlayer, FeedError, FeedResult, PostRepository};
use crate::backend::DataStore;
use crate::identity::display_name;
use crate::media::{MediaError, MediaFile, MediaKind, MediaUploader};
use crate::models::{AnswerPatch, Post};

/// The answer being written for the selected question
#[derive(Debug, Clone, Default)]
pub struct AnswerDraft {
    pub text: String,
    pub image: Option<MediaFile>,
    pub audio: Option<MediaFile>,
}

pub struct QuestionsFeed {
    posts_repo: PostRepository,
    uploader: MediaUploader,
    nickname: String,

    posts: Vec<Post>,
    selected: Option<String>,
    draft: AnswerDraft,
    storage_ready: bool,
    audio: AudioPlayer,
    loading: bool,
    error: Option<String>,
}

impl QuestionsFeed {
    pub fn new(store: Arc<dyn DataStore>, uploader: MediaUploader, nickname: &str) -> Self {
        Self {
            posts_repo: PostRepository::new(store),
            uploader,
            nickname: display_name(nickname),
            posts: Vec::new(),
            selected: None,
            draft: AnswerDraft::default(),
            storage_ready: false,
            audio: AudioPlayer::default(),
            loading: false,
            error: None,
        }
    }

    pub async fn check_storage(&mut self) -> bool {
        self.storage_ready = self.uploader.probe().await;
        self.storage_ready
    }

    /// Media controls are only offered when storage is reachable
    pub fn media_enabled(&self) -> bool {
        self.storage_ready
    }

    pub async fn refresh(&mut self) -> FeedResult<()> {
        self.loading = true;
        let result = self.posts_repo.list_all().await;
        self.loading = false;

        match result {
            Ok(posts) => {
                self.posts = posts;
                self.error = None;
                Ok(())
            }
            Err(e) => {
                tracing::error!("Error fetching questions: {}", e);
                self.error = Some("Failed to load questions".to_string());
                Err(e.into())
            }
        }
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn toggle_audio(&mut self, url: &str) -> bool {
        self.audio.toggle(url)
    }

    pub fn playing_audio(&self) -> Option<&str> {
        self.audio.playing()
    }

    // ---- answering ----

    /// Open the answer form for a question
    pub fn select(&mut self, post_id: &str) {
        self.selected = Some(post_id.to_string());
        self.error = None;
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Close the form and throw the draft away
    pub fn cancel(&mut self) {
        self.selected = None;
        self.draft = AnswerDraft::default();
        self.error = None;
    }

    pub fn draft(&self) -> &AnswerDraft {
        &self.draft
    }

    pub fn set_answer_text(&mut self, text: impl Into<String>) {
        self.draft.text = text.into();
    }

    /// Attach a picked file to the draft
    pub fn attach(&mut self, file: MediaFile, kind: MediaKind) -> FeedResult<()> {
        if !self.storage_ready {
            return Err(MediaError::Disabled.into());
        }
        self.uploader.validate(&file, kind)?;
        match kind {
            MediaKind::Image => self.draft.image = Some(file),
            MediaKind::Audio => self.draft.audio = Some(file),
        }
        Ok(())
    }

    async fn upload_hosted(&self, file: Option<&MediaFile>, kind: MediaKind) -> Option<String> {
        if !self.storage_ready {
            return None;
        }
        let url = self.uploader.upload(file?, kind).await?;
        // Only hosted URLs are written into an answered post
        if url.starts_with("http") {
            Some(url)
        } else {
            None
        }
    }

    /// Answer the selected question, then reload the feed
    pub async fn submit_answer(&mut self) -> FeedResult<Post> {
        let Some(post_id) = self.selected.clone() else {
            return Err(FeedError::Validation("Select a question to answer".to_string()));
        };
        let text = self.draft.text.trim().to_string();
        if text.is_empty() {
            let e = FeedError::Validation("Please write an answer before submitting".to_string());
            self.error = Some(e.to_string());
            return Err(e);
        }
        self.error = None;

        let image_url = self
            .upload_hosted(self.draft.image.as_ref(), MediaKind::Image)
            .await;
        let audio_url = self
            .upload_hosted(self.draft.audio.as_ref(), MediaKind::Audio)
            .await;

        let patch = AnswerPatch {
            answer: text,
            nickname: self.nickname.clone(),
            image_url,
            audio_url,
        };

        let updated = match self.posts_repo.attach_answer(&post_id, &patch).await {
            Ok(updated) => updated,
            Err(e) => {
                tracing::error!(post_id = %post_id, "Update error: {}", e);
                self.error = Some(format!("Failed to submit answer: {}", e));
                return Err(e.into());
            }
        };
        let Some(post) = updated.into_iter().next() else {
            self.error = Some("Failed to submit answer: question no longer exists".to_string());
            return Err(FeedError::NotFound(format!("Question {}", post_id)));
        };

        self.selected = None;
        self.draft = AnswerDraft::default();
        // The answer is saved; a failed reload only leaves the old list up
        let _ = self.refresh().await;
        Ok(post)
    }
}
