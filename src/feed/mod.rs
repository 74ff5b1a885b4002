//! Feeds and Views
//!
//! Render-independent view state for the home feed tabs and the debate
//! page. Each view owns its displayed collection plus per-item toggles and
//! issues CRUD calls through the repositories.
//!
//! State is optimistic: after a successful write a view re-fetches or
//! patches locally; after a failure it records a dismissible message and
//! leaves what it was showing untouched. Nothing is retried automatically.
//!
//! - [`ArticlesFeed`]: answered posts with likes, comments, expand, audio
//! - [`QuestionsFeed`]: every post, answering an open question
//! - [`Composer`]: asking a question or publishing a question with answer
//! - [`DebateView`]: legacy question with stance-grouped, upvoted answers

mod articles;
mod composer;
mod debate;
mod engagement;
mod format;
mod posts;
mod questions;

pub use articles::ArticlesFeed;
pub use composer::{Composer, PostDraft, PostType, SlugBackfill, Submission};
pub use debate::{DebateView, StanceGroups};
pub use engagement::{CommentRepository, LikeRepository, LikeSummary};
pub use format::{time_ago_long, time_ago_short, truncate_text, ANSWER_PREVIEW_CHARS};
pub use posts::PostRepository;
pub use questions::{AnswerDraft, QuestionsFeed};

use thiserror::Error;

use crate::backend::BackendError;
use crate::media::MediaError;

/// Errors surfaced by feed and view operations
#[derive(Error, Debug)]
pub enum FeedError {
    /// A required field is empty; no request was made
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("{0} not found")]
    NotFound(String),
}

pub type FeedResult<T> = Result<T, FeedError>;

/// Which audio URL, if any, is playing. At most one at a time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioPlayer {
    playing: Option<String>,
}

impl AudioPlayer {
    /// Start `url`, or stop it if it is the one playing. Returns whether
    /// `url` is playing afterwards.
    pub fn toggle(&mut self, url: &str) -> bool {
        if self.playing.as_deref() == Some(url) {
            self.playing = None;
            false
        } else {
            self.playing = Some(url.to_string());
            true
        }
    }

    /// Playback reached the end
    pub fn finished(&mut self) {
        self.playing = None;
    }

    pub fn is_playing(&self, url: &str) -> bool {
        self.playing.as_deref() == Some(url)
    }

    pub fn playing(&self) -> Option<&str> {
        self.playing.as_deref()
    }
}
