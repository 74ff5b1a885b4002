//! Articles tab: answered posts with likes and comments

use futures_util::future::join_all;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{
    truncate_text, AudioPlayer, CommentRepository, FeedError, FeedResult, LikeRepository,
    PostRepository, ANSWER_PREVIEW_CHARS,
};
use crate::backend::DataStore;
use crate::identity::display_name;
use crate::models::{Comment, Post};

pub struct ArticlesFeed {
    posts_repo: PostRepository,
    comments_repo: CommentRepository,
    likes_repo: LikeRepository,
    nickname: String,

    posts: Vec<Post>,
    expanded: HashSet<String>,
    comments_open: HashSet<String>,
    comments: HashMap<String, Vec<Comment>>,
    like_counts: HashMap<String, usize>,
    liked: HashSet<String>,
    audio: AudioPlayer,
    loading: bool,
    error: Option<String>,
}

impl ArticlesFeed {
    /// `nickname` is the raw stored value; blank means "Anonymous"
    pub fn new(store: Arc<dyn DataStore>, nickname: &str) -> Self {
        Self {
            posts_repo: PostRepository::new(store.clone()),
            comments_repo: CommentRepository::new(store.clone()),
            likes_repo: LikeRepository::new(store),
            nickname: display_name(nickname),
            posts: Vec::new(),
            expanded: HashSet::new(),
            comments_open: HashSet::new(),
            comments: HashMap::new(),
            like_counts: HashMap::new(),
            liked: HashSet::new(),
            audio: AudioPlayer::default(),
            loading: false,
            error: None,
        }
    }

    /// Load answered posts newest first, then every post's likes
    /// concurrently. Also the "retry" after a failed load.
    pub async fn refresh(&mut self) -> FeedResult<()> {
        self.loading = true;
        self.error = None;

        let result = self.posts_repo.list_answered().await;
        self.loading = false;

        let posts = match result {
            Ok(posts) => posts,
            Err(e) => {
                tracing::error!("Error fetching articles: {}", e);
                self.error = Some("Failed to load articles".to_string());
                return Err(e.into());
            }
        };

        let likes = self.likes_repo.clone();
        let nickname = self.nickname.clone();
        let summaries = join_all(posts.iter().map(|post| {
            let likes = likes.clone();
            let nickname = nickname.clone();
            let id = post.id.clone();
            async move {
                let summary = likes.summary(&id, &nickname).await;
                (id, summary)
            }
        }))
        .await;

        self.like_counts.clear();
        self.liked.clear();
        for (id, summary) in summaries {
            match summary {
                Ok(summary) => {
                    self.like_counts.insert(id.clone(), summary.count);
                    if summary.liked {
                        self.liked.insert(id);
                    }
                }
                Err(e) => tracing::error!(post_id = %id, "Error fetching likes: {}", e),
            }
        }

        self.posts = posts;
        Ok(())
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

    // ---- expand / collapse ----

    /// Whether the answer is long enough to need "Read more"
    pub fn is_collapsible(post: &Post) -> bool {
        post.answer
            .as_deref()
            .map_or(false, |a| a.chars().count() > ANSWER_PREVIEW_CHARS)
    }

    pub fn toggle_expanded(&mut self, post_id: &str) -> bool {
        toggle_in(&mut self.expanded, post_id)
    }

    pub fn is_expanded(&self, post_id: &str) -> bool {
        self.expanded.contains(post_id)
    }

    /// Answer as it should be shown given the expand state
    pub fn answer_text<'a>(&self, post: &'a Post) -> Cow<'a, str> {
        let answer = post.answer.as_deref().unwrap_or_default();
        if self.is_expanded(&post.id) {
            Cow::Borrowed(answer)
        } else {
            truncate_text(answer, ANSWER_PREVIEW_CHARS)
        }
    }

    // ---- audio ----

    pub fn toggle_audio(&mut self, url: &str) -> bool {
        self.audio.toggle(url)
    }

    pub fn audio_finished(&mut self) {
        self.audio.finished();
    }

    pub fn playing_audio(&self) -> Option<&str> {
        self.audio.playing()
    }

    // ---- likes ----

    pub fn like_count(&self, post_id: &str) -> usize {
        self.like_counts.get(post_id).copied().unwrap_or(0)
    }

    pub fn is_liked(&self, post_id: &str) -> bool {
        self.liked.contains(post_id)
    }

    /// Like or unlike based on local state, patching counts on success.
    /// Returns whether the post is liked afterwards.
    pub async fn toggle_like(&mut self, post_id: &str) -> FeedResult<bool> {
        if self.is_liked(post_id) {
            if let Err(e) = self.likes_repo.unlike(post_id, &self.nickname).await {
                tracing::error!(post_id, "Error unliking post: {}", e);
                self.error = Some(format!("Failed to unlike post: {}", e));
                return Err(e.into());
            }
            self.liked.remove(post_id);
            let count = self.like_counts.entry(post_id.to_string()).or_insert(0);
            *count = count.saturating_sub(1);
            Ok(false)
        } else {
            if let Err(e) = self.likes_repo.like(post_id, &self.nickname).await {
                tracing::error!(post_id, "Error liking post: {}", e);
                self.error = Some(format!("Failed to like post: {}", e));
                return Err(e.into());
            }
            self.liked.insert(post_id.to_string());
            *self.like_counts.entry(post_id.to_string()).or_insert(0) += 1;
            Ok(true)
        }
    }

    // ---- comments ----

    /// Open or close a post's comment panel, loading comments the first
    /// time it opens. Returns whether the panel is open.
    pub async fn toggle_comments(&mut self, post_id: &str) -> bool {
        let open = toggle_in(&mut self.comments_open, post_id);
        if open && !self.comments.contains_key(post_id) {
            // On failure the panel opens empty with the error set
            let _ = self.load_comments(post_id).await;
        }
        open
    }

    pub fn comments_open(&self, post_id: &str) -> bool {
        self.comments_open.contains(post_id)
    }

    pub fn comments(&self, post_id: &str) -> &[Comment] {
        self.comments.get(post_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub async fn load_comments(&mut self, post_id: &str) -> FeedResult<()> {
        match self.comments_repo.list(post_id).await {
            Ok(comments) => {
                self.comments.insert(post_id.to_string(), comments);
                Ok(())
            }
            Err(e) => {
                tracing::error!(post_id, "Error fetching comments: {}", e);
                self.error = Some("Failed to load comments".to_string());
                Err(e.into())
            }
        }
    }

    /// Post a comment and reload the thread
    pub async fn add_comment(&mut self, post_id: &str, text: &str) -> FeedResult<Comment> {
        let text = text.trim();
        if text.is_empty() {
            let e = FeedError::Validation("Comment cannot be empty".to_string());
            self.error = Some(e.to_string());
            return Err(e);
        }

        let comment = match self.comments_repo.add(post_id, text, &self.nickname).await {
            Ok(comment) => comment,
            Err(e) => {
                tracing::error!(post_id, "Error submitting comment: {}", e);
                self.error = Some(format!("Failed to add comment: {}", e));
                return Err(e.into());
            }
        };
        // The comment is saved; a failed reload keeps the previous thread
        // on screen and sets the error
        let _ = self.load_comments(post_id).await;
        Ok(comment)
    }
}

/// Flip membership; returns whether `id` is now present
fn toggle_in(set: &mut HashSet<String>, id: &str) -> bool {
    if set.remove(id) {
        false
    } else {
        set.insert(id.to_string());
        true
    }
}
