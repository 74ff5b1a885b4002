//! Debate page for a legacy question
//!
//! Answers are text or voice recordings, each taking a stance, and are
//! ranked by upvotes. Upvoting reads the current count and writes it back
//! incremented; two voters at once can lose a vote.

use std::sync::Arc;

use super::{AudioPlayer, FeedError, FeedResult};
use crate::backend::{self, DataStore, Filter, Select};
use crate::identity::display_name;
use crate::media::MediaUploader;
use crate::models::{Answer, NewAnswer, Question, Stance, ANSWERS, QUESTIONS};

/// Answers split by the stance they take, each keeping the upvote order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StanceGroups {
    pub agree: Vec<Answer>,
    pub disagree: Vec<Answer>,
    pub neutral: Vec<Answer>,
}

impl StanceGroups {
    pub fn from_answers(answers: &[Answer]) -> Self {
        let mut groups = Self::default();
        for answer in answers {
            let bucket = match answer.stance {
                Stance::Agree => &mut groups.agree,
                Stance::Disagree => &mut groups.disagree,
                Stance::Neutral => &mut groups.neutral,
            };
            bucket.push(answer.clone());
        }
        groups
    }

    pub fn get(&self, stance: Stance) -> &[Answer] {
        match stance {
            Stance::Agree => &self.agree,
            Stance::Disagree => &self.disagree,
            Stance::Neutral => &self.neutral,
        }
    }
}

pub struct DebateView {
    store: Arc<dyn DataStore>,
    uploader: MediaUploader,
    question_id: String,

    question: Option<Question>,
    answers: Vec<Answer>,
    audio: AudioPlayer,
    error: Option<String>,
}

impl DebateView {
    pub fn new(store: Arc<dyn DataStore>, uploader: MediaUploader, question_id: &str) -> Self {
        Self {
            store,
            uploader,
            question_id: question_id.to_string(),
            question: None,
            answers: Vec::new(),
            audio: AudioPlayer::default(),
            error: None,
        }
    }

    /// Fetch the question, then its answers
    pub async fn load(&mut self) -> FeedResult<()> {
        let query = Select::all().eq("id", &self.question_id);
        let question: Option<Question> =
            match backend::fetch_one(self.store.as_ref(), QUESTIONS, query).await {
                Ok(question) => question,
                Err(e) => {
                    tracing::error!(question_id = %self.question_id, "Error fetching question: {}", e);
                    self.error = Some("Failed to load question".to_string());
                    return Err(e.into());
                }
            };

        let Some(question) = question else {
            self.error = Some("Question not found".to_string());
            return Err(FeedError::NotFound(format!("Question {}", self.question_id)));
        };
        self.question = Some(question);
        self.refresh_answers().await
    }

    /// Re-fetch answers, most upvoted first
    pub async fn refresh_answers(&mut self) -> FeedResult<()> {
        let query = Select::all()
            .eq("question_id", &self.question_id)
            .order_by("upvotes", false);
        match backend::fetch_rows(self.store.as_ref(), ANSWERS, &query).await {
            Ok(answers) => {
                self.answers = answers;
                self.error = None;
                Ok(())
            }
            Err(e) => {
                tracing::error!(question_id = %self.question_id, "Error fetching answers: {}", e);
                self.error = Some("Failed to load answers".to_string());
                Err(e.into())
            }
        }
    }

    pub fn question(&self) -> Option<&Question> {
        self.question.as_ref()
    }

    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    pub fn by_stance(&self) -> StanceGroups {
        StanceGroups::from_answers(&self.answers)
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

    pub fn audio_finished(&mut self) {
        self.audio.finished();
    }

    pub fn playing_audio(&self) -> Option<&str> {
        self.audio.playing()
    }

    async fn insert_answer(&mut self, answer: NewAnswer) -> FeedResult<Answer> {
        match backend::insert_row::<_, Answer>(self.store.as_ref(), ANSWERS, &answer).await {
            Ok(answer) => {
                tracing::info!(question_id = %self.question_id, stance = %answer.stance, "Answer posted");
                // Saved either way; a failed reload leaves the message up
                let _ = self.refresh_answers().await;
                Ok(answer)
            }
            Err(e) => {
                tracing::error!(question_id = %self.question_id, "Error posting answer: {}", e);
                self.error = Some(format!("Failed to post answer: {}", e));
                Err(e.into())
            }
        }
    }

    /// Post a written answer
    pub async fn submit_text(
        &mut self,
        text: &str,
        nickname: &str,
        stance: Stance,
    ) -> FeedResult<Answer> {
        let text = text.trim();
        if text.is_empty() {
            let e = FeedError::Validation("Please write an answer before submitting".to_string());
            self.error = Some(e.to_string());
            return Err(e);
        }

        self.insert_answer(NewAnswer {
            question_id: self.question_id.clone(),
            text: Some(text.to_string()),
            audio_url: None,
            nickname: display_name(nickname),
            stance,
        })
        .await
    }

    /// Upload a recording to the voice bucket and post it as an answer
    pub async fn submit_voice(
        &mut self,
        recording: Vec<u8>,
        nickname: &str,
        stance: Stance,
    ) -> FeedResult<Answer> {
        if recording.is_empty() {
            let e = FeedError::Validation("Recording is empty".to_string());
            self.error = Some(e.to_string());
            return Err(e);
        }

        let audio_url = match self.uploader.upload_voice(recording).await {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(question_id = %self.question_id, "Voice upload error: {}", e);
                self.error = Some(format!("Failed to upload recording: {}", e));
                return Err(e.into());
            }
        };

        self.insert_answer(NewAnswer {
            question_id: self.question_id.clone(),
            text: None,
            audio_url: Some(audio_url),
            nickname: display_name(nickname),
            stance,
        })
        .await
    }

    /// Add one upvote, then re-fetch so the ranking reflects it
    pub async fn upvote(&mut self, answer_id: &str) -> FeedResult<i64> {
        let current = match self.answers.iter().find(|a| a.id == answer_id) {
            Some(answer) => answer.upvotes,
            None => {
                let query = Select::all().eq("id", answer_id);
                let answer: Option<Answer> =
                    backend::fetch_one(self.store.as_ref(), ANSWERS, query).await?;
                answer
                    .ok_or_else(|| FeedError::NotFound(format!("Answer {}", answer_id)))?
                    .upvotes
            }
        };

        let upvotes = current + 1;
        if let Err(e) = self
            .store
            .update(
                ANSWERS,
                &[Filter::eq("id", answer_id)],
                serde_json::json!({ "upvotes": upvotes }),
            )
            .await
        {
            tracing::error!(answer_id, "Error upvoting: {}", e);
            self.error = Some(format!("Failed to upvote: {}", e));
            return Err(e.into());
        }

        let _ = self.refresh_answers().await;
        Ok(upvotes)
    }
}
