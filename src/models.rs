//! Row types for the hosted tables
//!
//! Read models mirror the stored rows; `New*` types are the insert payloads
//! (generated columns omitted).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const POSTS: &str = "posts";
pub const COMMENTS: &str = "comments";
pub const LIKES: &str = "likes";
pub const QUESTIONS: &str = "questions";
pub const ANSWERS: &str = "answers";

/// A question, optionally answered. Rendered as an article once answered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
    pub nickname: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn is_answered(&self) -> bool {
        self.answer.is_some()
    }

    /// Path segment used in article links
    pub fn route_key(&self) -> &str {
        self.slug.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPost {
    pub question: String,
    pub description: Option<String>,
    pub nickname: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

/// Patch applied when a question receives its answer
#[derive(Debug, Clone, Serialize)]
pub struct AnswerPatch {
    pub answer: String,
    pub nickname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub comment: String,
    pub nickname: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewComment {
    pub post_id: String,
    pub comment: String,
    pub nickname: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Like {
    pub id: String,
    pub post_id: String,
    pub nickname: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewLike {
    pub post_id: String,
    pub nickname: String,
}

/// Legacy debate-style question
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub language: String,
    pub timestamp: DateTime<Utc>,
}

/// Position an answer takes in a debate
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Stance {
    Agree,
    Disagree,
    #[default]
    Neutral,
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stance::Agree => "agree",
            Stance::Disagree => "disagree",
            Stance::Neutral => "neutral",
        };
        f.write_str(s)
    }
}

impl FromStr for Stance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "agree" => Ok(Stance::Agree),
            "disagree" => Ok(Stance::Disagree),
            "neutral" => Ok(Stance::Neutral),
            other => Err(format!("unknown stance: {}", other)),
        }
    }
}

/// Legacy answer: text or a voice recording, with an upvote counter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub id: String,
    pub question_id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    pub nickname: String,
    #[serde(default)]
    pub upvotes: i64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub stance: Stance,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewAnswer {
    pub question_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    pub nickname: String,
    pub stance: Stance,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_post_from_row() {
        let post: Post = serde_json::from_value(json!({
            "id": "0b9f3f6e-1111-2222-3333-444455556666",
            "question": "What is a slug?",
            "answer": null,
            "nickname": "Asha",
            "created_at": "2024-05-01T10:00:00+00:00"
        }))
        .unwrap();

        assert!(!post.is_answered());
        assert_eq!(post.route_key(), "0b9f3f6e-1111-2222-3333-444455556666");
        assert_eq!(post.description, None);
    }

    #[test]
    fn test_new_post_omits_empty_optionals() {
        let row = serde_json::to_value(NewPost {
            question: "q".into(),
            description: None,
            nickname: "n".into(),
            slug: "q-1".into(),
            answer: None,
            image_url: None,
            audio_url: None,
        })
        .unwrap();

        assert_eq!(row["description"], json!(null));
        assert!(row.get("answer").is_none());
        assert!(row.get("image_url").is_none());
    }

    #[test]
    fn test_stance_wire_format() {
        assert_eq!(serde_json::to_value(Stance::Disagree).unwrap(), json!("disagree"));
        assert_eq!("AGREE".parse::<Stance>().unwrap(), Stance::Agree);
        assert!("maybe".parse::<Stance>().is_err());
        assert_eq!(Stance::default(), Stance::Neutral);
    }
}
