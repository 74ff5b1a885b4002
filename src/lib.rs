//! # RytUp
//!
//! Client for a community Q&A / micro-blog: people ask questions, answer
//! them with text, images or voice, and publish answered questions as
//! shareable articles. All state lives in a hosted backend (a PostgREST
//! style database plus bucket object storage); the client reads and writes
//! it over HTTP.
//!
//! ## Modules
//!
//! - [`backend`]: data store and object store traits, REST and in-memory clients
//! - [`identity`]: the locally persisted nickname
//! - [`slug`]: URL slugs for articles
//! - [`media`]: size checks, uploads and the storage availability probe
//! - [`feed`]: view state for the articles, questions, composer and debate views
//! - [`article`]: article lookup and link-preview metadata
//! - [`share`]: the share fallback chain
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rytup::backend::{RestClient, RestConfig};
//! use rytup::config::Config;
//! use rytup::feed::ArticlesFeed;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     let client = Arc::new(RestClient::new(RestConfig::from(&config.backend))?);
//!
//!     let mut feed = ArticlesFeed::new(client, "Asha");
//!     feed.refresh().await?;
//!     for post in feed.posts() {
//!         println!("{} ({} likes)", post.question, feed.like_count(&post.id));
//!     }
//!     Ok(())
//! }
//! ```

pub mod article;
pub mod backend;
pub mod config;
pub mod feed;
pub mod identity;
pub mod media;
pub mod models;
pub mod share;
pub mod slug;

pub use article::{load_article, ArticlePage, PageMetadata};
pub use backend::{
    BackendError, BackendResult, DataStore, MemoryBackend, ObjectStore, RestClient, RestConfig,
};
pub use config::{Config, ConfigError, LoggingConfig};
pub use feed::{
    ArticlesFeed, Composer, DebateView, FeedError, FeedResult, PostDraft, PostType,
    QuestionsFeed, SlugBackfill, Submission,
};
pub use identity::{NicknameStore, ANONYMOUS};
pub use media::{MediaError, MediaFile, MediaKind, MediaMode, MediaUploader};
pub use models::{Answer, Comment, Like, Post, Question, Stance};
pub use share::{ShareChain, ShareOutcome, ShareRequest};
pub use slug::{slugify, unique_slug};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. Format is `json` or
/// anything else for the human-readable layer.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rytup={}", config.level)));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }
}
