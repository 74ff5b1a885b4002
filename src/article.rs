//! Article page: lookup by slug or id, and link-preview metadata

use serde::Serialize;
use std::sync::Arc;

use crate::backend::DataStore;
use crate::config::SiteConfig;
use crate::feed::{FeedError, PostRepository};
use crate::models::Post;

const SITE_NAME: &str = "RytUp - Voices of India";
const DEFAULT_DESCRIPTION: &str = "Read this insightful article on RytUp";
const DESCRIPTION_CHARS: usize = 150;
const OG_IMAGE_WIDTH: u32 = 1200;
const OG_IMAGE_HEIGHT: u32 = 630;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OgImage {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub alt: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OpenGraph {
    pub title: String,
    pub description: String,
    pub url: String,
    pub site_name: String,
    pub images: Vec<OgImage>,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TwitterCard {
    pub card: String,
    pub title: String,
    pub description: String,
    pub images: Vec<String>,
}

/// Metadata for link previews of one page
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PageMetadata {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_graph: Option<OpenGraph>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter: Option<TwitterCard>,
}

/// `{site}/article/{slug or id}`
pub fn article_url(site: &SiteConfig, post: &Post) -> String {
    format!(
        "{}/article/{}",
        site.base_url.trim_end_matches('/'),
        post.route_key()
    )
}

/// Description, else the start of the answer, else a stock blurb
fn preview_description(post: &Post) -> String {
    if let Some(description) = post.description.as_deref().filter(|d| !d.trim().is_empty()) {
        return description.to_string();
    }
    match post.answer.as_deref().filter(|a| !a.is_empty()) {
        Some(answer) => {
            let head: String = answer.chars().take(DESCRIPTION_CHARS).collect();
            format!("{}...", head)
        }
        None => DEFAULT_DESCRIPTION.to_string(),
    }
}

impl PageMetadata {
    pub fn for_article(post: &Post, site: &SiteConfig) -> Self {
        let title = format!("{} | RytUp", post.question);
        let description = preview_description(post);
        let image = post
            .image_url
            .clone()
            .unwrap_or_else(|| site.default_image.clone());

        Self {
            open_graph: Some(OpenGraph {
                title: title.clone(),
                description: description.clone(),
                url: article_url(site, post),
                site_name: SITE_NAME.to_string(),
                images: vec![OgImage {
                    url: image.clone(),
                    width: OG_IMAGE_WIDTH,
                    height: OG_IMAGE_HEIGHT,
                    alt: post.question.clone(),
                }],
                kind: "article".to_string(),
            }),
            twitter: Some(TwitterCard {
                card: "summary_large_image".to_string(),
                title: title.clone(),
                description: description.clone(),
                images: vec![image],
            }),
            title,
            description,
        }
    }

    pub fn not_found() -> Self {
        Self {
            title: "Article Not Found | RytUp".to_string(),
            description: "The article you are looking for could not be found.".to_string(),
            open_graph: None,
            twitter: None,
        }
    }
}

/// A resolved article and its metadata
#[derive(Debug, Clone)]
pub struct ArticlePage {
    pub post: Post,
    pub url: String,
    pub metadata: PageMetadata,
}

/// Resolve `/article/{slug_or_id}`. Anything but a found article yields the
/// not-found metadata alongside the error.
pub async fn load_article(
    store: Arc<dyn DataStore>,
    site: &SiteConfig,
    slug_or_id: &str,
) -> Result<ArticlePage, (FeedError, PageMetadata)> {
    let posts = PostRepository::new(store);
    match posts.find_article(slug_or_id).await {
        Ok(post) => Ok(ArticlePage {
            url: article_url(site, &post),
            metadata: PageMetadata::for_article(&post, site),
            post,
        }),
        Err(e) => {
            tracing::info!(key = slug_or_id, "Article lookup failed: {}", e);
            Err((e, PageMetadata::not_found()))
        }
    }
}
