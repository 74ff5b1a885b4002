//! Sharing an article link
//!
//! Delivery walks an ordered chain of sinks. The first one that succeeds
//! wins; a failing sink is logged and the next one is tried. When every
//! sink fails the link is handed back as an alert message, so sharing
//! itself never fails.

use async_trait::async_trait;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::article::article_url;
use crate::config::SiteConfig;
use crate::models::Post;

/// What gets shared for one post
#[derive(Debug, Clone, PartialEq)]
pub struct ShareRequest {
    pub url: String,
    pub title: String,
    pub text: String,
}

impl ShareRequest {
    pub fn for_post(post: &Post, site: &SiteConfig) -> Self {
        Self {
            url: article_url(site, post),
            title: "RytUp Article".to_string(),
            text: format!("Check out this article on RytUp: \"{}\"", post.question),
        }
    }
}

/// How the link reached the user
#[derive(Debug, Clone, PartialEq)]
pub enum ShareOutcome {
    /// Placed on the clipboard by the named sink
    Copied { via: String },
    /// Handed to the platform share sheet
    Shared,
    /// Shown for manual copying
    Prompted,
    /// Last resort: a message carrying the link
    Alerted(String),
}

#[derive(Error, Debug)]
pub enum ShareError {
    #[error("{sink} is not available: {source}")]
    Unavailable {
        sink: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{sink} exited with {status}")]
    Failed { sink: String, status: String },
}

/// One way of getting a link to the user
#[async_trait]
pub trait ShareSink: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, request: &ShareRequest) -> Result<ShareOutcome, ShareError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Payload {
    Url,
    Message,
}

/// Pipes the link into an external program (`wl-copy`, `xclip`, ...)
pub struct CommandSink {
    name: String,
    program: String,
    args: Vec<String>,
    payload: Payload,
    shares: bool,
}

impl CommandSink {
    /// A clipboard program that reads the URL on stdin
    pub fn clipboard(program: &str, args: &[&str]) -> Self {
        Self {
            name: program.to_string(),
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            payload: Payload::Url,
            shares: false,
        }
    }

    /// A share-sheet program that reads the full message on stdin
    pub fn share_sheet(program: &str, args: &[&str]) -> Self {
        Self {
            payload: Payload::Message,
            shares: true,
            ..Self::clipboard(program, args)
        }
    }
}

#[async_trait]
impl ShareSink for CommandSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, request: &ShareRequest) -> Result<ShareOutcome, ShareError> {
        let unavailable = |source| ShareError::Unavailable {
            sink: self.name.clone(),
            source,
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(unavailable)?;

        let input = match self.payload {
            Payload::Url => request.url.clone(),
            Payload::Message => format!("{} {}", request.text, request.url),
        };
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes()).await.map_err(unavailable)?;
        }

        let status = child.wait().await.map_err(unavailable)?;
        if !status.success() {
            return Err(ShareError::Failed {
                sink: self.name.clone(),
                status: status.to_string(),
            });
        }

        if self.shares {
            Ok(ShareOutcome::Shared)
        } else {
            Ok(ShareOutcome::Copied {
                via: self.name.clone(),
            })
        }
    }
}

/// Prints the link for the user to copy by hand
pub struct PromptSink;

#[async_trait]
impl ShareSink for PromptSink {
    fn name(&self) -> &str {
        "prompt"
    }

    async fn deliver(&self, request: &ShareRequest) -> Result<ShareOutcome, ShareError> {
        let line = format!("Copy this link to share: {}\n", request.url);
        tokio::io::stdout()
            .write_all(line.as_bytes())
            .await
            .map_err(|source| ShareError::Unavailable {
                sink: "prompt".to_string(),
                source,
            })?;
        Ok(ShareOutcome::Prompted)
    }
}

/// Ordered fallback chain of sinks
#[derive(Default)]
pub struct ShareChain {
    sinks: Vec<Box<dyn ShareSink>>,
}

impl ShareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl ShareSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Clipboard, legacy clipboard, share sheet, then a printed prompt
    pub fn system() -> Self {
        let clipboard = if cfg!(target_os = "macos") {
            CommandSink::clipboard("pbcopy", &[])
        } else {
            CommandSink::clipboard("wl-copy", &[])
        };
        Self::new()
            .with(clipboard)
            .with(CommandSink::clipboard("xclip", &["-selection", "clipboard"]))
            .with(CommandSink::share_sheet("termux-share", &["-a", "send"]))
            .with(PromptSink)
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub async fn share(&self, request: &ShareRequest) -> ShareOutcome {
        for sink in &self.sinks {
            match sink.deliver(request).await {
                Ok(outcome) => {
                    tracing::debug!(sink = sink.name(), "Link shared");
                    return outcome;
                }
                Err(e) => tracing::warn!(sink = sink.name(), "Share failed: {}", e),
            }
        }
        ShareOutcome::Alerted(format!("Share this article: {}", request.url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeSink {
        name: &'static str,
        works: bool,
        hits: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ShareSink for FakeSink {
        fn name(&self) -> &str {
            self.name
        }

        async fn deliver(&self, _request: &ShareRequest) -> Result<ShareOutcome, ShareError> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            if self.works {
                Ok(ShareOutcome::Copied {
                    via: self.name.to_string(),
                })
            } else {
                Err(ShareError::Failed {
                    sink: self.name.to_string(),
                    status: "exit status: 1".to_string(),
                })
            }
        }
    }

    fn request() -> ShareRequest {
        let post = Post {
            id: "p1".to_string(),
            question: "Is chai universal?".to_string(),
            description: None,
            answer: Some("Yes".to_string()),
            nickname: "a".to_string(),
            image_url: None,
            audio_url: None,
            slug: Some("is-chai-universal-p1".to_string()),
            created_at: Utc::now(),
        };
        ShareRequest::for_post(&post, &SiteConfig::default())
    }

    #[test]
    fn test_request_for_post() {
        let request = request();
        assert_eq!(
            request.url,
            "https://rytup.vercel.app/article/is-chai-universal-p1"
        );
        assert_eq!(request.title, "RytUp Article");
        assert_eq!(
            request.text,
            "Check out this article on RytUp: \"Is chai universal?\""
        );
    }

    #[tokio::test]
    async fn test_first_working_sink_wins() {
        let hits = Arc::new(AtomicUsize::new(0));
        let chain = ShareChain::new()
            .with(FakeSink { name: "broken", works: false, hits: hits.clone() })
            .with(FakeSink { name: "legacy", works: true, hits: hits.clone() })
            .with(FakeSink { name: "never", works: true, hits: hits.clone() });

        let outcome = chain.share(&request()).await;
        assert_eq!(outcome, ShareOutcome::Copied { via: "legacy".to_string() });
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhausted_chain_alerts() {
        let hits = Arc::new(AtomicUsize::new(0));
        let chain = ShareChain::new().with(FakeSink { name: "a", works: false, hits });

        match chain.share(&request()).await {
            ShareOutcome::Alerted(message) => {
                assert_eq!(
                    message,
                    "Share this article: https://rytup.vercel.app/article/is-chai-universal-p1"
                );
            }
            other => panic!("expected alert, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_unavailable() {
        let sink = CommandSink::clipboard("rytup-no-such-clipboard-program", &[]);
        let err = sink.deliver(&request()).await.unwrap_err();
        assert!(matches!(err, ShareError::Unavailable { .. }));
    }

    #[test]
    fn test_system_chain_order() {
        let chain = ShareChain::system();
        assert_eq!(chain.len(), 4);
        assert_eq!(chain.sinks[3].name(), "prompt");
    }
}
