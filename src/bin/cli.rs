//! RytUp CLI
//!
//! Command-line client for the RytUp community:
//! - Read the articles and questions feeds
//! - Ask, answer, comment, like and share
//! - Take part in legacy debates

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rytup::article::load_article;
use rytup::backend::{DataStore, ObjectStore, RestClient, RestConfig};
use rytup::config::{generate_default_config, Config};
use rytup::feed::{
    time_ago_long, time_ago_short, truncate_text, ArticlesFeed, Composer, DebateView, PostDraft,
    QuestionsFeed, SlugBackfill, ANSWER_PREVIEW_CHARS,
};
use rytup::identity::NicknameStore;
use rytup::media::{with_simulated_progress, MediaError, MediaFile, MediaKind, MediaUploader};
use rytup::models::{Post, Stance};
use rytup::share::{ShareChain, ShareOutcome, ShareRequest};

#[derive(Parser)]
#[command(name = "rytup")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Ask, answer and share on RytUp")]
#[command(long_about = "RytUp is a community Q&A and micro-blog.\nAsk questions, answer them with text, images or voice, and share the best answers as articles.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ~/.config/rytup/config.toml, then ./config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show or change your nickname
    Nickname {
        #[command(subcommand)]
        action: Option<NicknameAction>,
    },

    /// List posts, newest first
    Feed {
        /// Only answered posts (articles), with like counts
        #[arg(short, long)]
        answered: bool,
    },

    /// List questions still waiting for an answer
    Questions,

    /// Ask a question, or publish a question with its answer
    Ask {
        question: String,
        /// Answer it yourself and publish as an article
        #[arg(short, long)]
        answer: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        /// Image to attach (max 5 MB)
        #[arg(long)]
        image: Option<PathBuf>,
        /// Audio to attach (max 10 MB)
        #[arg(long)]
        audio: Option<PathBuf>,
    },

    /// Answer an open question
    Answer {
        post_id: String,
        text: String,
        #[arg(long)]
        image: Option<PathBuf>,
        #[arg(long)]
        audio: Option<PathBuf>,
    },

    /// Show the comments on a post
    Comments { post_id: String },

    /// Comment on a post
    Comment { post_id: String, text: String },

    /// Like an article, or take your like back
    Like { post_id: String },

    /// Share an article link
    Share {
        /// Article slug or id
        key: String,
    },

    /// Show an article and its link-preview metadata
    Article {
        /// Article slug or id
        key: String,
    },

    /// Check whether media storage is available
    Storage,

    /// Legacy debate questions
    Debate {
        #[command(subcommand)]
        action: DebateAction,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum NicknameAction {
    /// Remember a nickname for future posts
    Set { name: String },
}

#[derive(Subcommand)]
pub enum DebateAction {
    /// Show a question and its answers grouped by stance
    Show { question_id: String },

    /// Post a written answer
    Answer {
        question_id: String,
        text: String,
        /// agree, disagree or neutral
        #[arg(short, long, default_value = "neutral")]
        stance: Stance,
    },

    /// Post a recorded voice answer
    Voice {
        question_id: String,
        recording: PathBuf,
        #[arg(short, long, default_value = "neutral")]
        stance: Stance,
    },

    /// Upvote an answer
    Upvote {
        question_id: String,
        answer_id: String,
    },
}

/// Shared handles built once per invocation
struct App {
    config: Config,
    client: Arc<RestClient>,
    nickname: NicknameStore,
    json: bool,
}

impl App {
    fn build(cli: &Cli, config: Config) -> anyhow::Result<Self> {
        let client = RestClient::new(RestConfig::from(&config.backend))
            .context("Failed to build backend client")?;
        let nickname = NicknameStore::open(config.local_storage_path());
        Ok(Self {
            client: Arc::new(client),
            nickname,
            json: cli.format == "json",
            config,
        })
    }

    fn store(&self) -> Arc<dyn DataStore> {
        self.client.clone()
    }

    fn uploader(&self) -> MediaUploader {
        let objects: Arc<dyn ObjectStore> = self.client.clone();
        MediaUploader::new(objects, self.config.media.clone())
    }

    /// Read an attachment, skipping it when it is over the size limit
    async fn read_media(&self, path: &Path, kind: MediaKind) -> anyhow::Result<Option<MediaFile>> {
        match self.uploader().read_file(path, kind).await {
            Ok(file) => Ok(Some(file)),
            Err(e @ MediaError::TooLarge { .. }) => {
                eprintln!("Skipping {}: {}", path.display(), e);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    rytup::init_logging(&config.logging);

    if let Commands::Config { output } = &cli.command {
        let config = generate_default_config();
        match output {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, &config)?;
                println!("Config written to {:?}", path);
            }
            None => print!("{}", config),
        }
        return Ok(());
    }

    let mut ctx = App::build(&cli, config)?;

    match cli.command {
        Commands::Nickname { action } => match action {
            None => {
                let name = ctx.nickname.get();
                if name.is_empty() {
                    println!("No nickname set; posting as {}", ctx.nickname.display_name());
                } else {
                    println!("{}", name);
                }
            }
            Some(NicknameAction::Set { name }) => {
                ctx.nickname.set(&name)?;
                println!("Posting as {}", ctx.nickname.display_name());
            }
        },

        Commands::Feed { answered: true } => {
            let mut feed = ArticlesFeed::new(ctx.store(), ctx.nickname.get());
            feed.refresh().await?;

            if ctx.json {
                println!("{}", serde_json::to_string_pretty(feed.posts())?);
            } else if feed.posts().is_empty() {
                println!("No articles yet.");
            } else {
                for post in feed.posts() {
                    print_post(post);
                    if let Some(answer) = &post.answer {
                        println!("    {}", truncate_text(answer, ANSWER_PREVIEW_CHARS));
                    }
                    let heart = if feed.is_liked(&post.id) { "♥" } else { "♡" };
                    println!("    {} {}", heart, feed.like_count(&post.id));
                    println!();
                }
            }
        }

        Commands::Feed { answered: false } => {
            let mut feed = QuestionsFeed::new(ctx.store(), ctx.uploader(), ctx.nickname.get());
            feed.refresh().await?;
            print_posts(&ctx, feed.posts().iter().collect())?;
        }

        Commands::Questions => {
            let mut feed = QuestionsFeed::new(ctx.store(), ctx.uploader(), ctx.nickname.get());
            feed.refresh().await?;
            let open = feed.posts().iter().filter(|p| !p.is_answered()).collect();
            print_posts(&ctx, open)?;
        }

        Commands::Ask {
            question,
            answer,
            description,
            image,
            audio,
        } => {
            let mut composer = Composer::new(ctx.store(), ctx.uploader());
            let mut draft = match answer {
                Some(answer) => PostDraft::article(question, answer),
                None => PostDraft::question(question),
            };
            draft.description = description.unwrap_or_default();

            if image.is_some() || audio.is_some() {
                if !composer.check_storage().await {
                    eprintln!("Media storage is unavailable; attachments will be skipped.");
                }
                for (path, kind) in [(image, MediaKind::Image), (audio, MediaKind::Audio)] {
                    if let Some(path) = path {
                        let Some(file) = ctx.read_media(&path, kind).await? else {
                            continue;
                        };
                        if let Err(e) = composer.select_media(&mut draft, file, kind) {
                            eprintln!("Skipping {}: {}", path.display(), e);
                        }
                    }
                }
            }

            let nickname = ctx.nickname.get().to_string();
            let submission = with_simulated_progress(composer.submit(&draft, &nickname), |p| {
                eprint!("\rPosting... {:>3}%", p)
            })
            .await;
            eprintln!();
            let submission = submission?;

            match &submission.slug {
                SlugBackfill::Assigned(slug) => println!("Posted: {}", slug),
                SlugBackfill::Failed { temporary, error } => {
                    println!("Posted: {}", temporary);
                    eprintln!("Could not assign the final link ({}); the post keeps this one.", error);
                }
            }
            if submission.post.is_answered() {
                println!("{}/article/{}", ctx.config.site.base_url, submission.post.route_key());
            }
        }

        Commands::Answer {
            post_id,
            text,
            image,
            audio,
        } => {
            let mut feed = QuestionsFeed::new(ctx.store(), ctx.uploader(), ctx.nickname.get());
            feed.select(&post_id);
            feed.set_answer_text(text);

            if image.is_some() || audio.is_some() {
                if !feed.check_storage().await {
                    eprintln!("Media storage is unavailable; attachments will be skipped.");
                }
                for (path, kind) in [(image, MediaKind::Image), (audio, MediaKind::Audio)] {
                    if let Some(path) = path {
                        let Some(file) = ctx.read_media(&path, kind).await? else {
                            continue;
                        };
                        if let Err(e) = feed.attach(file, kind) {
                            eprintln!("Skipping {}: {}", path.display(), e);
                        }
                    }
                }
            }

            let post = feed.submit_answer().await?;
            println!("Answered: {}", post.question);
        }

        Commands::Comments { post_id } => {
            let mut feed = ArticlesFeed::new(ctx.store(), ctx.nickname.get());
            feed.load_comments(&post_id).await?;
            let comments = feed.comments(&post_id);

            if ctx.json {
                println!("{}", serde_json::to_string_pretty(comments)?);
            } else if comments.is_empty() {
                println!("No comments yet.");
            } else {
                let now = Utc::now();
                for comment in comments {
                    println!(
                        "{} · {}: {}",
                        time_ago_short(comment.created_at, now),
                        comment.nickname,
                        comment.comment
                    );
                }
            }
        }

        Commands::Comment { post_id, text } => {
            let mut feed = ArticlesFeed::new(ctx.store(), ctx.nickname.get());
            let comment = feed.add_comment(&post_id, &text).await?;
            println!("Commented as {}", comment.nickname);
        }

        Commands::Like { post_id } => {
            let mut feed = ArticlesFeed::new(ctx.store(), ctx.nickname.get());
            feed.refresh().await?;
            if !feed.posts().iter().any(|p| p.id == post_id) {
                bail!("Article {} not found", post_id);
            }
            let liked = feed.toggle_like(&post_id).await?;
            let verb = if liked { "Liked" } else { "Unliked" };
            println!("{} ({} likes)", verb, feed.like_count(&post_id));
        }

        Commands::Share { key } => {
            let page = load_article(ctx.store(), &ctx.config.site, &key)
                .await
                .map_err(|(e, _)| e)?;
            let request = ShareRequest::for_post(&page.post, &ctx.config.site);

            match ShareChain::system().share(&request).await {
                ShareOutcome::Copied { via } => println!("Link copied to clipboard ({})", via),
                ShareOutcome::Shared => println!("Shared"),
                ShareOutcome::Prompted => {}
                ShareOutcome::Alerted(message) => println!("{}", message),
            }
        }

        Commands::Article { key } => match load_article(ctx.store(), &ctx.config.site, &key).await
        {
            Ok(page) => {
                if ctx.json {
                    println!("{}", serde_json::to_string_pretty(&page.metadata)?);
                } else {
                    let post = &page.post;
                    println!("{}", post.question);
                    println!(
                        "by {} · {}",
                        post.nickname,
                        time_ago_long(post.created_at, Utc::now())
                    );
                    if let Some(description) = &post.description {
                        println!();
                        println!("{}", description);
                    }
                    if let Some(answer) = &post.answer {
                        println!();
                        println!("{}", answer);
                    }
                    for media in [&post.image_url, &post.audio_url].into_iter().flatten() {
                        println!("  {}", media);
                    }
                    println!();
                    println!("{}", page.url);
                }
            }
            Err((e, metadata)) => {
                if ctx.json {
                    println!("{}", serde_json::to_string_pretty(&metadata)?);
                }
                return Err(e.into());
            }
        },

        Commands::Storage => {
            let uploader = ctx.uploader();
            let bucket = &uploader.config().bucket;
            if uploader.probe().await {
                println!("Storage ready (bucket '{}')", bucket);
            } else {
                println!("Storage unavailable (bucket '{}'); media uploads are disabled", bucket);
            }
        }

        Commands::Debate { action } => run_debate(&ctx, action).await?,

        Commands::Config { .. } => {}
    }

    Ok(())
}

async fn run_debate(ctx: &App, action: DebateAction) -> anyhow::Result<()> {
    let question_id = match &action {
        DebateAction::Show { question_id }
        | DebateAction::Answer { question_id, .. }
        | DebateAction::Voice { question_id, .. }
        | DebateAction::Upvote { question_id, .. } => question_id.clone(),
    };
    let mut view = DebateView::new(ctx.store(), ctx.uploader(), &question_id);
    view.load().await?;
    let nickname = ctx.nickname.get();

    match action {
        DebateAction::Show { .. } => {
            if ctx.json {
                println!("{}", serde_json::to_string_pretty(view.answers())?);
                return Ok(());
            }
            if let Some(question) = view.question() {
                println!("{}", question.question);
                if !question.tag.is_empty() {
                    println!("#{}", question.tag);
                }
            }

            let groups = view.by_stance();
            let now = Utc::now();
            for stance in [Stance::Agree, Stance::Disagree, Stance::Neutral] {
                let answers = groups.get(stance);
                println!();
                println!("{} ({})", stance, answers.len());
                for answer in answers {
                    let body = answer
                        .text
                        .as_deref()
                        .or(answer.audio_url.as_deref())
                        .unwrap_or("");
                    println!(
                        "  [{}] ▲{} {} · {}: {}",
                        answer.id,
                        answer.upvotes,
                        time_ago_long(answer.timestamp, now),
                        answer.nickname,
                        body
                    );
                }
            }
        }

        DebateAction::Answer { text, stance, .. } => {
            let answer = view.submit_text(&text, nickname, stance).await?;
            println!("Answer posted ({})", answer.stance);
        }

        DebateAction::Voice {
            recording, stance, ..
        } => {
            let bytes = tokio::fs::read(&recording)
                .await
                .with_context(|| format!("Failed to read {}", recording.display()))?;
            let answer = view.submit_voice(bytes, nickname, stance).await?;
            println!(
                "Voice answer posted: {}",
                answer.audio_url.unwrap_or_default()
            );
        }

        DebateAction::Upvote { answer_id, .. } => {
            let upvotes = view.upvote(&answer_id).await?;
            println!("Upvoted ({})", upvotes);
        }
    }

    Ok(())
}

fn print_post(post: &Post) {
    let status = if post.is_answered() { "answered" } else { "open" };
    println!(
        "[{}] {} · {} · {} ({})",
        post.id,
        post.question,
        post.nickname,
        time_ago_short(post.created_at, Utc::now()),
        status
    );
}

fn print_posts(ctx: &App, posts: Vec<&Post>) -> anyhow::Result<()> {
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&posts)?);
    } else if posts.is_empty() {
        println!("Nothing here yet.");
    } else {
        for post in posts {
            print_post(post);
        }
    }
    Ok(())
}
