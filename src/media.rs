//! Media Upload
//!
//! Images and audio attached to posts go to the hosted `media` bucket when
//! it is reachable, or are inlined as base64 data URLs when the bucket is
//! missing and inline fallback is enabled. Size limits are a client-side UX
//! guard, checked before any network call.
//!
//! Availability is decided by [`MediaUploader::probe`], re-run on demand
//! (a manual retry), never on a timer.

use base64::Engine;
use chrono::Utc;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::backend::{BackendResult, ObjectStore, ObjectUpload};
use crate::config::MediaConfig;

const PROGRESS_TICK: Duration = Duration::from_millis(100);
const PROGRESS_STEP: u8 = 10;
const PROGRESS_CAP: u8 = 90;

/// What a file is attached as; also the folder it is stored under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
}

impl MediaKind {
    pub fn folder(&self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::Audio => "audio",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => f.write_str("image"),
            MediaKind::Audio => f.write_str("audio"),
        }
    }
}

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("{kind} file too large ({size} bytes). Please choose a file under {} MB.", .limit / (1024 * 1024))]
    TooLarge {
        kind: MediaKind,
        size: u64,
        limit: u64,
    },

    #[error("Media uploads are unavailable right now")]
    Disabled,

    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A file picked for upload, fully read into memory
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl MediaFile {
    /// Content type is guessed from the file name
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let content_type = mime_guess::from_path(&name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            name,
            content_type,
            bytes,
        }
    }

    pub async fn read(path: &Path) -> Result<Self, MediaError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| MediaError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(name, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Lowercased extension, from the name or else the content type
    pub fn extension(&self) -> String {
        Path::new(&self.name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .or_else(|| {
                mime_guess::get_mime_extensions_str(&self.content_type)
                    .and_then(|exts| exts.first())
                    .map(|ext| ext.to_string())
            })
            .unwrap_or_else(|| "bin".to_string())
    }
}

/// How a view handles attached media, decided from the last probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaMode {
    /// Push to the hosted bucket
    Upload,
    /// Store as a data URL in the row itself
    Inline,
    /// Media controls hidden; text-only submissions still work
    Disabled,
}

/// `data:{mime};base64,{payload}`
pub fn to_data_url(file: &MediaFile) -> String {
    let payload = base64::engine::general_purpose::STANDARD.encode(&file.bytes);
    format!("data:{};base64,{}", file.content_type, payload)
}

/// Run `work`, reporting a simulated percentage: +10 every 100 ms up to 90
/// while it runs, then 100 once it completes.
pub async fn with_simulated_progress<F, T>(work: F, mut report: impl FnMut(u8)) -> T
where
    F: Future<Output = T>,
{
    tokio::pin!(work);

    let mut progress = 0u8;
    let mut ticker = tokio::time::interval(PROGRESS_TICK);
    ticker.tick().await;
    report(progress);

    loop {
        tokio::select! {
            out = &mut work => {
                report(100);
                return out;
            }
            _ = ticker.tick(), if progress < PROGRESS_CAP => {
                progress = (progress + PROGRESS_STEP).min(PROGRESS_CAP);
                report(progress);
            }
        }
    }
}

/// Uploads media to hosted object storage
#[derive(Clone)]
pub struct MediaUploader {
    store: Arc<dyn ObjectStore>,
    config: MediaConfig,
}

impl MediaUploader {
    pub fn new(store: Arc<dyn ObjectStore>, config: MediaConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &MediaConfig {
        &self.config
    }

    /// Whether the media bucket exists and storage answers at all
    pub async fn probe(&self) -> bool {
        match self.store.list_buckets().await {
            Ok(buckets) => {
                let found = buckets.iter().any(|b| b.name == self.config.bucket);
                if !found {
                    tracing::warn!(bucket = %self.config.bucket, "Media bucket not found");
                }
                found
            }
            Err(e) => {
                tracing::warn!("Storage not available: {}", e);
                false
            }
        }
    }

    /// Media handling given the outcome of the last probe
    pub fn mode(&self, storage_ready: bool) -> MediaMode {
        if storage_ready {
            MediaMode::Upload
        } else if self.config.inline_fallback {
            MediaMode::Inline
        } else {
            MediaMode::Disabled
        }
    }

    /// Reject files over the configured limit for `kind`
    pub fn validate(&self, file: &MediaFile, kind: MediaKind) -> Result<(), MediaError> {
        self.check_size(file.size(), kind)
    }

    pub fn limit(&self, kind: MediaKind) -> u64 {
        match kind {
            MediaKind::Image => self.config.max_image_bytes,
            MediaKind::Audio => self.config.max_audio_bytes,
        }
    }

    fn check_size(&self, size: u64, kind: MediaKind) -> Result<(), MediaError> {
        let limit = self.limit(kind);
        if size > limit {
            return Err(MediaError::TooLarge { kind, size, limit });
        }
        Ok(())
    }

    /// Read a file from disk, rejecting it from its metadata before any
    /// bytes are loaded when it is over the kind's limit
    pub async fn read_file(&self, path: &Path, kind: MediaKind) -> Result<MediaFile, MediaError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|source| MediaError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        self.check_size(metadata.len(), kind)?;

        let file = MediaFile::read(path).await?;
        // The file may have grown between the two calls
        self.validate(&file, kind)?;
        Ok(file)
    }

    /// Randomized object path under the kind's folder
    pub fn object_path(&self, file: &MediaFile, kind: MediaKind) -> String {
        let suffix: String = uuid::Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(6)
            .collect();
        format!(
            "{}/{}_{}.{}",
            kind.folder(),
            Utc::now().timestamp_millis(),
            suffix,
            file.extension()
        )
    }

    /// Non-overwriting put to the media bucket. Failures are logged and
    /// yield `None`.
    pub async fn upload(&self, file: &MediaFile, kind: MediaKind) -> Option<String> {
        let path = self.object_path(file, kind);
        let upload = ObjectUpload {
            bytes: file.bytes.clone(),
            content_type: file.content_type.clone(),
            cache_control_secs: self.config.cache_control_secs,
            upsert: false,
        };

        match self.store.put_object(&self.config.bucket, &path, upload).await {
            Ok(()) => {
                tracing::info!(%path, size = file.size(), "Uploaded {}", kind);
                Some(self.store.public_url(&self.config.bucket, &path))
            }
            Err(e) => {
                tracing::error!(%path, "Storage upload error: {}", e);
                None
            }
        }
    }

    /// Validate, then upload or inline according to `mode`.
    ///
    /// `Ok(None)` means the upload itself failed (already logged).
    pub async fn attach(
        &self,
        file: &MediaFile,
        kind: MediaKind,
        mode: MediaMode,
    ) -> Result<Option<String>, MediaError> {
        self.validate(file, kind)?;
        match mode {
            MediaMode::Upload => Ok(self.upload(file, kind).await),
            MediaMode::Inline => Ok(Some(to_data_url(file))),
            MediaMode::Disabled => Err(MediaError::Disabled),
        }
    }

    /// Store a recorded voice answer (`audio_{millis}.webm`) in the voice
    /// bucket and return its public URL
    pub async fn upload_voice(&self, recording: Vec<u8>) -> BackendResult<String> {
        let path = format!("audio_{}.webm", Utc::now().timestamp_millis());
        let upload = ObjectUpload {
            bytes: recording,
            content_type: "audio/webm".to_string(),
            cache_control_secs: self.config.cache_control_secs,
            upsert: false,
        };

        self.store
            .put_object(&self.config.voice_bucket, &path, upload)
            .await?;
        Ok(self.store.public_url(&self.config.voice_bucket, &path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    async fn uploader(buckets: &[&str]) -> (Arc<MemoryBackend>, MediaUploader) {
        let backend = Arc::new(MemoryBackend::with_buckets(buckets).await);
        let uploader = MediaUploader::new(backend.clone(), MediaConfig::default());
        (backend, uploader)
    }

    #[test]
    fn test_media_file_type_and_extension() {
        let file = MediaFile::new("Photo.JPG", vec![0; 4]);
        assert_eq!(file.content_type, "image/jpeg");
        assert_eq!(file.extension(), "jpg");

        let mut nameless = MediaFile::new("recording", vec![]);
        nameless.content_type = "image/png".to_string();
        assert_ne!(nameless.extension(), "bin");

        nameless.content_type = "application/x-rytup-unknown".to_string();
        assert_eq!(nameless.extension(), "bin");
    }

    #[tokio::test]
    async fn test_read_file_checks_size_first() {
        let (_, uploader) = uploader(&["media"]).await;
        let dir = tempfile::tempdir().unwrap();

        let big = dir.path().join("big.png");
        let over = uploader.limit(MediaKind::Image) + 1;
        std::fs::File::create(&big).unwrap().set_len(over).unwrap();
        match uploader.read_file(&big, MediaKind::Image).await {
            Err(MediaError::TooLarge { kind, size, .. }) => {
                assert_eq!(kind, MediaKind::Image);
                assert_eq!(size, over);
            }
            other => panic!("expected TooLarge, got {:?}", other.map(|f| f.size())),
        }

        let small = dir.path().join("voice.webm");
        std::fs::write(&small, b"ok").unwrap();
        let file = uploader.read_file(&small, MediaKind::Audio).await.unwrap();
        assert_eq!(file.name, "voice.webm");
        assert_eq!(file.size(), 2);

        let missing = dir.path().join("missing.png");
        assert!(matches!(
            uploader.read_file(&missing, MediaKind::Image).await,
            Err(MediaError::Read { .. })
        ));
    }

    #[test]
    fn test_data_url() {
        let file = MediaFile::new("a.png", b"hi".to_vec());
        assert_eq!(to_data_url(&file), "data:image/png;base64,aGk=");
    }

    #[tokio::test]
    async fn test_probe() {
        let (_, ready) = uploader(&["media"]).await;
        assert!(ready.probe().await);

        let (_, missing) = uploader(&["avatars"]).await;
        assert!(!missing.probe().await);

        let (backend, down) = uploader(&["media"]).await;
        backend.fail_storage().await;
        assert!(!down.probe().await);
    }

    #[tokio::test]
    async fn test_oversize_rejected_before_any_call() {
        let (backend, uploader) = uploader(&["media"]).await;
        let image = MediaFile::new("big.png", vec![0; 5 * 1024 * 1024 + 1]);
        let audio = MediaFile::new("big.mp3", vec![0; 10 * 1024 * 1024 + 1]);

        let err = uploader
            .attach(&image, MediaKind::Image, MediaMode::Upload)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::TooLarge { kind: MediaKind::Image, .. }));
        assert!(err.to_string().contains("under 5 MB"));

        let err = uploader
            .attach(&audio, MediaKind::Audio, MediaMode::Upload)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::TooLarge { kind: MediaKind::Audio, .. }));

        assert_eq!(backend.calls(), 0);

        // The same audio size is fine as long as it is within its own limit
        let ok_audio = MediaFile::new("ok.mp3", vec![0; 6 * 1024 * 1024]);
        assert!(uploader.validate(&ok_audio, MediaKind::Audio).is_ok());
    }

    #[tokio::test]
    async fn test_upload_stores_under_folder() {
        let (backend, uploader) = uploader(&["media"]).await;
        let file = MediaFile::new("clip.mp3", vec![1, 2, 3]);

        let url = uploader
            .attach(&file, MediaKind::Audio, MediaMode::Upload)
            .await
            .unwrap()
            .unwrap();

        let path = url.split("/media/").nth(1).unwrap();
        assert!(path.starts_with("audio/"));
        assert!(path.ends_with(".mp3"));
        let (bytes, content_type) = backend.object("media", path).await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(content_type, "audio/mpeg");
    }

    #[tokio::test]
    async fn test_upload_failure_yields_none() {
        let (backend, uploader) = uploader(&["media"]).await;
        backend.fail_storage().await;

        let file = MediaFile::new("a.png", vec![1]);
        assert_eq!(uploader.upload(&file, MediaKind::Image).await, None);
    }

    #[tokio::test]
    async fn test_mode_selection() {
        let (_, mut uploader) = uploader(&[]).await;
        assert_eq!(uploader.mode(true), MediaMode::Upload);
        assert_eq!(uploader.mode(false), MediaMode::Disabled);

        uploader.config.inline_fallback = true;
        assert_eq!(uploader.mode(false), MediaMode::Inline);

        let file = MediaFile::new("a.png", b"x".to_vec());
        let url = uploader
            .attach(&file, MediaKind::Image, MediaMode::Inline)
            .await
            .unwrap();
        assert_eq!(url.as_deref(), Some("data:image/png;base64,eA=="));

        let err = uploader
            .attach(&file, MediaKind::Image, MediaMode::Disabled)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Disabled));
    }

    #[tokio::test]
    async fn test_voice_upload() {
        let (backend, uploader) = uploader(&["audio-answers"]).await;
        let url = uploader.upload_voice(vec![9, 9]).await.unwrap();

        assert!(url.contains("/audio-answers/audio_"));
        assert!(url.ends_with(".webm"));
        assert_eq!(backend.object_count("audio-answers").await, 1);
    }

    #[tokio::test]
    async fn test_simulated_progress() {
        let mut seen = Vec::new();
        let out = with_simulated_progress(
            async {
                tokio::time::sleep(Duration::from_millis(250)).await;
                7
            },
            |p| seen.push(p),
        )
        .await;

        assert_eq!(out, 7);
        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert!(seen[..seen.len() - 1].iter().all(|p| *p <= 90));
    }

    #[tokio::test]
    async fn test_simulated_progress_caps_at_ninety() {
        let mut seen = Vec::new();
        with_simulated_progress(tokio::time::sleep(Duration::from_millis(1300)), |p| {
            seen.push(p)
        })
        .await;

        assert!(seen.contains(&90));
        assert_eq!(seen.iter().filter(|p| **p == 90).count(), 1);
        assert_eq!(seen.last(), Some(&100));
    }
}
