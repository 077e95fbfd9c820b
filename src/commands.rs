use crate::codec;
use crate::config::AppConfig;
use crate::db::Db;
use crate::device::{DirectoryGallery, FileAcquirer};
use crate::error::{Result, ScanError};
use crate::models::{self, ClientEntry};
use crate::ocr::HttpRemoteClient;
use crate::services::capture::{
    CaptureOptions, CaptureOutcome, CaptureSession, CaptureState, ResultSink,
};
use crate::services::gallery_sync::{GallerySynchronizer, GalleryView, SyncState};
use crate::types::{Confidence, ImageRecord, Language, RecognitionResult};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionReport {
    pub extracted_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotated_image_path: Option<String>,
    pub language: Language,
    pub confidence: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryEntry {
    pub id: String,
    pub inline: bool,
    pub source_ref: String,
}

const INLINE_PREVIEW_CHARS: usize = 48;

impl From<&ImageRecord> for GalleryEntry {
    fn from(record: &ImageRecord) -> Self {
        let inline = record.payload.is_some();
        // Inline payloads are whole data URLs; keep listings readable.
        let source_ref = match record.source_ref.char_indices().nth(INLINE_PREVIEW_CHARS) {
            Some((cut, _)) if inline => format!("{}...", &record.source_ref[..cut]),
            _ => record.source_ref.clone(),
        };
        GalleryEntry {
            id: record.id.clone(),
            inline,
            source_ref,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryListing {
    pub state: &'static str,
    #[serde(rename = "lastUpdated", skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<String>,
    pub images: Vec<GalleryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl From<&GalleryView> for GalleryListing {
    fn from(view: &GalleryView) -> Self {
        GalleryListing {
            state: state_label(view.state),
            fetched_at: view.snapshot.fetched_at.map(|t| t.to_rfc3339()),
            images: view.snapshot.records.iter().map(GalleryEntry::from).collect(),
            notice: view.notice.as_ref().map(|n| n.message.clone()),
        }
    }
}

fn state_label(state: SyncState) -> &'static str {
    match state {
        SyncState::Empty => "empty",
        SyncState::ServingCache => "serving_cache",
        SyncState::Refreshing => "refreshing",
        SyncState::Refreshed => "refreshed",
        SyncState::RefreshFailed => "refresh_failed",
    }
}

/// Renderer for the terminal: logs progress, leaves output to the caller.
struct ConsoleSink;

impl ResultSink for ConsoleSink {
    fn render(&self, result: &RecognitionResult) {
        info!(chars = result.extracted_text.len(), "recognition result ready");
    }

    fn report_failure(&self, error: &ScanError) {
        if error.is_retryable() {
            warn!("{} (try again)", error);
        } else {
            warn!("{}", error);
        }
    }

    fn state_changed(&self, state: CaptureState) {
        debug!(?state, "capture state");
    }
}

pub struct AppState {
    pub config: AppConfig,
    pub db: Arc<Db>,
    pub client: Arc<HttpRemoteClient>,
    pub gallery: GallerySynchronizer,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir).map_err(|e| {
            ScanError::Config(format!(
                "Could not create data dir {}: {}",
                config.data_dir.display(),
                e
            ))
        })?;
        let db = Arc::new(Db::new(config.cache_db_path())?);
        let client = Arc::new(HttpRemoteClient::new(
            config.endpoints.clone(),
            config.timeout,
        )?);
        debug!(
            recognition = %client.endpoints().recognition,
            gallery = %client.endpoints().gallery,
            upload = %client.endpoints().upload,
            "remote endpoints"
        );
        let gallery = GallerySynchronizer::new(client.clone(), db.clone());
        Ok(AppState {
            config,
            db,
            client,
            gallery,
        })
    }

    /// Submit one image file for recognition. Ctrl-C cancels the attempt.
    ///
    /// `save_to` keeps a copy of the image; `Some(None)` means the default album directory.
    pub async fn recognize_file(
        &self,
        image: &Path,
        language: Option<Language>,
        confidence: Option<Confidence>,
        save_to: Option<Option<PathBuf>>,
        out: Option<PathBuf>,
    ) -> Result<RecognitionReport> {
        let options = CaptureOptions {
            language: language.unwrap_or(self.config.language),
            confidence: confidence.unwrap_or(self.config.confidence),
            submit_timeout: self.config.timeout,
        };
        let mut session = CaptureSession::new(
            self.client.clone(),
            Arc::new(FileAcquirer::new(image)),
            Arc::new(ConsoleSink),
            options,
        );
        if let Some(dir) = save_to {
            let album = DirectoryGallery::new(dir.unwrap_or_else(|| self.config.album_dir()));
            debug!(album = %album.dir().display(), "keeping a copy of the capture");
            session = session.with_device_gallery(Arc::new(album));
        }
        let options = session.options();

        let handle = session.handle();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                handle.cancel();
            }
        });
        let outcome = session.capture().await;
        interrupt.abort();

        let result = match outcome {
            CaptureOutcome::Succeeded(result) => result,
            CaptureOutcome::Failed(e) => return Err(e),
            CaptureOutcome::Cancelled => return Err(ScanError::Cancelled),
        };

        let annotated_image_path = match out {
            Some(path) => {
                write_annotated_image(&path, &result.annotated_image).await?;
                Some(path.display().to_string())
            }
            None => None,
        };
        Ok(RecognitionReport {
            extracted_text: result.extracted_text,
            annotated_image_path,
            language: options.language,
            confidence: options.confidence.value(),
        })
    }

    /// Print the cached gallery at once, then the refreshed one.
    pub async fn show_gallery(
        &self,
        mut on_cached: impl FnMut(&GalleryListing),
    ) -> Result<GalleryListing> {
        self.gallery.activate().await;
        let cached = self.gallery.view();
        if !cached.snapshot.is_empty() {
            on_cached(&GalleryListing::from(&cached));
        }
        let settled = self.gallery.settled().await;
        Ok(GalleryListing::from(&settled))
    }

    pub async fn upload_file(&self, image: &Path) -> Result<GalleryEntry> {
        let bytes = tokio::fs::read(image).await.map_err(|e| {
            ScanError::Acquisition(format!("Could not read {}: {}", image.display(), e))
        })?;
        if bytes.is_empty() {
            return Err(ScanError::Encoding("Image is empty".to_string()));
        }
        let record = self.gallery.upload(&codec::encode(&bytes)).await?;
        info!(id = %record.id, "image uploaded");
        Ok(GalleryEntry::from(&record))
    }

    pub async fn clear_cache(&self) -> Result<()> {
        self.gallery.invalidate().await?;
        info!(path = %self.db.path().display(), "gallery cache cleared");
        Ok(())
    }
}

pub fn list_catalog(client: Option<&str>) -> Result<Vec<ClientEntry>> {
    match client {
        None => Ok(models::catalog().to_vec()),
        Some(name) => models::find_client(name)
            .map(|c| vec![c.clone()])
            .ok_or_else(|| ScanError::Config(format!("Unknown client: {}", name))),
    }
}

async fn write_annotated_image(path: &Path, annotated: &str) -> Result<()> {
    let bytes = codec::decode(annotated)?;
    tokio::fs::write(path, &bytes).await.map_err(|e| {
        ScanError::Storage(format!("Could not write {}: {}", path.display(), e))
    })
}
