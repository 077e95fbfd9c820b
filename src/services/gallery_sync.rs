//! Stale-while-revalidate gallery: serve the persisted snapshot at once, then refresh it
//! in the background.

use crate::cache::CacheStore;
use crate::cancel::CancelToken;
use crate::error::{Result, ScanError};
use crate::ocr::RemoteClient;
use crate::types::{GallerySnapshot, ImageRecord};
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{watch, OnceCell};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Empty,
    ServingCache,
    Refreshing,
    Refreshed,
    RefreshFailed,
}

/// Non-fatal problem the consumer may show next to the (still visible) gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshNotice {
    pub kind: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl From<&ScanError> for RefreshNotice {
    fn from(e: &ScanError) -> Self {
        RefreshNotice {
            kind: e.kind(),
            message: e.to_string(),
            retryable: e.is_retryable(),
        }
    }
}

/// What the consumer renders. Replaced as a whole on every change.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryView {
    pub state: SyncState,
    pub snapshot: GallerySnapshot,
    pub notice: Option<RefreshNotice>,
}

impl GalleryView {
    fn empty() -> Self {
        GalleryView {
            state: SyncState::Empty,
            snapshot: GallerySnapshot::empty(),
            notice: None,
        }
    }
}

struct Inner {
    client: Arc<dyn RemoteClient>,
    store: Arc<dyn CacheStore>,
    view: watch::Sender<GalleryView>,
    /// Guards the single in-flight refresh; flipped together with the published state.
    in_flight: Mutex<bool>,
    cache_served: OnceCell<()>,
    /// Orders snapshot writes from refreshes, uploads and invalidation.
    write_lock: tokio::sync::Mutex<()>,
    cancel: CancelToken,
}

pub struct GallerySynchronizer {
    inner: Arc<Inner>,
}

impl GallerySynchronizer {
    pub fn new(client: Arc<dyn RemoteClient>, store: Arc<dyn CacheStore>) -> Self {
        let (view, _) = watch::channel(GalleryView::empty());
        GallerySynchronizer {
            inner: Arc::new(Inner {
                client,
                store,
                view,
                in_flight: Mutex::new(false),
                cache_served: OnceCell::new(),
                write_lock: tokio::sync::Mutex::new(()),
                cancel: CancelToken::new(),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<GalleryView> {
        self.inner.view.subscribe()
    }

    pub fn view(&self) -> GalleryView {
        self.inner.view.borrow().clone()
    }

    /// Serve the persisted snapshot (first activation only) and start a background refresh
    /// unless one is already running, in which case this call joins it.
    pub async fn activate(&self) {
        if self.inner.cancel.is_cancelled() {
            debug!("gallery synchronizer shut down; ignoring activation");
            return;
        }
        self.ensure_cache_served().await;

        if !self.inner.begin_refresh() {
            debug!("gallery refresh already in flight or shut down; not starting another");
            return;
        }
        let inner = self.inner.clone();
        tokio::spawn(async move { inner.refresh().await });
    }

    async fn ensure_cache_served(&self) {
        let inner = self.inner.clone();
        self.inner
            .cache_served
            .get_or_init(|| async move { inner.serve_cache().await })
            .await;
    }

    /// Wait until no refresh is in flight and return the settled view.
    pub async fn settled(&self) -> GalleryView {
        let mut rx = self.subscribe();
        let result = rx
            .wait_for(|v| v.state != SyncState::Refreshing)
            .await
            .map(|v| v.clone());
        match result {
            Ok(view) => view,
            Err(_) => self.view(),
        }
    }

    /// Upload a capture and add the acknowledged record to the current snapshot.
    pub async fn upload(&self, payload: &str) -> Result<ImageRecord> {
        let record = tokio::select! {
            biased;
            _ = self.inner.cancel.cancelled() => return Err(ScanError::Cancelled),
            r = self.inner.client.upload_image(payload) => r?,
        };
        self.ensure_cache_served().await;

        let _write = self.inner.write_lock.lock().await;
        if self.inner.cancel.is_cancelled() {
            return Ok(record);
        }
        let current = self.inner.view.borrow().snapshot.clone();
        let mut records: Vec<ImageRecord> = current
            .records
            .iter()
            .filter(|r| r.id != record.id)
            .cloned()
            .collect();
        records.push(record.clone());
        let fetched_at = current.fetched_at.unwrap_or(record.fetched_at);
        let snapshot = GallerySnapshot::new(records, fetched_at);

        self.inner.persist(snapshot.clone()).await?;
        self.inner.view.send_modify(|v| {
            v.snapshot = snapshot;
            if v.state == SyncState::Empty {
                v.state = SyncState::ServingCache;
            }
        });
        info!(id = %record.id, "uploaded image added to gallery");
        Ok(record)
    }

    /// Drop the persisted snapshot and show an empty gallery.
    pub async fn invalidate(&self) -> Result<()> {
        let _write = self.inner.write_lock.lock().await;
        let store = self.inner.store.clone();
        tokio::task::spawn_blocking(move || store.clear())
            .await
            .map_err(|e| ScanError::Storage(format!("cache task failed: {}", e)))??;
        let in_flight = self.inner.lock_in_flight();
        self.inner.view.send_replace(GalleryView {
            state: if *in_flight {
                SyncState::Refreshing
            } else {
                SyncState::Empty
            },
            snapshot: GallerySnapshot::empty(),
            notice: None,
        });
        info!("gallery cache invalidated");
        Ok(())
    }

    /// Cancel any in-flight work. Late completions are discarded. Idempotent.
    ///
    /// A refresh still running is reported as `RefreshFailed` with a `cancelled` notice,
    /// so consumers waiting on `settled` are released.
    pub fn shutdown(&self) {
        let in_flight = self.inner.lock_in_flight();
        if !self.inner.cancel.cancel() {
            return;
        }
        debug!("gallery synchronizer shutting down");
        if *in_flight {
            self.inner.view.send_modify(|v| {
                v.state = SyncState::RefreshFailed;
                v.notice = Some(RefreshNotice::from(&ScanError::Cancelled));
            });
        }
    }
}

impl Drop for GallerySynchronizer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Inner {
    fn lock_in_flight(&self) -> MutexGuard<'_, bool> {
        match self.in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    async fn serve_cache(&self) {
        let store = self.store.clone();
        let cached = tokio::task::spawn_blocking(move || store.read_all())
            .await
            .map_err(|e| ScanError::Storage(format!("cache task failed: {}", e)))
            .and_then(|r| r);
        if self.cancel.is_cancelled() {
            return;
        }
        match cached {
            Ok(Some(snapshot)) => {
                info!(count = snapshot.len(), "serving cached gallery");
                self.view.send_replace(GalleryView {
                    state: SyncState::ServingCache,
                    snapshot,
                    notice: None,
                });
            }
            Ok(None) => debug!("no cached gallery"),
            Err(e) => {
                warn!(error = %e, "could not read cached gallery");
                self.view.send_modify(|v| v.notice = Some(RefreshNotice::from(&e)));
            }
        }
    }

    /// Claim the refresh slot. False when a refresh is already running or after shutdown.
    fn begin_refresh(&self) -> bool {
        let mut in_flight = self.lock_in_flight();
        if *in_flight || self.cancel.is_cancelled() {
            return false;
        }
        *in_flight = true;
        self.view.send_modify(|v| v.state = SyncState::Refreshing);
        true
    }

    /// Release the refresh slot and publish the outcome in one step.
    fn finish_refresh(&self, publish: impl FnOnce(&mut GalleryView)) {
        let mut in_flight = self.lock_in_flight();
        *in_flight = false;
        if !self.cancel.is_cancelled() {
            self.view.send_modify(publish);
        }
    }

    async fn refresh(self: Arc<Self>) {
        let fetched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            r = self.client.list_gallery_images() => Some(r),
        };
        let records = match fetched {
            None => {
                debug!("gallery refresh abandoned");
                self.finish_refresh(|_| {});
                return;
            }
            Some(Err(e)) => {
                warn!(kind = e.kind(), error = %e, "gallery refresh failed; keeping last snapshot");
                self.finish_refresh(|v| {
                    v.state = SyncState::RefreshFailed;
                    v.notice = Some(RefreshNotice::from(&e));
                });
                return;
            }
            Some(Ok(records)) => records,
        };

        let _write = self.write_lock.lock().await;
        if self.cancel.is_cancelled() {
            self.finish_refresh(|_| {});
            return;
        }
        let fetched_at = records.first().map(|r| r.fetched_at).unwrap_or_else(Utc::now);
        let snapshot = GallerySnapshot::new(records, fetched_at);
        let notice = match self.persist(snapshot.clone()).await {
            Ok(()) => None,
            Err(e) => {
                warn!(error = %e, "could not persist refreshed gallery");
                Some(RefreshNotice::from(&e))
            }
        };
        info!(count = snapshot.len(), "gallery refreshed");
        self.finish_refresh(|v| {
            v.state = SyncState::Refreshed;
            v.snapshot = snapshot;
            v.notice = notice;
        });
    }

    async fn persist(&self, snapshot: GallerySnapshot) -> Result<()> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.write_all(&snapshot))
            .await
            .map_err(|e| ScanError::Storage(format!("cache task failed: {}", e)))?
    }
}
