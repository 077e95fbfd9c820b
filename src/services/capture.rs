//! One user-initiated capture: acquire, encode, submit, hand the result to the renderer.

use crate::cancel::CancelToken;
use crate::codec;
use crate::device::{DeviceGallery, ImageAcquirer};
use crate::error::{Result, ScanError};
use crate::ocr::{RemoteClient, DEFAULT_TIMEOUT};
use crate::types::{Confidence, Language, RawImage, RecognitionRequest, RecognitionResult};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Capturing,
    Encoding,
    Submitting,
    Succeeded,
    Failed,
}

impl CaptureState {
    /// States a cancel can still interrupt. `Succeeded` and `Failed` are already committed.
    fn is_cancellable(self) -> bool {
        matches!(
            self,
            CaptureState::Capturing | CaptureState::Encoding | CaptureState::Submitting
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Succeeded(RecognitionResult),
    Failed(ScanError),
    Cancelled,
}

/// Receives what the session produces. Rendering itself lives outside this crate.
///
/// `render` and `report_failure` are only called for attempts that were not cancelled.
/// `state_changed` is a hint; `CaptureSession::subscribe` is the authoritative state.
pub trait ResultSink: Send + Sync {
    fn render(&self, result: &RecognitionResult);

    fn report_failure(&self, error: &ScanError);

    fn state_changed(&self, _state: CaptureState) {}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureOptions {
    pub language: Language,
    pub confidence: Confidence,
    pub submit_timeout: Duration,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        CaptureOptions {
            language: Language::default(),
            confidence: Confidence::default(),
            submit_timeout: DEFAULT_TIMEOUT,
        }
    }
}

struct Shared {
    state: watch::Sender<CaptureState>,
    attempt: Mutex<CancelToken>,
    sink: Arc<dyn ResultSink>,
}

impl Shared {
    fn lock_attempt(&self) -> MutexGuard<'_, CancelToken> {
        match self.attempt.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn publish(&self, next: CaptureState) -> bool {
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        })
    }

    fn notify(&self, next: CaptureState) {
        debug!(state = ?next, "capture state");
        self.sink.state_changed(next);
    }

    fn transition(&self, next: CaptureState) {
        let changed = {
            let _attempt = self.lock_attempt();
            self.publish(next)
        };
        if changed {
            self.notify(next);
        }
    }

    /// Publish `next` for the attempt owning `token`. False once that attempt is cancelled.
    ///
    /// The check and the publish share the attempt lock with `cancel`, so an attempt is
    /// either cancelled or committed, never both.
    fn advance(&self, token: &CancelToken, next: CaptureState) -> bool {
        let changed = {
            let _attempt = self.lock_attempt();
            if token.is_cancelled() {
                return false;
            }
            self.publish(next)
        };
        if changed {
            self.notify(next);
        }
        true
    }

    fn cancel(&self) {
        let interrupted = {
            let attempt = self.lock_attempt();
            if !self.state.borrow().is_cancellable() {
                return;
            }
            attempt.cancel() && self.publish(CaptureState::Idle)
        };
        if interrupted {
            info!("capture cancelled");
            self.notify(CaptureState::Idle);
        }
    }
}

/// Cancels the session's in-flight attempt from another task.
#[derive(Clone)]
pub struct CaptureHandle {
    shared: Arc<Shared>,
}

impl CaptureHandle {
    /// Safe to call repeatedly and when nothing is in flight.
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    pub fn state(&self) -> CaptureState {
        *self.shared.state.borrow()
    }
}

pub struct CaptureSession {
    client: Arc<dyn RemoteClient>,
    acquirer: Arc<dyn ImageAcquirer>,
    gallery: Option<Arc<dyn DeviceGallery>>,
    options: CaptureOptions,
    shared: Arc<Shared>,
}

impl CaptureSession {
    pub fn new(
        client: Arc<dyn RemoteClient>,
        acquirer: Arc<dyn ImageAcquirer>,
        sink: Arc<dyn ResultSink>,
        options: CaptureOptions,
    ) -> Self {
        let (state, _) = watch::channel(CaptureState::Idle);
        // No attempt yet: a spent token keeps cancel a no-op.
        let spent = CancelToken::new();
        spent.cancel();
        let attempt = Mutex::new(spent);
        CaptureSession {
            client,
            acquirer,
            gallery: None,
            options,
            shared: Arc::new(Shared {
                state,
                attempt,
                sink,
            }),
        }
    }

    /// Keep a copy of every acquired image in the device gallery.
    pub fn with_device_gallery(mut self, gallery: Arc<dyn DeviceGallery>) -> Self {
        self.gallery = Some(gallery);
        self
    }

    pub fn handle(&self) -> CaptureHandle {
        CaptureHandle {
            shared: self.shared.clone(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<CaptureState> {
        self.shared.state.subscribe()
    }

    pub fn state(&self) -> CaptureState {
        *self.shared.state.borrow()
    }

    pub fn options(&self) -> CaptureOptions {
        self.options
    }

    pub fn set_language(&mut self, language: Language) {
        self.options.language = language;
    }

    pub fn set_confidence(&mut self, confidence: Confidence) {
        self.options.confidence = confidence;
    }

    /// Run one capture attempt to completion. The session is `Idle` again when this returns.
    pub async fn capture(&mut self) -> CaptureOutcome {
        let token = self.begin_attempt();

        if !self.shared.advance(&token, CaptureState::Capturing) {
            return self.abandoned();
        }
        let raw = match guard(&token, self.acquire()).await {
            Some(Ok(raw)) => raw,
            Some(Err(e)) => return self.fail(&token, e),
            None => return self.abandoned(),
        };

        if !self.shared.advance(&token, CaptureState::Encoding) {
            return self.abandoned();
        }
        let encoded = match guard(&token, codec::encode_image(&raw)).await {
            Some(Ok(encoded)) => encoded,
            Some(Err(e)) => return self.fail(&token, e),
            None => return self.abandoned(),
        };
        let request =
            RecognitionRequest::new(encoded, self.options.language, self.options.confidence);

        if !self.shared.advance(&token, CaptureState::Submitting) {
            return self.abandoned();
        }
        let limit = self.options.submit_timeout;
        let submit = async {
            match tokio::time::timeout(limit, self.client.submit_recognition(&request)).await {
                Ok(result) => result,
                Err(_) => Err(ScanError::Timeout(limit)),
            }
        };
        match guard(&token, submit).await {
            Some(Ok(result)) => self.succeed(&token, result),
            Some(Err(e)) => self.fail(&token, e),
            None => self.abandoned(),
        }
    }

    fn begin_attempt(&self) -> CancelToken {
        let token = CancelToken::new();
        *self.shared.lock_attempt() = token.clone();
        token
    }

    async fn acquire(&self) -> Result<RawImage> {
        let raw = self.acquirer.acquire_image().await?;
        let Some(gallery) = &self.gallery else {
            return Ok(raw);
        };
        let bytes = codec::read_image(raw).await?;
        gallery.persist(&bytes).await?;
        Ok(RawImage::Bytes(bytes))
    }

    fn succeed(&self, token: &CancelToken, result: RecognitionResult) -> CaptureOutcome {
        if !self.shared.advance(token, CaptureState::Succeeded) {
            return self.abandoned();
        }
        info!(text = %result.extracted_text, "capture succeeded");
        self.shared.sink.render(&result);
        self.shared.transition(CaptureState::Idle);
        CaptureOutcome::Succeeded(result)
    }

    fn fail(&self, token: &CancelToken, error: ScanError) -> CaptureOutcome {
        if !self.shared.advance(token, CaptureState::Failed) {
            return self.abandoned();
        }
        warn!(kind = error.kind(), error = %error, "capture failed");
        self.shared.sink.report_failure(&error);
        self.shared.transition(CaptureState::Idle);
        CaptureOutcome::Failed(error)
    }

    fn abandoned(&self) -> CaptureOutcome {
        self.shared.transition(CaptureState::Idle);
        CaptureOutcome::Cancelled
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.shared.lock_attempt().cancel();
    }
}

/// Race a suspension point against cancellation; `None` means the attempt was abandoned.
async fn guard<T>(token: &CancelToken, work: impl Future<Output = T>) -> Option<T> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        out = work => (!token.is_cancelled()).then_some(out),
    }
}
