//! Audio dispatcher: filters a fragment and synthesizes it in the background.
//!
//! Each call runs the session's [`FilterState`](crate::filter::FilterState)
//! synchronously, then hands the speakable text to a tokio task. At most
//! `max_in_flight` tasks talk to the backend at once; the rest wait for a
//! permit. The caller gets a [`SynthesisTicket`] that resolves to the audio
//! path, or `None` when there was nothing to say or the call failed.
//!
//! Dropping a ticket abandons the call. A task that has not started yet exits
//! without touching the backend; one already in flight finishes and deletes
//! the file nobody is waiting for.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::{Semaphore, oneshot};
use tracing::{debug, error, info};

use vtuber_core::config::TtsConfig;
use vtuber_core::error::VtuberError;

use crate::backend::{SynthesisBackend, backend_from_config};
use crate::cache::AudioCache;
use crate::error::{Result, TtsError};
use crate::session::TtsSession;

pub struct AudioDispatcher {
    backend: Arc<dyn SynthesisBackend>,
    cache: AudioCache,
    permits: Arc<Semaphore>,
    max_in_flight: usize,
}

impl AudioDispatcher {
    pub fn new(backend: Arc<dyn SynthesisBackend>, cache: AudioCache, max_in_flight: usize) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            backend,
            cache,
            permits: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
        }
    }

    /// Build the configured backend and cache.
    pub fn from_config(config: &TtsConfig) -> std::result::Result<Self, VtuberError> {
        let backend: Arc<dyn SynthesisBackend> = Arc::from(backend_from_config(config)?);
        Ok(Self::new(
            backend,
            AudioCache::new(&config.cache_dir),
            config.max_in_flight,
        ))
    }

    pub fn cache(&self) -> &AudioCache {
        &self.cache
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Synthesis tasks currently holding a backend slot.
    pub fn in_flight(&self) -> usize {
        self.max_in_flight - self.permits.available_permits()
    }

    /// Filter `text` through the session and queue it for synthesis.
    ///
    /// Must be called from within a tokio runtime. Filtering happens before
    /// this returns, so fragments are filtered in call order even when their
    /// synthesis finishes out of order. Without a `name_hint` a unique file
    /// name is generated.
    pub fn submit<'a>(
        &self,
        session: &mut TtsSession,
        text: impl Into<Option<&'a str>>,
        name_hint: Option<&str>,
    ) -> SynthesisTicket {
        let speakable = session.filter.filter(text);
        if speakable.trim().is_empty() {
            info!(session = %session.id(), "Nothing speakable after filtering, skipping synthesis");
            return SynthesisTicket::skipped();
        }

        let (mut tx, rx) = oneshot::channel();
        let backend = Arc::clone(&self.backend);
        let cache = self.cache.clone();
        let permits = Arc::clone(&self.permits);
        let hint = name_hint.map_or_else(AudioCache::unique_hint, str::to_owned);
        let session_id = session.id();

        tokio::spawn(async move {
            let _permit = tokio::select! {
                biased;
                () = tx.closed() => {
                    debug!(session = %session_id, "Synthesis abandoned before start");
                    return;
                }
                permit = permits.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
            };
            if tx.is_closed() {
                debug!(session = %session_id, "Synthesis abandoned before start");
                return;
            }

            let outcome = match synthesize_to_file(backend.as_ref(), &cache, &speakable, &hint).await {
                Ok(path) => {
                    debug!(session = %session_id, path = %path.display(), "Audio generated");
                    Some(path)
                }
                Err(TtsError::Empty) => {
                    info!(session = %session_id, "Backend found nothing to speak, skipping");
                    None
                }
                Err(e) => {
                    error!(
                        session = %session_id,
                        backend = backend.name(),
                        error = %e,
                        "TTS synthesis failed"
                    );
                    None
                }
            };

            if let Err(Some(orphan)) = tx.send(outcome) {
                debug!(session = %session_id, "Synthesis result no longer wanted");
                cache.remove(&orphan);
            }
        });

        SynthesisTicket { rx: Some(rx) }
    }

    /// Filter and synthesize, waiting for the result.
    pub async fn synthesize<'a>(
        &self,
        session: &mut TtsSession,
        text: impl Into<Option<&'a str>>,
        name_hint: Option<&str>,
    ) -> Option<PathBuf> {
        self.submit(session, text, name_hint).await
    }

    /// Best-effort removal of an audio file produced earlier.
    pub fn remove_file(&self, path: &std::path::Path) {
        self.cache.remove(path);
    }
}

async fn synthesize_to_file(
    backend: &dyn SynthesisBackend,
    cache: &AudioCache,
    text: &str,
    hint: &str,
) -> Result<PathBuf> {
    let audio = backend.synthesize(text).await?;
    let path = cache.path_for(Some(hint), backend.file_extension()).await?;
    if let Err(e) = tokio::fs::write(&path, &audio).await {
        cache.remove(&path);
        return Err(e.into());
    }
    Ok(path)
}

/// Pending result of [`AudioDispatcher::submit`].
///
/// Resolves to the audio file path, or `None` when the text was skipped or
/// synthesis failed. Dropping it abandons the call.
#[derive(Debug)]
pub struct SynthesisTicket {
    rx: Option<oneshot::Receiver<Option<PathBuf>>>,
}

impl SynthesisTicket {
    fn skipped() -> Self {
        Self { rx: None }
    }

    /// `true` when filtering left nothing to synthesize.
    pub fn is_skipped(&self) -> bool {
        self.rx.is_none()
    }
}

impl Future for SynthesisTicket {
    type Output = Option<PathBuf>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.rx.as_mut() {
            None => Poll::Ready(None),
            Some(rx) => Pin::new(rx).poll(cx).map(|received| received.ok().flatten()),
        }
    }
}
