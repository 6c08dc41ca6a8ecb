//! Lazy, batched mounting of card waveform widgets.
//!
//! Only cards within a margin of the viewport get a widget. Each batch is
//! revealed together once all its widgets are ready or the batch timeout
//! elapses, whichever comes first.

use crate::config::WaveformConfig;
use crate::media::{CardHandle, MediaBackend, WidgetStyle};
use crate::registry::{RegistryEntry, WaveformRegistry};
use crate::song::Song;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "trackdeck::mounter";

/// Outcome of a mounting pass
#[derive(Debug, Default)]
pub struct MountReport {
    /// Widgets created and registered in this pass
    pub mounted: usize,
    /// Reveal tasks, one per batch; each yields whether every widget in the
    /// batch was ready before the timeout
    pub reveals: Vec<JoinHandle<bool>>,
}

struct MounterState {
    cards: Vec<Arc<dyn CardHandle>>,
    mounted: HashSet<usize>,
    route: CancellationToken,
}

pub struct WaveformMounter {
    registry: Arc<WaveformRegistry>,
    backend: Arc<dyn MediaBackend>,
    style: WidgetStyle,
    margin: f64,
    batch_size: usize,
    ready_timeout: Duration,
    state: Mutex<MounterState>,
}

impl WaveformMounter {
    #[must_use]
    pub fn new(
        registry: Arc<WaveformRegistry>,
        backend: Arc<dyn MediaBackend>,
        config: &WaveformConfig,
    ) -> Self {
        Self {
            registry,
            backend,
            style: config.widget_style(),
            margin: config.lazy_margin_px,
            batch_size: config.batch_size.max(1),
            ready_timeout: config.batch_ready_timeout(),
            state: Mutex::new(MounterState {
                cards: Vec::new(),
                mounted: HashSet::new(),
                route: CancellationToken::new(),
            }),
        }
    }

    /// Replace the observed cards with those of a freshly rendered page
    pub async fn observe(&self, mut cards: Vec<Arc<dyn CardHandle>>) {
        cards.sort_by_key(|c| c.document_index());
        let mut state = self.state.lock().await;
        state.route.cancel();
        state.route = CancellationToken::new();
        state.mounted.clear();
        debug!(target: LOG_TARGET, "Observing {} cards", cards.len());
        state.cards = cards;
    }

    /// Forget every observed card and cancel pending reveals
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.route.cancel();
        state.cards.clear();
        state.mounted.clear();
    }

    /// Number of observed cards still waiting for a widget
    pub async fn pending(&self) -> usize {
        let state = self.state.lock().await;
        state.cards.len().saturating_sub(state.mounted.len())
    }

    /// Mount every unmounted card now within the margin, in document order.
    ///
    /// Called after page init and on every scroll.
    pub async fn mount_visible(&self, catalog: &[Song]) -> MountReport {
        let mut state = self.state.lock().await;
        let due: Vec<Arc<dyn CardHandle>> = state
            .cards
            .iter()
            .filter(|c| !state.mounted.contains(&c.document_index()))
            .filter(|c| c.is_displayed() && c.distance_to_viewport() <= self.margin)
            .cloned()
            .collect();
        if due.is_empty() {
            return MountReport::default();
        }

        let route = state.route.clone();
        let mut report = MountReport::default();
        for batch in due.chunks(self.batch_size) {
            let mut waiting = Vec::with_capacity(batch.len());
            let mut cards = Vec::with_capacity(batch.len());

            for card in batch {
                // Cards that fail to mount are not retried on this route
                state.mounted.insert(card.document_index());
                let Some(song) = catalog.iter().find(|s| &s.id == card.song_id()) else {
                    warn!(target: LOG_TARGET, "No catalog entry for card {}", card.song_id());
                    continue;
                };
                let widget = match self.backend.create_widget(card, &self.style) {
                    Ok(widget) => widget,
                    Err(e) => {
                        warn!(target: LOG_TARGET, "Failed to create widget for {}: {}", song.id, e);
                        continue;
                    }
                };

                let widget_id = self.registry.allocate_id();
                waiting.push(self.registry.ready_signal(widget_id));
                match song.instant_waveform() {
                    Some((peaks, duration)) => {
                        widget.load(&song.audio_url, Some(peaks), Some(duration));
                    }
                    None => widget.load(&song.audio_url, None, None),
                }

                self.registry
                    .register(RegistryEntry {
                        song_id: song.id.clone(),
                        widget_id,
                        widget,
                        card: card.clone(),
                        audio_url: song.audio_url.clone(),
                    })
                    .await;
                cards.push(card.clone());
                report.mounted += 1;
            }

            if cards.is_empty() {
                continue;
            }
            report.reveals.push(tokio::spawn(reveal_batch(
                cards,
                waiting,
                self.ready_timeout,
                route.clone(),
            )));
        }

        info!(
            target: LOG_TARGET,
            "Mounted {} widgets in {} batches", report.mounted, report.reveals.len()
        );
        report
    }
}

async fn reveal_batch(
    cards: Vec<Arc<dyn CardHandle>>,
    waiting: Vec<tokio::sync::oneshot::Receiver<()>>,
    timeout: Duration,
    route: CancellationToken,
) -> bool {
    let all_ready = tokio::select! {
        () = route.cancelled() => return false,
        result = tokio::time::timeout(timeout, join_all(waiting)) => match result {
            Ok(signals) => signals.iter().all(Result::is_ok),
            Err(_) => {
                debug!(target: LOG_TARGET, "Batch not ready after {:?}, revealing anyway", timeout);
                false
            }
        },
    };
    for card in &cards {
        card.reveal_waveform();
    }
    all_ready
}
