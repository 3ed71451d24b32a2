//! Narration playback
//!
//! The controller sequences intro, explanation and outro over one shared
//! `AudioResource`. Audio events arrive on a channel and are handled one at a
//! time by the event pump; events carrying a superseded source token are
//! dropped. A segment whose audio is missing or unusable is shown as a caption
//! and stays current until skipped.

pub mod audio;

pub use audio::{AudioEvent, AudioEventKind, AudioResource, SimulatedAudio, SourceToken};

use crate::bundle::NarrationScript;
use crate::error::{Error, Result};
use lessonxr_common::events::{EventBus, NarrationSection, NarrationState, PlayerEvent};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NarrationSegment {
    pub section: NarrationSection,
    pub audio_ref: Option<String>,
    /// Caption text (empty when the section only has audio)
    pub text: String,
    /// Audio was probed successfully (always true for caption-only segments)
    pub loaded: bool,
    pub duration_secs: Option<f64>,
}

/// Point-in-time view for captions and progress display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NarrationSnapshot {
    pub state: NarrationState,
    /// `None` when no segments are loaded
    pub current_index: Option<usize>,
    pub position_secs: f64,
    pub segments: Vec<NarrationSegment>,
}

struct Playlist {
    segments: Vec<NarrationSegment>,
    index: usize,
    state: NarrationState,
    /// Token of the source the current segment is playing, if any
    token: Option<SourceToken>,
}

pub struct NarrationController {
    audio: Arc<dyn AudioResource>,
    events: EventBus,
    playlist: Mutex<Playlist>,
}

impl NarrationController {
    pub fn new(audio: Arc<dyn AudioResource>, events: EventBus) -> Self {
        Self {
            audio,
            events,
            playlist: Mutex::new(Playlist {
                segments: Vec::new(),
                index: 0,
                state: NarrationState::Stopped,
                token: None,
            }),
        }
    }

    /// Replace the segment list from a script, in fixed section order
    ///
    /// Stops any current playback and rewinds to the first segment.
    pub async fn load_segments(&self, script: &NarrationScript) -> Vec<NarrationSegment> {
        let segments: Vec<NarrationSegment> = NarrationSection::ORDER
            .iter()
            .filter_map(|section| {
                let entry = script.entry(*section)?;
                if !entry.is_usable() {
                    return None;
                }
                Some(NarrationSegment {
                    section: *section,
                    audio_ref: entry.audio_ref.clone(),
                    text: entry.text.clone().unwrap_or_default(),
                    loaded: entry.audio_ref.is_none(),
                    duration_secs: None,
                })
            })
            .collect();

        let mut playlist = self.playlist.lock().await;
        self.audio.stop().await;
        playlist.segments = segments.clone();
        playlist.index = 0;
        playlist.token = None;
        self.set_state(&mut playlist, NarrationState::Stopped);

        debug!(segments = segments.len(), "Narration segments loaded");
        segments
    }

    /// Probe every segment's audio, marking `loaded` and `duration_secs`
    ///
    /// Returns one message per segment whose audio could not be probed;
    /// those segments stay in the list as captions.
    pub async fn preload(&self) -> Vec<String> {
        let pending: Vec<(usize, String)> = {
            let playlist = self.playlist.lock().await;
            playlist
                .segments
                .iter()
                .enumerate()
                .filter_map(|(i, s)| s.audio_ref.clone().map(|uri| (i, uri)))
                .collect()
        };

        let mut failures = Vec::new();
        for (index, uri) in pending {
            let result = self.audio.probe(&uri).await;

            let mut playlist = self.playlist.lock().await;
            let Some(segment) = playlist.segments.get_mut(index) else {
                continue;
            };
            if segment.audio_ref.as_deref() != Some(uri.as_str()) {
                continue;
            }
            match result {
                Ok(duration) => {
                    segment.loaded = true;
                    segment.duration_secs = Some(duration);
                }
                Err(e) => {
                    warn!(section = %segment.section, uri = %uri, error = %e, "Narration audio unavailable");
                    segment.loaded = false;
                    failures.push(format!("{}: {}", segment.section, e));
                }
            }
        }
        failures
    }

    /// Start or resume playback
    pub async fn play(&self) -> Result<()> {
        let mut playlist = self.playlist.lock().await;
        if playlist.segments.is_empty() {
            return Err(Error::InvalidState("no narration loaded".to_string()));
        }
        match playlist.state {
            NarrationState::Playing => Ok(()),
            NarrationState::Paused => {
                if playlist.token.is_some() {
                    self.audio.play().await?;
                }
                self.set_state(&mut playlist, NarrationState::Playing);
                Ok(())
            }
            NarrationState::Stopped => {
                let index = playlist.index;
                self.start_segment(&mut playlist, index).await;
                Ok(())
            }
        }
    }

    pub async fn pause(&self) -> Result<()> {
        let mut playlist = self.playlist.lock().await;
        if playlist.state != NarrationState::Playing {
            return Ok(());
        }
        if playlist.token.is_some() {
            self.audio.pause().await?;
        }
        self.set_state(&mut playlist, NarrationState::Paused);
        Ok(())
    }

    /// Stop playback and rewind to the first segment
    pub async fn stop(&self) {
        let mut playlist = self.playlist.lock().await;
        self.audio.stop().await;
        playlist.token = None;
        playlist.index = 0;
        self.set_state(&mut playlist, NarrationState::Stopped);
    }

    /// Jump to the next segment and play it
    ///
    /// Returns `false` (and does nothing) on the last segment.
    pub async fn skip_to_next(&self) -> bool {
        let mut playlist = self.playlist.lock().await;
        let next = playlist.index + 1;
        if next >= playlist.segments.len() {
            debug!("Already at last narration segment");
            return false;
        }
        self.start_segment(&mut playlist, next).await;
        true
    }

    pub async fn snapshot(&self) -> NarrationSnapshot {
        let playlist = self.playlist.lock().await;
        NarrationSnapshot {
            state: playlist.state,
            current_index: (!playlist.segments.is_empty()).then_some(playlist.index),
            position_secs: if playlist.token.is_some() {
                self.audio.current_time()
            } else {
                0.0
            },
            segments: playlist.segments.clone(),
        }
    }

    /// Handle one audio event
    pub async fn handle_event(&self, event: AudioEvent) {
        let mut playlist = self.playlist.lock().await;
        if playlist.token != Some(event.token) {
            debug!(token = event.token, "Ignoring event from superseded audio source");
            return;
        }

        match event.kind {
            AudioEventKind::Playing => self.set_state(&mut playlist, NarrationState::Playing),
            AudioEventKind::Paused => self.set_state(&mut playlist, NarrationState::Paused),
            AudioEventKind::TimeUpdate(_) => {}
            AudioEventKind::Ended => self.advance(&mut playlist).await,
            AudioEventKind::Error(message) => {
                let index = playlist.index;
                if let Some(segment) = playlist.segments.get_mut(index) {
                    warn!(section = %segment.section, error = %message, "Narration audio error, skipping segment");
                    segment.loaded = false;
                }
                self.advance(&mut playlist).await;
            }
        }
    }

    /// Consume audio events until cancelled or the resource goes away
    ///
    /// The task hands the receiver back when it stops, so a later mount can
    /// start a new pump on the same resource.
    pub fn spawn_event_pump(
        self: &Arc<Self>,
        mut events: mpsc::UnboundedReceiver<AudioEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<mpsc::UnboundedReceiver<AudioEvent>> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv() => match event {
                        Some(event) => controller.handle_event(event).await,
                        None => break,
                    },
                }
            }
            debug!("Narration event pump stopped");
            events
        })
    }

    async fn advance(&self, playlist: &mut Playlist) {
        let next = playlist.index + 1;
        if next < playlist.segments.len() {
            self.start_segment(playlist, next).await;
            return;
        }

        // Rewind like stop(), so the next play() starts from the intro
        playlist.token = None;
        playlist.index = 0;
        self.set_state(playlist, NarrationState::Stopped);
        info!("Narration finished");
        self.events.emit_lossy(PlayerEvent::NarrationFinished {
            timestamp: chrono::Utc::now(),
        });
    }

    async fn start_segment(&self, playlist: &mut Playlist, index: usize) {
        playlist.index = index;
        playlist.token = None;
        let segment = playlist.segments[index].clone();

        self.events.emit_lossy(PlayerEvent::NarrationSegmentStarted {
            section: segment.section,
            index,
            total: playlist.segments.len(),
            text: segment.text.clone(),
            timestamp: chrono::Utc::now(),
        });

        match &segment.audio_ref {
            Some(uri) => match self.audio.set_source(uri).await {
                Ok(token) => {
                    playlist.token = Some(token);
                    if let Err(e) = self.audio.play().await {
                        warn!(section = %segment.section, error = %e, "Narration audio failed to start");
                        playlist.token = None;
                    }
                }
                Err(e) => {
                    warn!(section = %segment.section, error = %e, "Narration audio unavailable, showing caption");
                }
            },
            None => self.audio.stop().await,
        }

        info!(section = %segment.section, index, "Narration segment started");
        self.set_state(playlist, NarrationState::Playing);
    }

    fn set_state(&self, playlist: &mut Playlist, new_state: NarrationState) {
        let old_state = playlist.state;
        if old_state == new_state {
            return;
        }
        playlist.state = new_state;
        self.events.emit_lossy(PlayerEvent::NarrationStateChanged {
            old_state,
            new_state,
            timestamp: chrono::Utc::now(),
        });
    }
}
