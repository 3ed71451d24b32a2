//! Narration audio resource
//!
//! One resource plays one source at a time. Every `set_source` returns a new
//! token and every event carries the token of the source that produced it, so
//! the controller can drop events from a source it already replaced.

use crate::error::{Error, Result};
use crate::fetch::AssetFetcher;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Identifies one `set_source` call
pub type SourceToken = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum AudioEventKind {
    Playing,
    Paused,
    /// Playback position in seconds
    TimeUpdate(f64),
    Ended,
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioEvent {
    pub token: SourceToken,
    pub kind: AudioEventKind,
}

/// Single shared playback resource
#[async_trait]
pub trait AudioResource: Send + Sync {
    /// Duration of `uri` in seconds, without changing the current source
    async fn probe(&self, uri: &str) -> Result<f64>;

    /// Replace the current source (stopping it) and return the new token
    async fn set_source(&self, uri: &str) -> Result<SourceToken>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    /// Stop and unload the current source
    async fn stop(&self);

    fn current_time(&self) -> f64;

    fn duration(&self) -> Option<f64>;
}

#[derive(Default)]
struct Playhead {
    token: SourceToken,
    duration: Option<f64>,
    position: f64,
    playing: bool,
    ticker: Option<JoinHandle<()>>,
}

impl Playhead {
    fn halt(&mut self) {
        self.playing = false;
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

/// Timer-driven playback of probed sources
///
/// Nothing is sent to a sound device; the playhead advances in real time
/// (scaled by `rate`) and emits the same events a media element would.
pub struct SimulatedAudio {
    fetcher: Arc<dyn AssetFetcher>,
    rate: f64,
    tick: Duration,
    tx: mpsc::UnboundedSender<AudioEvent>,
    playhead: Arc<Mutex<Playhead>>,
    durations: Mutex<HashMap<String, f64>>,
    next_token: AtomicU64,
}

impl SimulatedAudio {
    /// Create the resource and the receiving end of its event channel
    pub fn new(
        fetcher: Arc<dyn AssetFetcher>,
        rate: f64,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<AudioEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let audio = Arc::new(Self {
            fetcher,
            rate: if rate > 0.0 { rate } else { 1.0 },
            tick: Duration::from_millis(50),
            tx,
            playhead: Arc::new(Mutex::new(Playhead::default())),
            durations: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        });
        (audio, rx)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Playhead> {
        self.playhead.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn send(&self, token: SourceToken, kind: AudioEventKind) {
        let _ = self.tx.send(AudioEvent { token, kind });
    }

    fn spawn_ticker(&self, token: SourceToken, duration: f64) -> JoinHandle<()> {
        let playhead = self.playhead.clone();
        let tx = self.tx.clone();
        let tick = self.tick;
        let step = tick.as_secs_f64() * self.rate;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.tick().await;
            loop {
                interval.tick().await;
                let (position, ended) = {
                    let mut p = playhead.lock().unwrap_or_else(|e| e.into_inner());
                    if p.token != token || !p.playing {
                        return;
                    }
                    p.position = (p.position + step).min(duration);
                    let ended = p.position >= duration;
                    if ended {
                        p.playing = false;
                        p.ticker = None;
                    }
                    (p.position, ended)
                };
                let _ = tx.send(AudioEvent {
                    token,
                    kind: AudioEventKind::TimeUpdate(position),
                });
                if ended {
                    let _ = tx.send(AudioEvent {
                        token,
                        kind: AudioEventKind::Ended,
                    });
                    return;
                }
            }
        })
    }
}

#[async_trait]
impl AudioResource for SimulatedAudio {
    async fn probe(&self, uri: &str) -> Result<f64> {
        let cached = self
            .durations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(uri)
            .copied();
        if let Some(d) = cached {
            return Ok(d);
        }
        let duration = self.fetcher.probe_audio(uri).await?;
        self.durations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(uri.to_string(), duration);
        Ok(duration)
    }

    async fn set_source(&self, uri: &str) -> Result<SourceToken> {
        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        {
            let mut p = self.lock();
            p.halt();
            p.token = token;
            p.duration = None;
            p.position = 0.0;
        }

        let duration = match self.probe(uri).await {
            Ok(d) => d,
            Err(e) => {
                self.send(token, AudioEventKind::Error(e.to_string()));
                return Err(Error::Playback(format!("{}: {}", uri, e)));
            }
        };

        let mut p = self.lock();
        if p.token == token {
            p.duration = Some(duration);
        }
        debug!(uri, token, duration, "Audio source set");
        Ok(token)
    }

    async fn play(&self) -> Result<()> {
        let mut p = self.lock();
        let duration = p
            .duration
            .ok_or_else(|| Error::Playback("no audio source loaded".to_string()))?;
        if p.playing {
            return Ok(());
        }
        p.playing = true;
        let token = p.token;
        p.ticker = Some(self.spawn_ticker(token, duration));
        drop(p);
        self.send(token, AudioEventKind::Playing);
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        let mut p = self.lock();
        if !p.playing {
            return Ok(());
        }
        p.halt();
        let token = p.token;
        drop(p);
        self.send(token, AudioEventKind::Paused);
        Ok(())
    }

    async fn stop(&self) {
        let mut p = self.lock();
        p.halt();
        p.duration = None;
        p.position = 0.0;
    }

    fn current_time(&self) -> f64 {
        self.lock().position
    }

    fn duration(&self) -> Option<f64> {
        self.lock().duration
    }
}
