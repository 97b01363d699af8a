//! Per-candidate playback lifecycle
//!
//! ```text
//! Idle ──resolved──► Loading ──play ok──► Playing ──end/ceiling/skip──► Ended
//!  │                   │  └──blocked──► Blocked ──retry ok──► Playing
//!  └──no preview──► Failed ◄──error───────┴──────blocked again──┘
//! ```
//!
//! The controller is the only writer to the output device. Every candidate
//! gets a fresh [`Ticket`]; anything arriving with an older ticket is
//! ignored. The advance signal fires at most once per ticket.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::catalog::{Candidate, CandidateId};
use crate::error::{LookupError, PlaybackError};
use crate::lookup::TrackMetadata;
use crate::playback::device::{PlayOutcome, PlaybackDevice};

/// Identity tag for everything asynchronous concerning one candidate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ticket {
    pub generation: u64,
    pub round: usize,
    pub candidate: CandidateId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackStatus {
    Idle,
    Loading,
    Playing,
    Blocked,
    Failed,
    Ended,
}

/// Playback state of the current candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackState {
    pub candidate_id: CandidateId,
    pub elapsed_ms: u64,
    pub status: PlaybackStatus,
    pub retry_count: u32,
}

/// Why a candidate could not be played
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PlaybackFailure {
    NoPreviewAvailable,
    PlaybackBlocked,
    PlaybackFailed(String),
}

/// What ended a candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AdvanceCause {
    Ended,
    Ceiling,
    Skipped,
    Failed(PlaybackFailure),
}

/// Output of a controller operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// Audio is running; the ceiling timer should be armed
    Started,
    /// Autoplay was refused; waiting for `retry()` from a user gesture
    NeedsGesture,
    /// The candidate is finished
    Advance(AdvanceCause),
}

struct Live {
    ticket: Ticket,
    state: PlaybackState,
    source: Option<String>,
    advanced: bool,
}

pub struct PlaybackController<D: PlaybackDevice> {
    device: D,
    volume: f32,
    ceiling_ms: u64,
    generation: u64,
    live: Option<Live>,
}

impl<D: PlaybackDevice> PlaybackController<D> {
    pub fn new(device: D, ceiling: Duration, volume: f32) -> Self {
        Self {
            device,
            volume,
            ceiling_ms: ceiling.as_millis() as u64,
            generation: 0,
            live: None,
        }
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn ceiling(&self) -> Duration {
        Duration::from_millis(self.ceiling_ms)
    }

    pub fn state(&self) -> Option<&PlaybackState> {
        self.live.as_ref().map(|live| &live.state)
    }

    pub fn ticket(&self) -> Option<&Ticket> {
        self.live.as_ref().map(|live| &live.ticket)
    }

    pub fn status(&self) -> Option<PlaybackStatus> {
        self.state().map(|state| state.status)
    }

    /// Resolved preview source of the current candidate
    pub fn source(&self) -> Option<&str> {
        self.live.as_ref().and_then(|live| live.source.as_deref())
    }

    /// True while the candidate holds the output (loading or playing)
    pub fn is_live(&self) -> bool {
        matches!(
            self.status(),
            Some(PlaybackStatus::Loading | PlaybackStatus::Playing)
        )
    }

    /// Elapsed playback of the current candidate
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.state().map_or(0, |state| state.elapsed_ms))
    }

    /// Take over `candidate`, tearing down whatever was playing
    ///
    /// The caller resolves the source and reports back through
    /// [`on_resolved`](Self::on_resolved) with the returned ticket.
    pub fn load(&mut self, round: usize, candidate: &Candidate) -> Ticket {
        self.teardown();
        self.generation += 1;

        let ticket = Ticket {
            generation: self.generation,
            round,
            candidate: candidate.id.clone(),
        };
        tracing::debug!(
            generation = ticket.generation,
            round,
            candidate = %candidate.id,
            "Loading candidate"
        );

        self.live = Some(Live {
            ticket: ticket.clone(),
            state: PlaybackState {
                candidate_id: candidate.id.clone(),
                elapsed_ms: 0,
                status: PlaybackStatus::Idle,
                retry_count: 0,
            },
            source: None,
            advanced: false,
        });
        ticket
    }

    /// Feed the metadata lookup result for `ticket`
    pub fn on_resolved(
        &mut self,
        ticket: &Ticket,
        result: Result<TrackMetadata, LookupError>,
    ) -> Option<Signal> {
        let live = self.current_mut(ticket)?;
        if live.state.status != PlaybackStatus::Idle {
            return None;
        }

        match result {
            Ok(metadata) => {
                live.source = Some(metadata.preview_url);
                live.state.status = PlaybackStatus::Loading;
                self.attempt_play()
            }
            Err(e) => {
                tracing::warn!(candidate = %ticket.candidate, error = %e, "No preview available");
                self.fail(PlaybackFailure::NoPreviewAvailable)
            }
        }
    }

    /// Ask the device to start the resolved source
    pub fn attempt_play(&mut self) -> Option<Signal> {
        let volume = self.volume;
        let live = self.live.as_mut()?;
        if !matches!(
            live.state.status,
            PlaybackStatus::Loading | PlaybackStatus::Blocked
        ) {
            return None;
        }
        let source = live.source.clone()?;

        self.device.set_volume(volume);
        self.device.set_position(Duration::ZERO);
        let outcome = self.device.play(&live.ticket, &source);

        match outcome {
            PlayOutcome::Started => {
                tracing::info!(candidate = %live.ticket.candidate, "Playback started");
                live.state.status = PlaybackStatus::Playing;
                Some(Signal::Started)
            }
            PlayOutcome::Blocked if live.state.retry_count == 0 => {
                tracing::info!(candidate = %live.ticket.candidate, "Autoplay blocked, waiting for a gesture");
                live.state.status = PlaybackStatus::Blocked;
                Some(Signal::NeedsGesture)
            }
            PlayOutcome::Blocked => {
                tracing::warn!(candidate = %live.ticket.candidate, "Playback blocked again after retry");
                self.fail(PlaybackFailure::PlaybackBlocked)
            }
            PlayOutcome::Failed(reason) => {
                tracing::warn!(candidate = %live.ticket.candidate, reason = %reason, "Playback failed");
                self.fail(PlaybackFailure::PlaybackFailed(reason))
            }
        }
    }

    /// Retry a blocked candidate; call from inside a user gesture
    pub fn retry(&mut self) -> Result<Option<Signal>, PlaybackError> {
        match self.status() {
            Some(PlaybackStatus::Blocked) => {}
            Some(_) => return Err(PlaybackError::NotBlocked),
            None => return Err(PlaybackError::NothingLoaded),
        }
        if let Some(live) = self.live.as_mut() {
            live.state.retry_count += 1;
        }
        self.device.unlock();
        Ok(self.attempt_play())
    }

    /// Stop the current candidate and advance immediately
    pub fn skip(&mut self) -> Option<Signal> {
        let live = self.live.as_ref()?;
        if live.advanced {
            return None;
        }
        tracing::info!(candidate = %live.ticket.candidate, "Skipped");
        self.device.pause();
        self.finish(AdvanceCause::Skipped)
    }

    pub fn on_media_ended(&mut self, ticket: &Ticket) -> Option<Signal> {
        let live = self.current_mut(ticket)?;
        if live.state.status != PlaybackStatus::Playing {
            return None;
        }
        self.finish(AdvanceCause::Ended)
    }

    pub fn on_media_error(&mut self, ticket: &Ticket, reason: String) -> Option<Signal> {
        let live = self.current_mut(ticket)?;
        if live.advanced {
            return None;
        }
        tracing::warn!(candidate = %ticket.candidate, reason = %reason, "Media error");
        self.device.pause();
        self.fail(PlaybackFailure::PlaybackFailed(reason))
    }

    /// The hard ceiling for `ticket` elapsed
    ///
    /// Bounds the wait in every state except `Blocked`, which waits for a
    /// retry or a skip.
    pub fn on_ceiling(&mut self, ticket: &Ticket) -> Option<Signal> {
        let ceiling_ms = self.ceiling_ms;
        let live = self.current_mut(ticket)?;
        if live.advanced || live.state.status == PlaybackStatus::Blocked {
            return None;
        }
        live.state.elapsed_ms = live.state.elapsed_ms.max(ceiling_ms);
        tracing::info!(candidate = %ticket.candidate, "Ceiling reached");
        self.device.pause();
        self.finish(AdvanceCause::Ceiling)
    }

    /// Account `delta` of playback progress
    pub fn tick(&mut self, delta: Duration) {
        let ceiling_ms = self.ceiling_ms;
        if let Some(live) = self.live.as_mut() {
            if live.state.status == PlaybackStatus::Playing {
                let next = live.state.elapsed_ms + delta.as_millis() as u64;
                live.state.elapsed_ms = next.min(ceiling_ms);
            }
        }
    }

    /// Release the current candidate, stopping any audio
    pub fn teardown(&mut self) {
        if let Some(live) = self.live.take() {
            if matches!(
                live.state.status,
                PlaybackStatus::Loading | PlaybackStatus::Playing | PlaybackStatus::Blocked
            ) {
                self.device.pause();
            }
            tracing::debug!(generation = live.ticket.generation, "Released candidate");
        }
    }

    fn current_mut(&mut self, ticket: &Ticket) -> Option<&mut Live> {
        match self.live.as_mut() {
            Some(live) if &live.ticket == ticket => Some(live),
            _ => {
                tracing::debug!(generation = ticket.generation, "Discarding stale playback callback");
                None
            }
        }
    }

    fn fail(&mut self, failure: PlaybackFailure) -> Option<Signal> {
        self.finish(AdvanceCause::Failed(failure))
    }

    fn finish(&mut self, cause: AdvanceCause) -> Option<Signal> {
        let live = self.live.as_mut()?;
        if live.advanced {
            return None;
        }
        live.advanced = true;
        live.state.status = match cause {
            AdvanceCause::Failed(_) => PlaybackStatus::Failed,
            _ => PlaybackStatus::Ended,
        };
        Some(Signal::Advance(cause))
    }
}
