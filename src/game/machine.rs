//! Round state machine
//!
//! A reducer over [`GameEvent`]s. It never sleeps or performs I/O itself;
//! timers and lookups are requested as [`Command`]s and come back later as
//! events carrying the ticket or round they were issued for.

use std::collections::HashSet;

use crate::artwork::ArtworkCache;
use crate::catalog::{Candidate, CandidateId};
use crate::config::GameConfig;
use crate::error::{Error, SessionError};
use crate::game::event::{Command, GameEvent, Notification, NotificationLevel};
use crate::game::session::{Phase, Round, Session, SessionResult};
use crate::game::snapshot::{GameSnapshot, NowPlaying};
use crate::lookup::TrackMetadata;
use crate::playback::{
    AdvanceCause, PlaybackController, PlaybackDevice, PlaybackFailure, PlaybackStatus, Signal,
    Ticket,
};
use crate::selector::RoundSelector;

pub struct RoundStateMachine<D: PlaybackDevice> {
    config: GameConfig,
    pool: Vec<Candidate>,
    selector: RoundSelector,
    artwork: ArtworkCache,
    playback: PlaybackController<D>,
    session: Session,
    round: Option<Round>,
    needs_gesture: bool,
    notification: Option<Notification>,
    next_notification_id: u64,
    halted: Option<SessionError>,
    result: Option<SessionResult>,
}

impl<D: PlaybackDevice> RoundStateMachine<D> {
    pub fn new(
        config: GameConfig,
        pool: Vec<Candidate>,
        playback: PlaybackController<D>,
        artwork: ArtworkCache,
    ) -> Self {
        let selector = RoundSelector::new(config.songs_per_round);
        Self {
            config,
            pool,
            selector,
            artwork,
            playback,
            session: Session::new(),
            round: None,
            needs_gesture: false,
            notification: None,
            next_notification_id: 0,
            halted: None,
            result: None,
        }
    }

    /// Draw rounds from a fixed seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.selector = RoundSelector::seeded(self.config.songs_per_round, seed);
        self
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.session.phase
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    pub fn playback(&self) -> &PlaybackController<D> {
        &self.playback
    }

    pub fn artwork(&self) -> &ArtworkCache {
        &self.artwork
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn needs_gesture(&self) -> bool {
        self.needs_gesture
    }

    pub fn halted(&self) -> Option<&SessionError> {
        self.halted.as_ref()
    }

    pub fn result(&self) -> Option<&SessionResult> {
        self.result.as_ref()
    }

    pub fn device_mut(&mut self) -> &mut D {
        self.playback.device_mut()
    }

    /// Release the output device
    pub fn stop(&mut self) {
        self.playback.teardown();
    }

    /// Begin a fresh session at round 1
    ///
    /// Fails with [`SessionError::InsufficientCandidates`] when the pool cannot
    /// cover every round without repeats; the machine is then halted until
    /// the next restart.
    pub fn start(&mut self) -> Result<Vec<Command>, SessionError> {
        self.playback.teardown();

        self.session = Session::new();
        self.round = None;
        self.needs_gesture = false;
        self.notification = None;
        self.halted = None;
        self.result = None;

        tracing::info!(session = %self.session.id, pool = self.pool.len(), "Session started");

        let available = self
            .pool
            .iter()
            .map(|candidate| &candidate.id)
            .collect::<HashSet<_>>()
            .len();
        let needed = self.config.candidates_needed();
        if available < needed {
            return Err(self.halt(SessionError::InsufficientCandidates { needed, available }));
        }

        let mut commands = vec![Command::CancelTimers];
        commands.extend(self.begin_round(1)?);
        Ok(commands)
    }

    /// Consume one event
    ///
    /// Rejected actions return an error and leave the state untouched. The
    /// only error that halts the session is
    /// [`SessionError::InsufficientCandidates`].
    pub fn handle(&mut self, event: GameEvent) -> Result<Vec<Command>, Error> {
        if let Some(halt) = &self.halted {
            if !matches!(event, GameEvent::RestartRequested) {
                if event.is_user_action() {
                    return Err(SessionError::Halted(halt.to_string()).into());
                }
                return Ok(Vec::new());
            }
        }

        match event {
            GameEvent::RestartRequested => {
                tracing::info!(session = %self.session.id, "Restart requested");
                // Restart is a user gesture
                self.playback.device_mut().unlock();
                Ok(self.start()?)
            }
            GameEvent::SelectRequested(id) => {
                self.select(id)?;
                Ok(Vec::new())
            }
            GameEvent::ClearSelectionRequested => {
                self.expect_phase(Phase::Selecting, "clear selection")?;
                if let Some(round) = self.round.as_mut() {
                    round.selected_id = None;
                }
                Ok(Vec::new())
            }
            GameEvent::ConfirmRequested => Ok(self.confirm()?),
            GameEvent::SkipRequested => Ok(self.skip()?),
            GameEvent::UserGestureReceived => {
                self.expect_phase(Phase::Reveal, "retry")?;
                let signal = self.playback.retry()?;
                Ok(self.apply(signal))
            }
            GameEvent::PreviewResolved { ticket, result } => {
                if let Ok(TrackMetadata {
                    artwork_url: Some(artwork_url),
                    ..
                }) = &result
                {
                    self.artwork.put(ticket.candidate.clone(), artwork_url.clone());
                }
                if self.session.phase != Phase::Reveal {
                    return Ok(Vec::new());
                }
                let signal = self.playback.on_resolved(&ticket, result);
                Ok(self.apply(signal))
            }
            GameEvent::TrackEnded(ticket) => {
                if self.session.phase != Phase::Reveal {
                    return Ok(Vec::new());
                }
                let signal = self.playback.on_media_ended(&ticket);
                Ok(self.apply(signal))
            }
            GameEvent::TrackError(ticket, reason) => {
                if self.session.phase != Phase::Reveal {
                    return Ok(Vec::new());
                }
                let signal = self.playback.on_media_error(&ticket, reason);
                Ok(self.apply(signal))
            }
            GameEvent::CeilingElapsed(ticket) => {
                if self.session.phase != Phase::Reveal {
                    return Ok(Vec::new());
                }
                let signal = self.playback.on_ceiling(&ticket);
                Ok(self.apply(signal))
            }
            GameEvent::AdvanceDue(ticket) => {
                let pending = self.session.phase == Phase::Reveal
                    && self.playback.ticket() == Some(&ticket)
                    && self.playback.status() == Some(PlaybackStatus::Failed);
                if !pending {
                    return Ok(Vec::new());
                }
                Ok(self.advance())
            }
            GameEvent::TransitionDue { session, round } => Ok(self.transition(session, round)?),
            GameEvent::Tick(delta) => {
                if self.session.phase == Phase::Reveal {
                    self.playback.tick(delta);
                }
                Ok(Vec::new())
            }
            GameEvent::NotificationExpired(id) => {
                if self.notification.as_ref().map(|n| n.id) == Some(id) {
                    self.notification = None;
                }
                Ok(Vec::new())
            }
        }
    }

    /// Current view for the presentation layer
    pub fn snapshot(&self) -> GameSnapshot {
        let round = self.round.as_ref();
        let now_playing = match (self.session.phase, round.and_then(Round::current)) {
            (Phase::Reveal, Some(candidate)) => Some(NowPlaying {
                candidate: self.artwork.enrich(candidate),
                ticket: self.playback.ticket().cloned(),
                source: self.playback.source().map(str::to_string),
                status: self.playback.status().unwrap_or(PlaybackStatus::Idle),
                progress_secs: self.playback.elapsed().as_secs_f32(),
                ceiling_secs: self.playback.ceiling().as_secs_f32(),
            }),
            _ => None,
        };

        GameSnapshot {
            session_id: self.session.id,
            phase: self.session.phase,
            round: round.map_or(0, |r| r.ordinal),
            total_rounds: self.config.total_rounds,
            reveal_index: round.map_or(0, |r| r.revealed_index),
            round_size: self.config.songs_per_round,
            revealed: round.map(|r| r.revealed.clone()).unwrap_or_default(),
            now_playing,
            selected_id: round.and_then(|r| r.selected_id.clone()),
            needs_gesture: self.needs_gesture,
            notification: self.notification.clone(),
            picks: self.session.picks.clone(),
            halted: self.halted.as_ref().map(ToString::to_string),
            result: self.result.clone(),
        }
    }

    fn halt(&mut self, error: SessionError) -> SessionError {
        tracing::error!(session = %self.session.id, error = %error, "Session halted");
        self.playback.teardown();
        self.needs_gesture = false;
        self.halted = Some(error.clone());
        error
    }

    fn expect_phase(&self, phase: Phase, action: &'static str) -> Result<(), SessionError> {
        if self.session.phase != phase {
            return Err(SessionError::InvalidAction {
                action,
                phase: self.session.phase,
            });
        }
        Ok(())
    }

    fn begin_round(&mut self, ordinal: usize) -> Result<Vec<Command>, SessionError> {
        let candidates = match self
            .selector
            .build_round(&self.session.excluded_ids, &self.pool)
        {
            Ok(candidates) => candidates,
            Err(e) => return Err(self.halt(e)),
        };

        self.session.exclude(&candidates);
        let prefetch: Vec<Candidate> = self
            .artwork
            .missing(&candidates)
            .into_iter()
            .cloned()
            .collect();

        tracing::info!(
            round = ordinal,
            excluded = self.session.excluded_ids.len(),
            "Round started"
        );
        self.round = Some(Round::new(ordinal, candidates));
        self.session.phase = Phase::Reveal;

        let mut commands = Vec::new();
        if !prefetch.is_empty() {
            commands.push(Command::PrefetchArtwork(prefetch));
        }
        commands.extend(self.load_current());
        Ok(commands)
    }

    /// Hand the candidate under the cursor to the playback controller
    fn load_current(&mut self) -> Vec<Command> {
        let Some(round) = self.round.as_ref() else {
            return Vec::new();
        };
        let ordinal = round.ordinal;
        let Some(candidate) = round.current().cloned() else {
            return Vec::new();
        };

        let ticket = self.playback.load(ordinal, &candidate);
        self.needs_gesture = false;

        let mut commands = vec![Command::CancelTimers];
        match candidate.preview_url.clone() {
            Some(preview_url) => {
                let metadata = TrackMetadata {
                    preview_url,
                    artwork_url: candidate.artwork_url.clone(),
                };
                let signal = self.playback.on_resolved(&ticket, Ok(metadata));
                commands.extend(self.apply(signal));
            }
            None => {
                // Bounds the lookup too; re-armed once playback starts
                commands.push(Command::ArmCeiling {
                    ticket: ticket.clone(),
                    after: self.playback.ceiling(),
                });
                commands.push(Command::Lookup {
                    ticket,
                    creator: candidate.creator,
                    title: candidate.title,
                });
            }
        }
        commands
    }

    fn apply(&mut self, signal: Option<Signal>) -> Vec<Command> {
        let Some(signal) = signal else {
            return Vec::new();
        };
        let Some(ticket) = self.playback.ticket().cloned() else {
            return Vec::new();
        };

        match signal {
            Signal::Started => {
                self.needs_gesture = false;
                vec![Command::ArmCeiling {
                    ticket,
                    after: self.config.ceiling(),
                }]
            }
            Signal::NeedsGesture => {
                self.needs_gesture = true;
                Vec::new()
            }
            Signal::Advance(cause) => {
                self.needs_gesture = false;
                tracing::info!(
                    round = ticket.round,
                    candidate = %ticket.candidate,
                    cause = ?cause,
                    "Candidate finished"
                );
                self.after_candidate(ticket, cause)
            }
        }
    }

    fn after_candidate(&mut self, ticket: Ticket, cause: AdvanceCause) -> Vec<Command> {
        match cause {
            AdvanceCause::Failed(PlaybackFailure::NoPreviewAvailable) => {
                let mut commands = vec![self.notify(
                    NotificationLevel::Error,
                    "Preview unavailable. Moving to the next song...",
                )];
                commands.extend(self.advance());
                commands
            }
            AdvanceCause::Failed(failure) => {
                let message = match failure {
                    PlaybackFailure::PlaybackBlocked => {
                        "Audio is blocked on this device. Moving to the next song..."
                    }
                    _ => "Preview could not be played. Moving to the next song...",
                };
                vec![
                    Command::CancelTimers,
                    self.notify(NotificationLevel::Error, message),
                    Command::ScheduleAdvance {
                        ticket,
                        after: self.config.failure_advance(),
                    },
                ]
            }
            AdvanceCause::Ended | AdvanceCause::Ceiling | AdvanceCause::Skipped => self.advance(),
        }
    }

    /// Move the current candidate into the revealed list and step the cursor
    fn advance(&mut self) -> Vec<Command> {
        let Some(round) = self.round.as_mut() else {
            return Vec::new();
        };
        if let Some(candidate) = round.current().cloned() {
            if round.revealed_candidate(&candidate.id).is_none() {
                round.revealed.push(self.artwork.enrich(&candidate));
            }
        }
        round.revealed_index += 1;

        if !round.is_fully_revealed() {
            return self.load_current();
        }

        let ordinal = round.ordinal;
        self.playback.teardown();
        self.session.phase = Phase::Selecting;
        tracing::info!(round = ordinal, "All candidates revealed, selection open");
        vec![
            Command::CancelTimers,
            self.notify(
                NotificationLevel::Info,
                "All songs have been played! Pick your favorite.",
            ),
        ]
    }

    fn select(&mut self, id: CandidateId) -> Result<(), SessionError> {
        self.expect_phase(Phase::Selecting, "select")?;
        let Some(round) = self.round.as_mut() else {
            return Err(SessionError::UnknownCandidate(id.to_string()));
        };
        if round.revealed_candidate(&id).is_none() {
            return Err(SessionError::UnknownCandidate(id.to_string()));
        }
        tracing::debug!(round = round.ordinal, candidate = %id, "Selected");
        round.selected_id = Some(id);
        Ok(())
    }

    fn confirm(&mut self) -> Result<Vec<Command>, SessionError> {
        self.expect_phase(Phase::Selecting, "confirm")?;
        let Some(round) = self.round.as_ref() else {
            return Ok(Vec::new());
        };
        let Some(pick) = round
            .selected_id
            .as_ref()
            .and_then(|id| round.revealed_candidate(id))
            .cloned()
        else {
            tracing::debug!(round = round.ordinal, "Confirm without a selection ignored");
            return Ok(Vec::new());
        };
        let ordinal = round.ordinal;

        tracing::info!(round = ordinal, pick = %pick.id, "Round confirmed");
        self.session.record_pick(pick);
        self.notification = None;

        if self.session.rounds_completed.len() == self.config.total_rounds {
            self.session.phase = Phase::Ended;
            let result = self.session.result();
            tracing::info!(
                session = %self.session.id,
                picks = result.picks.len(),
                "Session ended"
            );
            self.result = Some(result.clone());
            return Ok(vec![Command::CancelTimers, Command::Finished(result)]);
        }

        self.session.phase = Phase::Transitioning;
        Ok(vec![Command::ScheduleTransition {
            session: self.session.id,
            round: ordinal + 1,
            after: self.config.settle(),
        }])
    }

    fn transition(
        &mut self,
        session: uuid::Uuid,
        round: usize,
    ) -> Result<Vec<Command>, SessionError> {
        let expected = self.round.as_ref().map_or(1, |r| r.ordinal + 1);
        if self.session.phase != Phase::Transitioning
            || session != self.session.id
            || round != expected
        {
            tracing::debug!(round, "Discarding stale transition");
            return Ok(Vec::new());
        }
        self.begin_round(round)
    }

    fn skip(&mut self) -> Result<Vec<Command>, SessionError> {
        self.expect_phase(Phase::Reveal, "skip")?;
        match self.playback.skip() {
            Some(signal) => Ok(self.apply(Some(signal))),
            // A failed candidate waiting out its delay is skipped right away
            None if self.playback.status() == Some(PlaybackStatus::Failed) => Ok(self.advance()),
            None => Ok(Vec::new()),
        }
    }

    fn notify(&mut self, level: NotificationLevel, message: &str) -> Command {
        self.next_notification_id += 1;
        let notification = Notification {
            id: self.next_notification_id,
            level,
            message: message.to_string(),
        };
        self.notification = Some(notification.clone());
        Command::Notify {
            notification,
            dismiss_after: self.config.notification_lifetime(),
        }
    }
}
