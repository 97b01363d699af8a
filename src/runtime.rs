//! Game runtime
//!
//! Single consumer of the event queue. Feeds events to the
//! [`RoundStateMachine`] one at a time, carries out the returned commands
//! (lookups, timers, artwork prefetch) and publishes a fresh
//! [`GameSnapshot`] after every event.
//!
//! Timers are spawned tasks that post an event back when they fire. Each one
//! carries the ticket or round it was armed for, so a timer that outlives its
//! candidate is dropped by the state machine.

use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::artwork::ArtworkCache;
use crate::catalog::{Candidate, CandidateId};
use crate::error::{Error, Result};
use crate::game::{
    Command, GameEvent, GameSnapshot, NotificationLevel, RoundStateMachine, SessionResult,
};
use crate::lookup::{MetadataLookup, TrackMetadata};
use crate::playback::{MediaEvent, PlaybackDevice, Ticket};

enum Envelope {
    Event {
        event: GameEvent,
        reply: Option<oneshot::Sender<Result<()>>>,
    },
    Shutdown,
}

/// Pending timer tasks
#[derive(Default)]
struct Timers {
    lookup: Option<JoinHandle<()>>,
    ceiling: Option<JoinHandle<()>>,
    advance: Option<JoinHandle<()>>,
    transition: Option<JoinHandle<()>>,
    notification: Option<JoinHandle<()>>,
    prefetch: Option<JoinHandle<()>>,
}

impl Timers {
    fn replace(slot: &mut Option<JoinHandle<()>>, task: JoinHandle<()>) {
        if let Some(previous) = slot.replace(task) {
            previous.abort();
        }
    }

    fn abort(slot: &mut Option<JoinHandle<()>>) {
        if let Some(task) = slot.take() {
            task.abort();
        }
    }

    /// Everything tied to the current candidate
    fn cancel_candidate(&mut self) {
        Self::abort(&mut self.lookup);
        Self::abort(&mut self.ceiling);
        Self::abort(&mut self.advance);
    }

    fn cancel_all(&mut self) {
        self.cancel_candidate();
        Self::abort(&mut self.transition);
        Self::abort(&mut self.notification);
        Self::abort(&mut self.prefetch);
    }
}

pub struct GameRuntime<D: PlaybackDevice, L: MetadataLookup> {
    machine: RoundStateMachine<D>,
    lookup: Arc<L>,
    tick: Duration,
    events_tx: mpsc::UnboundedSender<Envelope>,
    events_rx: mpsc::UnboundedReceiver<Envelope>,
    media_rx: mpsc::UnboundedReceiver<MediaEvent>,
    snapshot_tx: watch::Sender<GameSnapshot>,
    timers: Timers,
}

impl<D: PlaybackDevice, L: MetadataLookup> GameRuntime<D, L> {
    /// Wire `machine` to its queues; the session starts when [`run`](Self::run) is called
    pub fn new(mut machine: RoundStateMachine<D>, lookup: Arc<L>) -> (Self, GameHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (media_tx, media_rx) = mpsc::unbounded_channel();
        machine.device_mut().attach(media_tx);

        let (snapshot_tx, snapshot_rx) = watch::channel(machine.snapshot());
        let tick = machine.config().progress_tick();

        let handle = GameHandle {
            tx: events_tx.clone(),
            snapshot: snapshot_rx,
        };
        let runtime = Self {
            machine,
            lookup,
            tick,
            events_tx,
            events_rx,
            media_rx,
            snapshot_tx,
            timers: Timers::default(),
        };
        (runtime, handle)
    }

    /// Process events until [`GameHandle::shutdown`] is called
    pub async fn run(mut self) -> Result<()> {
        match self.machine.start() {
            Ok(commands) => self.execute(commands),
            Err(e) => tracing::error!(error = %e, "Session could not start"),
        }
        self.publish();

        let mut ticker = interval_at(Instant::now() + self.tick, self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                envelope = self.events_rx.recv() => match envelope {
                    Some(Envelope::Event { event, reply }) => {
                        let outcome = self.dispatch(event);
                        if let Some(reply) = reply {
                            let _ = reply.send(outcome);
                        }
                    }
                    Some(Envelope::Shutdown) | None => break,
                },
                Some(media) = self.media_rx.recv() => {
                    tracing::debug!(
                        candidate = %media.ticket().candidate,
                        generation = media.ticket().generation,
                        "Media event"
                    );
                    let event = match media {
                        MediaEvent::Ended(ticket) => GameEvent::TrackEnded(ticket),
                        MediaEvent::Error(ticket, reason) => GameEvent::TrackError(ticket, reason),
                    };
                    if let Err(e) = self.dispatch(event) {
                        tracing::warn!(error = %e, "Media event rejected");
                    }
                }
                _ = ticker.tick() => {
                    let _ = self.dispatch(GameEvent::Tick(self.tick));
                }
            }
        }

        tracing::info!("Game runtime stopping");
        self.timers.cancel_all();
        self.machine.stop();
        Ok(())
    }

    fn dispatch(&mut self, event: GameEvent) -> Result<()> {
        let name = event.name();
        let outcome = self.machine.handle(event);
        let result = match outcome {
            Ok(commands) => {
                self.execute(commands);
                Ok(())
            }
            Err(e) => {
                tracing::debug!(event = name, error = %e, "Event rejected");
                Err(e)
            }
        };
        self.publish();
        result
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.machine.snapshot());
    }

    fn execute(&mut self, commands: Vec<Command>) {
        for command in commands {
            match command {
                Command::Lookup {
                    ticket,
                    creator,
                    title,
                } => {
                    let lookup = Arc::clone(&self.lookup);
                    let tx = self.events_tx.clone();
                    let task = tokio::spawn(async move {
                        let result = lookup.resolve(&creator, &title).await;
                        let _ = tx.send(Envelope::Event {
                            event: GameEvent::PreviewResolved { ticket, result },
                            reply: None,
                        });
                    });
                    Timers::replace(&mut self.timers.lookup, task);
                }
                Command::PrefetchArtwork(candidates) => {
                    let lookup = Arc::clone(&self.lookup);
                    let artwork = self.machine.artwork().clone();
                    let task = tokio::spawn(prefetch_artwork(lookup, artwork, candidates));
                    Timers::replace(&mut self.timers.prefetch, task);
                }
                Command::ArmCeiling { ticket, after } => {
                    let task = self.schedule(after, GameEvent::CeilingElapsed(ticket));
                    Timers::replace(&mut self.timers.ceiling, task);
                }
                Command::ScheduleAdvance { ticket, after } => {
                    let task = self.schedule(after, GameEvent::AdvanceDue(ticket));
                    Timers::replace(&mut self.timers.advance, task);
                }
                Command::ScheduleTransition {
                    session,
                    round,
                    after,
                } => {
                    let task = self.schedule(after, GameEvent::TransitionDue { session, round });
                    Timers::replace(&mut self.timers.transition, task);
                }
                Command::CancelTimers => self.timers.cancel_candidate(),
                Command::Notify {
                    notification,
                    dismiss_after,
                } => {
                    match notification.level {
                        NotificationLevel::Info => {
                            tracing::info!(message = %notification.message, "Notification")
                        }
                        NotificationLevel::Error => {
                            tracing::warn!(message = %notification.message, "Notification")
                        }
                    }
                    let task = self.schedule(
                        dismiss_after,
                        GameEvent::NotificationExpired(notification.id),
                    );
                    Timers::replace(&mut self.timers.notification, task);
                }
                Command::Finished(result) => {
                    tracing::info!(
                        session = %result.session_id,
                        picks = result.picks.len(),
                        playlist = %result.playlist_url(),
                        "Session finished"
                    );
                }
            }
        }
    }

    fn schedule(&self, after: Duration, event: GameEvent) -> JoinHandle<()> {
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(Envelope::Event { event, reply: None });
        })
    }
}

/// Resolve artwork for every candidate of a round concurrently
async fn prefetch_artwork<L: MetadataLookup>(
    lookup: Arc<L>,
    artwork: ArtworkCache,
    candidates: Vec<Candidate>,
) {
    let mut pending = Vec::new();
    for candidate in &candidates {
        match &candidate.artwork_url {
            Some(url) => artwork.put(candidate.id.clone(), url.clone()),
            None => pending.push(candidate),
        }
    }

    let lookups = pending.into_iter().map(|candidate| {
        let lookup = &lookup;
        async move {
            let result = lookup.resolve(&candidate.creator, &candidate.title).await;
            (candidate.id.clone(), result)
        }
    });

    for (id, result) in join_all(lookups).await {
        match result {
            Ok(TrackMetadata {
                artwork_url: Some(url),
                ..
            }) => artwork.put(id, url),
            Ok(_) => {}
            Err(e) => tracing::debug!(candidate = %id, error = %e, "Artwork prefetch missed"),
        }
    }
}

/// Cloneable front door to a running [`GameRuntime`]
#[derive(Clone)]
pub struct GameHandle {
    tx: mpsc::UnboundedSender<Envelope>,
    snapshot: watch::Receiver<GameSnapshot>,
}

impl GameHandle {
    async fn request(&self, event: GameEvent) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Envelope::Event {
                event,
                reply: Some(reply_tx),
            })
            .map_err(|_| Error::Stopped)?;
        reply_rx.await.map_err(|_| Error::Stopped)?
    }

    fn post(&self, event: GameEvent) -> Result<()> {
        self.tx
            .send(Envelope::Event { event, reply: None })
            .map_err(|_| Error::Stopped)
    }

    pub async fn select(&self, id: CandidateId) -> Result<()> {
        self.request(GameEvent::SelectRequested(id)).await
    }

    pub async fn clear_selection(&self) -> Result<()> {
        self.request(GameEvent::ClearSelectionRequested).await
    }

    pub async fn confirm(&self) -> Result<()> {
        self.request(GameEvent::ConfirmRequested).await
    }

    pub async fn skip(&self) -> Result<()> {
        self.request(GameEvent::SkipRequested).await
    }

    /// Retry blocked playback; the caller is handling a user gesture
    pub async fn retry(&self) -> Result<()> {
        self.request(GameEvent::UserGestureReceived).await
    }

    pub async fn restart(&self) -> Result<()> {
        self.request(GameEvent::RestartRequested).await
    }

    /// Natural end reported by an external player
    pub fn media_ended(&self, ticket: Ticket) -> Result<()> {
        self.post(GameEvent::TrackEnded(ticket))
    }

    /// Media error reported by an external player
    pub fn media_error(&self, ticket: Ticket, reason: impl Into<String>) -> Result<()> {
        self.post(GameEvent::TrackError(ticket, reason.into()))
    }

    pub fn snapshot(&self) -> GameSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GameSnapshot> {
        self.snapshot.clone()
    }

    /// Wait until the session ends; `None` if the runtime stops first
    pub async fn wait_for_result(&self) -> Option<SessionResult> {
        let mut rx = self.subscribe();
        loop {
            if let Some(result) = rx.borrow_and_update().result.clone() {
                return Some(result);
            }
            if rx.changed().await.is_err() {
                return None;
            }
        }
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(Envelope::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GameConfig, PlaybackConfig};
    use crate::error::SessionError;
    use crate::game::Phase;
    use crate::lookup::MemoryLookup;
    use crate::playback::{HeadlessDevice, PlaybackController, PlaybackStatus};

    fn pool(size: usize) -> Vec<Candidate> {
        (0..size)
            .map(|i| Candidate::new(format!("v{i}"), format!("Song {i}"), format!("Band {i}"), 1990))
            .collect()
    }

    fn spawn_game(size: usize, playback: PlaybackConfig) -> (GameHandle, MemoryLookup) {
        let candidates = pool(size);
        let lookup = MemoryLookup::covering(&candidates);
        spawn_with(candidates, lookup, playback)
    }

    fn spawn_with(
        candidates: Vec<Candidate>,
        lookup: MemoryLookup,
        playback: PlaybackConfig,
    ) -> (GameHandle, MemoryLookup) {
        let config = GameConfig::default();
        let controller =
            PlaybackController::new(HeadlessDevice::new(&playback), config.ceiling(), 1.0);
        let machine = RoundStateMachine::new(config, candidates, controller, ArtworkCache::new())
            .with_seed(5);

        let (runtime, handle) = GameRuntime::new(machine, Arc::new(lookup.clone()));
        tokio::spawn(runtime.run());
        (handle, lookup)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_advances_after_ten_seconds() {
        let (handle, _) = spawn_game(200, PlaybackConfig::default());
        settle().await;

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.phase, Phase::Reveal);
        assert_eq!(snapshot.round, 1);
        assert_eq!(
            snapshot.now_playing.map(|n| n.status),
            Some(PlaybackStatus::Playing)
        );

        tokio::time::sleep(Duration::from_millis(9_800)).await;
        assert_eq!(handle.snapshot().reveal_index, 0);
        let progress = handle.snapshot().now_playing.unwrap().progress_secs;
        assert!(progress > 9.0 && progress <= 10.0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.reveal_index, 1);
        assert_eq!(snapshot.revealed.len(), 1);
        assert!(snapshot.now_playing.unwrap().progress_secs < 0.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_lookup_advances_at_ceiling() {
        let candidates = pool(200);
        let lookup = MemoryLookup::covering(&candidates).with_latency(Duration::from_secs(120));
        let (handle, _) = spawn_with(candidates, lookup, PlaybackConfig::default());
        settle().await;

        let snapshot = handle.snapshot();
        assert_eq!(
            snapshot.now_playing.map(|n| n.status),
            Some(PlaybackStatus::Idle)
        );

        tokio::time::sleep(Duration::from_millis(9_800)).await;
        assert_eq!(handle.snapshot().reveal_index, 0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.reveal_index, 1);
        assert_eq!(snapshot.phase, Phase::Reveal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_flow_through_handle() {
        let (handle, _) = spawn_game(200, PlaybackConfig::default());
        settle().await;

        assert!(matches!(
            handle.confirm().await,
            Err(Error::Session(SessionError::InvalidAction { .. }))
        ));

        for _ in 0..5 {
            handle.skip().await.unwrap();
        }
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.phase, Phase::Selecting);
        assert!(snapshot.now_playing.is_none());
        assert_eq!(snapshot.revealed.len(), 5);

        // Nothing selected yet
        handle.confirm().await.unwrap();
        assert_eq!(handle.snapshot().phase, Phase::Selecting);

        let pick = snapshot.revealed[2].id.clone();
        handle.select(pick.clone()).await.unwrap();
        assert!(handle.snapshot().can_confirm());
        handle.confirm().await.unwrap();
        assert_eq!(handle.snapshot().phase, Phase::Transitioning);
        assert_eq!(handle.snapshot().picks.len(), 1);
        assert_eq!(handle.snapshot().picks[0].id, pick);

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(handle.snapshot().phase, Phase::Transitioning);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.phase, Phase::Reveal);
        assert_eq!(snapshot.round, 2);
        assert_eq!(snapshot.reveal_index, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_media_error_advances_after_delay() {
        let (handle, _) = spawn_game(200, PlaybackConfig::default());
        settle().await;

        let ticket = handle.snapshot().now_playing.unwrap().ticket.unwrap();

        // A report for another candidate is dropped
        let mut stale = ticket.clone();
        stale.generation += 100;
        handle.media_error(stale, "decoder").unwrap();
        settle().await;
        assert!(handle.snapshot().notification.is_none());

        handle.media_error(ticket, "decoder").unwrap();
        settle().await;

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.reveal_index, 0);
        assert_eq!(
            snapshot.notification.map(|n| n.level),
            Some(NotificationLevel::Error)
        );

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(handle.snapshot().reveal_index, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_playback_waits_for_gesture() {
        let (handle, _) = spawn_game(
            200,
            PlaybackConfig {
                require_gesture: true,
                ..Default::default()
            },
        );
        settle().await;

        let snapshot = handle.snapshot();
        assert!(snapshot.needs_gesture);
        assert_eq!(
            snapshot.now_playing.map(|n| n.status),
            Some(PlaybackStatus::Blocked)
        );

        // No ceiling while blocked
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(handle.snapshot().reveal_index, 0);

        handle.retry().await.unwrap();
        let snapshot = handle.snapshot();
        assert!(!snapshot.needs_gesture);
        assert_eq!(
            snapshot.now_playing.map(|n| n.status),
            Some(PlaybackStatus::Playing)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_artwork_prefetched_for_round() {
        let (handle, lookup) = spawn_game(200, PlaybackConfig::default());
        settle().await;

        // Five prefetches plus the first preview lookup
        assert_eq!(lookup.calls(), 6);
        handle.skip().await.unwrap();
        let revealed = &handle.snapshot().revealed[0];
        assert!(revealed
            .artwork_url
            .as_deref()
            .is_some_and(|url| url.starts_with("memory://artwork/")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_insufficient_pool_halts_until_restart() {
        let (handle, _) = spawn_game(40, PlaybackConfig::default());
        settle().await;

        let snapshot = handle.snapshot();
        assert!(snapshot.halted.is_some());
        assert!(matches!(
            handle.skip().await,
            Err(Error::Session(SessionError::Halted(_)))
        ));
        assert!(matches!(
            handle.restart().await,
            Err(Error::Session(SessionError::InsufficientCandidates { .. }))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_and_shutdown() {
        let (handle, _) = spawn_game(200, PlaybackConfig::default());
        settle().await;
        let first = handle.snapshot().session_id;

        handle.skip().await.unwrap();
        handle.restart().await.unwrap();
        let snapshot = handle.snapshot();
        assert_ne!(snapshot.session_id, first);
        assert_eq!(snapshot.reveal_index, 0);

        handle.shutdown();
        settle().await;
        assert!(matches!(handle.skip().await, Err(Error::Stopped)));
    }
}
