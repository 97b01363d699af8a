//! Event queue vocabulary
//!
//! Everything that can change game state arrives as a [`GameEvent`] and is
//! consumed one at a time. The state machine answers with [`Command`]s the
//! runtime carries out.

use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

use crate::catalog::{Candidate, CandidateId};
use crate::error::LookupError;
use crate::game::session::SessionResult;
use crate::lookup::TrackMetadata;
use crate::playback::Ticket;

#[derive(Debug)]
pub enum GameEvent {
    SelectRequested(CandidateId),
    ClearSelectionRequested,
    ConfirmRequested,
    SkipRequested,
    /// Tap from the player while playback is blocked
    UserGestureReceived,
    RestartRequested,

    PreviewResolved {
        ticket: Ticket,
        result: Result<TrackMetadata, LookupError>,
    },
    TrackEnded(Ticket),
    TrackError(Ticket, String),
    CeilingElapsed(Ticket),
    /// Delayed advance after a playback failure
    AdvanceDue(Ticket),
    TransitionDue {
        session: Uuid,
        round: usize,
    },
    Tick(Duration),
    NotificationExpired(u64),
}

impl GameEvent {
    /// Short label for logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::SelectRequested(_) => "select",
            GameEvent::ClearSelectionRequested => "clear selection",
            GameEvent::ConfirmRequested => "confirm",
            GameEvent::SkipRequested => "skip",
            GameEvent::UserGestureReceived => "retry",
            GameEvent::RestartRequested => "restart",
            GameEvent::PreviewResolved { .. } => "preview resolved",
            GameEvent::TrackEnded(_) => "track ended",
            GameEvent::TrackError(..) => "track error",
            GameEvent::CeilingElapsed(_) => "ceiling elapsed",
            GameEvent::AdvanceDue(_) => "advance due",
            GameEvent::TransitionDue { .. } => "transition due",
            GameEvent::Tick(_) => "tick",
            GameEvent::NotificationExpired(_) => "notification expired",
        }
    }

    /// Issued by the player rather than by a timer or a media callback
    pub fn is_user_action(&self) -> bool {
        matches!(
            self,
            GameEvent::SelectRequested(_)
                | GameEvent::ClearSelectionRequested
                | GameEvent::ConfirmRequested
                | GameEvent::SkipRequested
                | GameEvent::UserGestureReceived
                | GameEvent::RestartRequested
        )
    }
}

/// Side effects requested by the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Resolve the preview for the candidate behind `ticket`
    Lookup {
        ticket: Ticket,
        creator: String,
        title: String,
    },
    /// Warm the artwork cache for a freshly drawn round
    PrefetchArtwork(Vec<Candidate>),
    ArmCeiling {
        ticket: Ticket,
        after: Duration,
    },
    ScheduleAdvance {
        ticket: Ticket,
        after: Duration,
    },
    ScheduleTransition {
        session: Uuid,
        round: usize,
        after: Duration,
    },
    /// Abort pending lookup, ceiling and advance timers
    CancelTimers,
    Notify {
        notification: Notification,
        dismiss_after: Duration,
    },
    Finished(SessionResult),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Error,
}

/// Short-lived message for the player
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: u64,
    pub level: NotificationLevel,
    pub message: String,
}
