//! Read-only view of the game for the presentation layer

use serde::Serialize;
use uuid::Uuid;

use crate::catalog::{Candidate, CandidateId};
use crate::game::event::Notification;
use crate::game::session::{Phase, SessionResult};
use crate::playback::{PlaybackStatus, Ticket};

/// Candidate under the reveal cursor and its progress
#[derive(Debug, Clone, Serialize)]
pub struct NowPlaying {
    pub candidate: Candidate,
    /// Echoed back by the client when it reports media end or error
    pub ticket: Option<Ticket>,
    /// Resolved preview URL for the client's audio element
    pub source: Option<String>,
    pub status: PlaybackStatus,
    pub progress_secs: f32,
    pub ceiling_secs: f32,
}

impl NowPlaying {
    /// Progress as a fraction of the ceiling, 0.0 to 1.0
    pub fn fraction(&self) -> f32 {
        if self.ceiling_secs <= 0.0 {
            return 0.0;
        }
        (self.progress_secs / self.ceiling_secs).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GameSnapshot {
    pub session_id: Uuid,
    pub phase: Phase,
    /// 1-based; 0 before the first round is drawn
    pub round: usize,
    pub total_rounds: usize,
    pub reveal_index: usize,
    pub round_size: usize,
    pub revealed: Vec<Candidate>,
    pub now_playing: Option<NowPlaying>,
    pub selected_id: Option<CandidateId>,
    pub needs_gesture: bool,
    pub notification: Option<Notification>,
    pub picks: Vec<Candidate>,
    pub halted: Option<String>,
    pub result: Option<SessionResult>,
}

impl GameSnapshot {
    /// Whether selection controls should accept input
    pub fn can_select(&self) -> bool {
        self.phase == Phase::Selecting
    }

    /// Whether confirm should be enabled
    pub fn can_confirm(&self) -> bool {
        self.can_select() && self.selected_id.is_some()
    }
}
