//! Session and round records

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

use crate::catalog::{Candidate, CandidateId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// Candidates play one after another and cannot be picked yet
    Reveal,
    /// Everything revealed, waiting for a pick and confirmation
    Selecting,
    /// Settling before the next round is drawn
    Transitioning,
    Ended,
}

/// One reveal-then-select cycle
#[derive(Debug, Clone, Serialize)]
pub struct Round {
    pub ordinal: usize,
    pub candidates: Vec<Candidate>,
    pub revealed_index: usize,
    /// Candidates already played, with whatever artwork was cached when they finished
    pub revealed: Vec<Candidate>,
    pub selected_id: Option<CandidateId>,
}

impl Round {
    pub fn new(ordinal: usize, candidates: Vec<Candidate>) -> Self {
        Self {
            ordinal,
            candidates,
            revealed_index: 0,
            revealed: Vec::new(),
            selected_id: None,
        }
    }

    /// Candidate currently being revealed
    pub fn current(&self) -> Option<&Candidate> {
        self.candidates.get(self.revealed_index)
    }

    pub fn is_fully_revealed(&self) -> bool {
        self.revealed_index >= self.candidates.len()
    }

    pub fn revealed_candidate(&self, id: &CandidateId) -> Option<&Candidate> {
        self.revealed.iter().find(|candidate| &candidate.id == id)
    }
}

/// A full game from start to final result
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub phase: Phase,
    /// Picked id of every confirmed round, in order
    pub rounds_completed: Vec<CandidateId>,
    pub picks: Vec<Candidate>,
    /// Every id shown in any round so far; only grows
    pub excluded_ids: HashSet<CandidateId>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            phase: Phase::Reveal,
            rounds_completed: Vec::new(),
            picks: Vec::new(),
            excluded_ids: HashSet::new(),
        }
    }

    pub fn exclude<'a>(&mut self, candidates: impl IntoIterator<Item = &'a Candidate>) {
        self.excluded_ids
            .extend(candidates.into_iter().map(|candidate| candidate.id.clone()));
    }

    pub fn record_pick(&mut self, pick: Candidate) {
        self.rounds_completed.push(pick.id.clone());
        self.picks.push(pick);
    }

    /// Final result, stamped now
    pub fn result(&self) -> SessionResult {
        SessionResult {
            session_id: self.id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            picks: self.picks.clone(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Ordered picks of a finished session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionResult {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub picks: Vec<Candidate>,
}

impl SessionResult {
    /// Anonymous YouTube playlist of the picks, in pick order
    pub fn playlist_url(&self) -> String {
        let ids: Vec<&str> = self.picks.iter().map(|pick| pick.id.as_str()).collect();
        format!(
            "https://www.youtube.com/watch_videos?video_ids={}",
            ids.join(",")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_cursor() {
        let mut round = Round::new(
            1,
            vec![
                Candidate::new("a", "A", "X", 2000),
                Candidate::new("b", "B", "Y", 2000),
            ],
        );
        assert_eq!(round.current().map(|c| c.id.as_str()), Some("a"));
        round.revealed_index = 2;
        assert!(round.is_fully_revealed());
        assert!(round.current().is_none());
    }

    #[test]
    fn test_playlist_url_keeps_order() {
        let mut session = Session::new();
        session.record_pick(Candidate::new("b", "B", "Y", 2000));
        session.record_pick(Candidate::new("a", "A", "X", 2000));
        assert_eq!(session.rounds_completed.len(), 2);

        let result = session.result();
        assert_eq!(
            result.playlist_url(),
            "https://www.youtube.com/watch_videos?video_ids=b,a"
        );
    }
}
