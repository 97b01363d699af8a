//! Scripted device for tests

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::playback::controller::Ticket;
use crate::playback::device::{MediaEvent, MediaSink, PlayOutcome, PlaybackDevice};

#[derive(Debug, Default)]
struct Record {
    plays: Vec<String>,
    tickets: Vec<Ticket>,
    pauses: usize,
    unlocks: usize,
    volume: Option<f32>,
    sink: Option<MediaSink>,
}

/// Shared view of what a [`ScriptedDevice`] was asked to do
#[derive(Debug, Clone, Default)]
pub struct DeviceLog(Arc<Mutex<Record>>);

impl DeviceLog {
    pub fn plays(&self) -> Vec<String> {
        self.0.lock().plays.clone()
    }

    pub fn last_ticket(&self) -> Option<Ticket> {
        self.0.lock().tickets.last().cloned()
    }

    pub fn pauses(&self) -> usize {
        self.0.lock().pauses
    }

    pub fn unlocks(&self) -> usize {
        self.0.lock().unlocks
    }

    pub fn volume(&self) -> Option<f32> {
        self.0.lock().volume
    }

    /// Report a natural end for the most recently started source
    pub fn finish_current(&self) -> bool {
        let record = self.0.lock();
        match (record.sink.as_ref(), record.tickets.last()) {
            (Some(sink), Some(ticket)) => sink.send(MediaEvent::Ended(ticket.clone())).is_ok(),
            _ => false,
        }
    }
}

/// Device answering `play` from a queue of outcomes, `Started` once empty
pub struct ScriptedDevice {
    outcomes: VecDeque<PlayOutcome>,
    log: DeviceLog,
}

impl ScriptedDevice {
    pub fn new(outcomes: Vec<PlayOutcome>) -> Self {
        Self {
            outcomes: outcomes.into(),
            log: DeviceLog::default(),
        }
    }

    pub fn log(&self) -> DeviceLog {
        self.log.clone()
    }
}

impl PlaybackDevice for ScriptedDevice {
    fn play(&mut self, ticket: &Ticket, source: &str) -> PlayOutcome {
        let outcome = self.outcomes.pop_front().unwrap_or(PlayOutcome::Started);
        if outcome == PlayOutcome::Started {
            let mut record = self.log.0.lock();
            record.plays.push(source.to_string());
            record.tickets.push(ticket.clone());
        }
        outcome
    }

    fn pause(&mut self) {
        self.log.0.lock().pauses += 1;
    }

    fn set_position(&mut self, _position: Duration) {}

    fn set_volume(&mut self, volume: f32) {
        self.log.0.lock().volume = Some(volume);
    }

    fn unlock(&mut self) {
        self.log.0.lock().unlocks += 1;
    }

    fn attach(&mut self, sink: MediaSink) {
        self.log.0.lock().sink = Some(sink);
    }
}
