//! Device without audio output
//!
//! Logs what would be played and reports a natural end once the clip length
//! has passed. Optionally mimics a platform autoplay policy that refuses
//! playback until audio is unlocked by a user gesture.

use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::PlaybackConfig;
use crate::playback::controller::Ticket;
use crate::playback::device::{MediaEvent, MediaSink, PlayOutcome, PlaybackDevice};

pub struct HeadlessDevice {
    sink: Option<MediaSink>,
    clip_length: Duration,
    require_gesture: bool,
    unlocked: bool,
    volume: f32,
    end_task: Option<JoinHandle<()>>,
}

impl HeadlessDevice {
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            sink: None,
            clip_length: Duration::from_millis(config.clip_length_ms),
            require_gesture: config.require_gesture,
            unlocked: false,
            volume: config.volume,
            end_task: None,
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    fn cancel_end(&mut self) {
        if let Some(task) = self.end_task.take() {
            task.abort();
        }
    }
}

impl PlaybackDevice for HeadlessDevice {
    fn play(&mut self, ticket: &Ticket, source: &str) -> PlayOutcome {
        if self.require_gesture && !self.unlocked {
            return PlayOutcome::Blocked;
        }

        self.cancel_end();
        tracing::info!(
            candidate = %ticket.candidate,
            source = %source,
            volume = self.volume,
            "Now playing"
        );

        if let Some(sink) = self.sink.clone() {
            let ticket = ticket.clone();
            let clip_length = self.clip_length;
            self.end_task = Some(tokio::spawn(async move {
                tokio::time::sleep(clip_length).await;
                let _ = sink.send(MediaEvent::Ended(ticket));
            }));
        }
        PlayOutcome::Started
    }

    fn pause(&mut self) {
        self.cancel_end();
    }

    fn set_position(&mut self, _position: Duration) {}

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn unlock(&mut self) {
        if !self.unlocked {
            tracing::debug!("Audio unlocked");
        }
        self.unlocked = true;
    }

    fn attach(&mut self, sink: MediaSink) {
        self.sink = Some(sink);
    }
}

impl Drop for HeadlessDevice {
    fn drop(&mut self) {
        self.cancel_end();
    }
}
