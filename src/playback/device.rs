//! Output device abstraction

use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::playback::controller::Ticket;

/// Result of asking the device to start a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    Started,
    /// Refused by the platform until a user gesture unlocks audio
    Blocked,
    Failed(String),
}

/// Asynchronous media notifications, tagged with the ticket the source was
/// started under
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MediaEvent {
    Ended(Ticket),
    Error(Ticket, String),
}

impl MediaEvent {
    pub fn ticket(&self) -> &Ticket {
        match self {
            MediaEvent::Ended(ticket) | MediaEvent::Error(ticket, _) => ticket,
        }
    }
}

/// Channel on which a device reports media events
pub type MediaSink = mpsc::UnboundedSender<MediaEvent>;

/// Audio sink driven exclusively by the playback controller
pub trait PlaybackDevice: Send + 'static {
    /// Start `source`. Natural end and errors arrive later as [`MediaEvent`]s
    fn play(&mut self, ticket: &Ticket, source: &str) -> PlayOutcome;

    fn pause(&mut self);

    fn set_position(&mut self, position: Duration);

    fn set_volume(&mut self, volume: f32);

    /// Unlock audio from inside a user gesture
    fn unlock(&mut self) {}

    /// Route media events to `sink`
    fn attach(&mut self, _sink: MediaSink) {}
}

impl<D: PlaybackDevice + ?Sized> PlaybackDevice for Box<D> {
    fn play(&mut self, ticket: &Ticket, source: &str) -> PlayOutcome {
        (**self).play(ticket, source)
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn set_position(&mut self, position: Duration) {
        (**self).set_position(position)
    }

    fn set_volume(&mut self, volume: f32) {
        (**self).set_volume(volume)
    }

    fn unlock(&mut self) {
        (**self).unlock()
    }

    fn attach(&mut self, sink: MediaSink) {
        (**self).attach(sink)
    }
}
