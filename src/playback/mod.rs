//! Playback subsystem
//!
//! One candidate plays at a time through a single exclusive output device.

pub mod controller;
pub mod device;
pub mod headless;
#[cfg(test)]
pub mod testing;

pub use controller::{
    AdvanceCause, PlaybackController, PlaybackFailure, PlaybackState, PlaybackStatus, Signal,
    Ticket,
};
pub use device::{MediaEvent, MediaSink, PlayOutcome, PlaybackDevice};
pub use headless::HeadlessDevice;
