//! Round state machine
//!
//! Owns the session, composes round selection and candidate playback into
//! phase transitions, and tells the runtime which side effects to perform.

pub mod event;
pub mod machine;
pub mod session;
pub mod snapshot;

pub use event::{Command, GameEvent, Notification, NotificationLevel};
pub use machine::RoundStateMachine;
pub use session::{Phase, Round, Session, SessionResult};
pub use snapshot::{GameSnapshot, NowPlaying};
