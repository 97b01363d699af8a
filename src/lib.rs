//! # Square Savior
//!
//! Twenty-round song picking game. Each round five songs are revealed one
//! after another as short previews, then the player keeps exactly one of them.
//! No song is ever offered twice in the same session.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                      Presentation (ui::WebServer)                         │
//! │        select / clear / confirm / skip / retry / restart  ▲ snapshots     │
//! └───────────────────────────────┬───────────────────────────┼──────────────┘
//!                                 ▼                           │
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                    Runtime (runtime::GameRuntime)                         │
//! │   event queue ─► RoundStateMachine::handle ─► commands (timers, lookups)  │
//! └───────┬──────────────────────┬─────────────────────────┬─────────────────┘
//!         │                      │                         │
//!         ▼                      ▼                         ▼
//! ┌───────────────┐   ┌────────────────────┐   ┌──────────────────────────┐
//! │ RoundSelector │   │ PlaybackController │   │ MetadataLookup (iTunes)  │
//! │ Fisher-Yates  │   │  Idle ► Loading ►  │   │  preview + artwork URLs  │
//! │ + exclusions  │   │  Playing/Blocked ► │   └────────────┬─────────────┘
//! └───────┬───────┘   │  Ended/Failed      │                │
//!         │           └─────────┬──────────┘                ▼
//!         ▼                     ▼                  ┌──────────────────┐
//! ┌───────────────┐   ┌────────────────────┐       │  ArtworkCache    │
//! │ CatalogProvider│  │  PlaybackDevice    │       └──────────────────┘
//! └───────────────┘   └────────────────────┘
//! ```

pub mod artwork;
pub mod catalog;
pub mod config;
pub mod error;
pub mod game;
pub mod lookup;
pub mod playback;
pub mod runtime;
pub mod selector;
pub mod ui;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Rounds in one session
    pub const TOTAL_ROUNDS: usize = 20;

    /// Candidates offered per round
    pub const SONGS_PER_ROUND: usize = 5;

    /// Hard upper bound on one candidate's playback, in milliseconds
    pub const CEILING_MS: u64 = 10_000;

    /// Settle delay between a confirmed round and the next reveal
    pub const TRANSITION_SETTLE_MS: u64 = 400;

    /// Delay before advancing past a candidate that failed to play
    pub const FAILURE_ADVANCE_MS: u64 = 500;

    /// Lifetime of a notification before it is dismissed
    pub const NOTIFICATION_MS: u64 = 4_000;

    /// Progress tick interval
    pub const PROGRESS_TICK_MS: u64 = 100;

    /// Edge length requested for upscaled artwork
    pub const ARTWORK_SIZE: u32 = 600;

    /// Default HTTP port for the presentation API
    pub const DEFAULT_HTTP_PORT: u16 = 8080;

    /// Default iTunes search endpoint
    pub const ITUNES_SEARCH_URL: &str = "https://itunes.apple.com/search";
}
