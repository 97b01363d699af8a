//! Web presentation layer
//!
//! Renders nothing itself: exposes game snapshots and player actions over
//! HTTP, plus a server-sent event stream of snapshots.

pub mod handlers;
pub mod server;

pub use server::{AppState, WebServer};
