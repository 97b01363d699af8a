//! Candidate catalog
//!
//! The static pool of songs a session draws its rounds from.

pub mod candidate;
pub mod loader;

pub use candidate::{Candidate, CandidateId};
pub use loader::{CatalogProvider, JsonCatalog, StaticCatalog};
