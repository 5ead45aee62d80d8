//! Domain module - core call entities and run-scoped state
//!
//! Modern Rust module organization (Rust 2018+ style):
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

pub mod call;
pub mod dedup;

pub use call::{AudioRef, CallRecord, CallStatus};
pub use dedup::{CallRegistry, InMemorySeenCalls};
