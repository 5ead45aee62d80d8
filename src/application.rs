//! Application layer module
//!
//! The per-call dispatch logic and the top-level polling loop that tie
//! session, parser, dedup registry and pipelines together.

pub mod dispatch;
pub mod poller;

pub use dispatch::{MessageHandle, NotificationDispatcher, Notify};
pub use poller::{CallProcessor, Poller, RecordingPipeline};
