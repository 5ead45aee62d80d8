//! callwatch - carrier dashboard live-call watcher with Telegram relay
//!
//! Watches a carrier dashboard's live-calls table on a fixed cadence,
//! deduplicates rows by caller-line identifier, and relays per-call
//! notifications to a Telegram channel, including the transcoded
//! recording for completed calls.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod utils;
