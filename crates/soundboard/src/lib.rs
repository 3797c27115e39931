//! A live, directory-backed soundboard.
//!
//! Clips in the registry directory are decoded into memory at startup and
//! kept in sync with the directory while the process runs. Triggers are rate
//! limited and queued, and a single worker plays them one at a time.

pub mod cli;
pub mod commands;
pub mod config;
pub mod console;
pub mod listing;
pub mod loader;
pub mod player;
pub mod rate_limit;
pub mod registry;
pub mod runtime;
pub mod scan;
pub mod watch;

#[cfg(test)]
mod test_support;

pub use runtime::{Soundboard, TriggerOutcome};
