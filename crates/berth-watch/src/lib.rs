//! # berth-watch
//!
//! Turns filesystem change events under one watched directory into one-shot,
//! per-file completion signals.
//!
//! Callers waiting for a runtime-side side effect (a socket appearing, a
//! pidfile vanishing, an exit file being written) register a path with
//! [`DirectoryNotifier::notifier_for_file`] and await the returned receiver
//! instead of polling. A single background dispatch task owns the event
//! stream and fires each pending signal at most once.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod notifier;

pub use notifier::{DirectoryNotifier, WatchError, WatchOp};
