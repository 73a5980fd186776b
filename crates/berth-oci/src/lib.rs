//! # berth-oci
//!
//! Container records, lifecycle states, and the runtime seam for Berth.
//!
//! This crate defines the pieces the lifecycle manager coordinates:
//!
//! - [`Container`]: the in-memory record for one container
//! - [`ContainerState`]: the lifecycle state machine
//! - [`Runtime`]: the capability trait an OCI-compatible runtime implements
//! - [`CommandRuntime`]: a runtime backed by a `runc`-style binary
//! - [`SpoofedRuntime`]: a scripted runtime for tests
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               berth-server                    │
//! │            (lifecycle manager)                │
//! └──────────────────────┬───────────────────────┘
//!                        │ dyn Runtime
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │   CommandRuntime          SpoofedRuntime      │
//! │   (runc/crun CLI)         (tests)             │
//! └──────────────────────────────────────────────┘
//! ```

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod command;
pub mod container;
pub mod error;
pub mod runtime;
pub mod spoofed;
pub mod state;

pub use command::CommandRuntime;
pub use container::Container;
pub use error::{OciError, Result};
pub use runtime::{Runtime, Signal};
pub use spoofed::SpoofedRuntime;
pub use state::ContainerState;
