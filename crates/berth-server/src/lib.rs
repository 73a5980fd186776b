//! # berth-server
//!
//! The container lifecycle manager of the Berth CRI daemon.
//!
//! [`ContainerServer`] reconciles three views of a container: the in-process
//! record, the external runtime's actual process state, and the persisted
//! snapshot on disk. It tolerates partial failure at any step. Lifecycle
//! operations are synchronous calls on the caller's task; the only background
//! work in the core belongs to the reservation cache's expiry timers and the
//! directory notifier's dispatch task.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              ContainerServer                 │
//! │  registry · name registrar · persistence     │
//! │  pause / unpause / stop / kill               │
//! └────────────┬───────────────────┬────────────┘
//!              │ dyn Runtime       │ dyn ContainerStorage
//!              ▼                   ▼
//!        OCI runtime         filesystem release
//! ```

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod server;
pub mod storage;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use server::{ContainerHandle, ContainerServer};
pub use storage::{ContainerStorage, LocalStorage, StorageError};
