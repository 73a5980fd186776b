//! # berth-resource
//!
//! A keyed reservation cache with at-most-one-consumer semantics and
//! TTL-based reclamation.
//!
//! Request handlers that must hand out a named resource (an exec or attach
//! session, a reserved container name) exactly once park it here. The first
//! [`ResourceCache::get`] for a name consumes the entry; if nobody consumes
//! it before the TTL elapses, its cleanup actions run and the reservation is
//! reclaimed. Exactly one of the two ever happens per entry.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod store;

pub use store::{CacheError, CleanupFn, ResourceCache, ResourceHandle, DEFAULT_TTL};
