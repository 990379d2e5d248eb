//! Storage layer: the shared in-memory cache.
//!
//! A single map of string and list entries, designed to sit behind one
//! process-wide mutex held by whoever executes a command. See
//! [`cache::Cache`] for the operation set and invariants.

pub mod cache;

pub use cache::{Cache, CacheError, Entry};
