//! Core types and algorithms for snapshot and role reconciliation.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Persistence, permissions and event delivery are collaborator traits
//! ([`store::ObjectStore`], [`permission::Permissions`],
//! [`event::EventSink`]) implemented by the outer crates.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod assignment;
pub mod cache;
pub mod classify;
pub mod conflict;
pub mod error;
pub mod event;
pub mod materialize;
pub mod object;
pub mod permission;
pub mod registry;
pub mod roles;
pub mod snapshot;
pub mod store;

pub use error::{Error, Result};
