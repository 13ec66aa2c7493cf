//! Core types and trait definitions for the sitebook business store.
//!
//! Two engines live here: schema convergence (descriptor, live model, diff,
//! verification) and job reconciliation (record key, merge, upsert plan).
//! This crate is free of database dependencies; backends implement the
//! traits in [`store`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod candidate;
pub mod diff;
pub mod error;
pub mod job;
pub mod key;
pub mod live;
pub mod merge;
pub mod pipeline;
pub mod reconcile;
pub mod schema;
pub mod store;
pub mod verify;

pub use error::{Error, Result};
