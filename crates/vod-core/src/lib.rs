//! Core types and selection logic for the smart verse of the day.
//!
//! This crate is deliberately free of HTTP and database dependencies. Storage
//! backends implement [`store::VerseStore`]; everything else (context
//! resolution, deterministic picking, repetition tracking, orchestration) is
//! plain computation over that trait.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod batch;
pub mod church;
pub mod context;
pub mod corpus;
pub mod daily;
pub mod error;
pub mod picker;
pub mod repetition;
pub mod rules;
pub mod selector;
pub mod store;
pub mod verse;

pub use error::{Error, Result};
