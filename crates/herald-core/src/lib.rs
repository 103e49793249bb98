//! Core types and trait definitions for Herald.
//!
//! This crate is deliberately free of HTTP, runtime, and chat-client
//! dependencies. Every other crate depends on it; it depends on nothing
//! proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod event;
pub mod notice;
pub mod report;
pub mod sink;
pub mod source;
pub mod store;

pub use error::{Error, Result};
