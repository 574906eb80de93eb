//! Core types and trait definitions for the FIRE point register.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod lifecycle;
pub mod punkt;
pub mod punktinfo;
pub mod sag;
pub mod store;

pub use error::{Classify, Error, ErrorKind, Result};
