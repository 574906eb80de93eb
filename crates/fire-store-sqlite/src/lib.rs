//! SQLite backend for the FIRE point register.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Append-only rules for point information
//! are enforced twice: by the protocol in `fire_core::lifecycle`, and by
//! constraints and triggers in the schema itself.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
