//! Spreadsheet extracts of the FIRE point register.
//!
//! Only reads from a [`fire_core::store::PunktStore`]; nothing here mutates
//! the register.

pub mod error;
pub mod revision;

pub use error::{Error, Result};
pub use revision::{RevisionRow, extract_revision, revision_rows, write_revision};
