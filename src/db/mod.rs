//! Database module.
//!
//! Persists configuration entries in SQLite.

mod models;
mod store;

pub use models::*;
pub use store::*;
