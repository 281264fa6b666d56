//! BHAP module - proposals, their lifecycle and their votes
//!
//! The lifecycle and tally engines are pure; everything that touches
//! storage goes through `BhapStore`.

mod error;
pub mod lifecycle;
mod models;
mod pg_store;
mod service;
mod store;
pub mod tally;

pub use error::BhapError;
pub use models::*;
pub use pg_store::PgStore;
pub use service::{BhapService, BhapSummary, BhapView};
pub use store::{BhapStore, MemoryStore};
