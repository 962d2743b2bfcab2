//! stocklink-core - Core library for Stocklink
//!
//! This crate contains the record models, the local SQLite store with its
//! outgoing change queue, and the sync engine shared by all Stocklink
//! interfaces (mobile, CLI).

pub mod db;
pub mod error;
pub mod models;
pub mod sync;

pub use error::{Error, Result};
pub use models::{Entity, RecordKind};
