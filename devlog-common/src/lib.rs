//! # devlog common library
//!
//! Persistence and shared types for the devlog service:
//! - Entry model and storage contract (`EntryStore`) with SQLite and
//!   PostgreSQL backends
//! - Filter → predicate translation and per-group entry numbering
//! - Status normalization and display labels
//! - Configuration loading

pub mod config;
pub mod db;
pub mod error;
pub mod status;

pub use db::{EntryStore, StoreSelection};
pub use error::{Error, Result};
