//! Core domain + application logic for the Lingo vocabulary bot.
//!
//! This crate is intentionally framework-agnostic. Telegram / SQLite / the
//! dictionary and generation HTTP clients live behind ports (traits)
//! implemented in adapter crates.

pub mod config;
pub mod domain;
pub mod engine;
pub mod enrich;
pub mod errors;
pub mod formatting;
pub mod keyboards;
pub mod logging;
pub mod messaging;
pub mod providers;
pub mod scheduler;
pub mod store;

pub use errors::{Error, Result};
