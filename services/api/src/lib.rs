//! SpeakEase API Library Crate
//!
//! This library contains all the core logic for the SpeakEase web service,
//! including configuration, database access, API handlers and routing.
//! The binaries under `bin/` are thin wrappers around this library.

pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
